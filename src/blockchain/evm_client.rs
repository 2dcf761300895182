// src/blockchain/evm_client.rs

use std::str::FromStr;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use ethers::{
    types::{
        transaction::eip2718::TypedTransaction, Address, Bytes, TransactionReceipt,
        TransactionRequest, H256, U256,
    },
    utils::{get_create2_address, to_checksum},
};
use ethers_core::abi::{encode, Token};
use ethers_providers::{Http, Middleware, Provider};
use ethers_signers::{LocalWallet, Signer};
use secrecy::ExposeSecret;
use tracing::{debug, info, warn};

use crate::blockchain::abi::{
    coerce_tokens, decode_output, encode_call, encode_contract_call, parse_types, raw_words,
};
use crate::blockchain::ledger::{
    Call, DeployRequest, Deployment, Event, FeeEstimate, Ledger, LedgerError, Receipt,
    TransactionStatus,
};
use crate::blockchain::nonce_manager::NonceManager;
use crate::blockchain::paymaster::{ExecutionOptions, PaymasterClient, RelayedCall};
use crate::config::Config;

const EXECUTE_BATCH: &str = "executeBatch(address[],uint256[],bytes[])";

/// A call reduced to what goes on the wire.
#[derive(Debug, Clone, PartialEq)]
struct RawCall {
    to: Address,
    data: Bytes,
}

/// Ledger backed by an EVM JSON-RPC node.
///
/// When the configured account is the signer's own address every write is a
/// single plain transaction. Otherwise the account is treated as a smart
/// account owned by the signer, and writes go through its `executeBatch`.
#[derive(Clone)]
pub struct EvmLedger {
    provider: Arc<Provider<Http>>,
    wallet: LocalWallet,
    account: Address,
    nonce_manager: NonceManager,
    paymaster: Option<PaymasterClient>,
    deployer: Address,
}

impl EvmLedger {
    pub async fn connect(config: &Config) -> Result<Self> {
        let provider = Provider::<Http>::try_from(config.rpc_url.as_str())
            .with_context(|| format!("invalid RPC_URL {}", config.rpc_url))?;
        let chain_id = provider
            .get_chainid()
            .await
            .context("failed to read chain id from RPC_URL")?;

        let wallet = LocalWallet::from_str(config.private_key.expose_secret())
            .context("PRIVATE_KEY is not a valid secp256k1 key")?
            .with_chain_id(chain_id.as_u64());
        let account = Address::from_str(&config.account_address)
            .context("ACCOUNT_ADDRESS is not a valid address")?;
        let deployer = Address::from_str(&config.deployer_address)
            .context("DEPLOYER_ADDRESS is not a valid address")?;

        let paymaster = config
            .paymaster_url
            .as_ref()
            .map(|url| PaymasterClient::new(url.clone(), config.aggregator_api_key.clone()));

        info!(
            "Connected to chain {} as {} (signer {:?}, paymaster: {})",
            chain_id,
            to_checksum(&account, None),
            wallet.address(),
            paymaster.is_some()
        );

        Ok(Self {
            provider: Arc::new(provider),
            wallet,
            account,
            nonce_manager: NonceManager::new(),
            paymaster,
            deployer,
        })
    }

    fn batches(&self) -> bool {
        self.account != self.wallet.address()
    }

    fn encode_calls(calls: &[Call]) -> Result<Vec<RawCall>, LedgerError> {
        if calls.is_empty() {
            return Err(LedgerError::InvalidCall("no calls to execute".into()));
        }
        calls
            .iter()
            .map(|c| {
                encode_contract_call(c).map(|e| RawCall {
                    to: e.to,
                    data: e.data,
                })
            })
            .collect()
    }

    /// The transaction that carries `calls`, before gas and nonce are filled in.
    fn envelope(&self, calls: &[RawCall]) -> Result<TransactionRequest, LedgerError> {
        let tx = if self.batches() {
            TransactionRequest::new()
                .to(self.account)
                .data(batch_calldata(calls))
        } else {
            match calls {
                [single] => TransactionRequest::new().to(single.to).data(single.data.clone()),
                _ => return Err(LedgerError::BatchUnsupported(calls.len())),
            }
        };
        Ok(tx.from(self.wallet.address()))
    }

    async fn submit(
        &self,
        calls: Vec<RawCall>,
        options: &ExecutionOptions,
    ) -> Result<String, LedgerError> {
        match options.fee_mode() {
            None => {
                let tx = self.envelope(&calls)?;
                self.send_signed(tx).await
            }
            Some(fee_mode) => {
                let paymaster = self
                    .paymaster
                    .as_ref()
                    .ok_or(LedgerError::PaymasterUnconfigured)?;
                let signature = self
                    .wallet
                    .sign_message(batch_calldata(&calls).as_ref())
                    .await
                    .map_err(|e| LedgerError::Paymaster(format!("signing failed: {}", e)))?;
                let relayed: Vec<RelayedCall> = calls
                    .iter()
                    .map(|c| RelayedCall {
                        to: format!("{:#x}", c.to),
                        data: format!("0x{}", hex::encode(&c.data)),
                        value: "0x0".to_string(),
                    })
                    .collect();
                paymaster
                    .execute(
                        &to_checksum(&self.account, None),
                        &relayed,
                        &fee_mode,
                        &format!("0x{}", signature),
                    )
                    .await
            }
        }
    }

    /// Fills nonce, gas and gas price, signs locally and broadcasts the raw
    /// transaction.
    async fn send_signed(&self, tx: TransactionRequest) -> Result<String, LedgerError> {
        let from = self.wallet.address();
        let nonce = self.nonce_manager.next_nonce(from, &*self.provider).await?;

        let result = async {
            let mut typed: TypedTransaction = tx.nonce(nonce).chain_id(self.wallet.chain_id()).into();

            let gas = self
                .provider
                .estimate_gas(&typed, None)
                .await
                .map_err(|e| LedgerError::Rpc(e.to_string()))?;
            let gas_price = self
                .provider
                .get_gas_price()
                .await
                .map_err(|e| LedgerError::Rpc(e.to_string()))?;
            typed.set_gas(gas);
            typed.set_gas_price(gas_price);

            let signature = self
                .wallet
                .sign_transaction(&typed)
                .await
                .map_err(|e| LedgerError::Rpc(format!("signing failed: {}", e)))?;
            let raw = typed.rlp_signed(&signature);

            let pending = self
                .provider
                .send_raw_transaction(raw)
                .await
                .map_err(|e| LedgerError::Rpc(e.to_string()))?;
            Ok::<H256, LedgerError>(*pending)
        }
        .await;

        match result {
            Ok(hash) => {
                debug!("Broadcast transaction {:#x} with nonce {}", hash, nonce);
                Ok(format!("{:#x}", hash))
            }
            Err(e) => {
                warn!("Submission with nonce {} failed: {}", nonce, e);
                self.nonce_manager.reset(from).await;
                Err(e)
            }
        }
    }
}

/// `executeBatch(targets, values, payloads)` calldata for a smart account.
fn batch_calldata(calls: &[RawCall]) -> Bytes {
    let targets = calls.iter().map(|c| Token::Address(c.to)).collect();
    let values = calls.iter().map(|_| Token::Uint(U256::zero())).collect();
    let payloads = calls.iter().map(|c| Token::Bytes(c.data.to_vec())).collect();
    encode_call(
        EXECUTE_BATCH,
        &[
            Token::Array(targets),
            Token::Array(values),
            Token::Array(payloads),
        ],
    )
}

fn parse_salt(salt: Option<&str>) -> Result<[u8; 32], LedgerError> {
    let Some(salt) = salt else {
        return Ok(rand::random());
    };
    let bytes = hex::decode(salt.trim_start_matches("0x"))
        .map_err(|_| LedgerError::InvalidCall(format!("salt '{}' is not hex", salt)))?;
    if bytes.len() > 32 {
        return Err(LedgerError::InvalidCall("salt is longer than 32 bytes".into()));
    }
    let mut out = [0u8; 32];
    out[32 - bytes.len()..].copy_from_slice(&bytes);
    Ok(out)
}

/// Creation code with ABI-encoded constructor arguments appended.
fn init_code(request: &DeployRequest) -> Result<Vec<u8>, LedgerError> {
    let mut code = hex::decode(request.bytecode.trim_start_matches("0x"))
        .map_err(|_| LedgerError::InvalidCall("bytecode is not hex".into()))?;
    if code.is_empty() {
        return Err(LedgerError::InvalidCall("bytecode is empty".into()));
    }
    let kinds = if request.constructor_types.is_empty() {
        Vec::new()
    } else {
        parse_types(&request.constructor_types)?
    };
    let tokens = coerce_tokens(&kinds, &request.constructor_calldata)?;
    code.extend(encode(&tokens));
    Ok(code)
}

fn map_receipt(receipt: &TransactionReceipt) -> Receipt {
    Receipt {
        transaction_hash: format!("{:#x}", receipt.transaction_hash),
        block_number: receipt.block_number.map(|b| b.as_u64()),
        contract_address: receipt.contract_address.map(|a| to_checksum(&a, None)),
        events: receipt
            .logs
            .iter()
            .map(|log| Event {
                from_address: to_checksum(&log.address, None),
                keys: log.topics.iter().map(|t| format!("{:#x}", t)).collect(),
                data: raw_words(&log.data),
            })
            .collect(),
    }
}

#[async_trait]
impl Ledger for EvmLedger {
    fn account_address(&self) -> String {
        to_checksum(&self.account, None)
    }

    async fn call(&self, call: &Call) -> Result<Vec<String>, LedgerError> {
        let encoded = encode_contract_call(call)?;
        let tx: TypedTransaction = TransactionRequest::new()
            .from(self.account)
            .to(encoded.to)
            .data(encoded.data)
            .into();
        let output = self
            .provider
            .call(&tx, None)
            .await
            .map_err(|e| LedgerError::Rpc(e.to_string()))?;
        decode_output(&encoded.function, &output)
    }

    async fn execute(
        &self,
        calls: &[Call],
        options: &ExecutionOptions,
    ) -> Result<String, LedgerError> {
        let raw = Self::encode_calls(calls)?;
        info!("Submitting {} call(s) ({:?})", raw.len(), options);
        self.submit(raw, options).await
    }

    async fn transaction_status(&self, hash: &str) -> Result<TransactionStatus, LedgerError> {
        let hash = H256::from_str(hash)
            .map_err(|_| LedgerError::InvalidCall(format!("'{}' is not a transaction hash", hash)))?;

        let receipt = self
            .provider
            .get_transaction_receipt(hash)
            .await
            .map_err(|e| LedgerError::Rpc(e.to_string()))?;

        if let Some(receipt) = receipt {
            let mapped = map_receipt(&receipt);
            return Ok(match receipt.status.map(|s| s.as_u64()) {
                Some(0) => TransactionStatus::Reverted {
                    receipt: mapped,
                    reason: "execution reverted".to_string(),
                },
                _ => TransactionStatus::Succeeded(mapped),
            });
        }

        let known = self
            .provider
            .get_transaction(hash)
            .await
            .map_err(|e| LedgerError::Rpc(e.to_string()))?;
        Ok(if known.is_some() {
            TransactionStatus::Pending
        } else {
            TransactionStatus::NotFound
        })
    }

    async fn estimate_fee(&self, calls: &[Call]) -> Result<FeeEstimate, LedgerError> {
        let raw = Self::encode_calls(calls)?;
        let typed: TypedTransaction = self.envelope(&raw)?.into();

        let (gas_units, gas_price) = tokio::try_join!(
            async {
                self.provider
                    .estimate_gas(&typed, None)
                    .await
                    .map_err(|e| LedgerError::Rpc(e.to_string()))
            },
            async {
                self.provider
                    .get_gas_price()
                    .await
                    .map_err(|e| LedgerError::Rpc(e.to_string()))
            }
        )?;

        let overall_fee = gas_units
            .checked_mul(gas_price)
            .ok_or_else(|| LedgerError::Rpc("fee calculation overflow".into()))?;

        Ok(FeeEstimate {
            overall_fee,
            gas_units,
            gas_price,
            unit: "ETH".to_string(),
        })
    }

    async fn deploy(
        &self,
        request: &DeployRequest,
        options: &ExecutionOptions,
    ) -> Result<Deployment, LedgerError> {
        let salt = parse_salt(request.salt.as_deref())?;
        let code = init_code(request)?;
        let predicted = get_create2_address(self.deployer, salt, &code);

        let mut payload = salt.to_vec();
        payload.extend_from_slice(&code);
        let call = RawCall {
            to: self.deployer,
            data: Bytes::from(payload),
        };

        info!(
            "Deploying {} bytes of init code to {}",
            code.len(),
            to_checksum(&predicted, None)
        );
        let transaction_hash = self.submit(vec![call], options).await?;
        Ok(Deployment {
            transaction_hash,
            contract_address: to_checksum(&predicted, None),
        })
    }
}
