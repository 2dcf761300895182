// src/blockchain/erc20.rs

use ethers_core::types::U256;
use serde_json::json;

use crate::blockchain::ledger::{Call, Ledger, LedgerError};

pub const BALANCE_OF: &str = "balanceOf(address) returns (uint256)";
pub const DECIMALS: &str = "decimals() returns (uint8)";
pub const TRANSFER: &str = "transfer(address,uint256) returns (bool)";

fn first_uint(outputs: Vec<String>, what: &str) -> Result<U256, LedgerError> {
    let raw = outputs
        .into_iter()
        .next()
        .ok_or_else(|| LedgerError::Rpc(format!("{} returned no data", what)))?;
    U256::from_dec_str(&raw).map_err(|e| LedgerError::Rpc(format!("bad {} value '{}': {}", what, raw, e)))
}

pub async fn balance_of(ledger: &dyn Ledger, token: &str, owner: &str) -> Result<U256, LedgerError> {
    let call = Call::new(token, BALANCE_OF).with_calldata(vec![json!(owner)]);
    first_uint(ledger.call(&call).await?, "balanceOf")
}

pub async fn decimals(ledger: &dyn Ledger, token: &str) -> Result<u8, LedgerError> {
    let value = first_uint(ledger.call(&Call::new(token, DECIMALS)).await?, "decimals")?;
    if value > U256::from(u8::MAX) {
        return Err(LedgerError::Rpc(format!("token {} reports {} decimals", token, value)));
    }
    Ok(value.as_u32() as u8)
}

pub fn transfer_call(token: &str, recipient: &str, amount: U256) -> Call {
    Call::new(token, TRANSFER).with_calldata(vec![json!(recipient), json!(amount.to_string())])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transfer_call_carries_decimal_amount() {
        let call = transfer_call("0xtoken", "0xrecipient", U256::from(1_500_000u64));
        assert_eq!(call.contract_address, "0xtoken");
        assert_eq!(call.calldata, vec![json!("0xrecipient"), json!("1500000")]);
    }
}
