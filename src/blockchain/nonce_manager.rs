// src/blockchain/nonce_manager.rs

use std::sync::Arc;

use dashmap::DashMap;
use ethers_providers::Middleware;
use ethers_core::types::{Address, U256};
use tokio::sync::Mutex;
use tracing::debug;

use crate::blockchain::ledger::LedgerError;

/// Hands out sequential nonces per sender so concurrent writes from the same
/// account do not collide.
#[derive(Debug, Clone, Default)]
pub struct NonceManager {
    // One lock per sender; different senders never contend.
    nonces: Arc<DashMap<Address, Arc<Mutex<Option<U256>>>>>,
}

impl NonceManager {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, address: Address) -> Arc<Mutex<Option<U256>>> {
        self.nonces
            .entry(address)
            .or_insert_with(|| Arc::new(Mutex::new(None)))
            .clone()
    }

    /// Next nonce for `address`. The first call per sender reads the pending
    /// transaction count from the node; later calls count up locally.
    pub async fn next_nonce<M: Middleware>(
        &self,
        address: Address,
        provider: &M,
    ) -> Result<U256, LedgerError> {
        let slot = self.slot(address);
        let mut next = slot.lock().await;

        let nonce = match *next {
            Some(nonce) => nonce,
            None => {
                let fetched = provider
                    .get_transaction_count(address, None)
                    .await
                    .map_err(|e| LedgerError::Rpc(format!("failed to fetch nonce: {}", e)))?;
                debug!("Fetched nonce {} for {:?}", fetched, address);
                fetched
            }
        };

        *next = Some(nonce + U256::one());
        Ok(nonce)
    }

    /// Forgets the cached nonce so the next call re-reads it from the node.
    /// Used after a submission fails and the reserved nonce was never consumed.
    pub async fn reset(&self, address: Address) {
        *self.slot(address).lock().await = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethers_providers::Provider;

    #[tokio::test]
    async fn counts_up_after_first_fetch() {
        let (provider, mock) = Provider::mocked();
        mock.push(U256::from(5)).unwrap();

        let manager = NonceManager::new();
        let sender = Address::repeat_byte(0x11);
        assert_eq!(manager.next_nonce(sender, &provider).await.unwrap(), U256::from(5));
        assert_eq!(manager.next_nonce(sender, &provider).await.unwrap(), U256::from(6));
    }

    #[tokio::test]
    async fn reset_refetches_from_node() {
        let (provider, mock) = Provider::mocked();
        mock.push(U256::from(9)).unwrap();
        mock.push(U256::from(3)).unwrap();

        let manager = NonceManager::new();
        let sender = Address::repeat_byte(0x22);
        // Mock responses pop newest first.
        assert_eq!(manager.next_nonce(sender, &provider).await.unwrap(), U256::from(3));
        manager.reset(sender).await;
        assert_eq!(manager.next_nonce(sender, &provider).await.unwrap(), U256::from(9));
    }
}
