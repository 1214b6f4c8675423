use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;

use crate::remote::{RemoteError, Wallet};

/// Wallet whose sync state is set by the test
#[derive(Debug, Clone)]
pub struct MockWallet {
    inner: Arc<Mutex<MockWalletInner>>,
}

#[derive(Debug)]
struct MockWalletInner {
    synced: bool,
    confirmation_waits: usize,
}

impl MockWallet {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(MockWalletInner {
                synced: true,
                confirmation_waits: 0,
            })),
        }
    }

    pub fn set_synced(&self, synced: bool) {
        self.inner.lock().synced = synced;
    }

    /// How many times something waited for confirmations.
    pub fn confirmation_waits(&self) -> usize {
        self.inner.lock().confirmation_waits
    }
}

impl Default for MockWallet {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Wallet for MockWallet {
    async fn wallet_is_synced(&self) -> Result<bool, RemoteError> {
        Ok(self.inner.lock().synced)
    }

    async fn wait_for_all_transactions_to_confirm(&self) -> Result<(), RemoteError> {
        self.inner.lock().confirmation_waits += 1;
        Ok(())
    }
}
