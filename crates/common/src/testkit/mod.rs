/// In-memory stand-ins for the DataLayer node and the wallet
///
/// These implement the [`crate::remote`] traits without any network access,
/// record every call they receive, and enforce the node's changelist rules
/// (no deleting a missing key, no inserting an existing one), so pipelines can
/// be driven end to end from tests.
///
/// # Example
///
/// ```rust,ignore
/// use common::testkit::MemoryConnector;
///
/// #[tokio::test]
/// async fn test_deploy() {
///     let connector = MemoryConnector::new();
///     connector.store().seed("store", "stale.txt", b"old");
///
///     let handle = common::deploy(connector.clone(), "store", dir, DeployMode::Replace, &Options::default());
///     handle.wait().await;
///
///     assert!(connector.store().keys("store").is_empty());
/// }
/// ```
mod store;
mod wallet;

pub use store::{MemoryDataStore, StoreCall};
pub use wallet::MockWallet;

use crate::remote::{Connector, RemoteError};
use crate::settings::Settings;

/// Hands out clones of one shared store and wallet to every operation.
#[derive(Debug, Clone, Default)]
pub struct MemoryConnector {
    store: MemoryDataStore,
    wallet: MockWallet,
}

impl MemoryConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn store(&self) -> &MemoryDataStore {
        &self.store
    }

    pub fn wallet(&self) -> &MockWallet {
        &self.wallet
    }
}

impl Connector for MemoryConnector {
    type Store = MemoryDataStore;
    type Wallet = MockWallet;

    fn connect(&self, _settings: &Settings) -> Result<(Self::Store, Self::Wallet), RemoteError> {
        Ok((self.store.clone(), self.wallet.clone()))
    }
}
