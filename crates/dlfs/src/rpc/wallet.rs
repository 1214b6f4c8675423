use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use common::remote::{RemoteError, Wallet};
use common::settings::Settings;

use super::{RpcClient, RpcError, RpcRequest, Service};

/// How many of the most recent transactions are checked for confirmation
const RECENT_TRANSACTIONS: u32 = 50;

#[derive(Debug, Serialize)]
pub struct GetSyncStatusRequest {}

#[derive(Debug, Deserialize)]
pub struct SyncStatus {
    pub synced: bool,
    #[serde(default)]
    pub syncing: bool,
}

impl RpcRequest for GetSyncStatusRequest {
    type Response = SyncStatus;
    const ENDPOINT: &'static str = "get_sync_status";
}

#[derive(Debug, Serialize)]
pub struct GetTransactionsRequest {
    pub wallet_id: u32,
    pub start: u32,
    pub end: u32,
    pub reverse: bool,
}

#[derive(Debug, Deserialize)]
pub struct TransactionRecord {
    pub confirmed: bool,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct GetTransactionsResponse {
    #[serde(default)]
    pub transactions: Vec<TransactionRecord>,
}

impl RpcRequest for GetTransactionsRequest {
    type Response = GetTransactionsResponse;
    const ENDPOINT: &'static str = "get_transactions";
}

#[derive(Debug, Clone)]
pub struct WalletClient {
    rpc: RpcClient,
    wallet_id: u32,
    poll_interval: Duration,
}

impl WalletClient {
    pub fn new(settings: &Settings) -> Result<Self, RpcError> {
        Ok(Self {
            rpc: RpcClient::for_service(Service::Wallet, &settings.wallet_host, settings)?,
            wallet_id: settings.default_wallet_id,
            poll_interval: settings.confirmation_poll_interval,
        })
    }

    async fn sync_status(&self) -> Result<SyncStatus, RpcError> {
        self.rpc.call(&GetSyncStatusRequest {}).await
    }

    /// Recent transactions of the configured wallet that are not yet confirmed.
    async fn pending_transactions(&self) -> Result<Vec<TransactionRecord>, RpcError> {
        let request = GetTransactionsRequest {
            wallet_id: self.wallet_id,
            start: 0,
            end: RECENT_TRANSACTIONS,
            reverse: true,
        };
        let response = self.rpc.call(&request).await?;
        Ok(unconfirmed(response.transactions))
    }
}

fn unconfirmed(transactions: Vec<TransactionRecord>) -> Vec<TransactionRecord> {
    transactions.into_iter().filter(|tx| !tx.confirmed).collect()
}

#[async_trait]
impl Wallet for WalletClient {
    async fn wallet_is_synced(&self) -> Result<bool, RemoteError> {
        Ok(self.sync_status().await?.synced)
    }

    async fn wait_for_all_transactions_to_confirm(&self) -> Result<(), RemoteError> {
        loop {
            let status = self.sync_status().await?;
            if status.synced {
                let pending = self.pending_transactions().await?;
                if pending.is_empty() {
                    return Ok(());
                }
                tracing::info!(
                    pending = pending.len(),
                    first = ?pending.first().and_then(|tx| tx.name.as_deref()),
                    "waiting for transactions to confirm"
                );
            } else {
                tracing::info!(syncing = status.syncing, "waiting for wallet to sync");
            }

            tokio::time::sleep(self.poll_interval).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::parse_envelope;

    #[test]
    fn test_transactions_request_body() {
        let request = GetTransactionsRequest {
            wallet_id: 1,
            start: 0,
            end: RECENT_TRANSACTIONS,
            reverse: true,
        };
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            serde_json::json!({"wallet_id": 1, "start": 0, "end": 50, "reverse": true})
        );
        assert_eq!(
            serde_json::to_string(&GetSyncStatusRequest {}).unwrap(),
            "{}"
        );
    }

    #[test]
    fn test_unconfirmed_filter() {
        let body = serde_json::json!({
            "success": true,
            "transactions": [
                {"confirmed": true, "name": "0x01", "amount": 1},
                {"confirmed": false, "name": "0x02"},
            ],
        });
        let response: GetTransactionsResponse = parse_envelope("get_transactions", body).unwrap();
        let pending = unconfirmed(response.transactions);
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].name.as_deref(), Some("0x02"));
    }

    #[test]
    fn test_sync_status_defaults() {
        let status: SyncStatus =
            serde_json::from_value(serde_json::json!({"synced": false, "success": true})).unwrap();
        assert!(!status.synced);
        assert!(!status.syncing);
    }
}
