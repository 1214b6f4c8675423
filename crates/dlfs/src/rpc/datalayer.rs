use std::net::{IpAddr, Ipv6Addr};

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use common::changelist::ChangeOperation;
use common::remote::{DataStore, MirrorRegistration, RemoteError};
use common::settings::Settings;

use super::{error_message, RpcClient, RpcError, RpcRequest, Service};

/// Echo services answering with the caller's public address as plain text
const IP_ECHO_URL: &str = "https://api64.ipify.org";
const IPV4_ECHO_URL: &str = "https://api.ipify.org";

#[derive(Debug, Serialize)]
pub struct GetKeysRequest<'a> {
    pub id: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct GetKeysResponse {
    #[serde(default)]
    pub keys: Vec<String>,
}

impl RpcRequest for GetKeysRequest<'_> {
    type Response = GetKeysResponse;
    const ENDPOINT: &'static str = "get_keys";
}

#[derive(Debug, Serialize)]
pub struct BatchUpdateRequest<'a> {
    pub id: &'a str,
    pub changelist: &'a [ChangeOperation],
    pub fee: u64,
}

#[derive(Debug, Deserialize)]
pub struct BatchUpdateResponse {
    #[serde(default)]
    pub tx_id: Option<String>,
}

impl RpcRequest for BatchUpdateRequest<'_> {
    type Response = BatchUpdateResponse;
    const ENDPOINT: &'static str = "batch_update";
}

#[derive(Debug, Serialize)]
pub struct AddMirrorRequest<'a> {
    pub id: &'a str,
    pub urls: &'a [String],
    pub amount: u64,
    pub fee: u64,
}

impl RpcRequest for AddMirrorRequest<'_> {
    // read through `call_raw`, `success: false` is an outcome here
    type Response = Value;
    const ENDPOINT: &'static str = "add_mirror";
}

fn registration_from(body: &Value) -> MirrorRegistration {
    let success = body.get("success").and_then(Value::as_bool).unwrap_or(false);
    MirrorRegistration {
        success,
        error: (!success).then(|| error_message(body)),
    }
}

/// `http://<host>:<port>`, bracketing IPv6 literals.
pub fn mirror_url(host: &str, port: u16) -> String {
    if host.parse::<Ipv6Addr>().is_ok() {
        format!("http://[{}]:{}", host, port)
    } else {
        format!("http://{}:{}", host, port)
    }
}

#[derive(Debug, Clone)]
pub struct DataLayerClient {
    rpc: RpcClient,
    ip_echo: Client,
    fee: u64,
    mirror_coin_amount: u64,
    gateway_host: Option<String>,
    gateway_port: u16,
}

impl DataLayerClient {
    pub fn new(settings: &Settings) -> Result<Self, RpcError> {
        Ok(Self {
            rpc: RpcClient::for_service(Service::DataLayer, &settings.datalayer_host, settings)?,
            ip_echo: Client::builder().build()?,
            fee: settings.default_fee,
            mirror_coin_amount: settings.default_mirror_coin_amount,
            gateway_host: settings.mirror_gateway_host.clone(),
            gateway_port: settings.mirror_gateway_port,
        })
    }

    /// Host other peers should fetch this node's files from.
    async fn public_host(&self, force_ip4: bool) -> Result<String, RpcError> {
        if let Some(host) = &self.gateway_host {
            return Ok(host.clone());
        }

        let service = if force_ip4 { IPV4_ECHO_URL } else { IP_ECHO_URL };
        let body = self
            .ip_echo
            .get(service)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        let ip: IpAddr = body.trim().parse().map_err(|_| RpcError::Malformed {
            endpoint: "ip echo",
            message: format!("not an ip address: {:?}", body.trim()),
        })?;
        Ok(ip.to_string())
    }
}

#[async_trait]
impl DataStore for DataLayerClient {
    async fn get_keys(&self, store_id: &str) -> Result<Vec<String>, RemoteError> {
        let response = self.rpc.call(&GetKeysRequest { id: store_id }).await?;
        tracing::debug!(store_id, keys = response.keys.len(), "fetched store keys");
        Ok(response.keys)
    }

    async fn update_data_store(
        &self,
        store_id: &str,
        changelist: &[ChangeOperation],
    ) -> Result<(), RemoteError> {
        let request = BatchUpdateRequest {
            id: store_id,
            changelist,
            fee: self.fee,
        };
        let response = self.rpc.call(&request).await?;
        tracing::debug!(
            store_id,
            operations = changelist.len(),
            tx_id = ?response.tx_id,
            "batch update submitted"
        );
        Ok(())
    }

    async fn add_mirror(
        &self,
        store_id: &str,
        urls: &[String],
        amount: u64,
        fee: u64,
    ) -> Result<MirrorRegistration, RemoteError> {
        let request = AddMirrorRequest {
            id: store_id,
            urls,
            amount,
            fee,
        };
        let body = self.rpc.call_raw(&request).await?;
        Ok(registration_from(&body))
    }

    async fn add_mirror_for_current_host(
        &self,
        store_id: &str,
        force_ip4: bool,
    ) -> Result<MirrorRegistration, RemoteError> {
        let host = self.public_host(force_ip4).await?;
        let url = mirror_url(&host, self.gateway_port);
        tracing::info!(store_id, url = %url, "mirroring from this host");
        self.add_mirror(store_id, &[url], self.mirror_coin_amount, self.fee)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_update_body() {
        let changelist = vec![
            ChangeOperation::delete("0a"),
            ChangeOperation::insert("0a", "ff"),
        ];
        let request = BatchUpdateRequest {
            id: "store",
            changelist: &changelist,
            fee: 300_000_000,
        };
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            serde_json::json!({
                "id": "store",
                "changelist": [
                    {"action": "delete", "key": "0a"},
                    {"action": "insert", "key": "0a", "value": "ff"},
                ],
                "fee": 300_000_000u64,
            })
        );
    }

    #[test]
    fn test_add_mirror_body() {
        let urls = vec!["http://x".to_string()];
        let request = AddMirrorRequest {
            id: "store",
            urls: &urls,
            amount: 1,
            fee: 2,
        };
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            serde_json::json!({"id": "store", "urls": ["http://x"], "amount": 1, "fee": 2})
        );
    }

    #[test]
    fn test_registration_outcome() {
        let ok = registration_from(&serde_json::json!({"success": true}));
        assert!(ok.success);
        assert_eq!(ok.error, None);

        let refused = registration_from(&serde_json::json!({"success": false, "error": "no coins"}));
        assert!(!refused.success);
        assert_eq!(refused.error.as_deref(), Some("no coins"));
    }

    #[test]
    fn test_mirror_url() {
        assert_eq!(mirror_url("203.0.113.7", 8575), "http://203.0.113.7:8575");
        assert_eq!(mirror_url("2001:db8::1", 8575), "http://[2001:db8::1]:8575");
        assert_eq!(mirror_url("files.example.com", 80), "http://files.example.com:80");
    }
}
