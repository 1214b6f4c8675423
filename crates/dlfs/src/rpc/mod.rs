//! JSON-RPC clients for the Chia DataLayer node and wallet
//!
//! Every call is an HTTPS POST of a JSON body to `<host>/<endpoint>`,
//! authenticated with the node's private client certificate. The node
//! answers with `success: true` plus the result fields, or `success: false`
//! and an `error` string.

pub mod datalayer;
pub mod error;
pub mod wallet;

use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::{Client, Identity, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use url::Url;

use common::remote::{Connector, RemoteError};
use common::settings::Settings;

pub use datalayer::DataLayerClient;
pub use error::RpcError;
pub use wallet::WalletClient;

/// Upper bound for a single call; batch updates near the payload ceiling are slow
const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

pub trait RpcRequest: Serialize + Send + Sync {
    type Response: DeserializeOwned;
    const ENDPOINT: &'static str;

    fn build_request(&self, base_url: &Url, client: &Client) -> Result<RequestBuilder, RpcError> {
        let full_url = base_url.join(Self::ENDPOINT)?;
        Ok(client.post(full_url).json(self))
    }
}

/// The Chia services this crate talks to, and where their client certificates live.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Service {
    DataLayer,
    Wallet,
}

impl Service {
    fn name(&self) -> &'static str {
        match self {
            Service::DataLayer => "data_layer",
            Service::Wallet => "wallet",
        }
    }

    /// `(certificate, key)` paths under the node's ssl folder.
    pub fn identity_paths(&self, certificate_folder: &Path) -> (PathBuf, PathBuf) {
        let dir = certificate_folder.join(self.name());
        let stem = format!("private_{}", self.name());
        (
            dir.join(format!("{}.crt", stem)),
            dir.join(format!("{}.key", stem)),
        )
    }
}

#[derive(Debug, Clone)]
pub struct RpcClient {
    pub remote: Url,
    client: Client,
}

impl RpcClient {
    pub fn new(remote: &Url, identity: Identity) -> Result<Self, RpcError> {
        // the node serves a self-signed certificate
        let client = Client::builder()
            .identity(identity)
            .danger_accept_invalid_certs(true)
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            remote: remote.clone(),
            client,
        })
    }

    /// Client for `service` using the certificates under `settings.certificate_folder_path`.
    pub fn for_service(service: Service, remote: &Url, settings: &Settings) -> Result<Self, RpcError> {
        let (cert_path, key_path) = service.identity_paths(&settings.certificate_folder_path);
        let identity = load_identity(&cert_path, &key_path)?;
        Self::new(remote, identity)
    }

    /// Send `request` and return the raw response body, without looking at `success`.
    pub async fn call_raw<T: RpcRequest>(&self, request: &T) -> Result<Value, RpcError> {
        let request_builder = request.build_request(&self.remote, &self.client)?;
        let response = request_builder.send().await?;

        if response.status().is_success() {
            Ok(response.json::<Value>().await?)
        } else {
            Err(RpcError::HttpStatus(
                response.status(),
                response.text().await?,
            ))
        }
    }

    pub async fn call<T: RpcRequest>(&self, request: &T) -> Result<T::Response, RpcError> {
        let body = self.call_raw(request).await?;
        parse_envelope(T::ENDPOINT, body)
    }
}

/// Check the `success` flag of a response and decode the rest of it.
pub fn parse_envelope<T: DeserializeOwned>(endpoint: &'static str, body: Value) -> Result<T, RpcError> {
    match body.get("success").and_then(Value::as_bool) {
        Some(true) => serde_json::from_value(body).map_err(|e| RpcError::Malformed {
            endpoint,
            message: e.to_string(),
        }),
        Some(false) => Err(RpcError::Rejected {
            endpoint,
            message: error_message(&body),
        }),
        None => Err(RpcError::Malformed {
            endpoint,
            message: "missing success flag".to_string(),
        }),
    }
}

pub(crate) fn error_message(body: &Value) -> String {
    body.get("error")
        .and_then(Value::as_str)
        .unwrap_or("unknown error")
        .to_string()
}

pub fn load_identity(cert_path: &Path, key_path: &Path) -> Result<Identity, RpcError> {
    let read = |path: &Path| {
        std::fs::read_to_string(path).map_err(|source| RpcError::IdentityFile {
            path: path.to_path_buf(),
            source,
        })
    };

    let bundle = identity_bundle(&read(cert_path)?, &read(key_path)?)?;
    Identity::from_pem(bundle.as_bytes()).map_err(|e| RpcError::InvalidIdentity(e.to_string()))
}

/// Combine a certificate file and a key file into the single PEM bundle
/// reqwest expects: the private key followed by the certificate chain.
pub fn identity_bundle(cert_pem: &str, key_pem: &str) -> Result<String, RpcError> {
    let invalid = |e: pem::PemError| RpcError::InvalidIdentity(e.to_string());

    let key = pem::parse_many(key_pem)
        .map_err(invalid)?
        .into_iter()
        .find(|block| block.tag().ends_with("PRIVATE KEY"))
        .ok_or_else(|| RpcError::InvalidIdentity("no private key found".to_string()))?;

    let certs: Vec<pem::Pem> = pem::parse_many(cert_pem)
        .map_err(invalid)?
        .into_iter()
        .filter(|block| block.tag() == "CERTIFICATE")
        .collect();
    if certs.is_empty() {
        return Err(RpcError::InvalidIdentity("no certificate found".to_string()));
    }

    let mut blocks = vec![key];
    blocks.extend(certs);
    Ok(pem::encode_many(&blocks))
}

/// Connects operations to the node and wallet configured in [`Settings`].
#[derive(Debug, Clone, Copy, Default)]
pub struct RpcConnector;

impl Connector for RpcConnector {
    type Store = DataLayerClient;
    type Wallet = WalletClient;

    fn connect(&self, settings: &Settings) -> Result<(Self::Store, Self::Wallet), RemoteError> {
        let store = DataLayerClient::new(settings)?;
        let wallet = WalletClient::new(settings)?;
        Ok((store, wallet))
    }
}
