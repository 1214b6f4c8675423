//! Invocation settings
//!
//! [`Options`] is the caller-facing, all-optional view (CLI flags, config
//! file). [`Settings`] is the fully resolved value built once per operation
//! by merging options over the defaults. It is never mutated afterwards.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

pub const MIB: u64 = 1024 * 1024;

pub const DEFAULT_DATALAYER_HOST: &str = "https://localhost:8562";
pub const DEFAULT_WALLET_HOST: &str = "https://localhost:9256";
pub const DEFAULT_FEE: u64 = 300_000_000;
pub const DEFAULT_MIRROR_COIN_AMOUNT: u64 = 300_000_000;
/// 25 MiB, the largest body the node accepts comfortably
pub const DEFAULT_MAXIMUM_RPC_PAYLOAD_SIZE: u64 = 25 * MIB;
/// Port the node's DataLayer HTTP file server listens on
pub const DEFAULT_MIRROR_GATEWAY_PORT: u16 = 8575;
pub const DEFAULT_FILES_PER_BATCH: usize = 100;
pub const DEFAULT_CONFIRMATION_POLL_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum SettingsError {
    #[error(
        "maximum_rpc_payload_size of {0} bytes is too small, it must be larger than {min} bytes",
        min = 2 * MIB
    )]
    PayloadCeilingTooSmall(u64),
    #[error("invalid url for {field}: {reason}")]
    InvalidUrl { field: &'static str, reason: String },
}

/// Caller-supplied overrides. Every field is optional; unset fields fall back
/// to whatever lies underneath (config file, then defaults).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Options {
    pub datalayer_host: Option<String>,
    pub wallet_host: Option<String>,
    pub certificate_folder_path: Option<PathBuf>,
    pub default_wallet_id: Option<u32>,
    pub default_fee: Option<u64>,
    pub default_mirror_coin_amount: Option<u64>,
    pub maximum_rpc_payload_size: Option<u64>,
    pub mirror_gateway_host: Option<String>,
    pub mirror_gateway_port: Option<u16>,
    pub force_ip4_mirror: Option<bool>,
    pub mirror_url_override: Option<String>,
    pub verbose: Option<bool>,
    pub num_files_processed_per_batch: Option<usize>,
    pub ignore_orphans: Option<bool>,
    pub confirmation_poll_interval_secs: Option<u64>,
}

impl Options {
    /// Layer `top` over `self`; fields set in `top` win.
    pub fn overlay(self, top: Options) -> Options {
        Options {
            datalayer_host: top.datalayer_host.or(self.datalayer_host),
            wallet_host: top.wallet_host.or(self.wallet_host),
            certificate_folder_path: top.certificate_folder_path.or(self.certificate_folder_path),
            default_wallet_id: top.default_wallet_id.or(self.default_wallet_id),
            default_fee: top.default_fee.or(self.default_fee),
            default_mirror_coin_amount: top
                .default_mirror_coin_amount
                .or(self.default_mirror_coin_amount),
            maximum_rpc_payload_size: top
                .maximum_rpc_payload_size
                .or(self.maximum_rpc_payload_size),
            mirror_gateway_host: top.mirror_gateway_host.or(self.mirror_gateway_host),
            mirror_gateway_port: top.mirror_gateway_port.or(self.mirror_gateway_port),
            force_ip4_mirror: top.force_ip4_mirror.or(self.force_ip4_mirror),
            mirror_url_override: top.mirror_url_override.or(self.mirror_url_override),
            verbose: top.verbose.or(self.verbose),
            num_files_processed_per_batch: top
                .num_files_processed_per_batch
                .or(self.num_files_processed_per_batch),
            ignore_orphans: top.ignore_orphans.or(self.ignore_orphans),
            confirmation_poll_interval_secs: top
                .confirmation_poll_interval_secs
                .or(self.confirmation_poll_interval_secs),
        }
    }
}

/// Every field spelled out, as written into a fresh config file.
impl From<&Settings> for Options {
    fn from(settings: &Settings) -> Self {
        Options {
            datalayer_host: Some(settings.datalayer_host.to_string()),
            wallet_host: Some(settings.wallet_host.to_string()),
            certificate_folder_path: Some(settings.certificate_folder_path.clone()),
            default_wallet_id: Some(settings.default_wallet_id),
            default_fee: Some(settings.default_fee),
            default_mirror_coin_amount: Some(settings.default_mirror_coin_amount),
            maximum_rpc_payload_size: Some(settings.maximum_rpc_payload_size),
            mirror_gateway_host: settings.mirror_gateway_host.clone(),
            mirror_gateway_port: Some(settings.mirror_gateway_port),
            force_ip4_mirror: Some(settings.force_ip4_mirror),
            mirror_url_override: settings.mirror_url_override.clone(),
            verbose: Some(settings.verbose),
            num_files_processed_per_batch: Some(settings.num_files_processed_per_batch),
            ignore_orphans: Some(settings.ignore_orphans),
            confirmation_poll_interval_secs: Some(settings.confirmation_poll_interval.as_secs()),
        }
    }
}

/// Fully resolved settings for a single operation.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    /// DataLayer RPC endpoint
    pub datalayer_host: Url,
    /// Wallet RPC endpoint
    pub wallet_host: Url,
    /// Directory holding the node's `ssl` tree (client certificates)
    pub certificate_folder_path: PathBuf,
    pub default_wallet_id: u32,
    /// Fee in mojos attached to every store mutation and mirror registration
    pub default_fee: u64,
    pub default_mirror_coin_amount: u64,
    /// Hard ceiling on the serialized changelist of a single RPC call
    pub maximum_rpc_payload_size: u64,
    /// Host advertised for current-host mirrors; detected when unset
    pub mirror_gateway_host: Option<String>,
    pub mirror_gateway_port: u16,
    pub force_ip4_mirror: bool,
    pub mirror_url_override: Option<String>,
    pub verbose: bool,
    pub num_files_processed_per_batch: usize,
    pub ignore_orphans: bool,
    pub confirmation_poll_interval: Duration,
}

fn default_certificate_folder_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_default()
        .join(".chia")
        .join("mainnet")
        .join("config")
        .join("ssl")
}

fn parse_url(field: &'static str, value: &str) -> Result<Url, SettingsError> {
    Url::parse(value).map_err(|e| SettingsError::InvalidUrl {
        field,
        reason: e.to_string(),
    })
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            datalayer_host: Url::parse(DEFAULT_DATALAYER_HOST).expect("default url must parse"),
            wallet_host: Url::parse(DEFAULT_WALLET_HOST).expect("default url must parse"),
            certificate_folder_path: default_certificate_folder_path(),
            default_wallet_id: 1,
            default_fee: DEFAULT_FEE,
            default_mirror_coin_amount: DEFAULT_MIRROR_COIN_AMOUNT,
            maximum_rpc_payload_size: DEFAULT_MAXIMUM_RPC_PAYLOAD_SIZE,
            mirror_gateway_host: None,
            mirror_gateway_port: DEFAULT_MIRROR_GATEWAY_PORT,
            force_ip4_mirror: false,
            mirror_url_override: None,
            verbose: false,
            num_files_processed_per_batch: DEFAULT_FILES_PER_BATCH,
            ignore_orphans: false,
            confirmation_poll_interval: DEFAULT_CONFIRMATION_POLL_INTERVAL,
        }
    }
}

impl Settings {
    /// Resolve options over the defaults.
    pub fn from_options(options: &Options) -> Result<Self, SettingsError> {
        let defaults = Self::default();
        let options = options.clone();

        let datalayer_host = match options.datalayer_host {
            Some(host) => parse_url("datalayer_host", &host)?,
            None => defaults.datalayer_host,
        };
        let wallet_host = match options.wallet_host {
            Some(host) => parse_url("wallet_host", &host)?,
            None => defaults.wallet_host,
        };

        let settings = Self {
            datalayer_host,
            wallet_host,
            certificate_folder_path: options
                .certificate_folder_path
                .unwrap_or(defaults.certificate_folder_path),
            default_wallet_id: options
                .default_wallet_id
                .unwrap_or(defaults.default_wallet_id),
            default_fee: options.default_fee.unwrap_or(defaults.default_fee),
            default_mirror_coin_amount: options
                .default_mirror_coin_amount
                .unwrap_or(defaults.default_mirror_coin_amount),
            maximum_rpc_payload_size: options
                .maximum_rpc_payload_size
                .unwrap_or(defaults.maximum_rpc_payload_size),
            mirror_gateway_host: options.mirror_gateway_host.or(defaults.mirror_gateway_host),
            mirror_gateway_port: options
                .mirror_gateway_port
                .unwrap_or(defaults.mirror_gateway_port),
            force_ip4_mirror: options
                .force_ip4_mirror
                .unwrap_or(defaults.force_ip4_mirror),
            mirror_url_override: options
                .mirror_url_override
                .filter(|url| !url.is_empty())
                .or(defaults.mirror_url_override),
            verbose: options.verbose.unwrap_or(defaults.verbose),
            num_files_processed_per_batch: options
                .num_files_processed_per_batch
                .unwrap_or(defaults.num_files_processed_per_batch)
                .max(1),
            ignore_orphans: options.ignore_orphans.unwrap_or(defaults.ignore_orphans),
            confirmation_poll_interval: options
                .confirmation_poll_interval_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.confirmation_poll_interval),
        };

        Ok(settings)
    }

    /// Raw bytes per multipart chunk.
    ///
    /// Hex doubles every byte, so half the ceiling minus a MiB of headroom for
    /// the RPC envelope keeps a single encoded part under the ceiling.
    pub fn chunk_size(&self) -> Result<u64, SettingsError> {
        match (self.maximum_rpc_payload_size / 2).checked_sub(MIB) {
            Some(size) if size > 0 => Ok(size),
            _ => Err(SettingsError::PayloadCeilingTooSmall(
                self.maximum_rpc_payload_size,
            )),
        }
    }
}
