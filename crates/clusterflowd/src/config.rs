//! clusterflowd.kdl の読み込み
//!
//! ```kdl
//! listen "0.0.0.0:32418"
//! providers {
//!     aws enabled=#false
//!     sakura enabled=#true
//!     docker enabled=#true
//! }
//! reconciler {
//!     sweep-interval-secs 30
//!     max-attempts 3
//!     initial-delay-ms 1000
//!     max-delay-secs 30
//!     backoff-multiplier 2.0
//!     teardown-on-success #true
//!     teardown-on-failure #false
//!     retention-secs 3600
//! }
//! ```
//!
//! Unknown nodes are skipped; malformed values are errors.

use clusterflow_cloud::ProviderKind;
use clusterflow_controlplane::{ProviderToggles, ReconcilerConfig};
use kdl::{KdlDocument, KdlNode, KdlValue};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_LISTEN: &str = "0.0.0.0:32418";

/// Upper bound for intervals and delays given in seconds (one day)
const MAX_INTERVAL_SECS: u64 = 24 * 60 * 60;

/// Upper bound for `retention-secs` (one year)
const MAX_RETENTION_SECS: u64 = 365 * MAX_INTERVAL_SECS;

const MAX_ATTEMPTS: u64 = 100;

/// File name looked up under `<config_dir>/clusterflow/`
pub const CONFIG_FILE_NAME: &str = "clusterflowd.kdl";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("設定ファイルが見つかりません: {0}")]
    NotFound(PathBuf),

    #[error("KDL パースエラー: {0}")]
    KdlParse(#[from] kdl::KdlError),

    #[error("不正な設定値: {0}")]
    Invalid(String),

    #[error("IO エラー: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, Clone)]
pub struct DaemonConfig {
    pub listen: SocketAddr,
    pub providers: ProviderToggles,
    pub reconciler: ReconcilerConfig,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            listen: SocketAddr::from(([0, 0, 0, 0], 32418)),
            providers: ProviderToggles::default(),
            reconciler: ReconcilerConfig::default(),
        }
    }
}

/// 設定ファイルのパスを決定
///
/// 1. `--config` (clap 経由で CLUSTERFLOW_CONFIG も含む)
/// 2. <config_dir>/clusterflow/clusterflowd.kdl
///
/// `None` は組み込みのデフォルトを使うことを意味する
pub fn resolve_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }

    let global = dirs::config_dir()?.join("clusterflow").join(CONFIG_FILE_NAME);
    global.exists().then_some(global)
}

/// 設定を読み込む。使ったファイルのパスも返す
pub fn load(explicit: Option<&Path>) -> Result<(DaemonConfig, Option<PathBuf>)> {
    match resolve_config_path(explicit) {
        Some(path) => {
            if !path.exists() {
                return Err(ConfigError::NotFound(path));
            }
            let config = parse_config_file(&path)?;
            Ok((config, Some(path)))
        }
        None => Ok((DaemonConfig::default(), None)),
    }
}

pub fn parse_config_file(path: &Path) -> Result<DaemonConfig> {
    let content = std::fs::read_to_string(path)?;
    parse_config(&content)
}

pub fn parse_config(content: &str) -> Result<DaemonConfig> {
    let doc: KdlDocument = content.parse()?;
    let mut config = DaemonConfig::default();

    for node in doc.nodes() {
        match node.name().value() {
            "listen" => {
                let addr = string_arg(node)?;
                config.listen = addr.parse().map_err(|_| {
                    ConfigError::Invalid(format!("listen '{}' はアドレスではありません", addr))
                })?;
            }
            "providers" => {
                if let Some(children) = node.children() {
                    parse_providers(children, &mut config.providers)?;
                }
            }
            "reconciler" => {
                if let Some(children) = node.children() {
                    parse_reconciler(children, &mut config.reconciler)?;
                }
            }
            other => {
                tracing::debug!(node = other, "Unknown config node skipped");
            }
        }
    }

    Ok(config)
}

fn parse_providers(doc: &KdlDocument, toggles: &mut ProviderToggles) -> Result<()> {
    for node in doc.nodes() {
        let name = node.name().value();
        let Ok(kind) = name.parse::<ProviderKind>() else {
            tracing::debug!(provider = name, "Unknown provider skipped");
            continue;
        };

        for entry in node.entries() {
            if entry.name().map(|n| n.value()) == Some("enabled") {
                let enabled = entry.value().as_bool().ok_or_else(|| {
                    ConfigError::Invalid(format!("{} の enabled は #true / #false で指定してください", name))
                })?;
                toggles.set(kind, enabled);
            }
        }
    }
    Ok(())
}

fn parse_reconciler(doc: &KdlDocument, config: &mut ReconcilerConfig) -> Result<()> {
    for node in doc.nodes() {
        match node.name().value() {
            "sweep-interval-secs" => {
                config.sweep_interval = Duration::from_secs(int_arg(node, 1, MAX_INTERVAL_SECS)?);
            }
            "max-attempts" => {
                config.retry.max_attempts = u32::try_from(int_arg(node, 1, MAX_ATTEMPTS)?)
                    .map_err(|_| ConfigError::Invalid("max-attempts が大きすぎます".to_string()))?;
            }
            "initial-delay-ms" => {
                config.retry.initial_delay =
                    Duration::from_millis(int_arg(node, 0, MAX_INTERVAL_SECS * 1000)?);
            }
            "max-delay-secs" => {
                config.retry.max_delay = Duration::from_secs(int_arg(node, 1, MAX_INTERVAL_SECS)?);
            }
            "backoff-multiplier" => {
                config.retry.backoff_multiplier = float_arg(node, 1.0)?;
            }
            "teardown-on-success" => config.policy.on_success = bool_arg(node)?,
            "teardown-on-failure" => config.policy.on_failure = bool_arg(node)?,
            "retention-secs" => {
                config.retention = match first_value(node)? {
                    KdlValue::Null => None,
                    _ => Some(Duration::from_secs(int_arg(node, 0, MAX_RETENTION_SECS)?)),
                };
            }
            other => {
                tracing::debug!(node = other, "Unknown reconciler setting skipped");
            }
        }
    }
    Ok(())
}

fn first_value(node: &KdlNode) -> Result<&KdlValue> {
    node.entries()
        .iter()
        .find(|e| e.name().is_none())
        .map(|e| e.value())
        .ok_or_else(|| ConfigError::Invalid(format!("{} に値がありません", node.name().value())))
}

fn string_arg(node: &KdlNode) -> Result<&str> {
    first_value(node)?.as_string().ok_or_else(|| {
        ConfigError::Invalid(format!("{} は文字列で指定してください", node.name().value()))
    })
}

fn int_arg(node: &KdlNode, min: u64, max: u64) -> Result<u64> {
    let name = node.name().value();
    let value = first_value(node)?
        .as_integer()
        .ok_or_else(|| ConfigError::Invalid(format!("{} は整数で指定してください", name)))?;

    u64::try_from(value)
        .ok()
        .filter(|v| (min..=max).contains(v))
        .ok_or_else(|| {
            ConfigError::Invalid(format!("{} は {} 以上 {} 以下で指定してください", name, min, max))
        })
}

fn float_arg(node: &KdlNode, min: f64) -> Result<f64> {
    let name = node.name().value();
    let value = match first_value(node)? {
        KdlValue::Float(f) => *f,
        KdlValue::Integer(i) => *i as f64,
        _ => {
            return Err(ConfigError::Invalid(format!("{} は数値で指定してください", name)));
        }
    };
    if value.is_finite() && value >= min {
        Ok(value)
    } else {
        Err(ConfigError::Invalid(format!("{} は {} 以上で指定してください", name, min)))
    }
}

fn bool_arg(node: &KdlNode) -> Result<bool> {
    first_value(node)?.as_bool().ok_or_else(|| {
        ConfigError::Invalid(format!("{} は #true / #false で指定してください", node.name().value()))
    })
}
