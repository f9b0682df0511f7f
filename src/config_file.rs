//! The JSON file holding protocol defaults, remotes and their stored credentials.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::config::ProtocolConfig;
use crate::http::config::{HttpConfig, ProxyConfig, ProxyError};
use crate::store::CredentialStore;

/// Environment variable overriding the configuration file location.
pub const CONFIG_ENV_NAME: &str = "TOOK_CONFIG";
const CONFIG_FILE_NAME: &str = ".took.json";

#[derive(Error, Debug)]
pub enum ConfigFileError {
    #[error("reading `{0}`: `{1}`")]
    Read(PathBuf, io::Error),
    #[error("writing `{0}`: `{1}`")]
    Write(PathBuf, io::Error),
    #[error("invalid configuration in `{0}`: `{1}`")]
    Parse(PathBuf, serde_json::Error),
    #[error("serializing configuration: `{0}`")]
    Serialize(#[from] serde_json::Error),
}

/// A named identity provider account.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Remote {
    pub protocol: String,
    pub config: ProtocolConfig,
    pub data: CredentialStore,
}

/// Transport settings shared by every remote.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct HttpSettings {
    /// Falls back to `HTTPS_PROXY`/`HTTP_PROXY` when unset.
    pub proxy: Option<String>,
    pub ca_bundle_file: Option<PathBuf>,
    pub ca_bundle_dir: Option<PathBuf>,
    pub timeout_seconds: Option<u64>,
    pub connect_timeout_seconds: Option<u64>,
}

impl HttpSettings {
    pub fn http_config(&self) -> Result<HttpConfig, ProxyError> {
        let proxy = ProxyConfig::new(
            self.proxy.as_deref().unwrap_or_default(),
            self.ca_bundle_dir.clone(),
            self.ca_bundle_file.clone(),
        )?
        .try_with_url_from_env()?;

        let mut config = HttpConfig::new(proxy);
        if let Some(seconds) = self.timeout_seconds {
            config = config.with_timeout(Duration::from_secs(seconds));
        }
        if let Some(seconds) = self.connect_timeout_seconds {
            config = config.with_conn_timeout(Duration::from_secs(seconds));
        }
        Ok(config)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TookConfig {
    pub http: HttpSettings,
    /// Defaults per protocol name, applied under every remote of that protocol.
    pub defaults: BTreeMap<String, ProtocolConfig>,
    pub remotes: BTreeMap<String, Remote>,
}

impl TookConfig {
    /// Loads the file at `path`. A missing file is an empty configuration.
    pub fn load(path: &Path) -> Result<Self, ConfigFileError> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("no configuration at {}, starting empty", path.display());
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigFileError::Read(path.to_path_buf(), e)),
        };
        serde_json::from_str(&content).map_err(|e| ConfigFileError::Parse(path.to_path_buf(), e))
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigFileError> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content).map_err(|e| ConfigFileError::Write(path.to_path_buf(), e))?;
        debug!("configuration written to {}", path.display());
        Ok(())
    }
}

/// `$HOME/.took.json`, or the working directory when there is no home.
pub fn default_path() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_default()
        .join(CONFIG_FILE_NAME)
}
