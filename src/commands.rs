pub mod get_token;

use crate::GetTokenError;
use crate::config_file::TookConfig;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CommandError {
    #[error("no remote named `{0}` is configured")]
    UnknownRemote(String),
    #[error("remote `{0}` uses unknown protocol `{1}`")]
    UnknownProtocol(String, String),
    #[error("getting token: `{0}`")]
    GetToken(#[from] GetTokenError),
}

/// One `name (protocol)` line per configured remote, sorted by name.
pub fn list_remotes(config: &TookConfig) -> Vec<String> {
    config
        .remotes
        .iter()
        .map(|(name, remote)| format!("{name} ({})", remote.protocol))
        .collect()
}
