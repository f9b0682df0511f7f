pub mod authenticator;
pub mod commands;
pub mod config;
pub mod config_file;
pub mod http;
pub mod http_client;
pub mod jwt;
pub mod oidc;
pub mod parameters;
pub mod prompt;
pub mod refresher;
pub mod registry;
pub mod request;
pub mod store;
pub mod token;

use std::io;

use thiserror::Error;

use crate::authenticator::AuthenticateError;
use crate::config::ProtocolConfig;
use crate::jwt::discovery::DiscoveryError;
use crate::jwt::validator::ValidateError;
use crate::request::TokenRequest;
use crate::store::CredentialStore;

/// Errors that abort a token request. Recoverable failures such as a rejected refresh or a
/// failed form automation are handled inside the protocol and never surface here.
#[derive(Error, Debug)]
pub enum GetTokenError {
    #[error("a username is required: none given and no previous user stored")]
    MissingUsername,
    #[error("missing configuration value `{0}`")]
    MissingConfig(&'static str),
    #[error("invalid configuration value `{0}`: `{1}`")]
    InvalidConfig(&'static str, String),
    #[error("identity provider unreachable: `{0}`")]
    ProviderUnreachable(String),
    #[error("redirect state does not match the authorization request")]
    StateMismatch,
    #[error("invalid redirect url: `{0}`")]
    InvalidRedirect(String),
    #[error("token exchange failed: `{0}`")]
    ExchangeFailed(String),
    #[error("reading operator input: `{0}`")]
    Prompt(#[from] io::Error),
    #[error("token request cancelled")]
    Cancelled,
}

/// What a caller can do about a failed request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Fix the request or the configuration.
    Input,
    /// Try again.
    Retryable,
    /// The identity provider refused or could not be reached.
    Provider,
    /// The flow was tampered with.
    Security,
}

impl GetTokenError {
    pub fn class(&self) -> ErrorClass {
        match self {
            GetTokenError::MissingUsername
            | GetTokenError::MissingConfig(_)
            | GetTokenError::InvalidConfig(..)
            | GetTokenError::InvalidRedirect(_)
            | GetTokenError::Prompt(_) => ErrorClass::Input,
            GetTokenError::Cancelled => ErrorClass::Retryable,
            GetTokenError::ProviderUnreachable(_) | GetTokenError::ExchangeFailed(_) => {
                ErrorClass::Provider
            }
            GetTokenError::StateMismatch => ErrorClass::Security,
        }
    }
}

impl From<ValidateError> for GetTokenError {
    fn from(err: ValidateError) -> Self {
        match err {
            ValidateError::ProviderUnreachable(_, DiscoveryError::Cancelled) => {
                GetTokenError::Cancelled
            }
            e => GetTokenError::ProviderUnreachable(e.to_string()),
        }
    }
}

impl From<AuthenticateError> for GetTokenError {
    fn from(err: AuthenticateError) -> Self {
        match err {
            AuthenticateError::Cancelled => GetTokenError::Cancelled,
            e => GetTokenError::ExchangeFailed(e.to_string()),
        }
    }
}

/// An authentication scheme able to produce credentials.
///
/// Configuration and credential store are populated by the caller before [`Protocol::get_token`]
/// and read back afterwards for persistence.
pub trait Protocol {
    fn config_mut(&mut self) -> &mut ProtocolConfig;
    fn defaults_mut(&mut self) -> &mut ProtocolConfig;
    fn store_mut(&mut self) -> &mut CredentialStore;
    fn store(&self) -> &CredentialStore;

    /// Returns the credential formatted as the request asks, reusing, refreshing or
    /// re-issuing tokens as needed.
    fn get_token(&mut self, request: &TokenRequest) -> Result<String, GetTokenError>;
}
