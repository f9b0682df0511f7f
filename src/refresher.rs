use thiserror::Error;
use tracing::debug;

use crate::authenticator::{AuthenticateError, Authenticator, ExchangeRequest, Grant};
use crate::token::TokenSet;

/// A refresh that did not produce new tokens. Callers decide whether it is fatal.
#[derive(Error, Debug)]
pub enum RefreshError {
    #[error("refreshing token: `{0}`")]
    Rejected(#[from] AuthenticateError),
}

impl RefreshError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, RefreshError::Rejected(AuthenticateError::Cancelled))
    }
}

/// Client identity presented to the token endpoint.
#[derive(Debug, Clone, Copy)]
pub struct ClientCredentials<'a> {
    pub client_id: &'a str,
    pub client_secret: Option<&'a str>,
}

/// Exchanges `refresh_token` for a new access/refresh pair with exactly one token endpoint call.
pub fn refresh<A: Authenticator>(
    authenticator: &A,
    client: ClientCredentials<'_>,
    refresh_token: &str,
    token_url: &str,
) -> Result<TokenSet, RefreshError> {
    let request = ExchangeRequest {
        token_url: token_url.to_string(),
        client_id: client.client_id.to_string(),
        client_secret: client.client_secret.map(str::to_string),
        grant: Grant::RefreshToken {
            refresh_token: refresh_token.to_string(),
        },
    };

    let response = authenticator.authenticate(request)?;
    debug!("access token refreshed");
    Ok(TokenSet::from(response))
}
