use serde::{Deserialize, Serialize};

use crate::GetTokenError;
use crate::token::TokenSet;

/// Tokens obtained for one user.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CredentialRecord {
    pub username: String,
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
}

impl CredentialRecord {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            ..Default::default()
        }
    }

    pub fn has_access_token(&self) -> bool {
        !self.access_token.is_empty()
    }

    pub fn has_refresh_token(&self) -> bool {
        !self.refresh_token.is_empty()
    }

    /// Replaces the token fields with a freshly issued set.
    ///
    /// Providers may omit the refresh token on refresh; the previous one is kept in that case.
    pub fn update(&mut self, tokens: TokenSet) {
        self.access_token = tokens.access_token;
        if let Some(refresh_token) = tokens.refresh_token {
            self.refresh_token = refresh_token;
        }
        self.token_type = tokens.token_type;
    }

    /// Replaces every token field, dropping a previous refresh token the new set does not carry.
    pub fn replace(&mut self, tokens: TokenSet) {
        self.access_token = tokens.access_token;
        self.refresh_token = tokens.refresh_token.unwrap_or_default();
        self.token_type = tokens.token_type;
    }
}

/// Every credential record of one protocol instance plus the last user that authenticated.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CredentialStore {
    pub last_username: Option<String>,
    pub tokens: Vec<CredentialRecord>,
}

impl CredentialStore {
    pub fn find_by_username(&self, username: &str) -> Option<&CredentialRecord> {
        self.tokens.iter().find(|t| t.username == username)
    }

    /// Returns the record for `username`, appending an empty one if needed, and makes it the
    /// last used record.
    pub fn get_or_create(&mut self, username: &str) -> &mut CredentialRecord {
        self.last_username = Some(username.to_string());
        let index = match self.tokens.iter().position(|t| t.username == username) {
            Some(index) => index,
            None => {
                self.tokens.push(CredentialRecord::new(username));
                self.tokens.len() - 1
            }
        };
        &mut self.tokens[index]
    }

    /// The explicit username wins, then the last used one.
    pub fn resolve_username(&self, requested: Option<&str>) -> Result<String, GetTokenError> {
        requested
            .filter(|u| !u.is_empty())
            .or(self.last_username.as_deref().filter(|u| !u.is_empty()))
            .map(str::to_string)
            .ok_or(GetTokenError::MissingUsername)
    }

    /// Stores `record` as the current session, replacing any previous record of the same user.
    pub fn commit(&mut self, record: CredentialRecord) {
        let username = record.username.clone();
        *self.get_or_create(&username) = record;
    }
}
