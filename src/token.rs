use std::fmt;

use crate::authenticator::TokenResponse;
use crate::request::OutputFormat;
use crate::store::CredentialRecord;

pub type AccessToken = String;

const DEFAULT_TOKEN_TYPE: &str = "Bearer";

/// Tokens returned by a successful token endpoint exchange.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenSet {
    pub access_token: AccessToken,
    pub refresh_token: Option<String>,
    pub token_type: String,
}

impl From<TokenResponse> for TokenSet {
    fn from(response: TokenResponse) -> Self {
        Self {
            access_token: response.access_token,
            refresh_token: response.refresh_token.filter(|t| !t.is_empty()),
            token_type: response.token_type,
        }
    }
}

/// Token type rendered with canonical header capitalization (`bearer` -> `Bearer`).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TokenType<'a>(&'a str);

impl<'a> From<&'a str> for TokenType<'a> {
    fn from(value: &'a str) -> Self {
        TokenType(value)
    }
}

impl fmt::Display for TokenType<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return write!(f, "{DEFAULT_TOKEN_TYPE}");
        }
        // Tokens with characters outside the header token alphabet are left untouched.
        if self.0.contains(|c: char| c.is_ascii_whitespace() || !c.is_ascii()) {
            return write!(f, "{}", self.0);
        }
        let mut upper = true;
        for c in self.0.chars() {
            let c = if upper {
                c.to_ascii_uppercase()
            } else {
                c.to_ascii_lowercase()
            };
            upper = c == '-';
            write!(f, "{c}")?;
        }
        Ok(())
    }
}

/// Formats the record's access token as requested by the caller.
pub fn format_credential(record: &CredentialRecord, output: OutputFormat) -> String {
    match output {
        OutputFormat::Token => record.access_token.clone(),
        OutputFormat::Header => format!(
            "Authorization: {} {}",
            TokenType::from(record.token_type.as_str()),
            record.access_token
        ),
    }
}
