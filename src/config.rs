//! Per-protocol configuration and the merge of instance settings over protocol defaults.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::GetTokenError;

/// Token endpoint path used when none is configured.
pub const DEFAULT_TOKEN_API: &str = "protocol/openid-connect/token";
/// Authorization endpoint path used when none is configured.
pub const DEFAULT_AUTH_API: &str = "protocol/openid-connect/auth";

/// Endpoint and client settings of one protocol instance.
///
/// `None` means "not configured" and is filled from the protocol defaults by [`ProtocolConfig::merge`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ProtocolConfig {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    /// Identity provider base url, for instance a Keycloak realm url.
    pub url: Option<String>,
    pub callback_url: Option<String>,
    pub token_api: Option<String>,
    pub auth_api: Option<String>,
    /// Use the resource owner password grant instead of the authorization code flow.
    pub password_grant: bool,
    pub form: Option<FormLoginConfig>,
}

/// Describes the login form submitted by the automated authorization code flow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FormLoginConfig {
    /// `id` attribute of the login form. The first form of the page is used when unset.
    pub form_id: Option<String>,
    pub username_field: String,
    pub password_field: String,
    /// Static fields submitted along with the credentials.
    pub extra_fields: BTreeMap<String, String>,
}

impl Default for FormLoginConfig {
    fn default() -> Self {
        Self {
            form_id: None,
            username_field: "username".to_string(),
            password_field: "password".to_string(),
            extra_fields: BTreeMap::new(),
        }
    }
}

impl ProtocolConfig {
    /// Returns the effective configuration: every string field set (and non-empty) in `self` wins,
    /// otherwise the default is used. `password_grant` always comes from `self`, and `form` is
    /// taken as a whole from `self` if present, else from `defaults`.
    pub fn merge(&self, defaults: &ProtocolConfig) -> ProtocolConfig {
        ProtocolConfig {
            client_id: pick(&self.client_id, &defaults.client_id),
            client_secret: pick(&self.client_secret, &defaults.client_secret),
            url: pick(&self.url, &defaults.url),
            callback_url: pick(&self.callback_url, &defaults.callback_url),
            token_api: pick(&self.token_api, &defaults.token_api),
            auth_api: pick(&self.auth_api, &defaults.auth_api),
            password_grant: self.password_grant,
            form: self.form.clone().or_else(|| defaults.form.clone()),
        }
    }

    pub fn provider_url(&self) -> Result<&str, GetTokenError> {
        required(&self.url, "url")
    }

    pub fn client_id(&self) -> Result<&str, GetTokenError> {
        required(&self.client_id, "clientId")
    }

    pub fn client_secret(&self) -> Option<&str> {
        optional(&self.client_secret)
    }

    pub fn callback_url(&self) -> Result<&str, GetTokenError> {
        required(&self.callback_url, "callbackUrl")
    }

    pub fn token_url(&self) -> Result<String, GetTokenError> {
        let api = optional(&self.token_api).unwrap_or(DEFAULT_TOKEN_API);
        Ok(combine(self.provider_url()?, api))
    }

    pub fn auth_url(&self) -> Result<Url, GetTokenError> {
        let api = optional(&self.auth_api).unwrap_or(DEFAULT_AUTH_API);
        let auth_url = combine(self.provider_url()?, api);
        Url::parse(&auth_url).map_err(|e| GetTokenError::InvalidConfig("authApi", e.to_string()))
    }
}

fn pick(value: &Option<String>, default: &Option<String>) -> Option<String> {
    match value {
        Some(v) if !v.is_empty() => Some(v.clone()),
        _ => default.clone(),
    }
}

fn optional(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

fn required<'a>(value: &'a Option<String>, field: &'static str) -> Result<&'a str, GetTokenError> {
    optional(value).ok_or(GetTokenError::MissingConfig(field))
}

/// Joins `base` and `suffix` with exactly one `/` between them.
pub fn combine(base: &str, suffix: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        suffix.trim_start_matches('/')
    )
}
