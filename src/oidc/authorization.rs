use url::Url;
use uuid::Uuid;

use crate::GetTokenError;
use crate::authenticator::OPENID_SCOPE;

/// Random value binding a redirect to the authorization request that caused it.
pub fn new_state() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Authorization endpoint url the operator (or the form automation) has to visit.
pub fn authorization_url(auth_url: &Url, client_id: &str, redirect_uri: &str, state: &str) -> Url {
    let mut url = auth_url.clone();
    url.query_pairs_mut()
        .append_pair("response_type", "code")
        .append_pair("client_id", client_id)
        .append_pair("redirect_uri", redirect_uri)
        .append_pair("scope", OPENID_SCOPE)
        .append_pair("state", state)
        .append_pair("access_type", "online");
    url
}

fn query_param(url: &Url, name: &str) -> Option<String> {
    url.query_pairs()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.into_owned())
}

/// Extracts the authorization code from the provider redirect.
///
/// The `state` parameter must equal `expected_state`; nothing else in the redirect is looked at
/// otherwise.
pub fn authorization_code(redirect: &Url, expected_state: &str) -> Result<String, GetTokenError> {
    if query_param(redirect, "state").as_deref() != Some(expected_state) {
        return Err(GetTokenError::StateMismatch);
    }
    if let Some(error) = query_param(redirect, "error") {
        let description = query_param(redirect, "error_description").unwrap_or_default();
        return Err(GetTokenError::InvalidRedirect(format!(
            "provider returned `{error}` {description}"
        )));
    }
    query_param(redirect, "code")
        .filter(|code| !code.is_empty())
        .ok_or_else(|| GetTokenError::InvalidRedirect("missing authorization code".to_string()))
}

/// True if the url carries an authorization code.
pub fn has_code(url: &Url) -> bool {
    query_param(url, "code").is_some()
}
