use http::header::{ACCEPT, CONTENT_TYPE};
use http::{Request, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::form_urlencoded;

use crate::http_client::{HttpClient, HttpClientError};
use crate::token::AccessToken;

/// Scope requested on every grant.
pub const OPENID_SCOPE: &str = "openid";

#[derive(Error, Debug)]
pub enum AuthenticateError {
    #[error("unable to build request: `{0}`")]
    RequestError(String),
    #[error("unable to deserialize token: `{0}`")]
    DeserializeError(String),
    #[error("identity server error: Status code: `{0}`, Reason: `{1}`")]
    HttpResponseError(u16, String),
    #[error("http transport error: `{0}`")]
    HttpTransportError(String),
    #[error("token request cancelled")]
    Cancelled,
}

impl From<HttpClientError> for AuthenticateError {
    fn from(value: HttpClientError) -> Self {
        match value {
            HttpClientError::Cancelled => AuthenticateError::Cancelled,
            HttpClientError::UnsuccessfulResponse(code, reason) => {
                AuthenticateError::HttpResponseError(code, reason)
            }
            e => AuthenticateError::HttpTransportError(e.to_string()),
        }
    }
}

/// Exchanges a grant for tokens at the identity provider's token endpoint.
pub trait Authenticator {
    fn authenticate(&self, req: ExchangeRequest) -> Result<TokenResponse, AuthenticateError>;
}

/// Token endpoint client posting form encoded grants.
#[derive(Debug, Clone)]
pub struct HttpAuthenticator<C> {
    http_client: C,
}

impl<C> HttpAuthenticator<C> {
    pub fn new(http_client: C) -> Self {
        Self { http_client }
    }
}

impl<C> Authenticator for HttpAuthenticator<C>
where
    C: HttpClient,
{
    /// Executes a POST request to the token endpoint with the grant as a form body.
    fn authenticate(&self, req: ExchangeRequest) -> Result<TokenResponse, AuthenticateError> {
        let request = http::Request::builder()
            .uri(req.token_url.as_str())
            .method("POST")
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .header(ACCEPT, "application/json")
            .body(req.form_body().into_bytes())
            .map_err(|e| AuthenticateError::RequestError(e.to_string()))?;

        let response = self.http_client.send(request)?;
        evaluate_response(response)
    }
}

fn evaluate_response(
    response: http::Response<Vec<u8>>,
) -> Result<TokenResponse, AuthenticateError> {
    let body = response.body();
    if response.status() != StatusCode::OK {
        return Err(AuthenticateError::HttpResponseError(
            response.status().as_u16(),
            String::from_utf8_lossy(body).to_string(),
        ));
    }

    serde_json::from_slice(body).map_err(|e| AuthenticateError::DeserializeError(e.to_string()))
}

/// Credential exchanged for tokens.
#[derive(Clone, PartialEq)]
pub enum Grant {
    Password { username: String, password: String },
    AuthorizationCode { code: String, redirect_uri: String },
    RefreshToken { refresh_token: String },
}

impl Grant {
    fn grant_type(&self) -> &'static str {
        match self {
            Grant::Password { .. } => "password",
            Grant::AuthorizationCode { .. } => "authorization_code",
            Grant::RefreshToken { .. } => "refresh_token",
        }
    }
}

impl std::fmt::Debug for Grant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Grant::Password { username, .. } => f
                .debug_struct("Password")
                .field("username", username)
                .finish_non_exhaustive(),
            Grant::AuthorizationCode { redirect_uri, .. } => f
                .debug_struct("AuthorizationCode")
                .field("redirect_uri", redirect_uri)
                .finish_non_exhaustive(),
            Grant::RefreshToken { .. } => f.debug_struct("RefreshToken").finish_non_exhaustive(),
        }
    }
}

/// A token endpoint request: where to send it, the client identity, and the grant.
#[derive(Clone, PartialEq)]
pub struct ExchangeRequest {
    pub token_url: String,
    pub client_id: String,
    pub client_secret: Option<String>,
    pub grant: Grant,
}

impl ExchangeRequest {
    fn form_body(&self) -> String {
        let mut form = form_urlencoded::Serializer::new(String::new());
        form.append_pair("grant_type", self.grant.grant_type());
        form.append_pair("client_id", &self.client_id);
        if let Some(secret) = &self.client_secret {
            form.append_pair("client_secret", secret);
        }
        match &self.grant {
            Grant::Password { username, password } => {
                form.append_pair("username", username);
                form.append_pair("password", password);
                form.append_pair("scope", OPENID_SCOPE);
            }
            Grant::AuthorizationCode { code, redirect_uri } => {
                form.append_pair("code", code);
                form.append_pair("redirect_uri", redirect_uri);
            }
            Grant::RefreshToken { refresh_token } => {
                form.append_pair("refresh_token", refresh_token);
            }
        }
        form.finish()
    }
}

impl std::fmt::Debug for ExchangeRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExchangeRequest")
            .field("token_url", &self.token_url)
            .field("client_id", &self.client_id)
            .field("client_secret", &self.client_secret.as_ref().map(|_| "<hidden>"))
            .field("grant", &self.grant)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct TokenResponse {
    pub access_token: AccessToken,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub token_type: String,
    /// The lifetime in seconds of the access token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<u64>,
}

#[cfg(test)]
pub mod test {
    use assert_matches::assert_matches;
    use httpmock::{Method::POST, MockServer};
    use mockall::mock;

    use super::*;
    use crate::http::client::HttpClient as ReqwestHttpClient;
    use crate::http::config::HttpConfig;
    use crate::http_client::tests::MockHttpClient;

    mock! {
        pub AuthenticatorMock {}

        impl Authenticator for AuthenticatorMock
        {
            fn authenticate(&self, req: ExchangeRequest) -> Result<TokenResponse, AuthenticateError>;
        }
    }

    fn http_authenticator() -> HttpAuthenticator<ReqwestHttpClient> {
        HttpAuthenticator::new(ReqwestHttpClient::new(HttpConfig::default()).unwrap())
    }

    fn exchange_request(token_url: String, grant: Grant) -> ExchangeRequest {
        ExchangeRequest {
            token_url,
            client_id: "took".to_string(),
            client_secret: Some("s3cr3t".to_string()),
            grant,
        }
    }

    fn fake_response() -> TokenResponse {
        TokenResponse {
            access_token: "fake_access".to_string(),
            refresh_token: Some("fake_refresh".to_string()),
            token_type: "bearer".to_string(),
            expires_in: Some(300),
        }
    }

    #[test]
    fn password_grant_succeeds() {
        let token_path = "/realms/r/protocol/openid-connect/token";
        let identity_server = MockServer::start();
        let mock = identity_server.mock(|when, then| {
            when.method(POST)
                .path(token_path)
                .header("content-type", "application/x-www-form-urlencoded")
                .body_contains("grant_type=password")
                .body_contains("username=alice")
                .body_contains("password=p%40ss+word")
                .body_contains("client_id=took")
                .body_contains("client_secret=s3cr3t")
                .body_contains("scope=openid");
            then.status(200)
                .json_body(serde_json::to_value(fake_response()).unwrap());
        });

        let response = http_authenticator()
            .authenticate(exchange_request(
                identity_server.url(token_path),
                Grant::Password {
                    username: "alice".to_string(),
                    password: "p@ss word".to_string(),
                },
            ))
            .unwrap();

        assert_eq!(response, fake_response());
        mock.assert();
    }

    #[test]
    fn authorization_code_grant_sends_code_and_redirect() {
        let identity_server = MockServer::start();
        let mock = identity_server.mock(|when, then| {
            when.method(POST)
                .path("/token")
                .body_contains("grant_type=authorization_code")
                .body_contains("code=the-code")
                .body_contains("redirect_uri=https%3A%2F%2Fapp.example%2Fcb");
            then.status(200)
                .json_body(serde_json::json!({"access_token": "a", "token_type": "bearer"}));
        });

        let response = http_authenticator()
            .authenticate(exchange_request(
                identity_server.url("/token"),
                Grant::AuthorizationCode {
                    code: "the-code".to_string(),
                    redirect_uri: "https://app.example/cb".to_string(),
                },
            ))
            .unwrap();

        assert_eq!(response.access_token, "a");
        assert_eq!(response.refresh_token, None);
        mock.assert();
    }

    #[test]
    fn deserialize_error() {
        let identity_server = MockServer::start();
        let mock = identity_server.mock(|when, then| {
            when.method(POST).path("/token");
            then.status(200)
                .body("this body should fail to be deserialized as TokenResponse");
        });

        let error = http_authenticator()
            .authenticate(exchange_request(
                identity_server.url("/token"),
                Grant::RefreshToken {
                    refresh_token: "r".to_string(),
                },
            ))
            .unwrap_err();

        assert_matches!(error, AuthenticateError::DeserializeError(_));
        mock.assert();
    }

    #[test]
    fn server_response_error() {
        let identity_server = MockServer::start();
        let mock = identity_server.mock(|when, then| {
            when.method(POST).path("/token");
            then.status(401).body(r#"{"error":"invalid_grant"}"#);
        });

        let error = http_authenticator()
            .authenticate(exchange_request(
                identity_server.url("/token"),
                Grant::RefreshToken {
                    refresh_token: "r".to_string(),
                },
            ))
            .unwrap_err();

        assert_matches!(error, AuthenticateError::HttpResponseError(401, body) => {
            assert!(body.contains("invalid_grant"));
        });
        mock.assert();
    }

    #[test]
    fn cancelled_transport_is_reported_as_cancelled() {
        let mut http_client = MockHttpClient::new();
        http_client
            .expect_send()
            .once()
            .returning(|_| Err(HttpClientError::Cancelled));

        let error = HttpAuthenticator::new(http_client)
            .authenticate(exchange_request(
                "https://idp.example/token".to_string(),
                Grant::RefreshToken {
                    refresh_token: "r".to_string(),
                },
            ))
            .unwrap_err();

        assert_matches!(error, AuthenticateError::Cancelled);
    }

    #[test]
    fn debug_output_hides_secrets() {
        let request = exchange_request(
            "https://idp.example/token".to_string(),
            Grant::Password {
                username: "alice".to_string(),
                password: "hunter2".to_string(),
            },
        );

        let debug = format!("{request:?}");

        assert!(!debug.contains("hunter2"));
        assert!(!debug.contains("s3cr3t"));
        assert!(debug.contains("alice"));
    }
}
