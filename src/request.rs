/// How cached credentials may be reused.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RefreshPolicy {
    /// Reuse a valid cached token, refresh or re-authenticate otherwise.
    #[default]
    Default,
    /// Refresh even if the cached token is still valid.
    ForceRefresh,
    /// Skip the cache and the refresh token, authenticate from scratch.
    ForceReauth,
}

/// Shape of the returned credential.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// The bare access token.
    #[default]
    Token,
    /// `Authorization: <Type> <token>`
    Header,
}

/// A caller's request for a credential.
#[derive(Clone, Default, PartialEq)]
pub struct TokenRequest {
    /// Falls back to the last user of the store when unset.
    pub username: Option<String>,
    /// Used for the password grant and the form login instead of prompting.
    pub password: Option<String>,
    pub refresh: RefreshPolicy,
    pub output: OutputFormat,
}

impl TokenRequest {
    pub fn for_user(username: impl Into<String>) -> Self {
        Self {
            username: Some(username.into()),
            ..Default::default()
        }
    }

    pub fn with_password(self, password: impl Into<String>) -> Self {
        Self {
            password: Some(password.into()),
            ..self
        }
    }

    pub fn with_refresh(self, refresh: RefreshPolicy) -> Self {
        Self { refresh, ..self }
    }

    pub fn with_output(self, output: OutputFormat) -> Self {
        Self { output, ..self }
    }
}

impl std::fmt::Debug for TokenRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenRequest")
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<hidden>"))
            .field("refresh", &self.refresh)
            .field("output", &self.output)
            .finish()
    }
}
