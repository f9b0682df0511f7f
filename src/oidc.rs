//! OpenID Connect protocol: reuses, refreshes or re-issues tokens for one remote.

pub mod authorization;
pub mod form;

use tracing::{debug, warn};
use url::Url;

use crate::authenticator::{Authenticator, ExchangeRequest, Grant, HttpAuthenticator};
use crate::config::ProtocolConfig;
use crate::http_client::HttpClient;
use crate::jwt::discovery::HttpKeyDiscovery;
use crate::jwt::validator::{JwtValidator, TokenValidator};
use crate::prompt::{Prompter, TerminalPrompter};
use crate::refresher::{self, ClientCredentials};
use crate::registry::ProtocolRegistry;
use crate::request::{RefreshPolicy, TokenRequest};
use crate::store::{CredentialRecord, CredentialStore};
use crate::token::{TokenSet, format_credential};
use crate::{GetTokenError, Protocol};
use self::form::{FormLogin, HttpFormLogin};

/// Names the protocol is registered under.
pub const PROTOCOL_NAMES: [&str; 2] = ["oidc", "oidc-auth"];

/// The protocol wired with the HTTP implementations of every collaborator.
pub type HttpOidcProtocol<C> = OidcProtocol<
    HttpAuthenticator<C>,
    JwtValidator<HttpKeyDiscovery<C>>,
    TerminalPrompter,
    HttpFormLogin<C>,
>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CacheOutcome {
    Valid,
    NeedsRefresh,
    NeedsFullAuth,
}

pub struct OidcProtocol<A, V, P, F> {
    config: ProtocolConfig,
    defaults: ProtocolConfig,
    store: CredentialStore,
    authenticator: A,
    validator: V,
    prompter: P,
    form_login: F,
}

impl<A, V, P, F> OidcProtocol<A, V, P, F> {
    pub fn new(authenticator: A, validator: V, prompter: P, form_login: F) -> Self {
        Self {
            config: ProtocolConfig::default(),
            defaults: ProtocolConfig::default(),
            store: CredentialStore::default(),
            authenticator,
            validator,
            prompter,
            form_login,
        }
    }
}

impl<A, V, P, F> OidcProtocol<A, V, P, F>
where
    A: Authenticator,
    V: TokenValidator,
    P: Prompter,
    F: FormLogin,
{
    fn check_cache(
        &self,
        config: &ProtocolConfig,
        record: &CredentialRecord,
        policy: RefreshPolicy,
    ) -> Result<CacheOutcome, GetTokenError> {
        if policy == RefreshPolicy::ForceReauth {
            return Ok(CacheOutcome::NeedsFullAuth);
        }

        let valid = record.has_access_token()
            && self
                .validator
                .is_valid(&record.access_token, config.provider_url()?)?;
        if valid && policy != RefreshPolicy::ForceRefresh {
            return Ok(CacheOutcome::Valid);
        }

        if record.has_refresh_token() {
            Ok(CacheOutcome::NeedsRefresh)
        } else {
            Ok(CacheOutcome::NeedsFullAuth)
        }
    }

    /// `Ok(false)` when the provider did not accept the refresh token.
    fn try_refresh(
        &self,
        config: &ProtocolConfig,
        record: &mut CredentialRecord,
    ) -> Result<bool, GetTokenError> {
        let client = ClientCredentials {
            client_id: config.client_id()?,
            client_secret: config.client_secret(),
        };
        let token_url = config.token_url()?;

        match refresher::refresh(&self.authenticator, client, &record.refresh_token, &token_url) {
            Ok(tokens) => {
                record.update(tokens);
                Ok(true)
            }
            Err(e) if e.is_cancelled() => Err(GetTokenError::Cancelled),
            Err(e) => {
                warn!("refresh failed, authenticating again: {e}");
                Ok(false)
            }
        }
    }

    fn authenticate(
        &self,
        config: &ProtocolConfig,
        username: &str,
        request: &TokenRequest,
    ) -> Result<TokenSet, GetTokenError> {
        let token_url = config.token_url()?;
        let client_id = config.client_id()?;

        let grant = if config.password_grant {
            debug!("authenticating {username} with the password grant");
            Grant::Password {
                username: username.to_string(),
                password: self.password(username, request)?,
            }
        } else {
            debug!("authenticating {username} with the authorization code flow");
            self.authorization_code_grant(config, client_id, username, request)?
        };

        let response = self.authenticator.authenticate(ExchangeRequest {
            token_url,
            client_id: client_id.to_string(),
            client_secret: config.client_secret().map(str::to_string),
            grant,
        })?;
        Ok(TokenSet::from(response))
    }

    fn authorization_code_grant(
        &self,
        config: &ProtocolConfig,
        client_id: &str,
        username: &str,
        request: &TokenRequest,
    ) -> Result<Grant, GetTokenError> {
        let redirect_uri = config.callback_url()?;
        let state = authorization::new_state();
        let auth_url =
            authorization::authorization_url(&config.auth_url()?, client_id, redirect_uri, &state);

        let redirect = match self.automated_redirect(config, &auth_url, username, request)? {
            Some(redirect) => redirect,
            None => self.manual_redirect(&auth_url, username)?,
        };

        Ok(Grant::AuthorizationCode {
            code: authorization::authorization_code(&redirect, &state)?,
            redirect_uri: redirect_uri.to_string(),
        })
    }

    /// `Ok(None)` when no form login is configured or it did not succeed.
    fn automated_redirect(
        &self,
        config: &ProtocolConfig,
        auth_url: &Url,
        username: &str,
        request: &TokenRequest,
    ) -> Result<Option<Url>, GetTokenError> {
        let Some(form) = &config.form else {
            return Ok(None);
        };
        let password = self.password(username, request)?;

        match self.form_login.login(form, auth_url, username, &password) {
            Ok(redirect) => Ok(Some(redirect)),
            Err(e) if e.is_cancelled() => Err(GetTokenError::Cancelled),
            Err(e) => {
                warn!("automated login failed, falling back to manual login: {e}");
                Ok(None)
            }
        }
    }

    fn manual_redirect(&self, auth_url: &Url, username: &str) -> Result<Url, GetTokenError> {
        self.prompter.show(&format!(
            "Go to this URL to authenticate {username}: {auth_url}"
        ));
        let pasted = self
            .prompter
            .prompt_text("After authentication, copy/paste the URL here:")?;
        Url::parse(pasted.trim()).map_err(|e| GetTokenError::InvalidRedirect(e.to_string()))
    }

    fn password(&self, username: &str, request: &TokenRequest) -> Result<String, GetTokenError> {
        match request.password.as_deref().filter(|p| !p.is_empty()) {
            Some(password) => Ok(password.to_string()),
            None => Ok(self
                .prompter
                .prompt_password(&format!("Password for {username}:"))?),
        }
    }
}

impl<A, V, P, F> Protocol for OidcProtocol<A, V, P, F>
where
    A: Authenticator,
    V: TokenValidator,
    P: Prompter,
    F: FormLogin,
{
    fn config_mut(&mut self) -> &mut ProtocolConfig {
        &mut self.config
    }

    fn defaults_mut(&mut self) -> &mut ProtocolConfig {
        &mut self.defaults
    }

    fn store_mut(&mut self) -> &mut CredentialStore {
        &mut self.store
    }

    fn store(&self) -> &CredentialStore {
        &self.store
    }

    fn get_token(&mut self, request: &TokenRequest) -> Result<String, GetTokenError> {
        let username = self.store.resolve_username(request.username.as_deref())?;
        let config = self.config.merge(&self.defaults);
        // Changes are committed to the store only once the request succeeded.
        let mut record = self
            .store
            .find_by_username(&username)
            .cloned()
            .unwrap_or_else(|| CredentialRecord::new(&username));

        let mut outcome = self.check_cache(&config, &record, request.refresh)?;
        debug!("cached credentials of {username}: {outcome:?}");

        if outcome == CacheOutcome::NeedsRefresh && !self.try_refresh(&config, &mut record)? {
            outcome = CacheOutcome::NeedsFullAuth;
        }
        if outcome == CacheOutcome::NeedsFullAuth {
            let tokens = self.authenticate(&config, &username, request)?;
            record.replace(tokens);
        }

        let credential = format_credential(&record, request.output);
        self.store.commit(record);
        Ok(credential)
    }
}

/// Registers the protocol under every [`PROTOCOL_NAMES`] entry. Each resolution gets its own
/// clone of the collaborators.
pub fn register<A, V, P, F>(
    registry: &mut ProtocolRegistry,
    authenticator: A,
    validator: V,
    prompter: P,
    form_login: F,
) where
    A: Authenticator + Clone + 'static,
    V: TokenValidator + Clone + 'static,
    P: Prompter + Clone + 'static,
    F: FormLogin + Clone + 'static,
{
    for name in PROTOCOL_NAMES {
        let (authenticator, validator, prompter, form_login) = (
            authenticator.clone(),
            validator.clone(),
            prompter.clone(),
            form_login.clone(),
        );
        registry.register(name, move || {
            Box::new(OidcProtocol::new(
                authenticator.clone(),
                validator.clone(),
                prompter.clone(),
                form_login.clone(),
            ))
        });
    }
}

/// Registers the protocol with every collaborator going through `http_client`.
pub fn register_http<C>(registry: &mut ProtocolRegistry, http_client: C)
where
    C: HttpClient + Clone + 'static,
{
    register(
        registry,
        HttpAuthenticator::new(http_client.clone()),
        JwtValidator::new(HttpKeyDiscovery::new(http_client.clone())),
        TerminalPrompter,
        HttpFormLogin::new(http_client),
    );
}
