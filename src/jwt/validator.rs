use chrono::{DateTime, TimeDelta, Utc};
use jsonwebtoken::{Validation, decode, decode_header};
use thiserror::Error;
use tracing::debug;

use super::claims::TimeClaims;
use super::discovery::{DiscoveryError, KeyDiscovery};

/// Clock skew tolerated on `exp` and `nbf`.
pub const DEFAULT_LEEWAY: TimeDelta = TimeDelta::seconds(60);

#[derive(Error, Debug)]
pub enum ValidateError {
    /// Without the provider key no token can be trusted, so this aborts the request.
    #[error("cannot get signing key of `{0}`: `{1}`")]
    ProviderUnreachable(String, DiscoveryError),
}

/// Decides whether an access token can be used as is.
pub trait TokenValidator {
    /// `Ok(false)` for tokens that are malformed, badly signed, expired or not yet valid.
    fn is_valid(&self, access_token: &str, provider_url: &str) -> Result<bool, ValidateError>;
}

/// Validates signed JWTs against the provider key and the current time.
#[derive(Clone)]
pub struct JwtValidator<D> {
    discovery: D,
    leeway: TimeDelta,
    now: fn() -> DateTime<Utc>,
}

impl<D> JwtValidator<D> {
    pub fn new(discovery: D) -> Self {
        Self {
            discovery,
            leeway: DEFAULT_LEEWAY,
            now: Utc::now,
        }
    }

    pub fn with_leeway(self, leeway: TimeDelta) -> Self {
        Self { leeway, ..self }
    }

    pub fn with_clock(self, now: fn() -> DateTime<Utc>) -> Self {
        Self { now, ..self }
    }
}

impl<D> TokenValidator for JwtValidator<D>
where
    D: KeyDiscovery,
{
    fn is_valid(&self, access_token: &str, provider_url: &str) -> Result<bool, ValidateError> {
        if access_token.split('.').count() != 3 {
            debug!("access token is not a signed JWT");
            return Ok(false);
        }
        if let Err(e) = decode_header(access_token) {
            debug!("cannot parse access token: {e}");
            return Ok(false);
        }

        let key = self
            .discovery
            .resolve_key(provider_url)
            .map_err(|e| ValidateError::ProviderUnreachable(provider_url.to_string(), e))?;

        let mut validation = Validation::default();
        validation.algorithms = key.algorithms().to_vec();
        validation.required_spec_claims.clear();
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.validate_aud = false;

        let claims = match decode::<TimeClaims>(access_token, key.decoding_key(), &validation) {
            Ok(data) => data.claims,
            Err(e) => {
                debug!("access token signature rejected: {e}");
                return Ok(false);
            }
        };

        match claims.validate_at((self.now)(), self.leeway) {
            Ok(()) => {
                debug!("access token is valid");
                Ok(true)
            }
            Err(e) => {
                debug!("access token claims rejected: {e}");
                Ok(false)
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::jwt::discovery::ProviderKey;
    use crate::jwt::discovery::tests::MockKeyDiscovery;
    use crate::jwt::test_keys::{RS256_PUBLIC_KEY, sign};
    use assert_matches::assert_matches;
    use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header};
    use mockall::mock;
    use mockall::predicate::eq;
    use serde_json::json;

    const NOW: i64 = 1_700_000_000;
    const PROVIDER: &str = "https://idp.example/realms/test";

    mock! {
        pub TokenValidator {}

        impl TokenValidator for TokenValidator {
            fn is_valid(&self, access_token: &str, provider_url: &str) -> Result<bool, ValidateError>;
        }
    }

    fn fixed_now() -> DateTime<Utc> {
        DateTime::from_timestamp(NOW, 0).unwrap()
    }

    fn provider_key() -> ProviderKey {
        ProviderKey::from_rsa_pem(RS256_PUBLIC_KEY.as_bytes()).unwrap()
    }

    fn validator_with_key() -> JwtValidator<MockKeyDiscovery> {
        let mut discovery = MockKeyDiscovery::new();
        discovery
            .expect_resolve_key()
            .with(eq(PROVIDER))
            .returning(|_| Ok(provider_key()));
        JwtValidator::new(discovery).with_clock(fixed_now)
    }

    #[test]
    fn valid_token() {
        let token = sign(&json!({"sub": "alice", "exp": NOW + 300, "nbf": NOW - 10}));

        assert!(validator_with_key().is_valid(&token, PROVIDER).unwrap());
    }

    #[test]
    fn token_without_time_claims_is_valid() {
        let token = sign(&json!({"sub": "alice", "aud": "account"}));

        assert!(validator_with_key().is_valid(&token, PROVIDER).unwrap());
    }

    #[test]
    fn expired_token() {
        let token = sign(&json!({"exp": NOW - 3600}));

        assert!(!validator_with_key().is_valid(&token, PROVIDER).unwrap());
    }

    #[test]
    fn not_yet_valid_token() {
        let token = sign(&json!({"exp": NOW + 7200, "nbf": NOW + 3600}));

        assert!(!validator_with_key().is_valid(&token, PROVIDER).unwrap());
    }

    #[test]
    fn tampered_signature() {
        let token = sign(&json!({"exp": NOW + 300}));
        let (rest, _signature) = token.rsplit_once('.').unwrap();
        let forged = sign(&json!({"exp": NOW + 99999}));
        let (_, forged_signature) = forged.rsplit_once('.').unwrap();

        let tampered = format!("{rest}.{forged_signature}");

        assert!(!validator_with_key().is_valid(&tampered, PROVIDER).unwrap());
    }

    #[test]
    fn algorithm_not_allowed_by_the_key() {
        let token = jsonwebtoken::encode(
            &Header::new(Algorithm::HS256),
            &json!({"exp": NOW + 300}),
            &EncodingKey::from_secret(b"guessable"),
        )
        .unwrap();

        assert!(!validator_with_key().is_valid(&token, PROVIDER).unwrap());
    }

    #[test]
    fn wrong_key_family_configured() {
        let mut discovery = MockKeyDiscovery::new();
        discovery.expect_resolve_key().returning(|_| {
            Ok(ProviderKey::new(
                DecodingKey::from_secret(b"other"),
                vec![Algorithm::HS256],
            ))
        });
        let token = sign(&json!({"exp": NOW + 300}));

        let validator = JwtValidator::new(discovery).with_clock(fixed_now);

        assert!(!validator.is_valid(&token, PROVIDER).unwrap());
    }

    #[test]
    fn malformed_token_skips_key_lookup() {
        let mut discovery = MockKeyDiscovery::new();
        discovery.expect_resolve_key().never();
        let validator = JwtValidator::new(discovery).with_clock(fixed_now);

        assert!(!validator.is_valid("opaque-token", PROVIDER).unwrap());
        assert!(!validator.is_valid("not.a.jwt", PROVIDER).unwrap());
        assert!(!validator.is_valid("", PROVIDER).unwrap());
    }

    #[test]
    fn unreachable_provider_is_an_error() {
        let mut discovery = MockKeyDiscovery::new();
        discovery.expect_resolve_key().once().returning(|_| {
            Err(DiscoveryError::Transport("Connection refused".to_string()))
        });
        let validator = JwtValidator::new(discovery).with_clock(fixed_now);
        let token = sign(&json!({"exp": NOW + 300}));

        let result = validator.is_valid(&token, PROVIDER);

        assert_matches!(
            result,
            Err(ValidateError::ProviderUnreachable(url, DiscoveryError::Transport(_))) => {
                assert_eq!(url, PROVIDER);
            }
        );
    }

    #[test]
    fn leeway_is_configurable() {
        let token = sign(&json!({"exp": NOW - 30}));

        let strict = validator_with_key().with_leeway(TimeDelta::zero());

        assert!(!strict.is_valid(&token, PROVIDER).unwrap());
        assert!(validator_with_key().is_valid(&token, PROVIDER).unwrap());
    }
}
