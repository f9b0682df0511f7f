use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Time bound claims checked before trusting an access token.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimeClaims {
    /// Expiration time (as UTC timestamp).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) exp: Option<i64>,
    /// Not before (as UTC timestamp).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) nbf: Option<i64>,
}

#[derive(Error, Debug, PartialEq)]
pub enum ClaimsError {
    #[error("token expired at `{0}`")]
    Expired(i64),
    #[error("token not valid before `{0}`")]
    NotYetValid(i64),
}

impl TimeClaims {
    pub fn new(exp: Option<i64>, nbf: Option<i64>) -> Self {
        Self { exp, nbf }
    }

    /// Checks the claims against `now`, tolerating `leeway` of clock skew on both bounds.
    pub fn validate_at(&self, now: DateTime<Utc>, leeway: TimeDelta) -> Result<(), ClaimsError> {
        let now = now.timestamp();
        let leeway = leeway.num_seconds();
        if let Some(exp) = self.exp {
            if now > exp.saturating_add(leeway) {
                return Err(ClaimsError::Expired(exp));
            }
        }
        if let Some(nbf) = self.nbf {
            if now < nbf.saturating_sub(leeway) {
                return Err(ClaimsError::NotYetValid(nbf));
            }
        }
        Ok(())
    }
}
