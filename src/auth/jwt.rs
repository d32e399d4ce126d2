//! Stateless bearer tokens.
//!
//! Tokens are HS256-signed JWTs carrying the username as `sub` and an `exp`
//! instant. Nothing is stored server-side, so a token stays valid for its full
//! lifetime and there is no revocation.

use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::error::ServiceError;

/// Default token lifetime in minutes.
pub const DEFAULT_TTL_MINS: i64 = 30;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Username of the authenticated user.
    pub sub: String,
    /// Expiration time (UTC Unix timestamp, seconds).
    pub exp: i64,
}

/// Issues and verifies access tokens with one process-wide signing key.
///
/// Cheap to clone; all clones share the same key.
#[derive(Clone)]
pub struct TokenIssuer {
    inner: Arc<Inner>,
}

struct Inner {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl: TimeDelta,
}

impl TokenIssuer {
    pub fn new(secret: &[u8], ttl: TimeDelta) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is checked against an explicit clock in `verify_at`.
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Self {
            inner: Arc::new(Inner {
                encoding: EncodingKey::from_secret(secret),
                decoding: DecodingKey::from_secret(secret),
                validation,
                ttl,
            }),
        }
    }

    /// Builds an issuer around a random key that lives only as long as this
    /// process. Tokens it issues do not survive a restart.
    pub fn ephemeral(ttl: TimeDelta) -> Self {
        let secret = format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple());
        Self::new(secret.as_bytes(), ttl)
    }

    /// Lifetime applied by [`TokenIssuer::issue_default`].
    pub fn ttl(&self) -> TimeDelta {
        self.inner.ttl
    }

    pub fn issue(&self, subject: &str, ttl: TimeDelta) -> Result<String, ServiceError> {
        self.issue_at(subject, ttl, Utc::now())
    }

    pub fn issue_default(&self, subject: &str) -> Result<String, ServiceError> {
        self.issue(subject, self.inner.ttl)
    }

    /// Returns the token's subject if the signature is valid and the token has
    /// not expired.
    pub fn verify(&self, token: &str) -> Result<String, ServiceError> {
        self.verify_at(token, Utc::now())
    }

    fn issue_at(
        &self,
        subject: &str,
        ttl: TimeDelta,
        now: DateTime<Utc>,
    ) -> Result<String, ServiceError> {
        let claims = Claims {
            sub: subject.to_owned(),
            exp: (now + ttl).timestamp(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.inner.encoding)
            .map_err(|e| ServiceError::Internal(format!("token encoding failed: {e}")))
    }

    fn verify_at(&self, token: &str, now: DateTime<Utc>) -> Result<String, ServiceError> {
        let data = decode::<Claims>(token, &self.inner.decoding, &self.inner.validation)
            .map_err(|e| {
                debug!(error = %e, "Rejected bearer token");
                ServiceError::InvalidToken
            })?;

        if data.claims.exp < now.timestamp() {
            debug!(sub = %data.claims.sub, "Rejected expired bearer token");
            return Err(ServiceError::InvalidToken);
        }
        Ok(data.claims.sub)
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn issuer() -> TokenIssuer {
        TokenIssuer::new(b"test-secret-that-is-long-enough", TimeDelta::minutes(DEFAULT_TTL_MINS))
    }

    #[test]
    fn issue_and_verify_returns_subject() {
        let tokens = issuer();
        let token = tokens.issue_default("alice").unwrap();
        assert_eq!(tokens.verify(&token).unwrap(), "alice");
    }

    #[test]
    fn accepted_just_before_expiry_rejected_just_after() {
        let tokens = issuer();
        let t0 = Utc.with_ymd_and_hms(2024, 3, 15, 10, 0, 0).unwrap();
        let ttl = TimeDelta::minutes(30);
        let token = tokens.issue_at("alice", ttl, t0).unwrap();

        let before = t0 + ttl - TimeDelta::seconds(1);
        let after = t0 + ttl + TimeDelta::seconds(1);
        assert_eq!(tokens.verify_at(&token, before).unwrap(), "alice");
        assert!(matches!(
            tokens.verify_at(&token, after),
            Err(ServiceError::InvalidToken)
        ));
    }

    #[test]
    fn sub_second_issue_still_valid_half_a_second_before_expiry() {
        let tokens = issuer();
        let t0 = Utc.with_ymd_and_hms(2024, 3, 15, 10, 0, 0).unwrap() + TimeDelta::milliseconds(900);
        let ttl = TimeDelta::minutes(30);
        let token = tokens.issue_at("alice", ttl, t0).unwrap();

        let expiry = t0 + ttl;
        assert_eq!(
            tokens.verify_at(&token, expiry - TimeDelta::milliseconds(500)).unwrap(),
            "alice"
        );
        assert!(tokens.verify_at(&token, expiry + TimeDelta::seconds(1)).is_err());
    }

    #[test]
    fn already_expired_token_fails() {
        let tokens = issuer();
        let token = tokens.issue("alice", TimeDelta::seconds(-5)).unwrap();
        assert!(tokens.verify(&token).is_err());
    }

    #[test]
    fn different_keys_do_not_verify_each_other() {
        let a = TokenIssuer::new(b"secret-alpha", TimeDelta::minutes(30));
        let b = TokenIssuer::new(b"secret-bravo", TimeDelta::minutes(30));
        let token = a.issue_default("alice").unwrap();
        assert!(matches!(b.verify(&token), Err(ServiceError::InvalidToken)));
    }

    #[test]
    fn ephemeral_issuers_have_distinct_keys() {
        let a = TokenIssuer::ephemeral(TimeDelta::minutes(30));
        let b = TokenIssuer::ephemeral(TimeDelta::minutes(30));
        let token = a.issue_default("alice").unwrap();
        assert!(a.verify(&token).is_ok());
        assert!(b.verify(&token).is_err());
    }

    #[test]
    fn malformed_token_fails() {
        let tokens = issuer();
        assert!(tokens.verify("not.a.jwt").is_err());
        assert!(tokens.verify("").is_err());
    }

    #[test]
    fn tampered_token_fails() {
        let tokens = issuer();
        let token = tokens.issue_default("alice").unwrap();
        let (payload, _signature) = token.rsplit_once('.').unwrap();
        let forged = format!("{payload}.c2lnbmF0dXJl");
        assert!(tokens.verify(&forged).is_err());
    }

    #[test]
    fn clones_share_key() {
        let tokens = issuer();
        let clone = tokens.clone();
        let token = tokens.issue_default("alice").unwrap();
        assert_eq!(clone.verify(&token).unwrap(), "alice");
        assert_eq!(clone.ttl(), TimeDelta::minutes(30));
    }
}
