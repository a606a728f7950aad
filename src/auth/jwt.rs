use std::sync::Arc;

use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use time::{Duration, OffsetDateTime};
use tracing::debug;

use super::claims::Claims;
use crate::config::JwtConfig;

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("token has expired")]
    Expired,
    #[error("token is malformed")]
    Malformed,
    #[error("token signature is invalid")]
    SignatureInvalid,
    #[error("token ttl must be positive, got {0}")]
    InvalidTtl(i64),
    #[error("token encoding failed: {0}")]
    Encoding(String),
}

/// A freshly signed token and the instant it stops being valid.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: OffsetDateTime,
}

struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    issuer: String,
    audience: String,
}

/// Issues and validates HS256 identity tokens. Cheap to clone; the signing
/// secret is shared and never changes after construction.
#[derive(Clone)]
pub struct TokenService {
    keys: Arc<JwtKeys>,
}

impl TokenService {
    pub fn new(config: &JwtConfig) -> Self {
        Self {
            keys: Arc::new(JwtKeys {
                encoding: EncodingKey::from_secret(config.secret.as_bytes()),
                decoding: DecodingKey::from_secret(config.secret.as_bytes()),
                issuer: config.issuer.clone(),
                audience: config.audience.clone(),
            }),
        }
    }

    pub fn issue(&self, uid: i64, ttl_seconds: i64) -> Result<IssuedToken, TokenError> {
        self.issue_at(uid, ttl_seconds, OffsetDateTime::now_utc())
    }

    pub fn issue_at(
        &self,
        uid: i64,
        ttl_seconds: i64,
        now: OffsetDateTime,
    ) -> Result<IssuedToken, TokenError> {
        if ttl_seconds <= 0 {
            return Err(TokenError::InvalidTtl(ttl_seconds));
        }
        let expires_at = now
            .checked_add(Duration::seconds(ttl_seconds))
            .ok_or(TokenError::InvalidTtl(ttl_seconds))?;
        let claims = Claims {
            sub: uid,
            iat: now.unix_timestamp(),
            exp: expires_at.unix_timestamp(),
            iss: self.keys.issuer.clone(),
            aud: self.keys.audience.clone(),
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.keys.encoding)
            .map_err(|e| TokenError::Encoding(e.to_string()))?;
        debug!(uid, ttl_seconds, "jwt signed");
        Ok(IssuedToken { token, expires_at })
    }

    /// Returns the subject uid of a valid token.
    pub fn validate(&self, token: &str) -> Result<i64, TokenError> {
        self.validate_at(token, OffsetDateTime::now_utc())
    }

    /// Like [`validate`](Self::validate) with an explicit clock reading.
    /// The signature is checked before expiry.
    pub fn validate_at(&self, token: &str, now: OffsetDateTime) -> Result<i64, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_audience(std::slice::from_ref(&self.keys.audience));
        validation.set_issuer(std::slice::from_ref(&self.keys.issuer));
        validation.set_required_spec_claims(&["exp", "iss", "aud"]);
        // Expiry is compared against `now` below.
        validation.validate_exp = false;
        validation.leeway = 0;

        let data = decode::<Claims>(token, &self.keys.decoding, &validation).map_err(|e| {
            match e.kind() {
                ErrorKind::InvalidSignature
                | ErrorKind::InvalidIssuer
                | ErrorKind::InvalidAudience
                | ErrorKind::InvalidAlgorithm => TokenError::SignatureInvalid,
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Malformed,
            }
        })?;

        if now.unix_timestamp() >= data.claims.exp {
            return Err(TokenError::Expired);
        }
        debug!(uid = data.claims.sub, "jwt verified");
        Ok(data.claims.sub)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_tokens(secret: &str, issuer: &str, audience: &str) -> TokenService {
        TokenService::new(&JwtConfig {
            secret: secret.into(),
            issuer: issuer.into(),
            audience: audience.into(),
            default_ttl_seconds: 300,
        })
    }

    #[test]
    fn issue_then_validate_returns_subject() {
        let tokens = make_tokens("dev-secret", "iss", "aud");
        let issued = tokens.issue(42, 300).expect("issue");
        assert_eq!(tokens.validate(&issued.token).expect("validate"), 42);
    }

    #[test]
    fn expiry_is_exp_claim() {
        let tokens = make_tokens("dev-secret", "iss", "aud");
        let now = OffsetDateTime::from_unix_timestamp(1_700_000_000).unwrap();
        let issued = tokens.issue_at(7, 3600, now).unwrap();
        assert_eq!(issued.expires_at.unix_timestamp(), 1_700_003_600);

        let just_before = now + Duration::seconds(3599);
        assert_eq!(tokens.validate_at(&issued.token, just_before).unwrap(), 7);

        let at_exp = now + Duration::seconds(3600);
        assert!(matches!(
            tokens.validate_at(&issued.token, at_exp),
            Err(TokenError::Expired)
        ));
    }

    #[test]
    fn non_positive_ttl_is_rejected() {
        let tokens = make_tokens("dev-secret", "iss", "aud");
        assert!(matches!(tokens.issue(1, 0), Err(TokenError::InvalidTtl(0))));
        assert!(matches!(tokens.issue(1, -5), Err(TokenError::InvalidTtl(-5))));
    }

    #[test]
    fn ttl_past_representable_time_is_rejected() {
        let tokens = make_tokens("dev-secret", "iss", "aud");
        assert!(matches!(
            tokens.issue(1, i64::MAX),
            Err(TokenError::InvalidTtl(i64::MAX))
        ));
        assert!(matches!(
            tokens.issue(1, 1_000_000_000_000),
            Err(TokenError::InvalidTtl(_))
        ));
    }

    #[test]
    fn foreign_secret_is_signature_invalid() {
        let ours = make_tokens("our-secret", "iss", "aud");
        let theirs = make_tokens("their-secret", "iss", "aud");
        let token = theirs.issue(1, 300).unwrap().token;
        assert!(matches!(
            ours.validate(&token),
            Err(TokenError::SignatureInvalid)
        ));
    }

    #[test]
    fn swapped_payload_is_signature_invalid() {
        let tokens = make_tokens("dev-secret", "iss", "aud");
        let victim = tokens.issue(1, 300).unwrap().token;
        let attacker = tokens.issue(2, 300).unwrap().token;

        let v: Vec<&str> = victim.split('.').collect();
        let a: Vec<&str> = attacker.split('.').collect();
        let forged = format!("{}.{}.{}", v[0], a[1], v[2]);

        assert!(matches!(
            tokens.validate(&forged),
            Err(TokenError::SignatureInvalid)
        ));
    }

    #[test]
    fn wrong_issuer_or_audience_is_rejected() {
        let good = make_tokens("same-secret", "good-iss", "good-aud");
        let bad = make_tokens("same-secret", "bad-iss", "bad-aud");
        let token = good.issue(1, 300).unwrap().token;
        assert!(matches!(
            bad.validate(&token),
            Err(TokenError::SignatureInvalid)
        ));
    }

    #[test]
    fn garbage_is_malformed() {
        let tokens = make_tokens("dev-secret", "iss", "aud");
        assert!(matches!(
            tokens.validate("not-a-jwt"),
            Err(TokenError::Malformed)
        ));
        assert!(matches!(tokens.validate(""), Err(TokenError::Malformed)));
    }
}
