use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::{Duration, OffsetDateTime};

/// Claims carried by an access token. `sub` is the user's email.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: i64,
    pub iat: i64,
    pub role: Option<String>,
    pub jti: String,
}

#[derive(Clone)]
pub struct JwtManager {
    secret: String,
    ttl: Duration,
}

#[derive(Debug, Error)]
pub enum JwtError {
    #[error("token error: {0}")]
    Token(String),
}

impl JwtManager {
    pub fn new(secret: impl Into<String>, ttl: Duration) -> Self {
        Self {
            secret: secret.into(),
            ttl,
        }
    }

    pub fn issue_access(&self, subject: &str, role: Option<String>) -> Result<String, JwtError> {
        let now = OffsetDateTime::now_utc();
        let claims = Claims {
            sub: subject.to_string(),
            exp: (now + self.ttl).unix_timestamp(),
            iat: now.unix_timestamp(),
            role,
            jti: uuid::Uuid::new_v4().to_string(),
        };
        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .map_err(|e| JwtError::Token(e.to_string()))
    }

    /// Checks signature and expiry and returns the claims.
    pub fn verify(&self, token: &str) -> Result<Claims, JwtError> {
        let data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &Validation::new(Algorithm::HS256),
        )
        .map_err(|e| JwtError::Token(e.to_string()))?;
        Ok(data.claims)
    }
}

/// Strips the `Bearer ` scheme from an Authorization header value.
pub fn strip_bearer(value: &str) -> Option<&str> {
    let value = value.trim();
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> JwtManager {
        JwtManager::new("test-secret", Duration::minutes(10))
    }

    #[test]
    fn issued_token_carries_subject_and_role() {
        let jwt = manager();
        let token = jwt.issue_access("p@x.com", Some("patient".into())).unwrap();
        let claims = jwt.verify(&token).unwrap();
        assert_eq!(claims.sub, "p@x.com");
        assert_eq!(claims.role.as_deref(), Some("patient"));
        assert_eq!(claims.exp - claims.iat, 600);
    }

    #[test]
    fn expired_token_is_rejected() {
        let jwt = JwtManager::new("test-secret", Duration::minutes(-10));
        let token = jwt.issue_access("p@x.com", None).unwrap();
        assert!(jwt.verify(&token).is_err());
    }

    #[test]
    fn foreign_signature_is_rejected() {
        let other = JwtManager::new("another-secret", Duration::minutes(10));
        let token = other.issue_access("p@x.com", None).unwrap();
        assert!(manager().verify(&token).is_err());
        assert!(manager().verify("garbage").is_err());
    }

    #[test]
    fn bearer_prefix() {
        assert_eq!(strip_bearer("Bearer abc.def"), Some("abc.def"));
        assert_eq!(strip_bearer("bearer   abc"), Some("abc"));
        assert_eq!(strip_bearer("Basic abc"), None);
        assert_eq!(strip_bearer("Bearer "), None);
        assert_eq!(strip_bearer("abc"), None);
    }
}
