use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Claims carried by a short-lived access token. All fields are required;
/// a payload missing any of them fails verification as invalid.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessClaims {
    /// User id.
    pub sub: Uuid,
    /// Session id the token is bound to.
    pub sid: Uuid,
    pub iat: i64,
    pub exp: i64,
}

/// Claims carried by a refresh token. The `jti` makes every issued token
/// unique so its digest can serve as a store lookup key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshClaims {
    pub sub: Uuid,
    pub sid: Uuid,
    pub iat: i64,
    pub exp: i64,
    pub jti: Uuid,
}

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("invalid token")]
    Invalid,
    #[error("token has expired")]
    Expired,
    #[error("token signing failed")]
    Signing(#[source] jsonwebtoken::errors::Error),
}

#[derive(Debug)]
pub struct IssuedAccessToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug)]
pub struct IssuedRefreshToken {
    /// Raw value sent to the client; never persisted.
    pub token: String,
    /// SHA-256 digest of the raw value; the only form that is stored.
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
}

/// Issues and verifies the signed credentials of the session subsystem.
/// Verification is a pure function: signature and expiry only, no I/O.
pub struct TokenCodec {
    encoding: EncodingKey,
    decoding: DecodingKey,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl TokenCodec {
    pub fn new(secret: &str, access_ttl_minutes: u64, refresh_ttl_days: u64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_ref()),
            decoding: DecodingKey::from_secret(secret.as_ref()),
            access_ttl: Duration::minutes(access_ttl_minutes as i64),
            refresh_ttl: Duration::days(refresh_ttl_days as i64),
        }
    }

    pub fn issue_access_token(
        &self,
        user_id: Uuid,
        session_id: Uuid,
    ) -> Result<IssuedAccessToken, TokenError> {
        let now = Utc::now();
        let expires_at = now + self.access_ttl;
        let claims = AccessClaims {
            sub: user_id,
            sid: session_id,
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
        };
        let token =
            encode(&Header::default(), &claims, &self.encoding).map_err(TokenError::Signing)?;
        Ok(IssuedAccessToken { token, expires_at })
    }

    pub fn issue_refresh_token(
        &self,
        user_id: Uuid,
        session_id: Uuid,
    ) -> Result<IssuedRefreshToken, TokenError> {
        let now = Utc::now();
        let expires_at = now + self.refresh_ttl;
        let claims = RefreshClaims {
            sub: user_id,
            sid: session_id,
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
            jti: Uuid::new_v4(),
        };
        let token =
            encode(&Header::default(), &claims, &self.encoding).map_err(TokenError::Signing)?;
        let token_hash = hash_refresh_token(&token);
        Ok(IssuedRefreshToken {
            token,
            token_hash,
            expires_at,
        })
    }

    pub fn verify_access_token(&self, token: &str) -> Result<AccessClaims, TokenError> {
        let token_data = decode::<AccessClaims>(token, &self.decoding, &strict_validation())
            .map_err(map_decode_error)?;
        Ok(token_data.claims)
    }

    /// Checks signature and expiry of a presented refresh token. Callers
    /// still have to resolve the digest against the store; this only
    /// rejects garbage before a lookup happens.
    pub fn verify_refresh_token(&self, token: &str) -> Result<RefreshClaims, TokenError> {
        let token_data = decode::<RefreshClaims>(token, &self.decoding, &strict_validation())
            .map_err(map_decode_error)?;
        Ok(token_data.claims)
    }
}

fn strict_validation() -> Validation {
    let mut validation = Validation::default();
    validation.leeway = 0;
    validation
}

fn map_decode_error(err: jsonwebtoken::errors::Error) -> TokenError {
    match err.kind() {
        ErrorKind::ExpiredSignature => TokenError::Expired,
        _ => TokenError::Invalid,
    }
}

pub fn hash_refresh_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codec() -> TokenCodec {
        TokenCodec::new("test-secret", 15, 30)
    }

    #[test]
    fn access_token_roundtrip() {
        let user_id = Uuid::new_v4();
        let session_id = Uuid::new_v4();
        let issued = codec().issue_access_token(user_id, session_id).unwrap();
        let claims = codec().verify_access_token(&issued.token).unwrap();
        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.sid, session_id);
        assert_eq!(claims.exp, issued.expires_at.timestamp());
    }

    #[test]
    fn tampered_token_is_invalid() {
        let issued = codec()
            .issue_access_token(Uuid::new_v4(), Uuid::new_v4())
            .unwrap();
        let mut tampered = issued.token.clone();
        tampered.push('x');
        assert!(matches!(
            codec().verify_access_token(&tampered),
            Err(TokenError::Invalid)
        ));
    }

    #[test]
    fn wrong_secret_is_invalid() {
        let issued = codec()
            .issue_access_token(Uuid::new_v4(), Uuid::new_v4())
            .unwrap();
        let other = TokenCodec::new("other-secret", 15, 30);
        assert!(matches!(
            other.verify_access_token(&issued.token),
            Err(TokenError::Invalid)
        ));
    }

    #[test]
    fn expired_token_is_rejected_as_expired() {
        let now = Utc::now();
        let claims = AccessClaims {
            sub: Uuid::new_v4(),
            sid: Uuid::new_v4(),
            iat: (now - Duration::minutes(30)).timestamp(),
            exp: (now - Duration::minutes(15)).timestamp(),
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret("test-secret".as_ref()),
        )
        .unwrap();
        assert!(matches!(
            codec().verify_access_token(&token),
            Err(TokenError::Expired)
        ));
    }

    #[test]
    fn payload_missing_session_binding_is_invalid() {
        #[derive(Serialize)]
        struct PartialClaims {
            sub: Uuid,
            iat: i64,
            exp: i64,
        }
        let now = Utc::now();
        let claims = PartialClaims {
            sub: Uuid::new_v4(),
            iat: now.timestamp(),
            exp: (now + Duration::minutes(15)).timestamp(),
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret("test-secret".as_ref()),
        )
        .unwrap();
        assert!(matches!(
            codec().verify_access_token(&token),
            Err(TokenError::Invalid)
        ));
    }

    #[test]
    fn refresh_tokens_are_unique_and_hash_deterministically() {
        let user_id = Uuid::new_v4();
        let session_id = Uuid::new_v4();
        let a = codec().issue_refresh_token(user_id, session_id).unwrap();
        let b = codec().issue_refresh_token(user_id, session_id).unwrap();
        assert_ne!(a.token, b.token);
        assert_ne!(a.token_hash, b.token_hash);
        assert_eq!(a.token_hash, hash_refresh_token(&a.token));
    }
}
