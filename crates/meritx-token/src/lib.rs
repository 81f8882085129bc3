//! Bearer-token minting and verification.
//!
//! Tokens are HMAC-SHA-256 signed JWTs carrying only registered claims:
//! `sub` (the user id as a decimal string), `iat`, `nbf`, and
//! `exp = iat + TTL`. Verification tolerates zero clock skew; changing the
//! signing secret invalidates every extant token.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use meritx_core::{MeritxError, UserId};

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    iat: i64,
    nbf: i64,
    exp: i64,
}

/// Mints and verifies the tokens delivered in the `access_token` cookie.
#[derive(Clone)]
pub struct TokenManager {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl TokenManager {
    pub fn new(secret: &str, ttl: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl,
        }
    }

    /// Sign a fresh token for `user_id`, valid from now until now + TTL.
    pub fn mint(&self, user_id: UserId) -> Result<String, MeritxError> {
        let now = Utc::now();
        let claims = Claims {
            sub: user_id.to_string(),
            iat: now.timestamp(),
            nbf: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| MeritxError::Internal(format!("token signing failed: {e}")))
    }

    /// Verify `token` and return the user id it was minted for.
    ///
    /// Fails with [`MeritxError::Unauthorized`] on signature mismatch,
    /// expiry, a not-yet-valid `nbf`, malformed structure, or a
    /// non-positive subject.
    pub fn verify(&self, token: &str) -> Result<UserId, MeritxError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.validate_nbf = true;
        validation.set_required_spec_claims(&["exp", "nbf", "sub"]);

        let data = decode::<Claims>(token, &self.decoding, &validation)
            .map_err(|_| MeritxError::Unauthorized)?;

        let user_id: UserId = data
            .claims
            .sub
            .parse()
            .map_err(|_| MeritxError::Unauthorized)?;
        if user_id <= 0 {
            return Err(MeritxError::Unauthorized);
        }
        Ok(user_id)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn manager() -> TokenManager {
        TokenManager::new("test-secret", Duration::hours(1))
    }

    fn raw_token(secret: &str, claims: &Claims) -> String {
        encode(
            &Header::new(Algorithm::HS256),
            claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    #[test]
    fn mint_then_verify_round_trips() {
        let tm = manager();
        let token = tm.mint(42).unwrap();
        assert_eq!(tm.verify(&token).unwrap(), 42);
    }

    #[test]
    fn rejects_token_signed_with_another_secret() {
        let token = TokenManager::new("other-secret", Duration::hours(1))
            .mint(42)
            .unwrap();
        assert!(matches!(
            manager().verify(&token),
            Err(MeritxError::Unauthorized)
        ));
    }

    #[test]
    fn rejects_expired_token() {
        let now = Utc::now().timestamp();
        let token = raw_token(
            "test-secret",
            &Claims {
                sub: "42".into(),
                iat: now - 7200,
                nbf: now - 7200,
                exp: now - 3600,
            },
        );
        assert!(manager().verify(&token).is_err());
    }

    #[test]
    fn rejects_token_not_yet_valid() {
        let now = Utc::now().timestamp();
        let token = raw_token(
            "test-secret",
            &Claims {
                sub: "42".into(),
                iat: now,
                nbf: now + 3600,
                exp: now + 7200,
            },
        );
        assert!(manager().verify(&token).is_err());
    }

    #[test]
    fn rejects_non_positive_and_non_numeric_subjects() {
        let now = Utc::now().timestamp();
        for sub in ["0", "-5", "not-a-number", ""] {
            let token = raw_token(
                "test-secret",
                &Claims {
                    sub: sub.into(),
                    iat: now,
                    nbf: now,
                    exp: now + 3600,
                },
            );
            assert!(manager().verify(&token).is_err(), "sub {sub:?} accepted");
        }
    }

    #[test]
    fn rejects_malformed_tokens() {
        let tm = manager();
        for token in ["", "garbage", "a.b", "a.b.c.d"] {
            assert!(tm.verify(token).is_err(), "token {token:?} accepted");
        }
    }
}
