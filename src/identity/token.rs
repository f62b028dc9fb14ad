//! Signed session tokens.
//!
//! A token is `base64url(claims_json) + "." + base64url(hmac_sha256(key, payload))`
//! with no padding. Verification recomputes the tag over the received payload
//! and compares in constant time before trusting any claim, then checks expiry.
//! Tokens are stateless; there is no server-side revocation list.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::Utc;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use tracing::warn;

use crate::error::{AppError, AppResult};

use super::principal::{Principal, Role};

type HmacSha256 = Hmac<Sha256>;

/// Token lifetime: 24 hours from issuance.
pub const TOKEN_TTL_SECS: i64 = 24 * 60 * 60;

const SECRET_ENV: &str = "TIMECARD_TOKEN_SECRET";

/// Claims embedded in every issued token.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    /// Account email the token was issued for.
    pub sub: String,
    pub role: Role,
    /// Issued-at, seconds since the Unix epoch.
    pub iat: i64,
    /// Expiry, seconds since the Unix epoch.
    pub exp: i64,
}

impl Claims {
    pub fn principal(&self) -> Principal {
        Principal { email: self.sub.clone(), role: self.role }
    }
}

/// Issues and verifies signed session tokens with a process-held key.
#[derive(Clone)]
pub struct TokenIssuer {
    key: Vec<u8>,
}

impl TokenIssuer {
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self { key: secret.into() }
    }

    /// Build an issuer from `TIMECARD_TOKEN_SECRET`, or a random per-process
    /// key when the variable is unset. A random key invalidates any token that
    /// survived a restart, hence the warning.
    pub fn from_env_or_random() -> anyhow::Result<Self> {
        if let Ok(secret) = std::env::var(SECRET_ENV) {
            if !secret.is_empty() {
                return Ok(Self::new(secret.into_bytes()));
            }
        }
        let mut key = vec![0u8; 32];
        getrandom::getrandom(&mut key)
            .map_err(|e| anyhow::anyhow!("random key generation failed: {}", e))?;
        warn!("{} not set; using a random signing key, outstanding tokens will not survive restart", SECRET_ENV);
        Ok(Self::new(key))
    }

    fn tag(&self, payload: &[u8]) -> AppResult<Vec<u8>> {
        let mut mac = HmacSha256::new_from_slice(&self.key).map_err(|e| AppError::Internal {
            code: "internal_error".into(),
            message: e.to_string(),
        })?;
        mac.update(payload);
        Ok(mac.finalize().into_bytes().to_vec())
    }

    /// Issue a token for the given account, valid for `TOKEN_TTL_SECS`.
    pub fn issue(&self, email: &str, role: Role) -> AppResult<String> {
        let now = Utc::now().timestamp();
        let claims = Claims { sub: email.to_string(), role, iat: now, exp: now + TOKEN_TTL_SECS };
        let body = serde_json::to_vec(&claims).map_err(|e| AppError::Internal {
            code: "internal_error".into(),
            message: e.to_string(),
        })?;
        let payload = URL_SAFE_NO_PAD.encode(body);
        let tag = self.tag(payload.as_bytes())?;
        Ok(format!("{}.{}", payload, URL_SAFE_NO_PAD.encode(tag)))
    }

    /// Verify structure, signature and expiry; returns the embedded claims.
    pub fn verify(&self, token: &str) -> AppResult<Claims> {
        let bad = |msg: &str| AppError::invalid_token("invalid_token", msg);
        let (payload, sig_b64) = token.split_once('.').ok_or_else(|| bad("malformed token"))?;
        let sig = URL_SAFE_NO_PAD.decode(sig_b64).map_err(|_| bad("malformed signature"))?;
        let expected = self.tag(payload.as_bytes())?;
        // Constant-time tag comparison before any claim is decoded.
        if !bool::from(sig.ct_eq(&expected)) {
            return Err(bad("signature mismatch"));
        }
        let body = URL_SAFE_NO_PAD.decode(payload).map_err(|_| bad("malformed payload"))?;
        let claims: Claims = serde_json::from_slice(&body).map_err(|_| bad("malformed claims"))?;
        if claims.exp <= Utc::now().timestamp() {
            return Err(bad("token expired"));
        }
        Ok(claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issuer() -> TokenIssuer {
        TokenIssuer::new(b"unit-test-signing-key".to_vec())
    }

    #[test]
    fn issue_then_verify_roundtrip() {
        let iss = issuer();
        let tok = iss.issue("a@b.c", Role::Admin).unwrap();
        let claims = iss.verify(&tok).unwrap();
        assert_eq!(claims.sub, "a@b.c");
        assert_eq!(claims.role, Role::Admin);
        assert_eq!(claims.exp - claims.iat, TOKEN_TTL_SECS);
    }

    #[test]
    fn tampered_payload_is_rejected() {
        let iss = issuer();
        let tok = iss.issue("a@b.c", Role::Employee).unwrap();
        // Forge claims for another account, keep the original signature
        let forged_body = serde_json::to_vec(&Claims {
            sub: "evil@b.c".into(),
            role: Role::Admin,
            iat: 0,
            exp: i64::MAX,
        })
        .unwrap();
        let sig = tok.split_once('.').unwrap().1;
        let forged = format!("{}.{}", URL_SAFE_NO_PAD.encode(forged_body), sig);
        assert!(iss.verify(&forged).is_err());
    }

    #[test]
    fn wrong_key_is_rejected() {
        let tok = issuer().issue("a@b.c", Role::Employee).unwrap();
        let other = TokenIssuer::new(b"different-key".to_vec());
        assert!(other.verify(&tok).is_err());
    }

    #[test]
    fn expired_token_is_rejected() {
        let iss = issuer();
        let now = Utc::now().timestamp();
        let claims = Claims { sub: "a@b.c".into(), role: Role::Employee, iat: now - 100, exp: now - 1 };
        let payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&claims).unwrap());
        let tag = iss.tag(payload.as_bytes()).unwrap();
        let tok = format!("{}.{}", payload, URL_SAFE_NO_PAD.encode(tag));
        assert!(iss.verify(&tok).is_err());
    }

    #[test]
    fn garbage_is_rejected_not_panicking() {
        let iss = issuer();
        for junk in ["", ".", "a.b", "no-dot-at-all", "..."] {
            assert!(iss.verify(junk).is_err());
        }
    }
}
