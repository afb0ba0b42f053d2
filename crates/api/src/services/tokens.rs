//! Signed, time-boxed email verification tokens.
//!
//! Tokens are compact HS256 JWTs (`header.claims.signature`, base64url
//! without padding) whose subject is the account email. Nothing is
//! persisted; the signature and the `exp` claim are the whole state.
//!
//! Validation checks structure and signature before expiry, so a tampered
//! token is always reported as invalid even when it is also stale.

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, TimeDelta, Utc};
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;

use userhub_core::Email;

const PURPOSE_VERIFY_EMAIL: &str = "verify_email";

/// Errors from token validation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenError {
    /// Well-formed and correctly signed, but past its expiry.
    #[error("verification link has expired")]
    Expired,

    /// Malformed, unsigned, tampered, or for another purpose.
    #[error("invalid verification token: {0}")]
    Invalid(&'static str),

    /// The token could not be produced.
    #[error("failed to encode verification token: {0}")]
    Encoding(String),
}

#[derive(Debug, Serialize, Deserialize)]
struct Header {
    alg: String,
    typ: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    iat: i64,
    exp: i64,
    purpose: String,
}

/// Issues and validates verification tokens with a process-wide key.
#[derive(Clone)]
pub struct VerificationTokens {
    secret: SecretString,
    ttl: TimeDelta,
}

impl std::fmt::Debug for VerificationTokens {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VerificationTokens")
            .field("secret", &"[REDACTED]")
            .field("ttl", &self.ttl)
            .finish()
    }
}

impl VerificationTokens {
    #[must_use]
    pub const fn new(secret: SecretString, ttl: TimeDelta) -> Self {
        Self { secret, ttl }
    }

    /// How long issued tokens remain valid.
    #[must_use]
    pub const fn ttl(&self) -> TimeDelta {
        self.ttl
    }

    /// Issue a token for `email`, valid from now for the configured TTL.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::Encoding` if the token cannot be serialized.
    pub fn issue(&self, email: &Email) -> Result<String, TokenError> {
        self.issue_at(email, Utc::now())
    }

    /// Issue a token as if the current time were `now`.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::Encoding` if the token cannot be serialized or
    /// its expiry is not representable.
    pub fn issue_at(&self, email: &Email, now: DateTime<Utc>) -> Result<String, TokenError> {
        let header = Header {
            alg: "HS256".to_string(),
            typ: "JWT".to_string(),
        };
        let expires_at = now
            .checked_add_signed(self.ttl)
            .ok_or_else(|| TokenError::Encoding("expiry out of range".to_string()))?;
        let claims = Claims {
            sub: email.to_string(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
            purpose: PURPOSE_VERIFY_EMAIL.to_string(),
        };

        let header_json =
            serde_json::to_vec(&header).map_err(|e| TokenError::Encoding(e.to_string()))?;
        let claims_json =
            serde_json::to_vec(&claims).map_err(|e| TokenError::Encoding(e.to_string()))?;

        let signing_input = format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(header_json),
            URL_SAFE_NO_PAD.encode(claims_json)
        );
        let signature = URL_SAFE_NO_PAD.encode(self.sign(signing_input.as_bytes())?);

        Ok(format!("{signing_input}.{signature}"))
    }

    /// Validate a token and return the email it was issued for.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::Expired` for a genuine token past its expiry and
    /// `TokenError::Invalid` for anything else that does not check out.
    pub fn validate(&self, token: &str) -> Result<Email, TokenError> {
        self.validate_at(token, Utc::now())
    }

    /// Validate a token as if the current time were `now`.
    ///
    /// # Errors
    ///
    /// See [`VerificationTokens::validate`].
    pub fn validate_at(&self, token: &str, now: DateTime<Utc>) -> Result<Email, TokenError> {
        let mut parts = token.trim().split('.');
        let (Some(header_b64), Some(claims_b64), Some(sig_b64), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(TokenError::Invalid("malformed token"));
        };

        let header: Header = decode_json(header_b64, "bad header")?;
        if header.alg != "HS256" || !header.typ.eq_ignore_ascii_case("JWT") {
            return Err(TokenError::Invalid("unsupported header"));
        }

        let signature = URL_SAFE_NO_PAD
            .decode(sig_b64)
            .map_err(|_| TokenError::Invalid("bad signature encoding"))?;
        let mut mac = self.mac()?;
        mac.update(format!("{header_b64}.{claims_b64}").as_bytes());
        mac.verify_slice(&signature)
            .map_err(|_| TokenError::Invalid("signature mismatch"))?;

        let claims: Claims = decode_json(claims_b64, "bad claims")?;
        if claims.purpose != PURPOSE_VERIFY_EMAIL {
            return Err(TokenError::Invalid("wrong purpose"));
        }
        let email = Email::parse(&claims.sub).map_err(|_| TokenError::Invalid("bad subject"))?;

        if now.timestamp() >= claims.exp {
            return Err(TokenError::Expired);
        }

        Ok(email)
    }

    fn mac(&self) -> Result<Hmac<Sha256>, TokenError> {
        Hmac::<Sha256>::new_from_slice(self.secret.expose_secret().as_bytes())
            .map_err(|e| TokenError::Encoding(e.to_string()))
    }

    fn sign(&self, input: &[u8]) -> Result<Vec<u8>, TokenError> {
        let mut mac = self.mac()?;
        mac.update(input);
        Ok(mac.finalize().into_bytes().to_vec())
    }
}

fn decode_json<T: serde::de::DeserializeOwned>(
    segment: &str,
    what: &'static str,
) -> Result<T, TokenError> {
    let raw = URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|_| TokenError::Invalid(what))?;
    serde_json::from_slice(&raw).map_err(|_| TokenError::Invalid(what))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn tokens() -> VerificationTokens {
        VerificationTokens::new(
            SecretString::from("k9$Qv2!mX7@pL4#zR8&nT1*wY5^bC3%d"),
            TimeDelta::hours(24),
        )
    }

    fn alice() -> Email {
        Email::parse("alice@example.com").unwrap()
    }

    #[test]
    fn test_valid_shortly_after_issue() {
        let t = tokens();
        let issued = Utc::now();
        let token = t.issue_at(&alice(), issued).unwrap();

        let email = t.validate_at(&token, issued + TimeDelta::seconds(1)).unwrap();
        assert_eq!(email, alice());
    }

    #[test]
    fn test_expired_after_ttl() {
        let t = tokens();
        let issued = Utc::now();
        let token = t.issue_at(&alice(), issued).unwrap();

        assert_eq!(
            t.validate_at(&token, issued + TimeDelta::hours(25)),
            Err(TokenError::Expired)
        );
    }

    #[test]
    fn test_unrepresentable_expiry_is_an_error() {
        let t = VerificationTokens::new(
            SecretString::from("k9$Qv2!mX7@pL4#zR8&nT1*wY5^bC3%d"),
            TimeDelta::MAX,
        );
        assert!(matches!(t.issue(&alice()), Err(TokenError::Encoding(_))));
    }

    #[test]
    fn test_altered_signature_is_invalid() {
        let t = tokens();
        let issued = Utc::now();
        let token = t.issue_at(&alice(), issued).unwrap();

        let (body, sig) = token.rsplit_once('.').unwrap();
        let mut sig_bytes = URL_SAFE_NO_PAD.decode(sig).unwrap();
        sig_bytes[0] ^= 0x01;
        let tampered = format!("{body}.{}", URL_SAFE_NO_PAD.encode(sig_bytes));

        assert!(matches!(
            t.validate_at(&tampered, issued + TimeDelta::seconds(1)),
            Err(TokenError::Invalid(_))
        ));
        // Tampering wins over expiry.
        assert!(matches!(
            t.validate_at(&tampered, issued + TimeDelta::hours(25)),
            Err(TokenError::Invalid(_))
        ));
    }

    #[test]
    fn test_swapped_subject_is_invalid() {
        let t = tokens();
        let issued = Utc::now();
        let token = t.issue_at(&alice(), issued).unwrap();
        let other = t
            .issue_at(&Email::parse("mallory@example.com").unwrap(), issued)
            .unwrap();

        let parts: Vec<&str> = token.split('.').collect();
        let other_parts: Vec<&str> = other.split('.').collect();
        let forged = format!("{}.{}.{}", parts[0], other_parts[1], parts[2]);

        assert!(matches!(
            t.validate_at(&forged, issued),
            Err(TokenError::Invalid(_))
        ));
    }

    #[test]
    fn test_other_key_is_invalid() {
        let issued = Utc::now();
        let token = tokens().issue_at(&alice(), issued).unwrap();
        let other = VerificationTokens::new(
            SecretString::from("Zq8#Lw3!Vx6@Nr1$Tk4%Hm7^Pj2&Bf5*"),
            TimeDelta::hours(24),
        );

        assert!(matches!(
            other.validate_at(&token, issued),
            Err(TokenError::Invalid(_))
        ));
    }

    #[test]
    fn test_garbage_is_invalid() {
        let t = tokens();
        for junk in ["", "abc", "a.b", "a.b.c.d", "!!!.???.***"] {
            assert!(
                matches!(t.validate(junk), Err(TokenError::Invalid(_))),
                "accepted {junk:?}"
            );
        }
    }
}
