//! Signed, timestamped bearer tokens.
//!
//! Format: `<payload>.<issued_at>.<signature>`
//!
//! - `payload`: URL-safe base64 (no padding) of `{"sub": "<user>"}`
//! - `issued_at`: unix seconds
//! - `signature`: URL-safe base64 of HMAC-SHA256 over `<payload>.<issued_at>`
//!
//! The server keeps no record of issued tokens. Rotating the secret
//! invalidates every token signed with the previous one.

use base64ct::{Base64UrlUnpadded, Encoding};
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::time::Duration;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    #[serde(default)]
    sub: String,
}

pub struct TokenSigner {
    secret: SecretString,
}

impl TokenSigner {
    #[must_use]
    pub fn new(secret: SecretString) -> Self {
        Self { secret }
    }

    /// Sign a token for `user` issued at `now` (time since the unix epoch).
    #[must_use]
    pub fn issue(&self, user: &str, now: Duration) -> String {
        let claims = Claims {
            sub: user.to_string(),
        };
        // Serializing a struct with a single string field cannot fail.
        let json = serde_json::to_vec(&claims).unwrap_or_default();
        let payload = Base64UrlUnpadded::encode_string(&json);
        let signing_input = format!("{payload}.{}", now.as_secs());
        let signature = Base64UrlUnpadded::encode_string(&self.sign(signing_input.as_bytes()));
        format!("{signing_input}.{signature}")
    }

    /// Return the embedded user when the signature is valid, the token is not
    /// older than `ttl` and not issued in the future, and the user is not blank.
    #[must_use]
    pub fn verify(&self, token: &str, now: Duration, ttl: Duration) -> Option<String> {
        let (signing_input, signature) = token.rsplit_once('.')?;
        let (payload, issued_at) = signing_input.split_once('.')?;

        let signature = Base64UrlUnpadded::decode_vec(signature).ok()?;
        let mut mac = self.mac()?;
        mac.update(signing_input.as_bytes());
        mac.verify_slice(&signature).ok()?;

        let issued_at: u64 = issued_at.parse().ok()?;
        let age = now.as_secs().checked_sub(issued_at)?;
        if age > ttl.as_secs() {
            return None;
        }

        let json = Base64UrlUnpadded::decode_vec(payload).ok()?;
        let claims: Claims = serde_json::from_slice(&json).ok()?;
        if claims.sub.trim().is_empty() {
            None
        } else {
            Some(claims.sub)
        }
    }

    fn sign(&self, input: &[u8]) -> Vec<u8> {
        self.mac().map_or_else(Vec::new, |mut mac| {
            mac.update(input);
            mac.finalize().into_bytes().to_vec()
        })
    }

    fn mac(&self) -> Option<HmacSha256> {
        // HMAC accepts keys of any length.
        HmacSha256::new_from_slice(self.secret.expose_secret().as_bytes()).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TTL: Duration = Duration::from_secs(3600);

    fn signer(secret: &str) -> TokenSigner {
        TokenSigner::new(SecretString::from(secret))
    }

    #[test]
    fn issued_token_verifies() {
        let signer = signer("s3cret");
        let now = Duration::from_secs(1_700_000_000);
        let token = signer.issue("alice", now);
        assert_eq!(signer.verify(&token, now, TTL), Some("alice".to_string()));
    }

    #[test]
    fn token_accepted_up_to_ttl() {
        let signer = signer("s3cret");
        let now = Duration::from_secs(1_700_000_000);
        let token = signer.issue("alice", now);
        assert!(signer.verify(&token, now + TTL, TTL).is_some());
        assert!(signer
            .verify(&token, now + TTL + Duration::from_secs(1), TTL)
            .is_none());
    }

    #[test]
    fn token_from_the_future_is_rejected() {
        let signer = signer("s3cret");
        let now = Duration::from_secs(1_700_000_000);
        let token = signer.issue("alice", now + Duration::from_secs(120));
        assert!(signer.verify(&token, now, TTL).is_none());
    }

    #[test]
    fn other_secret_rejects_token() {
        let now = Duration::from_secs(1_700_000_000);
        let token = signer("first").issue("alice", now);
        assert!(signer("second").verify(&token, now, TTL).is_none());
    }

    #[test]
    fn tampered_parts_are_rejected() {
        let signer = signer("s3cret");
        let now = Duration::from_secs(1_700_000_000);
        let token = signer.issue("alice", now);
        let parts: Vec<&str> = token.split('.').collect();
        assert_eq!(parts.len(), 3);

        let forged_payload = Base64UrlUnpadded::encode_string(br#"{"sub":"mallory"}"#);
        let forged = format!("{forged_payload}.{}.{}", parts[1], parts[2]);
        assert!(signer.verify(&forged, now, TTL).is_none());

        let backdated = format!("{}.{}.{}", parts[0], now.as_secs() + 10, parts[2]);
        assert!(signer.verify(&backdated, now, TTL).is_none());

        assert!(signer.verify("garbage", now, TTL).is_none());
        assert!(signer.verify("a.b.c", now, TTL).is_none());
    }

    #[test]
    fn empty_user_is_rejected() {
        let signer = signer("s3cret");
        let now = Duration::from_secs(1_700_000_000);
        let token = signer.issue("   ", now);
        assert!(signer.verify(&token, now, TTL).is_none());
    }
}
