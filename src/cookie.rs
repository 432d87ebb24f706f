// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the auth-sidecar project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Configuration parameterizing every session cookie the sidecar issues.

use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

fn default_prefix() -> String {
    "auth-sidecar".to_string()
}

fn default_expire() -> i64 {
    3600
}

/// Parameters shared by every cookie the sidecar writes: naming prefix,
/// domain scoping, lifetime, transport security, and the HMAC signing key.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CookieConfig {
    #[serde(default)]
    pub domain: Option<String>,

    /// HMAC signing key. Required; there is no safe default.
    pub authentication_key: String,

    #[serde(default = "default_expire")]
    pub expire: i64,

    #[serde(default = "default_prefix")]
    pub prefix: String,

    #[serde(default)]
    pub secure: bool,
}

impl CookieConfig {
    /// Cookie name for a given provider's session namespace, or the
    /// flow-state cookie when `provider_id` is `"main"`.
    pub fn cookie_name(&self, provider_id: &str) -> String {
        format!("{}-{}", self.prefix, provider_id)
    }

    fn mac(&self) -> HmacSha256 {
        HmacSha256::new_from_slice(self.authentication_key.as_bytes())
            .expect("HMAC accepts keys of any length")
    }

    /// Sign `payload`, returning `base64(payload) || "." || base64(hmac)`.
    pub fn sign(&self, payload: &[u8]) -> String {
        use base64::Engine;
        let encoded_payload = base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(payload);

        let mut mac = self.mac();
        mac.update(encoded_payload.as_bytes());
        let tag = mac.finalize().into_bytes();
        let encoded_tag = base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(tag);

        format!("{}.{}", encoded_payload, encoded_tag)
    }

    /// Verify and decode a value produced by [`CookieConfig::sign`]. Returns
    /// `None` on any malformed or tampered input — callers must treat that
    /// identically to "no cookie present" (§4.6/§7: cookie decode failures
    /// are silently promoted to "no session").
    pub fn verify(&self, signed: &str) -> Option<Vec<u8>> {
        use base64::Engine;
        let (encoded_payload, encoded_tag) = signed.split_once('.')?;

        let mut mac = self.mac();
        let given_tag = base64::engine::general_purpose::URL_SAFE_NO_PAD
            .decode(encoded_tag)
            .ok()?;
        // `verify_slice` compares in constant time, unlike a plain `==`.
        mac.update(encoded_payload.as_bytes());
        if mac.verify_slice(&given_tag).is_err() {
            return None;
        }

        base64::engine::general_purpose::URL_SAFE_NO_PAD
            .decode(encoded_payload)
            .ok()
    }
}

impl Default for CookieConfig {
    fn default() -> Self {
        CookieConfig {
            domain: None,
            authentication_key: String::new(),
            expire: default_expire(),
            prefix: default_prefix(),
            secure: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> CookieConfig {
        CookieConfig {
            authentication_key: "test-key".into(),
            ..Default::default()
        }
    }

    #[test]
    fn round_trips() {
        let c = cfg();
        let signed = c.sign(b"hello");
        assert_eq!(c.verify(&signed).unwrap(), b"hello");
    }

    #[test]
    fn tampering_is_rejected() {
        let c = cfg();
        let mut signed = c.sign(b"hello");
        signed.push('x');
        assert!(c.verify(&signed).is_none());
    }

    #[test]
    fn garbage_is_rejected_not_panicking() {
        let c = cfg();
        assert!(c.verify("not-a-valid-cookie").is_none());
        assert!(c.verify("").is_none());
    }

    #[test]
    fn namespaced_cookie_names() {
        let c = cfg();
        assert_eq!(c.cookie_name("simple"), "auth-sidecar-simple");
        assert_eq!(c.cookie_name("main"), "auth-sidecar-main");
    }
}
