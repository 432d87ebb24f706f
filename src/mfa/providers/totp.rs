// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the auth-sidecar project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Time-based one-time password MfaProvider (RFC 6238, SHA-1, 30s step,
//! 6 digits -- the parameters every common authenticator app assumes).

use hmac::{Hmac, Mac};
use rocket::http::CookieJar;
use serde::{Deserialize, Serialize};
use serde_yml::Value as YamlValue;
use sha1::Sha1;

use crate::auth::{AuthRequest, MfaConfig, MFA_TOKEN_FIELD_SUFFIX};
use crate::error::AuthError;
use crate::mfa::MfaProvider;

const TIME_STEP_SECS: u64 = 30;
const DIGITS: u32 = 6;
/// Number of adjacent time steps tolerated on either side of "now", to
/// absorb clock skew between the server and the user's device.
const SKEW_STEPS: i64 = 1;

type HmacSha1 = Hmac<Sha1>;

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct TotpProviderConfig {
    #[serde(default)]
    pub enabled: bool,
}

pub struct TotpProvider {
    enabled: bool,
}

impl TotpProvider {
    pub fn new() -> Self {
        TotpProvider { enabled: false }
    }
}

impl Default for TotpProvider {
    fn default() -> Self {
        Self::new()
    }
}

/// RFC 4226 HOTP value for `counter` under `secret`, as a zero-padded
/// `digits`-length decimal string.
fn hotp(secret: &[u8], counter: u64, digits: u32) -> String {
    let mut mac = HmacSha1::new_from_slice(secret).expect("HMAC accepts keys of any length");
    mac.update(&counter.to_be_bytes());
    let hash = mac.finalize().into_bytes();

    let offset = (hash[hash.len() - 1] & 0x0f) as usize;
    let truncated = ((hash[offset] as u32 & 0x7f) << 24)
        | ((hash[offset + 1] as u32) << 16)
        | ((hash[offset + 2] as u32) << 8)
        | (hash[offset + 3] as u32);

    let modulo = 10u32.pow(digits);
    format!("{:0width$}", truncated % modulo, width = digits as usize)
}

fn current_counter(now_unix: u64) -> u64 {
    now_unix / TIME_STEP_SECS
}

impl MfaProvider for TotpProvider {
    fn id(&self) -> &str {
        "totp"
    }

    fn configure(&mut self, source: &YamlValue) -> Result<(), AuthError> {
        let section = source
            .get("mfa")
            .and_then(|m| m.get("totp"))
            .ok_or(AuthError::Unconfigured)?;

        let parsed: TotpProviderConfig =
            serde_yml::from_value(section.clone()).map_err(|e| AuthError::Other(e.into()))?;

        if !parsed.enabled {
            return Err(AuthError::Unconfigured);
        }

        self.enabled = true;
        Ok(())
    }

    fn validate(
        &self,
        req: &AuthRequest,
        _jar: &CookieJar<'_>,
        _user: &str,
        mfa_configs: &[MfaConfig],
    ) -> Result<(), AuthError> {
        // Configs belonging to other providers are ignored (§4.3).
        let Some(config) = mfa_configs.iter().find(|c| c.provider_id == self.id()) else {
            return Err(AuthError::NoValidUser);
        };

        let secret_b32 = config.as_string("secret").ok_or_else(|| {
            AuthError::Other(anyhow::anyhow!("totp mfa config is missing 'secret'"))
        })?;
        let secret = base32::decode(base32::Alphabet::Rfc4648 { padding: false }, &secret_b32)
            .ok_or_else(|| AuthError::Other(anyhow::anyhow!("totp secret is not valid base32")))?;

        let submitted = req
            .form_value_by_suffix(MFA_TOKEN_FIELD_SUFFIX)
            .ok_or(AuthError::NoValidUser)?;

        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("system clock is after the epoch")
            .as_secs();
        let counter = current_counter(now);

        for skew in -SKEW_STEPS..=SKEW_STEPS {
            let candidate_counter = (counter as i64 + skew).max(0) as u64;
            if hotp(&secret, candidate_counter, DIGITS) == submitted {
                return Ok(());
            }
        }

        Err(AuthError::NoValidUser)
    }
}
