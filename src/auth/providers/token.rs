// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the auth-sidecar project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Static bearer-token Authenticator.
//!
//! Stateless: identity is derived straight from the `Authorization` header
//! on every request, so this provider never touches cookies and has no
//! interactive login form -- it is detect-only.

use std::sync::RwLock;

use anyhow::Context;
use rocket::http::CookieJar;
use serde::{Deserialize, Serialize};
use serde_yml::Value as YamlValue;

use crate::auth::{AuthRequest, Authenticator, LoginOutcome};
use crate::error::AuthError;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TokenEntryConfig {
    pub token: String,
    pub user: String,
    #[serde(default)]
    pub groups: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct TokenProviderConfig {
    #[serde(default)]
    pub tokens: Vec<TokenEntryConfig>,
}

pub struct TokenAuthenticator {
    tokens: RwLock<Vec<TokenEntryConfig>>,
}

impl TokenAuthenticator {
    pub fn new() -> Self {
        TokenAuthenticator {
            tokens: RwLock::new(Vec::new()),
        }
    }
}

impl Default for TokenAuthenticator {
    fn default() -> Self {
        Self::new()
    }
}

impl Authenticator for TokenAuthenticator {
    fn id(&self) -> &str {
        "token"
    }

    fn configure(&mut self, source: &YamlValue) -> Result<(), AuthError> {
        let section = source
            .get("providers")
            .and_then(|p| p.get("token"))
            .ok_or(AuthError::Unconfigured)?;

        let parsed: TokenProviderConfig = serde_yml::from_value(section.clone())
            .context("invalid providers.token configuration")?;

        if parsed.tokens.is_empty() {
            return Err(AuthError::Unconfigured);
        }

        *self.tokens.write().expect("lock poisoned") = parsed.tokens;
        Ok(())
    }

    fn detect_user(
        &self,
        req: &AuthRequest,
        _jar: &CookieJar<'_>,
    ) -> Result<(String, Vec<String>), AuthError> {
        let header = req
            .headers
            .get("authorization")
            .ok_or(AuthError::NoValidUser)?;
        let token = header.strip_prefix("Bearer ").ok_or(AuthError::NoValidUser)?;

        let tokens = self.tokens.read().expect("lock poisoned");
        tokens
            .iter()
            .find(|t| t.token == token)
            .map(|t| (t.user.clone(), t.groups.clone()))
            .ok_or(AuthError::NoValidUser)
    }

    /// Token has no interactive login step; it always defers to the next
    /// Authenticator.
    fn login(&self, _req: &AuthRequest, _jar: &CookieJar<'_>) -> Result<LoginOutcome, AuthError> {
        Err(AuthError::NoValidUser)
    }

    fn logout(&self, _jar: &CookieJar<'_>) -> Result<(), AuthError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rocket::{get, routes};

    fn configured() -> TokenAuthenticator {
        let mut auth = TokenAuthenticator::new();
        let source = serde_yml::from_str::<YamlValue>(
            "providers:\n  token:\n    tokens:\n      - token: secret123\n        user: svc\n        groups: [services]\n",
        )
        .unwrap();
        auth.configure(&source).unwrap();
        auth
    }

    #[get("/noop")]
    fn noop() -> &'static str {
        "ok"
    }

    fn jar() -> rocket::local::blocking::Client {
        rocket::local::blocking::Client::tracked(rocket::build().mount("/", routes![noop])).unwrap()
    }

    #[test]
    fn unconfigured_when_section_absent() {
        let mut auth = TokenAuthenticator::new();
        assert!(matches!(auth.configure(&YamlValue::Null), Err(AuthError::Unconfigured)));
    }

    #[test]
    fn matching_bearer_token_identifies_caller() {
        let auth = configured();
        let client = jar();
        client.get("/noop").dispatch();

        let mut req = AuthRequest::default();
        req.headers.insert("authorization".into(), "Bearer secret123".into());

        let (user, groups) = auth.detect_user(&req, client.cookies()).unwrap();
        assert_eq!(user, "svc");
        assert_eq!(groups, vec!["services".to_string()]);
    }

    #[test]
    fn missing_header_is_no_valid_user() {
        let auth = configured();
        let client = jar();
        client.get("/noop").dispatch();
        let req = AuthRequest::default();
        assert!(matches!(
            auth.detect_user(&req, client.cookies()),
            Err(AuthError::NoValidUser)
        ));
    }
}
