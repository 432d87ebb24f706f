// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the auth-sidecar project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Config-file username/password Authenticator.
//!
//! Passwords are stored as base64-encoded unix crypt hashes, the same
//! convention as `openssl passwd -5 <password> | base64 -w0` -- this lets an
//! operator generate entries with tools already on the host.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use anyhow::Context;
use base64::Engine;
use rocket::http::CookieJar;
use serde::{Deserialize, Serialize};
use serde_yml::Value as YamlValue;

use crate::auth::{AuthRequest, Authenticator, LoginField, LoginOutcome, MfaConfig};
use crate::cookie::CookieConfig;
use crate::error::AuthError;
use crate::session::SessionStore;

/// One user entry under `providers.simple.users`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SimpleUserConfig {
    pub user: String,
    /// Base64-encoded unix crypt hash.
    pub pass: String,
    #[serde(default)]
    pub groups: Vec<String>,
    /// MFA configurations enrolled for this user, keyed by the owning MFA
    /// provider's id; values are passed through verbatim as attribute bags.
    #[serde(default)]
    pub mfa: Vec<MfaEntryConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MfaEntryConfig {
    pub provider: String,
    #[serde(flatten)]
    pub attributes: HashMap<String, YamlValue>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct SimpleProviderConfig {
    #[serde(default)]
    pub users: Vec<SimpleUserConfig>,
}

pub struct SimpleAuthenticator {
    cookie_config: Arc<CookieConfig>,
    users: RwLock<Vec<SimpleUserConfig>>,
}

impl SimpleAuthenticator {
    pub fn new(cookie_config: Arc<CookieConfig>) -> Self {
        SimpleAuthenticator {
            cookie_config,
            users: RwLock::new(Vec::new()),
        }
    }

    fn find_user(&self, name: &str) -> Option<SimpleUserConfig> {
        self.users
            .read()
            .expect("lock poisoned")
            .iter()
            .find(|u| u.user == name)
            .cloned()
    }
}

fn verify_password(stored: &str, candidate: &str) -> anyhow::Result<bool> {
    let decoded = base64::engine::general_purpose::STANDARD
        .decode(stored)
        .context("password hash is not valid base64")?;
    let hash = String::from_utf8(decoded).context("password hash is not valid utf-8")?;
    Ok(pwhash::unix::verify(candidate, &hash))
}

impl Authenticator for SimpleAuthenticator {
    fn id(&self) -> &str {
        "simple"
    }

    fn configure(&mut self, source: &YamlValue) -> Result<(), AuthError> {
        let section = source
            .get("providers")
            .and_then(|p| p.get("simple"))
            .ok_or(AuthError::Unconfigured)?;

        let parsed: SimpleProviderConfig = serde_yml::from_value(section.clone())
            .context("invalid providers.simple configuration")?;

        if parsed.users.is_empty() {
            return Err(AuthError::Unconfigured);
        }

        *self.users.write().expect("lock poisoned") = parsed.users;
        Ok(())
    }

    fn detect_user(
        &self,
        _req: &AuthRequest,
        jar: &CookieJar<'_>,
    ) -> Result<(String, Vec<String>), AuthError> {
        let store = SessionStore::new(&self.cookie_config, jar);
        let session = store.open(self.id());

        let Some(user) = session.get("user").map(|s| s.to_string()) else {
            return Err(AuthError::NoValidUser);
        };

        let groups = session
            .get("groups")
            .map(|g| g.split(',').filter(|s| !s.is_empty()).map(String::from).collect())
            .unwrap_or_default();

        // Renew unconditionally on every successful detect (§4.6).
        store.save(self.id(), &session);

        Ok((user, groups))
    }

    fn login(&self, req: &AuthRequest, jar: &CookieJar<'_>) -> Result<LoginOutcome, AuthError> {
        let username = req
            .param("simple-user")
            .ok_or(AuthError::NoValidUser)?
            .to_string();
        let password = req.param("simple-password").ok_or(AuthError::NoValidUser)?;

        let Some(user) = self.find_user(&username) else {
            return Err(AuthError::NoValidUser);
        };

        let ok = verify_password(&user.pass, password).map_err(AuthError::Other)?;
        if !ok {
            return Err(AuthError::NoValidUser);
        }

        let store = SessionStore::new(&self.cookie_config, jar);
        let mut session = store.open(self.id());
        session.set("user", user.user.clone());
        session.set("groups", user.groups.join(","));
        store.save(self.id(), &session);

        let mfa_configs = user
            .mfa
            .into_iter()
            .map(|entry| MfaConfig::new(entry.provider, entry.attributes))
            .collect();

        Ok(LoginOutcome {
            provider_id: self.id().to_string(),
            user: user.user,
            groups: user.groups,
            mfa_configs,
        })
    }

    fn login_fields(&self) -> Vec<LoginField> {
        vec![
            LoginField::new("Username", "simple-user", "your username", "text"),
            LoginField::new("Password", "simple-password", "your password", "password"),
        ]
    }

    fn logout(&self, jar: &CookieJar<'_>) -> Result<(), AuthError> {
        SessionStore::new(&self.cookie_config, jar).delete(self.id());
        Ok(())
    }

    fn supports_mfa(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rocket::{get, routes};

    fn cookie_config() -> Arc<CookieConfig> {
        Arc::new(CookieConfig {
            authentication_key: "test-key".into(),
            ..Default::default()
        })
    }

    fn configured() -> SimpleAuthenticator {
        let mut auth = SimpleAuthenticator::new(cookie_config());
        // "password" hashed with md5-crypt salt "xx", base64-encoded.
        let hash = pwhash::unix::crypt("password", "$1$xxxxxxxx$").unwrap();
        let encoded = base64::engine::general_purpose::STANDARD.encode(hash.as_bytes());
        let source = serde_yml::from_str::<YamlValue>(&format!(
            "providers:\n  simple:\n    users:\n      - user: alice\n        pass: \"{encoded}\"\n        groups: [admins]\n"
        ))
        .unwrap();
        auth.configure(&source).unwrap();
        auth
    }

    #[test]
    fn unconfigured_when_section_absent() {
        let mut auth = SimpleAuthenticator::new(cookie_config());
        let err = auth.configure(&YamlValue::Null);
        assert!(matches!(err, Err(AuthError::Unconfigured)));
    }

    #[get("/noop")]
    fn noop() -> &'static str {
        "ok"
    }

    #[test]
    fn login_then_detect_round_trips_through_session() {
        let auth = configured();
        let rocket = rocket::build().mount("/", routes![noop]);
        let client = rocket::local::blocking::Client::tracked(rocket).unwrap();
        client.get("/noop").dispatch();

        let mut req = AuthRequest::default();
        req.form.insert("simple-user".into(), "alice".into());
        req.form.insert("simple-password".into(), "password".into());

        let outcome = auth.login(&req, client.cookies()).unwrap();
        assert_eq!(outcome.user, "alice");
        assert_eq!(outcome.groups, vec!["admins".to_string()]);

        let (user, groups) = auth.detect_user(&req, client.cookies()).unwrap();
        assert_eq!(user, "alice");
        assert_eq!(groups, vec!["admins".to_string()]);
    }

    #[test]
    fn wrong_password_is_no_valid_user() {
        let auth = configured();
        let rocket = rocket::build().mount("/", routes![noop]);
        let client = rocket::local::blocking::Client::tracked(rocket).unwrap();
        client.get("/noop").dispatch();

        let mut req = AuthRequest::default();
        req.form.insert("simple-user".into(), "alice".into());
        req.form.insert("simple-password".into(), "wrong".into());

        let err = auth.login(&req, client.cookies());
        assert!(matches!(err, Err(AuthError::NoValidUser)));
    }
}
