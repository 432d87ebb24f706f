// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the auth-sidecar project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! [`AuthRegistry`]: the ordered fan-out across active [`Authenticator`]s.
//!
//! Registry mutation (a `configure` pass, at startup or on reload) swaps the
//! active list under a writer lock; request-serving paths take the reader
//! lock for the duration of one provider iteration (§5). Providers
//! themselves are required to be internally safe for concurrent use -- the
//! registry does not serialize calls across requests.

use std::collections::HashMap;
use std::sync::RwLock;

use log::{debug, warn};
use rocket::http::CookieJar;
use serde_yml::Value as YamlValue;

use super::{AuthRequest, Authenticator, LoginField, LoginOutcome, MFA_TOKEN_FIELD_SUFFIX};
use crate::error::{AuthError, ConfigError};

/// Ordered set of registered Authenticators, with the subset active under
/// the current configuration recomputed on every `configure` call.
pub struct AuthRegistry {
    all: Vec<Box<dyn Authenticator>>,
    active: RwLock<Vec<usize>>,
}

impl AuthRegistry {
    /// Build a registry from the fixed, build-time list of known providers.
    /// Registration order is registry order; place cheap local providers
    /// before network-bound ones (§4.2).
    pub fn new(providers: Vec<Box<dyn Authenticator>>) -> Self {
        AuthRegistry {
            all: providers,
            active: RwLock::new(Vec::new()),
        }
    }

    /// Re-run `configure` on every registered provider against `source`,
    /// atomically swapping in the new active subset. Fails with
    /// [`ConfigError::NoAuthenticators`] if none activate (§4.4
    /// "Initialization failure policy" -- fatal at startup, and equally
    /// refused on a reload that would leave the server with none).
    pub fn configure(&mut self, source: &YamlValue) -> Result<(), ConfigError> {
        let mut active = Vec::new();

        for (index, provider) in self.all.iter_mut().enumerate() {
            match provider.configure(source) {
                Ok(()) => {
                    debug!("authenticator '{}' activated", provider.id());
                    active.push(index);
                }
                Err(AuthError::Unconfigured) => {
                    debug!("authenticator '{}' not configured, skipping", provider.id());
                }
                Err(other) => {
                    return Err(ConfigError::Other(anyhow::anyhow!(
                        "authenticator '{}' failed to configure: {other}",
                        provider.id()
                    )));
                }
            }
        }

        if active.is_empty() {
            return Err(ConfigError::NoAuthenticators);
        }

        *self.active.write().expect("lock poisoned") = active;
        Ok(())
    }

    fn active_providers(&self) -> Vec<&dyn Authenticator> {
        let active = self.active.read().expect("lock poisoned");
        active.iter().map(|&i| self.all[i].as_ref()).collect()
    }

    /// Iterate active providers in order; the first to return a user wins.
    /// `NoValidUser` advances to the next provider; any other error
    /// short-circuits and propagates. If none identify the caller, returns
    /// `Err(AuthError::NoValidUser)`.
    pub fn detect_user(
        &self,
        req: &AuthRequest,
        jar: &CookieJar<'_>,
    ) -> Result<(String, Vec<String>), AuthError> {
        for provider in self.active_providers() {
            match provider.detect_user(req, jar) {
                Ok(result) => return Ok(result),
                Err(AuthError::NoValidUser) => continue,
                Err(other) => return Err(other),
            }
        }
        Err(AuthError::NoValidUser)
    }

    /// Same iteration discipline as [`Self::detect_user`], returning the
    /// provider's full [`LoginOutcome`] (including any MFA configs) on
    /// success.
    pub fn login_user(
        &self,
        req: &AuthRequest,
        jar: &CookieJar<'_>,
    ) -> Result<LoginOutcome, AuthError> {
        for provider in self.active_providers() {
            match provider.login(req, jar) {
                Ok(outcome) => return Ok(outcome),
                Err(AuthError::NoValidUser) => continue,
                Err(other) => return Err(other),
            }
        }
        Err(AuthError::NoValidUser)
    }

    /// Invoke every active provider's logout unconditionally; the first hard
    /// error wins (later providers still get a chance to tear down their own
    /// state first -- logout must not stop early on the first failure).
    pub fn logout_user(&self, jar: &CookieJar<'_>) -> Result<(), AuthError> {
        let mut first_error = None;
        for provider in self.active_providers() {
            if let Err(err) = provider.logout(jar) {
                warn!("authenticator '{}' logout failed: {err}", provider.id());
                if first_error.is_none() {
                    first_error = Some(err);
                }
            }
        }
        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// `providerId → LoginFields+` to drive the login form. A provider that
    /// supports MFA and has at least one field gets the MFA token field
    /// appended, unless `hide_mfa_field` is set.
    pub fn login_form_fields(&self, hide_mfa_field: bool) -> HashMap<String, Vec<LoginField>> {
        let mut result = HashMap::new();
        for provider in self.active_providers() {
            let mut fields = provider.login_fields();
            if !fields.is_empty() && provider.supports_mfa() && !hide_mfa_field {
                fields.push(LoginField::new(
                    "MFA Token",
                    format!("{}-{}", provider.id(), MFA_TOKEN_FIELD_SUFFIX),
                    "",
                    "text",
                ));
            }
            if !fields.is_empty() {
                result.insert(provider.id().to_string(), fields);
            }
        }
        result
    }
}
