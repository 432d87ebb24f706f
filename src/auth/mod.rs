// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the auth-sidecar project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! The [`Authenticator`] contract and the static description types it hands
//! back to the login form.
//!
//! Individual providers (simple, token, LDAP, Crowd, OIDC, Google, Yubikey)
//! are external collaborators: this module specifies only the contract they
//! satisfy. `auth-sidecar` ships concrete implementations for `simple` and
//! `token` (the two that need no network-bound upstream); the rest would
//! parse their own `providers.*` subtree the same way, out of
//! [`crate::config::Config::raw`].

pub mod providers;
pub mod registry;

use std::collections::HashMap;

use rocket::http::CookieJar;
use serde_yml::Value as YamlValue;

use crate::error::AuthError;

pub use registry::AuthRegistry;

/// Input type of the named suffix used to locate an MFA token across a
/// namespace-prefixed login form.
pub const MFA_TOKEN_FIELD_SUFFIX: &str = "mfa-token";

/// One input the login page should render for a given Authenticator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginField {
    pub label: String,
    pub name: String,
    pub placeholder: String,
    pub input_type: String,
    pub action: Option<String>,
}

impl LoginField {
    pub fn new(
        label: impl Into<String>,
        name: impl Into<String>,
        placeholder: impl Into<String>,
        input_type: impl Into<String>,
    ) -> Self {
        LoginField {
            label: label.into(),
            name: name.into(),
            placeholder: placeholder.into(),
            input_type: input_type.into(),
            action: None,
        }
    }

    pub fn with_action(mut self, action: impl Into<String>) -> Self {
        self.action = Some(action);
        self
    }
}

/// An opaque MFA configuration attached to a user by the Authenticator that
/// authenticated them, read-only once produced, with typed accessors over an
/// attribute bag (§9 "Typed attribute bag for MFAConfig").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MfaConfig {
    pub provider_id: String,
    attributes: HashMap<String, YamlValue>,
}

impl MfaConfig {
    pub fn new(provider_id: impl Into<String>, attributes: HashMap<String, YamlValue>) -> Self {
        MfaConfig {
            provider_id: provider_id.into(),
            attributes,
        }
    }

    pub fn as_string(&self, key: &str) -> Option<String> {
        match self.attributes.get(key)? {
            YamlValue::String(s) => Some(s.clone()),
            _ => None,
        }
    }

    pub fn as_int(&self, key: &str) -> Option<i64> {
        match self.attributes.get(key)? {
            YamlValue::Number(n) => n.as_i64(),
            _ => None,
        }
    }
}

/// Minimal view of an inbound request that providers need: header map and
/// decoded form fields. Built once by the router per-request and passed by
/// reference to providers, which remain framework-agnostic apart from this
/// and the cookie jar.
#[derive(Debug, Clone, Default)]
pub struct AuthRequest {
    pub headers: HashMap<String, String>,
    pub query: HashMap<String, String>,
    pub form: HashMap<String, String>,
    pub remote_addr: Option<String>,
}

impl AuthRequest {
    /// Look up a value by exact key across query and form, form taking
    /// precedence (POST data overrides any same-named query parameter).
    pub fn param(&self, key: &str) -> Option<&str> {
        self.form
            .get(key)
            .or_else(|| self.query.get(key))
            .map(|s| s.as_str())
    }

    /// Find a form value by suffix match across all keys -- used to locate
    /// the MFA token field, which is namespace-prefixed per provider
    /// (`<provider-id>-mfa-token`).
    pub fn form_value_by_suffix(&self, suffix: &str) -> Option<&str> {
        self.form
            .iter()
            .find(|(k, _)| k.ends_with(suffix))
            .map(|(_, v)| v.as_str())
    }
}

/// The result of a successful [`Authenticator::login`] call: the identified
/// user, their groups, and any MFA configurations attached to them.
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    /// Id of the Authenticator that produced this outcome -- the router
    /// needs this to strip a half-established session if MFA validation
    /// subsequently fails (spec §4.4, "critical -- do not leak a
    /// half-established session").
    pub provider_id: String,
    pub user: String,
    pub groups: Vec<String>,
    pub mfa_configs: Vec<MfaConfig>,
}

/// A pluggable identity source. See the module doc for scope.
pub trait Authenticator: Send + Sync {
    /// Stable identifier (letters, digits, underscore). Used for session
    /// namespacing and login-form field prefixes.
    fn id(&self) -> &str;

    /// Parse this provider's subtree out of the full configuration document.
    /// Returns `Err(AuthError::Unconfigured)` if the section is absent or
    /// incomplete, propagating any other validation error as-is.
    fn configure(&mut self, source: &YamlValue) -> Result<(), AuthError>;

    /// Identify the caller from cookies/headers alone, with no interactive
    /// step. Returns `Err(AuthError::NoValidUser)` if this provider cannot
    /// identify the caller (the registry will try the next one).
    fn detect_user(
        &self,
        req: &AuthRequest,
        jar: &CookieJar<'_>,
    ) -> Result<(String, Vec<String>), AuthError>;

    /// Process a submitted login form (or OAuth callback) and, on success,
    /// plant this provider's session material in `jar`.
    fn login(&self, req: &AuthRequest, jar: &CookieJar<'_>) -> Result<LoginOutcome, AuthError>;

    /// Static description of the form inputs the login UI should render for
    /// this provider. Empty means "no interactive login" (e.g. a
    /// header-only or OAuth-callback-only provider).
    fn login_fields(&self) -> Vec<LoginField> {
        Vec::new()
    }

    /// Tear down this provider's own session material only.
    fn logout(&self, jar: &CookieJar<'_>) -> Result<(), AuthError>;

    /// Whether the MFA field should be appended to this provider's form.
    fn supports_mfa(&self) -> bool {
        false
    }
}
