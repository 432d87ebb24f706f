// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the auth-sidecar project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! The [`MfaProvider`] contract, coupled to the login flow.
//!
//! Duo and Yubikey MFA are external collaborators (spec §1); `auth-sidecar`
//! implements `totp` in full since it needs no network-bound upstream.

pub mod providers;
pub mod registry;

use rocket::http::CookieJar;
use serde_yml::Value as YamlValue;

pub use registry::MfaRegistry;

use crate::auth::{AuthRequest, MfaConfig};
use crate::error::AuthError;

/// A pluggable second-factor validator.
pub trait MfaProvider: Send + Sync {
    /// Stable identifier, used to filter which `mfaConfigs` belong to this
    /// provider (other providers' configs must be ignored).
    fn id(&self) -> &str;

    /// Same sentinel semantics as [`crate::auth::Authenticator::configure`].
    fn configure(&mut self, source: &YamlValue) -> Result<(), AuthError>;

    /// Validate the submitted second factor for `user` against the subset of
    /// `mfa_configs` belonging to this provider. Returns `Ok(())` on
    /// success, `Err(AuthError::NoValidUser)` if this provider did not
    /// verify (try the next one), or any other error to abort.
    fn validate(
        &self,
        req: &AuthRequest,
        jar: &CookieJar<'_>,
        user: &str,
        mfa_configs: &[MfaConfig],
    ) -> Result<(), AuthError>;
}
