// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the auth-sidecar project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Shared sentinel errors for the authentication and authorization engine.
//!
//! Two control-flow sentinels drive registry iteration: [`AuthError::Unconfigured`]
//! tells a registry to exclude a provider, and [`AuthError::NoValidUser`] tells it
//! to keep trying the next one. Every other variant is a hard error: it aborts
//! iteration and is reported as an HTTP 500 at the request boundary.

use thiserror::Error;

/// Errors returned by [`crate::auth::Authenticator`] and [`crate::mfa::MfaProvider`]
/// methods.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The provider has no configuration section (or an incomplete one) and
    /// should be excluded from the active registry. Never surfaced to a caller.
    #[error("provider is not configured")]
    Unconfigured,

    /// Credentials did not match this provider specifically; the registry should
    /// advance to the next active provider rather than treat this as fatal.
    #[error("no valid user found")]
    NoValidUser,

    /// Any other failure. Short-circuits registry iteration and becomes a 500.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Errors raised while validating or loading configuration. These are always
/// fatal at startup/reload time, never at request time.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("rule_sets[{rule_set}].rules[{rule}]: {reason}")]
    InvalidRule {
        rule_set: usize,
        rule: usize,
        reason: String,
    },

    #[error("rule_sets[{rule_set}].rules[{rule}]: invalid regexp: {source}")]
    InvalidRegex {
        rule_set: usize,
        rule: usize,
        #[source]
        source: regex::Error,
    },

    #[error("no authenticators are configured; the server cannot start")]
    NoAuthenticators,

    #[error("audit sink {uri:?}: {reason}")]
    InvalidAuditSink { uri: String, reason: String },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
