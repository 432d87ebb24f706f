// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the auth-sidecar project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Configuration loading for the sidecar.
//!
//! The configuration document is a single hierarchical YAML object (§6).
//! Branches with a fixed shape (`acl`, `audit_log`, `cookie`, `listen`,
//! `login`) are parsed into typed structs; provider-specific subtrees
//! (`providers.*`, `mfa.*`) are left as raw [`serde_yml::Value`] and handed
//! to each provider's own `configure`, per spec §9's "plugin loading"
//! equivalence (the set of providers is fixed at build time; only
//! *activation* is configuration-driven).

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_yml::Value as YamlValue;

use crate::acl::AclConfig;
use crate::audit::AuditConfig;
use crate::cookie::CookieConfig;

fn default_listen_addr() -> String {
    "127.0.0.1".to_string()
}

fn default_listen_port() -> u16 {
    8080
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ListenConfig {
    #[serde(default = "default_listen_addr")]
    pub addr: String,
    #[serde(default = "default_listen_port")]
    pub port: u16,
}

impl Default for ListenConfig {
    fn default() -> Self {
        ListenConfig {
            addr: default_listen_addr(),
            port: default_listen_port(),
        }
    }
}

fn default_login_title() -> String {
    "Sign in".to_string()
}

/// Settings controlling how the login page is driven. Template rendering
/// itself is a Non-goal (spec §1); this only carries the values a renderer
/// elsewhere would need.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoginConfig {
    #[serde(default = "default_login_title")]
    pub title: String,
    #[serde(default)]
    pub default_method: Option<String>,
    #[serde(default = "default_redirect")]
    pub default_redirect: String,
    #[serde(default)]
    pub hide_mfa_field: bool,
    #[serde(default)]
    pub names: std::collections::HashMap<String, String>,
}

fn default_redirect() -> String {
    "/".to_string()
}

impl Default for LoginConfig {
    fn default() -> Self {
        LoginConfig {
            title: default_login_title(),
            default_method: None,
            default_redirect: default_redirect(),
            hide_mfa_field: false,
            names: std::collections::HashMap::new(),
        }
    }
}

/// Root configuration document.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct Config {
    #[serde(default)]
    pub acl: AclConfig,
    #[serde(default)]
    pub audit_log: AuditConfig,
    pub cookie: CookieConfig,
    #[serde(default)]
    pub listen: ListenConfig,
    #[serde(default)]
    pub login: LoginConfig,

    /// Everything else (`providers.*`, `mfa.*`), preserved verbatim so each
    /// Authenticator/MfaProvider can parse its own subtree out of the full
    /// document, as their `configure` contract requires.
    #[serde(flatten)]
    pub raw: std::collections::BTreeMap<String, YamlValue>,
}

impl Config {
    pub fn from_str(contents: &str) -> Result<Self> {
        serde_yml::from_str(contents).context("parsing configuration document")
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("reading configuration file {path:?}"))?;
        Self::from_str(&contents)
    }

    /// Re-serialize the whole document back to a [`YamlValue`], the shape
    /// `Authenticator::configure`/`MfaProvider::configure` expect.
    pub fn as_document(&self) -> YamlValue {
        serde_yml::to_value(self).unwrap_or(YamlValue::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_document_parses_with_defaults() {
        let doc = "cookie:\n  authentication_key: secret\n";
        let config = Config::from_str(doc).unwrap();
        assert_eq!(config.listen.port, 8080);
        assert_eq!(config.login.title, "Sign in");
        assert_eq!(config.cookie.authentication_key, "secret");
    }

    #[test]
    fn provider_subtrees_round_trip_through_as_document() {
        let doc = "cookie:\n  authentication_key: secret\nproviders:\n  simple:\n    users: []\n";
        let config = Config::from_str(doc).unwrap();
        let document = config.as_document();
        assert!(document.get("providers").and_then(|p| p.get("simple")).is_some());
    }
}
