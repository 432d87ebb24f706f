// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the auth-sidecar project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Concrete Authenticator implementations.
//!
//! `simple` (config-file username/password) and `token` (static bearer
//! tokens) are implemented in full -- they need no network-bound upstream.
//! LDAP, Crowd, OIDC, Google OAuth, and Yubikey are external collaborators
//! and are not implemented here; their `providers.*` subtrees still parse
//! as raw YAML via [`crate::config::Config::raw`].

pub mod simple;
pub mod token;
