// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the auth-sidecar project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! # auth-sidecar
//!
//! An authentication and authorization sidecar for reverse proxies. A
//! front-end proxy issues a sub-request to `/auth` for every protected
//! request; this crate identifies the caller, consults an access-control
//! policy, and returns 200 (with an identity header), 401, or 403.
//! Complementary endpoints (`/login`, `/logout`, `/debug`) drive pluggable
//! login providers and session teardown.
//!
//! ## Main components
//!
//! - **acl**: the rule-based access-control evaluator
//! - **auth**: the Authenticator contract and the registry that fans login
//!   and identity detection out across active providers
//! - **mfa**: the second-factor contract and registry coupled to login
//! - **cookie** / **session**: signed, provider-namespaced session cookies
//! - **redirect**: post-login target resolution across OAuth round-trips
//! - **audit**: structured, filtered event emission
//! - **server**: the Rocket-based request router binding all of the above

pub mod acl;
pub mod audit;
pub mod auth;
pub mod config;
pub mod cookie;
pub mod error;
pub mod identity;
pub mod mfa;
pub mod redirect;
pub mod server;
pub mod session;
