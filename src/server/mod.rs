// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the auth-sidecar project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Assembles the Rocket instance: shared state, CORS, and route mounting.
//!
//! State that a SIGHUP reload can replace (the active authenticator/MFA
//! provider sets and the ACL) lives behind its own `RwLock` so a reload never
//! blocks an in-flight request for longer than one `configure` pass.

pub mod guards;
pub mod handlers;

use std::sync::{Arc, RwLock};

use anyhow::Result;
use rocket::{Build, Rocket};
use rocket_cors::{AllowedOrigins, CorsOptions};

use crate::acl::Acl;
use crate::audit::AuditEmitter;
use crate::auth::providers::simple::SimpleAuthenticator;
use crate::auth::providers::token::TokenAuthenticator;
use crate::auth::AuthRegistry;
use crate::config::{Config, LoginConfig};
use crate::cookie::CookieConfig;
use crate::mfa::providers::totp::TotpProvider;
use crate::mfa::MfaRegistry;

/// State shared across every request, managed by Rocket and reachable from
/// the SIGHUP reload task via the `Arc` main.rs holds alongside it.
pub struct AppState {
    pub auth_registry: RwLock<AuthRegistry>,
    pub mfa_registry: RwLock<MfaRegistry>,
    pub acl: RwLock<Acl>,
    pub cookie_config: Arc<CookieConfig>,
    pub audit: AuditEmitter,
    pub login: LoginConfig,
}

impl AppState {
    /// Build the full provider set and activate it against `config`. Fails
    /// with the same errors [`crate::auth::AuthRegistry::configure`] and
    /// [`crate::acl::AclConfig::build`] can raise (§4.4 initialization
    /// failure policy).
    pub fn new(config: &Config) -> Result<Arc<Self>> {
        let cookie_config = Arc::new(config.cookie.clone());

        let mut auth_registry = AuthRegistry::new(vec![
            Box::new(SimpleAuthenticator::new(cookie_config.clone())),
            Box::new(TokenAuthenticator::new()),
        ]);
        let mut mfa_registry = MfaRegistry::new(vec![Box::new(TotpProvider::new())]);

        let document = config.as_document();
        auth_registry.configure(&document)?;
        mfa_registry.configure(&document)?;

        let acl = config.acl.build()?;
        let audit = AuditEmitter::from_config(&config.audit_log)?;

        Ok(Arc::new(AppState {
            auth_registry: RwLock::new(auth_registry),
            mfa_registry: RwLock::new(mfa_registry),
            acl: RwLock::new(acl),
            cookie_config,
            audit,
            login: config.login.clone(),
        }))
    }

    /// Re-run configuration against a freshly loaded document, swapping each
    /// reloadable piece independently. The authenticator/MFA registries and
    /// the cookie configuration are left as they were at startup -- the
    /// signing key and the provider set itself are not hot-reloadable,
    /// only *which* configured authenticators/rule-sets are active.
    pub fn reload(&self, config: &Config) -> Result<()> {
        let document = config.as_document();
        self.auth_registry.write().expect("lock poisoned").configure(&document)?;
        self.mfa_registry.write().expect("lock poisoned").configure(&document)?;
        let acl = config.acl.build()?;
        *self.acl.write().expect("lock poisoned") = acl;
        Ok(())
    }
}

/// Build the Rocket instance, mounting the five endpoints and the CORS
/// fairing (teacher's `rocket_cors`, wide open since every caller is a
/// reverse-proxy sub-request rather than a browser-originated one).
pub fn build_rocket(state: Arc<AppState>) -> Result<Rocket<Build>> {
    let cors = CorsOptions {
        allowed_origins: AllowedOrigins::all(),
        allow_credentials: true,
        ..Default::default()
    }
    .to_cors()?;

    Ok(rocket::build()
        .manage(state)
        .attach(cors)
        .mount(
            "/",
            rocket::routes![
                handlers::index,
                handlers::auth_get,
                handlers::auth_post,
                handlers::login_get,
                handlers::login_post,
                handlers::logout_get,
                handlers::logout_post,
                handlers::debug,
            ],
        ))
}
