// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the auth-sidecar project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! [`MfaRegistry`]: ordered fan-out across active [`MfaProvider`]s.

use std::sync::RwLock;

use log::debug;
use rocket::http::CookieJar;
use serde_yml::Value as YamlValue;

use super::MfaProvider;
use crate::auth::{AuthRequest, MfaConfig};
use crate::error::AuthError;

pub struct MfaRegistry {
    all: Vec<Box<dyn MfaProvider>>,
    active: RwLock<Vec<usize>>,
}

impl MfaRegistry {
    pub fn new(providers: Vec<Box<dyn MfaProvider>>) -> Self {
        MfaRegistry {
            all: providers,
            active: RwLock::new(Vec::new()),
        }
    }

    /// Configure every registered provider; an empty active set is *not* an
    /// error here (unlike [`crate::auth::AuthRegistry`]) -- MFA is optional
    /// at the system level, and [`Self::validate`] is vacuously satisfied
    /// whenever a user has no `mfaConfigs`.
    pub fn configure(&mut self, source: &YamlValue) -> Result<(), AuthError> {
        let mut active = Vec::new();
        for (index, provider) in self.all.iter_mut().enumerate() {
            match provider.configure(source) {
                Ok(()) => {
                    debug!("mfa provider '{}' activated", provider.id());
                    active.push(index);
                }
                Err(AuthError::Unconfigured) => {
                    debug!("mfa provider '{}' not configured, skipping", provider.id());
                }
                Err(other) => return Err(other),
            }
        }
        *self.active.write().expect("lock poisoned") = active;
        Ok(())
    }

    /// If `mfa_configs` is empty, succeed immediately without consulting any
    /// provider. Otherwise iterate active providers in order; first success
    /// wins. If every provider returns `NoValidUser`, so does this call.
    pub fn validate(
        &self,
        req: &AuthRequest,
        jar: &CookieJar<'_>,
        user: &str,
        mfa_configs: &[MfaConfig],
    ) -> Result<(), AuthError> {
        if mfa_configs.is_empty() {
            return Ok(());
        }

        let active = self.active.read().expect("lock poisoned");
        for &index in active.iter() {
            let provider = self.all[index].as_ref();
            match provider.validate(req, jar, user, mfa_configs) {
                Ok(()) => return Ok(()),
                Err(AuthError::NoValidUser) => continue,
                Err(other) => return Err(other),
            }
        }
        Err(AuthError::NoValidUser)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_mfa_configs_succeed_without_consulting_providers() {
        struct AlwaysFails;
        impl MfaProvider for AlwaysFails {
            fn id(&self) -> &str {
                "always-fails"
            }
            fn configure(&mut self, _source: &YamlValue) -> Result<(), AuthError> {
                Ok(())
            }
            fn validate(
                &self,
                _req: &AuthRequest,
                _jar: &CookieJar<'_>,
                _user: &str,
                _mfa_configs: &[MfaConfig],
            ) -> Result<(), AuthError> {
                panic!("should not be consulted");
            }
        }

        let mut registry = MfaRegistry::new(vec![Box::new(AlwaysFails)]);
        registry.configure(&YamlValue::Null).unwrap();

        let rocket = rocket::build();
        let client = rocket::local::blocking::Client::tracked(rocket).unwrap();
        client.get("/").dispatch();

        let req = AuthRequest::default();
        let result = registry.validate(&req, client.cookies(), "alice", &[]);
        assert!(result.is_ok());
    }
}
