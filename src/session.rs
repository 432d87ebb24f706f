// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the auth-sidecar project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Signed, cookie-backed key/value store. One logical namespace per provider
//! (plus the `"main"` flow-state namespace used by [`crate::redirect`]).
//!
//! Reads never fail hard: an absent, malformed, or tampered cookie simply
//! yields an empty session (§4.6, §7). Writes mint or renew the cookie in the
//! response jar; deletion re-writes the cookie with a negative `MaxAge`.

use std::collections::HashMap;

use rocket::http::{Cookie, CookieJar, SameSite};
use rocket::time::Duration;

use crate::cookie::CookieConfig;

/// A provider-scoped session, backed by a single signed cookie.
#[derive(Debug, Clone, Default)]
pub struct Session {
    values: HashMap<String, String>,
    dirty: bool,
}

impl Session {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(|s| s.as_str())
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
        self.dirty = true;
    }

    pub fn remove(&mut self, key: &str) {
        if self.values.remove(key).is_some() {
            self.dirty = true;
        }
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Opens, writes, and deletes namespaced session cookies.
pub struct SessionStore<'a> {
    cookie_config: &'a CookieConfig,
    jar: &'a CookieJar<'a>,
}

impl<'a> SessionStore<'a> {
    pub fn new(cookie_config: &'a CookieConfig, jar: &'a CookieJar<'a>) -> Self {
        SessionStore { cookie_config, jar }
    }

    /// Open the named provider's session. Never fails: a missing or
    /// undecodable cookie yields an empty [`Session`].
    pub fn open(&self, provider_id: &str) -> Session {
        let name = self.cookie_config.cookie_name(provider_id);
        let Some(raw) = self.jar.get(&name) else {
            return Session::default();
        };

        let Some(payload) = self.cookie_config.verify(raw.value()) else {
            return Session::default();
        };

        let Ok(values) = serde_json::from_slice::<HashMap<String, String>>(&payload) else {
            return Session::default();
        };

        Session {
            values,
            dirty: false,
        }
    }

    /// Persist (or renew) a session. Any time a cookie-backed session is used
    /// to identify a caller, its `MaxAge` is reset and the cookie re-written,
    /// even when the content did not change -- renewal is unconditional.
    pub fn save(&self, provider_id: &str, session: &Session) {
        let name = self.cookie_config.cookie_name(provider_id);

        if session.is_empty() {
            self.delete(provider_id);
            return;
        }

        let payload = serde_json::to_vec(&session.values).unwrap_or_default();
        let signed = self.cookie_config.sign(&payload);

        let mut builder = Cookie::build((name, signed))
            .path("/")
            .http_only(true)
            .secure(self.cookie_config.secure)
            .same_site(SameSite::Lax)
            .max_age(Duration::seconds(self.cookie_config.expire));

        if let Some(domain) = &self.cookie_config.domain {
            builder = builder.domain(domain.clone());
        }

        self.jar.add(builder.build());
    }

    /// Delete the named provider's session cookie by re-writing it with a
    /// negative `MaxAge`.
    pub fn delete(&self, provider_id: &str) {
        let name = self.cookie_config.cookie_name(provider_id);
        let mut builder = Cookie::build(name).path("/");
        if let Some(domain) = &self.cookie_config.domain {
            builder = builder.domain(domain.clone());
        }
        self.jar.remove(builder.build());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rocket::http::Status;
    use rocket::local::blocking::Client;
    use rocket::{get, routes};

    fn config() -> CookieConfig {
        CookieConfig {
            authentication_key: "test-key".into(),
            ..Default::default()
        }
    }

    #[get("/write")]
    fn write_route(jar: &CookieJar<'_>) -> Status {
        let cfg = config();
        let store = SessionStore::new(&cfg, jar);
        let mut session = store.open("simple");
        assert!(session.is_empty());
        session.set("user", "alice");
        store.save("simple", &session);
        Status::Ok
    }

    #[get("/read")]
    fn read_route(jar: &CookieJar<'_>) -> String {
        let cfg = config();
        let store = SessionStore::new(&cfg, jar);
        store.open("simple").get("user").unwrap_or("").to_string()
    }

    #[get("/logout")]
    fn logout_route(jar: &CookieJar<'_>) -> Status {
        let cfg = config();
        let store = SessionStore::new(&cfg, jar);
        store.delete("simple");
        Status::Ok
    }

    fn client() -> Client {
        let rocket = rocket::build().mount("/", routes![write_route, read_route, logout_route]);
        Client::tracked(rocket).expect("valid rocket instance")
    }

    #[test]
    fn opening_missing_cookie_is_empty_session() {
        let client = client();
        let resp = client.get("/read").dispatch();
        assert_eq!(resp.into_string().unwrap(), "");
    }

    #[test]
    fn write_then_read_round_trips_values() {
        let client = client();
        assert_eq!(client.get("/write").dispatch().status(), Status::Ok);
        assert_eq!(client.get("/read").dispatch().into_string().unwrap(), "alice");
    }

    #[test]
    fn tampered_cookie_reads_as_empty_session() {
        let client = client();
        client.get("/write").dispatch();
        client.cookies().add(Cookie::new("auth-sidecar-simple", "garbage"));
        assert_eq!(client.get("/read").dispatch().into_string().unwrap(), "");
    }

    #[test]
    fn delete_clears_session() {
        let client = client();
        client.get("/write").dispatch();
        client.get("/logout").dispatch();
        assert_eq!(client.get("/read").dispatch().into_string().unwrap(), "");
    }
}
