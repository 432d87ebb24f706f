// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the auth-sidecar project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Post-login redirect target resolution, surviving OAuth round-trips.
//!
//! Inputs are considered in order: query `rd`, query `go`, form `go`, the
//! flow-state session, then a caller-supplied fallback. The winning source
//! also supplies the initial pass-through parameter bag; the target's own
//! query string is merged into that bag (appending, not replacing) before
//! the selector parameter is dropped and the whole thing is re-serialized.

use thiserror::Error;
use url::Url;

use crate::auth::AuthRequest;
use crate::session::Session;

#[derive(Debug, Error)]
pub enum RedirectError {
    #[error("redirect target is not a valid URL: {0}")]
    MalformedTarget(#[from] url::ParseError),
}

/// Base a relative target (e.g. `/app`, the common nginx-sso post-login
/// path) is resolved against so it can go through the same query-merge path
/// as an absolute one. The scheme and host are discarded again once the
/// path and merged query string are re-assembled; only relative targets
/// reach this base at all.
const RELATIVE_BASE: &str = "http://redirect.invalid";

/// Resolves the post-login redirect target for a request.
pub struct RedirectResolver<'a> {
    fallback: &'a str,
}

impl<'a> RedirectResolver<'a> {
    pub fn new(fallback: &'a str) -> Self {
        RedirectResolver { fallback }
    }

    /// Resolve the target URL, merging pass-through query parameters per
    /// spec §4.5. `flow_session` is the `<prefix>-main` session, read (not
    /// written) here; callers persist the chosen target into it themselves
    /// on the GET branch of the login flow.
    pub fn resolve(
        &self,
        req: &AuthRequest,
        flow_session: &Session,
    ) -> Result<String, RedirectError> {
        let (target, mut bag) = if let Some(v) = req.query.get("rd") {
            (v.clone(), query_bag(&req.query))
        } else if let Some(v) = req.query.get("go") {
            (v.clone(), query_bag(&req.query))
        } else if let Some(v) = req.form.get("go") {
            (v.clone(), Vec::new())
        } else if let Some(v) = flow_session.get("redirect") {
            (v.to_string(), Vec::new())
        } else {
            // No selector was supplied at all: hand back the configured
            // fallback untouched, matching the original source's behavior of
            // returning it directly without running it through url::Parse.
            // The fallback is operator-configured and commonly a relative
            // path (e.g. "/"), which would otherwise fail to parse here.
            return Ok(self.fallback.to_string());
        };

        bag.retain(|(key, _)| key != "rd" && key != "go");

        // `go=/app` -- a relative path, the primary nginx-sso use case -- has
        // no scheme, so `Url::parse` alone rejects it. Fall back to resolving
        // it against a throwaway base, same as the original Go `url.Parse`,
        // which accepts relative references.
        let (relative, mut url) = match Url::parse(&target) {
            Ok(url) => (false, url),
            Err(url::ParseError::RelativeUrlWithoutBase) => {
                let base = Url::parse(RELATIVE_BASE).expect("constant base url is valid");
                (true, base.join(&target)?)
            }
            Err(err) => return Err(err.into()),
        };

        // Parameters already encoded in the target's own query string are
        // appended to the pass-through bag, not merged key-by-key -- a
        // colliding key keeps both values rather than losing one.
        for (key, value) in url.query_pairs() {
            bag.push((key.into_owned(), value.into_owned()));
        }
        // Alphabetized by key; a stable sort keeps same-key duplicates in
        // the order they were appended (§8 scenario 7).
        bag.sort_by(|a, b| a.0.cmp(&b.0));

        if bag.is_empty() {
            url.set_query(None);
        } else {
            let encoded = serde_urlencoded::to_string(&bag).unwrap_or_default();
            url.set_query(Some(&encoded));
        }

        if relative {
            Ok(match url.query() {
                Some(query) => format!("{}?{}", url.path(), query),
                None => url.path().to_string(),
            })
        } else {
            Ok(url.into())
        }
    }
}

/// Build the initial pass-through parameter bag from every query parameter
/// except the one that was itself used as the selector (`rd`/`go`), which is
/// removed by the caller immediately after this returns.
fn query_bag(query: &std::collections::HashMap<String, String>) -> Vec<(String, String)> {
    query.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
}
