// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the auth-sidecar project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Request guards that adapt a Rocket [`Request`] into the framework-agnostic
//! [`AuthRequest`] the auth/mfa contracts consume.

use std::collections::HashMap;
use std::convert::Infallible;

use rocket::data::{Data, ToByteUnit};
use rocket::request::{FromRequest, Outcome};
use rocket::Request;

use crate::auth::AuthRequest;

/// Everything about an inbound request except its form body: headers, query
/// parameters, and the best-effort remote address. Built once per request by
/// Rocket's request-guard machinery.
pub struct RequestContext(pub AuthRequest);

#[rocket::async_trait]
impl<'r> FromRequest<'r> for RequestContext {
    type Error = Infallible;

    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let headers = req
            .headers()
            .iter()
            .map(|h| (h.name().as_str().to_lowercase(), h.value().to_string()))
            .collect();

        let query: HashMap<String, String> = req
            .uri()
            .query()
            .and_then(|q| serde_urlencoded::from_str(q.as_str()).ok())
            .unwrap_or_default();

        let remote_addr = req
            .client_ip()
            .map(|ip| ip.to_string())
            .or_else(|| req.remote().map(|addr| addr.to_string()));

        Outcome::Success(RequestContext(AuthRequest {
            headers,
            query,
            form: HashMap::new(),
            remote_addr,
        }))
    }
}

/// Read and decode an `application/x-www-form-urlencoded` body into a flat
/// key/value map. Used only by the `/login` POST handler; non-form bodies
/// (or no body at all, as on a GET with an OAuth `code`) yield an empty map.
pub async fn read_form_body(data: Data<'_>) -> HashMap<String, String> {
    let Ok(bytes) = data.open(512.kibibytes()).into_bytes().await else {
        return HashMap::new();
    };
    if !bytes.is_complete() {
        return HashMap::new();
    }
    serde_urlencoded::from_bytes(bytes.value.as_ref()).unwrap_or_default()
}
