// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the auth-sidecar project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! The five HTTP endpoints the front-end proxy and browsers talk to (§4.4).

use std::sync::Arc;

use log::error;
use rocket::data::Data;
use rocket::http::{CookieJar, Header, Status};
use rocket::response::{Redirect, Responder, Response};
use rocket::serde::json::Json;
use rocket::{get, post, Request, State};
use serde_json::{json, Value as JsonValue};

use crate::audit::{AuditEvent, EventTag};
use crate::error::AuthError;
use crate::identity::Identity;
use crate::redirect::RedirectResolver;
use crate::session::SessionStore;

use super::guards::{read_form_body, RequestContext};
use super::AppState;

/// A plain status response that can optionally carry the `X-Username`
/// header the front-end proxy reads on a successful `/auth` check.
pub struct Verdict {
    status: Status,
    username: Option<String>,
}

impl Verdict {
    fn status(status: Status) -> Self {
        Verdict {
            status,
            username: None,
        }
    }

    fn allowed(username: String) -> Self {
        Verdict {
            status: Status::Ok,
            username: Some(username),
        }
    }
}

impl<'r> Responder<'r, 'r> for Verdict {
    fn respond_to(self, _: &'r Request<'_>) -> rocket::response::Result<'static> {
        let mut builder = Response::build();
        builder.status(self.status);
        if let Some(username) = self.username {
            builder.header(Header::new("X-Username", username));
        }
        builder.ok()
    }
}

#[get("/")]
pub fn index() -> Redirect {
    Redirect::to("/login")
}

/// The endpoint the front-end proxy sub-requests for every protected
/// request.
#[get("/auth")]
pub fn auth_get(ctx: RequestContext, jar: &CookieJar<'_>, state: &State<Arc<AppState>>) -> Verdict {
    auth_check(ctx, jar, state)
}

#[post("/auth")]
pub fn auth_post(ctx: RequestContext, jar: &CookieJar<'_>, state: &State<Arc<AppState>>) -> Verdict {
    auth_check(ctx, jar, state)
}

fn auth_check(ctx: RequestContext, jar: &CookieJar<'_>, state: &State<Arc<AppState>>) -> Verdict {
    let req = ctx.0;
    let remote_addr = state
        .audit
        .derive_remote_ip(&req.headers, req.remote_addr.as_deref().unwrap_or(""));

    let detected = state
        .auth_registry
        .read()
        .expect("lock poisoned")
        .detect_user(&req, jar);

    match detected {
        Err(AuthError::NoValidUser) => {
            state.audit.emit(
                &AuditEvent::new(EventTag::Validate, remote_addr)
                    .with_headers(state.audit.captured_headers(&req.headers))
                    .with_field("result", "no valid user"),
            );
            Verdict::status(Status::Unauthorized)
        }
        Err(other) => {
            error!("detect_user failed: {other}");
            Verdict::status(Status::InternalServerError)
        }
        Ok((user, groups)) => {
            let identity = Identity::from_raw(user, groups);
            let allowed = state
                .acl
                .read()
                .expect("lock poisoned")
                .has_access(&identity, &req.headers);

            if allowed {
                state.audit.emit(
                    &AuditEvent::new(EventTag::Validate, remote_addr)
                        .with_headers(state.audit.captured_headers(&req.headers))
                        .with_field("result", "valid")
                        .with_field("username", identity.user()),
                );
                Verdict::allowed(identity.user().to_string())
            } else {
                state.audit.emit(
                    &AuditEvent::new(EventTag::AccessDenied, remote_addr)
                        .with_headers(state.audit.captured_headers(&req.headers))
                        .with_field("username", identity.user()),
                );
                Verdict::status(Status::Forbidden)
            }
        }
    }
}

/// Either a redirect (the common case) or a rendered login form (as JSON --
/// template rendering itself is out of scope, see spec §1).
pub enum LoginResponse {
    Redirect(Redirect),
    BadRequest,
    ServerError,
    Form(JsonValue),
}

impl<'r> Responder<'r, 'r> for LoginResponse {
    fn respond_to(self, request: &'r Request<'_>) -> rocket::response::Result<'static> {
        match self {
            LoginResponse::Redirect(r) => r.respond_to(request),
            LoginResponse::BadRequest => Response::build().status(Status::BadRequest).ok(),
            LoginResponse::ServerError => Response::build().status(Status::InternalServerError).ok(),
            LoginResponse::Form(value) => Json(value).respond_to(request),
        }
    }
}

#[get("/login")]
pub fn login_get(ctx: RequestContext, jar: &CookieJar<'_>, state: &State<Arc<AppState>>) -> LoginResponse {
    login_flow(ctx.0, jar, state)
}

#[post("/login", data = "<body>")]
pub async fn login_post(
    ctx: RequestContext,
    jar: &CookieJar<'_>,
    state: &State<Arc<AppState>>,
    body: Data<'_>,
) -> LoginResponse {
    let mut req = ctx.0;
    req.form = read_form_body(body).await;
    login_flow(req, jar, state)
}

fn login_flow(
    req: crate::auth::AuthRequest,
    jar: &CookieJar<'_>,
    state: &State<Arc<AppState>>,
) -> LoginResponse {
    let flow_store = SessionStore::new(&state.cookie_config, jar);
    let flow_session = flow_store.open("main");

    let resolver = RedirectResolver::new(&state.login.default_redirect);
    let target = match resolver.resolve(&req, &flow_session) {
        Ok(t) => t,
        Err(_) => return LoginResponse::BadRequest,
    };

    let remote_addr = state
        .audit
        .derive_remote_ip(&req.headers, req.remote_addr.as_deref().unwrap_or(""));

    // Already identified (e.g. a still-valid session cookie)?
    let already_identified = state
        .auth_registry
        .read()
        .expect("lock poisoned")
        .detect_user(&req, jar)
        .is_ok();
    if already_identified {
        return LoginResponse::Redirect(Redirect::found(target));
    }

    let is_submission = !req.form.is_empty() || req.query.contains_key("code");

    if is_submission {
        let login_result = state
            .auth_registry
            .read()
            .expect("lock poisoned")
            .login_user(&req, jar);
        match login_result {
            Err(AuthError::NoValidUser) => {
                state.audit.emit(
                    &AuditEvent::new(EventTag::LoginFailure, remote_addr)
                        .with_field("reason", "invalid credentials")
                        .with_field("go", &target),
                );
                LoginResponse::Redirect(Redirect::found(format!(
                    "/login?go={}",
                    urlencoding_escape(&target)
                )))
            }
            Err(other) => {
                error!("login failed: {other}");
                state.audit.emit(
                    &AuditEvent::new(EventTag::LoginFailure, remote_addr)
                        .with_field("reason", "error")
                        .with_field("error", other.to_string())
                        .with_field("go", &target),
                );
                LoginResponse::Redirect(Redirect::found(format!(
                    "/login?go={}",
                    urlencoding_escape(&target)
                )))
            }
            Ok(outcome) => {
                let mfa_result = state.mfa_registry.read().expect("lock poisoned").validate(
                    &req,
                    jar,
                    &outcome.user,
                    &outcome.mfa_configs,
                );
                match mfa_result {
                    Err(AuthError::NoValidUser) => {
                        // Critical: do not leak a half-established session.
                        SessionStore::new(&state.cookie_config, jar).delete(&outcome.provider_id);
                        state.audit.emit(
                            &AuditEvent::new(EventTag::LoginFailure, remote_addr)
                                .with_field("reason", "invalid credentials"),
                        );
                        LoginResponse::Redirect(Redirect::found(format!(
                            "/login?go={}",
                            urlencoding_escape(&target)
                        )))
                    }
                    Err(other) => {
                        SessionStore::new(&state.cookie_config, jar).delete(&outcome.provider_id);
                        error!("mfa validation failed: {other}");
                        state.audit.emit(
                            &AuditEvent::new(EventTag::LoginFailure, remote_addr)
                                .with_field("reason", "error"),
                        );
                        LoginResponse::Redirect(Redirect::found(format!(
                            "/login?go={}",
                            urlencoding_escape(&target)
                        )))
                    }
                    Ok(()) => {
                        state
                            .audit
                            .emit(&AuditEvent::new(EventTag::LoginSuccess, remote_addr));
                        LoginResponse::Redirect(Redirect::found(target))
                    }
                }
            }
        }
    } else {
        // GET without an OAuth code: persist the target so a subsequent
        // OAuth callback can recover it, then hand back the form shape.
        let mut session = flow_session;
        session.set("redirect", target);
        flow_store.save("main", &session);

        let fields = state
            .auth_registry
            .read()
            .expect("lock poisoned")
            .login_form_fields(state.login.hide_mfa_field);
        let fields_json: JsonValue = json!({
            "title": state.login.title,
            "providers": fields.iter().map(|(id, fields)| {
                (id.clone(), fields.iter().map(|f| json!({
                    "label": f.label,
                    "name": f.name,
                    "placeholder": f.placeholder,
                    "type": f.input_type,
                    "action": f.action,
                })).collect::<Vec<_>>())
            }).collect::<serde_json::Map<_, _>>(),
        });
        LoginResponse::Form(fields_json)
    }
}

#[get("/logout")]
pub fn logout_get(ctx: RequestContext, jar: &CookieJar<'_>, state: &State<Arc<AppState>>) -> LoginResponse {
    logout_flow(ctx.0, jar, state)
}

#[post("/logout")]
pub fn logout_post(ctx: RequestContext, jar: &CookieJar<'_>, state: &State<Arc<AppState>>) -> LoginResponse {
    logout_flow(ctx.0, jar, state)
}

fn logout_flow(
    req: crate::auth::AuthRequest,
    jar: &CookieJar<'_>,
    state: &State<Arc<AppState>>,
) -> LoginResponse {
    let remote_addr = state
        .audit
        .derive_remote_ip(&req.headers, req.remote_addr.as_deref().unwrap_or(""));
    state
        .audit
        .emit(&AuditEvent::new(EventTag::Logout, remote_addr));

    if let Err(err) = state.auth_registry.read().expect("lock poisoned").logout_user(jar) {
        error!("logout failed: {err}");
        return LoginResponse::ServerError;
    }

    let flow_session = SessionStore::new(&state.cookie_config, jar).open("main");
    let resolver = RedirectResolver::new(&state.login.default_redirect);
    match resolver.resolve(&req, &flow_session) {
        Ok(target) => LoginResponse::Redirect(Redirect::found(target)),
        Err(_) => LoginResponse::BadRequest,
    }
}

pub enum DebugResponse {
    Redirect(Redirect),
    Identity(String),
    ServerError,
}

impl<'r> Responder<'r, 'r> for DebugResponse {
    fn respond_to(self, request: &'r Request<'_>) -> rocket::response::Result<'static> {
        match self {
            DebugResponse::Redirect(r) => r.respond_to(request),
            DebugResponse::Identity(s) => s.respond_to(request),
            DebugResponse::ServerError => Response::build().status(Status::InternalServerError).ok(),
        }
    }
}

#[get("/debug")]
pub fn debug(ctx: RequestContext, jar: &CookieJar<'_>, state: &State<Arc<AppState>>) -> DebugResponse {
    let req = ctx.0;
    let detected = state
        .auth_registry
        .read()
        .expect("lock poisoned")
        .detect_user(&req, jar);
    match detected {
        Err(AuthError::NoValidUser) => DebugResponse::Redirect(Redirect::to("/login")),
        Err(other) => {
            error!("detect_user failed: {other}");
            DebugResponse::ServerError
        }
        Ok((user, groups)) => {
            let identity = Identity::from_raw(user, groups);
            DebugResponse::Identity(format!(
                "user={}\ngroups={}\n",
                identity.user(),
                identity.groups().join(",")
            ))
        }
    }
}

/// Minimal percent-encoding for the `go` query parameter we re-attach to the
/// `/login` redirect on a failed submission.
fn urlencoding_escape(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes()).collect()
}
