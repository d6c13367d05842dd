//! HTTP routes
//!
//! Every JSON endpoint answers `{ok: true, ...}` or `{ok: false, error}`.
//! Mutating endpoints require the admin token when one is configured, sent
//! as the `x-admin-token` header or the `admin` cookie.

use crate::app::AppState;
use kaleido_core::minimal_html;
use kaleido_engine::{is_valid_site_id, EngineError, Settings, SettingsError};
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::convert::Infallible;
use warp::http::StatusCode;
use warp::path::Tail;
use warp::reply::Response;
use warp::{Filter, Rejection, Reply};

/// Largest accepted request body
pub const BODY_LIMIT: u64 = 64 * 1024;

/// Policy for stored sites: inline styles and images only
pub const SITE_CSP: &str = "default-src 'none'; script-src 'none'; \
style-src 'unsafe-inline' 'self'; img-src 'self' data: blob:; font-src 'self' data:; \
connect-src 'none'; object-src 'none'; base-uri 'none'; form-action 'none'; frame-src 'none'";

#[derive(Debug)]
struct Unauthorized;

impl warp::reject::Reject for Unauthorized {}

/// Runtime setting exposed under `/api/config/...`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigField {
    Strategy,
    Model,
    RateLimit,
    IncludeImage,
    ImagePrompt,
    PlanningPrompt,
    SectionPrompt,
}

impl ConfigField {
    /// Field for the path after `/api/config/`
    #[must_use]
    pub fn from_path(path: &str) -> Option<Self> {
        match path.trim_end_matches('/') {
            "generation-strategy" => Some(Self::Strategy),
            "model" => Some(Self::Model),
            "rate" => Some(Self::RateLimit),
            "image/include" => Some(Self::IncludeImage),
            "image/prompt" => Some(Self::ImagePrompt),
            "planning-prompt" => Some(Self::PlanningPrompt),
            "section-prompt" => Some(Self::SectionPrompt),
            _ => None,
        }
    }

    /// Name of the value in request and response bodies
    #[must_use]
    pub fn body_key(self) -> &'static str {
        match self {
            Self::Strategy => "strategy",
            Self::Model => "model",
            Self::RateLimit => "limit",
            Self::IncludeImage => "includeImage",
            Self::ImagePrompt => "imagePrompt",
            Self::PlanningPrompt | Self::SectionPrompt => "prompt",
        }
    }

    fn invalid_code(self) -> &'static str {
        match self {
            Self::Strategy => "invalid_strategy",
            Self::Model => "invalid_model",
            Self::RateLimit => "invalid_limit",
            Self::IncludeImage => "invalid_include_image",
            Self::ImagePrompt | Self::PlanningPrompt | Self::SectionPrompt => "invalid_prompt",
        }
    }

    async fn read(self, settings: &Settings) -> Result<Value, SettingsError> {
        Ok(match self {
            Self::Strategy => json!(settings.strategy().await?.as_str()),
            Self::Model => json!(settings.model().await?),
            Self::RateLimit => json!(settings.rate_limit().await?),
            Self::IncludeImage => json!(settings.include_image().await?),
            Self::ImagePrompt => json!(settings.image_prompt().await?),
            Self::PlanningPrompt => json!(settings.planning_prompt().await?),
            Self::SectionPrompt => json!(settings.section_prompt().await?),
        })
    }

    async fn write(self, settings: &Settings, value: &Value) -> Result<Value, SettingsError> {
        let text = value.as_str().unwrap_or_default();
        match self {
            Self::Strategy => Ok(json!(settings.set_strategy(text).await?.as_str())),
            Self::Model => Ok(json!(settings.set_model(text).await?)),
            Self::RateLimit => Ok(json!(settings.set_rate_limit(value).await?)),
            Self::IncludeImage => {
                // an unchecked form checkbox is simply absent
                let include = if value.is_null() { Value::Bool(false) } else { value.clone() };
                Ok(json!(settings.set_include_image(&include).await?))
            }
            Self::ImagePrompt => {
                settings.set_image_prompt(text).await?;
                self.read(settings).await
            }
            Self::PlanningPrompt => {
                settings.set_planning_prompt(text).await?;
                self.read(settings).await
            }
            Self::SectionPrompt => {
                settings.set_section_prompt(text).await?;
                self.read(settings).await
            }
        }
    }
}

/// Every route with JSON error recovery
pub fn routes(state: AppState) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let root = warp::path::end()
        .and(warp::get())
        .and(with_state(state.clone()))
        .and_then(|state: AppState| serve_latest(state, true));
    let raw = warp::path!("raw")
        .and(warp::get())
        .and(with_state(state.clone()))
        .and_then(|state: AppState| serve_latest(state, false));
    let site = warp::path!("site" / String)
        .and(warp::get())
        .and(with_state(state.clone()))
        .and_then(serve_site);

    let pregen = warp::path!("api" / "pregen")
        .and(warp::get().or(warp::post()).unify())
        .and(with_state(state.clone()))
        .and_then(pregen);
    let status = warp::path!("api" / "status")
        .and(warp::get())
        .and(with_state(state.clone()))
        .and_then(status);
    let list = warp::path!("api" / "site" / "list")
        .and(warp::get())
        .and(with_state(state.clone()))
        .and_then(list_sites);
    let delete = warp::path!("api" / "site" / "delete")
        .and(warp::post())
        .and(admin(state.clone()))
        .and(form_or_json())
        .and(with_state(state.clone()))
        .and_then(delete_site);

    root.or(raw)
        .unify()
        .or(site)
        .unify()
        .or(pregen)
        .unify()
        .or(status)
        .unify()
        .or(list)
        .unify()
        .or(delete)
        .unify()
        .or(config_routes(state))
        .unify()
        .recover(recover)
        .unify()
        .with(warp::trace::request())
}

fn config_routes(state: AppState) -> impl Filter<Extract = (Response,), Error = Rejection> + Clone {
    let field = warp::path!("api" / "config" / ..)
        .and(warp::path::tail())
        .and_then(|tail: Tail| async move {
            ConfigField::from_path(tail.as_str()).ok_or_else(warp::reject::not_found)
        });

    let read = warp::get()
        .and(field.clone())
        .and(with_state(state.clone()))
        .and_then(read_config);
    let write = warp::post()
        .and(field)
        .and(admin(state.clone()))
        .and(form_or_json())
        .and(with_state(state))
        .and_then(write_config);
    read.or(write).unify()
}

fn with_state(state: AppState) -> impl Filter<Extract = (AppState,), Error = Infallible> + Clone {
    warp::any().map(move || state.clone())
}

fn admin(state: AppState) -> impl Filter<Extract = (), Error = Rejection> + Clone {
    warp::header::optional::<String>("x-admin-token")
        .and(warp::cookie::optional("admin"))
        .and_then(move |header: Option<String>, cookie: Option<String>| {
            let allowed = state.is_admin(header.as_deref()) || state.is_admin(cookie.as_deref());
            async move {
                if allowed {
                    Ok(())
                } else {
                    Err(warp::reject::custom(Unauthorized))
                }
            }
        })
        .untuple_one()
}

/// Request body as a JSON object, accepting urlencoded forms too
fn form_or_json() -> impl Filter<Extract = (Map<String, Value>,), Error = Rejection> + Clone {
    let json = warp::body::json::<Map<String, Value>>();
    let form = warp::body::form::<HashMap<String, String>>().map(|form: HashMap<String, String>| {
        form.into_iter()
            .map(|(key, value)| (key, Value::String(value)))
            .collect::<Map<String, Value>>()
    });
    warp::body::content_length_limit(BODY_LIMIT).and(json.or(form).unify())
}

fn json_reply(status: StatusCode, body: &Value) -> Response {
    warp::reply::with_status(warp::reply::json(body), status).into_response()
}

fn failure(status: StatusCode, error: impl std::fmt::Display) -> Response {
    json_reply(status, &json!({"ok": false, "error": error.to_string()}))
}

fn engine_status(error: &EngineError) -> StatusCode {
    match error {
        EngineError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
        e if e.is_lease_timeout() => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn fallback_page(error: &EngineError) -> Response {
    let html = minimal_html("KaleidoSite", "Could not build a site right now. Try again in a minute.");
    warp::reply::with_status(warp::reply::html(html), engine_status(error)).into_response()
}

async fn serve_latest(state: AppState, embed_controls: bool) -> Result<Response, Infallible> {
    Ok(match state.publisher.serve_latest(embed_controls).await {
        Ok(html) => warp::reply::html(html).into_response(),
        Err(e) => {
            tracing::error!("serving latest site failed: {e}");
            fallback_page(&e)
        }
    })
}

async fn serve_site(id: String, state: AppState) -> Result<Response, Infallible> {
    Ok(match state.publisher.stored_site(&id).await {
        Ok(Some(html)) => {
            warp::reply::with_header(warp::reply::html(html), "content-security-policy", SITE_CSP).into_response()
        }
        Ok(None) => warp::reply::with_status("Not found", StatusCode::NOT_FOUND).into_response(),
        Err(e) => {
            tracing::error!(id = %id, "serving stored site failed: {e}");
            fallback_page(&e)
        }
    })
}

async fn pregen(state: AppState) -> Result<Response, Infallible> {
    Ok(match state.publisher.pregenerate().await {
        Ok(site) => json_reply(
            StatusCode::OK,
            &json!({"ok": true, "id": site.id, "ts": site.ts, "usage": site.usage}),
        ),
        Err(EngineError::RateLimited { limit, current }) => json_reply(
            StatusCode::TOO_MANY_REQUESTS,
            &json!({"ok": false, "error": "rate_limited", "limit": limit, "current": current}),
        ),
        Err(e) => {
            tracing::error!("pregeneration failed: {e}");
            failure(engine_status(&e), e)
        }
    })
}

async fn status(state: AppState) -> Result<Response, Infallible> {
    Ok(match state.publisher.status().await {
        Ok(latest) => json_reply(StatusCode::OK, &json!({"ok": true, "latest": latest})),
        Err(e) => failure(StatusCode::INTERNAL_SERVER_ERROR, e),
    })
}

async fn list_sites(state: AppState) -> Result<Response, Infallible> {
    Ok(match state.publisher.list_sites().await {
        Ok(sites) => json_reply(
            StatusCode::OK,
            &json!({"ok": true, "totalSites": sites.len(), "sites": sites}),
        ),
        Err(e) => {
            tracing::error!("listing sites failed: {e}");
            failure(StatusCode::INTERNAL_SERVER_ERROR, e)
        }
    })
}

async fn delete_site(body: Map<String, Value>, state: AppState) -> Result<Response, Infallible> {
    let Some(id) = body.get("siteId").and_then(Value::as_str).filter(|id| is_valid_site_id(id)) else {
        return Ok(failure(StatusCode::BAD_REQUEST, "invalid_site_id"));
    };
    Ok(match state.publisher.delete_site(id).await {
        Ok(deleted) => json_reply(StatusCode::OK, &json!({"ok": true, "deletedCount": deleted})),
        Err(e) => {
            tracing::error!(id, "deleting site failed: {e}");
            failure(StatusCode::INTERNAL_SERVER_ERROR, e)
        }
    })
}

async fn read_config(field: ConfigField, state: AppState) -> Result<Response, Infallible> {
    Ok(match field.read(state.settings()).await {
        Ok(value) => json_reply(StatusCode::OK, &json!({"ok": true, field.body_key(): value})),
        Err(e) => failure(StatusCode::INTERNAL_SERVER_ERROR, e),
    })
}

async fn write_config(
    field: ConfigField,
    body: Map<String, Value>,
    state: AppState,
) -> Result<Response, Infallible> {
    let value = body.get(field.body_key()).cloned().unwrap_or(Value::Null);
    Ok(match field.write(state.settings(), &value).await {
        Ok(stored) => json_reply(StatusCode::OK, &json!({"ok": true, field.body_key(): stored})),
        Err(SettingsError::Invalid { key, reason }) => {
            tracing::warn!(key, reason = %reason, "config update rejected");
            failure(StatusCode::BAD_REQUEST, field.invalid_code())
        }
        Err(e) => {
            tracing::error!("config update failed: {e}");
            failure(StatusCode::INTERNAL_SERVER_ERROR, e)
        }
    })
}

async fn recover(err: Rejection) -> Result<Response, Rejection> {
    if err.find::<Unauthorized>().is_some() {
        return Ok(failure(StatusCode::UNAUTHORIZED, "unauthorized"));
    }
    if err.find::<warp::reject::PayloadTooLarge>().is_some() {
        return Ok(failure(StatusCode::PAYLOAD_TOO_LARGE, "body_too_large"));
    }
    if err.find::<warp::body::BodyDeserializeError>().is_some()
        || err.find::<warp::reject::UnsupportedMediaType>().is_some()
        || err.find::<warp::reject::LengthRequired>().is_some()
    {
        return Ok(failure(StatusCode::BAD_REQUEST, "invalid_body"));
    }
    Err(err)
}
