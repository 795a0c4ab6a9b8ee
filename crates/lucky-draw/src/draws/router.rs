use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;
use tracing::error;

use super::domain::{DrawStatus, PropertyId, RegistryId};
use super::repository::{
    Caller, DrawRepository, IdentityError, IdentityProvider, NewProperty, PropertyCatalog,
    UserDirectory,
};
use super::service::{LuckyDrawError, LuckyDrawService};

/// Shared handler state: the draw service plus the identity capability used to authenticate
/// callers.
pub struct DrawRouterState<R, C, U> {
    pub service: Arc<LuckyDrawService<R, C, U>>,
    pub identity: Arc<dyn IdentityProvider>,
}

impl<R, C, U> Clone for DrawRouterState<R, C, U> {
    fn clone(&self) -> Self {
        Self {
            service: Arc::clone(&self.service),
            identity: Arc::clone(&self.identity),
        }
    }
}

/// Router builder exposing public, registrant and admin endpoints for lucky draws.
pub fn lucky_draw_router<R, C, U>(
    service: Arc<LuckyDrawService<R, C, U>>,
    identity: Arc<dyn IdentityProvider>,
) -> Router
where
    R: DrawRepository + 'static,
    C: PropertyCatalog + 'static,
    U: UserDirectory + 'static,
{
    let state = DrawRouterState { service, identity };

    Router::new()
        .route("/api/v1/lucky-draw/draws", get(public_list_handler::<R, C, U>))
        .route(
            "/api/v1/lucky-draw/draws/:registry_id",
            get(public_view_handler::<R, C, U>),
        )
        .route(
            "/api/v1/lucky-draw/draws/:registry_id/registrations",
            post(register_handler::<R, C, U>),
        )
        .route(
            "/api/v1/lucky-draw/me/registrations",
            get(my_registrations_handler::<R, C, U>),
        )
        .route(
            "/api/v1/admin/lucky-draw/draws",
            get(admin_list_handler::<R, C, U>).post(enroll_handler::<R, C, U>),
        )
        .route(
            "/api/v1/admin/lucky-draw/draws/with-property",
            post(enroll_with_property_handler::<R, C, U>),
        )
        .route(
            "/api/v1/admin/lucky-draw/draws/:registry_id",
            get(admin_view_handler::<R, C, U>).delete(remove_handler::<R, C, U>),
        )
        .route(
            "/api/v1/admin/lucky-draw/draws/:registry_id/winner",
            post(select_winner_handler::<R, C, U>),
        )
        .route(
            "/api/v1/admin/lucky-draw/draws/:registry_id/cancel",
            post(cancel_handler::<R, C, U>),
        )
        .route(
            "/api/v1/admin/lucky-draw/draws/:registry_id/export",
            get(export_handler::<R, C, U>),
        )
        .route(
            "/api/v1/admin/lucky-draw/available-properties",
            get(available_properties_handler::<R, C, U>),
        )
        .with_state(state)
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ListQuery {
    #[serde(default)]
    pub(crate) status: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RegisterRequest {
    pub(crate) contact_phone: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct EnrollRequest {
    pub(crate) property_id: String,
    pub(crate) opens_at: DateTime<Utc>,
    pub(crate) closes_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct EnrollWithPropertyRequest {
    pub(crate) property: NewProperty,
    pub(crate) opens_at: DateTime<Utc>,
    pub(crate) closes_at: DateTime<Utc>,
}

pub(crate) fn error_response(err: LuckyDrawError) -> Response {
    let status = match &err {
        LuckyDrawError::NotFound(_) => StatusCode::NOT_FOUND,
        LuckyDrawError::InvalidWindow(_)
        | LuckyDrawError::InvalidContact { .. }
        | LuckyDrawError::InvalidProperty(_) => StatusCode::UNPROCESSABLE_ENTITY,
        LuckyDrawError::AlreadyEnrolled
        | LuckyDrawError::RegistrationClosed
        | LuckyDrawError::DuplicateRegistration
        | LuckyDrawError::NoRegistrants
        | LuckyDrawError::NotEligible(_)
        | LuckyDrawError::NotCancellable(_) => StatusCode::CONFLICT,
        LuckyDrawError::Repository(_)
        | LuckyDrawError::Catalog(_)
        | LuckyDrawError::Directory(_)
        | LuckyDrawError::Export(_) => {
            error!(error = %err, "lucky draw request failed");
            let payload = json!({
                "error": "internal server error",
                "code": err.code(),
            });
            return (StatusCode::INTERNAL_SERVER_ERROR, Json(payload)).into_response();
        }
    };

    let payload = match &err {
        LuckyDrawError::NotEligible(reason) | LuckyDrawError::NotCancellable(reason) => json!({
            "error": err.to_string(),
            "code": err.code(),
            "detail": reason,
        }),
        _ => json!({
            "error": err.to_string(),
            "code": err.code(),
        }),
    };
    (status, Json(payload)).into_response()
}

fn rejection(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message, "code": "unauthorized" }))).into_response()
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

fn identify(identity: &dyn IdentityProvider, token: &str) -> Result<Caller, Response> {
    identity.authenticate(token).map_err(|err| match err {
        IdentityError::InvalidToken => rejection(StatusCode::UNAUTHORIZED, "invalid token"),
        IdentityError::Unavailable(detail) => {
            error!(%detail, "identity provider unavailable");
            rejection(StatusCode::SERVICE_UNAVAILABLE, "authentication unavailable")
        }
    })
}

/// `Ok(None)` when no credentials were sent; presented credentials must still be valid.
fn optional_caller(
    identity: &dyn IdentityProvider,
    headers: &HeaderMap,
) -> Result<Option<Caller>, Response> {
    match bearer_token(headers) {
        Some(token) => identify(identity, token).map(Some),
        None => Ok(None),
    }
}

fn require_user(identity: &dyn IdentityProvider, headers: &HeaderMap) -> Result<Caller, Response> {
    match bearer_token(headers) {
        Some(token) => identify(identity, token),
        None => Err(rejection(
            StatusCode::UNAUTHORIZED,
            "access denied: no token provided",
        )),
    }
}

fn require_admin(identity: &dyn IdentityProvider, headers: &HeaderMap) -> Result<Caller, Response> {
    let caller = require_user(identity, headers)?;
    if caller.is_admin() {
        Ok(caller)
    } else {
        Err(rejection(
            StatusCode::FORBIDDEN,
            "access denied: admin privileges required",
        ))
    }
}

fn status_filter(
    query: &ListQuery,
    default: Option<DrawStatus>,
) -> Result<Option<DrawStatus>, Response> {
    match query.status.as_deref().map(str::trim) {
        None | Some("") => Ok(default),
        Some("all") => Ok(None),
        Some(raw) => raw.parse::<DrawStatus>().map(Some).map_err(|err| {
            let payload = json!({ "error": err.to_string(), "code": "invalid_status" });
            (StatusCode::BAD_REQUEST, Json(payload)).into_response()
        }),
    }
}

pub(crate) async fn public_list_handler<R, C, U>(
    State(state): State<DrawRouterState<R, C, U>>,
    Query(query): Query<ListQuery>,
) -> Response
where
    R: DrawRepository + 'static,
    C: PropertyCatalog + 'static,
    U: UserDirectory + 'static,
{
    let status = match status_filter(&query, Some(DrawStatus::Active)) {
        Ok(status) => status,
        Err(response) => return response,
    };
    match state.service.list_enrolled(status, Utc::now()) {
        Ok(draws) => (StatusCode::OK, Json(json!({ "draws": draws }))).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn public_view_handler<R, C, U>(
    State(state): State<DrawRouterState<R, C, U>>,
    Path(registry_id): Path<String>,
    headers: HeaderMap,
) -> Response
where
    R: DrawRepository + 'static,
    C: PropertyCatalog + 'static,
    U: UserDirectory + 'static,
{
    let caller = match optional_caller(state.identity.as_ref(), &headers) {
        Ok(caller) => caller,
        Err(response) => return response,
    };
    let id = RegistryId(registry_id);
    let viewer = caller.as_ref().map(|caller| &caller.user_id);
    match state.service.public_view(&id, viewer, Utc::now()) {
        Ok(view) => (StatusCode::OK, Json(view)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn register_handler<R, C, U>(
    State(state): State<DrawRouterState<R, C, U>>,
    Path(registry_id): Path<String>,
    headers: HeaderMap,
    Json(request): Json<RegisterRequest>,
) -> Response
where
    R: DrawRepository + 'static,
    C: PropertyCatalog + 'static,
    U: UserDirectory + 'static,
{
    let caller = match require_user(state.identity.as_ref(), &headers) {
        Ok(caller) => caller,
        Err(response) => return response,
    };
    let id = RegistryId(registry_id);
    match state
        .service
        .register(&id, &caller.user_id, &request.contact_phone, Utc::now())
    {
        Ok(receipt) => (StatusCode::CREATED, Json(receipt)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn my_registrations_handler<R, C, U>(
    State(state): State<DrawRouterState<R, C, U>>,
    headers: HeaderMap,
) -> Response
where
    R: DrawRepository + 'static,
    C: PropertyCatalog + 'static,
    U: UserDirectory + 'static,
{
    let caller = match require_user(state.identity.as_ref(), &headers) {
        Ok(caller) => caller,
        Err(response) => return response,
    };
    match state.service.list_user_registrations(&caller.user_id) {
        Ok(registrations) => {
            (StatusCode::OK, Json(json!({ "registrations": registrations }))).into_response()
        }
        Err(err) => error_response(err),
    }
}

pub(crate) async fn admin_list_handler<R, C, U>(
    State(state): State<DrawRouterState<R, C, U>>,
    Query(query): Query<ListQuery>,
    headers: HeaderMap,
) -> Response
where
    R: DrawRepository + 'static,
    C: PropertyCatalog + 'static,
    U: UserDirectory + 'static,
{
    if let Err(response) = require_admin(state.identity.as_ref(), &headers) {
        return response;
    }
    let status = match status_filter(&query, None) {
        Ok(status) => status,
        Err(response) => return response,
    };
    match state.service.list_enrolled(status, Utc::now()) {
        Ok(draws) => (StatusCode::OK, Json(json!({ "draws": draws }))).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn enroll_handler<R, C, U>(
    State(state): State<DrawRouterState<R, C, U>>,
    headers: HeaderMap,
    Json(request): Json<EnrollRequest>,
) -> Response
where
    R: DrawRepository + 'static,
    C: PropertyCatalog + 'static,
    U: UserDirectory + 'static,
{
    if let Err(response) = require_admin(state.identity.as_ref(), &headers) {
        return response;
    }
    let property_id = PropertyId(request.property_id);
    match state.service.enroll_property(
        &property_id,
        request.opens_at,
        request.closes_at,
        Utc::now(),
    ) {
        Ok(receipt) => (StatusCode::CREATED, Json(receipt)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn enroll_with_property_handler<R, C, U>(
    State(state): State<DrawRouterState<R, C, U>>,
    headers: HeaderMap,
    Json(request): Json<EnrollWithPropertyRequest>,
) -> Response
where
    R: DrawRepository + 'static,
    C: PropertyCatalog + 'static,
    U: UserDirectory + 'static,
{
    if let Err(response) = require_admin(state.identity.as_ref(), &headers) {
        return response;
    }
    match state.service.enroll_new_property(
        request.property,
        request.opens_at,
        request.closes_at,
        Utc::now(),
    ) {
        Ok(receipt) => (StatusCode::CREATED, Json(receipt)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn admin_view_handler<R, C, U>(
    State(state): State<DrawRouterState<R, C, U>>,
    Path(registry_id): Path<String>,
    headers: HeaderMap,
) -> Response
where
    R: DrawRepository + 'static,
    C: PropertyCatalog + 'static,
    U: UserDirectory + 'static,
{
    if let Err(response) = require_admin(state.identity.as_ref(), &headers) {
        return response;
    }
    match state
        .service
        .admin_view(&RegistryId(registry_id), Utc::now())
    {
        Ok(view) => (StatusCode::OK, Json(view)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn remove_handler<R, C, U>(
    State(state): State<DrawRouterState<R, C, U>>,
    Path(registry_id): Path<String>,
    headers: HeaderMap,
) -> Response
where
    R: DrawRepository + 'static,
    C: PropertyCatalog + 'static,
    U: UserDirectory + 'static,
{
    if let Err(response) = require_admin(state.identity.as_ref(), &headers) {
        return response;
    }
    match state.service.remove_enrollment(&RegistryId(registry_id)) {
        Ok(receipt) => (StatusCode::OK, Json(receipt)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn select_winner_handler<R, C, U>(
    State(state): State<DrawRouterState<R, C, U>>,
    Path(registry_id): Path<String>,
    headers: HeaderMap,
) -> Response
where
    R: DrawRepository + 'static,
    C: PropertyCatalog + 'static,
    U: UserDirectory + 'static,
{
    if let Err(response) = require_admin(state.identity.as_ref(), &headers) {
        return response;
    }
    match state
        .service
        .select_winner(&RegistryId(registry_id), Utc::now())
    {
        Ok(winner) => (StatusCode::OK, Json(winner)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn cancel_handler<R, C, U>(
    State(state): State<DrawRouterState<R, C, U>>,
    Path(registry_id): Path<String>,
    headers: HeaderMap,
) -> Response
where
    R: DrawRepository + 'static,
    C: PropertyCatalog + 'static,
    U: UserDirectory + 'static,
{
    if let Err(response) = require_admin(state.identity.as_ref(), &headers) {
        return response;
    }
    match state
        .service
        .cancel_draw(&RegistryId(registry_id), Utc::now())
    {
        Ok(summary) => (StatusCode::OK, Json(summary)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn export_handler<R, C, U>(
    State(state): State<DrawRouterState<R, C, U>>,
    Path(registry_id): Path<String>,
    headers: HeaderMap,
) -> Response
where
    R: DrawRepository + 'static,
    C: PropertyCatalog + 'static,
    U: UserDirectory + 'static,
{
    if let Err(response) = require_admin(state.identity.as_ref(), &headers) {
        return response;
    }
    match state
        .service
        .export_registrants(&RegistryId(registry_id), Utc::now())
    {
        Ok(export) => {
            let disposition = format!("attachment; filename=\"{}\"", export.file_name);
            (
                StatusCode::OK,
                [
                    (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
                    (header::CONTENT_DISPOSITION, disposition),
                ],
                export.bytes,
            )
                .into_response()
        }
        Err(err) => error_response(err),
    }
}

pub(crate) async fn available_properties_handler<R, C, U>(
    State(state): State<DrawRouterState<R, C, U>>,
    headers: HeaderMap,
) -> Response
where
    R: DrawRepository + 'static,
    C: PropertyCatalog + 'static,
    U: UserDirectory + 'static,
{
    if let Err(response) = require_admin(state.identity.as_ref(), &headers) {
        return response;
    }
    match state.service.list_available_properties() {
        Ok(properties) => {
            (StatusCode::OK, Json(json!({ "properties": properties }))).into_response()
        }
        Err(err) => error_response(err),
    }
}
