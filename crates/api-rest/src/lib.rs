//! # API REST
//!
//! REST API implementation for the clinic service.
//!
//! Handles:
//! - HTTP endpoints with axum, mounted under `/api`
//! - Bearer-token authentication and route-level role gates
//! - OpenAPI/Swagger documentation
//! - REST-specific concerns (JSON bodies, status codes, CORS, request tracing)
//!
//! Business rules live in `clinic-core`; uses `api-shared` for the wire types.

#![warn(rust_2018_idioms)]

mod error;
mod extract;
mod handlers;

pub use error::{ApiError, ApiResult};

use api_shared::{auth::bearer_token, wire};
use axum::{
    http::{header::AUTHORIZATION, HeaderMap},
    routing::{delete, get, post, put},
    Router,
};
use clinic_core::{
    AppointmentService, Credentials, Principal, PrescriptionService, RecordStore, UserService,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

/// Application state shared across REST API handlers.
///
/// Every service holds the same store handle.
#[derive(Clone)]
pub struct AppState {
    pub users: UserService,
    pub appointments: AppointmentService,
    pub prescriptions: PrescriptionService,
}

impl AppState {
    pub fn new(store: Arc<RecordStore>, credentials: Arc<Credentials>) -> Self {
        Self {
            users: UserService::new(store.clone(), credentials),
            appointments: AppointmentService::new(store.clone()),
            prescriptions: PrescriptionService::new(store),
        }
    }

    /// Resolves the `Authorization` header to the calling user.
    pub(crate) fn authenticate(&self, headers: &HeaderMap) -> ApiResult<Principal> {
        let header = headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok());
        Ok(self.users.authenticate(bearer_token(header))?)
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::health,
        handlers::register,
        handlers::login,
        handlers::logout,
        handlers::get_profile,
        handlers::update_profile,
        handlers::list_users,
        handlers::delete_user,
        handlers::create_appointment,
        handlers::list_appointments,
        handlers::update_appointment_status,
        handlers::cancel_appointment,
        handlers::create_prescription,
        handlers::list_patient_prescriptions,
        handlers::update_prescription,
        handlers::delete_prescription,
    ),
    components(schemas(
        wire::HealthRes,
        wire::MessageRes,
        wire::RegisterReq,
        wire::LoginReq,
        wire::AuthRes,
        wire::UserRes,
        wire::UpdateProfileReq,
        wire::ListUsersRes,
        wire::UserSummary,
        wire::CreateAppointmentReq,
        wire::UpdateStatusReq,
        wire::AppointmentRes,
        wire::AppointmentDetailRes,
        wire::MedicationReq,
        wire::MedicationRes,
        wire::CreatePrescriptionReq,
        wire::UpdatePrescriptionReq,
        wire::PrescriptionRes,
        wire::PrescriptionDetailRes,
    )),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

/// Builds the full application router: `/health`, the `/api` routes and Swagger UI.
pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route("/auth/register", post(handlers::register))
        .route("/auth/login", post(handlers::login))
        .route("/auth/logout", post(handlers::logout))
        .route(
            "/users/profile",
            get(handlers::get_profile).put(handlers::update_profile),
        )
        .route("/users", get(handlers::list_users))
        .route("/users/:id", delete(handlers::delete_user))
        .route(
            "/appointments",
            post(handlers::create_appointment).get(handlers::list_appointments),
        )
        .route(
            "/appointments/:id/status",
            put(handlers::update_appointment_status),
        )
        .route("/appointments/:id", delete(handlers::cancel_appointment))
        .route("/prescriptions", post(handlers::create_prescription))
        .route(
            "/prescriptions/user/:user_id",
            get(handlers::list_patient_prescriptions),
        )
        .route(
            "/prescriptions/:id",
            put(handlers::update_prescription).delete(handlers::delete_prescription),
        );

    Router::new()
        .route("/health", get(handlers::health))
        .nest("/api", api)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
