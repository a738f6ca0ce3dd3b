//! Request handlers.
//!
//! Each handler resolves the caller (where the route is protected), applies the route's role
//! gate, and delegates to the matching core service. Services repeat their own ownership
//! checks, so a gate here only narrows access further.

use api_shared::{wire, HealthService};
use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::Json,
};
use clinic_core::{authorize, authorize_any, ClinicResult, Role};

use crate::error::ApiResult;
use crate::extract::JsonBody;
use crate::AppState;

/// Runs a core call on the blocking pool. Password hashing and store writes must not stall
/// the async workers.
async fn blocking<T, F>(call: F) -> ApiResult<T>
where
    F: FnOnce() -> ClinicResult<T> + Send + 'static,
    T: Send + 'static,
{
    Ok(tokio::task::spawn_blocking(call).await??)
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Health check response", body = wire::HealthRes)
    )
)]
/// Health check endpoint for monitoring and load balancers.
pub async fn health() -> Json<wire::HealthRes> {
    Json(HealthService::check_health())
}

// ============================================================================
// AUTH
// ============================================================================

#[utoipa::path(
    post,
    path = "/api/auth/register",
    request_body = wire::RegisterReq,
    responses(
        (status = 201, description = "User registered", body = wire::AuthRes),
        (status = 400, description = "Missing fields, invalid role or email already registered", body = wire::MessageRes)
    )
)]
/// Register a new user
///
/// Creates the account and returns it with a bearer token, so the client is logged in
/// straight away. `role` defaults to `patient`.
#[axum::debug_handler]
pub async fn register(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<wire::RegisterReq>,
) -> ApiResult<(StatusCode, Json<wire::AuthRes>)> {
    let res = blocking(move || {
        state.users.register(
            req.name.as_deref(),
            req.email.as_deref(),
            req.password.as_deref(),
            req.role.as_deref(),
        )
    })
    .await?;
    Ok((StatusCode::CREATED, Json(res)))
}

#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = wire::LoginReq,
    responses(
        (status = 200, description = "Logged in", body = wire::AuthRes),
        (status = 400, description = "Missing fields", body = wire::MessageRes),
        (status = 401, description = "Invalid email or password", body = wire::MessageRes)
    )
)]
#[axum::debug_handler]
pub async fn login(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<wire::LoginReq>,
) -> ApiResult<Json<wire::AuthRes>> {
    let res = blocking(move || {
        state
            .users
            .login(req.email.as_deref(), req.password.as_deref())
    })
    .await?;
    Ok(Json(res))
}

#[utoipa::path(
    post,
    path = "/api/auth/logout",
    responses(
        (status = 200, description = "Acknowledged", body = wire::MessageRes)
    )
)]
#[axum::debug_handler]
pub async fn logout(State(state): State<AppState>) -> Json<wire::MessageRes> {
    Json(state.users.logout())
}

// ============================================================================
// USERS
// ============================================================================

#[utoipa::path(
    get,
    path = "/api/users/profile",
    responses(
        (status = 200, description = "The caller's profile", body = wire::UserRes),
        (status = 401, description = "Not authenticated", body = wire::MessageRes)
    ),
    security(("bearer_auth" = []))
)]
#[axum::debug_handler]
pub async fn get_profile(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Json<wire::UserRes>> {
    let principal = state.authenticate(&headers)?;
    Ok(Json(state.users.profile(&principal)?))
}

#[utoipa::path(
    put,
    path = "/api/users/profile",
    request_body = wire::UpdateProfileReq,
    responses(
        (status = 200, description = "Profile updated", body = wire::UserRes),
        (status = 400, description = "Invalid email or email already in use", body = wire::MessageRes),
        (status = 401, description = "Not authenticated", body = wire::MessageRes)
    ),
    security(("bearer_auth" = []))
)]
/// Update the caller's name and/or email
///
/// Role and password cannot be changed here. Blank fields keep their current value.
#[axum::debug_handler]
pub async fn update_profile(
    State(state): State<AppState>,
    headers: HeaderMap,
    JsonBody(req): JsonBody<wire::UpdateProfileReq>,
) -> ApiResult<Json<wire::UserRes>> {
    let principal = state.authenticate(&headers)?;
    let res = blocking(move || {
        state
            .users
            .update_profile(&principal, req.name.as_deref(), req.email.as_deref())
    })
    .await?;
    Ok(Json(res))
}

#[utoipa::path(
    get,
    path = "/api/users",
    params(wire::ListUsersQuery),
    responses(
        (status = 200, description = "One page of users, newest first", body = wire::ListUsersRes),
        (status = 401, description = "Not authenticated", body = wire::MessageRes),
        (status = 403, description = "Not an admin", body = wire::MessageRes)
    ),
    security(("bearer_auth" = []))
)]
#[axum::debug_handler]
pub async fn list_users(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<wire::ListUsersQuery>,
) -> ApiResult<Json<wire::ListUsersRes>> {
    let principal = state.authenticate(&headers)?;
    authorize(&principal, Role::Admin)?;
    Ok(Json(
        state
            .users
            .list_users(&principal, query.page_number.as_deref())?,
    ))
}

#[utoipa::path(
    delete,
    path = "/api/users/{id}",
    params(("id" = String, Path, description = "User id")),
    responses(
        (status = 200, description = "User removed", body = wire::MessageRes),
        (status = 403, description = "Not an admin", body = wire::MessageRes),
        (status = 404, description = "User not found", body = wire::MessageRes)
    ),
    security(("bearer_auth" = []))
)]
#[axum::debug_handler]
pub async fn delete_user(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> ApiResult<Json<wire::MessageRes>> {
    let principal = state.authenticate(&headers)?;
    authorize(&principal, Role::Admin)?;
    let res = blocking(move || state.users.delete_user(&principal, &id)).await?;
    Ok(Json(res))
}

// ============================================================================
// APPOINTMENTS
// ============================================================================

#[utoipa::path(
    post,
    path = "/api/appointments",
    request_body = wire::CreateAppointmentReq,
    responses(
        (status = 201, description = "Appointment booked", body = wire::AppointmentRes),
        (status = 400, description = "Missing or invalid doctor or date", body = wire::MessageRes),
        (status = 403, description = "Not a patient", body = wire::MessageRes)
    ),
    security(("bearer_auth" = []))
)]
#[axum::debug_handler]
pub async fn create_appointment(
    State(state): State<AppState>,
    headers: HeaderMap,
    JsonBody(req): JsonBody<wire::CreateAppointmentReq>,
) -> ApiResult<(StatusCode, Json<wire::AppointmentRes>)> {
    let principal = state.authenticate(&headers)?;
    authorize(&principal, Role::Patient)?;
    let res = blocking(move || {
        state.appointments.create(
            &principal,
            req.doctor_id.as_deref(),
            req.appointment_date.as_deref(),
            req.notes.as_deref(),
        )
    })
    .await?;
    Ok((StatusCode::CREATED, Json(res)))
}

#[utoipa::path(
    get,
    path = "/api/appointments",
    responses(
        (status = 200, description = "Appointments visible to the caller, earliest first", body = [wire::AppointmentDetailRes]),
        (status = 401, description = "Not authenticated", body = wire::MessageRes)
    ),
    security(("bearer_auth" = []))
)]
/// List appointments
///
/// Patients see their own bookings, doctors the appointments assigned to them, admins all.
#[axum::debug_handler]
pub async fn list_appointments(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Json<Vec<wire::AppointmentDetailRes>>> {
    let principal = state.authenticate(&headers)?;
    Ok(Json(state.appointments.list(&principal)?))
}

#[utoipa::path(
    put,
    path = "/api/appointments/{id}/status",
    params(("id" = String, Path, description = "Appointment id")),
    request_body = wire::UpdateStatusReq,
    responses(
        (status = 200, description = "Status updated", body = wire::AppointmentRes),
        (status = 400, description = "Invalid status", body = wire::MessageRes),
        (status = 403, description = "Not the assigned doctor or an admin", body = wire::MessageRes),
        (status = 404, description = "Appointment not found", body = wire::MessageRes)
    ),
    security(("bearer_auth" = []))
)]
#[axum::debug_handler]
pub async fn update_appointment_status(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    JsonBody(req): JsonBody<wire::UpdateStatusReq>,
) -> ApiResult<Json<wire::AppointmentRes>> {
    let principal = state.authenticate(&headers)?;
    authorize_any(&principal, &[Role::Doctor, Role::Admin])?;
    let res = blocking(move || {
        state
            .appointments
            .update_status(&principal, &id, req.status.as_deref())
    })
    .await?;
    Ok(Json(res))
}

#[utoipa::path(
    delete,
    path = "/api/appointments/{id}",
    params(("id" = String, Path, description = "Appointment id")),
    responses(
        (status = 200, description = "Appointment cancelled", body = wire::MessageRes),
        (status = 400, description = "Already cancelled", body = wire::MessageRes),
        (status = 403, description = "Not the patient who booked it", body = wire::MessageRes),
        (status = 404, description = "Appointment not found", body = wire::MessageRes)
    ),
    security(("bearer_auth" = []))
)]
/// Cancel an appointment
///
/// Sets the status to `cancelled`; the appointment itself is kept.
#[axum::debug_handler]
pub async fn cancel_appointment(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> ApiResult<Json<wire::MessageRes>> {
    let principal = state.authenticate(&headers)?;
    authorize(&principal, Role::Patient)?;
    let res = blocking(move || state.appointments.cancel(&principal, &id)).await?;
    Ok(Json(res))
}

// ============================================================================
// PRESCRIPTIONS
// ============================================================================

#[utoipa::path(
    post,
    path = "/api/prescriptions",
    request_body = wire::CreatePrescriptionReq,
    responses(
        (status = 201, description = "Prescription issued", body = wire::PrescriptionRes),
        (status = 400, description = "Missing appointment or medications", body = wire::MessageRes),
        (status = 403, description = "Not the appointment's doctor", body = wire::MessageRes),
        (status = 404, description = "Appointment not found", body = wire::MessageRes)
    ),
    security(("bearer_auth" = []))
)]
#[axum::debug_handler]
pub async fn create_prescription(
    State(state): State<AppState>,
    headers: HeaderMap,
    JsonBody(req): JsonBody<wire::CreatePrescriptionReq>,
) -> ApiResult<(StatusCode, Json<wire::PrescriptionRes>)> {
    let principal = state.authenticate(&headers)?;
    authorize(&principal, Role::Doctor)?;
    let res = blocking(move || {
        state.prescriptions.create(
            &principal,
            req.appointment_id.as_deref(),
            req.medications.as_deref(),
            req.instructions.as_deref(),
        )
    })
    .await?;
    Ok((StatusCode::CREATED, Json(res)))
}

#[utoipa::path(
    get,
    path = "/api/prescriptions/user/{user_id}",
    params(("user_id" = String, Path, description = "Patient id")),
    responses(
        (status = 200, description = "The patient's prescriptions, most recent first", body = [wire::PrescriptionDetailRes]),
        (status = 403, description = "A patient asking for someone else's prescriptions", body = wire::MessageRes)
    ),
    security(("bearer_auth" = []))
)]
#[axum::debug_handler]
pub async fn list_patient_prescriptions(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(user_id): Path<String>,
) -> ApiResult<Json<Vec<wire::PrescriptionDetailRes>>> {
    let principal = state.authenticate(&headers)?;
    Ok(Json(
        state.prescriptions.list_for_patient(&principal, &user_id)?,
    ))
}

#[utoipa::path(
    put,
    path = "/api/prescriptions/{id}",
    params(("id" = String, Path, description = "Prescription id")),
    request_body = wire::UpdatePrescriptionReq,
    responses(
        (status = 200, description = "Prescription updated", body = wire::PrescriptionRes),
        (status = 403, description = "Not the appointment's doctor", body = wire::MessageRes),
        (status = 404, description = "Prescription or appointment not found", body = wire::MessageRes)
    ),
    security(("bearer_auth" = []))
)]
#[axum::debug_handler]
pub async fn update_prescription(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    JsonBody(req): JsonBody<wire::UpdatePrescriptionReq>,
) -> ApiResult<Json<wire::PrescriptionRes>> {
    let principal = state.authenticate(&headers)?;
    authorize(&principal, Role::Doctor)?;
    let res = blocking(move || {
        state.prescriptions.update(
            &principal,
            &id,
            req.medications.as_deref(),
            req.instructions.as_deref(),
        )
    })
    .await?;
    Ok(Json(res))
}

#[utoipa::path(
    delete,
    path = "/api/prescriptions/{id}",
    params(("id" = String, Path, description = "Prescription id")),
    responses(
        (status = 200, description = "Prescription deleted", body = wire::MessageRes),
        (status = 403, description = "Not an admin or the appointment's doctor", body = wire::MessageRes),
        (status = 404, description = "Prescription not found", body = wire::MessageRes)
    ),
    security(("bearer_auth" = []))
)]
#[axum::debug_handler]
pub async fn delete_prescription(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> ApiResult<Json<wire::MessageRes>> {
    let principal = state.authenticate(&headers)?;
    authorize_any(&principal, &[Role::Doctor, Role::Admin])?;
    let res = blocking(move || state.prescriptions.delete(&principal, &id)).await?;
    Ok(Json(res))
}
