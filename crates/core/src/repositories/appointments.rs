//! Scheduling.
//!
//! Appointments are booked by patients against doctors, moved between statuses by the assigned
//! doctor or an admin, and cancelled by the patient who booked them. Cancellation is a status
//! change; appointment records are never removed.

use crate::access::{authorize, Principal};
use crate::models::{Appointment, AppointmentStatus, Role};
use crate::repositories::shared::{appointment_detail, appointment_res, parse_record_id, user_directory};
use crate::store::{Record, RecordStore};
use crate::{ClinicError, ClinicResult};
use api_shared::wire;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use std::sync::Arc;

const NOT_FOUND: &str = "Appointment not found";

/// Service for booking and managing appointments.
#[derive(Clone, Debug)]
pub struct AppointmentService {
    store: Arc<RecordStore>,
}

impl AppointmentService {
    pub fn new(store: Arc<RecordStore>) -> Self {
        Self { store }
    }

    /// Books an appointment for the calling patient.
    ///
    /// # Errors
    ///
    /// - [`ClinicError::Forbidden`] if the caller is not a patient.
    /// - [`ClinicError::Validation`] if the doctor or date is missing, the date cannot be parsed
    ///   or is not in the future, or `doctor_id` does not name a doctor.
    pub fn create(
        &self,
        principal: &Principal,
        doctor_id: Option<&str>,
        appointment_date: Option<&str>,
        notes: Option<&str>,
    ) -> ClinicResult<wire::AppointmentRes> {
        authorize(principal, Role::Patient)?;

        let (Some(doctor_id), Some(appointment_date)) = (
            doctor_id.map(str::trim).filter(|d| !d.is_empty()),
            appointment_date.map(str::trim).filter(|d| !d.is_empty()),
        ) else {
            return Err(ClinicError::validation(
                "Doctor and appointment date are required",
            ));
        };

        let appointment_date = parse_appointment_date(appointment_date)?;
        if appointment_date <= Utc::now() {
            return Err(ClinicError::validation(
                "Appointment date must be in the future",
            ));
        }

        let doctor_id =
            parse_record_id(doctor_id, "").map_err(|_| ClinicError::validation("Doctor not found"))?;

        let record = self.store.insert_with(|db| {
            let is_doctor = db
                .users
                .iter()
                .any(|u| u.id == doctor_id && u.data.role == Role::Doctor);
            if !is_doctor {
                return Err(ClinicError::validation("Doctor not found"));
            }
            Ok(Appointment {
                patient_id: principal.id,
                doctor_id,
                appointment_date,
                status: AppointmentStatus::Scheduled,
                notes: notes.map(str::trim).unwrap_or_default().to_owned(),
            })
        })?;

        tracing::info!(
            appointment = %record.id,
            patient = %principal.id,
            doctor = %doctor_id,
            "appointment booked"
        );
        Ok(appointment_res(&record))
    }

    /// Appointments visible to the caller, earliest first, with both parties resolved.
    ///
    /// Patients see the ones they booked, doctors the ones assigned to them, admins all.
    pub fn list(&self, principal: &Principal) -> ClinicResult<Vec<wire::AppointmentDetailRes>> {
        let db = self.store.snapshot()?;
        let users = user_directory(&db);

        let mut visible: Vec<&Record<Appointment>> = db
            .appointments
            .iter()
            .filter(|a| match principal.role {
                Role::Patient => a.data.patient_id == principal.id,
                Role::Doctor => a.data.doctor_id == principal.id,
                Role::Admin => true,
            })
            .collect();
        visible.sort_by(|a, b| a.data.appointment_date.cmp(&b.data.appointment_date));

        Ok(visible
            .into_iter()
            .map(|a| appointment_detail(a, &users))
            .collect())
    }

    /// Every appointment, earliest first, without an authorisation check.
    pub fn list_all(&self) -> ClinicResult<Vec<wire::AppointmentDetailRes>> {
        let db = self.store.snapshot()?;
        let users = user_directory(&db);

        let mut all: Vec<&Record<Appointment>> = db.appointments.iter().collect();
        all.sort_by(|a, b| a.data.appointment_date.cmp(&b.data.appointment_date));
        Ok(all.into_iter().map(|a| appointment_detail(a, &users)).collect())
    }

    /// Sets the status of an appointment. Any valid status may follow any other.
    ///
    /// # Errors
    ///
    /// - [`ClinicError::NotFound`] if the appointment does not exist.
    /// - [`ClinicError::Forbidden`] unless the caller is an admin or the assigned doctor.
    /// - [`ClinicError::Validation`] if `status` is not `scheduled`, `completed` or `cancelled`.
    pub fn update_status(
        &self,
        principal: &Principal,
        appointment_id: &str,
        status: Option<&str>,
    ) -> ClinicResult<wire::AppointmentRes> {
        let id = parse_record_id(appointment_id, NOT_FOUND)?;

        let updated = self
            .store
            .try_update_by_id(&id, |_, appointment: &mut Appointment| {
                if !(principal.is_admin() || principal.is_doctor(&appointment.doctor_id)) {
                    tracing::debug!(user = %principal.id, appointment = %id, "status update denied");
                    return Err(ClinicError::forbidden(
                        "Not authorized to update appointment status",
                    ));
                }
                appointment.status = status.unwrap_or_default().trim().parse()?;
                Ok(())
            })?
            .ok_or_else(|| ClinicError::not_found(NOT_FOUND))?;

        tracing::info!(
            appointment = %updated.id,
            status = %updated.data.status,
            by = %principal.id,
            "appointment status updated"
        );
        Ok(appointment_res(&updated))
    }

    /// Cancels an appointment on behalf of the patient who booked it.
    ///
    /// A completed appointment can still be cancelled.
    ///
    /// # Errors
    ///
    /// - [`ClinicError::NotFound`] if the appointment does not exist.
    /// - [`ClinicError::Forbidden`] unless the caller is the appointment's patient.
    /// - [`ClinicError::Conflict`] if it is already cancelled.
    pub fn cancel(&self, principal: &Principal, appointment_id: &str) -> ClinicResult<wire::MessageRes> {
        let id = parse_record_id(appointment_id, NOT_FOUND)?;

        self.store
            .try_update_by_id(&id, |_, appointment: &mut Appointment| {
                if !principal.is(&appointment.patient_id) {
                    tracing::debug!(user = %principal.id, appointment = %id, "cancel denied");
                    return Err(ClinicError::forbidden(
                        "Not authorized to cancel this appointment",
                    ));
                }
                if appointment.status == AppointmentStatus::Cancelled {
                    return Err(ClinicError::conflict("Appointment is already cancelled"));
                }
                appointment.status = AppointmentStatus::Cancelled;
                Ok(())
            })?
            .ok_or_else(|| ClinicError::not_found(NOT_FOUND))?;

        tracing::info!(appointment = %id, patient = %principal.id, "appointment cancelled");
        Ok(wire::MessageRes::new("Appointment cancelled"))
    }
}

/// Parses an appointment date.
///
/// Accepts RFC 3339 (`2030-05-01T09:30:00Z`, `2030-05-01T10:30:00+01:00`), a date-time without
/// offset (`2030-05-01T09:30`, `2030-05-01T09:30:00`, `2030-05-01 09:30:00`) or a bare date
/// (`2030-05-01`, midnight). Values without an offset are taken as UTC.
pub fn parse_appointment_date(raw: &str) -> ClinicResult<DateTime<Utc>> {
    let raw = raw.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }

    const NAIVE_FORMATS: [&str; 4] = [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%d %H:%M",
    ];
    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Ok(naive.and_utc());
        }
    }

    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
        .ok_or_else(|| ClinicError::validation("Invalid appointment date"))
}
