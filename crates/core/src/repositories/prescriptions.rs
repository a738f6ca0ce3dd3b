//! Prescriptions.
//!
//! A prescription hangs off an appointment and never stores its patient: the patient is always
//! the appointment's patient, and authority over a prescription is decided by loading the
//! appointment first and checking its doctor.

use crate::access::Principal;
use crate::models::{Appointment, Medication, Prescription, Role};
use crate::repositories::shared::{parse_record_id, prescription_detail, prescription_res, user_directory};
use crate::store::{Database, Record, RecordStore};
use crate::{ClinicError, ClinicResult};
use api_shared::wire::{self, MedicationReq};
use chrono::{DateTime, Duration, SubsecRound, Utc};
use clinic_uuid::RecordId;
use std::sync::Arc;

const NOT_FOUND: &str = "Prescription not found";
const APPOINTMENT_NOT_FOUND: &str = "Appointment not found";

/// Service for issuing and maintaining prescriptions.
#[derive(Clone, Debug)]
pub struct PrescriptionService {
    store: Arc<RecordStore>,
}

impl PrescriptionService {
    pub fn new(store: Arc<RecordStore>) -> Self {
        Self { store }
    }

    /// Issues a prescription against an appointment. Only that appointment's doctor may do so.
    ///
    /// # Errors
    ///
    /// - [`ClinicError::Validation`] if the appointment id is missing, there are no
    ///   medications, or a medication lacks a name, dosage or frequency.
    /// - [`ClinicError::NotFound`] if the appointment does not exist.
    /// - [`ClinicError::Forbidden`] unless the caller is the appointment's doctor.
    pub fn create(
        &self,
        principal: &Principal,
        appointment_id: Option<&str>,
        medications: Option<&[MedicationReq]>,
        instructions: Option<&str>,
    ) -> ClinicResult<wire::PrescriptionRes> {
        let (Some(appointment_id), Some(medications)) = (
            appointment_id.map(str::trim).filter(|a| !a.is_empty()),
            medications.filter(|m| !m.is_empty()),
        ) else {
            return Err(ClinicError::validation(
                "Appointment ID and at least one medication are required",
            ));
        };
        let medications = medication_lines(medications)?;
        let appointment_id = parse_record_id(appointment_id, APPOINTMENT_NOT_FOUND)?;

        let record = self.store.insert_with(|db| {
            let appointment = find_appointment(db, &appointment_id)?;
            if !principal.is_doctor(&appointment.data.doctor_id) {
                tracing::debug!(user = %principal.id, appointment = %appointment_id, "prescribing denied");
                return Err(ClinicError::forbidden(
                    "Not authorized to create prescription for this appointment",
                ));
            }
            Ok(Prescription {
                appointment_id,
                medications,
                issued_date: next_issued_date(db, Utc::now()),
                instructions: instructions.map(str::trim).unwrap_or_default().to_owned(),
            })
        })?;

        tracing::info!(
            prescription = %record.id,
            appointment = %appointment_id,
            doctor = %principal.id,
            "prescription issued"
        );
        Ok(prescription_res(&record))
    }

    /// Prescriptions whose appointment belongs to `patient_id`, most recently issued first.
    ///
    /// Patients may only query themselves. Prescriptions whose appointment has gone missing are
    /// skipped.
    pub fn list_for_patient(
        &self,
        principal: &Principal,
        patient_id: &str,
    ) -> ClinicResult<Vec<wire::PrescriptionDetailRes>> {
        let patient_id = RecordId::parse(patient_id.trim()).ok();

        if principal.role == Role::Patient && patient_id != Some(principal.id) {
            tracing::debug!(user = %principal.id, "prescription listing denied");
            return Err(ClinicError::forbidden(
                "Not authorized to access these prescriptions",
            ));
        }
        let Some(patient_id) = patient_id else {
            return Ok(Vec::new());
        };

        let db = self.store.snapshot()?;
        let users = user_directory(&db);

        let mut matching: Vec<(&Record<Prescription>, &Record<Appointment>)> = db
            .prescriptions
            .iter()
            .filter_map(|p| {
                let appointment = db
                    .appointments
                    .iter()
                    .find(|a| a.id == p.data.appointment_id);
                if appointment.is_none() {
                    tracing::warn!(
                        prescription = %p.id,
                        appointment = %p.data.appointment_id,
                        "prescription references a missing appointment"
                    );
                }
                appointment.map(|a| (p, a))
            })
            .filter(|(_, a)| a.data.patient_id == patient_id)
            .collect();
        matching.sort_by(|(a, _), (b, _)| b.data.issued_date.cmp(&a.data.issued_date));

        Ok(matching
            .into_iter()
            .map(|(p, a)| prescription_detail(p, a, &users))
            .collect())
    }

    /// Edits a prescription. Only the appointment's doctor may do so.
    ///
    /// Medications are replaced only by a non-empty list. Instructions are replaced whenever
    /// given, including by an empty string.
    ///
    /// # Errors
    ///
    /// - [`ClinicError::NotFound`] if the prescription or its appointment does not exist.
    /// - [`ClinicError::Forbidden`] unless the caller is the appointment's doctor.
    /// - [`ClinicError::Validation`] if a replacement medication is incomplete.
    pub fn update(
        &self,
        principal: &Principal,
        prescription_id: &str,
        medications: Option<&[MedicationReq]>,
        instructions: Option<&str>,
    ) -> ClinicResult<wire::PrescriptionRes> {
        let id = parse_record_id(prescription_id, NOT_FOUND)?;

        let updated = self
            .store
            .try_update_by_id(&id, |db, prescription: &mut Prescription| {
                let appointment = find_appointment(db, &prescription.appointment_id)?;
                if !principal.is_doctor(&appointment.data.doctor_id) {
                    tracing::debug!(user = %principal.id, prescription = %id, "prescription update denied");
                    return Err(ClinicError::forbidden(
                        "Not authorized to update this prescription",
                    ));
                }
                if let Some(medications) = medications.filter(|m| !m.is_empty()) {
                    prescription.medications = medication_lines(medications)?;
                }
                if let Some(instructions) = instructions {
                    prescription.instructions = instructions.trim().to_owned();
                }
                Ok(())
            })?
            .ok_or_else(|| ClinicError::not_found(NOT_FOUND))?;

        tracing::info!(prescription = %updated.id, doctor = %principal.id, "prescription updated");
        Ok(prescription_res(&updated))
    }

    /// Deletes a prescription. Allowed for admins and for the appointment's doctor.
    ///
    /// # Errors
    ///
    /// - [`ClinicError::NotFound`] if the prescription does not exist.
    /// - [`ClinicError::Forbidden`] unless the caller is an admin or the appointment's doctor. A
    ///   prescription whose appointment is gone has no doctor, so only an admin can delete it.
    pub fn delete(&self, principal: &Principal, prescription_id: &str) -> ClinicResult<wire::MessageRes> {
        let id = parse_record_id(prescription_id, NOT_FOUND)?;
        let prescription = self
            .store
            .find_by_id::<Prescription>(&id)?
            .ok_or_else(|| ClinicError::not_found(NOT_FOUND))?;

        if !principal.is_admin() {
            let assigned = self
                .store
                .find_by_id::<Appointment>(&prescription.data.appointment_id)?
                .is_some_and(|a| principal.is_doctor(&a.data.doctor_id));
            if !assigned {
                tracing::debug!(user = %principal.id, prescription = %id, "prescription delete denied");
                return Err(ClinicError::forbidden(
                    "Not authorized to delete this prescription",
                ));
            }
        }

        if !self.store.remove_by_id::<Prescription>(&id)? {
            return Err(ClinicError::not_found(NOT_FOUND));
        }

        tracing::info!(prescription = %id, by = %principal.id, "prescription deleted");
        Ok(wire::MessageRes::new("Prescription deleted"))
    }
}

fn find_appointment<'a>(db: &'a Database, id: &RecordId) -> ClinicResult<&'a Record<Appointment>> {
    db.appointments
        .iter()
        .find(|a| a.id == *id)
        .ok_or_else(|| ClinicError::not_found(APPOINTMENT_NOT_FOUND))
}

fn medication_lines(requested: &[MedicationReq]) -> ClinicResult<Vec<Medication>> {
    requested
        .iter()
        .map(|m| Medication::new(m.name.as_deref(), m.dosage.as_deref(), m.frequency.as_deref()))
        .collect()
}

/// Issue timestamps are kept at millisecond precision and strictly increasing across the
/// collection, so "most recent first" is a total order even within one clock tick.
fn next_issued_date(db: &Database, now: DateTime<Utc>) -> DateTime<Utc> {
    let now = now.trunc_subsecs(3);
    match db.prescriptions.iter().map(|p| p.data.issued_date).max() {
        Some(last) if now <= last => last + Duration::milliseconds(1),
        _ => now,
    }
}
