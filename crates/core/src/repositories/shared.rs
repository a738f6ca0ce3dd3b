//! Read-side projections shared by the services.
//!
//! Stored records never hold denormalised copies of other records. Responses that embed a user
//! inside an appointment, or an appointment inside a prescription, are assembled here at read
//! time from a lookup over the current users.

use crate::models::{Appointment, Prescription, User};
use crate::store::{Database, Record};
use crate::{ClinicError, ClinicResult};
use api_shared::wire;
use chrono::{DateTime, SecondsFormat, Utc};
use clinic_uuid::RecordId;
use std::collections::HashMap;

/// Users keyed by id, for resolving appointment parties.
pub(crate) type UserDirectory<'a> = HashMap<RecordId, &'a Record<User>>;

pub(crate) fn user_directory(db: &Database) -> UserDirectory<'_> {
    db.users.iter().map(|u| (u.id, u)).collect()
}

/// Parses an externally supplied id. A malformed id cannot name any record, so it is reported
/// the same way as a well-formed id that does not exist.
pub(crate) fn parse_record_id(raw: &str, not_found_message: &str) -> ClinicResult<RecordId> {
    RecordId::parse(raw.trim()).map_err(|_| ClinicError::not_found(not_found_message))
}

pub fn timestamp(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn user_res(record: &Record<User>) -> wire::UserRes {
    wire::UserRes {
        id: record.id.to_string(),
        name: record.data.name.clone(),
        email: record.data.email.to_string(),
        role: record.data.role.to_string(),
        created_at: timestamp(&record.created_at),
        updated_at: timestamp(&record.updated_at),
    }
}

/// The reduced `{_id, name, email}` view.
pub fn user_summary(record: &Record<User>) -> wire::UserSummary {
    wire::UserSummary {
        id: record.id.to_string(),
        name: record.data.name.clone(),
        email: record.data.email.to_string(),
    }
}

pub fn appointment_res(record: &Record<Appointment>) -> wire::AppointmentRes {
    let a = &record.data;
    wire::AppointmentRes {
        id: record.id.to_string(),
        patient_id: a.patient_id.to_string(),
        doctor_id: a.doctor_id.to_string(),
        appointment_date: timestamp(&a.appointment_date),
        status: a.status.to_string(),
        notes: a.notes.clone(),
        created_at: timestamp(&record.created_at),
        updated_at: timestamp(&record.updated_at),
    }
}

/// An appointment with its patient and doctor resolved against `users`.
pub(crate) fn appointment_detail(
    record: &Record<Appointment>,
    users: &UserDirectory<'_>,
) -> wire::AppointmentDetailRes {
    let a = &record.data;
    wire::AppointmentDetailRes {
        id: record.id.to_string(),
        patient_id: a.patient_id.to_string(),
        doctor_id: a.doctor_id.to_string(),
        appointment_date: timestamp(&a.appointment_date),
        status: a.status.to_string(),
        notes: a.notes.clone(),
        created_at: timestamp(&record.created_at),
        updated_at: timestamp(&record.updated_at),
        patient: users.get(&a.patient_id).map(|u| user_summary(u)),
        doctor: users.get(&a.doctor_id).map(|u| user_summary(u)),
    }
}

fn medications_res(prescription: &Prescription) -> Vec<wire::MedicationRes> {
    prescription
        .medications
        .iter()
        .map(|m| wire::MedicationRes {
            name: m.name.clone(),
            dosage: m.dosage.clone(),
            frequency: m.frequency.clone(),
        })
        .collect()
}

pub fn prescription_res(record: &Record<Prescription>) -> wire::PrescriptionRes {
    let p = &record.data;
    wire::PrescriptionRes {
        id: record.id.to_string(),
        appointment_id: p.appointment_id.to_string(),
        medications: medications_res(p),
        instructions: p.instructions.clone(),
        issued_date: timestamp(&p.issued_date),
        created_at: timestamp(&record.created_at),
        updated_at: timestamp(&record.updated_at),
    }
}

pub(crate) fn prescription_detail(
    record: &Record<Prescription>,
    appointment: &Record<Appointment>,
    users: &UserDirectory<'_>,
) -> wire::PrescriptionDetailRes {
    let p = &record.data;
    wire::PrescriptionDetailRes {
        id: record.id.to_string(),
        appointment_id: p.appointment_id.to_string(),
        medications: medications_res(p),
        instructions: p.instructions.clone(),
        issued_date: timestamp(&p.issued_date),
        created_at: timestamp(&record.created_at),
        updated_at: timestamp(&record.updated_at),
        appointment: appointment_detail(appointment, users),
    }
}
