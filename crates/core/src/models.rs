//! Stored entity types.
//!
//! These are the shapes persisted in the record store. None of them carry denormalised data:
//! an appointment refers to its users by id, a prescription refers to its appointment by id, and
//! the joined views are built on read in [`crate::repositories::shared`].

use crate::constants::{APPOINTMENTS_COLLECTION, PRESCRIPTIONS_COLLECTION, USERS_COLLECTION};
use crate::store::{Database, Entity, Record};
use crate::{ClinicError, ClinicResult};
use chrono::{DateTime, Utc};
use clinic_types::{EmailAddress, NonEmptyText};
use clinic_uuid::RecordId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Role of a user account.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Patient,
    Doctor,
    Admin,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Patient, Role::Doctor, Role::Admin];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Patient => "patient",
            Role::Doctor => "doctor",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ClinicError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .into_iter()
            .find(|role| role.as_str() == s)
            .ok_or_else(|| ClinicError::validation(format!("Invalid role: {s}")))
    }
}

/// Lifecycle state of an appointment.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppointmentStatus {
    Scheduled,
    Completed,
    Cancelled,
}

impl AppointmentStatus {
    pub const ALL: [AppointmentStatus; 3] = [
        AppointmentStatus::Scheduled,
        AppointmentStatus::Completed,
        AppointmentStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::Scheduled => "scheduled",
            AppointmentStatus::Completed => "completed",
            AppointmentStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AppointmentStatus {
    type Err = ClinicError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AppointmentStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| ClinicError::validation("Invalid status"))
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub name: String,
    pub email: EmailAddress,
    pub password_hash: String,
    pub role: Role,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Appointment {
    pub patient_id: RecordId,
    pub doctor_id: RecordId,
    pub appointment_date: DateTime<Utc>,
    pub status: AppointmentStatus,
    #[serde(default)]
    pub notes: String,
}

/// One line of a prescription.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Medication {
    pub name: String,
    pub dosage: String,
    pub frequency: String,
}

impl Medication {
    /// Builds a medication line, requiring every field to be present and non-blank.
    pub fn new(
        name: Option<&str>,
        dosage: Option<&str>,
        frequency: Option<&str>,
    ) -> ClinicResult<Self> {
        let field = |value: Option<&str>, label: &str| {
            NonEmptyText::from_option(value)
                .map(NonEmptyText::into_inner)
                .map_err(|_| ClinicError::validation(format!("{label} is required")))
        };

        Ok(Self {
            name: field(name, "Medication name")?,
            dosage: field(dosage, "Dosage")?,
            frequency: field(frequency, "Frequency")?,
        })
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Prescription {
    pub appointment_id: RecordId,
    pub medications: Vec<Medication>,
    pub issued_date: DateTime<Utc>,
    #[serde(default)]
    pub instructions: String,
}

impl Entity for User {
    const COLLECTION: &'static str = USERS_COLLECTION;

    fn collection(db: &Database) -> &Vec<Record<Self>> {
        &db.users
    }

    fn collection_mut(db: &mut Database) -> &mut Vec<Record<Self>> {
        &mut db.users
    }
}

impl Entity for Appointment {
    const COLLECTION: &'static str = APPOINTMENTS_COLLECTION;

    fn collection(db: &Database) -> &Vec<Record<Self>> {
        &db.appointments
    }

    fn collection_mut(db: &mut Database) -> &mut Vec<Record<Self>> {
        &mut db.appointments
    }
}

impl Entity for Prescription {
    const COLLECTION: &'static str = PRESCRIPTIONS_COLLECTION;

    fn collection(db: &Database) -> &Vec<Record<Self>> {
        &db.prescriptions
    }

    fn collection_mut(db: &mut Database) -> &mut Vec<Record<Self>> {
        &mut db.prescriptions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_parses_only_known_values() {
        assert_eq!("doctor".parse::<Role>().unwrap(), Role::Doctor);
        assert_eq!("admin".parse::<Role>().unwrap(), Role::Admin);
        assert!("Doctor".parse::<Role>().is_err());
        assert!("superuser".parse::<Role>().is_err());
    }

    #[test]
    fn status_serialises_lowercase() {
        let json = serde_json::to_string(&AppointmentStatus::Cancelled).unwrap();
        assert_eq!(json, "\"cancelled\"");
        let err = "done".parse::<AppointmentStatus>().unwrap_err();
        assert_eq!(err.to_string(), "Invalid status");
    }

    #[test]
    fn medication_requires_every_field() {
        let ok = Medication::new(Some(" Amoxicillin "), Some("500mg"), Some("3x daily")).unwrap();
        assert_eq!(ok.name, "Amoxicillin");

        let err = Medication::new(Some("Amoxicillin"), None, Some("daily")).unwrap_err();
        assert_eq!(err.to_string(), "Dosage is required");
        assert!(Medication::new(Some(""), Some("1"), Some("1")).is_err());
    }

    #[test]
    fn user_record_serialises_with_store_field_names() {
        let record = Record {
            id: RecordId::parse("550e8400e29b41d4a716446655440000").unwrap(),
            data: User {
                name: "Ann".into(),
                email: EmailAddress::parse("ann@example.com").unwrap(),
                password_hash: "$argon2id$...".into(),
                role: Role::Doctor,
            },
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["_id"], "550e8400e29b41d4a716446655440000");
        assert_eq!(value["role"], "doctor");
        assert_eq!(value["passwordHash"], "$argon2id$...");
        assert!(value.get("createdAt").is_some());
        assert!(value.get("data").is_none(), "entity fields are flattened");
    }
}
