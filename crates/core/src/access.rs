//! Authenticated identities and role checks.
//!
//! A [`Principal`] is only ever produced by
//! [`UserService::authenticate`](crate::repositories::users::UserService::authenticate), so
//! holding one means the bearer credential was valid and the account still existed at the start
//! of the request. Every authorisation decision in the services is made against it.

use crate::models::{Role, User};
use crate::store::Record;
use crate::{ClinicError, ClinicResult};
use clinic_types::EmailAddress;
use clinic_uuid::RecordId;

/// The authenticated caller. Carries no password material.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Principal {
    pub id: RecordId,
    pub name: String,
    pub email: EmailAddress,
    pub role: Role,
}

impl Principal {
    pub fn from_record(record: &Record<User>) -> Self {
        Self {
            id: record.id,
            name: record.data.name.clone(),
            email: record.data.email.clone(),
            role: record.data.role,
        }
    }

    /// True if this principal is the user with `id`.
    pub fn is(&self, id: &RecordId) -> bool {
        self.id == *id
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// True if this principal is a doctor and specifically the doctor with `doctor_id`.
    pub fn is_doctor(&self, doctor_id: &RecordId) -> bool {
        self.role == Role::Doctor && self.is(doctor_id)
    }
}

/// Requires `principal` to hold exactly `required`.
///
/// Admin does not pass a doctor or patient check; operations where admin has elevated rights
/// say so explicitly.
pub fn authorize(principal: &Principal, required: Role) -> ClinicResult<()> {
    if principal.role == required {
        return Ok(());
    }
    tracing::debug!(user = %principal.id, role = %principal.role, required = %required, "role check failed");
    Err(ClinicError::forbidden(match required {
        Role::Patient => "Patient access only",
        Role::Doctor => "Doctor access only",
        Role::Admin => "Admin access only",
    }))
}

/// Requires `principal` to hold one of `allowed`.
pub fn authorize_any(principal: &Principal, allowed: &[Role]) -> ClinicResult<()> {
    if allowed.contains(&principal.role) {
        return Ok(());
    }
    tracing::debug!(user = %principal.id, role = %principal.role, "role check failed");
    Err(ClinicError::forbidden("Access denied"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn principal(role: Role) -> Principal {
        Principal {
            id: RecordId::new(),
            name: "Someone".into(),
            email: EmailAddress::parse("someone@example.com").unwrap(),
            role,
        }
    }

    #[test]
    fn authorize_requires_exact_role() {
        assert!(authorize(&principal(Role::Doctor), Role::Doctor).is_ok());

        let err = authorize(&principal(Role::Admin), Role::Doctor).unwrap_err();
        assert!(matches!(err, ClinicError::Forbidden(_)));
        assert_eq!(err.to_string(), "Doctor access only");
    }

    #[test]
    fn authorize_any_accepts_listed_roles() {
        let allowed = [Role::Doctor, Role::Admin];
        assert!(authorize_any(&principal(Role::Admin), &allowed).is_ok());
        assert!(authorize_any(&principal(Role::Patient), &allowed).is_err());
    }

    #[test]
    fn is_doctor_checks_role_and_identity() {
        let doctor = principal(Role::Doctor);
        assert!(doctor.is_doctor(&doctor.id));
        assert!(!doctor.is_doctor(&RecordId::new()));

        let admin = principal(Role::Admin);
        assert!(!admin.is_doctor(&admin.id));
    }
}
