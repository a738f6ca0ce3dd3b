//! Identity and access.
//!
//! This module owns the user lifecycle: registration, login, resolving bearer tokens to a
//! [`Principal`], profile reads and edits, and the admin-only listing and deletion.
//!
//! ## Rules
//!
//! - Email addresses are unique across all users (compared after lowercasing).
//! - Role and password cannot be changed through the profile path.
//! - Login failures never reveal whether the email exists.
//! - Deleting a user does not cascade. Appointments and prescriptions that reference the user
//!   stay, and read paths render the missing party as `null`.

use crate::access::{authorize, Principal};
use crate::constants::USER_PAGE_SIZE;
use crate::credentials::Credentials;
use crate::models::{Role, User};
use crate::repositories::shared::{parse_record_id, user_res};
use crate::store::{Record, RecordStore};
use crate::{ClinicError, ClinicResult};
use api_shared::wire;
use clinic_types::{EmailAddress, NonEmptyText, TextError};
use std::sync::Arc;

const BAD_LOGIN: &str = "Invalid email or password";
const TOKEN_MISSING: &str = "Not authorized, token missing";
const TOKEN_INVALID: &str = "Not authorized, token invalid";
const INVALID_EMAIL: &str = "Invalid email address";

/// Service for user accounts and authentication.
#[derive(Clone, Debug)]
pub struct UserService {
    store: Arc<RecordStore>,
    credentials: Arc<Credentials>,
}

impl UserService {
    pub fn new(store: Arc<RecordStore>, credentials: Arc<Credentials>) -> Self {
        Self { store, credentials }
    }

    /// Registers a new account and returns it together with a fresh bearer token.
    ///
    /// # Errors
    ///
    /// - [`ClinicError::Validation`] if name, email or password is missing, the email is
    ///   malformed, or `role` is given but not one of `patient`, `doctor`, `admin`.
    /// - [`ClinicError::Conflict`] if the email is already registered.
    pub fn register(
        &self,
        name: Option<&str>,
        email: Option<&str>,
        password: Option<&str>,
        role: Option<&str>,
    ) -> ClinicResult<wire::AuthRes> {
        let user = self.create_user(name, email, password, role)?;
        self.session(&user)
    }

    /// Creates an account without issuing a token. Shared by registration and the operator CLI.
    pub fn create_user(
        &self,
        name: Option<&str>,
        email: Option<&str>,
        password: Option<&str>,
        role: Option<&str>,
    ) -> ClinicResult<Record<User>> {
        const REQUIRED: &str = "Name, email and password are required";

        let name = NonEmptyText::from_option(name).map_err(|_| ClinicError::validation(REQUIRED))?;
        let email = match EmailAddress::parse(email.unwrap_or_default()) {
            Ok(email) => email,
            Err(TextError::Empty) => return Err(ClinicError::validation(REQUIRED)),
            Err(_) => return Err(ClinicError::validation(INVALID_EMAIL)),
        };
        let password = password
            .filter(|p| !p.is_empty())
            .ok_or_else(|| ClinicError::validation(REQUIRED))?;
        let role = match role.map(str::trim).filter(|r| !r.is_empty()) {
            Some(raw) => raw.parse::<Role>()?,
            None => Role::Patient,
        };

        let password_hash = self.credentials.hash_password(password)?;

        let record = self.store.insert_with(|db| {
            if db.users.iter().any(|u| u.data.email == email) {
                return Err(ClinicError::conflict("Email already registered"));
            }
            Ok(User {
                name: name.into_inner(),
                email: email.clone(),
                password_hash,
                role,
            })
        })?;

        tracing::info!(user = %record.id, role = %record.data.role, "user registered");
        Ok(record)
    }

    /// Exchanges email and password for a bearer token.
    ///
    /// # Errors
    ///
    /// - [`ClinicError::Validation`] if either field is missing.
    /// - [`ClinicError::Auth`] if no account matches or the password is wrong. Both cases produce
    ///   the same message.
    pub fn login(&self, email: Option<&str>, password: Option<&str>) -> ClinicResult<wire::AuthRes> {
        let (Some(email), Some(password)) = (
            email.filter(|e| !e.trim().is_empty()),
            password.filter(|p| !p.is_empty()),
        ) else {
            return Err(ClinicError::validation("Email and password are required"));
        };

        let email = EmailAddress::parse(email).map_err(|_| ClinicError::auth(BAD_LOGIN))?;
        let user = self
            .store
            .find_one(|u: &Record<User>| u.data.email == email)?;

        match user {
            Some(user) if self.credentials.verify_password(password, &user.data.password_hash) => {
                tracing::info!(user = %user.id, "user logged in");
                self.session(&user)
            }
            _ => Err(ClinicError::auth(BAD_LOGIN)),
        }
    }

    /// Resolves a bearer token to the account it was issued for.
    ///
    /// # Errors
    ///
    /// [`ClinicError::Auth`] if the token is missing, malformed, expired, signed with another
    /// key, or names a user that no longer exists.
    pub fn authenticate(&self, token: Option<&str>) -> ClinicResult<Principal> {
        let token = token.ok_or_else(|| ClinicError::auth(TOKEN_MISSING))?;
        let user_id = self.credentials.verify(token)?;

        match self.store.find_by_id::<User>(&user_id)? {
            Some(user) => Ok(Principal::from_record(&user)),
            None => {
                tracing::debug!(user = %user_id, "token names a deleted user");
                Err(ClinicError::auth(TOKEN_INVALID))
            }
        }
    }

    pub fn profile(&self, principal: &Principal) -> ClinicResult<wire::UserRes> {
        let user = self
            .store
            .find_by_id::<User>(&principal.id)?
            .ok_or_else(|| ClinicError::not_found("User not found"))?;
        Ok(user_res(&user))
    }

    /// Updates the caller's name and/or email. Absent or blank fields keep their value.
    ///
    /// # Errors
    ///
    /// - [`ClinicError::Validation`] if a new email is malformed.
    /// - [`ClinicError::Conflict`] if a new email belongs to another user.
    /// - [`ClinicError::NotFound`] if the caller's account has been deleted meanwhile.
    pub fn update_profile(
        &self,
        principal: &Principal,
        name: Option<&str>,
        email: Option<&str>,
    ) -> ClinicResult<wire::UserRes> {
        let name = name.and_then(|n| NonEmptyText::new(n).ok());
        let email = match email.filter(|e| !e.trim().is_empty()) {
            Some(raw) => {
                Some(EmailAddress::parse(raw).map_err(|_| ClinicError::validation(INVALID_EMAIL))?)
            }
            None => None,
        };

        let updated = self
            .store
            .try_update_by_id(&principal.id, |db, user: &mut User| {
                if let Some(email) = &email {
                    let taken = db
                        .users
                        .iter()
                        .any(|u| u.id != principal.id && u.data.email == *email);
                    if taken {
                        return Err(ClinicError::conflict("Email already in use"));
                    }
                    user.email = email.clone();
                }
                if let Some(name) = &name {
                    user.name = name.as_str().to_owned();
                }
                Ok(())
            })?
            .ok_or_else(|| ClinicError::not_found("User not found"))?;

        tracing::info!(user = %updated.id, "profile updated");
        Ok(user_res(&updated))
    }

    /// Admin-only paged listing, newest accounts first.
    ///
    /// `page_number` is taken as given on the query string: anything that is not a positive
    /// integer means page 1.
    pub fn list_users(
        &self,
        principal: &Principal,
        page_number: Option<&str>,
    ) -> ClinicResult<wire::ListUsersRes> {
        authorize(principal, Role::Admin)?;
        let page = page_number
            .and_then(|p| p.trim().parse::<u32>().ok())
            .filter(|p| *p > 0)
            .unwrap_or(1);
        self.users_page(page)
    }

    /// One page of users (page size is fixed), without an authorisation check. Page 0 is
    /// treated as page 1.
    pub fn users_page(&self, page: u32) -> ClinicResult<wire::ListUsersRes> {
        let page = page.max(1);
        // Insertion order breaks ties between identical creation timestamps.
        let mut users = self.store.all::<User>()?;
        users.reverse();
        users.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let total = users.len();
        let pages = total.div_ceil(USER_PAGE_SIZE);
        let start = (page as usize - 1).saturating_mul(USER_PAGE_SIZE);

        Ok(wire::ListUsersRes {
            users: users
                .iter()
                .skip(start)
                .take(USER_PAGE_SIZE)
                .map(user_res)
                .collect(),
            page,
            pages: u32::try_from(pages).unwrap_or(u32::MAX),
        })
    }

    /// Admin-only deletion. Does not cascade.
    pub fn delete_user(&self, principal: &Principal, id: &str) -> ClinicResult<wire::MessageRes> {
        authorize(principal, Role::Admin)?;
        self.remove_user(id)?;
        tracing::info!(admin = %principal.id, user = %id, "user removed");
        Ok(wire::MessageRes::new("User removed"))
    }

    /// Removes a user without an authorisation check.
    pub fn remove_user(&self, id: &str) -> ClinicResult<()> {
        let id = parse_record_id(id, "User not found")?;
        if self.store.remove_by_id::<User>(&id)? {
            Ok(())
        } else {
            Err(ClinicError::not_found("User not found"))
        }
    }

    /// Tokens are stateless; logging out is the client discarding its token.
    pub fn logout(&self) -> wire::MessageRes {
        wire::MessageRes::new("Logout successful")
    }

    fn session(&self, user: &Record<User>) -> ClinicResult<wire::AuthRes> {
        Ok(wire::AuthRes {
            id: user.id.to_string(),
            name: user.data.name.clone(),
            email: user.data.email.to_string(),
            role: user.data.role.to_string(),
            token: self.credentials.issue(&user.id)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::test_credentials;
    use crate::store::JsonFileBackend;
    use tempfile::TempDir;

    fn service() -> UserService {
        UserService::new(
            Arc::new(RecordStore::in_memory()),
            Arc::new(test_credentials()),
        )
    }

    fn register(svc: &UserService, name: &str, email: &str, role: &str) -> wire::AuthRes {
        svc.register(Some(name), Some(email), Some("Password123"), Some(role))
            .expect("registration should succeed")
    }

    fn principal_for(svc: &UserService, auth: &wire::AuthRes) -> Principal {
        svc.authenticate(Some(&auth.token))
            .expect("fresh token should authenticate")
    }

    #[test]
    fn test_register_returns_public_view_and_token() {
        let svc = service();
        let auth = register(&svc, "Doctor User", "doctor@example.com", "doctor");

        assert_eq!(auth.name, "Doctor User");
        assert_eq!(auth.role, "doctor");
        assert!(!auth.token.is_empty());

        let stored = svc
            .store
            .find_one(|u: &Record<User>| u.data.email.as_str() == "doctor@example.com")
            .unwrap()
            .unwrap();
        assert_ne!(stored.data.password_hash, "Password123");
        assert!(stored.data.password_hash.starts_with("$argon2id$"));
    }

    #[test]
    fn test_register_defaults_absent_role_to_patient() {
        let svc = service();
        let auth = svc
            .register(Some("Pat"), Some("pat@example.com"), Some("pw"), None)
            .unwrap();
        assert_eq!(auth.role, "patient");

        let blank = svc
            .register(Some("Pam"), Some("pam@example.com"), Some("pw"), Some(" "))
            .unwrap();
        assert_eq!(blank.role, "patient");
    }

    #[test]
    fn test_register_rejects_unknown_role() {
        let svc = service();
        let err = svc
            .register(Some("Eve"), Some("eve@example.com"), Some("pw"), Some("superuser"))
            .unwrap_err();
        assert!(matches!(err, ClinicError::Validation(_)));
        assert_eq!(svc.store.count(|_: &Record<User>| true).unwrap(), 0);
    }

    #[test]
    fn test_register_requires_name_email_password() {
        let svc = service();
        let cases = [
            (None, Some("a@example.com"), Some("pw")),
            (Some("A"), None, Some("pw")),
            (Some("A"), Some("a@example.com"), None),
            (Some("  "), Some("a@example.com"), Some("pw")),
            (Some("A"), Some("a@example.com"), Some("")),
        ];
        for (name, email, password) in cases {
            let err = svc.register(name, email, password, None).unwrap_err();
            assert!(
                matches!(err, ClinicError::Validation(_)),
                "expected validation error for {name:?}/{email:?}/{password:?}"
            );
        }
    }

    #[test]
    fn test_register_duplicate_email_conflicts_regardless_of_other_fields() {
        let svc = service();
        register(&svc, "First", "dup@example.com", "patient");

        for role in ["patient", "doctor", "admin"] {
            let err = svc
                .register(Some("Other"), Some("DUP@example.com"), Some("different"), Some(role))
                .unwrap_err();
            assert!(matches!(err, ClinicError::Conflict(_)), "role {role}");
            assert_eq!(err.to_string(), "Email already registered");
        }
        assert_eq!(svc.store.count(|_: &Record<User>| true).unwrap(), 1);
    }

    #[test]
    fn test_login_success_and_uniform_failure() {
        let svc = service();
        let registered = register(&svc, "Pat", "pat@example.com", "patient");

        let ok = svc
            .login(Some("pat@example.com"), Some("Password123"))
            .unwrap();
        assert_eq!(ok.id, registered.id);

        let wrong_password = svc
            .login(Some("pat@example.com"), Some("nope"))
            .unwrap_err();
        let unknown_email = svc
            .login(Some("ghost@example.com"), Some("Password123"))
            .unwrap_err();

        assert!(matches!(wrong_password, ClinicError::Auth(_)));
        assert!(matches!(unknown_email, ClinicError::Auth(_)));
        assert_eq!(wrong_password.to_string(), unknown_email.to_string());
    }

    #[test]
    fn test_login_requires_both_fields() {
        let svc = service();
        assert!(matches!(
            svc.login(Some("pat@example.com"), None),
            Err(ClinicError::Validation(_))
        ));
        assert!(matches!(
            svc.login(None, Some("pw")),
            Err(ClinicError::Validation(_))
        ));
    }

    #[test]
    fn test_authenticate_rejects_missing_garbage_and_deleted_user() {
        let svc = service();
        let admin = register(&svc, "Admin", "admin@example.com", "admin");
        let pat = register(&svc, "Pat", "pat@example.com", "patient");

        assert!(matches!(svc.authenticate(None), Err(ClinicError::Auth(_))));
        assert!(matches!(
            svc.authenticate(Some("garbage")),
            Err(ClinicError::Auth(_))
        ));

        let principal = principal_for(&svc, &pat);
        assert_eq!(principal.role, Role::Patient);
        assert_eq!(principal.email.as_str(), "pat@example.com");

        let admin = principal_for(&svc, &admin);
        svc.delete_user(&admin, &pat.id).unwrap();
        assert!(matches!(
            svc.authenticate(Some(&pat.token)),
            Err(ClinicError::Auth(_))
        ));
    }

    #[test]
    fn test_update_profile_changes_name_and_email_only() {
        let svc = service();
        let auth = register(&svc, "Pat", "pat@example.com", "patient");
        let principal = principal_for(&svc, &auth);

        let updated = svc
            .update_profile(&principal, Some("Patricia"), Some("patricia@example.com"))
            .unwrap();
        assert_eq!(updated.name, "Patricia");
        assert_eq!(updated.email, "patricia@example.com");
        assert_eq!(updated.role, "patient");

        let kept = svc.update_profile(&principal, Some(""), None).unwrap();
        assert_eq!(kept.name, "Patricia");
        assert_eq!(kept.email, "patricia@example.com");
    }

    #[test]
    fn test_update_profile_email_collision_conflicts() {
        let svc = service();
        register(&svc, "Ann", "ann@example.com", "patient");
        let bob = register(&svc, "Bob", "bob@example.com", "patient");
        let bob = principal_for(&svc, &bob);

        let err = svc
            .update_profile(&bob, None, Some("ann@example.com"))
            .unwrap_err();
        assert!(matches!(err, ClinicError::Conflict(_)));

        // Re-submitting your own address is not a collision.
        assert!(svc
            .update_profile(&bob, None, Some("bob@example.com"))
            .is_ok());
    }

    #[test]
    fn test_list_users_is_admin_only_paged_and_newest_first() {
        let svc = service();
        let admin = register(&svc, "Admin", "admin@example.com", "admin");
        for i in 0..11 {
            register(&svc, &format!("User {i}"), &format!("user{i}@example.com"), "patient");
        }
        let admin = principal_for(&svc, &admin);

        let first = svc.list_users(&admin, None).unwrap();
        assert_eq!(first.page, 1);
        assert_eq!(first.pages, 2);
        assert_eq!(first.users.len(), 10);
        assert_eq!(first.users[0].name, "User 10");

        let second = svc.list_users(&admin, Some("2")).unwrap();
        assert_eq!(second.users.len(), 2);
        assert_eq!(second.users[1].name, "Admin");

        let fallback = svc.list_users(&admin, Some("abc")).unwrap();
        assert_eq!(fallback.page, 1);

        let patient = svc
            .login(Some("user0@example.com"), Some("Password123"))
            .unwrap();
        let patient = principal_for(&svc, &patient);
        assert!(matches!(
            svc.list_users(&patient, None),
            Err(ClinicError::Forbidden(_))
        ));
    }

    #[test]
    fn test_users_page_zero_reports_page_one() {
        let svc = service();
        register(&svc, "Pat", "pat@example.com", "patient");

        let listing = svc.users_page(0).unwrap();
        assert_eq!(listing.page, 1);
        assert_eq!(listing.pages, 1);
        assert_eq!(listing.users.len(), 1);
    }

    #[test]
    fn test_delete_user_requires_admin_and_existing_user() {
        let svc = service();
        let admin = register(&svc, "Admin", "admin@example.com", "admin");
        let doc = register(&svc, "Doc", "doc@example.com", "doctor");
        let admin = principal_for(&svc, &admin);
        let doc_principal = principal_for(&svc, &doc);

        assert!(matches!(
            svc.delete_user(&doc_principal, &admin.id.to_string()),
            Err(ClinicError::Forbidden(_))
        ));
        assert!(matches!(
            svc.delete_user(&admin, "not-an-id"),
            Err(ClinicError::NotFound(_))
        ));

        let res = svc.delete_user(&admin, &doc.id).unwrap();
        assert_eq!(res.message, "User removed");
        assert!(matches!(
            svc.delete_user(&admin, &doc.id),
            Err(ClinicError::NotFound(_))
        ));
    }

    #[test]
    fn test_registration_persists_to_json_store() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let path = temp_dir.path().join("db.json");
        let credentials = Arc::new(test_credentials());

        {
            let store = Arc::new(RecordStore::open(JsonFileBackend::new(&path)).unwrap());
            let svc = UserService::new(store, credentials.clone());
            register(&svc, "Pat", "pat@example.com", "patient");
        }

        let store = Arc::new(RecordStore::open(JsonFileBackend::new(&path)).unwrap());
        let svc = UserService::new(store, credentials);
        assert!(svc
            .login(Some("pat@example.com"), Some("Password123"))
            .is_ok());
    }
}
