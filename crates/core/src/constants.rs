//! Constants used throughout the clinic core crate.
//!
//! Collection names, defaults and fixed limits live here so the store, the services and the
//! binaries agree on them.

/// Default path of the JSON document store when no explicit file is configured.
pub const DEFAULT_DB_FILE: &str = "data/db.json";

/// Collection holding user records.
pub const USERS_COLLECTION: &str = "users";

/// Collection holding appointment records.
pub const APPOINTMENTS_COLLECTION: &str = "appointments";

/// Collection holding prescription records.
pub const PRESCRIPTIONS_COLLECTION: &str = "prescriptions";

/// Fixed page size for the admin user listing.
pub const USER_PAGE_SIZE: usize = 10;

/// Default lifetime of an issued bearer token, in days.
pub const DEFAULT_TOKEN_TTL_DAYS: i64 = 30;
