//! # Clinic Core
//!
//! Core business logic for the clinic scheduling service.
//!
//! This crate contains the record store and every rule about who may read or write what:
//! - User registration, login and bearer-token resolution ([`UserService`])
//! - Appointment booking, status changes and cancellation ([`AppointmentService`])
//! - Prescriptions issued against appointments ([`PrescriptionService`])
//! - A JSON-document record store with pluggable persistence ([`store`])
//!
//! **No API concerns**: HTTP routing, status codes and request parsing belong in `api-rest`.
//! Errors carry an [`ErrorKind`] that transport layers map onto their own status model.

pub mod access;
pub mod config;
pub mod constants;
pub mod credentials;
pub mod error;
pub mod models;
pub mod repositories;
pub mod store;

pub use access::{authorize, authorize_any, Principal};
pub use config::CoreConfig;
pub use credentials::Credentials;
pub use error::{ClinicError, ClinicResult, ErrorKind};
pub use models::{AppointmentStatus, Role};
pub use repositories::appointments::AppointmentService;
pub use repositories::prescriptions::PrescriptionService;
pub use repositories::users::UserService;
pub use store::{JsonFileBackend, MemoryBackend, RecordStore, StoreError};
