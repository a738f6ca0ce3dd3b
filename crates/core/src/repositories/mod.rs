//! Service modules.
//!
//! One service per entity, each holding a handle to the shared record store. Read-side
//! projections used by more than one service live in [`shared`].

pub mod appointments;
pub mod prescriptions;
pub mod shared;
pub mod users;
