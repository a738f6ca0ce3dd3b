//! Document record store.
//!
//! The clinic keeps all of its state in three keyed collections (`users`, `appointments`,
//! `prescriptions`) held together in a single [`Database`] document. Each entry is a
//! [`Record<T>`]: the entity's own fields flattened alongside `_id`, `createdAt` and `updatedAt`.
//!
//! ## Persisted shape
//!
//! ```text
//! {
//!   "users":         [ { "_id": "…", "name": "…", …, "createdAt": "…", "updatedAt": "…" } ],
//!   "appointments":  [ … ],
//!   "prescriptions": [ … ]
//! }
//! ```
//!
//! ## Consistency
//!
//! The document is loaded once when the store is opened and then held behind an `RwLock`.
//! Mutations are applied to a copy, persisted through the [`StoreBackend`], and only swapped in
//! once the backend accepted them, so a failed write never leaves memory ahead of disk.
//!
//! Individual operations are atomic. Sequences of operations are not; callers needing a check
//! and a write to happen together use [`RecordStore::insert_with`] or
//! [`RecordStore::try_update_by_id`], which run their closure under the write lock.

mod backend;

pub use backend::{JsonFileBackend, MemoryBackend, StoreBackend};

use crate::models::{Appointment, Prescription, User};
use chrono::{DateTime, Utc};
use clinic_uuid::RecordId;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::RwLock;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("failed to create store directory: {0}")]
    DirCreation(std::io::Error),
    #[error("failed to read store file: {0}")]
    FileRead(std::io::Error),
    #[error("failed to write store file: {0}")]
    FileWrite(std::io::Error),
    #[error("failed to serialize store: {0}")]
    Serialization(serde_json::Error),
    #[error("failed to deserialize store: {0}")]
    Deserialization(serde_json::Error),
    #[error("store lock poisoned by a panicked writer")]
    Poisoned,
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// A stored document: entity fields plus store-managed metadata.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record<T> {
    #[serde(rename = "_id")]
    pub id: RecordId,
    #[serde(flatten)]
    pub data: T,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The whole persisted document.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Database {
    #[serde(default)]
    pub users: Vec<Record<User>>,
    #[serde(default)]
    pub appointments: Vec<Record<Appointment>>,
    #[serde(default)]
    pub prescriptions: Vec<Record<Prescription>>,
}

/// An entity type that owns one collection of the [`Database`].
pub trait Entity: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Collection name, used in logs.
    const COLLECTION: &'static str;

    fn collection(db: &Database) -> &Vec<Record<Self>>;

    fn collection_mut(db: &mut Database) -> &mut Vec<Record<Self>>;
}

/// Keyed record store over a pluggable persistence backend.
///
/// Constructed once at startup and shared (behind an `Arc`) by every service.
#[derive(Debug)]
pub struct RecordStore {
    backend: Box<dyn StoreBackend>,
    data: RwLock<Database>,
}

impl RecordStore {
    /// Opens a store, loading the current document from `backend`.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if the backend cannot load (or initialise) its document.
    pub fn open(backend: impl StoreBackend + 'static) -> StoreResult<Self> {
        let data = backend.load()?;
        Ok(Self {
            backend: Box::new(backend),
            data: RwLock::new(data),
        })
    }

    /// Opens an empty store that is never persisted.
    pub fn in_memory() -> Self {
        Self {
            backend: Box::new(MemoryBackend),
            data: RwLock::new(Database::default()),
        }
    }

    /// Returns a copy of the whole document.
    pub fn snapshot(&self) -> StoreResult<Database> {
        self.read(|db| db.clone())
    }

    pub fn insert<T: Entity>(&self, data: T) -> StoreResult<Record<T>> {
        self.insert_with(|_| Ok::<_, StoreError>(data))
    }

    /// Inserts a record built by `build`, which sees the current document under the write lock.
    ///
    /// Used for inserts that depend on a check over existing records (uniqueness, ordering).
    pub fn insert_with<T, E>(&self, build: impl FnOnce(&Database) -> Result<T, E>) -> Result<Record<T>, E>
    where
        T: Entity,
        E: From<StoreError>,
    {
        let mut guard = self.data.write().map_err(|_| StoreError::Poisoned)?;
        let data = build(&guard)?;

        let now = Utc::now();
        let record = Record {
            id: RecordId::new(),
            data,
            created_at: now,
            updated_at: now,
        };

        let mut next = guard.clone();
        T::collection_mut(&mut next).push(record.clone());
        self.backend.save(&next)?;
        *guard = next;

        tracing::debug!(collection = T::COLLECTION, id = %record.id, "record inserted");
        Ok(record)
    }

    pub fn find_by_id<T: Entity>(&self, id: &RecordId) -> StoreResult<Option<Record<T>>> {
        self.read(|db| T::collection(db).iter().find(|r| r.id == *id).cloned())
    }

    pub fn find_one<T: Entity>(
        &self,
        predicate: impl Fn(&Record<T>) -> bool,
    ) -> StoreResult<Option<Record<T>>> {
        self.read(|db| T::collection(db).iter().find(|r| predicate(r)).cloned())
    }

    /// Returns every record matching `predicate`, in insertion order.
    pub fn find<T: Entity>(&self, predicate: impl Fn(&Record<T>) -> bool) -> StoreResult<Vec<Record<T>>> {
        self.read(|db| {
            T::collection(db)
                .iter()
                .filter(|r| predicate(r))
                .cloned()
                .collect()
        })
    }

    pub fn all<T: Entity>(&self) -> StoreResult<Vec<Record<T>>> {
        self.find(|_: &Record<T>| true)
    }

    pub fn count<T: Entity>(&self, predicate: impl Fn(&Record<T>) -> bool) -> StoreResult<usize> {
        self.read(|db| T::collection(db).iter().filter(|r| predicate(r)).count())
    }

    /// Applies `apply` to the record with `id` and bumps its `updatedAt`.
    ///
    /// Returns `Ok(None)` if no such record exists; nothing is written in that case.
    pub fn update_by_id<T: Entity>(
        &self,
        id: &RecordId,
        apply: impl FnOnce(&mut T),
    ) -> StoreResult<Option<Record<T>>> {
        self.try_update_by_id(id, |_, data: &mut T| {
            apply(data);
            Ok::<(), StoreError>(())
        })
    }

    /// Like [`update_by_id`](Self::update_by_id), but `apply` may reject the update.
    ///
    /// `apply` receives the current document (read-only) alongside the record being changed, so
    /// it can check invariants against other records under the same write lock. If it returns an
    /// error nothing is written.
    pub fn try_update_by_id<T, E>(
        &self,
        id: &RecordId,
        apply: impl FnOnce(&Database, &mut T) -> Result<(), E>,
    ) -> Result<Option<Record<T>>, E>
    where
        T: Entity,
        E: From<StoreError>,
    {
        let mut guard = self.data.write().map_err(|_| StoreError::Poisoned)?;
        let Some(index) = T::collection(&guard).iter().position(|r| r.id == *id) else {
            return Ok(None);
        };

        let mut next = guard.clone();
        let record = &mut T::collection_mut(&mut next)[index];
        apply(&guard, &mut record.data)?;
        record.updated_at = Utc::now();
        let updated = record.clone();

        self.backend.save(&next)?;
        *guard = next;

        tracing::debug!(collection = T::COLLECTION, id = %id, "record updated");
        Ok(Some(updated))
    }

    /// Removes the record with `id`. Returns `false` if it did not exist.
    pub fn remove_by_id<T: Entity>(&self, id: &RecordId) -> StoreResult<bool> {
        let mut guard = self.data.write().map_err(|_| StoreError::Poisoned)?;
        let Some(index) = T::collection(&guard).iter().position(|r| r.id == *id) else {
            return Ok(false);
        };

        let mut next = guard.clone();
        T::collection_mut(&mut next).remove(index);
        self.backend.save(&next)?;
        *guard = next;

        tracing::debug!(collection = T::COLLECTION, id = %id, "record removed");
        Ok(true)
    }

    fn read<R>(&self, f: impl FnOnce(&Database) -> R) -> StoreResult<R> {
        let guard = self.data.read().map_err(|_| StoreError::Poisoned)?;
        Ok(f(&guard))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AppointmentStatus, Role};
    use clinic_types::EmailAddress;
    use tempfile::TempDir;

    fn user(name: &str, email: &str) -> User {
        User {
            name: name.into(),
            email: EmailAddress::parse(email).unwrap(),
            password_hash: "hash".into(),
            role: Role::Patient,
        }
    }

    #[test]
    fn test_insert_assigns_id_and_timestamps() {
        let store = RecordStore::in_memory();
        let record = store.insert(user("Ann", "ann@example.com")).unwrap();

        assert_eq!(record.created_at, record.updated_at);
        let found = store.find_by_id::<User>(&record.id).unwrap();
        assert_eq!(found, Some(record));
    }

    #[test]
    fn test_find_and_count_filter_by_predicate() {
        let store = RecordStore::in_memory();
        store.insert(user("Ann", "ann@example.com")).unwrap();
        store.insert(user("Bob", "bob@example.com")).unwrap();
        store.insert(user("Bea", "bea@example.com")).unwrap();

        let b_names = store
            .find(|r: &Record<User>| r.data.name.starts_with('B'))
            .unwrap();
        assert_eq!(b_names.len(), 2);
        assert_eq!(b_names[0].data.name, "Bob", "insertion order is kept");
        assert_eq!(store.count(|_: &Record<User>| true).unwrap(), 3);

        let bob = store
            .find_one(|r: &Record<User>| r.data.email.as_str() == "bob@example.com")
            .unwrap();
        assert_eq!(bob.map(|r| r.data.name), Some("Bob".to_string()));
    }

    #[test]
    fn test_update_by_id_bumps_updated_at() {
        let store = RecordStore::in_memory();
        let record = store.insert(user("Ann", "ann@example.com")).unwrap();

        let updated = store
            .update_by_id(&record.id, |u: &mut User| u.name = "Anne".into())
            .unwrap()
            .expect("record should exist");

        assert_eq!(updated.data.name, "Anne");
        assert_eq!(updated.created_at, record.created_at);
        assert!(updated.updated_at >= record.updated_at);
    }

    #[test]
    fn test_update_and_remove_missing_record() {
        let store = RecordStore::in_memory();
        let missing = RecordId::new();

        assert!(store
            .update_by_id(&missing, |u: &mut User| u.name.clear())
            .unwrap()
            .is_none());
        assert!(!store.remove_by_id::<User>(&missing).unwrap());
    }

    #[test]
    fn test_try_update_rejection_leaves_record_untouched() {
        let store = RecordStore::in_memory();
        let record = store.insert(user("Ann", "ann@example.com")).unwrap();

        let result = store.try_update_by_id(&record.id, |_, u: &mut User| {
            u.name = "changed".into();
            Err(StoreError::Poisoned)
        });
        assert!(result.is_err());

        let current = store.find_by_id::<User>(&record.id).unwrap().unwrap();
        assert_eq!(current.data.name, "Ann");
    }

    #[test]
    fn test_remove_by_id_deletes_only_target() {
        let store = RecordStore::in_memory();
        let ann = store.insert(user("Ann", "ann@example.com")).unwrap();
        let bob = store.insert(user("Bob", "bob@example.com")).unwrap();

        assert!(store.remove_by_id::<User>(&ann.id).unwrap());
        assert!(store.find_by_id::<User>(&ann.id).unwrap().is_none());
        assert!(store.find_by_id::<User>(&bob.id).unwrap().is_some());
    }

    #[test]
    fn test_json_file_store_survives_reopen() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let path = temp_dir.path().join("nested").join("db.json");

        let store = RecordStore::open(JsonFileBackend::new(&path)).unwrap();
        let ann = store.insert(user("Ann", "ann@example.com")).unwrap();
        let appointment = store
            .insert(Appointment {
                patient_id: ann.id,
                doctor_id: RecordId::new(),
                appointment_date: Utc::now(),
                status: AppointmentStatus::Scheduled,
                notes: String::new(),
            })
            .unwrap();
        drop(store);

        let reopened = RecordStore::open(JsonFileBackend::new(&path)).unwrap();
        let users = reopened.all::<User>().unwrap();
        assert_eq!(users, vec![ann]);
        let appointments = reopened.all::<Appointment>().unwrap();
        assert_eq!(appointments, vec![appointment]);
    }
}
