//! Storage seams for users and tracker records.
//!
//! `postgres` holds the production implementations on top of a [`Database`]
//! pool; `memory` holds map-backed ones used by the test suite.
//!
//! [`Database`]: crate::database::Database

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::StoreError;
use crate::models::auth::User;
use crate::models::record::{Record, RecordFields, RecordSchema};

pub mod memory;
pub mod postgres;

#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Fails with `StoreError::Duplicate` when the email is taken.
    async fn insert(&self, user: &User) -> Result<(), StoreError>;
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;
}

#[async_trait]
pub trait RecordRepository: Send + Sync {
    /// Records owned by `user_id`, newest `date` first.
    async fn list(&self, schema: &'static RecordSchema, user_id: Uuid) -> Result<Vec<Record>, StoreError>;
    async fn insert(&self, record: &Record) -> Result<(), StoreError>;
    /// Returns the number of rows changed (0 or 1).
    async fn update(
        &self,
        schema: &'static RecordSchema,
        user_id: Uuid,
        id: Uuid,
        fields: &RecordFields,
    ) -> Result<u64, StoreError>;
    /// Returns the number of rows removed (0 or 1).
    async fn delete(&self, schema: &'static RecordSchema, user_id: Uuid, id: Uuid) -> Result<u64, StoreError>;
}
