use async_trait::async_trait;
use dashmap::{mapref::entry::Entry, DashMap};
use uuid::Uuid;

use crate::error::StoreError;
use crate::models::auth::User;
use crate::models::record::{Record, RecordFields, RecordSchema};

use super::{RecordRepository, UserRepository};

/// Users keyed by email.
#[derive(Default)]
pub struct MemoryUserRepository {
    users: DashMap<String, User>,
}

#[async_trait]
impl UserRepository for MemoryUserRepository {
    async fn insert(&self, user: &User) -> Result<(), StoreError> {
        match self.users.entry(user.email.clone()) {
            Entry::Occupied(_) => Err(StoreError::Duplicate),
            Entry::Vacant(slot) => {
                slot.insert(user.clone());
                Ok(())
            }
        }
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        Ok(self.users.get(email).map(|user| user.clone()))
    }
}

/// Records of every kind keyed by id.
#[derive(Default)]
pub struct MemoryRecordRepository {
    records: DashMap<Uuid, Record>,
}

impl MemoryRecordRepository {
    fn owned_mut(
        &self,
        schema: &'static RecordSchema,
        user_id: Uuid,
        id: Uuid,
    ) -> Option<dashmap::mapref::one::RefMut<'_, Uuid, Record>> {
        self.records
            .get_mut(&id)
            .filter(|record| record.schema == schema && record.user_id == user_id)
    }
}

#[async_trait]
impl RecordRepository for MemoryRecordRepository {
    async fn list(&self, schema: &'static RecordSchema, user_id: Uuid) -> Result<Vec<Record>, StoreError> {
        let mut records: Vec<Record> = self
            .records
            .iter()
            .filter(|record| record.schema == schema && record.user_id == user_id)
            .map(|record| record.value().clone())
            .collect();
        records.sort_by(|a, b| {
            b.fields
                .date
                .cmp(&a.fields.date)
                .then_with(|| b.created_at.cmp(&a.created_at))
        });
        Ok(records)
    }

    async fn insert(&self, record: &Record) -> Result<(), StoreError> {
        match self.records.entry(record.id) {
            Entry::Occupied(_) => Err(StoreError::Duplicate),
            Entry::Vacant(slot) => {
                slot.insert(record.clone());
                Ok(())
            }
        }
    }

    async fn update(
        &self,
        schema: &'static RecordSchema,
        user_id: Uuid,
        id: Uuid,
        fields: &RecordFields,
    ) -> Result<u64, StoreError> {
        match self.owned_mut(schema, user_id, id) {
            Some(mut record) => {
                record.fields = fields.clone();
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn delete(&self, schema: &'static RecordSchema, user_id: Uuid, id: Uuid) -> Result<u64, StoreError> {
        let removed = self
            .records
            .remove_if(&id, |_, record| record.schema == schema && record.user_id == user_id);
        Ok(u64::from(removed.is_some()))
    }
}
