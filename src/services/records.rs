use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::record::{Record, RecordFields, RecordSchema};
use crate::repository::RecordRepository;

/// CRUD over one record kind, always scoped to the owning user.
#[derive(Clone)]
pub struct RecordService {
    schema: &'static RecordSchema,
    repo: Arc<dyn RecordRepository>,
}

impl RecordService {
    pub fn new(schema: &'static RecordSchema, repo: Arc<dyn RecordRepository>) -> Self {
        Self { schema, repo }
    }

    #[instrument(skip(self), fields(kind = self.schema.kind))]
    pub async fn list(&self, user_id: Uuid) -> Result<Vec<Record>, AppError> {
        Ok(self.repo.list(self.schema, user_id).await?)
    }

    #[instrument(skip(self, body), fields(kind = self.schema.kind))]
    pub async fn create(&self, user_id: Uuid, body: &Value) -> Result<Uuid, AppError> {
        let fields = RecordFields::parse(self.schema, body)?;
        let record = Record::new(self.schema, user_id, fields);
        self.repo.insert(&record).await?;
        debug!(id = %record.id, "record created");
        Ok(record.id)
    }

    /// Overwrites every mutable field. Ids that are malformed, unknown or
    /// owned by someone else are all reported as not found.
    #[instrument(skip(self, body), fields(kind = self.schema.kind))]
    pub async fn update(&self, user_id: Uuid, id: &str, body: &Value) -> Result<(), AppError> {
        let fields = RecordFields::parse(self.schema, body)?;
        let id = Uuid::parse_str(id).map_err(|_| AppError::NotFound)?;
        match self.repo.update(self.schema, user_id, id, &fields).await? {
            0 => Err(AppError::NotFound),
            _ => Ok(()),
        }
    }

    /// Succeeds whether or not a matching record existed.
    #[instrument(skip(self), fields(kind = self.schema.kind))]
    pub async fn delete(&self, user_id: Uuid, id: &str) -> Result<(), AppError> {
        let Ok(id) = Uuid::parse_str(id) else {
            return Ok(());
        };
        let removed = self.repo.delete(self.schema, user_id, id).await?;
        debug!(removed, "record delete");
        Ok(())
    }
}
