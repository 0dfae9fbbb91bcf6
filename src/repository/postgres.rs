use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgRow, Row};
use uuid::Uuid;

use crate::database::Database;
use crate::error::StoreError;
use crate::models::auth::User;
use crate::models::record::{Record, RecordFields, RecordSchema};

use super::{RecordRepository, UserRepository};

#[derive(Clone)]
pub struct PgUserRepository {
    db: Database,
}

impl PgUserRepository {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn insert(&self, user: &User) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO users (id, email, password_hash, created_at) VALUES ($1, $2, $3, $4)")
            .bind(user.id)
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(user.created_at)
            .execute(&self.db)
            .await
            .map_err(StoreError::from_sqlx)?;
        Ok(())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, email, password_hash, created_at FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }
}

#[derive(Clone)]
pub struct PgRecordRepository {
    db: Database,
}

impl PgRecordRepository {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

fn record_from_row(schema: &'static RecordSchema, row: &PgRow) -> Result<Record, sqlx::Error> {
    let metrics = schema
        .numeric
        .iter()
        .map(|column| row.try_get::<Option<f64>, _>(*column))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Record {
        schema,
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        fields: RecordFields {
            date: row.try_get("date")?,
            label: row.try_get(schema.label)?,
            metrics,
            notes: row.try_get("notes")?,
        },
        created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
    })
}

#[async_trait]
impl RecordRepository for PgRecordRepository {
    async fn list(&self, schema: &'static RecordSchema, user_id: Uuid) -> Result<Vec<Record>, StoreError> {
        let sql = schema.select_sql();
        let rows = sqlx::query(&sql).bind(user_id).fetch_all(&self.db).await?;
        let records = rows
            .iter()
            .map(|row| record_from_row(schema, row))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }

    async fn insert(&self, record: &Record) -> Result<(), StoreError> {
        let sql = record.schema.insert_sql();
        let mut query = sqlx::query(&sql)
            .bind(record.id)
            .bind(record.user_id)
            .bind(record.created_at)
            .bind(&record.fields.date)
            .bind(&record.fields.label);
        for value in &record.fields.metrics {
            query = query.bind(*value);
        }
        query
            .bind(&record.fields.notes)
            .execute(&self.db)
            .await
            .map_err(StoreError::from_sqlx)?;
        Ok(())
    }

    async fn update(
        &self,
        schema: &'static RecordSchema,
        user_id: Uuid,
        id: Uuid,
        fields: &RecordFields,
    ) -> Result<u64, StoreError> {
        let sql = schema.update_sql();
        let mut query = sqlx::query(&sql).bind(&fields.date).bind(&fields.label);
        for value in &fields.metrics {
            query = query.bind(*value);
        }
        let result = query
            .bind(&fields.notes)
            .bind(id)
            .bind(user_id)
            .execute(&self.db)
            .await?;
        Ok(result.rows_affected())
    }

    async fn delete(&self, schema: &'static RecordSchema, user_id: Uuid, id: Uuid) -> Result<u64, StoreError> {
        let sql = schema.delete_sql();
        let result = sqlx::query(&sql)
            .bind(id)
            .bind(user_id)
            .execute(&self.db)
            .await?;
        Ok(result.rows_affected())
    }
}
