use async_trait::async_trait;
use mongodb::{
    bson::{doc, Document},
    options::{FindOneAndUpdateOptions, ReturnDocument, UpdateOptions},
    Collection,
};

use crate::{
    db::Database,
    errors::{AppError, AppResult},
    models::domain::SequenceKind,
};

/// Allocates values in the dense STU/INS/EX- namespaces without races.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SequenceRepository: Send + Sync {
    /// Atomically increments and returns the next value, starting at 1.
    async fn next_value(&self, kind: SequenceKind) -> AppResult<u32>;
    /// Moves the counter up to `floor` if it is currently lower.
    async fn raise_floor(&self, kind: SequenceKind, floor: u32) -> AppResult<()>;
}

pub struct MongoSequenceRepository {
    collection: Collection<Document>,
}

impl MongoSequenceRepository {
    pub fn new(db: &Database) -> Self {
        let collection = db.get_collection("sequences");
        Self { collection }
    }
}

#[async_trait]
impl SequenceRepository for MongoSequenceRepository {
    async fn next_value(&self, kind: SequenceKind) -> AppResult<u32> {
        let options = FindOneAndUpdateOptions::builder()
            .upsert(true)
            .return_document(ReturnDocument::After)
            .build();

        let counter = self
            .collection
            .find_one_and_update(
                doc! { "_id": kind.key() },
                doc! { "$inc": { "value": 1_i64 } },
            )
            .with_options(options)
            .await?
            .ok_or_else(|| {
                AppError::DatabaseError(format!("Sequence '{}' was not upserted", kind))
            })?;

        let value = counter
            .get_i64("value")
            .map_err(|e| AppError::DatabaseError(format!("Corrupt sequence '{}': {}", kind, e)))?;

        u32::try_from(value)
            .map_err(|_| AppError::InternalError(format!("Sequence '{}' overflowed", kind)))
    }

    async fn raise_floor(&self, kind: SequenceKind, floor: u32) -> AppResult<()> {
        let options = UpdateOptions::builder().upsert(true).build();

        self.collection
            .update_one(
                doc! { "_id": kind.key() },
                doc! { "$max": { "value": i64::from(floor) } },
            )
            .with_options(options)
            .await?;

        log::info!("Sequence '{}' floor raised to {}", kind, floor);
        Ok(())
    }
}
