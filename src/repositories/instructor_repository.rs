use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::{
    bson::{doc, Document},
    options::IndexOptions,
    Collection, IndexModel,
};

use crate::{
    db::Database,
    errors::{AppError, AppResult},
    models::domain::Instructor,
};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait InstructorRepository: Send + Sync {
    async fn create(&self, instructor: Instructor) -> AppResult<Instructor>;
    async fn find_by_id(&self, id: &str) -> AppResult<Option<Instructor>>;
    async fn find_by_email(&self, email: &str) -> AppResult<Option<Instructor>>;
    async fn update(&self, instructor: Instructor) -> AppResult<Instructor>;
    async fn list_ids(&self) -> AppResult<Vec<String>>;
    async fn ensure_indexes(&self) -> AppResult<()>;
}

pub struct MongoInstructorRepository {
    collection: Collection<Instructor>,
}

impl MongoInstructorRepository {
    pub fn new(db: &Database) -> Self {
        let collection = db.get_collection("instructors");
        Self { collection }
    }
}

#[async_trait]
impl InstructorRepository for MongoInstructorRepository {
    async fn create(&self, instructor: Instructor) -> AppResult<Instructor> {
        self.collection.insert_one(&instructor).await?;
        Ok(instructor)
    }

    async fn find_by_id(&self, id: &str) -> AppResult<Option<Instructor>> {
        let instructor = self.collection.find_one(doc! { "id": id }).await?;
        Ok(instructor)
    }

    async fn find_by_email(&self, email: &str) -> AppResult<Option<Instructor>> {
        let instructor = self.collection.find_one(doc! { "email": email }).await?;
        Ok(instructor)
    }

    async fn update(&self, instructor: Instructor) -> AppResult<Instructor> {
        let result = self
            .collection
            .replace_one(doc! { "id": instructor.id.as_str() }, &instructor)
            .await?;

        if result.matched_count == 0 {
            return Err(AppError::NotFound(format!(
                "Instructor with id '{}' not found",
                instructor.id
            )));
        }

        Ok(instructor)
    }

    async fn list_ids(&self) -> AppResult<Vec<String>> {
        let instructors: Vec<Instructor> =
            self.collection.find(doc! {}).await?.try_collect().await?;
        Ok(instructors.into_iter().map(|i| i.id).collect())
    }

    async fn ensure_indexes(&self) -> AppResult<()> {
        log::info!("Creating indexes for instructors collection");

        for (field, name) in [("id", "id_unique"), ("email", "email_unique")] {
            let mut keys = Document::new();
            keys.insert(field, 1);
            let model = IndexModel::builder()
                .keys(keys)
                .options(
                    IndexOptions::builder()
                        .unique(true)
                        .name(name.to_string())
                        .build(),
                )
                .build();
            self.collection.create_index(model).await?;
        }

        log::info!("Successfully created indexes for instructors collection");
        Ok(())
    }
}
