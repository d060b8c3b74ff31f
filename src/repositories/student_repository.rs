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
    models::domain::Student,
};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StudentRepository: Send + Sync {
    async fn create(&self, student: Student) -> AppResult<Student>;
    async fn find_by_id(&self, id: &str) -> AppResult<Option<Student>>;
    async fn find_by_email(&self, email: &str) -> AppResult<Option<Student>>;
    async fn find_by_matric_number(&self, matric_number: &str) -> AppResult<Option<Student>>;
    async fn update(&self, student: Student) -> AppResult<Student>;
    async fn list_ids(&self) -> AppResult<Vec<String>>;
    async fn ensure_indexes(&self) -> AppResult<()>;
}

pub struct MongoStudentRepository {
    collection: Collection<Student>,
}

impl MongoStudentRepository {
    pub fn new(db: &Database) -> Self {
        let collection = db.get_collection("students");
        Self { collection }
    }
}

#[async_trait]
impl StudentRepository for MongoStudentRepository {
    async fn create(&self, student: Student) -> AppResult<Student> {
        self.collection.insert_one(&student).await?;
        Ok(student)
    }

    async fn find_by_id(&self, id: &str) -> AppResult<Option<Student>> {
        let student = self.collection.find_one(doc! { "id": id }).await?;
        Ok(student)
    }

    async fn find_by_email(&self, email: &str) -> AppResult<Option<Student>> {
        let student = self.collection.find_one(doc! { "email": email }).await?;
        Ok(student)
    }

    async fn find_by_matric_number(&self, matric_number: &str) -> AppResult<Option<Student>> {
        let student = self
            .collection
            .find_one(doc! { "matric_number": matric_number })
            .await?;
        Ok(student)
    }

    async fn update(&self, student: Student) -> AppResult<Student> {
        let result = self
            .collection
            .replace_one(doc! { "id": student.id.as_str() }, &student)
            .await?;

        if result.matched_count == 0 {
            return Err(AppError::NotFound(format!(
                "Student with id '{}' not found",
                student.id
            )));
        }

        Ok(student)
    }

    async fn list_ids(&self) -> AppResult<Vec<String>> {
        let students: Vec<Student> = self.collection.find(doc! {}).await?.try_collect().await?;
        Ok(students.into_iter().map(|s| s.id).collect())
    }

    async fn ensure_indexes(&self) -> AppResult<()> {
        log::info!("Creating indexes for students collection");

        for (field, name) in [
            ("id", "id_unique"),
            ("email", "email_unique"),
            ("matric_number", "matric_number_unique"),
        ] {
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

        log::info!("Successfully created indexes for students collection");
        Ok(())
    }
}
