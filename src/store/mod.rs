pub mod keys;
pub mod migrate;
pub mod operations;
pub mod trees;

use serde::de::DeserializeOwned;
use serde::Serialize;
use sled::Db;
use thiserror::Error;

#[derive(Debug)]
pub struct Store {
    db: Db,
    pub courses: sled::Tree,
    pub lessons: sled::Tree,
    pub lessons_by_course: sled::Tree,
    pub components: sled::Tree,
    pub components_by_lesson: sled::Tree,
    pub tests: sled::Tree,
    pub test_results: sled::Tree,
    pub attempts_by_user_component: sled::Tree,
    pub user_lessons: sled::Tree,
    pub user_courses: sled::Tree,
    pub user_words: sled::Tree,
    pub attempt_expiry_queue: sled::Tree,
    pub meta: sled::Tree,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("not found: entity={entity}, key={key}")]
    NotFound { entity: String, key: String },
    #[error("conflict: entity={entity}, key={key}")]
    Conflict { entity: String, key: String },
    #[error("validation error: {0}")]
    Validation(String),
    #[error("migration error at version {version}: {message}")]
    Migration { version: u32, message: String },
}

impl Store {
    pub fn open(sled_path: &str) -> Result<Self, StoreError> {
        let db = sled::open(sled_path)?;
        let courses = db.open_tree(trees::COURSES)?;
        let lessons = db.open_tree(trees::LESSONS)?;
        let lessons_by_course = db.open_tree(trees::LESSONS_BY_COURSE)?;
        let components = db.open_tree(trees::COMPONENTS)?;
        let components_by_lesson = db.open_tree(trees::COMPONENTS_BY_LESSON)?;
        let tests = db.open_tree(trees::TESTS)?;
        let test_results = db.open_tree(trees::TEST_RESULTS)?;
        let attempts_by_user_component = db.open_tree(trees::ATTEMPTS_BY_USER_COMPONENT)?;
        let user_lessons = db.open_tree(trees::USER_LESSONS)?;
        let user_courses = db.open_tree(trees::USER_COURSES)?;
        let user_words = db.open_tree(trees::USER_WORDS)?;
        let attempt_expiry_queue = db.open_tree(trees::ATTEMPT_EXPIRY_QUEUE)?;
        let meta = db.open_tree(trees::META)?;

        Ok(Self {
            db,
            courses,
            lessons,
            lessons_by_course,
            components,
            components_by_lesson,
            tests,
            test_results,
            attempts_by_user_component,
            user_lessons,
            user_courses,
            user_words,
            attempt_expiry_queue,
            meta,
        })
    }

    pub fn run_migrations(&self) -> Result<(), StoreError> {
        migrate::run(self)
    }

    pub fn flush(&self) -> Result<(), StoreError> {
        self.db.flush()?;
        Ok(())
    }

    pub fn raw_db(&self) -> &Db {
        &self.db
    }

    pub(crate) fn serialize<T: Serialize>(value: &T) -> Result<Vec<u8>, StoreError> {
        Ok(serde_json::to_vec(value)?)
    }

    pub(crate) fn deserialize<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, StoreError> {
        Ok(serde_json::from_slice(bytes)?)
    }
}
