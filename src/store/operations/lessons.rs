use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sled::Transactional;

use crate::store::keys;
use crate::store::{Store, StoreError};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lesson {
    pub id: String,
    pub course_id: String,
    pub title: String,
    pub position: u32,
    pub created_at: DateTime<Utc>,
}

/// One typed slot in a lesson's ordered content. Exactly one payload per
/// variant instead of nullable references for every type at once.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Component {
    pub id: String,
    pub lesson_id: String,
    pub index_in_lesson: u32,
    #[serde(flatten)]
    pub body: ComponentBody,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "componentType", rename_all = "lowercase", rename_all_fields = "camelCase")]
pub enum ComponentBody {
    Word { word_id: String },
    Test { test_id: String },
    Paragraph { content: String },
}

impl Store {
    pub fn put_lesson(&self, lesson: &Lesson) -> Result<(), StoreError> {
        let key = keys::lesson_key(&lesson.id);
        let index_key =
            keys::lesson_course_index_key(&lesson.course_id, lesson.position, &lesson.id);
        let lesson_bytes = Self::serialize(lesson)?;

        let key_bytes = key.as_bytes().to_vec();
        let index_key_bytes = index_key.as_bytes().to_vec();
        (&self.lessons, &self.lessons_by_course)
            .transaction(move |(tx_lessons, tx_index)| {
                tx_lessons.insert(key_bytes.as_slice(), lesson_bytes.as_slice())?;
                tx_index.insert(index_key_bytes.as_slice(), &[] as &[u8])?;
                Ok(())
            })
            .map_err(|e: sled::transaction::TransactionError<()>| match e {
                sled::transaction::TransactionError::Abort(()) => {
                    StoreError::Sled(sled::Error::Unsupported("transaction aborted".into()))
                }
                sled::transaction::TransactionError::Storage(se) => StoreError::Sled(se),
            })?;
        Ok(())
    }

    pub fn get_lesson(&self, lesson_id: &str) -> Result<Option<Lesson>, StoreError> {
        let key = keys::lesson_key(lesson_id);
        match self.lessons.get(key.as_bytes())? {
            Some(raw) => Ok(Some(Self::deserialize(&raw)?)),
            None => Ok(None),
        }
    }

    /// Lesson ids of a course, ordered by position.
    pub fn list_lesson_ids_for_course(&self, course_id: &str) -> Result<Vec<String>, StoreError> {
        let prefix = keys::lesson_course_index_prefix(course_id);
        let mut lesson_ids = Vec::new();
        for item in self.lessons_by_course.scan_prefix(prefix.as_bytes()) {
            let (k, _) = item?;
            let key_str = String::from_utf8(k.to_vec()).unwrap_or_default();
            if let Some(lesson_id) = key_str.rsplit(':').next() {
                lesson_ids.push(lesson_id.to_string());
            }
        }
        Ok(lesson_ids)
    }

    pub fn put_component(&self, component: &Component) -> Result<(), StoreError> {
        let key = keys::component_key(&component.id);
        let index_key = keys::component_lesson_index_key(
            &component.lesson_id,
            component.index_in_lesson,
            &component.id,
        );
        let component_bytes = Self::serialize(component)?;

        let key_bytes = key.as_bytes().to_vec();
        let index_key_bytes = index_key.as_bytes().to_vec();
        (&self.components, &self.components_by_lesson)
            .transaction(move |(tx_components, tx_index)| {
                tx_components.insert(key_bytes.as_slice(), component_bytes.as_slice())?;
                tx_index.insert(index_key_bytes.as_slice(), &[] as &[u8])?;
                Ok(())
            })
            .map_err(|e: sled::transaction::TransactionError<()>| match e {
                sled::transaction::TransactionError::Abort(()) => {
                    StoreError::Sled(sled::Error::Unsupported("transaction aborted".into()))
                }
                sled::transaction::TransactionError::Storage(se) => StoreError::Sled(se),
            })?;
        Ok(())
    }

    pub fn get_component(&self, component_id: &str) -> Result<Option<Component>, StoreError> {
        let key = keys::component_key(component_id);
        match self.components.get(key.as_bytes())? {
            Some(raw) => Ok(Some(Self::deserialize(&raw)?)),
            None => Ok(None),
        }
    }

    /// Components of a lesson ordered by index_in_lesson.
    pub fn list_components_for_lesson(
        &self,
        lesson_id: &str,
    ) -> Result<Vec<Component>, StoreError> {
        let prefix = keys::component_lesson_index_prefix(lesson_id);
        let mut components = Vec::new();
        for item in self.components_by_lesson.scan_prefix(prefix.as_bytes()) {
            let (k, _) = item?;
            let key_str = String::from_utf8(k.to_vec()).unwrap_or_default();
            if let Some(component_id) = key_str.rsplit(':').next() {
                if let Some(component) = self.get_component(component_id)? {
                    components.push(component);
                }
            }
        }
        Ok(components)
    }

    /// The lesson's test-taking surface: its first test-type component.
    pub fn find_test_component(
        &self,
        lesson_id: &str,
    ) -> Result<Option<Component>, StoreError> {
        let components = self.list_components_for_lesson(lesson_id)?;
        Ok(components
            .into_iter()
            .find(|c| matches!(c.body, ComponentBody::Test { .. })))
    }

    /// Word-type components of a lesson, ordered by index.
    pub fn list_word_components_for_lesson(
        &self,
        lesson_id: &str,
    ) -> Result<Vec<Component>, StoreError> {
        let components = self.list_components_for_lesson(lesson_id)?;
        Ok(components
            .into_iter()
            .filter(|c| matches!(c.body, ComponentBody::Word { .. }))
            .collect())
    }
}
