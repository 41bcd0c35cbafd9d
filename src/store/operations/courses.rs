use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::store::keys;
use crate::store::{Store, StoreError};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    pub id: String,
    pub name: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

impl Store {
    pub fn put_course(&self, course: &Course) -> Result<(), StoreError> {
        let key = keys::course_key(&course.id);
        self.courses
            .insert(key.as_bytes(), Self::serialize(course)?)?;
        Ok(())
    }

    pub fn get_course(&self, course_id: &str) -> Result<Option<Course>, StoreError> {
        let key = keys::course_key(course_id);
        match self.courses.get(key.as_bytes())? {
            Some(raw) => Ok(Some(Self::deserialize(&raw)?)),
            None => Ok(None),
        }
    }
}
