use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::store::keys;
use crate::store::{Store, StoreError};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserLesson {
    pub user_id: String,
    pub lesson_id: String,
    pub status: LessonStatus,
    /// Best mark ever achieved on the lesson's test; never regresses.
    pub grade: u32,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LessonStatus {
    Incomplete,
    Completed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserCourse {
    pub user_id: String,
    pub course_id: String,
    pub enrolment_status: EnrolmentStatus,
    /// 0-100, recomputed from completed lesson counts.
    pub progress: u32,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EnrolmentStatus {
    Pending,
    Approved,
    Rejected,
    InProgress,
    Completed,
}

/// Existence of a row means the user has learned that word component.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserWord {
    pub user_id: String,
    pub component_id: String,
    pub created_at: DateTime<Utc>,
}

impl Store {
    pub fn get_user_lesson(
        &self,
        user_id: &str,
        lesson_id: &str,
    ) -> Result<Option<UserLesson>, StoreError> {
        let key = keys::user_lesson_key(user_id, lesson_id);
        match self.user_lessons.get(key.as_bytes())? {
            Some(raw) => Ok(Some(Self::deserialize(&raw)?)),
            None => Ok(None),
        }
    }

    pub fn put_user_course(&self, user_course: &UserCourse) -> Result<(), StoreError> {
        let key = keys::user_course_key(&user_course.user_id, &user_course.course_id);
        self.user_courses
            .insert(key.as_bytes(), Self::serialize(user_course)?)?;
        Ok(())
    }

    pub fn get_user_course(
        &self,
        user_id: &str,
        course_id: &str,
    ) -> Result<Option<UserCourse>, StoreError> {
        let key = keys::user_course_key(user_id, course_id);
        match self.user_courses.get(key.as_bytes())? {
            Some(raw) => Ok(Some(Self::deserialize(&raw)?)),
            None => Ok(None),
        }
    }

    pub fn has_user_word(&self, user_id: &str, component_id: &str) -> Result<bool, StoreError> {
        let key = keys::user_word_key(user_id, component_id);
        Ok(self.user_words.get(key.as_bytes())?.is_some())
    }

    pub fn get_user_word(
        &self,
        user_id: &str,
        component_id: &str,
    ) -> Result<Option<UserWord>, StoreError> {
        let key = keys::user_word_key(user_id, component_id);
        match self.user_words.get(key.as_bytes())? {
            Some(raw) => Ok(Some(Self::deserialize(&raw)?)),
            None => Ok(None),
        }
    }
}
