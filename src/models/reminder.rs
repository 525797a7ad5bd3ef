use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A dated note optionally tied to a course. `sent` flips to true exactly
/// once, after a successful mail dispatch, and never reverts.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Reminder {
    pub id: String,
    pub text: String,
    pub date: NaiveDate,
    #[serde(default)]
    pub desc: String,
    /// Empty string means "general/other", not tied to any course.
    #[serde(default)]
    pub course: String,
    #[serde(default)]
    pub sent: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewReminderRequest {
    pub text: String,
    pub date: NaiveDate,
    #[serde(default)]
    pub desc: String,
    #[serde(default)]
    pub course: String,
}

/// Edit payload: replaces every mutable field wholesale. `id` and `sent`
/// are owned by the repository and never appear here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateReminderRequest {
    pub text: String,
    pub date: NaiveDate,
    #[serde(default)]
    pub desc: String,
    #[serde(default)]
    pub course: String,
}
