use serde::{Deserialize, Serialize};

/// Schedule view served to the page: the stored day-1 order plus the order
/// effective today under the day-parity rule.
#[derive(Debug, Clone, Serialize)]
pub struct CourseSchedule {
    pub current_day: u8,
    pub courses: Vec<String>,
    pub ordered: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetCoursesRequest {
    pub courses: Vec<String>,
}
