pub mod course;
pub mod note;
pub mod reminder;

pub use course::{CourseSchedule, SetCoursesRequest};
pub use note::{NewNoteRequest, Note, UpdateNoteRequest};
pub use reminder::{NewReminderRequest, Reminder, UpdateReminderRequest};
