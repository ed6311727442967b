// Models module - Database entity representations

pub mod attendance_record;
pub mod class_session;
pub mod user;

pub use attendance_record::AttendanceRecord;
pub use class_session::ClassSession;
pub use user::{Role, User};
