pub mod attendance_record;
pub mod attendance_session;
pub mod class;
pub mod enrollment;
pub mod security_event;

pub use attendance_record::Entity as AttendanceRecord;
pub use attendance_session::Entity as AttendanceSession;
pub use class::Entity as Class;
pub use enrollment::Entity as Enrollment;
pub use security_event::Entity as SecurityEvent;
