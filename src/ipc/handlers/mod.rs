pub mod core;
pub mod enrollments;
pub mod exam_types;
pub mod grades;
pub mod reports;
pub mod semesters;
pub mod setup;
pub mod students;
pub mod subjects;
