pub mod grading;
pub mod lifecycle;
pub mod progress;
