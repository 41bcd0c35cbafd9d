pub mod courses;
pub mod expiry_queue;
pub mod lessons;
pub mod test_results;
pub mod user_progress;
