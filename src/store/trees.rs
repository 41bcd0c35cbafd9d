pub const COURSES: &str = "courses";
pub const LESSONS: &str = "lessons";
pub const LESSONS_BY_COURSE: &str = "lessons_by_course";
pub const COMPONENTS: &str = "components";
pub const COMPONENTS_BY_LESSON: &str = "components_by_lesson";
pub const TESTS: &str = "tests";
pub const TEST_RESULTS: &str = "test_results";
pub const ATTEMPTS_BY_USER_COMPONENT: &str = "attempts_by_user_component";
pub const USER_LESSONS: &str = "user_lessons";
pub const USER_COURSES: &str = "user_courses";
pub const USER_WORDS: &str = "user_words";
pub const ATTEMPT_EXPIRY_QUEUE: &str = "attempt_expiry_queue";
pub const META: &str = "meta";
