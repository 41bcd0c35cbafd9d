pub fn course_key(course_id: &str) -> String {
    course_id.to_string()
}

pub fn lesson_key(lesson_id: &str) -> String {
    lesson_id.to_string()
}

/// Orders lessons of a course by their position within it.
pub fn lesson_course_index_key(course_id: &str, position: u32, lesson_id: &str) -> String {
    format!("{}:{:06}:{}", course_id, position, lesson_id)
}

pub fn lesson_course_index_prefix(course_id: &str) -> String {
    format!("{}:", course_id)
}

pub fn component_key(component_id: &str) -> String {
    component_id.to_string()
}

/// Orders components of a lesson by index_in_lesson.
pub fn component_lesson_index_key(lesson_id: &str, index_in_lesson: u32, component_id: &str) -> String {
    format!("{}:{:06}:{}", lesson_id, index_in_lesson, component_id)
}

pub fn component_lesson_index_prefix(lesson_id: &str) -> String {
    format!("{}:", lesson_id)
}

pub fn test_key(test_id: &str) -> String {
    test_id.to_string()
}

pub fn test_result_key(test_result_id: &str) -> String {
    test_result_id.to_string()
}

/// Index entry per attempt; zero-padding keeps attempts in order and a
/// prefix scan yields the attempt count for one (user, component) pair.
pub fn attempt_index_key(user_id: &str, component_id: &str, attempt_number: u32) -> String {
    format!("{}:{}:{:04}", user_id, component_id, attempt_number)
}

pub fn attempt_index_prefix(user_id: &str, component_id: &str) -> String {
    format!("{}:{}:", user_id, component_id)
}

pub fn user_lesson_key(user_id: &str, lesson_id: &str) -> String {
    format!("{}:{}", user_id, lesson_id)
}

pub fn user_course_key(user_id: &str, course_id: &str) -> String {
    format!("{}:{}", user_id, course_id)
}

pub fn user_word_key(user_id: &str, component_id: &str) -> String {
    format!("{}:{}", user_id, component_id)
}

/// Expiry queue keys sort by fire-at time so a range scan up to "now"
/// yields exactly the due entries.
pub fn expiry_queue_key(fire_at_ms: i64, test_result_id: &str) -> String {
    let ts = fire_at_ms.max(0) as u64;
    format!("{:020}:{}", ts, test_result_id)
}

pub fn expiry_queue_upper_bound(now_ms: i64) -> String {
    let ts = now_ms.max(0) as u64;
    // '~' sorts after ':' and any uuid character
    format!("{:020}~", ts)
}

pub fn parse_expiry_queue_key(key: &[u8]) -> Option<(i64, String)> {
    let text = std::str::from_utf8(key).ok()?;
    let (ts_str, result_id) = text.split_once(':')?;
    let fire_at_ms = ts_str.parse::<u64>().ok()?;
    Some((i64::try_from(fire_at_ms).ok()?, result_id.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attempt_index_orders_by_attempt_number() {
        let first = attempt_index_key("u1", "c1", 1);
        let tenth = attempt_index_key("u1", "c1", 10);
        assert!(first < tenth);
        assert!(first.starts_with(&attempt_index_prefix("u1", "c1")));
    }

    #[test]
    fn expiry_queue_orders_by_fire_at() {
        let early = expiry_queue_key(1_000, "r1");
        let late = expiry_queue_key(2_000, "r2");
        assert!(early < late);
        assert!(early < expiry_queue_upper_bound(1_000));
        assert!(late > expiry_queue_upper_bound(1_000));
    }

    #[test]
    fn expiry_queue_key_roundtrips() {
        let key = expiry_queue_key(123_456, "abc-def");
        let (fire_at, id) = parse_expiry_queue_key(key.as_bytes()).unwrap();
        assert_eq!(fire_at, 123_456);
        assert_eq!(id, "abc-def");
    }

    #[test]
    fn component_index_orders_by_position() {
        let a = component_lesson_index_key("l1", 0, "c-a");
        let b = component_lesson_index_key("l1", 12, "c-b");
        assert!(a < b);
    }
}
