// src/plant/time.rs
use chrono::Utc;

/// Milliseconds since the Unix epoch, with sub-millisecond precision.
pub fn now_millis() -> f64 {
    Utc::now().timestamp_micros() as f64 / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_now_is_recent_and_advances() {
        let first = now_millis();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let second = now_millis();

        // 2020-01-01T00:00:00Z
        assert!(first > 1_577_836_800_000.0);
        assert!(second > first);
    }
}
