use std::time::Duration;

use chrono::{DateTime, Utc};

/// 生成数据使用的时间戳格式，精确到微秒
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f +00:00";

/// 格式化为 `YYYY-MM-DD HH:MM:SS.ffffff +00:00`
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

/// 耗时换算为微秒，超出 `u64` 时取最大值
pub fn duration_micros(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn formats_with_microseconds() {
        let at = Utc.with_ymd_and_hms(2024, 4, 10, 22, 25, 51).unwrap()
            + chrono::Duration::microseconds(42);
        assert_eq!(format_timestamp(at), "2024-04-10 22:25:51.000042 +00:00");
    }

    #[test]
    fn micros_saturate_instead_of_wrapping() {
        assert_eq!(duration_micros(Duration::from_millis(3)), 3_000);
        assert_eq!(duration_micros(Duration::MAX), u64::MAX);
    }
}
