//! Output formatting helpers.

use time::UtcDateTime;
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;

const TIMESTAMP: &[BorrowedFormatItem<'static>] = format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");

/// `YYYY-MM-DD HH:MM:SS` in UTC.
pub fn timestamp(at: UtcDateTime) -> String {
    // Only fails for components the format does not use.
    at.format(TIMESTAMP).unwrap_or_else(|_| at.to_string())
}

/// Sizes below 1 KiB in bytes, above with one decimal in the largest unit.
pub fn size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["KiB", "MiB", "GiB", "TiB"];
    if bytes < 1024 {
        return format!("{bytes} B");
    }
    let mut value = bytes as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.1} {}", UNITS[unit])
}

/// First 12 hex digits of a blob hash.
pub fn short_hash(hash: &str) -> &str {
    hash.get(..12).unwrap_or(hash)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_timestamp() {
        let at = UtcDateTime::from_unix_timestamp(1_700_000_000).unwrap();
        assert_eq!(timestamp(at), "2023-11-14 22:13:20");
        let at = UtcDateTime::from_unix_timestamp(0).unwrap();
        assert_eq!(timestamp(at), "1970-01-01 00:00:00");
    }

    #[rstest]
    #[case(0, "0 B")]
    #[case(1023, "1023 B")]
    #[case(1024, "1.0 KiB")]
    #[case(1536, "1.5 KiB")]
    #[case(5 * 1024 * 1024, "5.0 MiB")]
    fn test_size(#[case] bytes: u64, #[case] expected: &str) {
        assert_eq!(size(bytes), expected);
    }

    #[test]
    fn test_short_hash() {
        assert_eq!(short_hash("2cf24dba5fb0a30e26e83b2ac5b9e29e"), "2cf24dba5fb0");
        assert_eq!(short_hash("abc"), "abc");
    }
}
