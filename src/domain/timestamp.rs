use time::OffsetDateTime;

/// Milliseconds since the Unix epoch, the wire and cache representation of instants.
#[must_use]
pub fn unix_millis(at: OffsetDateTime) -> i64 {
    i64::try_from(at.unix_timestamp_nanos() / 1_000_000).unwrap_or(i64::MAX)
}

#[must_use]
pub fn from_unix_millis(millis: i64) -> Option<OffsetDateTime> {
    OffsetDateTime::from_unix_timestamp_nanos(i128::from(millis) * 1_000_000).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::Duration;

    #[test]
    fn test_millis_truncate_sub_millisecond_precision() {
        let at = OffsetDateTime::UNIX_EPOCH + Duration::nanoseconds(1_234_567_891);

        assert_eq!(unix_millis(at), 1234);
        assert_eq!(from_unix_millis(1234), Some(OffsetDateTime::UNIX_EPOCH + Duration::milliseconds(1234)));
    }

    #[test]
    fn test_out_of_range_millis() {
        assert_eq!(from_unix_millis(i64::MAX), None);
    }
}
