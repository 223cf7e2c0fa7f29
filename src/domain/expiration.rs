use time::{Duration, OffsetDateTime};

/// Lifetime a client asks for when sharing a file.
///
/// Selectors are advisory UI state, so anything unrecognized (or missing)
/// falls back to the default of one day instead of failing validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExpirationSelector {
    OneHour,
    FiveHours,
    #[default]
    OneDay,
    OneWeek,
}

impl ExpirationSelector {
    #[must_use]
    pub fn parse(selector: Option<&str>) -> Self {
        let Some(raw) = selector else {
            return Self::default();
        };

        match raw.trim().to_ascii_lowercase().as_str() {
            "1hr" | "1h" | "1hour" => Self::OneHour,
            "5hr" | "5h" | "5hours" => Self::FiveHours,
            "1d" | "1day" | "24h" => Self::OneDay,
            "1w" | "1week" | "7d" => Self::OneWeek,
            other => {
                tracing::debug!(selector = %other, "Unrecognized expiration selector, using default");
                Self::default()
            }
        }
    }

    #[must_use]
    pub const fn duration(self) -> Duration {
        match self {
            Self::OneHour => Duration::hours(1),
            Self::FiveHours => Duration::hours(5),
            Self::OneDay => Duration::days(1),
            Self::OneWeek => Duration::weeks(1),
        }
    }

    #[must_use]
    pub fn expires_at(self, now: OffsetDateTime) -> OffsetDateTime {
        now + self.duration()
    }
}
