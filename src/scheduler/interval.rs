use std::time::Duration;

use crate::app::Result;
use crate::config::ConfigError;
use crate::store::Store;

/// Settings key holding the operator-chosen poll interval in seconds.
pub const INTERVAL_KEY: &str = "poll_interval_secs";

pub const MIN_INTERVAL: Duration = Duration::from_secs(1);

/// Parse an interval like "45s", "5m", "1h" or "1d". A bare number is minutes.
pub fn parse_interval(s: &str) -> std::result::Result<Duration, ConfigError> {
    let s = s.trim().to_lowercase();

    let (digits, unit) = if let Some(days) = s.strip_suffix('d') {
        (days, 86400)
    } else if let Some(hours) = s.strip_suffix('h') {
        (hours, 3600)
    } else if let Some(minutes) = s.strip_suffix('m') {
        (minutes, 60)
    } else if let Some(secs) = s.strip_suffix('s') {
        (secs, 1)
    } else {
        (s.as_str(), 60)
    };

    let value: u64 = digits.trim().parse().map_err(|_| {
        ConfigError::Invalid(format!(
            "invalid interval {:?}, use a number of minutes or a value like '45s', '5m', '1h'",
            s
        ))
    })?;

    let secs = value
        .checked_mul(unit)
        .ok_or_else(|| ConfigError::Invalid(format!("interval {:?} is too large", s)))?;

    validate_interval(Duration::from_secs(secs))
}

pub fn validate_interval(interval: Duration) -> std::result::Result<Duration, ConfigError> {
    if interval < MIN_INTERVAL {
        return Err(ConfigError::Invalid(format!(
            "interval must be at least {}",
            format_interval(MIN_INTERVAL)
        )));
    }
    Ok(interval)
}

/// Format interval for display
pub fn format_interval(interval: Duration) -> String {
    let secs = interval.as_secs();
    if secs >= 86400 && secs.is_multiple_of(86400) {
        format!("{}d", secs / 86400)
    } else if secs >= 3600 && secs.is_multiple_of(3600) {
        format!("{}h", secs / 3600)
    } else if secs >= 60 && secs.is_multiple_of(60) {
        format!("{}m", secs / 60)
    } else {
        format!("{}s", secs)
    }
}

/// The persisted interval, or `fallback` when none is stored.
///
/// An unreadable stored value is logged and ignored.
pub fn load_interval(store: &dyn Store, fallback: Duration) -> Result<Duration> {
    let Some(raw) = store.get_setting(INTERVAL_KEY)? else {
        return Ok(fallback);
    };

    match raw.trim().parse::<u64>().map(Duration::from_secs) {
        Ok(interval) if interval >= MIN_INTERVAL => Ok(interval),
        _ => {
            tracing::warn!("Ignoring invalid stored poll interval {:?}", raw);
            Ok(fallback)
        }
    }
}

pub fn save_interval(store: &dyn Store, interval: Duration) -> Result<()> {
    store.set_setting(INTERVAL_KEY, &interval.as_secs().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SqliteStore;

    #[test]
    fn test_parse_interval() {
        assert_eq!(parse_interval("1h").unwrap(), Duration::from_secs(3600));
        assert_eq!(parse_interval("30m").unwrap(), Duration::from_secs(1800));
        assert_eq!(parse_interval("1d").unwrap(), Duration::from_secs(86400));
        assert_eq!(parse_interval("45s").unwrap(), Duration::from_secs(45));
        assert_eq!(parse_interval(" 5M ").unwrap(), Duration::from_secs(300));
    }

    #[test]
    fn test_bare_number_is_minutes() {
        assert_eq!(parse_interval("5").unwrap(), Duration::from_secs(300));
        assert_eq!(parse_interval("1").unwrap(), Duration::from_secs(60));
    }

    #[test]
    fn test_parse_interval_rejects_bad_input() {
        assert!(matches!(parse_interval("invalid"), Err(ConfigError::Invalid(_))));
        assert!(matches!(parse_interval(""), Err(ConfigError::Invalid(_))));
        assert!(matches!(parse_interval("-5"), Err(ConfigError::Invalid(_))));
        assert!(matches!(parse_interval("0"), Err(ConfigError::Invalid(_))));
        assert!(matches!(parse_interval("0s"), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_format_interval() {
        assert_eq!(format_interval(Duration::from_secs(3600)), "1h");
        assert_eq!(format_interval(Duration::from_secs(1800)), "30m");
        assert_eq!(format_interval(Duration::from_secs(86400)), "1d");
        assert_eq!(format_interval(Duration::from_secs(90)), "90s");
        assert_eq!(format_interval(Duration::from_secs(7200)), "2h");
    }

    #[test]
    fn test_stored_interval_roundtrip() {
        let store = SqliteStore::in_memory().unwrap();
        let fallback = Duration::from_secs(300);

        assert_eq!(load_interval(&store, fallback).unwrap(), fallback);

        save_interval(&store, Duration::from_secs(60)).unwrap();
        assert_eq!(load_interval(&store, fallback).unwrap(), Duration::from_secs(60));
    }

    #[test]
    fn test_invalid_stored_interval_falls_back() {
        let store = SqliteStore::in_memory().unwrap();
        store.set_setting(INTERVAL_KEY, "soon").unwrap();
        assert_eq!(
            load_interval(&store, Duration::from_secs(300)).unwrap(),
            Duration::from_secs(300)
        );
    }
}
