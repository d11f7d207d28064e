//! Per-entity log thresholds
//!
//! Servers and channels each carry their own verbosity. Emission goes
//! through `tracing`; the threshold here decides whether a given entity
//! logs at a given level at all, independent of the global subscriber.

/// Ordered log threshold: `Error` < `Warn` < `Info` < `Debug`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    /// Only errors
    Error = 0,
    /// Errors and warnings
    Warn = 1,
    /// Errors, warnings and informational messages
    Info = 2,
    /// Everything
    Debug = 3,
}

impl LogLevel {
    /// Default threshold for servers and channels
    pub const DEFAULT: LogLevel = LogLevel::Info;

    /// Build from a numeric config value, clamping out-of-range input
    pub fn from_i64(v: i64) -> Self {
        match v {
            i64::MIN..=0 => LogLevel::Error,
            1 => LogLevel::Warn,
            2 => LogLevel::Info,
            _ => LogLevel::Debug,
        }
    }

    /// Numeric form, matching the config file encoding (0..=3)
    pub fn as_i64(self) -> i64 {
        self as i64
    }

    /// Shift the threshold by `delta` steps (`-v` / `-s` flags), clamped
    pub fn offset(self, delta: i64) -> Self {
        Self::from_i64(self.as_i64().saturating_add(delta))
    }

    /// Whether a message at `level` passes this threshold
    pub fn allows(self, level: LogLevel) -> bool {
        self >= level
    }
}

impl Default for LogLevel {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ordering() {
        assert!(LogLevel::Debug > LogLevel::Info);
        assert!(LogLevel::Info > LogLevel::Warn);
        assert!(LogLevel::Warn > LogLevel::Error);
    }

    #[test]
    fn test_from_i64_clamps() {
        assert_eq!(LogLevel::from_i64(-5), LogLevel::Error);
        assert_eq!(LogLevel::from_i64(0), LogLevel::Error);
        assert_eq!(LogLevel::from_i64(2), LogLevel::Info);
        assert_eq!(LogLevel::from_i64(99), LogLevel::Debug);
    }

    #[test]
    fn test_offset() {
        assert_eq!(LogLevel::Info.offset(1), LogLevel::Debug);
        assert_eq!(LogLevel::Info.offset(-2), LogLevel::Error);
        assert_eq!(LogLevel::Info.offset(10), LogLevel::Debug);
    }

    #[test]
    fn test_allows() {
        assert!(LogLevel::Debug.allows(LogLevel::Info));
        assert!(LogLevel::Info.allows(LogLevel::Info));
        assert!(!LogLevel::Warn.allows(LogLevel::Info));
    }
}
