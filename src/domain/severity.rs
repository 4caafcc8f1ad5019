//! Severity levels for tracked operations.
//!
//! Severity orders the importance of activities, events, and messages. The
//! selector compares severities to decide whether a record is emitted, so the
//! ordering of the variants is part of the contract: `Trace` is the lowest,
//! `Halt` the highest.

use std::fmt;
use std::str::FromStr;

/// Severity of a tracked operation or message.
///
/// Variants are declared in ascending order of importance, so the derived
/// `Ord` gives the expected comparison (`Severity::Debug < Severity::Error`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[repr(u8)]
pub enum Severity {
    /// Fine-grained diagnostic detail
    Trace = 0,
    /// Debugging information
    Debug = 1,
    /// Normal operational messages
    Info = 2,
    /// Normal but notable conditions
    Notice = 3,
    /// Warning conditions
    Warning = 4,
    /// Error conditions
    Error = 5,
    /// Critical conditions
    Critical = 6,
    /// The application cannot continue
    Fatal = 7,
    /// The application is about to terminate
    Halt = 8,
}

impl Severity {
    /// Get the uppercase name of this severity.
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Trace => "TRACE",
            Severity::Debug => "DEBUG",
            Severity::Info => "INFO",
            Severity::Notice => "NOTICE",
            Severity::Warning => "WARNING",
            Severity::Error => "ERROR",
            Severity::Critical => "CRITICAL",
            Severity::Fatal => "FATAL",
            Severity::Halt => "HALT",
        }
    }
}

impl From<u8> for Severity {
    fn from(value: u8) -> Self {
        match value {
            0 => Severity::Trace,
            1 => Severity::Debug,
            2 => Severity::Info,
            3 => Severity::Notice,
            4 => Severity::Warning,
            5 => Severity::Error,
            6 => Severity::Critical,
            7 => Severity::Fatal,
            8 => Severity::Halt,
            _ => Severity::Halt, // Saturate above the ladder for invalid values
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing a severity name fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseSeverityError {
    /// The string that could not be parsed
    pub input: String,
}

impl fmt::Display for ParseSeverityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown severity level: {:?}", self.input)
    }
}

impl std::error::Error for ParseSeverityError {}

impl FromStr for Severity {
    type Err = ParseSeverityError;

    /// Parse a severity from its name, case-insensitively.
    ///
    /// Accepts the canonical names (`"INFO"`, `"warning"`, ...) plus the
    /// common abbreviation `"WARN"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "TRACE" => Ok(Severity::Trace),
            "DEBUG" => Ok(Severity::Debug),
            "INFO" => Ok(Severity::Info),
            "NOTICE" => Ok(Severity::Notice),
            "WARN" | "WARNING" => Ok(Severity::Warning),
            "ERROR" => Ok(Severity::Error),
            "CRITICAL" => Ok(Severity::Critical),
            "FATAL" => Ok(Severity::Fatal),
            "HALT" => Ok(Severity::Halt),
            _ => Err(ParseSeverityError {
                input: s.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Trace < Severity::Debug);
        assert!(Severity::Info < Severity::Warning);
        assert!(Severity::Error < Severity::Critical);
        assert!(Severity::Fatal < Severity::Halt);
    }

    #[test]
    fn test_severity_round_trip_through_u8() {
        for level in [
            Severity::Trace,
            Severity::Debug,
            Severity::Info,
            Severity::Notice,
            Severity::Warning,
            Severity::Error,
            Severity::Critical,
            Severity::Fatal,
            Severity::Halt,
        ] {
            assert_eq!(Severity::from(level as u8), level);
        }
    }

    #[test]
    fn test_invalid_u8_saturates() {
        assert_eq!(Severity::from(200), Severity::Halt);
    }

    #[test]
    fn test_parse_canonical_names() {
        assert_eq!("INFO".parse::<Severity>().unwrap(), Severity::Info);
        assert_eq!("error".parse::<Severity>().unwrap(), Severity::Error);
        assert_eq!("Notice".parse::<Severity>().unwrap(), Severity::Notice);
    }

    #[test]
    fn test_parse_warn_abbreviation() {
        assert_eq!("WARN".parse::<Severity>().unwrap(), Severity::Warning);
        assert_eq!("warning".parse::<Severity>().unwrap(), Severity::Warning);
    }

    #[test]
    fn test_parse_unknown_name() {
        let err = "verbose".parse::<Severity>().unwrap_err();
        assert_eq!(err.input, "verbose");
        assert!(err.to_string().contains("verbose"));
    }

    #[test]
    fn test_display_matches_as_str() {
        assert_eq!(Severity::Warning.to_string(), "WARNING");
        assert_eq!(format!("{}", Severity::Halt), Severity::Halt.as_str());
    }
}
