//! Macro for implementing Display and FromStr for status enums
//!
//! Status columns are stored as lowercase text; the macro keeps the string
//! mapping next to the enum definition and gives every status enum the same
//! case-insensitive parsing behaviour.
//!
//! # Example
//!
//! ```rust
//! use ekuatia_domain::impl_status_conversions;
//!
//! #[derive(Debug, Clone, Copy, PartialEq, Eq)]
//! pub enum RunState {
//!     Running,
//!     Finished,
//! }
//!
//! impl_status_conversions!(RunState {
//!     Running => "running",
//!     Finished => "finished",
//! });
//! ```

/// Implements Display and FromStr traits for status enums
///
/// This macro generates:
/// - Display trait: converts enum variants to lowercase strings
/// - FromStr trait: parses case-insensitive strings to enum variants
#[macro_export]
macro_rules! impl_status_conversions {
    ($enum_name:ident { $($variant:ident => $str:expr),+ $(,)? }) => {
        impl std::fmt::Display for $enum_name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                match self {
                    $(Self::$variant => write!(f, $str),)+
                }
            }
        }

        impl std::str::FromStr for $enum_name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.to_lowercase().as_str() {
                    $($str => Ok(Self::$variant),)+
                    _ => Err(format!("Invalid {}: {}", stringify!($enum_name), s)),
                }
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum TestStatus {
        Pending,
        Accepted,
        Rejected,
    }

    impl_status_conversions!(TestStatus {
        Pending => "pending",
        Accepted => "accepted",
        Rejected => "rejected",
    });

    #[test]
    fn display_uses_lowercase_strings() {
        assert_eq!(TestStatus::Pending.to_string(), "pending");
        assert_eq!(TestStatus::Accepted.to_string(), "accepted");
        assert_eq!(TestStatus::Rejected.to_string(), "rejected");
    }

    #[test]
    fn parsing_is_case_insensitive() {
        assert_eq!(TestStatus::from_str("PENDING").unwrap(), TestStatus::Pending);
        assert_eq!(TestStatus::from_str("Accepted").unwrap(), TestStatus::Accepted);
        assert_eq!(TestStatus::from_str("reJecTed").unwrap(), TestStatus::Rejected);
    }

    #[test]
    fn parsing_rejects_unknown_values() {
        let result = TestStatus::from_str("archived");
        assert!(result.is_err());
        assert!(result.unwrap_err().contains("Invalid TestStatus: archived"));
    }

    #[test]
    fn roundtrip_through_display() {
        for status in [TestStatus::Pending, TestStatus::Accepted, TestStatus::Rejected] {
            let parsed = TestStatus::from_str(&status.to_string()).unwrap();
            assert_eq!(status, parsed);
        }
    }
}
