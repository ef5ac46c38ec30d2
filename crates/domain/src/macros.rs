//! Macro for implementing Display and FromStr for wire-named enums
//!
//! Modes, strategies and phases travel as short lowercase strings (storage
//! values, config files, tab-sync payloads). This macro keeps the two
//! directions of that mapping in one table.
//!
//! # Example
//!
//! ```rust
//! use authlab_domain::impl_domain_status_conversions;
//!
//! #[derive(Debug, Clone, Copy, PartialEq, Eq)]
//! pub enum Channel {
//!     Primary,
//!     Fallback,
//! }
//!
//! impl_domain_status_conversions!(Channel {
//!     Primary => "primary",
//!     Fallback => "fallback",
//! });
//!
//! assert_eq!(Channel::Fallback.to_string(), "fallback");
//! assert_eq!("PRIMARY".parse::<Channel>(), Ok(Channel::Primary));
//! ```

/// Implements Display and FromStr traits for wire-named enums
///
/// - Display writes the mapped string
/// - FromStr parses case-insensitively and trims surrounding whitespace
#[macro_export]
macro_rules! impl_domain_status_conversions {
    ($enum_name:ident { $($variant:ident => $str:expr),+ $(,)? }) => {
        impl std::fmt::Display for $enum_name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                match self {
                    $(Self::$variant => f.write_str($str),)+
                }
            }
        }

        impl std::str::FromStr for $enum_name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_lowercase().as_str() {
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
    enum Transport {
        Channel,
        StorageEvent,
    }

    impl_domain_status_conversions!(Transport {
        Channel => "channel",
        StorageEvent => "storage-event",
    });

    #[test]
    fn test_display_conversion() {
        assert_eq!(Transport::Channel.to_string(), "channel");
        assert_eq!(Transport::StorageEvent.to_string(), "storage-event");
    }

    #[test]
    fn test_fromstr_is_case_insensitive() {
        assert_eq!(Transport::from_str("Storage-Event").unwrap(), Transport::StorageEvent);
        assert_eq!(Transport::from_str(" CHANNEL ").unwrap(), Transport::Channel);
    }

    #[test]
    fn test_fromstr_invalid() {
        let result = Transport::from_str("pigeon");
        assert!(result.unwrap_err().contains("Invalid Transport: pigeon"));
        assert!(Transport::from_str("").is_err());
    }
}
