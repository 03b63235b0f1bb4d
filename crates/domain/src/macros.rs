//! Macro for implementing Display and FromStr for status enums
//!
//! Status enums are persisted as lowercase snake_case strings. This macro
//! generates both directions of the conversion and keeps the string forms in
//! one place per enum.

/// Implements Display and FromStr traits for status enums
///
/// Generates:
/// - `Display`: converts enum variants to their string representations
/// - `FromStr`: parses case-insensitive strings back to variants
#[macro_export]
macro_rules! impl_domain_status_conversions {
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
