//! Macro for implementing Display and FromStr for wire-named enums
//!
//! Capability names, permission states and enforcement models are all shown
//! in diagnostics and read back from configuration. This macro keeps the
//! string form of each variant in one place.
//!
//! # Example
//!
//! ```rust
//! use timeguard_domain::impl_wire_name_conversions;
//!
//! #[derive(Debug, Clone, Copy, PartialEq, Eq)]
//! pub enum Shade {
//!     Light,
//!     Dark,
//! }
//!
//! impl_wire_name_conversions!(Shade {
//!     Light => "light",
//!     Dark => "dark",
//! });
//!
//! assert_eq!(Shade::Dark.to_string(), "dark");
//! assert_eq!("LIGHT".parse::<Shade>(), Ok(Shade::Light));
//! ```

/// Implements `Display`, `FromStr` and `as_str` for enums with fixed wire
/// names.
///
/// Parsing is case-insensitive and accepts `-` in place of `_`, so
/// `"Poll-And-Kill"` parses the same as `"poll_and_kill"`. Wire names must be
/// written in lowercase.
#[macro_export]
macro_rules! impl_wire_name_conversions {
    ($enum_name:ident { $($variant:ident => $str:literal),+ $(,)? }) => {
        impl $enum_name {
            /// Wire name of this variant.
            pub const fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $str,)+
                }
            }
        }

        impl std::fmt::Display for $enum_name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $enum_name {
            type Err = String;

            fn from_str(s: &str) -> ::std::result::Result<Self, Self::Err> {
                let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
                match normalized.as_str() {
                    $($str => Ok(Self::$variant),)+
                    _ => Err(format!("Invalid {}: {}", stringify!($enum_name), s)),
                }
            }
        }
    };
}
