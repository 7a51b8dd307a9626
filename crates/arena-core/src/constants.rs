//! Package-level constants.

/// Crate version, from Cargo.toml.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Short product name. Also the settings directory (`~/.arena`).
pub const NAME: &str = "arena";
