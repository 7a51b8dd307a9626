//! # arena-settings
//!
//! Client configuration with layered sources.
//!
//! Settings are loaded from three layers (in priority order):
//! 1. **Compiled defaults**: [`ClientSettings::default()`]
//! 2. **User file**: `~/.arena/settings.json` (deep-merged over defaults)
//! 3. **Environment variables**: `ARENA_*` overrides (highest priority)

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{
    apply_overrides, deep_merge, load_settings, load_settings_from_path,
    parse_bool, parse_u16_range, parse_u64_range, settings_path,
};
pub use types::*;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn re_exports_work() {
        let _settings = ClientSettings::default();
        let _path = settings_path();
    }

    #[test]
    fn default_settings_match_documented_values() {
        let settings = ClientSettings::default();
        assert_eq!(settings.server.host, "127.0.0.1");
        assert_eq!(settings.server.port, 7350);
        assert_eq!(settings.realtime.heartbeat_interval_ms, 10_000);
        assert!(settings.realtime.appear_online);
    }
}
