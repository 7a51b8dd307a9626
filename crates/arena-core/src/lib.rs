//! # arena-core
//!
//! Foundation utilities shared by every Arena crate:
//!
//! - **Logging**: `tracing` subscriber setup and an in-memory capture layer for tests
//! - **Clock**: wall-clock time in epoch seconds
//! - **Constants**: package name and version

#![deny(unsafe_code)]

pub mod clock;
pub mod constants;
pub mod logging;

pub use clock::now_secs;
