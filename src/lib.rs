//! Chat EBHC desktop shell.
//!
//! The library holds the self-update core and the persisted settings. The
//! GPUI window layer lives behind the `shell` feature.

pub mod error;
pub mod state;
pub mod updater;

#[cfg(feature = "shell")]
pub mod shell;
