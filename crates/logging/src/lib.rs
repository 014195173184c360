// This Source Code Form is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file,
// You can obtain one at <https://mozilla.org/MPL/2.0/>.

//! # Valence's Logging Framework
//!
//! This crate initializes the logging framework for Valence.  Everything logs through the [`log`]
//! facade; on desktop platforms [`env_logger`] writes those records to the terminal and reads its
//! configuration from the environment.  To set this up, create a [`Logging`] value naming the
//! crates whose logs should be captured and call [`Logging::init`] once, early in `main`.
//!
//! By default, the logging level is set to [`Info`](log::Level::Info) for debug builds, and
//! [`Warn`](log::Level::Warn) for release builds. This can be overridden by setting the `RUST_LOG`
//! environment variable, like so:
//!
//! ```sh
//! $> RUST_LOG=valence_simulation=debug cargo run
//! ```

mod logging;
mod platform_impl;
pub use logging::Logging;

/// A module which is typically glob imported.
pub mod prelude {
    pub use super::Logging;
}

// End of File
