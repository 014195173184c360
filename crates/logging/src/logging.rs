// This Source Code Form is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file,
// You can obtain one at <https://mozilla.org/MPL/2.0/>.

/// Initializes the logging framework to capture logs from the crates specified with a minimum
/// [`log::Level`] of [`Info`](log::Level::Info) on debug builds and [`Warn`](log::Level::Warn) on
/// release builds.  On desktop platforms, these defaults can be overridden by setting the
/// `RUST_LOG` environment variable.
pub struct Logging {
    crates: Vec<&'static str>,
    level: log::LevelFilter,
}

impl Logging {
    /// Creates a new [`Logging`] instance with the specified list of crates to capture logs from.
    pub fn new(crates: Vec<&'static str>) -> Self {
        Self {
            crates,
            level: if cfg!(debug_assertions) {
                log::LevelFilter::Info
            } else {
                log::LevelFilter::Warn
            },
        }
    }

    /// Overrides the build-profile default level.  `RUST_LOG` still takes precedence.
    pub fn with_level(mut self, level: log::LevelFilter) -> Self {
        self.level = level;
        self
    }

    /// The filter directive equivalent to this configuration, in `RUST_LOG` syntax.
    pub fn filter(&self) -> String {
        let level = match self.level {
            log::LevelFilter::Off => "off",
            log::LevelFilter::Error => "error",
            log::LevelFilter::Warn => "warn",
            log::LevelFilter::Info => "info",
            log::LevelFilter::Debug => "debug",
            log::LevelFilter::Trace => "trace",
        };
        self.crates
            .iter()
            .map(|pkg_name| format!("{}={}", pkg_name.replace('-', "_"), level))
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Installs the global logger.  Returns an error if a logger was already installed.
    pub fn try_init(self) -> Result<(), log::SetLoggerError> {
        crate::platform_impl::try_init(&self.filter())
    }

    /// Installs the global logger.  If a logger is already installed it is kept, and a warning
    /// is logged through it.
    pub fn init(self) {
        if let Err(err) = self.try_init() {
            log::warn!("keeping the logger that is already installed: {err}");
        }
    }
}


// End of File
