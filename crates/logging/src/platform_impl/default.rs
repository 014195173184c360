// This Source Code Form is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file,
// You can obtain one at <https://mozilla.org/MPL/2.0/>.

struct NullLogger;

impl log::Log for NullLogger {
    fn enabled(&self, _metadata: &log::Metadata) -> bool {
        false
    }

    fn log(&self, _record: &log::Record) {}

    fn flush(&self) {}
}

static LOGGER: NullLogger = NullLogger;

pub(crate) fn try_init(_filter: &str) -> Result<(), log::SetLoggerError> {
    log::set_logger(&LOGGER)
}

// End of File
