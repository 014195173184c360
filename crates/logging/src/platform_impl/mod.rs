// This Source Code Form is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file,
// You can obtain one at <https://mozilla.org/MPL/2.0/>.

// Only desktop platforms write logs anywhere at this time.  All other platforms pull the default
// implementation, which installs a logger that discards everything.

#[cfg(any(target_os = "linux", target_os = "macos", target_os = "windows"))]
mod desktop;
#[cfg(any(target_os = "linux", target_os = "macos", target_os = "windows"))]
pub(crate) use self::desktop::*;

#[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
mod default;
#[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
pub(crate) use self::default::*;

// End of File
