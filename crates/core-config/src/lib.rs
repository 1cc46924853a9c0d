//! core-config: tunables, well-known paths, and the permission policy.
//!
//! Every tunable resolves per key with a fixed precedence: settings file,
//! then `GHOSTTOUCH_<KEY>` environment variable, then compile-time default.
//! Config files live in `.ghosttouch/` under the working directory first and
//! the home directory second; both the settings file and the permission file
//! are JSON. A missing or unparseable file falls back to defaults rather
//! than failing startup.

pub mod paths;
pub mod permissions;
pub mod tunables;

pub use paths::{DAEMON_SOCKET_PATH, VHID_SERVER_DIR, config_dirs, layout_id};
pub use permissions::{PermissionFile, PermissionPolicy};
pub use tunables::Tunables;
