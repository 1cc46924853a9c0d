//! Well-known filesystem locations and environment handles.

use std::path::PathBuf;

/// Helper daemon listening socket. Lives in the system runtime directory so
/// only the daemon (running as root) can bind it; per-connection access is
/// additionally enforced by ownership, mode, and peer-credential checks.
pub const DAEMON_SOCKET_PATH: &str = "/var/run/ghosttouch.sock";

/// Root-only directory where the Karabiner DriverKit virtual-HID daemon
/// exposes its server sockets.
pub const VHID_SERVER_DIR: &str =
    "/Library/Application Support/org.pqrs/tmp/rootonly/vhidd_server";

/// Name of the per-project / per-user configuration directory.
pub const CONFIG_DIR_NAME: &str = ".ghosttouch";

/// Environment variable naming the host keyboard layout when it is not
/// US-QWERTY (a Text Input Services input-source id).
pub const LAYOUT_ID_ENV: &str = "GHOSTTOUCH_LAYOUT_ID";

/// Configuration directories in search order: working directory first, then
/// the home directory.
pub fn config_dirs() -> Vec<PathBuf> {
    let mut dirs_out = Vec::with_capacity(2);
    if let Ok(cwd) = std::env::current_dir() {
        dirs_out.push(cwd.join(CONFIG_DIR_NAME));
    }
    if let Some(home) = dirs::home_dir() {
        dirs_out.push(home.join(CONFIG_DIR_NAME));
    }
    dirs_out
}

/// Configured non-reference keyboard layout, if any.
pub fn layout_id() -> Option<String> {
    std::env::var(LAYOUT_ID_ENV).ok().filter(|v| !v.is_empty())
}
