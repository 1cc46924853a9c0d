//! core-daemon: the privileged helper.
//!
//! Runs as root because the virtual-HID service keeps its sockets under a
//! root-only directory. Listens on a local stream socket, admits one client
//! at a time, reads newline-delimited JSON commands, and drives the cursor
//! engine, the typing pipeline, and the wire client to execute them. The
//! fail-closed posture is structural: the socket file is owned by the
//! console user with mode 0600 (0000 when nobody is at the console), and
//! every accepted peer is re-checked against the current console uid so fast
//! user switching cannot leak access.
//!
//! Commands are processed strictly one at a time on the accept thread; the
//! system cursor is global state and the serial design is what makes the
//! sync sequence sound without locks.

pub mod console;
pub mod daemon;
pub mod dispatch;
pub mod net;
pub mod session;
pub mod typing;

pub use console::{ConsoleUserSource, SystemConsoleUser};
pub use daemon::{Daemon, DaemonConfig};
pub use dispatch::{Dispatcher, StatusSource};
pub use session::SessionConfig;
pub use typing::{KeyboardSink, TypingPipeline};
