//! Daemon assembly and accept loop.
//!
//! One client at a time: the accept loop runs `accept → authenticate →
//! session → close` serially, which is what lets the cursor engine treat the
//! system cursor as exclusively its own for the duration of a command. A
//! termination signal sets an atomic flag; a background poller observes it,
//! wakes the blocking accept with a throwaway connection, and the loop exits
//! to clean up the socket file and the wire client.

use std::os::unix::net::{UnixListener, UnixStream};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use core_config::{DAEMON_SOCKET_PATH, Tunables, VHID_SERVER_DIR};
use core_cursor::{CursorControl, PointingSink};
use core_hid::{CharMap, KeyboardReport, PointingReport};
use core_proto::Response;
use core_wire::HidClient;
use tracing::{error, info, warn};

use crate::console::ConsoleUserSource;
use crate::dispatch::{Dispatcher, StatusSource};
use crate::net::{peer_uid, setup_listener};
use crate::session::{SessionConfig, run_session};
use crate::typing::KeyboardSink;

const SHUTDOWN_POLL: Duration = Duration::from_millis(100);

/// Startup parameters for the helper.
#[derive(Debug, Clone)]
pub struct DaemonConfig {
    pub socket_path: PathBuf,
    pub server_dir: PathBuf,
    pub tunables: Tunables,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            socket_path: PathBuf::from(DAEMON_SOCKET_PATH),
            server_dir: PathBuf::from(VHID_SERVER_DIR),
            tunables: Tunables::load(),
        }
    }
}

/// The assembled helper daemon.
pub struct Daemon {
    listener: UnixListener,
    socket_path: PathBuf,
    wire: HidClient,
    cursor: Box<dyn CursorControl + Send + Sync>,
    console: Box<dyn ConsoleUserSource>,
    charmap: CharMap,
    tunables: Tunables,
    shutdown: Arc<AtomicBool>,
}

impl Daemon {
    /// Bind the socket and connect the wire client. Both failures are fatal;
    /// nothing else at runtime is.
    pub fn new(
        config: DaemonConfig,
        cursor: Box<dyn CursorControl + Send + Sync>,
        console: Box<dyn ConsoleUserSource>,
    ) -> Result<Self> {
        let console_uid = console.console_uid();
        let listener = setup_listener(&config.socket_path, console_uid)
            .context("create listening socket")?;
        let wire = HidClient::connect(&config.server_dir)
            .context("initialize virtual-HID client")?;
        Ok(Self {
            listener,
            socket_path: config.socket_path,
            wire,
            cursor,
            console,
            charmap: effective_charmap(),
            tunables: config.tunables,
            shutdown: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Flag observed by the shutdown poller; register signal handlers on it.
    pub fn shutdown_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }

    /// Install SIGINT/SIGTERM handlers that set the shutdown flag.
    pub fn install_signal_handlers(&self) -> Result<()> {
        for signal in [signal_hook::consts::SIGINT, signal_hook::consts::SIGTERM] {
            signal_hook::flag::register(signal, self.shutdown_flag())
                .context("register signal handler")?;
        }
        Ok(())
    }

    /// Serve until the shutdown flag is raised, then tear everything down.
    pub fn run(&self) -> Result<()> {
        let poller = self.spawn_shutdown_poller();
        let session_config = SessionConfig {
            recv_timeout: self.tunables.recv_timeout,
            idle_max_timeouts: self.tunables.idle_max_timeouts,
        };

        info!(target: "daemon", socket = %self.socket_path.display(), "accepting");
        while !self.shutdown.load(Ordering::Acquire) {
            let (stream, _addr) = match self.listener.accept() {
                Ok(pair) => pair,
                Err(e) => {
                    if self.shutdown.load(Ordering::Acquire) {
                        break;
                    }
                    warn!(target: "daemon", error = %e, "accept_failed");
                    continue;
                }
            };
            if self.shutdown.load(Ordering::Acquire) {
                break;
            }
            self.serve_client(stream, &session_config);
        }

        let _ = std::fs::remove_file(&self.socket_path);
        self.wire.shutdown();
        let _ = poller.join();
        info!(target: "daemon", "stopped");
        Ok(())
    }

    fn serve_client(&self, stream: UnixStream, session_config: &SessionConfig) {
        let uid = match peer_uid(&stream) {
            Ok(uid) => uid,
            Err(e) => {
                warn!(target: "daemon", error = %e, "peer_credentials_unavailable");
                return;
            }
        };
        // Re-resolved per connection so fast user switching takes effect.
        let console_uid = self.console.console_uid();
        if !peer_allowed(uid, console_uid) {
            warn!(target: "daemon", peer_uid = uid, ?console_uid, "peer_rejected");
            return;
        }
        info!(target: "daemon", peer_uid = uid, "peer_accepted");

        let sink = WireSink(&self.wire);
        let dispatcher = Dispatcher {
            cursor: self.cursor.as_ref(),
            pointing: &sink,
            keyboard: &sink,
            status: &sink,
            charmap: &self.charmap,
            tunables: &self.tunables,
        };
        let outcome = run_session(stream, uid, session_config, |line| {
            let response: Response = dispatcher.handle_line(line);
            response.encode_line()
        });
        match outcome {
            Ok(end) => info!(target: "daemon", peer_uid = uid, ?end, "session_closed"),
            Err(e) => error!(target: "daemon", peer_uid = uid, error = %e, "session_failed"),
        }
    }

    /// Watches the shutdown flag and unblocks `accept` with a throwaway
    /// connection once it is raised. No work happens in signal context.
    fn spawn_shutdown_poller(&self) -> thread::JoinHandle<()> {
        let flag = self.shutdown_flag();
        let socket_path = self.socket_path.clone();
        thread::Builder::new()
            .name("daemon-shutdown".into())
            .spawn(move || {
                while !flag.load(Ordering::Acquire) {
                    thread::sleep(SHUTDOWN_POLL);
                }
                info!(target: "daemon", "shutdown_requested");
                let _ = UnixStream::connect(&socket_path);
            })
            .expect("spawn shutdown poller")
    }
}

/// Admission rule: root always, otherwise exactly the current console user.
pub(crate) fn peer_allowed(peer_uid: u32, console_uid: Option<u32>) -> bool {
    peer_uid == 0 || console_uid == Some(peer_uid)
}

/// Reference map, overlaid with the configured layout when one is set.
fn effective_charmap() -> CharMap {
    let reference = CharMap::reference();
    let Some(layout) = core_config::layout_id() else {
        return reference;
    };

    #[cfg(target_os = "macos")]
    {
        use core_hid::{build_substitution, layout::CarbonLayoutResolver};
        match CarbonLayoutResolver::new(&layout) {
            Ok(resolver) => {
                let substitution = build_substitution(&resolver, &reference);
                return CharMap::with_substitution(substitution);
            }
            Err(e) => {
                warn!(target: "daemon", layout = layout.as_str(), error = %e, "layout_unavailable");
                return reference;
            }
        }
    }

    #[cfg(not(target_os = "macos"))]
    {
        warn!(
            target: "daemon",
            layout = layout.as_str(),
            "layout_substitution_unsupported_on_this_platform"
        );
        return reference;
    }
}

/// Adapter giving the dispatcher trait views over the wire client.
struct WireSink<'a>(&'a HidClient);

impl PointingSink for WireSink<'_> {
    fn post(&self, report: &PointingReport) -> Result<()> {
        self.0.post_pointing(report).map_err(anyhow::Error::from)
    }
}

impl KeyboardSink for WireSink<'_> {
    fn post(&self, report: &KeyboardReport) -> Result<()> {
        self.0.post_keyboard(report).map_err(anyhow::Error::from)
    }
}

impl StatusSource for WireSink<'_> {
    fn keyboard_ready(&self) -> bool {
        self.0.keyboard_ready()
    }
    fn pointing_ready(&self) -> bool {
        self.0.pointing_ready()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_is_always_admitted() {
        assert!(peer_allowed(0, None));
        assert!(peer_allowed(0, Some(501)));
    }

    #[test]
    fn console_user_is_admitted_others_rejected() {
        assert!(peer_allowed(501, Some(501)));
        assert!(!peer_allowed(502, Some(501)));
        assert!(!peer_allowed(501, None));
    }
}
