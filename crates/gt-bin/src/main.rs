//! ghosttouchd: the privileged input helper.
//!
//! Runs as root, binds the helper socket, connects to the virtual-HID
//! service, and serves one client at a time until signalled. Startup is the
//! only phase allowed to fail; see `core-daemon` for the runtime posture.

use std::path::PathBuf;
use std::sync::Once;

use anyhow::{Context, Result};
use clap::Parser;
use core_config::{DAEMON_SOCKET_PATH, Tunables, VHID_SERVER_DIR};
use core_daemon::{Daemon, DaemonConfig, SystemConsoleUser};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;

/// CLI arguments.
#[derive(Parser, Debug)]
#[command(name = "ghosttouchd", version, about = "ghosttouch privileged input helper")]
struct Args {
    /// Helper socket path.
    #[arg(long, default_value = DAEMON_SOCKET_PATH)]
    socket_path: PathBuf,
    /// Virtual-HID service socket directory.
    #[arg(long, default_value = VHID_SERVER_DIR)]
    server_dir: PathBuf,
    /// Settings file overriding the discovered one.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Directory for the daemon log file; stderr when omitted.
    #[arg(long)]
    log_dir: Option<PathBuf>,
}

fn configure_logging(args: &Args) -> Option<WorkerGuard> {
    let filter = tracing_subscriber::EnvFilter::from_default_env();
    match &args.log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::never(dir, "ghosttouchd.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let _ = tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(writer)
                .with_ansi(false)
                .try_init();
            Some(guard)
        }
        None => {
            let _ = tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .try_init();
            None
        }
    }
}

fn install_panic_hook() {
    static HOOK: Once = Once::new();
    HOOK.call_once(|| {
        let default_panic = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            tracing::error!(target: "runtime.panic", ?info, "panic");
            default_panic(info);
        }));
    });
}

#[cfg(target_os = "macos")]
fn cursor() -> Box<dyn core_cursor::CursorControl + Send + Sync> {
    Box::new(core_cursor::QuartzCursor::new())
}

#[cfg(not(target_os = "macos"))]
fn cursor() -> Box<dyn core_cursor::CursorControl + Send + Sync> {
    Box::new(core_cursor::UnsupportedCursor)
}

fn main() -> Result<()> {
    let args = Args::parse();
    let _log_guard = configure_logging(&args);
    install_panic_hook();

    info!(
        target: "runtime",
        socket = %args.socket_path.display(),
        server_dir = %args.server_dir.display(),
        "startup"
    );

    let tunables = match &args.config {
        Some(path) => Tunables::load_from(path),
        None => Tunables::load(),
    };

    let daemon = Daemon::new(
        DaemonConfig {
            socket_path: args.socket_path,
            server_dir: args.server_dir,
            tunables,
        },
        cursor(),
        Box::new(SystemConsoleUser),
    )
    .context("daemon startup")?;
    daemon.install_signal_handlers()?;
    daemon.run()
}
