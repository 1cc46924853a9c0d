//! End-to-end daemon tests against an in-process fake virtual-HID service.

use std::io::{BufRead, BufReader, Write};
use std::os::unix::net::{UnixDatagram, UnixStream};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use core_config::Tunables;
use core_cursor::CursorControl;
use core_daemon::console::FixedConsoleUser;
use core_daemon::{Daemon, DaemonConfig};
use core_proto::Response;

/// Cursor double: accepts everything, reports a fixed position.
struct StubCursor;

impl CursorControl for StubCursor {
    fn position(&self) -> anyhow::Result<(f64, f64)> {
        Ok((0.0, 0.0))
    }
    fn warp(&self, _x: f64, _y: f64) -> anyhow::Result<()> {
        Ok(())
    }
    fn set_associated(&self, _associated: bool) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Acknowledges device inits so the wire client reaches `Ready`.
fn spawn_fake_service(socket_path: &Path, stop: Arc<AtomicBool>) -> thread::JoinHandle<()> {
    let socket = UnixDatagram::bind(socket_path).unwrap();
    socket
        .set_read_timeout(Some(Duration::from_millis(50)))
        .unwrap();
    thread::spawn(move || {
        let mut buf = [0u8; 256];
        while !stop.load(Ordering::Acquire) {
            let (n, peer) = match socket.recv_from(&mut buf) {
                Ok(pair) => pair,
                Err(_) => continue,
            };
            let ack = match &buf[..n] {
                [0x01, b'c', b'p', _, _, 1, ..] => Some(4u8),
                [0x01, b'c', b'p', _, _, 4, ..] => Some(5u8),
                _ => None,
            };
            if let (Some(ack), Some(path)) = (ack, peer.as_pathname()) {
                let _ = socket.send_to(&[ack], path);
            }
        }
    })
}

fn fast_tunables() -> Tunables {
    Tunables {
        cursor_settle: Duration::ZERO,
        nudge_settle: Duration::ZERO,
        click_hold: Duration::ZERO,
        double_tap_hold: Duration::ZERO,
        double_tap_gap: Duration::ZERO,
        drag_mode_hold: Duration::ZERO,
        focus_settle: Duration::ZERO,
        keystroke_delay: Duration::ZERO,
        key_hold: Duration::ZERO,
        dead_key_delay: Duration::ZERO,
        recv_timeout: Duration::from_millis(150),
        idle_max_timeouts: 4,
        ..Tunables::default()
    }
}

fn request(stream: &mut UnixStream, line: &str) -> Response {
    stream.write_all(line.as_bytes()).unwrap();
    stream.write_all(b"\n").unwrap();
    let mut reader = BufReader::new(stream.try_clone().unwrap());
    let mut response = String::new();
    reader.read_line(&mut response).unwrap();
    Response::parse_line(&response).unwrap()
}

#[test]
fn daemon_serves_one_client_at_a_time() {
    let tmp = tempfile::tempdir().unwrap();
    let socket_path = tmp.path().join("helper.sock");
    let server_dir = tmp.path().join("vhidd_server");
    std::fs::create_dir_all(&server_dir).unwrap();
    let stop = Arc::new(AtomicBool::new(false));
    let service = spawn_fake_service(&server_dir.join("1.sock"), Arc::clone(&stop));

    let uid = unsafe { libc::geteuid() } as u32;
    let daemon = Daemon::new(
        DaemonConfig {
            socket_path: socket_path.clone(),
            server_dir,
            tunables: fast_tunables(),
        },
        Box::new(StubCursor),
        Box::new(FixedConsoleUser(Some(uid))),
    )
    .unwrap();
    let shutdown = daemon.shutdown_flag();

    thread::scope(|scope| {
        scope.spawn(|| daemon.run().unwrap());
        // Give the acceptor a beat to start.
        thread::sleep(Duration::from_millis(50));

        // First client opens a session and runs a command through the full
        // stack: dispatch, cursor engine, wire client, fake service.
        let mut first = UnixStream::connect(&socket_path).unwrap();
        let status = request(&mut first, r#"{"action":"status"}"#);
        assert_eq!(status, Response::status(true, true));
        let click = request(&mut first, r#"{"action":"click","x":600,"y":500}"#);
        assert_eq!(click, Response::success());
        let unknown = request(&mut first, r#"{"action":"teleport","x":1,"y":1}"#);
        assert_eq!(unknown, Response::failure("unknown action: teleport"));

        // Second client connects while the first session is live. Its
        // request must not be answered until the first client goes away.
        let first_disconnect_at = Arc::new(std::sync::Mutex::new(None::<Instant>));
        let disconnect_marker = Arc::clone(&first_disconnect_at);
        let waiter = scope.spawn(move || {
            let mut second = UnixStream::connect(&socket_path).unwrap();
            let response = request(&mut second, r#"{"action":"status"}"#);
            let answered_at = Instant::now();
            assert_eq!(response, Response::status(true, true));
            let disconnected_at = disconnect_marker
                .lock()
                .unwrap()
                .expect("first client should have disconnected before the answer");
            assert!(answered_at >= disconnected_at);
        });

        thread::sleep(Duration::from_millis(200));
        *first_disconnect_at.lock().unwrap() = Some(Instant::now());
        drop(first);

        waiter.join().unwrap();

        shutdown.store(true, Ordering::Release);
    });

    stop.store(true, Ordering::Release);
    service.join().unwrap();
}

#[test]
fn type_round_trips_skipped_characters() {
    let tmp = tempfile::tempdir().unwrap();
    let socket_path = tmp.path().join("helper.sock");
    let server_dir = tmp.path().join("vhidd_server");
    std::fs::create_dir_all(&server_dir).unwrap();
    let stop = Arc::new(AtomicBool::new(false));
    let service = spawn_fake_service(&server_dir.join("1.sock"), Arc::clone(&stop));

    let uid = unsafe { libc::geteuid() } as u32;
    let daemon = Daemon::new(
        DaemonConfig {
            socket_path: socket_path.clone(),
            server_dir,
            tunables: fast_tunables(),
        },
        Box::new(StubCursor),
        Box::new(FixedConsoleUser(Some(uid))),
    )
    .unwrap();
    let shutdown = daemon.shutdown_flag();

    thread::scope(|scope| {
        scope.spawn(|| daemon.run().unwrap());
        thread::sleep(Duration::from_millis(50));

        let mut client = UnixStream::connect(&socket_path).unwrap();
        let typed = request(&mut client, r#"{"action":"type","text":"Hi!"}"#);
        assert_eq!(typed, Response::typed(vec![]));
        let accented = request(&mut client, r#"{"action":"type","text":"é"}"#);
        assert_eq!(accented, Response::typed(vec![233]));
        drop(client);

        shutdown.store(true, Ordering::Release);
        // Wake the acceptor in case no client is pending.
        let _ = UnixStream::connect(&socket_path);
    });

    stop.store(true, Ordering::Release);
    service.join().unwrap();
}
