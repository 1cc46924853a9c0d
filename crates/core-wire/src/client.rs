//! The virtual-HID service client.
//!
//! Lifecycle: discover the newest server socket under the service directory,
//! bind a timestamped client datagram socket next to it, connect, send an
//! immediate heartbeat plus the two device-init requests, then wait (bounded)
//! for the keyboard/pointing acknowledgments. A heartbeat thread re-arms the
//! service's death deadline every interval; a liveness thread stats the
//! server socket path and, when it disappears, tears the connection down to
//! `Disconnected` and re-initializes from scratch once the socket reappears.
//! Readiness flags survive only as long as the connection that earned them.
//!
//! A single mutex serializes every datagram send, so heartbeats never
//! interleave with input reports.

use std::os::unix::net::UnixDatagram;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use core_hid::{KeyboardParameters, KeyboardReport, PointingReport};
use tracing::{debug, info, warn};

use crate::frame::{self, HEARTBEAT_DEADLINE_MS, Request, ServiceResponse};
use crate::WireError;

const CLIENT_SOCKET_DIR: &str = "vhidd_client";
const READER_POLL: Duration = Duration::from_millis(200);
const TICK: Duration = Duration::from_millis(50);

/// Timing knobs, overridable in tests.
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// How long to wait for both device acknowledgments after init.
    pub readiness_timeout: Duration,
    /// Interval between heartbeats.
    pub heartbeat_interval: Duration,
    /// Interval between server-socket liveness checks.
    pub liveness_interval: Duration,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            readiness_timeout: Duration::from_secs(10),
            heartbeat_interval: Duration::from_secs(3),
            liveness_interval: Duration::from_secs(3),
        }
    }
}

/// Where the client currently stands with the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    KeyboardOnly,
    PointingOnly,
    Ready,
}

struct Connection {
    socket: UnixDatagram,
    server_path: PathBuf,
    client_path: PathBuf,
}

impl Drop for Connection {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.client_path);
    }
}

struct Shared {
    server_dir: PathBuf,
    options: ClientOptions,
    conn: Mutex<Option<Arc<Connection>>>,
    keyboard_ready: AtomicBool,
    pointing_ready: AtomicBool,
    generation: AtomicU64,
    shutdown: AtomicBool,
}

/// Handle owning the connection and its background threads.
pub struct HidClient {
    shared: Arc<Shared>,
    threads: Mutex<Vec<JoinHandle<()>>>,
}

impl HidClient {
    /// Connect with production timing.
    pub fn connect(server_dir: impl AsRef<Path>) -> Result<Self, WireError> {
        Self::connect_with(server_dir, ClientOptions::default())
    }

    /// Connect, initialize both devices, and wait up to the readiness window.
    /// Missing acknowledgments degrade the client instead of failing it;
    /// only discovery/bind/connect failures are fatal here.
    pub fn connect_with(
        server_dir: impl AsRef<Path>,
        options: ClientOptions,
    ) -> Result<Self, WireError> {
        let shared = Arc::new(Shared {
            server_dir: server_dir.as_ref().to_path_buf(),
            options,
            conn: Mutex::new(None),
            keyboard_ready: AtomicBool::new(false),
            pointing_ready: AtomicBool::new(false),
            generation: AtomicU64::new(0),
            shutdown: AtomicBool::new(false),
        });

        establish(&shared)?;

        let mut threads = Vec::with_capacity(2);
        {
            let shared = Arc::clone(&shared);
            threads.push(
                thread::Builder::new()
                    .name("wire-heartbeat".into())
                    .spawn(move || heartbeat_loop(&shared))?,
            );
        }
        {
            let shared = Arc::clone(&shared);
            threads.push(
                thread::Builder::new()
                    .name("wire-liveness".into())
                    .spawn(move || liveness_loop(&shared))?,
            );
        }

        let client = Self {
            shared,
            threads: Mutex::new(threads),
        };
        client.await_readiness();
        Ok(client)
    }

    fn await_readiness(&self) {
        let deadline = Instant::now() + self.shared.options.readiness_timeout;
        while Instant::now() < deadline {
            if self.keyboard_ready() && self.pointing_ready() {
                info!(target: "wire", "devices_ready");
                return;
            }
            thread::sleep(TICK);
        }
        warn!(
            target: "wire",
            keyboard_ready = self.keyboard_ready(),
            pointing_ready = self.pointing_ready(),
            "devices_not_ready_in_window"
        );
    }

    pub fn keyboard_ready(&self) -> bool {
        self.shared.keyboard_ready.load(Ordering::Acquire)
    }

    pub fn pointing_ready(&self) -> bool {
        self.shared.pointing_ready.load(Ordering::Acquire)
    }

    pub fn state(&self) -> ConnectionState {
        let connected = self.shared.conn.lock().expect("conn lock poisoned").is_some();
        if !connected {
            return ConnectionState::Disconnected;
        }
        match (self.keyboard_ready(), self.pointing_ready()) {
            (true, true) => ConnectionState::Ready,
            (true, false) => ConnectionState::KeyboardOnly,
            (false, true) => ConnectionState::PointingOnly,
            (false, false) => ConnectionState::Connecting,
        }
    }

    /// Emit one keyboard report.
    pub fn post_keyboard(&self, report: &KeyboardReport) -> Result<(), WireError> {
        if !self.keyboard_ready() {
            return Err(WireError::KeyboardNotReady);
        }
        self.shared
            .send_frame(&frame::user_data(Request::PostKeyboardReport, &report.to_bytes()))
    }

    /// Emit one pointing report.
    pub fn post_pointing(&self, report: &PointingReport) -> Result<(), WireError> {
        if !self.pointing_ready() {
            return Err(WireError::PointingNotReady);
        }
        self.shared
            .send_frame(&frame::user_data(Request::PostPointingReport, &report.to_bytes()))
    }

    /// Terminate both devices (best effort), stop the threads, drop the
    /// connection.
    pub fn shutdown(&self) {
        let _ = self
            .shared
            .send_frame(&frame::user_data(Request::TerminateKeyboard, &[]));
        let _ = self
            .shared
            .send_frame(&frame::user_data(Request::TerminatePointing, &[]));
        self.shared.shutdown.store(true, Ordering::Release);
        self.shared.teardown();
        let mut threads = self.threads.lock().expect("thread list poisoned");
        for handle in threads.drain(..) {
            let _ = handle.join();
        }
    }
}

impl Drop for HidClient {
    fn drop(&mut self) {
        if !self.shared.shutdown.load(Ordering::Acquire) {
            self.shutdown();
        }
    }
}

impl Shared {
    fn current(&self) -> Option<Arc<Connection>> {
        self.conn.lock().expect("conn lock poisoned").clone()
    }

    fn send_frame(&self, bytes: &[u8]) -> Result<(), WireError> {
        let guard = self.conn.lock().expect("conn lock poisoned");
        let Some(conn) = guard.as_ref() else {
            return Err(WireError::Disconnected);
        };
        conn.socket.send(bytes).map(|_| ()).map_err(WireError::Send)
    }

    /// Drop the connection and forget device readiness. The generation bump
    /// retires the connection's reader thread.
    fn teardown(&self) {
        self.keyboard_ready.store(false, Ordering::Release);
        self.pointing_ready.store(false, Ordering::Release);
        self.generation.fetch_add(1, Ordering::AcqRel);
        self.conn.lock().expect("conn lock poisoned").take();
    }
}

/// Newest `*.sock` under the service directory.
fn discover(server_dir: &Path) -> Result<PathBuf, WireError> {
    let entries = std::fs::read_dir(server_dir)
        .map_err(|_| WireError::ServiceNotFound(server_dir.display().to_string()))?;
    let mut newest: Option<(SystemTime, PathBuf)> = None;
    for entry in entries.flatten() {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("sock") {
            continue;
        }
        let modified = entry
            .metadata()
            .and_then(|m| m.modified())
            .unwrap_or(UNIX_EPOCH);
        if newest.as_ref().is_none_or(|(t, _)| modified >= *t) {
            newest = Some((modified, path));
        }
    }
    newest
        .map(|(_, path)| path)
        .ok_or_else(|| WireError::ServiceNotFound(server_dir.display().to_string()))
}

/// Discover, bind, connect, heartbeat, init both devices, start the reader.
fn establish(shared: &Arc<Shared>) -> Result<(), WireError> {
    let server_path = discover(&shared.server_dir)?;

    let client_dir = shared
        .server_dir
        .parent()
        .unwrap_or(&shared.server_dir)
        .join(CLIENT_SOCKET_DIR);
    std::fs::create_dir_all(&client_dir)?;
    let stamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let client_path = client_dir.join(format!("ghosttouch_{}_{stamp}.sock", std::process::id()));

    let socket = UnixDatagram::bind(&client_path)?;
    socket.connect(&server_path)?;
    socket
        .send(&frame::heartbeat(HEARTBEAT_DEADLINE_MS))
        .map_err(WireError::Send)?;
    socket
        .send(&frame::user_data(
            Request::InitKeyboard,
            &KeyboardParameters::default().to_bytes(),
        ))
        .map_err(WireError::Send)?;
    socket
        .send(&frame::user_data(Request::InitPointing, &[]))
        .map_err(WireError::Send)?;

    let reader = socket.try_clone()?;
    reader.set_read_timeout(Some(READER_POLL))?;
    let generation = shared.generation.fetch_add(1, Ordering::AcqRel) + 1;

    info!(
        target: "wire",
        server = %server_path.display(),
        client = %client_path.display(),
        "service_connected"
    );

    *shared.conn.lock().expect("conn lock poisoned") = Some(Arc::new(Connection {
        socket,
        server_path,
        client_path,
    }));

    let reader_shared = Arc::clone(shared);
    thread::Builder::new()
        .name("wire-reader".into())
        .spawn(move || reader_loop(&reader_shared, reader, generation))?;
    Ok(())
}

/// Apply service acknowledgments to the readiness flags until this
/// connection is retired.
fn reader_loop(shared: &Arc<Shared>, socket: UnixDatagram, generation: u64) {
    let mut buf = [0u8; 64];
    loop {
        if shared.shutdown.load(Ordering::Acquire)
            || shared.generation.load(Ordering::Acquire) != generation
        {
            return;
        }
        let n = match socket.recv(&mut buf) {
            Ok(n) => n,
            Err(e)
                if e.kind() == std::io::ErrorKind::WouldBlock
                    || e.kind() == std::io::ErrorKind::TimedOut =>
            {
                continue;
            }
            Err(e) => {
                debug!(target: "wire", error = %e, "reader_socket_error");
                return;
            }
        };
        if n == 0 {
            continue;
        }
        match ServiceResponse::from_byte(buf[0]) {
            Some(ServiceResponse::DriverActivated) => {
                debug!(target: "wire", "driver_activated")
            }
            Some(ServiceResponse::DriverConnected) => {
                debug!(target: "wire", "driver_connected")
            }
            Some(ServiceResponse::DriverVersionMismatched) => {
                warn!(target: "wire", "driver_version_mismatched")
            }
            Some(ServiceResponse::KeyboardReady) => {
                shared.keyboard_ready.store(true, Ordering::Release);
                debug!(target: "wire", "keyboard_ready");
            }
            Some(ServiceResponse::PointingReady) => {
                shared.pointing_ready.store(true, Ordering::Release);
                debug!(target: "wire", "pointing_ready");
            }
            None => debug!(target: "wire", id = buf[0], "unknown_service_response"),
        }
    }
}

fn heartbeat_loop(shared: &Arc<Shared>) {
    loop {
        sleep_until_or_shutdown(shared, shared.options.heartbeat_interval);
        if shared.shutdown.load(Ordering::Acquire) {
            return;
        }
        match shared.send_frame(&frame::heartbeat(HEARTBEAT_DEADLINE_MS)) {
            Ok(()) | Err(WireError::Disconnected) => {}
            Err(e) => warn!(target: "wire", error = %e, "heartbeat_send_failed"),
        }
    }
}

/// Watch the server socket path; tear down on disappearance and
/// re-initialize from scratch once it is back.
fn liveness_loop(shared: &Arc<Shared>) {
    loop {
        sleep_until_or_shutdown(shared, shared.options.liveness_interval);
        if shared.shutdown.load(Ordering::Acquire) {
            return;
        }
        match shared.current() {
            Some(conn) => {
                if !conn.server_path.exists() {
                    warn!(
                        target: "wire",
                        server = %conn.server_path.display(),
                        "service_socket_gone"
                    );
                    shared.teardown();
                }
            }
            None => match establish(shared) {
                Ok(()) => info!(target: "wire", "service_reconnected"),
                Err(WireError::ServiceNotFound(_)) => {}
                Err(e) => debug!(target: "wire", error = %e, "service_reconnect_failed"),
            },
        }
    }
}

fn sleep_until_or_shutdown(shared: &Shared, total: Duration) {
    let deadline = Instant::now() + total;
    loop {
        if shared.shutdown.load(Ordering::Acquire) {
            return;
        }
        let now = Instant::now();
        if now >= deadline {
            return;
        }
        thread::sleep(TICK.min(deadline - now));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::net::SocketAddr;

    fn short_options() -> ClientOptions {
        ClientOptions {
            readiness_timeout: Duration::from_secs(2),
            heartbeat_interval: Duration::from_millis(150),
            liveness_interval: Duration::from_millis(150),
        }
    }

    /// Minimal in-process stand-in for the virtual-HID service: acknowledges
    /// device inits and records every frame it receives.
    struct FakeService {
        frames: Arc<Mutex<Vec<Vec<u8>>>>,
        stop: Arc<AtomicBool>,
        handle: Option<JoinHandle<()>>,
    }

    impl FakeService {
        fn spawn(socket_path: &Path) -> Self {
            let socket = UnixDatagram::bind(socket_path).unwrap();
            socket
                .set_read_timeout(Some(Duration::from_millis(50)))
                .unwrap();
            let frames: Arc<Mutex<Vec<Vec<u8>>>> = Arc::default();
            let stop = Arc::new(AtomicBool::new(false));
            let frames_in = Arc::clone(&frames);
            let stop_in = Arc::clone(&stop);
            let handle = thread::spawn(move || {
                let mut buf = [0u8; 256];
                while !stop_in.load(Ordering::Acquire) {
                    let (n, peer): (usize, SocketAddr) = match socket.recv_from(&mut buf) {
                        Ok(pair) => pair,
                        Err(_) => continue,
                    };
                    let frame = buf[..n].to_vec();
                    let ack = match frame.as_slice() {
                        [0x01, b'c', b'p', _, _, 1, ..] => Some(4u8),
                        [0x01, b'c', b'p', _, _, 4, ..] => Some(5u8),
                        _ => None,
                    };
                    if let (Some(ack), Some(path)) = (ack, peer.as_pathname()) {
                        let _ = socket.send_to(&[ack], path);
                    }
                    frames_in.lock().unwrap().push(frame);
                }
            });
            Self {
                frames,
                stop,
                handle: Some(handle),
            }
        }

        fn frames(&self) -> Vec<Vec<u8>> {
            self.frames.lock().unwrap().clone()
        }
    }

    impl Drop for FakeService {
        fn drop(&mut self) {
            self.stop.store(true, Ordering::Release);
            if let Some(handle) = self.handle.take() {
                let _ = handle.join();
            }
        }
    }

    fn wait_until(mut cond: impl FnMut() -> bool, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if cond() {
                return true;
            }
            thread::sleep(Duration::from_millis(20));
        }
        cond()
    }

    #[test]
    fn connects_initializes_and_posts_reports() {
        let tmp = tempfile::tempdir().unwrap();
        let server_dir = tmp.path().join("vhidd_server");
        std::fs::create_dir_all(&server_dir).unwrap();
        let service = FakeService::spawn(&server_dir.join("1234.sock"));

        let client = HidClient::connect_with(&server_dir, short_options()).unwrap();
        assert!(client.keyboard_ready());
        assert!(client.pointing_ready());
        assert_eq!(client.state(), ConnectionState::Ready);

        client
            .post_pointing(&PointingReport::movement(1, 0))
            .unwrap();
        client.post_keyboard(&KeyboardReport::release()).unwrap();

        assert!(wait_until(
            || {
                let frames = service.frames();
                frames.iter().any(|f| f.get(5) == Some(&12)) && frames.iter().any(|f| f.get(5) == Some(&7))
            },
            Duration::from_secs(1)
        ));
        let frames = service.frames();
        // First frame on the wire is the heartbeat.
        assert_eq!(frames[0][0], 0x00);
        let pointing = frames.iter().find(|f| f.get(5) == Some(&12)).unwrap();
        assert_eq!(pointing.len(), 6 + 8);
        let keyboard = frames.iter().find(|f| f.get(5) == Some(&7)).unwrap();
        assert_eq!(keyboard.len(), 6 + 67);

        client.shutdown();
    }

    #[test]
    fn missing_service_directory_is_fatal() {
        let tmp = tempfile::tempdir().unwrap();
        let err = HidClient::connect_with(tmp.path().join("nowhere"), short_options())
            .err()
            .expect("connect should fail");
        assert!(matches!(err, WireError::ServiceNotFound(_)));
    }

    #[test]
    fn unacknowledged_devices_degrade_not_fail() {
        let tmp = tempfile::tempdir().unwrap();
        let server_dir = tmp.path().join("vhidd_server");
        std::fs::create_dir_all(&server_dir).unwrap();
        // A bound socket that never answers.
        let _mute = UnixDatagram::bind(server_dir.join("mute.sock")).unwrap();

        let options = ClientOptions {
            readiness_timeout: Duration::from_millis(300),
            ..short_options()
        };
        let client = HidClient::connect_with(&server_dir, options).unwrap();
        assert_eq!(client.state(), ConnectionState::Connecting);
        assert!(matches!(
            client.post_keyboard(&KeyboardReport::release()),
            Err(WireError::KeyboardNotReady)
        ));
        assert!(matches!(
            client.post_pointing(&PointingReport::movement(0, 1)),
            Err(WireError::PointingNotReady)
        ));
        client.shutdown();
    }

    #[test]
    fn liveness_tears_down_and_reinitializes() {
        let tmp = tempfile::tempdir().unwrap();
        let server_dir = tmp.path().join("vhidd_server");
        std::fs::create_dir_all(&server_dir).unwrap();
        let socket_path = server_dir.join("2222.sock");
        let service = FakeService::spawn(&socket_path);

        let client = HidClient::connect_with(&server_dir, short_options()).unwrap();
        assert_eq!(client.state(), ConnectionState::Ready);

        // Service goes away: client must notice and drop readiness.
        drop(service);
        std::fs::remove_file(&socket_path).unwrap();
        assert!(wait_until(
            || client.state() == ConnectionState::Disconnected,
            Duration::from_secs(2)
        ));
        assert!(matches!(
            client.post_pointing(&PointingReport::movement(1, 1)),
            Err(WireError::PointingNotReady)
        ));

        // Service returns under a new socket: full re-init from scratch.
        let revived = FakeService::spawn(&server_dir.join("3333.sock"));
        assert!(wait_until(
            || client.state() == ConnectionState::Ready,
            Duration::from_secs(3)
        ));
        // The revived service saw fresh init requests.
        assert!(revived.frames().iter().any(|f| f.get(5) == Some(&1)));
        assert!(revived.frames().iter().any(|f| f.get(5) == Some(&4)));

        client.shutdown();
    }

    #[test]
    fn heartbeats_repeat() {
        let tmp = tempfile::tempdir().unwrap();
        let server_dir = tmp.path().join("vhidd_server");
        std::fs::create_dir_all(&server_dir).unwrap();
        let service = FakeService::spawn(&server_dir.join("4.sock"));

        let client = HidClient::connect_with(&server_dir, short_options()).unwrap();
        assert!(wait_until(
            || {
                service
                    .frames()
                    .iter()
                    .filter(|f| f.first() == Some(&0x00))
                    .count()
                    >= 3
            },
            Duration::from_secs(2)
        ));
        let heartbeat = service
            .frames()
            .into_iter()
            .find(|f| f.first() == Some(&0x00))
            .unwrap();
        assert_eq!(heartbeat, frame::heartbeat(HEARTBEAT_DEADLINE_MS).to_vec());
        client.shutdown();
    }
}
