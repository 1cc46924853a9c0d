//! Listening-socket setup and peer credentials.
//!
//! Setup order matters: unlink any stale socket file, bind, then set
//! ownership and mode before the first accept. With no console user the
//! file gets mode 0000 and the daemon keeps accepting; nothing is permitted
//! until someone logs in and a fresh resolve succeeds. The listen backlog is
//! deliberately tiny since only one client is ever serviced.

use std::io;
use std::os::fd::FromRawFd;
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

const LISTEN_BACKLOG: libc::c_int = 4;

/// Bind the helper socket at `path` and restrict it to `console_uid`.
pub fn setup_listener(path: &Path, console_uid: Option<u32>) -> Result<UnixListener> {
    if path.exists() {
        std::fs::remove_file(path)
            .with_context(|| format!("unlink stale socket {}", path.display()))?;
    }

    let listener =
        bind_with_backlog(path).with_context(|| format!("bind {}", path.display()))?;

    match console_uid {
        Some(uid) => {
            chown(path, uid).with_context(|| format!("chown {} to {uid}", path.display()))?;
            set_mode(path, 0o600)?;
            info!(target: "daemon", socket = %path.display(), uid, "socket_bound");
        }
        None => {
            // Nobody at the console: close the door until someone logs in.
            set_mode(path, 0o000)?;
            info!(target: "daemon", socket = %path.display(), "socket_bound_no_console_user");
        }
    }
    Ok(listener)
}

fn bind_with_backlog(path: &Path) -> io::Result<UnixListener> {
    use std::os::unix::ffi::OsStrExt;

    let bytes = path.as_os_str().as_bytes();
    let mut addr: libc::sockaddr_un = unsafe { std::mem::zeroed() };
    addr.sun_family = libc::AF_UNIX as libc::sa_family_t;
    if bytes.len() >= addr.sun_path.len() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "socket path too long",
        ));
    }
    for (dst, src) in addr.sun_path.iter_mut().zip(bytes) {
        *dst = *src as libc::c_char;
    }

    let fd = unsafe { libc::socket(libc::AF_UNIX, libc::SOCK_STREAM, 0) };
    if fd < 0 {
        return Err(io::Error::last_os_error());
    }
    let len = std::mem::size_of::<libc::sockaddr_un>() as libc::socklen_t;
    let rc = unsafe { libc::bind(fd, (&raw const addr).cast(), len) };
    if rc != 0 {
        let err = io::Error::last_os_error();
        unsafe { libc::close(fd) };
        return Err(err);
    }
    let rc = unsafe { libc::listen(fd, LISTEN_BACKLOG) };
    if rc != 0 {
        let err = io::Error::last_os_error();
        unsafe { libc::close(fd) };
        return Err(err);
    }
    Ok(unsafe { UnixListener::from_raw_fd(fd) })
}

fn chown(path: &Path, uid: u32) -> io::Result<()> {
    use std::os::unix::ffi::OsStrExt;

    let c_path = std::ffi::CString::new(path.as_os_str().as_bytes())
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "path contains NUL"))?;
    // Group left unchanged.
    let rc = unsafe { libc::chown(c_path.as_ptr(), uid as libc::uid_t, !0) };
    if rc != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

fn set_mode(path: &Path, mode: u32) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))
        .with_context(|| format!("chmod {:o} {}", mode, path.display()))
}

/// Effective uid of the peer on an accepted connection.
pub fn peer_uid(stream: &UnixStream) -> io::Result<u32> {
    use std::os::fd::AsRawFd;
    let fd = stream.as_raw_fd();

    #[cfg(target_os = "macos")]
    {
        let mut uid: libc::uid_t = 0;
        let mut gid: libc::gid_t = 0;
        let rc = unsafe { libc::getpeereid(fd, &mut uid, &mut gid) };
        if rc != 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(uid)
    }

    #[cfg(target_os = "linux")]
    {
        let mut cred: libc::ucred = unsafe { std::mem::zeroed() };
        let mut len = std::mem::size_of::<libc::ucred>() as libc::socklen_t;
        let rc = unsafe {
            libc::getsockopt(
                fd,
                libc::SOL_SOCKET,
                libc::SO_PEERCRED,
                (&raw mut cred).cast(),
                &mut len,
            )
        };
        if rc != 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(cred.uid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;

    #[test]
    fn binds_and_replaces_stale_socket() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("helper.sock");
        // A stale file from a previous run must not block startup.
        std::fs::write(&path, b"stale").unwrap();
        let listener = setup_listener(&path, None).unwrap();
        drop(listener);
        // And a real leftover socket file gets replaced too.
        let listener = setup_listener(&path, None).unwrap();
        drop(listener);
    }

    #[test]
    fn no_console_user_means_no_access_mode() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("helper.sock");
        let _listener = setup_listener(&path, None).unwrap();
        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o000);
    }

    #[test]
    fn console_user_gets_owner_only_mode() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("helper.sock");
        // Chown to our own uid so the test does not need privileges.
        let uid = unsafe { libc::geteuid() } as u32;
        let _listener = setup_listener(&path, Some(uid)).unwrap();
        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn peer_uid_reports_our_own_uid_over_a_pair() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("helper.sock");
        let listener = setup_listener(&path, Some(unsafe { libc::geteuid() } as u32)).unwrap();
        let client = UnixStream::connect(&path).unwrap();
        let (server_side, _) = listener.accept().unwrap();
        let uid = peer_uid(&server_side).unwrap();
        assert_eq!(uid, unsafe { libc::geteuid() } as u32);
        drop(client);
    }
}
