//! Control socket preparation.
//!
//! The RPC server listens on a Unix socket at a fixed path. A previous run may have left
//! the file behind, so binding first removes whatever is at the path.

use std::io;
use std::path::{Path, PathBuf};

use tokio::net::UnixListener;
use tracing::{debug, info, warn};

/// A bound control socket. The socket file is removed when this is dropped.
#[derive(Debug)]
pub struct ControlSocket {
    listener: UnixListener,
    path: PathBuf,
}

impl ControlSocket {
    pub fn listener(&self) -> &UnixListener {
        &self.listener
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ControlSocket {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "removed control socket"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %self.path.display(), error = %e, "could not remove control socket"),
        }
    }
}

/// Removes a stale socket file at `path` and binds a fresh listener there.
///
/// Must be called from within a Tokio runtime.
pub fn bind_control_socket(path: impl AsRef<Path>) -> io::Result<ControlSocket> {
    let path = path.as_ref();
    match std::fs::remove_file(path) {
        Ok(()) => debug!(path = %path.display(), "removed stale control socket"),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(e),
    }

    let listener = UnixListener::bind(path)?;
    info!(path = %path.display(), "control socket listening");
    Ok(ControlSocket {
        listener,
        path: path.to_path_buf(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::UnixStream;

    #[tokio::test]
    async fn replaces_a_stale_file_and_cleans_up() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("coagent.sock");
        std::fs::write(&path, b"left over").expect("stale file");

        let socket = bind_control_socket(&path).expect("bind");
        assert_eq!(socket.path(), path.as_path());

        let mut client = UnixStream::connect(&path).await.expect("connect");
        let (mut server, _) = socket.listener().accept().await.expect("accept");
        client.write_all(b"ping").await.unwrap();
        let mut buf = [0u8; 4];
        server.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"ping");

        drop(socket);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn rebinding_the_same_path_succeeds() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("coagent.sock");

        // A crashed run leaves its socket file behind.
        drop(std::os::unix::net::UnixListener::bind(&path).expect("first bind"));
        assert!(path.exists());

        let second = bind_control_socket(&path).expect("rebind over stale socket");
        assert!(second.path().exists());
    }
}
