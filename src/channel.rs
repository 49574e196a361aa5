//! FIFO-backed intercept channels.
//!
//! Each mocked command owns one named pipe. The harness keeps a write end open
//! for the whole run so the listener only sees end-of-stream once the harness
//! lets go, after the script has exited. Without it the listener would hit
//! EOF as soon as the first shim closed its end and later calls would block on
//! a pipe nobody reads.

use crate::error::{HarnessError, Result};
use crate::recorder::{ArgumentVector, decode_records};
use std::ffi::CString;
use std::fs::{File, OpenOptions};
use std::io::{self, Read};
use std::os::fd::AsRawFd;
use std::os::unix::ffi::OsStrExt;
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};
use std::thread::{self, JoinHandle};
use tracing::debug;

type Listener = JoinHandle<io::Result<Vec<ArgumentVector>>>;

#[derive(Debug)]
pub struct InterceptChannel {
    command: String,
    path: PathBuf,
    keepalive: Option<File>,
    listener: Option<Listener>,
}

impl InterceptChannel {
    /// Create the FIFO at `path` and start its listener.
    pub fn open(command: &str, path: &Path) -> Result<Self> {
        make_fifo(path)
            .map_err(|err| HarnessError::setup(format!("mkfifo {}", path.display()), err))?;

        // Non-blocking so the open returns without a writer present.
        let reader = OpenOptions::new()
            .read(true)
            .custom_flags(libc::O_NONBLOCK)
            .open(path)
            .map_err(|err| {
                HarnessError::setup(format!("open read end of {}", path.display()), err)
            })?;
        let keepalive = OpenOptions::new().write(true).open(path).map_err(|err| {
            HarnessError::setup(format!("open write end of {}", path.display()), err)
        })?;
        set_blocking(&reader)
            .map_err(|err| HarnessError::setup(format!("configure {}", path.display()), err))?;

        let name = command.to_string();
        let listener = thread::Builder::new()
            .name(format!("pipemock-{command}"))
            .spawn(move || listen(&name, reader))
            .map_err(|err| HarnessError::setup(format!("spawn listener for {command}"), err))?;

        Ok(Self {
            command: command.to_string(),
            path: path.to_path_buf(),
            keepalive: Some(keepalive),
            listener: Some(listener),
        })
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_settled(&self) -> bool {
        self.listener.is_none()
    }

    /// Release the harness write end and wait for the listener to drain.
    ///
    /// Only call once no shim can still be writing, otherwise this blocks
    /// until the last writer closes. Returns an empty list when already
    /// settled.
    pub fn settle(&mut self) -> Result<Vec<ArgumentVector>> {
        self.keepalive.take();
        let Some(listener) = self.listener.take() else {
            return Ok(Vec::new());
        };
        match listener.join() {
            Ok(result) => result.map_err(|source| HarnessError::Listener {
                command: self.command.clone(),
                source,
            }),
            Err(_) => Err(HarnessError::Listener {
                command: self.command.clone(),
                source: io::Error::other("listener thread panicked"),
            }),
        }
    }

    /// Drop the harness write end without joining the listener.
    pub fn detach(&mut self) {
        self.keepalive.take();
        self.listener.take();
    }
}

impl Drop for InterceptChannel {
    fn drop(&mut self) {
        self.detach();
    }
}

/// Block on the read end until every writer is gone, then decode.
fn listen(command: &str, mut reader: File) -> io::Result<Vec<ArgumentVector>> {
    let mut buffer = Vec::new();
    reader.read_to_end(&mut buffer)?;
    let calls = decode_records(&buffer);
    for call in &calls {
        debug!(command, call = %call, "intercepted call");
    }
    Ok(calls)
}

fn make_fifo(path: &Path) -> io::Result<()> {
    let raw = CString::new(path.as_os_str().as_bytes())
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "path contains NUL byte"))?;
    let rc = unsafe { libc::mkfifo(raw.as_ptr(), 0o600) };
    if rc != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

fn set_blocking(file: &File) -> io::Result<()> {
    let fd = file.as_raw_fd();
    let flags = unsafe { libc::fcntl(fd, libc::F_GETFL) };
    if flags < 0 {
        return Err(io::Error::last_os_error());
    }
    let rc = unsafe { libc::fcntl(fd, libc::F_SETFL, flags & !libc::O_NONBLOCK) };
    if rc < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recorder::encode_record;
    use std::io::Write;
    use std::os::unix::fs::FileTypeExt;
    use tempfile::TempDir;

    #[test]
    fn open_creates_a_fifo() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("chown");
        let mut channel = InterceptChannel::open("chown", &path).expect("channel");
        let meta = std::fs::metadata(&path).expect("metadata");
        assert!(meta.file_type().is_fifo());
        assert!(channel.settle().expect("settle").is_empty());
    }

    #[test]
    fn settle_collects_writes_from_several_writers() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("chown");
        let mut channel = InterceptChannel::open("chown", &path).expect("channel");

        for owner in ["root:root", "root:root", "a:b"] {
            let mut writer = OpenOptions::new()
                .append(true)
                .open(&path)
                .expect("writer");
            writer
                .write_all(&encode_record(&["chown", owner, "/tmp/f"]))
                .expect("write");
        }

        let calls = channel.settle().expect("settle");
        assert_eq!(calls.len(), 3);
        assert_eq!(calls[0], calls[1]);
        assert_eq!(calls[2].args(), &["a:b", "/tmp/f"]);
        assert!(channel.is_settled());
        assert!(channel.settle().expect("second settle").is_empty());
    }

    #[test]
    fn existing_path_is_a_setup_error() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("chown");
        std::fs::write(&path, b"").expect("write");
        let err = InterceptChannel::open("chown", &path).expect_err("must fail");
        assert!(matches!(err, HarnessError::Setup { .. }));
    }
}
