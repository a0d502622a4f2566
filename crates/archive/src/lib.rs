//! Streaming tar packaging for stockpile cache entries
//!
//! `pack` turns a file or directory into a single readable byte stream and
//! `extract` turns such a stream back into a directory tree. Both sides run
//! the blocking `tar` codec on a dedicated blocking thread and bridge it to
//! async callers through a bounded duplex pipe, so bytes are produced only
//! as fast as the consumer takes them and no archive is ever buffered in
//! memory whole.

mod error;

pub use error::{Error, Result};

use futures::ready;
use std::fs;
use std::future::Future;
use std::io::Read;
use std::path::Path;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, DuplexStream, ReadBuf};
use tokio::task::JoinHandle;
use tokio_util::io::SyncIoBridge;
use tracing::debug;

/// Capacity of the in-flight pipe between the tar codec and the consumer
const DUPLEX_BUFFER: usize = 64 * 1024;

/// A single-consumer byte stream carrying a tar archive.
///
/// Produced by [`pack`]. The stream owns the blocking producer task; if the
/// codec fails mid-archive, the failure surfaces to the reader as an I/O
/// error at end of stream instead of being silently truncated.
#[derive(Debug)]
pub struct ArchiveStream {
    reader: DuplexStream,
    producer: Option<JoinHandle<Result<()>>>,
}

impl AsyncRead for ArchiveStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        let this = self.get_mut();
        if buf.remaining() == 0 {
            return Poll::Ready(Ok(()));
        }
        let before = buf.filled().len();
        ready!(Pin::new(&mut this.reader).poll_read(cx, buf))?;
        if buf.filled().len() > before {
            return Poll::Ready(Ok(()));
        }
        // Pipe is at end of stream; surface any producer failure before
        // reporting a clean EOF.
        if let Some(handle) = this.producer.as_mut() {
            let joined = ready!(Pin::new(handle).poll(cx));
            this.producer = None;
            match joined {
                Ok(Ok(())) => {}
                Ok(Err(e)) => return Poll::Ready(Err(std::io::Error::other(e))),
                Err(e) => return Poll::Ready(Err(std::io::Error::other(e))),
            }
        }
        Poll::Ready(Ok(()))
    }
}

/// Package a file or directory as a streaming tar archive.
///
/// A directory is archived with entry paths relative to its root; a single
/// file becomes a one-entry archive named by the file's base name.
///
/// Fails fast with [`Error::TargetNotFound`] when `target` does not exist
/// and [`Error::EmptyTarget`] when it is a directory with no entries, both
/// before any bytes are produced.
///
/// Must be called within a tokio runtime; the tar codec runs on a blocking
/// thread and writes into the returned stream with backpressure.
pub fn pack(target: &Path) -> Result<ArchiveStream> {
    let meta = fs::metadata(target).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            Error::target_not_found(target)
        } else {
            Error::io(e, target, "stat")
        }
    })?;

    let is_dir = meta.is_dir();
    if is_dir {
        let mut entries = fs::read_dir(target).map_err(|e| Error::io(e, target, "read_dir"))?;
        if entries.next().is_none() {
            return Err(Error::empty_target(target));
        }
    }

    debug!(target = %target.display(), is_dir, "packing archive");
    let (writer, reader) = tokio::io::duplex(DUPLEX_BUFFER);
    let target = target.to_path_buf();
    let producer = tokio::task::spawn_blocking(move || pack_into(&target, is_dir, writer));

    Ok(ArchiveStream {
        reader,
        producer: Some(producer),
    })
}

/// Blocking half of `pack`: drive the tar builder into the pipe.
fn pack_into(target: &Path, is_dir: bool, writer: DuplexStream) -> Result<()> {
    let bridge = SyncIoBridge::new(writer);
    let mut builder = tar::Builder::new(bridge);
    builder.follow_symlinks(false);

    if is_dir {
        builder
            .append_dir_all(".", target)
            .map_err(|e| Error::io(e, target, "pack"))?;
    } else {
        let name = target.file_name().ok_or_else(|| {
            Error::io(
                std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    "target path has no file name",
                ),
                target,
                "pack",
            )
        })?;
        builder
            .append_path_with_name(target, name)
            .map_err(|e| Error::io(e, target, "pack"))?;
    }

    let mut bridge = builder
        .into_inner()
        .map_err(|e| Error::io(e, target, "pack"))?;
    bridge
        .shutdown()
        .map_err(|e| Error::io(e, target, "pack"))?;
    Ok(())
}

/// Extract a tar archive stream into `destination`, creating it if absent.
///
/// Returns the number of bytes consumed from the stream (the transfer size
/// of the archive). Upstream read errors propagate unchanged.
pub async fn extract<R>(stream: R, destination: &Path) -> Result<u64>
where
    R: AsyncRead + Send + Unpin + 'static,
{
    let destination = destination.to_path_buf();
    tokio::task::spawn_blocking(move || {
        fs::create_dir_all(&destination).map_err(|e| Error::io(e, &destination, "create_dir_all"))?;

        let mut counter = CountingReader::new(SyncIoBridge::new(stream));
        let mut archive = tar::Archive::new(&mut counter);
        archive
            .unpack(&destination)
            .map_err(|e| Error::io(e, &destination, "unpack"))?;

        let bytes = counter.bytes_read();
        debug!(destination = %destination.display(), bytes, "extracted archive");
        Ok(bytes)
    })
    .await
    .map_err(|e| Error::interrupted(e.to_string()))?
}

/// Blocking reader wrapper that counts bytes as they pass through
struct CountingReader<R> {
    inner: R,
    count: u64,
}

impl<R> CountingReader<R> {
    fn new(inner: R) -> Self {
        Self { inner, count: 0 }
    }

    fn bytes_read(&self) -> u64 {
        self.count
    }
}

impl<R: Read> Read for CountingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.count += n as u64;
        Ok(n)
    }
}
