//! Read/write handles and the release contract that bounds their lifetime.
//!
//! An adapter hands out either a direct file handle or an arbitrary stream,
//! always paired with a [`ReleaseGuard`]. The guard's callback runs exactly
//! once: when [`ReleaseGuard::release`] is called, or when the guard is
//! dropped on an early return or cancellation.

use std::fmt;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

type ReleaseFn = Box<dyn FnOnce() + Send + 'static>;

/// Runs a release callback exactly once.
pub struct ReleaseGuard {
    release: Option<ReleaseFn>,
}

impl ReleaseGuard {
    /// Guard that runs `release` once.
    #[must_use]
    pub fn new(release: impl FnOnce() + Send + 'static) -> Self {
        Self {
            release: Some(Box::new(release)),
        }
    }

    /// Guard with nothing to release.
    #[must_use]
    pub const fn noop() -> Self {
        Self { release: None }
    }

    /// Run the callback now.
    pub fn release(mut self) {
        self.fire();
    }

    fn fire(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl Drop for ReleaseGuard {
    fn drop(&mut self) {
        self.fire();
    }
}

impl fmt::Debug for ReleaseGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReleaseGuard")
            .field("pending", &self.release.is_some())
            .finish()
    }
}

/// A handle paired with its release guard.
#[derive(Debug)]
pub struct Opened<H> {
    /// The readable or writable handle.
    pub handle: H,
    /// Release guard for resources backing the handle.
    pub release: ReleaseGuard,
}

impl<H> Opened<H> {
    /// Pair a handle with a guard that has nothing to release.
    #[must_use]
    pub fn direct(handle: H) -> Self {
        Self {
            handle,
            release: ReleaseGuard::noop(),
        }
    }

    /// Pair a handle with a release callback.
    #[must_use]
    pub fn with_release(handle: H, release: impl FnOnce() + Send + 'static) -> Self {
        Self {
            handle,
            release: ReleaseGuard::new(release),
        }
    }
}

/// Readable side of a transfer.
pub enum ReadHandle {
    /// Direct local file handle.
    File(File),
    /// Backend-provided streaming reader.
    Stream(Box<dyn AsyncRead + Send + Unpin>),
}

/// Writable side of a transfer.
pub enum WriteHandle {
    /// Direct local file handle.
    File(File),
    /// Backend-provided streaming writer.
    Stream(Box<dyn AsyncWrite + Send + Unpin>),
}

impl fmt::Debug for ReadHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File(_) => f.write_str("ReadHandle::File"),
            Self::Stream(_) => f.write_str("ReadHandle::Stream"),
        }
    }
}

impl fmt::Debug for WriteHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File(_) => f.write_str("WriteHandle::File"),
            Self::Stream(_) => f.write_str("WriteHandle::Stream"),
        }
    }
}

impl AsyncRead for ReadHandle {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::File(file) => Pin::new(file).poll_read(cx, buf),
            Self::Stream(stream) => Pin::new(stream).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for WriteHandle {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            Self::File(file) => Pin::new(file).poll_write(cx, buf),
            Self::Stream(stream) => Pin::new(stream).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::File(file) => Pin::new(file).poll_flush(cx),
            Self::Stream(stream) => Pin::new(stream).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::File(file) => Pin::new(file).poll_shutdown(cx),
            Self::Stream(stream) => Pin::new(stream).poll_shutdown(cx),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_guard() -> (ReleaseGuard, Arc<AtomicUsize>) {
        let count = Arc::new(AtomicUsize::new(0));
        let observed = Arc::clone(&count);
        let guard = ReleaseGuard::new(move || {
            observed.fetch_add(1, Ordering::SeqCst);
        });
        (guard, count)
    }

    #[test]
    fn explicit_release_runs_once() {
        let (guard, count) = counting_guard();
        guard.release();
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn dropping_an_unreleased_guard_runs_the_callback() {
        let (guard, count) = counting_guard();
        {
            let _opened = Opened {
                handle: (),
                release: guard,
            };
        }
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn noop_guard_is_not_pending() {
        let guard = ReleaseGuard::noop();
        assert_eq!(format!("{guard:?}"), "ReleaseGuard { pending: false }");
    }
}
