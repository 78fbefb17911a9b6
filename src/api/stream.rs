//! Cancellable byte stream of one answer

use super::ApiError;
use futures::stream::BoxStream;
use futures::StreamExt;
use tokio_util::sync::CancellationToken;

pub type ByteStream = BoxStream<'static, Result<Vec<u8>, ApiError>>;

/// An open answer body. Dropping or closing it releases the connection.
pub struct ResponseStream {
    inner: Option<ByteStream>,
    cancel: CancellationToken,
}

impl ResponseStream {
    pub fn new(inner: ByteStream) -> Self {
        Self::with_cancel(inner, CancellationToken::new())
    }

    /// Tie the stream to an outside token, typically a child of a shutdown token
    pub fn with_cancel(inner: ByteStream, cancel: CancellationToken) -> Self {
        Self {
            inner: Some(inner),
            cancel,
        }
    }

    /// Next chunk, or `None` once the body ends, is closed or is cancelled.
    pub async fn next_chunk(&mut self) -> Option<Result<Vec<u8>, ApiError>> {
        let polled = {
            let inner = self.inner.as_mut()?;
            tokio::select! {
                biased;
                () = self.cancel.cancelled() => None,
                item = inner.next() => Some(item),
            }
        };

        match polled {
            Some(Some(item)) => Some(item),
            // Body exhausted or cancelled; release it either way
            Some(None) | None => {
                self.inner = None;
                None
            }
        }
    }

    /// Stop reading and drop the body
    pub fn close(&mut self) {
        self.cancel.cancel();
        self.inner = None;
    }

    pub fn is_closed(&self) -> bool {
        self.inner.is_none()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

impl std::fmt::Debug for ResponseStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseStream")
            .field("closed", &self.is_closed())
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}
