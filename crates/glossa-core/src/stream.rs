use std::pin::Pin;
use std::task::{Context, Poll};

use futures::StreamExt as _;
use futures::stream::BoxStream;

use crate::errors::SessionError;

/// Chunks produced by [`crate::SessionManager::stream_operation`].
///
/// The stream is finite and not restartable. A cancelled operation simply
/// ends; a failed one yields a single `Err` and then ends.
pub struct OperationStream {
    inner: BoxStream<'static, Result<String, SessionError>>,
}

impl OperationStream {
    pub(crate) fn new(inner: BoxStream<'static, Result<String, SessionError>>) -> Self {
        Self { inner }
    }

    /// A stream that ends immediately, used for operations cancelled before
    /// their first chunk.
    pub(crate) fn finished() -> Self {
        Self::new(futures::stream::empty().boxed())
    }

    /// Drains the stream and concatenates every chunk.
    ///
    /// A cancelled operation returns the text received before cancellation.
    pub async fn collect_text(mut self) -> Result<String, SessionError> {
        let mut out = String::new();
        while let Some(chunk) = self.inner.next().await {
            out.push_str(&chunk?);
        }
        Ok(out)
    }
}

impl futures::Stream for OperationStream {
    type Item = Result<String, SessionError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.as_mut().poll_next(cx)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl std::fmt::Debug for OperationStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OperationStream").finish_non_exhaustive()
    }
}
