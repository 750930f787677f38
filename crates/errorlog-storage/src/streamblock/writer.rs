//! Block writer

use bytes::BytesMut;
use tokio::io::{AsyncWrite, AsyncWriteExt};

use super::codec::{END_BYTE, START_BYTE, escape_into};
use crate::error::StreamBlockError;

/// Writes framed blocks to a sink
///
/// Each block is written with a single `write_all` so concurrent appenders
/// sharing a lock never interleave partial frames.
pub struct BlockWriter<W> {
    inner: W,
    scratch: BytesMut,
}

impl<W: AsyncWrite + Unpin> BlockWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            scratch: BytesMut::new(),
        }
    }

    /// Frame and write one block, returning the number of bytes written
    pub async fn write_block(&mut self, payload: &[u8]) -> Result<usize, StreamBlockError> {
        self.scratch.clear();
        self.scratch.reserve(payload.len() + 2);
        self.scratch.extend_from_slice(&[START_BYTE]);
        escape_into(payload, &mut self.scratch);
        self.scratch.extend_from_slice(&[END_BYTE]);

        self.inner.write_all(&self.scratch).await?;
        Ok(self.scratch.len())
    }

    /// Write a lone `END` byte, closing a block left open by a failed write
    ///
    /// The bytes of the interrupted frame then read back as one block of
    /// their own instead of absorbing the next frame.
    pub async fn seal(&mut self) -> Result<usize, StreamBlockError> {
        self.inner.write_all(&[END_BYTE]).await?;
        Ok(1)
    }

    pub async fn flush(&mut self) -> Result<(), StreamBlockError> {
        self.inner.flush().await?;
        Ok(())
    }

    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    pub fn get_mut(&mut self) -> &mut W {
        &mut self.inner
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}
