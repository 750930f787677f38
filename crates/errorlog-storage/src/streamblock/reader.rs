//! Block readers
//!
//! [`BlockReader`] extracts framed blocks from a byte source. Constructed
//! with [`BlockReader::new`] it reads forward only. Constructed with
//! [`BlockReader::seekable`] over a random-access source it can also walk
//! backward from the end of storage, one block per call, without an index.
//!
//! The reader keeps a single logical cursor. Forward reads consume bytes at
//! the cursor; backward reads consume the bytes just before it. Backward
//! reads are served from chunks loaded in reverse, so stepping back costs a
//! seek per chunk rather than per byte.

use std::io::SeekFrom;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncSeek, AsyncSeekExt};

use super::codec::{unescape_block, END_BYTE, START_BYTE};
use crate::error::StreamBlockError;

/// Size of each buffered read from the underlying source
pub const READ_CHUNK_SIZE: usize = 8192;

/// Reads framed blocks from a stream
///
/// Invariant: the underlying source is always positioned at the end of the
/// buffered window, `buf_start + buf.len()`, and `buf_start <= pos <=
/// buf_start + buf.len()`.
pub struct BlockReader<R> {
    inner: R,
    seekable: bool,
    /// Buffered window of the source
    buf: Vec<u8>,
    /// Absolute offset of `buf[0]`
    buf_start: u64,
    /// Logical cursor
    pos: u64,
}

impl<R> BlockReader<R> {
    /// Absolute offset of the cursor
    pub fn position(&self) -> u64 {
        self.pos
    }

    /// Whether this reader was constructed for random access
    pub fn is_seekable(&self) -> bool {
        self.seekable
    }

    pub fn get_ref(&self) -> &R {
        &self.inner
    }

    pub fn into_inner(self) -> R {
        self.inner
    }

    fn buf_end(&self) -> u64 {
        self.buf_start + self.buf.len() as u64
    }

    fn reset_window(&mut self, at: u64) {
        self.buf.clear();
        self.buf_start = at;
        self.pos = at;
    }
}

impl<R: AsyncRead + Unpin> BlockReader<R> {
    /// Create a forward-only reader
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            seekable: false,
            buf: Vec::with_capacity(READ_CHUNK_SIZE),
            buf_start: 0,
            pos: 0,
        }
    }

    /// Read the next block at or after the cursor
    ///
    /// Bytes before the next `START` are skipped. Returns
    /// [`StreamBlockError::EndOfStream`] if the source ends before a complete
    /// block; a partial trailing block is discarded.
    pub async fn read_block(&mut self) -> Result<Vec<u8>, StreamBlockError> {
        while self.next_byte().await? != START_BYTE {}

        let mut raw = Vec::new();
        loop {
            let b = self.next_byte().await?;
            if b == END_BYTE {
                break;
            }
            raw.push(b);
        }
        Ok(unescape_block(&raw))
    }

    async fn next_byte(&mut self) -> Result<u8, StreamBlockError> {
        if self.pos >= self.buf_end() {
            self.fill_forward().await?;
        }
        let b = self.buf[(self.pos - self.buf_start) as usize];
        self.pos += 1;
        Ok(b)
    }

    /// Replace the window with the next chunk following it
    async fn fill_forward(&mut self) -> Result<(), StreamBlockError> {
        let start = self.buf_end();
        self.buf.resize(READ_CHUNK_SIZE, 0);
        let n = match self.inner.read(&mut self.buf).await {
            Ok(n) => n,
            Err(e) => {
                self.reset_window(start);
                return Err(e.into());
            }
        };
        self.buf.truncate(n);
        self.buf_start = start;
        if n == 0 {
            return Err(StreamBlockError::EndOfStream);
        }
        Ok(())
    }
}

impl<R: AsyncRead + AsyncSeek + Unpin> BlockReader<R> {
    /// Create a reader that can also seek and read backward
    ///
    /// `inner` must be positioned at offset 0. Use
    /// [`read_last_block`](Self::read_last_block) or
    /// [`seek_from_end`](Self::seek_from_end) to move to the end.
    pub fn seekable(inner: R) -> Self {
        Self {
            seekable: true,
            ..Self::new(inner)
        }
    }

    /// Move the cursor to the beginning of storage
    pub async fn rewind(&mut self) -> Result<(), StreamBlockError> {
        self.ensure_seekable()?;
        self.inner.seek(SeekFrom::Start(0)).await?;
        self.reset_window(0);
        Ok(())
    }

    /// Move the cursor to an absolute offset
    pub async fn seek_to(&mut self, offset: u64) -> Result<(), StreamBlockError> {
        self.ensure_seekable()?;
        self.inner.seek(SeekFrom::Start(offset)).await?;
        self.reset_window(offset);
        Ok(())
    }

    /// Move the cursor to the end of storage and return the storage length
    pub async fn seek_to_end(&mut self) -> Result<u64, StreamBlockError> {
        self.ensure_seekable()?;
        let len = self.inner.seek(SeekFrom::End(0)).await?;
        self.reset_window(len);
        Ok(len)
    }

    /// Read the last complete block in storage
    ///
    /// Leaves the cursor just before that block's `START`.
    pub async fn read_last_block(&mut self) -> Result<Vec<u8>, StreamBlockError> {
        self.seek_to_end().await?;
        self.read_previous_block().await
    }

    /// Read the block ending at or before the cursor
    ///
    /// Leaves the cursor on that block's `START` byte, so repeated calls
    /// walk backward through storage. Returns
    /// [`StreamBlockError::EndOfStream`] at the beginning of storage.
    pub async fn read_previous_block(&mut self) -> Result<Vec<u8>, StreamBlockError> {
        self.ensure_seekable()?;

        while self.prev_byte().await? != END_BYTE {}

        let mut raw = Vec::new();
        loop {
            let b = self.prev_byte().await?;
            if b == START_BYTE {
                break;
            }
            raw.push(b);
        }
        raw.reverse();
        Ok(unescape_block(&raw))
    }

    /// Position the cursor at the start of the `n`-th block from the end
    ///
    /// The sign of `n` is ignored. `n == 0` reads no block and leaves the
    /// cursor at the end of storage, so a following
    /// [`read_previous_block`](Self::read_previous_block) returns the last
    /// block.
    pub async fn seek_from_end(&mut self, n: i64) -> Result<(), StreamBlockError> {
        self.seek_from_end_for_blocks(n, |_| true).await
    }

    /// Like [`seek_from_end`](Self::seek_from_end), counting only blocks
    /// for which `predicate` holds
    ///
    /// Returns [`StreamBlockError::EndOfStream`] if fewer than `n` blocks
    /// match. As with `seek_from_end`, `n == 0` stops at the end without
    /// reading.
    pub async fn seek_from_end_for_blocks<F>(
        &mut self,
        n: i64,
        mut predicate: F,
    ) -> Result<(), StreamBlockError>
    where
        F: FnMut(&[u8]) -> bool,
    {
        self.ensure_seekable()?;
        let wanted = n.unsigned_abs();
        self.seek_to_end().await?;

        let mut matched = 0u64;
        while matched < wanted {
            let block = self.read_previous_block().await?;
            if predicate(&block) {
                matched += 1;
            }
        }
        Ok(())
    }

    fn ensure_seekable(&self) -> Result<(), StreamBlockError> {
        if self.seekable {
            Ok(())
        } else {
            Err(StreamBlockError::NotSeekable)
        }
    }

    /// Step the cursor back one byte and return the byte it passed over
    async fn prev_byte(&mut self) -> Result<u8, StreamBlockError> {
        if self.pos == 0 {
            return Err(StreamBlockError::EndOfStream);
        }
        if self.pos <= self.buf_start {
            self.load_chunk_ending_at(self.pos).await?;
        }
        self.pos -= 1;
        Ok(self.buf[(self.pos - self.buf_start) as usize])
    }

    /// Replace the window with the chunk ending at `end`
    async fn load_chunk_ending_at(&mut self, end: u64) -> Result<(), StreamBlockError> {
        let start = end.saturating_sub(READ_CHUNK_SIZE as u64);
        self.inner.seek(SeekFrom::Start(start)).await?;
        self.buf.resize((end - start) as usize, 0);
        if let Err(e) = self.inner.read_exact(&mut self.buf).await {
            // Keep the window consistent with wherever the source stopped
            self.buf.clear();
            self.buf_start = start;
            self.pos = start;
            return Err(e.into());
        }
        self.buf_start = start;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::streamblock::codec::{frame_block, ESCAPE_BYTE};
    use crate::streamblock::BlockWriter;
    use std::io::{self, Cursor};
    use std::pin::Pin;
    use std::task::{Context, Poll};
    use tokio::io::ReadBuf;

    /// Seekable in-memory source whose next read fails once when
    /// `fail_next` is set
    struct FlakySource {
        inner: Cursor<Vec<u8>>,
        fail_next: bool,
    }

    impl AsyncRead for FlakySource {
        fn poll_read(
            self: Pin<&mut Self>,
            cx: &mut Context<'_>,
            buf: &mut ReadBuf<'_>,
        ) -> Poll<io::Result<()>> {
            let this = self.get_mut();
            if this.fail_next {
                this.fail_next = false;
                return Poll::Ready(Err(io::Error::new(io::ErrorKind::Other, "transient")));
            }
            Pin::new(&mut this.inner).poll_read(cx, buf)
        }
    }

    impl AsyncSeek for FlakySource {
        fn start_seek(self: Pin<&mut Self>, position: SeekFrom) -> io::Result<()> {
            Pin::new(&mut self.get_mut().inner).start_seek(position)
        }

        fn poll_complete(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<u64>> {
            Pin::new(&mut self.get_mut().inner).poll_complete(cx)
        }
    }

    /// Deterministic 32-byte block for index `n`, containing literal
    /// START and END bytes in the middle
    fn numbered_block(n: usize) -> Vec<u8> {
        let mut res = vec![(n >> 8) as u8, n as u8];
        let mut body: Vec<u8> = (0..30).map(|i| (i + n) as u8).collect();
        body[15] = END_BYTE;
        body[16] = START_BYTE;
        res.extend(body);
        res
    }

    async fn write_blocks(blocks: &[Vec<u8>]) -> Vec<u8> {
        let mut writer = BlockWriter::new(Vec::new());
        for b in blocks {
            writer.write_block(b).await.unwrap();
        }
        writer.into_inner()
    }

    fn numbered(range: std::ops::Range<usize>) -> Vec<Vec<u8>> {
        range.map(numbered_block).collect()
    }

    #[tokio::test]
    async fn test_forward_reads_in_order() {
        let blocks = numbered(0..200);
        let data = write_blocks(&blocks).await;

        let mut reader = BlockReader::new(Cursor::new(data));
        for expected in &blocks {
            assert_eq!(&reader.read_block().await.unwrap(), expected);
        }
        assert!(matches!(
            reader.read_block().await,
            Err(StreamBlockError::EndOfStream)
        ));
    }

    #[tokio::test]
    async fn test_forward_skips_leading_garbage_and_partial_tail() {
        let mut data = vec![0x55, 0x66];
        data.extend_from_slice(&frame_block(b"one"));
        data.extend_from_slice(&[START_BYTE, b'x', b'y']);

        let mut reader = BlockReader::new(Cursor::new(data));
        assert_eq!(reader.read_block().await.unwrap(), b"one");
        assert!(matches!(
            reader.read_block().await,
            Err(StreamBlockError::EndOfStream)
        ));
    }

    #[tokio::test]
    async fn test_empty_source() {
        let mut reader = BlockReader::seekable(Cursor::new(Vec::<u8>::new()));
        assert!(matches!(
            reader.read_block().await,
            Err(StreamBlockError::EndOfStream)
        ));
        assert!(matches!(
            reader.read_last_block().await,
            Err(StreamBlockError::EndOfStream)
        ));
    }

    #[tokio::test]
    async fn test_empty_blocks() {
        let blocks = vec![Vec::new(), b"x".to_vec(), Vec::new()];
        let data = write_blocks(&blocks).await;

        let mut reader = BlockReader::seekable(Cursor::new(data));
        for expected in &blocks {
            assert_eq!(&reader.read_block().await.unwrap(), expected);
        }
        assert_eq!(reader.read_last_block().await.unwrap(), Vec::<u8>::new());
        assert_eq!(reader.read_previous_block().await.unwrap(), b"x");
        assert_eq!(reader.read_previous_block().await.unwrap(), Vec::<u8>::new());
    }

    #[tokio::test]
    async fn test_read_last_block() {
        let blocks = numbered(0..50);
        let data = write_blocks(&blocks).await;

        let mut reader = BlockReader::seekable(Cursor::new(data));
        assert_eq!(reader.read_last_block().await.unwrap(), numbered_block(49));
    }

    #[tokio::test]
    async fn test_backward_is_reverse_of_forward() {
        // Enough data to span several read chunks
        let blocks = numbered(0..1000);
        let data = write_blocks(&blocks).await;
        assert!(data.len() > 3 * READ_CHUNK_SIZE);

        let mut reader = BlockReader::seekable(Cursor::new(data));
        let mut backward = vec![reader.read_last_block().await.unwrap()];
        loop {
            match reader.read_previous_block().await {
                Ok(b) => backward.push(b),
                Err(StreamBlockError::EndOfStream) => break,
                Err(e) => panic!("unexpected error: {}", e),
            }
        }
        backward.reverse();
        assert_eq!(backward, blocks);
        assert_eq!(reader.position(), 0);
    }

    #[tokio::test]
    async fn test_cursor_rests_on_start_byte() {
        let blocks = numbered(0..3);
        let data = write_blocks(&blocks).await;
        let last_len = frame_block(&blocks[2]).len() as u64;
        let total = data.len() as u64;

        let mut reader = BlockReader::seekable(Cursor::new(data));
        reader.read_last_block().await.unwrap();
        assert_eq!(reader.position(), total - last_len);

        // Reading forward from here returns the same block again
        assert_eq!(reader.read_block().await.unwrap(), blocks[2]);
    }

    #[tokio::test]
    async fn test_seek_from_end() {
        let blocks = numbered(1..99);
        let data = write_blocks(&blocks).await;

        let mut reader = BlockReader::seekable(Cursor::new(data));
        reader.seek_from_end(-5).await.unwrap();
        assert_eq!(reader.read_block().await.unwrap(), numbered_block(94));
        // Forward reading continues with the following block
        assert_eq!(reader.read_block().await.unwrap(), numbered_block(95));

        // Sign is normalised
        reader.seek_from_end(1).await.unwrap();
        assert_eq!(reader.read_block().await.unwrap(), numbered_block(98));
    }

    #[tokio::test]
    async fn test_seek_from_end_zero_stays_at_end() {
        let data = write_blocks(&numbered(0..5)).await;
        let len = data.len() as u64;

        let mut reader = BlockReader::seekable(Cursor::new(data));
        reader.seek_from_end(0).await.unwrap();
        assert_eq!(reader.position(), len);
        assert!(matches!(
            reader.read_block().await,
            Err(StreamBlockError::EndOfStream)
        ));
        assert_eq!(reader.read_previous_block().await.unwrap(), numbered_block(4));
    }

    #[tokio::test]
    async fn test_seek_past_beginning() {
        let data = write_blocks(&numbered(0..5)).await;
        let mut reader = BlockReader::seekable(Cursor::new(data));
        assert!(matches!(
            reader.seek_from_end(-6).await,
            Err(StreamBlockError::EndOfStream)
        ));
    }

    #[tokio::test]
    async fn test_seek_for_matching_blocks() {
        let is_wanted = |d: &[u8]| d[4] == 0x51;
        let blocks = numbered(1..2000);
        let wanted: Vec<&Vec<u8>> = blocks.iter().filter(|b| is_wanted(b)).collect();
        assert!(wanted.len() >= 3);
        let data = write_blocks(&blocks).await;

        let mut reader = BlockReader::seekable(Cursor::new(data));
        for j in 1..=3usize {
            reader
                .seek_from_end_for_blocks(-(j as i64), is_wanted)
                .await
                .unwrap();
            let got = reader.read_block().await.unwrap();
            assert_eq!(&got, wanted[wanted.len() - j]);
        }

        let too_many = -(wanted.len() as i64 + 1);
        assert!(matches!(
            reader.seek_from_end_for_blocks(too_many, is_wanted).await,
            Err(StreamBlockError::EndOfStream)
        ));
    }

    #[tokio::test]
    async fn test_forward_reader_refuses_to_seek() {
        let data = write_blocks(&numbered(0..3)).await;
        let mut reader = BlockReader::new(Cursor::new(data));
        assert!(!reader.is_seekable());
        assert!(matches!(
            reader.seek_from_end(-1).await,
            Err(StreamBlockError::NotSeekable)
        ));
        assert!(matches!(
            reader.read_last_block().await,
            Err(StreamBlockError::NotSeekable)
        ));
        assert!(matches!(
            reader.read_previous_block().await,
            Err(StreamBlockError::NotSeekable)
        ));
        // Forward reading still works
        assert_eq!(reader.read_block().await.unwrap(), numbered_block(0));
    }

    #[tokio::test]
    async fn test_corrupt_escape_does_not_affect_neighbours() {
        let mut data = Vec::new();
        data.extend_from_slice(&frame_block(b"before"));
        data.extend_from_slice(&[START_BYTE, b'x', ESCAPE_BYTE, 0x07, b'y', END_BYTE]);
        data.extend_from_slice(&frame_block(&[0xFF, 0x00, 0x01]));

        let mut reader = BlockReader::seekable(Cursor::new(data));
        assert_eq!(reader.read_block().await.unwrap(), b"before");
        assert_eq!(reader.read_block().await.unwrap(), vec![b'x', 0x07, b'y']);
        assert_eq!(reader.read_block().await.unwrap(), vec![0xFF, 0x00, 0x01]);

        assert_eq!(reader.read_last_block().await.unwrap(), vec![0xFF, 0x00, 0x01]);
        assert_eq!(
            reader.read_previous_block().await.unwrap(),
            vec![b'x', 0x07, b'y']
        );
        assert_eq!(reader.read_previous_block().await.unwrap(), b"before");
    }

    #[tokio::test]
    async fn test_backward_skips_torn_trailing_block() {
        let mut data = Vec::new();
        data.extend_from_slice(&frame_block(b"complete"));
        data.extend_from_slice(&[START_BYTE, b't', b'o', b'r']);

        let mut reader = BlockReader::seekable(Cursor::new(data));
        assert_eq!(reader.read_last_block().await.unwrap(), b"complete");
    }

    #[tokio::test]
    async fn test_backward_from_offset() {
        let blocks = numbered(0..10);
        let data = write_blocks(&blocks[..6]).await;
        let boundary = data.len() as u64;
        let mut all = data;
        all.extend(write_blocks(&blocks[6..]).await);

        let mut reader = BlockReader::seekable(Cursor::new(all));
        reader.seek_to(boundary).await.unwrap();
        assert_eq!(reader.read_previous_block().await.unwrap(), blocks[5]);
        assert_eq!(reader.read_previous_block().await.unwrap(), blocks[4]);
    }

    #[tokio::test]
    async fn test_rewind_after_backward_reads() {
        let blocks = numbered(0..10);
        let data = write_blocks(&blocks).await;

        let mut reader = BlockReader::seekable(Cursor::new(data));
        reader.read_last_block().await.unwrap();
        reader.rewind().await.unwrap();
        assert_eq!(reader.read_block().await.unwrap(), blocks[0]);
    }

    #[tokio::test]
    async fn test_failed_read_keeps_position() {
        let blocks = numbered(0..3);
        let data = write_blocks(&blocks).await;
        let first_len = frame_block(&blocks[0]).len() as u64;

        let mut reader = BlockReader::seekable(FlakySource {
            inner: Cursor::new(data),
            fail_next: true,
        });
        assert!(matches!(
            reader.read_block().await,
            Err(StreamBlockError::Io(_))
        ));
        assert_eq!(reader.position(), 0);

        assert_eq!(reader.read_block().await.unwrap(), blocks[0]);
        assert_eq!(reader.position(), first_len);

        // Backward reading starts from the real offset
        assert_eq!(reader.read_previous_block().await.unwrap(), blocks[0]);
        assert_eq!(reader.position(), 0);
    }
}
