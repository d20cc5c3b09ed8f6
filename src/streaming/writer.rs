//! Chunked transfer of a byte window from a seekable source.

use axum::body::Body;
use bytes::Bytes;
use reelhouse_common::{Error, Result};
use std::io::{self, SeekFrom};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncSeek, AsyncSeekExt, AsyncWrite, AsyncWriteExt};

use super::range::ByteRange;

/// Default chunk size: 1 MiB.
pub const DEFAULT_CHUNK_SIZE: usize = 1 << 20;

/// Copies exactly one window of a source to a sink in fixed-size chunks.
///
/// Only one chunk is held in memory at a time. A window ending early because
/// the source shrank, a failed read, or a short write all abort the transfer
/// and are logged as stream I/O errors. If the writer is dropped before the
/// window was fully delivered (client went away), that is logged too.
pub struct StreamWriter<R> {
    reader: R,
    remaining: u64,
    chunk_size: usize,
    label: String,
    finished: bool,
}

impl<R> StreamWriter<R>
where
    R: AsyncRead + AsyncSeek + Unpin,
{
    /// Position `reader` at the start of the window.
    ///
    /// Without a range the whole `size` bytes are sent.
    pub async fn new(
        mut reader: R,
        range: Option<ByteRange>,
        size: u64,
        chunk_size: usize,
        label: impl Into<String>,
    ) -> Result<Self> {
        let (start, len) = match range {
            Some(r) => (r.start, r.len()),
            None => (0, size),
        };

        if start > 0 {
            reader
                .seek(SeekFrom::Start(start))
                .await
                .map_err(Error::StreamIo)?;
        }

        Ok(Self {
            reader,
            remaining: len,
            chunk_size: chunk_size.max(1),
            label: label.into(),
            finished: len == 0,
        })
    }

    /// Bytes still to be delivered.
    pub fn remaining(&self) -> u64 {
        self.remaining
    }

    async fn next_chunk(&mut self) -> io::Result<Option<Bytes>> {
        if self.remaining == 0 {
            self.finished = true;
            return Ok(None);
        }

        let want = self.remaining.min(self.chunk_size as u64) as usize;
        let mut buf = vec![0u8; want];
        let n = self.reader.read(&mut buf).await?;
        if n == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("source ended with {} bytes left", self.remaining),
            ));
        }

        buf.truncate(n);
        self.remaining -= n as u64;
        Ok(Some(Bytes::from(buf)))
    }

    fn fail(&mut self, err: io::Error) -> Error {
        self.finished = true;
        let err = Error::StreamIo(err);
        tracing::warn!(file = %self.label, "Aborting transfer: {err}");
        err
    }

    /// Drive the whole window into `sink`, returning the bytes written.
    pub async fn copy_to<W>(mut self, sink: &mut W) -> Result<u64>
    where
        W: AsyncWrite + Unpin,
    {
        let mut total = 0u64;
        loop {
            let chunk = match self.next_chunk().await {
                Ok(Some(chunk)) => chunk,
                Ok(None) => break,
                Err(e) => return Err(self.fail(e)),
            };

            let written = match sink.write(&chunk).await {
                Ok(n) => n,
                Err(e) => return Err(self.fail(e)),
            };
            if written != chunk.len() {
                return Err(self.fail(io::Error::new(
                    io::ErrorKind::WriteZero,
                    format!("short write: {written} of {} bytes", chunk.len()),
                )));
            }
            total += written as u64;
        }

        if let Err(e) = sink.flush().await {
            return Err(self.fail(e));
        }
        Ok(total)
    }
}

impl<R> StreamWriter<R>
where
    R: AsyncRead + AsyncSeek + Unpin + Send + 'static,
{
    /// Turn the writer into a response body that yields one chunk at a time.
    pub fn into_body(self) -> Body {
        let stream = futures::stream::try_unfold(self, |mut writer| async move {
            match writer.next_chunk().await {
                Ok(Some(chunk)) => Ok(Some((chunk, writer))),
                Ok(None) => Ok(None),
                Err(e) => {
                    let err = writer.fail(e);
                    Err(io::Error::other(err))
                }
            }
        });
        Body::from_stream(stream)
    }
}

impl<R> Drop for StreamWriter<R> {
    fn drop(&mut self) {
        if !self.finished && self.remaining > 0 {
            tracing::debug!(
                file = %self.label,
                remaining = self.remaining,
                "Transfer aborted by client"
            );
        }
    }
}
