//! The pass-through media-type output handler streams an entity body (typically a file) to the
//! response, understanding HTTP byte-range requests. Grounded in the original
//! `PassThroughMediaTypeHandler`: seek-or-skip to the start of each range, copy in bounded
//! chunks, and only consider a `Range` header when the resource has advertised
//! `Accept-Ranges: bytes`.

use chrono::{DateTime, FixedOffset};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncSeek, AsyncSeekExt, AsyncWrite, AsyncWriteExt, SeekFrom};

use crate::byte_range::{self, ByteRange};

/// Chunk size used when copying entity bytes to the response, bounding memory use for large
/// entities.
const CHUNK_SIZE: usize = 32_768;

/// Streams a byte source of known length to the response, serving byte ranges on request.
pub struct PassThroughMediaTypeHandler<R> {
    /// The media type this handler was selected to produce
    pub media_type: String,
    reader: R,
    number_of_bytes: u64,
    /// The entity's last-modified time, if known
    pub last_modified: Option<DateTime<FixedOffset>>,
    /// Whether range requests should be honoured for this entity
    pub accepts_ranges: bool,
}

/// The outcome of writing a body: the status to use, and the `Content-Range` header to set
/// (only present for a `206` response).
#[derive(Debug, Clone, PartialEq)]
pub struct OutputOutcome {
    /// HTTP status to use for this body (200 or 206)
    pub status: u16,
    /// `Content-Range` header value, set only when serving a partial response
    pub content_range: Option<String>,
}

impl<R> PassThroughMediaTypeHandler<R>
where
    R: AsyncRead + AsyncSeek + Unpin,
{
    /// Creates a new handler for a reader of `number_of_bytes` total length.
    pub fn new(
        media_type: impl Into<String>,
        reader: R,
        number_of_bytes: u64,
        last_modified: Option<DateTime<FixedOffset>>,
    ) -> Self {
        PassThroughMediaTypeHandler {
            media_type: media_type.into(),
            reader,
            number_of_bytes,
            last_modified,
            accepts_ranges: true,
        }
    }

    /// Writes the body to `writer`, consulting `range_header` (the raw `Range` header value) only
    /// if `accepts_ranges` is set. `is_head` suppresses body bytes but still computes the correct
    /// status/headers.
    pub async fn output_to<W: AsyncWrite + Unpin>(
        &mut self,
        range_header: Option<&str>,
        is_head: bool,
        writer: &mut W,
    ) -> std::io::Result<OutputOutcome> {
        if !self.accepts_ranges {
            self.write_full(is_head, writer).await?;
            return Ok(OutputOutcome {
                status: 200,
                content_range: None,
            });
        }

        match byte_range::parse_range_header(range_header, self.number_of_bytes) {
            Some(ranges) => {
                let content_range = Some(if ranges.len() == 1 {
                    byte_range::content_range_header(&ranges[0], self.number_of_bytes)
                } else {
                    byte_range::content_range_header_multi(&ranges, self.number_of_bytes)
                });
                if !is_head {
                    self.write_ranges(&ranges, writer).await?;
                }
                Ok(OutputOutcome {
                    status: 206,
                    content_range,
                })
            }
            None => {
                self.write_full(is_head, writer).await?;
                Ok(OutputOutcome {
                    status: 200,
                    content_range: None,
                })
            }
        }
    }

    async fn write_full<W: AsyncWrite + Unpin>(
        &mut self,
        is_head: bool,
        writer: &mut W,
    ) -> std::io::Result<()> {
        if is_head {
            return Ok(());
        }
        self.reader.seek(SeekFrom::Start(0)).await?;
        self.copy_span(0, self.number_of_bytes, writer).await
    }

    async fn write_ranges<W: AsyncWrite + Unpin>(
        &mut self,
        ranges: &[ByteRange],
        writer: &mut W,
    ) -> std::io::Result<()> {
        let mut current = 0u64;
        for range in ranges {
            if current != range.start {
                self.reader.seek(SeekFrom::Start(range.start)).await?;
                current = range.start;
            }
            self.copy_span(current, range.end, writer).await?;
            current = range.end;
        }
        Ok(())
    }

    async fn copy_span<W: AsyncWrite + Unpin>(
        &mut self,
        mut current: u64,
        end: u64,
        writer: &mut W,
    ) -> std::io::Result<()> {
        let mut buf = [0u8; CHUNK_SIZE];
        while current < end {
            let to_read = ((end - current) as usize).min(CHUNK_SIZE);
            let n = self.reader.read(&mut buf[..to_read]).await?;
            if n == 0 {
                break;
            }
            writer.write_all(&buf[..n]).await?;
            current += n as u64;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use expectest::prelude::*;
    use std::io::Cursor;

    #[tokio::test]
    async fn writes_the_full_body_when_no_range_requested() {
        let data = b"0123456789".to_vec();
        let mut handler =
            PassThroughMediaTypeHandler::new("text/plain", Cursor::new(data.clone()), data.len() as u64, None);
        let mut out = Vec::new();
        let outcome = handler.output_to(None, false, &mut out).await.unwrap();
        expect!(outcome.status).to(be_equal_to(200));
        expect!(out).to(be_equal_to(data));
    }

    #[tokio::test]
    async fn writes_a_single_range() {
        let data = b"0123456789".to_vec();
        let mut handler =
            PassThroughMediaTypeHandler::new("text/plain", Cursor::new(data), 10, None);
        let mut out = Vec::new();
        let outcome = handler
            .output_to(Some("bytes=2-5"), false, &mut out)
            .await
            .unwrap();
        expect!(outcome.status).to(be_equal_to(206));
        expect!(outcome.content_range).to(be_some().value("bytes 2-5/10".to_string()));
        expect!(out).to(be_equal_to(b"2345".to_vec()));
    }

    #[tokio::test]
    async fn head_request_writes_no_body() {
        let data = b"0123456789".to_vec();
        let mut handler =
            PassThroughMediaTypeHandler::new("text/plain", Cursor::new(data), 10, None);
        let mut out = Vec::new();
        let outcome = handler
            .output_to(Some("bytes=0-4"), true, &mut out)
            .await
            .unwrap();
        expect!(outcome.status).to(be_equal_to(206));
        expect!(out.is_empty()).to(be_true());
    }

    #[tokio::test]
    async fn ignores_range_header_when_ranges_not_accepted() {
        let data = b"0123456789".to_vec();
        let mut handler =
            PassThroughMediaTypeHandler::new("text/plain", Cursor::new(data.clone()), 10, None);
        handler.accepts_ranges = false;
        let mut out = Vec::new();
        let outcome = handler
            .output_to(Some("bytes=2-5"), false, &mut out)
            .await
            .unwrap();
        expect!(outcome.status).to(be_equal_to(200));
        expect!(out).to(be_equal_to(data));
    }
}
