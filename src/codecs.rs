//! Byte-stream adapters for the `Content-Encoding` values the response writer's encoder stack can
//! apply, plus the charset converter hook. Grounded in the original `encoders.go`/`charset.go`:
//! each encoding exposes a name and an encode/decode pair; charset handlers expose a name and a
//! reader conversion (identity by default - no charset transcoding table is implemented).

use std::io::{Read, Write};

use flate2::read::{DeflateDecoder, GzDecoder};
use flate2::write::{DeflateEncoder, GzEncoder};
use flate2::Compression;

/// A `Content-Encoding` adapter: wraps/unwraps a byte buffer for wire transfer.
pub trait EncodingHandler: Send + Sync {
    /// The `Content-Encoding` token this handler implements
    fn encoding(&self) -> &'static str;
    /// Encodes logical bytes into wire bytes
    fn encode(&self, data: &[u8]) -> std::io::Result<Vec<u8>>;
    /// Decodes wire bytes back into logical bytes
    fn decode(&self, data: &[u8]) -> std::io::Result<Vec<u8>>;
}

/// The no-op encoding; always acceptable unless the client rejects it outright with `identity;q=0`.
pub struct IdentityEncoding;

impl EncodingHandler for IdentityEncoding {
    fn encoding(&self) -> &'static str {
        "identity"
    }

    fn encode(&self, data: &[u8]) -> std::io::Result<Vec<u8>> {
        Ok(data.to_vec())
    }

    fn decode(&self, data: &[u8]) -> std::io::Result<Vec<u8>> {
        Ok(data.to_vec())
    }
}

/// gzip, via `flate2`.
pub struct GzipEncoding;

impl EncodingHandler for GzipEncoding {
    fn encoding(&self) -> &'static str {
        "gzip"
    }

    fn encode(&self, data: &[u8]) -> std::io::Result<Vec<u8>> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data)?;
        encoder.finish()
    }

    fn decode(&self, data: &[u8]) -> std::io::Result<Vec<u8>> {
        let mut decoder = GzDecoder::new(data);
        let mut out = Vec::new();
        decoder.read_to_end(&mut out)?;
        Ok(out)
    }
}

/// DEFLATE, via `flate2`.
pub struct DeflateEncoding;

impl EncodingHandler for DeflateEncoding {
    fn encoding(&self) -> &'static str {
        "deflate"
    }

    fn encode(&self, data: &[u8]) -> std::io::Result<Vec<u8>> {
        let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data)?;
        encoder.finish()
    }

    fn decode(&self, data: &[u8]) -> std::io::Result<Vec<u8>> {
        let mut decoder = DeflateDecoder::new(data);
        let mut out = Vec::new();
        decoder.read_to_end(&mut out)?;
        Ok(out)
    }
}

/// LSB-first, 8-bit LZW, via `weezl` - the original's "compress" encoding.
pub struct CompressEncoding;

impl EncodingHandler for CompressEncoding {
    fn encoding(&self) -> &'static str {
        "compress"
    }

    fn encode(&self, data: &[u8]) -> std::io::Result<Vec<u8>> {
        weezl::encode::Encoder::new(weezl::BitOrder::Lsb, 8)
            .encode(data)
            .map_err(|err| std::io::Error::new(std::io::ErrorKind::InvalidData, err))
    }

    fn decode(&self, data: &[u8]) -> std::io::Result<Vec<u8>> {
        weezl::decode::Decoder::new(weezl::BitOrder::Lsb, 8)
            .decode(data)
            .map_err(|err| std::io::Error::new(std::io::ErrorKind::InvalidData, err))
    }
}

/// HTTP chunked transfer framing, applied around an already-encoded body.
pub struct ChunkedEncoding;

impl EncodingHandler for ChunkedEncoding {
    fn encoding(&self) -> &'static str {
        "chunked"
    }

    fn encode(&self, data: &[u8]) -> std::io::Result<Vec<u8>> {
        if data.is_empty() {
            return Ok(b"0\r\n\r\n".to_vec());
        }
        let mut out = Vec::with_capacity(data.len() + 16);
        out.extend_from_slice(format!("{:x}\r\n", data.len()).as_bytes());
        out.extend_from_slice(data);
        out.extend_from_slice(b"\r\n0\r\n\r\n");
        Ok(out)
    }

    fn decode(&self, data: &[u8]) -> std::io::Result<Vec<u8>> {
        let mut out = Vec::new();
        let mut rest = data;
        loop {
            let line_end = rest
                .windows(2)
                .position(|w| w == b"\r\n")
                .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::InvalidData, "malformed chunk size"))?;
            let size_str = std::str::from_utf8(&rest[..line_end])
                .map_err(|err| std::io::Error::new(std::io::ErrorKind::InvalidData, err))?;
            let size = usize::from_str_radix(size_str.trim(), 16)
                .map_err(|err| std::io::Error::new(std::io::ErrorKind::InvalidData, err))?;
            rest = &rest[line_end + 2..];
            if size == 0 {
                break;
            }
            out.extend_from_slice(&rest[..size]);
            rest = &rest[size + 2..];
        }
        Ok(out)
    }
}

/// Returns the built-in encoding handler for a `Content-Encoding` token, if known.
pub fn encoding_handler(name: &str) -> Option<Box<dyn EncodingHandler>> {
    match name.to_lowercase().as_str() {
        "identity" => Some(Box::new(IdentityEncoding)),
        "gzip" => Some(Box::new(GzipEncoding)),
        "deflate" => Some(Box::new(DeflateEncoding)),
        "compress" => Some(Box::new(CompressEncoding)),
        "chunked" => Some(Box::new(ChunkedEncoding)),
        _ => None,
    }
}

/// A charset converter hook: converts bytes read in one charset into another. The reference
/// implementation is identity - no transcoding table is implemented, matching the original
/// `StandardCharsetHandler`.
pub trait CharsetHandler: Send + Sync {
    /// The charset token this handler implements
    fn charset(&self) -> &str;
    /// Converts raw bytes assumed to be in this charset
    fn convert(&self, data: &[u8]) -> Vec<u8>;
}

/// An identity charset converter for a named charset.
pub struct StandardCharsetHandler {
    charset: String,
}

impl StandardCharsetHandler {
    /// Creates a new handler for the named charset
    pub fn new(charset: impl Into<String>) -> Self {
        StandardCharsetHandler {
            charset: charset.into(),
        }
    }
}

impl CharsetHandler for StandardCharsetHandler {
    fn charset(&self) -> &str {
        &self.charset
    }

    fn convert(&self, data: &[u8]) -> Vec<u8> {
        data.to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use expectest::prelude::*;

    #[test]
    fn identity_round_trips() {
        let handler = IdentityEncoding;
        let data = b"hello world".to_vec();
        expect!(handler.decode(&handler.encode(&data).unwrap()).unwrap()).to(be_equal_to(data));
    }

    #[test]
    fn gzip_round_trips() {
        let handler = GzipEncoding;
        let data = b"hello world, hello world, hello world".to_vec();
        let encoded = handler.encode(&data).unwrap();
        expect!(encoded).not_to(be_equal_to(data.clone()));
        expect!(handler.decode(&encoded).unwrap()).to(be_equal_to(data));
    }

    #[test]
    fn deflate_round_trips() {
        let handler = DeflateEncoding;
        let data = b"hello world, hello world, hello world".to_vec();
        let encoded = handler.encode(&data).unwrap();
        expect!(handler.decode(&encoded).unwrap()).to(be_equal_to(data));
    }

    #[test]
    fn compress_round_trips() {
        let handler = CompressEncoding;
        let data = b"hello world, hello world, hello world".to_vec();
        let encoded = handler.encode(&data).unwrap();
        expect!(handler.decode(&encoded).unwrap()).to(be_equal_to(data));
    }

    #[test]
    fn chunked_round_trips() {
        let handler = ChunkedEncoding;
        let data = b"hello world".to_vec();
        let encoded = handler.encode(&data).unwrap();
        expect!(handler.decode(&encoded).unwrap()).to(be_equal_to(data));
    }

    #[test]
    fn charset_handler_is_identity() {
        let handler = StandardCharsetHandler::new("ISO-8859-1");
        expect!(handler.charset()).to(be_equal_to("ISO-8859-1"));
        expect!(handler.convert(b"abc")).to(be_equal_to(b"abc".to_vec()));
    }
}
