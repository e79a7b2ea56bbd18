// Path: crates/numerics/src/compression.rs

//! Blob frames: byte strings packed into `TYPE=BLOB` frames.
//!
//! The header records the codec, the original length (`LEN`) and the stored
//! length (`CLEN`); the payload is a run of blob tokens of at most
//! [`BLOB_CHUNK_BYTES`] each. Compression that does not strictly shrink
//! the input is discarded in favor of `raw`.

use crate::frame::{Frame, Token};
use crate::numeric::NumericValue;
use flate2::read::{GzDecoder, ZlibDecoder};
use flate2::write::{GzEncoder, ZlibEncoder};
use flate2::Compression;
use forge_types::error::{CompressionError, NumericError};
use std::fmt;
use std::io::{Read, Write};
use std::str::FromStr;

/// `TYPE` of blob frames.
pub const BLOB_KIND: &str = "BLOB";
/// Largest number of bytes carried by one payload token.
pub const BLOB_CHUNK_BYTES: usize = 64;

const ZSTD_LEVEL: i32 = 3;

/// Compression applied to a blob frame's bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Codec {
    Raw,
    Zlib,
    Gzip,
    Zstd,
}

impl Codec {
    pub fn name(self) -> &'static str {
        match self {
            Codec::Raw => "raw",
            Codec::Zlib => "zlib",
            Codec::Gzip => "gzip",
            Codec::Zstd => "zstd",
        }
    }

    fn encode(self, bytes: &[u8]) -> Result<Vec<u8>, CompressionError> {
        match self {
            Codec::Raw => Ok(bytes.to_vec()),
            Codec::Zlib => {
                let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
                encoder.write_all(bytes).map_err(codec_error)?;
                encoder.finish().map_err(codec_error)
            }
            Codec::Gzip => {
                let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
                encoder.write_all(bytes).map_err(codec_error)?;
                encoder.finish().map_err(codec_error)
            }
            Codec::Zstd => zstd::encode_all(bytes, ZSTD_LEVEL).map_err(codec_error),
        }
    }

    /// Decodes at most `limit + 1` bytes so an inflated length is caught
    /// without reading an unbounded stream.
    fn decode(self, stored: &[u8], limit: u64) -> Result<Vec<u8>, CompressionError> {
        let cap = limit.saturating_add(1);
        let mut out = Vec::new();
        match self {
            Codec::Raw => out.extend_from_slice(stored),
            Codec::Zlib => {
                ZlibDecoder::new(stored)
                    .take(cap)
                    .read_to_end(&mut out)
                    .map_err(codec_error)?;
            }
            Codec::Gzip => {
                GzDecoder::new(stored)
                    .take(cap)
                    .read_to_end(&mut out)
                    .map_err(codec_error)?;
            }
            Codec::Zstd => {
                zstd::Decoder::new(stored)
                    .map_err(codec_error)?
                    .take(cap)
                    .read_to_end(&mut out)
                    .map_err(codec_error)?;
            }
        }
        Ok(out)
    }
}

impl fmt::Display for Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Codec {
    type Err = CompressionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "raw" => Ok(Codec::Raw),
            "zlib" => Ok(Codec::Zlib),
            "gzip" => Ok(Codec::Gzip),
            "zstd" => Ok(Codec::Zstd),
            other => Err(CompressionError::UnknownCodec(other.to_string())),
        }
    }
}

fn codec_error(e: std::io::Error) -> CompressionError {
    CompressionError::Codec(e.to_string())
}

/// Packs bytes into a blob frame, compressing with `codec` when that helps.
pub fn compress(bytes: &[u8], codec: Codec) -> Result<Frame, CompressionError> {
    let (codec, stored) = match codec.encode(bytes)? {
        stored if codec == Codec::Raw || stored.len() < bytes.len() => (codec, stored),
        _ => (Codec::Raw, bytes.to_vec()),
    };
    tracing::debug!(
        target: "compression",
        codec = codec.name(),
        len = bytes.len(),
        clen = stored.len(),
        "packed blob frame"
    );
    Frame::builder(BLOB_KIND)
        .header("CODEC", codec)
        .header("LEN", bytes.len())
        .header("CLEN", stored.len())
        .tokens(
            stored
                .chunks(BLOB_CHUNK_BYTES)
                .map(|chunk| NumericValue::Blob(chunk.to_vec())),
        )
        .build()
        .map_err(|e| CompressionError::Codec(e.to_string()))
}

/// Unpacks a blob frame, checking both recorded lengths.
pub fn decompress(frame: &Frame) -> Result<Vec<u8>, CompressionError> {
    match frame.kind() {
        Some(BLOB_KIND) => {}
        other => {
            return Err(CompressionError::NotBlobFrame(
                other.unwrap_or("<none>").to_string(),
            ))
        }
    }
    let codec: Codec = frame
        .get("CODEC")
        .ok_or(CompressionError::Header("CODEC"))?
        .parse()?;
    let len = length_header(frame, "LEN")?;
    let clen = length_header(frame, "CLEN")?;

    let mut stored = Vec::new();
    for (index, token) in frame.payload().iter().enumerate() {
        match token {
            Token::Numeric(NumericValue::Blob(bytes)) => stored.extend_from_slice(bytes),
            other => {
                return Err(CompressionError::Token {
                    index,
                    source: NumericError::MalformedToken {
                        offset: 0,
                        found: other.to_string().chars().next(),
                        expected: "ℬ",
                        reason: format!("{} token in blob payload", token_kind(other)),
                    },
                })
            }
        }
    }
    check_length("CLEN", clen, stored.len())?;

    let bytes = codec.decode(&stored, len)?;
    check_length("LEN", len, bytes.len())?;
    Ok(bytes)
}

fn token_kind(token: &Token) -> &'static str {
    match token {
        Token::Numeric(value) => value.profile().name(),
        Token::Extension(_) => "extension",
        Token::Word(_) => "word",
    }
}

fn length_header(frame: &Frame, key: &'static str) -> Result<u64, CompressionError> {
    frame
        .get(key)
        .and_then(|v| v.parse().ok())
        .ok_or(CompressionError::Header(key))
}

fn check_length(field: &'static str, expected: u64, found: usize) -> Result<(), CompressionError> {
    let found = found as u64;
    if expected != found {
        return Err(CompressionError::LengthMismatch {
            field,
            expected,
            found,
        });
    }
    Ok(())
}
