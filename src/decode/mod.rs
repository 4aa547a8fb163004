//! Request body decoders.
//!
//! Each decoder runs the gzip sniffer over its input and inflates
//! transparently, so a client that compresses without setting
//! `Content-Encoding` still gets decoded. The two formats differ in *when* a
//! sniff or gzip-open failure is reported:
//!
//! - [`ProtobufDecoder`] does all of its work inside `decode`.
//! - [`JsonDecoder`] sniffs and opens the gzip stream at construction, but
//!   holds any failure and returns it from `decode`.
//!
//! Construction is infallible for both, and both decoders are consumed by
//! `decode`.

use serde::{de::DeserializeOwned, Serialize};
use std::io::{self, BufReader, Read};
use tracing::debug;

use crate::compression::{self, ContentEncoding, Decompressor};
use crate::sniff::{sniff, Rewound};

mod json;
mod protobuf;

pub use json::{JsonDecoder, JsonMarshaler};
pub use protobuf::{ProtobufDecoder, ProtobufMarshaler};

pub const PROTOBUF_CONTENT_TYPE: &str = "application/x-protobuf";
pub const JSON_CONTENT_TYPE: &str = "application/json";

#[derive(Debug)]
pub enum DecodeError {
    /// Could not read enough of the body to tell whether it is gzip.
    Sniff(io::Error),
    /// Body looked like gzip but the member header would not parse.
    Decompress(io::Error),
    /// Reading or inflating the body failed part way.
    Read(io::Error),
    Protobuf(prost::DecodeError),
    Json(serde_json::Error),
}

impl std::fmt::Display for DecodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DecodeError::Sniff(e) => write!(f, "sniff error: {}", e),
            DecodeError::Decompress(e) => write!(f, "decompress error: {}", e),
            DecodeError::Read(e) => write!(f, "read error: {}", e),
            DecodeError::Protobuf(e) => write!(f, "protobuf decode error: {}", e),
            DecodeError::Json(e) => write!(f, "json decode error: {}", e),
        }
    }
}

impl std::error::Error for DecodeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DecodeError::Sniff(e) | DecodeError::Decompress(e) | DecodeError::Read(e) => Some(e),
            DecodeError::Protobuf(e) => Some(e),
            DecodeError::Json(e) => Some(e),
        }
    }
}

/// Wire format of a request or response body.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Format {
    Protobuf,
    Json,
}

impl Format {
    /// Map a `Content-Type` header to a format. Parameters such as
    /// `; charset=utf-8` are ignored.
    pub fn from_content_type(content_type: Option<&str>) -> Option<Self> {
        let mime = content_type?.split(';').next()?.trim();
        if mime.eq_ignore_ascii_case(PROTOBUF_CONTENT_TYPE)
            || mime.eq_ignore_ascii_case("application/protobuf")
        {
            Some(Format::Protobuf)
        } else if mime.eq_ignore_ascii_case(JSON_CONTENT_TYPE) {
            Some(Format::Json)
        } else {
            None
        }
    }

    /// Content type declared on bodies this format produces.
    pub fn content_type(&self) -> &'static str {
        match self {
            Format::Protobuf => ProtobufMarshaler.content_type(),
            Format::Json => JsonMarshaler.content_type(),
        }
    }

    pub fn new_decoder<R: Read>(&self, reader: R) -> Decoder<R> {
        match self {
            Format::Protobuf => Decoder::Protobuf(ProtobufMarshaler.new_decoder(reader)),
            Format::Json => Decoder::Json(JsonMarshaler.new_decoder(reader)),
        }
    }

    pub fn marshal<T>(&self, value: &T) -> Result<Vec<u8>, serde_json::Error>
    where
        T: prost::Message + Serialize,
    {
        match self {
            Format::Protobuf => Ok(ProtobufMarshaler.marshal(value)),
            Format::Json => JsonMarshaler.marshal(value),
        }
    }
}

/// A single-use decoder, tagged by format.
pub enum Decoder<R: Read> {
    Protobuf(ProtobufDecoder<R>),
    Json(JsonDecoder<R>),
}

impl<R: Read> Decoder<R> {
    pub fn decode<T>(self, target: &mut T) -> Result<(), DecodeError>
    where
        T: prost::Message + Default + DeserializeOwned,
    {
        match self {
            Decoder::Protobuf(d) => d.decode(target),
            Decoder::Json(d) => d.decode(target),
        }
    }
}

/// A sniffed body, inflated when the sniffer saw the gzip signature.
enum Body<R: Read> {
    Plain(Rewound<R>),
    Gzip(BufReader<Decompressor<Rewound<R>>>),
}

impl<R: Read> Body<R> {
    fn open(reader: R) -> Result<Self, DecodeError> {
        let (reader, gzipped) = sniff(reader);
        let gzipped = gzipped.map_err(DecodeError::Sniff)?;
        if !gzipped {
            return Ok(Body::Plain(reader));
        }

        debug!("gzip signature found in body, inflating");
        compression::open(ContentEncoding::Gzip, reader)
            .map(Body::Gzip)
            .map_err(DecodeError::Decompress)
    }
}

impl<R: Read> Read for Body<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Body::Plain(r) => r.read(buf),
            Body::Gzip(r) => r.read(buf),
        }
    }
}
