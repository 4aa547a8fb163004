use serde::{de::DeserializeOwned, Serialize};
use std::io::{self, BufReader, Read};

use super::{Body, DecodeError};

/// JSON wire format.
#[derive(Clone, Copy, Debug, Default)]
pub struct JsonMarshaler;

impl JsonMarshaler {
    pub fn new_decoder<R: Read>(&self, reader: R) -> JsonDecoder<R> {
        JsonDecoder::new(reader)
    }

    pub fn content_type(&self) -> &'static str {
        super::JSON_CONTENT_TYPE
    }

    pub fn marshal<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(value)
    }
}

/// Decodes one JSON value from a possibly gzipped body.
///
/// The sniff and the gzip header parse happen in [`JsonDecoder::new`]. A
/// failure there is kept and handed back by [`JsonDecoder::decode`], so
/// constructing the decoder never fails. The JSON itself is parsed
/// incrementally off the reader rather than buffered up front.
pub struct JsonDecoder<R: Read> {
    body: Result<Body<R>, DecodeError>,
}

impl<R: Read> JsonDecoder<R> {
    pub fn new(reader: R) -> Self {
        Self {
            body: Body::open(reader),
        }
    }

    pub fn content_type(&self) -> &'static str {
        super::JSON_CONTENT_TYPE
    }

    /// Parse the first JSON value in the body into `target`. Anything after
    /// that value is left unread and ignored; `target` is only written on
    /// success.
    pub fn decode<T>(self, target: &mut T) -> Result<(), DecodeError>
    where
        T: DeserializeOwned,
    {
        match self.body? {
            Body::Plain(reader) => parse(BufReader::new(reader), target),
            // already buffered by the inflater
            Body::Gzip(reader) => parse(reader, target),
        }
    }
}

fn parse<T: DeserializeOwned, B: Read>(reader: B, target: &mut T) -> Result<(), DecodeError> {
    let mut de = serde_json::Deserializer::from_reader(reader);
    *target = T::deserialize(&mut de).map_err(json_error)?;
    Ok(())
}

/// I/O failures from the reader are read errors, not malformed JSON.
fn json_error(e: serde_json::Error) -> DecodeError {
    if e.is_io() {
        DecodeError::Read(io::Error::from(e))
    } else {
        DecodeError::Json(e)
    }
}
