use std::io::Read;
use tracing::debug;

use super::{Body, DecodeError};

/// Protobuf wire format: encodes responses, hands out sniffing decoders.
#[derive(Clone, Copy, Debug, Default)]
pub struct ProtobufMarshaler;

impl ProtobufMarshaler {
    pub fn new_decoder<R: Read>(&self, reader: R) -> ProtobufDecoder<R> {
        ProtobufDecoder::new(reader)
    }

    pub fn content_type(&self) -> &'static str {
        super::PROTOBUF_CONTENT_TYPE
    }

    pub fn marshal<M: prost::Message>(&self, message: &M) -> Vec<u8> {
        message.encode_to_vec()
    }
}

/// Decodes one protobuf message from a possibly gzipped body.
///
/// Protobuf needs the whole message before it can parse, so the body is read
/// into memory in full. Nothing here bounds that read; limit the body before it
/// reaches the decoder.
pub struct ProtobufDecoder<R> {
    reader: R,
}

impl<R: Read> ProtobufDecoder<R> {
    pub fn new(reader: R) -> Self {
        Self { reader }
    }

    pub fn content_type(&self) -> &'static str {
        super::PROTOBUF_CONTENT_TYPE
    }

    /// Sniff, inflate if needed, read everything, then unmarshal into
    /// `target`. `target` is only written on success.
    pub fn decode<M>(self, target: &mut M) -> Result<(), DecodeError>
    where
        M: prost::Message + Default,
    {
        let mut body = Body::open(self.reader)?;

        let mut buffer = Vec::new();
        body.read_to_end(&mut buffer).map_err(DecodeError::Read)?;
        drop(body);

        debug!(decoded_size = buffer.len(), "protobuf body read");
        *target = M::decode(buffer.as_slice()).map_err(DecodeError::Protobuf)?;
        Ok(())
    }
}
