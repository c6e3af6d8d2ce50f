//! Length-delimited JSON framing for engine frames.
//!
//! Frames carry a 4-byte big-endian length prefix followed by the JSON body.
//! Works over any AsyncRead/AsyncWrite pair.

use std::io;
use std::marker::PhantomData;

use serde::{Serialize, de::DeserializeOwned};
use tokio_util::bytes::{Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder, LengthDelimitedCodec};

/// Framing plus JSON serialization for a single frame type.
pub struct FrameCodec<T> {
    framing: LengthDelimitedCodec,
    _frame: PhantomData<T>,
}

impl<T> FrameCodec<T> {
    pub fn new() -> Self {
        Self {
            framing: LengthDelimitedCodec::builder()
                .length_field_length(4)
                .new_codec(),
            _frame: PhantomData,
        }
    }
}

impl<T> Default for FrameCodec<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: DeserializeOwned> Decoder for FrameCodec<T> {
    type Item = T;
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let Some(body) = self.framing.decode(src)? else {
            return Ok(None);
        };
        serde_json::from_slice(&body)
            .map(Some)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }
}

impl<T: Serialize> Encoder<T> for FrameCodec<T> {
    type Error = io::Error;

    fn encode(&mut self, frame: T, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let body = serde_json::to_vec(&frame)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        self.framing.encode(Bytes::from(body), dst)
    }
}
