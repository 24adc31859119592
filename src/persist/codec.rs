//! Binary state envelope
//!
//! Layout (all integers big-endian):
//! ```text
//! "RTAU"            magic
//! u8                format version (1)
//! u16 + bytes       shared secret (32 bytes)
//! u32 + utf-8       control-plane URL (empty = disabled)
//! u32               record count
//! per record:
//!   u32 + utf-8     id
//!   u32 + utf-8     application
//!   u32 + utf-8     name
//!   u32 + utf-8     auth key
//!   i64             expiry (Unix seconds, -1 = never)
//!   u32 + utf-8     notes
//!   u8              blocked
//!   u8              active
//! ```

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::DecodeError;
use crate::registry::entry::{Expiry, StreamEntry, StreamId};
use crate::registry::state::{RegistryState, Secret, SECRET_LEN};

const MAGIC: &[u8; 4] = b"RTAU";
const FORMAT_VERSION: u8 = 1;

/// Encoder for the registry state envelope
pub struct StateEncoder {
    buf: BytesMut,
}

impl StateEncoder {
    pub fn new() -> Self {
        Self {
            buf: BytesMut::with_capacity(1024),
        }
    }

    /// Get the encoded bytes and reset encoder
    pub fn finish(&mut self) -> Bytes {
        self.buf.split().freeze()
    }

    /// Encode the full registry state
    pub fn encode(&mut self, state: &RegistryState) {
        self.buf.put_slice(MAGIC);
        self.buf.put_u8(FORMAT_VERSION);

        self.buf.put_u16(state.secret.len() as u16);
        self.buf.put_slice(&state.secret);
        self.write_str(&state.control_url);

        self.buf.put_u32(state.streams.len() as u32);
        for stream in &state.streams {
            self.encode_stream(stream);
        }
    }

    fn encode_stream(&mut self, stream: &StreamEntry) {
        self.write_str(stream.id.as_str());
        self.write_str(&stream.app);
        self.write_str(&stream.name);
        self.write_str(&stream.auth_key);
        self.buf.put_i64(stream.expiry.to_wire());
        self.write_str(&stream.notes);
        self.buf.put_u8(stream.blocked as u8);
        self.buf.put_u8(stream.active as u8);
    }

    /// Write UTF-8 string with 32-bit length prefix
    fn write_str(&mut self, s: &str) {
        self.buf.put_u32(s.len() as u32);
        self.buf.put_slice(s.as_bytes());
    }
}

impl Default for StateEncoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Decoder for the registry state envelope
pub struct StateDecoder {
    buf: Bytes,
}

impl StateDecoder {
    pub fn new(data: Bytes) -> Self {
        Self { buf: data }
    }

    /// Decode a complete state; trailing data is an error
    pub fn decode(mut self) -> Result<RegistryState, DecodeError> {
        if self.buf.remaining() < MAGIC.len() + 1 {
            return Err(DecodeError::UnexpectedEof);
        }
        if &self.buf[..MAGIC.len()] != MAGIC {
            return Err(DecodeError::BadMagic);
        }
        self.buf.advance(MAGIC.len());

        let version = self.buf.get_u8();
        if version != FORMAT_VERSION {
            return Err(DecodeError::UnsupportedVersion(version));
        }

        let secret = self.read_secret()?;
        let control_url = self.read_str()?;

        let count = self.read_u32()? as usize;
        // Cap initial allocation, the count comes from disk
        let mut streams = Vec::with_capacity(count.min(1024));
        for _ in 0..count {
            streams.push(self.decode_stream()?);
        }

        if self.buf.has_remaining() {
            return Err(DecodeError::TrailingBytes(self.buf.remaining()));
        }

        Ok(RegistryState {
            secret,
            control_url,
            streams,
        })
    }

    fn decode_stream(&mut self) -> Result<StreamEntry, DecodeError> {
        let id = StreamId::from(self.read_str()?);
        let app = self.read_str()?;
        let name = self.read_str()?;
        let auth_key = self.read_str()?;

        if self.buf.remaining() < 8 {
            return Err(DecodeError::UnexpectedEof);
        }
        let raw = self.buf.get_i64();
        let expiry = Expiry::from_wire(raw).ok_or(DecodeError::InvalidExpiry(raw))?;

        let notes = self.read_str()?;

        if self.buf.remaining() < 2 {
            return Err(DecodeError::UnexpectedEof);
        }
        let blocked = self.buf.get_u8() != 0;
        let active = self.buf.get_u8() != 0;

        Ok(StreamEntry {
            id,
            app,
            name,
            auth_key,
            expiry,
            notes,
            blocked,
            active,
        })
    }

    fn read_secret(&mut self) -> Result<Secret, DecodeError> {
        if self.buf.remaining() < 2 {
            return Err(DecodeError::UnexpectedEof);
        }
        let len = self.buf.get_u16() as usize;
        if len != SECRET_LEN {
            return Err(DecodeError::InvalidSecretLength(len));
        }
        if self.buf.remaining() < len {
            return Err(DecodeError::UnexpectedEof);
        }

        let mut secret = [0u8; SECRET_LEN];
        self.buf.copy_to_slice(&mut secret);
        Ok(secret)
    }

    fn read_u32(&mut self) -> Result<u32, DecodeError> {
        if self.buf.remaining() < 4 {
            return Err(DecodeError::UnexpectedEof);
        }
        Ok(self.buf.get_u32())
    }

    /// Read UTF-8 string with 32-bit length prefix
    fn read_str(&mut self) -> Result<String, DecodeError> {
        let len = self.read_u32()? as usize;
        if self.buf.remaining() < len {
            return Err(DecodeError::UnexpectedEof);
        }

        let bytes = self.buf.copy_to_bytes(len);
        String::from_utf8(bytes.to_vec()).map_err(|_| DecodeError::InvalidUtf8)
    }
}

/// Convenience function to encode a state
pub fn encode(state: &RegistryState) -> Bytes {
    let mut encoder = StateEncoder::new();
    encoder.encode(state);
    encoder.finish()
}

/// Convenience function to decode a state
pub fn decode(data: &[u8]) -> Result<RegistryState, DecodeError> {
    StateDecoder::new(Bytes::copy_from_slice(data)).decode()
}
