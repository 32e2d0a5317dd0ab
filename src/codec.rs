/// Binary field-message codec
///
/// Layout, little-endian:
///   header (7 bytes)
///     - msg_type: u8
///     - field_count: u16
///     - length: u32 - total message length including header
///   fields, repeated field_count times
///     - fid: u16
///     - field_type: u8
///     - payload: fixed width per type; strings are u16 length + UTF-8 bytes,
///       prices are the 16-byte decimal representation, timestamps are
///       nanoseconds since the epoch

use crate::message::{FieldMessage, FieldType, FieldValue, Fid, Message, MsgType};
use crate::price::Price;
use byteorder::{ByteOrder, LittleEndian};
use chrono::{TimeZone, Utc};
use rust_decimal::Decimal;
use thiserror::Error;

pub const HEADER_SIZE: usize = 7;
const FIELD_HEADER_SIZE: usize = 3;
const PRICE_SIZE: usize = 16;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    #[error("buffer too small: need {need} bytes, have {have}")]
    BufferTooSmall { need: usize, have: usize },

    #[error("invalid message type: {0}")]
    InvalidMessageType(u8),

    #[error("invalid field type {field_type} for fid {fid}")]
    InvalidFieldType { fid: Fid, field_type: u8 },

    #[error("truncated message: declared length {declared} exceeds buffer {actual}")]
    TruncatedMessage { declared: u32, actual: usize },

    #[error("field data overruns declared length at offset {offset}")]
    FieldOverrun { offset: usize },

    #[error("invalid UTF-8 in string field {0}")]
    InvalidUtf8(Fid),

    #[error("invalid char code point {0:#x}")]
    InvalidChar(u32),

    #[error("field string too long: {0} bytes")]
    StringTooLong(usize),

    #[error("too many fields for one message: {0}")]
    TooManyFields(usize),

    #[error("message too long: {0} bytes")]
    MessageTooLong(usize),
}

pub type DecodeResult<T> = Result<T, DecodeError>;

/// Field message decoder
pub struct Decoder;

impl Decoder {
    /// Parse a single message from the front of `buffer`.
    /// Returns the message and the number of bytes consumed.
    pub fn decode(buffer: &[u8]) -> DecodeResult<(FieldMessage, usize)> {
        if buffer.len() < HEADER_SIZE {
            return Err(DecodeError::BufferTooSmall {
                need: HEADER_SIZE,
                have: buffer.len(),
            });
        }

        let msg_type = buffer[0];
        let field_count = LittleEndian::read_u16(&buffer[1..3]) as usize;
        let declared = LittleEndian::read_u32(&buffer[3..7]);

        let msg_type = MsgType::from_u8(msg_type).ok_or(DecodeError::InvalidMessageType(msg_type))?;

        let length = declared as usize;
        if length < HEADER_SIZE || length > buffer.len() {
            return Err(DecodeError::TruncatedMessage {
                declared,
                actual: buffer.len(),
            });
        }

        let body = &buffer[..length];
        let mut msg = FieldMessage::with_capacity(msg_type, field_count);
        let mut offset = HEADER_SIZE;

        for _ in 0..field_count {
            let header = take(body, offset, FIELD_HEADER_SIZE)?;
            let fid = LittleEndian::read_u16(&header[0..2]);
            let field_type = FieldType::from_u8(header[2]).ok_or(DecodeError::InvalidFieldType {
                fid,
                field_type: header[2],
            })?;
            offset += FIELD_HEADER_SIZE;

            let (value, used) = decode_value(body, offset, fid, field_type)?;
            offset += used;
            msg.push(fid, value);
        }

        Ok((msg, length))
    }

    /// Decode a stream of messages from buffer.
    /// Calls callback for each message; stops on error or if callback returns false
    pub fn decode_stream<F>(buffer: &[u8], mut callback: F) -> DecodeResult<usize>
    where
        F: FnMut(FieldMessage) -> bool,
    {
        let mut offset = 0;
        let mut count = 0;

        while offset < buffer.len() {
            match Self::decode(&buffer[offset..]) {
                Ok((msg, consumed)) => {
                    offset += consumed;
                    count += 1;
                    if !callback(msg) {
                        break;
                    }
                }
                Err(DecodeError::BufferTooSmall { .. }) => break, // trailing partial header
                Err(e) => return Err(e),
            }
        }

        Ok(count)
    }
}

fn take(body: &[u8], offset: usize, len: usize) -> DecodeResult<&[u8]> {
    body.get(offset..offset + len)
        .ok_or(DecodeError::FieldOverrun { offset })
}

fn decode_value(body: &[u8], offset: usize, fid: Fid, field_type: FieldType) -> DecodeResult<(FieldValue, usize)> {
    let value = match field_type {
        FieldType::Bool => (FieldValue::Bool(take(body, offset, 1)?[0] != 0), 1),
        FieldType::Char => {
            let code = LittleEndian::read_u32(take(body, offset, 4)?);
            let c = char::from_u32(code).ok_or(DecodeError::InvalidChar(code))?;
            (FieldValue::Char(c), 4)
        }
        FieldType::I64 => (FieldValue::I64(LittleEndian::read_i64(take(body, offset, 8)?)), 8),
        FieldType::U64 => (FieldValue::U64(LittleEndian::read_u64(take(body, offset, 8)?)), 8),
        FieldType::F64 => (FieldValue::F64(LittleEndian::read_f64(take(body, offset, 8)?)), 8),
        FieldType::Price => {
            let mut raw = [0u8; PRICE_SIZE];
            raw.copy_from_slice(take(body, offset, PRICE_SIZE)?);
            (FieldValue::Price(Price::new(Decimal::deserialize(raw))), PRICE_SIZE)
        }
        FieldType::String => {
            let len = LittleEndian::read_u16(take(body, offset, 2)?) as usize;
            let bytes = take(body, offset + 2, len)?;
            let s = std::str::from_utf8(bytes).map_err(|_| DecodeError::InvalidUtf8(fid))?;
            (FieldValue::String(s.to_string()), 2 + len)
        }
        FieldType::DateTime => {
            let nanos = LittleEndian::read_i64(take(body, offset, 8)?);
            (FieldValue::DateTime(Utc.timestamp_nanos(nanos)), 8)
        }
    };
    Ok(value)
}

/// Field message encoder
pub struct Encoder;

impl Encoder {
    /// Appends the encoded message to `out`, returning the bytes written.
    /// On error `out` is left as it was.
    pub fn encode(msg: &FieldMessage, out: &mut Vec<u8>) -> DecodeResult<usize> {
        let start = out.len();
        let result = Self::encode_at(msg, out, start);
        if result.is_err() {
            out.truncate(start);
        }
        result
    }

    fn encode_at(msg: &FieldMessage, out: &mut Vec<u8>, start: usize) -> DecodeResult<usize> {
        let field_count = u16::try_from(msg.len()).map_err(|_| DecodeError::TooManyFields(msg.len()))?;
        out.resize(start + HEADER_SIZE, 0);
        out[start] = msg.msg_type() as u8;
        LittleEndian::write_u16(&mut out[start + 1..start + 3], field_count);

        for (fid, value) in msg.fields() {
            let mut header = [0u8; FIELD_HEADER_SIZE];
            LittleEndian::write_u16(&mut header[0..2], *fid);
            header[2] = value.field_type() as u8;
            out.extend_from_slice(&header);
            encode_value(value, out)?;
        }

        let written = out.len() - start;
        let length = u32::try_from(written).map_err(|_| DecodeError::MessageTooLong(written))?;
        LittleEndian::write_u32(&mut out[start + 3..start + 7], length);
        Ok(written)
    }

    pub fn to_bytes(msg: &FieldMessage) -> DecodeResult<Vec<u8>> {
        let mut out = Vec::new();
        Self::encode(msg, &mut out)?;
        Ok(out)
    }
}

fn encode_value(value: &FieldValue, out: &mut Vec<u8>) -> DecodeResult<()> {
    let mut buf = [0u8; 8];
    match value {
        FieldValue::Bool(v) => out.push(u8::from(*v)),
        FieldValue::Char(c) => {
            LittleEndian::write_u32(&mut buf[..4], u32::from(*c));
            out.extend_from_slice(&buf[..4]);
        }
        FieldValue::I64(v) => {
            LittleEndian::write_i64(&mut buf, *v);
            out.extend_from_slice(&buf);
        }
        FieldValue::U64(v) => {
            LittleEndian::write_u64(&mut buf, *v);
            out.extend_from_slice(&buf);
        }
        FieldValue::F64(v) => {
            LittleEndian::write_f64(&mut buf, *v);
            out.extend_from_slice(&buf);
        }
        FieldValue::Price(p) => out.extend_from_slice(&p.value().serialize()),
        FieldValue::String(s) => {
            let len = u16::try_from(s.len()).map_err(|_| DecodeError::StringTooLong(s.len()))?;
            let mut len_buf = [0u8; 2];
            LittleEndian::write_u16(&mut len_buf, len);
            out.extend_from_slice(&len_buf);
            out.extend_from_slice(s.as_bytes());
        }
        FieldValue::DateTime(t) => {
            // out-of-range timestamps saturate rather than fail
            let nanos = t.timestamp_nanos_opt().unwrap_or(i64::MAX);
            LittleEndian::write_i64(&mut buf, nanos);
            out.extend_from_slice(&buf);
        }
    }
    Ok(())
}
