/// Message model consumed by the listeners
///
/// A message carries a message-class tag and only the fields the publisher
/// actually sent. Field values are typed; the typed accessors on `FieldValue`
/// coerce between compatible numeric representations and report a
/// `FieldTypeError` for anything else.

use crate::error::FieldTypeError;
use crate::price::Price;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Numeric field identifier
pub type Fid = u16;

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
pub enum MsgType {
    Initial = 1,
    Recap = 2,
    Update = 3,
    Quote = 4,
    Trade = 5,
    Cancel = 6,
    Error = 7,
    Correction = 8,
    Closing = 9,
    PreOpening = 10,
    Snapshot = 11,
    SecStatus = 12,
    BookUpdate = 13,
}

impl MsgType {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            1 => Some(MsgType::Initial),
            2 => Some(MsgType::Recap),
            3 => Some(MsgType::Update),
            4 => Some(MsgType::Quote),
            5 => Some(MsgType::Trade),
            6 => Some(MsgType::Cancel),
            7 => Some(MsgType::Error),
            8 => Some(MsgType::Correction),
            9 => Some(MsgType::Closing),
            10 => Some(MsgType::PreOpening),
            11 => Some(MsgType::Snapshot),
            12 => Some(MsgType::SecStatus),
            13 => Some(MsgType::BookUpdate),
            _ => None,
        }
    }

    pub fn class(self) -> MsgClass {
        match self {
            MsgType::Initial | MsgType::Recap | MsgType::PreOpening | MsgType::Snapshot => MsgClass::Recap,
            MsgType::Update | MsgType::Quote | MsgType::Trade => MsgClass::Delta,
            MsgType::Cancel
            | MsgType::Error
            | MsgType::Correction
            | MsgType::Closing
            | MsgType::SecStatus
            | MsgType::BookUpdate => MsgClass::Specialized,
        }
    }
}

/// Behavioural grouping of message types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum MsgClass {
    /// Full resynchronisation; the counter is adopted without gap checks
    Recap,
    Delta,
    /// Delta handling plus a kind-specific overlay before notification
    Specialized,
}

impl MsgClass {
    pub fn checks_gaps(self) -> bool {
        self != MsgClass::Recap
    }
}

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize)]
pub enum FieldType {
    Bool = 1,
    Char = 2,
    I64 = 3,
    U64 = 4,
    F64 = 5,
    Price = 6,
    String = 7,
    DateTime = 8,
}

impl FieldType {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            1 => Some(FieldType::Bool),
            2 => Some(FieldType::Char),
            3 => Some(FieldType::I64),
            4 => Some(FieldType::U64),
            5 => Some(FieldType::F64),
            6 => Some(FieldType::Price),
            7 => Some(FieldType::String),
            8 => Some(FieldType::DateTime),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldValue {
    Bool(bool),
    Char(char),
    I64(i64),
    U64(u64),
    F64(f64),
    Price(Price),
    String(String),
    DateTime(DateTime<Utc>),
}

impl FieldValue {
    pub fn field_type(&self) -> FieldType {
        match self {
            FieldValue::Bool(_) => FieldType::Bool,
            FieldValue::Char(_) => FieldType::Char,
            FieldValue::I64(_) => FieldType::I64,
            FieldValue::U64(_) => FieldType::U64,
            FieldValue::F64(_) => FieldType::F64,
            FieldValue::Price(_) => FieldType::Price,
            FieldValue::String(_) => FieldType::String,
            FieldValue::DateTime(_) => FieldType::DateTime,
        }
    }

    fn mismatch(&self, expected: FieldType) -> FieldTypeError {
        FieldTypeError {
            expected,
            found: self.field_type(),
        }
    }

    pub fn as_bool(&self) -> Result<bool, FieldTypeError> {
        match self {
            FieldValue::Bool(v) => Ok(*v),
            FieldValue::Char('Y') | FieldValue::Char('y') => Ok(true),
            FieldValue::Char('N') | FieldValue::Char('n') => Ok(false),
            other => Err(other.mismatch(FieldType::Bool)),
        }
    }

    pub fn as_char(&self) -> Result<char, FieldTypeError> {
        match self {
            FieldValue::Char(c) => Ok(*c),
            FieldValue::String(s) => {
                let mut chars = s.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => Ok(c),
                    _ => Err(self.mismatch(FieldType::Char)),
                }
            }
            other => Err(other.mismatch(FieldType::Char)),
        }
    }

    pub fn as_i64(&self) -> Result<i64, FieldTypeError> {
        match self {
            FieldValue::I64(v) => Ok(*v),
            FieldValue::U64(v) => i64::try_from(*v).map_err(|_| self.mismatch(FieldType::I64)),
            other => Err(other.mismatch(FieldType::I64)),
        }
    }

    pub fn as_u64(&self) -> Result<u64, FieldTypeError> {
        match self {
            FieldValue::U64(v) => Ok(*v),
            FieldValue::I64(v) => u64::try_from(*v).map_err(|_| self.mismatch(FieldType::U64)),
            other => Err(other.mismatch(FieldType::U64)),
        }
    }

    pub fn as_f64(&self) -> Result<f64, FieldTypeError> {
        match self {
            FieldValue::F64(v) => Ok(*v),
            FieldValue::I64(v) => Ok(*v as f64),
            FieldValue::U64(v) => Ok(*v as f64),
            FieldValue::Price(p) => Ok(p.to_f64()),
            other => Err(other.mismatch(FieldType::F64)),
        }
    }

    pub fn as_price(&self) -> Result<Price, FieldTypeError> {
        match self {
            FieldValue::Price(p) => Ok(*p),
            FieldValue::F64(v) => Price::from_f64(*v).ok_or_else(|| self.mismatch(FieldType::Price)),
            FieldValue::I64(v) => Ok(Price::from_i64(*v)),
            FieldValue::U64(v) => i64::try_from(*v)
                .map(Price::from_i64)
                .map_err(|_| self.mismatch(FieldType::Price)),
            other => Err(other.mismatch(FieldType::Price)),
        }
    }

    /// Text form of string-like fields. Codes published as integers or
    /// single characters are accepted and rendered as text.
    pub fn as_text(&self) -> Result<String, FieldTypeError> {
        match self {
            FieldValue::String(s) => Ok(s.clone()),
            FieldValue::Char(c) => Ok(c.to_string()),
            FieldValue::I64(v) => Ok(v.to_string()),
            FieldValue::U64(v) => Ok(v.to_string()),
            other => Err(other.mismatch(FieldType::String)),
        }
    }

    pub fn as_datetime(&self) -> Result<DateTime<Utc>, FieldTypeError> {
        match self {
            FieldValue::DateTime(t) => Ok(*t),
            other => Err(other.mismatch(FieldType::DateTime)),
        }
    }
}

/// What the listeners need from a transport message
pub trait Message {
    fn msg_type(&self) -> MsgType;

    /// Visits only the fields physically present, in wire order
    fn visit_fields(&self, visitor: &mut dyn FnMut(Fid, &FieldValue));
}

/// Owned message: a type tag plus the present fields in wire order
#[derive(Debug, Clone, PartialEq)]
pub struct FieldMessage {
    msg_type: MsgType,
    fields: Vec<(Fid, FieldValue)>,
}

impl FieldMessage {
    pub fn new(msg_type: MsgType) -> Self {
        FieldMessage {
            msg_type,
            fields: Vec::new(),
        }
    }

    pub fn with_capacity(msg_type: MsgType, capacity: usize) -> Self {
        FieldMessage {
            msg_type,
            fields: Vec::with_capacity(capacity),
        }
    }

    /// Builder-style append
    pub fn with(mut self, fid: Fid, value: FieldValue) -> Self {
        self.fields.push((fid, value));
        self
    }

    pub fn push(&mut self, fid: Fid, value: FieldValue) {
        self.fields.push((fid, value));
    }

    /// First value carried for `fid`
    pub fn get(&self, fid: Fid) -> Option<&FieldValue> {
        self.fields.iter().find(|(f, _)| *f == fid).map(|(_, v)| v)
    }

    pub fn fields(&self) -> &[(Fid, FieldValue)] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl Message for FieldMessage {
    fn msg_type(&self) -> MsgType {
        self.msg_type
    }

    fn visit_fields(&self, visitor: &mut dyn FnMut(Fid, &FieldValue)) {
        for (fid, value) in &self.fields {
            visitor(*fid, value);
        }
    }
}
