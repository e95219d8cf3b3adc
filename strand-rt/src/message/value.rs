//! The tagged payload union carried by envelopes and wire frames.
//!
//! A closed union keeps message passing free of runtime type inspection:
//! every payload an actor can receive, and every answer it can produce, is
//! one of these variants. The same union crosses the wire inside frames, so
//! a value sent to a remote actor arrives exactly as it would locally.

// Layer 1: Standard library imports
use std::fmt::{self, Display};

// Layer 2: Third-party crate imports
use borsh::{BorshDeserialize, BorshSerialize};

// Layer 3: Internal module imports
// (none)

/// A message payload.
///
/// `Proto` carries an externally-serialized message (a type url and its
/// encoded bytes) for callers that bring their own schema language; the
/// remaining variants cover the primitive payloads the runtime understands
/// natively.
///
/// Payloads are moved, not cloned, on send; senders must not rely on
/// observing a payload after it was handed to a reference.
#[derive(Debug, Clone, PartialEq, BorshSerialize, BorshDeserialize)]
pub enum Value {
    /// Externally-serialized message: type url plus encoded bytes.
    Proto {
        /// Schema identifier of the encoded message.
        type_url: String,
        /// The encoded message body.
        data: Vec<u8>,
    },
    /// Boolean payload.
    Bool(bool),
    /// Raw byte payload.
    Bytes(Vec<u8>),
    /// UTF-8 string payload.
    Str(String),
    /// Signed integers.
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    /// Unsigned integers.
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    /// Floating point.
    F32(f32),
    F64(f64),
}

impl Value {
    /// The runtime tag of this payload.
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Proto { .. } => ValueKind::Proto,
            Value::Bool(_) => ValueKind::Bool,
            Value::Bytes(_) => ValueKind::Bytes,
            Value::Str(_) => ValueKind::Str,
            Value::I8(_) => ValueKind::I8,
            Value::I16(_) => ValueKind::I16,
            Value::I32(_) => ValueKind::I32,
            Value::I64(_) => ValueKind::I64,
            Value::U8(_) => ValueKind::U8,
            Value::U16(_) => ValueKind::U16,
            Value::U32(_) => ValueKind::U32,
            Value::U64(_) => ValueKind::U64,
            Value::F32(_) => ValueKind::F32,
            Value::F64(_) => ValueKind::F64,
        }
    }
}

/// The tag of a [`Value`], without its contents.
///
/// Used as the answer template on remote asks: the caller ships the tag of
/// the reply it expects, and the answering side encodes its reply under the
/// same tag discipline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, BorshSerialize, BorshDeserialize)]
pub enum ValueKind {
    Proto,
    Bool,
    Bytes,
    Str,
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    F32,
    F64,
}

impl ValueKind {
    /// An empty value carrying this tag.
    pub fn template(self) -> Value {
        match self {
            ValueKind::Proto => Value::Proto {
                type_url: String::new(),
                data: Vec::new(),
            },
            ValueKind::Bool => Value::Bool(false),
            ValueKind::Bytes => Value::Bytes(Vec::new()),
            ValueKind::Str => Value::Str(String::new()),
            ValueKind::I8 => Value::I8(0),
            ValueKind::I16 => Value::I16(0),
            ValueKind::I32 => Value::I32(0),
            ValueKind::I64 => Value::I64(0),
            ValueKind::U8 => Value::U8(0),
            ValueKind::U16 => Value::U16(0),
            ValueKind::U32 => Value::U32(0),
            ValueKind::U64 => Value::U64(0),
            ValueKind::F32 => Value::F32(0.0),
            ValueKind::F64 => Value::F64(0.0),
        }
    }
}

impl Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueKind::Proto => "proto",
            ValueKind::Bool => "bool",
            ValueKind::Bytes => "bytes",
            ValueKind::Str => "string",
            ValueKind::I8 => "i8",
            ValueKind::I16 => "i16",
            ValueKind::I32 => "i32",
            ValueKind::I64 => "i64",
            ValueKind::U8 => "u8",
            ValueKind::U16 => "u16",
            ValueKind::U32 => "u32",
            ValueKind::U64 => "u64",
            ValueKind::F32 => "f32",
            ValueKind::F64 => "f64",
        };
        f.write_str(name)
    }
}

/// Externally-serialized payload, paired with the [`Value::Proto`] variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtoPayload {
    /// Schema identifier of the encoded message.
    pub type_url: String,
    /// The encoded message body.
    pub data: Vec<u8>,
}

/// Extraction of a typed answer from a [`Value`].
///
/// The typed ask API is parameterized on this trait: `KIND` supplies the
/// answer template shipped to the answering side, and `from_value` performs
/// the checked extraction when the answer comes back.
pub trait FromValue: Sized {
    /// The tag this type extracts from.
    const KIND: ValueKind;

    /// Checked extraction; `None` when the tag does not match.
    fn from_value(value: Value) -> Option<Self>;
}

impl FromValue for ProtoPayload {
    const KIND: ValueKind = ValueKind::Proto;

    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Proto { type_url, data } => Some(ProtoPayload { type_url, data }),
            _ => None,
        }
    }
}

impl From<ProtoPayload> for Value {
    fn from(p: ProtoPayload) -> Self {
        Value::Proto {
            type_url: p.type_url,
            data: p.data,
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

macro_rules! value_primitive {
    ($ty:ty, $variant:ident) => {
        impl From<$ty> for Value {
            fn from(v: $ty) -> Self {
                Value::$variant(v)
            }
        }

        impl FromValue for $ty {
            const KIND: ValueKind = ValueKind::$variant;

            fn from_value(value: Value) -> Option<Self> {
                match value {
                    Value::$variant(v) => Some(v),
                    _ => None,
                }
            }
        }
    };
}

value_primitive!(bool, Bool);
value_primitive!(Vec<u8>, Bytes);
value_primitive!(String, Str);
value_primitive!(i8, I8);
value_primitive!(i16, I16);
value_primitive!(i32, I32);
value_primitive!(i64, I64);
value_primitive!(u8, U8);
value_primitive!(u16, U16);
value_primitive!(u32, U32);
value_primitive!(u64, U64);
value_primitive!(f32, F32);
value_primitive!(f64, F64);
