//! Framed binary encoding used for persistence and network replication.
//!
//! All integers are big-endian fixed-width, floats are IEEE-754 in network
//! byte order, strings and sequences carry a `u32` length prefix and optionals
//! a single-byte discriminator. Per-type encoders emit fields in declaration
//! order, so the format of a component or event is the concatenation of its
//! field encodings.

use core::hash::{BuildHasher, Hash};
use core::mem::size_of;

use bytes::{Buf, BufMut, Bytes};
use indexmap::IndexMap;
use thiserror::Error;

use crate::entity::Entity;

/// Error produced when a byte buffer cannot be decoded.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("unexpected end of buffer, {missing} more byte(s) needed")]
    UnexpectedEnd { missing: usize },
    #[error("invalid discriminator {value:#04x} for {kind}")]
    InvalidDiscriminator { kind: &'static str, value: u8 },
    #[error("string bytes are not valid UTF-8")]
    InvalidUtf8,
}

/// Serializes a value into the wire format.
pub trait Encode {
    fn encode(&self, buf: &mut Vec<u8>);

    /// Encodes into a freshly allocated buffer.
    fn to_bytes(&self) -> Bytes {
        let mut buf = Vec::new();
        self.encode(&mut buf);
        buf.into()
    }
}

/// Deserializes a value from the wire format, consuming from the buffer.
pub trait Decode: Sized {
    fn decode(buf: &mut Bytes) -> Result<Self, DecodeError>;

    /// Decodes from a shared buffer without consuming it.
    fn from_bytes(bytes: &Bytes) -> Result<Self, DecodeError> {
        let mut buf = bytes.clone();
        Self::decode(&mut buf)
    }
}

fn ensure(buf: &Bytes, len: usize) -> Result<(), DecodeError> {
    if buf.remaining() < len {
        Err(DecodeError::UnexpectedEnd {
            missing: len - buf.remaining(),
        })
    } else {
        Ok(())
    }
}

macro_rules! impl_scalar {
    ($($ty:ty => $put:ident, $get:ident),* $(,)?) => {
        $(
            impl Encode for $ty {
                fn encode(&self, buf: &mut Vec<u8>) {
                    buf.$put(*self);
                }
            }

            impl Decode for $ty {
                fn decode(buf: &mut Bytes) -> Result<Self, DecodeError> {
                    ensure(buf, size_of::<$ty>())?;
                    Ok(buf.$get())
                }
            }
        )*
    };
}

impl_scalar! {
    u8 => put_u8, get_u8,
    u16 => put_u16, get_u16,
    u32 => put_u32, get_u32,
    u64 => put_u64, get_u64,
    i8 => put_i8, get_i8,
    i16 => put_i16, get_i16,
    i32 => put_i32, get_i32,
    i64 => put_i64, get_i64,
    f32 => put_f32, get_f32,
    f64 => put_f64, get_f64,
}

impl Encode for bool {
    fn encode(&self, buf: &mut Vec<u8>) {
        buf.put_u8(u8::from(*self));
    }
}

impl Decode for bool {
    fn decode(buf: &mut Bytes) -> Result<Self, DecodeError> {
        match u8::decode(buf)? {
            0 => Ok(false),
            1 => Ok(true),
            value => Err(DecodeError::InvalidDiscriminator {
                kind: "bool",
                value,
            }),
        }
    }
}

impl Encode for String {
    fn encode(&self, buf: &mut Vec<u8>) {
        self.as_str().encode(buf);
    }
}

impl Encode for str {
    fn encode(&self, buf: &mut Vec<u8>) {
        buf.put_u32(self.len() as u32);
        buf.extend_from_slice(self.as_bytes());
    }
}

impl Decode for String {
    fn decode(buf: &mut Bytes) -> Result<Self, DecodeError> {
        let len = u32::decode(buf)? as usize;
        ensure(buf, len)?;
        let bytes = buf.copy_to_bytes(len);
        String::from_utf8(bytes.to_vec()).map_err(|_| DecodeError::InvalidUtf8)
    }
}

impl Encode for Entity {
    fn encode(&self, buf: &mut Vec<u8>) {
        buf.put_u32(self.index());
    }
}

impl Decode for Entity {
    fn decode(buf: &mut Bytes) -> Result<Self, DecodeError> {
        Ok(Entity::from_index(u32::decode(buf)?))
    }
}

impl<T: Encode> Encode for Vec<T> {
    fn encode(&self, buf: &mut Vec<u8>) {
        buf.put_u32(self.len() as u32);
        for item in self {
            item.encode(buf);
        }
    }
}

impl<T: Decode> Decode for Vec<T> {
    fn decode(buf: &mut Bytes) -> Result<Self, DecodeError> {
        let len = u32::decode(buf)? as usize;
        let mut items = Vec::with_capacity(len.min(buf.remaining()));
        for _ in 0..len {
            items.push(T::decode(buf)?);
        }
        Ok(items)
    }
}

impl<T: Encode> Encode for Option<T> {
    fn encode(&self, buf: &mut Vec<u8>) {
        match self {
            None => buf.put_u8(0),
            Some(value) => {
                buf.put_u8(1);
                value.encode(buf);
            }
        }
    }
}

impl<T: Decode> Decode for Option<T> {
    fn decode(buf: &mut Bytes) -> Result<Self, DecodeError> {
        match u8::decode(buf)? {
            0 => Ok(None),
            1 => Ok(Some(T::decode(buf)?)),
            value => Err(DecodeError::InvalidDiscriminator {
                kind: "option",
                value,
            }),
        }
    }
}

impl<A: Encode, B: Encode> Encode for (A, B) {
    fn encode(&self, buf: &mut Vec<u8>) {
        self.0.encode(buf);
        self.1.encode(buf);
    }
}

impl<A: Decode, B: Decode> Decode for (A, B) {
    fn decode(buf: &mut Bytes) -> Result<Self, DecodeError> {
        Ok((A::decode(buf)?, B::decode(buf)?))
    }
}

impl<K: Encode, V: Encode, S> Encode for IndexMap<K, V, S> {
    fn encode(&self, buf: &mut Vec<u8>) {
        buf.put_u32(self.len() as u32);
        for (key, value) in self {
            key.encode(buf);
            value.encode(buf);
        }
    }
}

impl<K, V, S> Decode for IndexMap<K, V, S>
where
    K: Decode + Hash + Eq,
    V: Decode,
    S: BuildHasher + Default,
{
    fn decode(buf: &mut Bytes) -> Result<Self, DecodeError> {
        let len = u32::decode(buf)? as usize;
        let mut map = Self::with_capacity_and_hasher(len.min(buf.remaining()), S::default());
        for _ in 0..len {
            let key = K::decode(buf)?;
            let value = V::decode(buf)?;
            map.insert(key, value);
        }
        Ok(map)
    }
}

impl Encode for Bytes {
    fn encode(&self, buf: &mut Vec<u8>) {
        buf.put_u32(self.len() as u32);
        buf.extend_from_slice(self);
    }
}

impl Decode for Bytes {
    fn decode(buf: &mut Bytes) -> Result<Self, DecodeError> {
        let len = u32::decode(buf)? as usize;
        ensure(buf, len)?;
        Ok(buf.copy_to_bytes(len))
    }
}
