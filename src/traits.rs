//! Byte-codec traits shared by every wire type, plus the construction-time
//! error they report and the `Display` conventions for public vs. secret types.

use core::fmt;
use core::ops::Sub;

use generic_array::sequence::Split;
use generic_array::typenum::{Diff, Unsigned};
use generic_array::{ArrayLength, GenericArray};

/// A type that has a fixed-width byte representation.
pub trait RepresentableAsArray: Clone {
    /// Length in bytes of the serialized representation.
    type Size: ArrayLength<u8>;
}

/// A type that can be serialized into a fixed-size array.
pub trait SerializableToArray: RepresentableAsArray {
    /// Serializes this object into a fixed-size array.
    fn to_array(&self) -> GenericArray<u8, Self::Size>;

    /// Returns the serialized bytes as a dynamically-sized byte vector.
    #[cfg(feature = "alloc")]
    fn to_bytes(&self) -> alloc::vec::Vec<u8> {
        self.to_array().to_vec()
    }
}

/// A type that can be deserialized from a fixed-size array.
pub trait DeserializableFromArray: RepresentableAsArray + Sized {
    /// Deserializes this object from a fixed-size array.
    fn from_array(arr: &GenericArray<u8, Self::Size>) -> Result<Self, ConstructionError>;

    /// Deserializes this object from a byte slice, requiring it to consume
    /// exactly `Self::Size` bytes (no truncation, no trailing bytes).
    fn from_bytes(bytes: impl AsRef<[u8]>) -> Result<Self, ConstructionError>
    where
        Self: HasTypeName,
    {
        let bytes_slice = bytes.as_ref();
        let expected = Self::Size::to_usize();
        if bytes_slice.len() < expected {
            return Err(ConstructionError::new(Self::type_name(), "bytes are shorter than expected"));
        }
        if bytes_slice.len() > expected {
            return Err(ConstructionError::new(Self::type_name(), "bytes are longer than expected"));
        }
        let arr = GenericArray::<u8, Self::Size>::clone_from_slice(bytes_slice);
        Self::from_array(&arr)
    }

    /// Consumes a prefix of `arr` sized to `Self`, returning the parsed value
    /// and the remaining bytes. Used to assemble composite types out of
    /// `Concat`-ed `GenericArray`s.
    fn take<N>(arr: GenericArray<u8, N>) -> Result<(Self, GenericArray<u8, Diff<N, Self::Size>>), ConstructionError>
    where
        N: ArrayLength<u8> + Sub<Self::Size>,
        Diff<N, Self::Size>: ArrayLength<u8>,
    {
        let (head, tail): (GenericArray<u8, Self::Size>, GenericArray<u8, Diff<N, Self::Size>>) =
            Split::split(arr);
        let obj = Self::from_array(&head)?;
        Ok((obj, tail))
    }

    /// Like [`Self::take`], but asserts there is no remaining tail.
    fn take_last(arr: GenericArray<u8, Self::Size>) -> Result<Self, ConstructionError> {
        Self::from_array(&arr)
    }
}

/// A type with a stable, human-readable name used in error messages and
/// `Display` output.
pub trait HasTypeName {
    /// The name of the type, as it should appear to users.
    fn type_name() -> &'static str;
}

/// Error produced when a wire type cannot be built from the bytes given to it.
#[derive(Debug, PartialEq, Eq)]
pub struct ConstructionError {
    type_name: &'static str,
    reason: &'static str,
}

impl ConstructionError {
    /// Creates a new error naming the type that failed to construct and why.
    pub fn new(type_name: &'static str, reason: &'static str) -> Self {
        Self { type_name, reason }
    }
}

impl fmt::Display for ConstructionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Failed to construct a {}: {}", self.type_name, self.reason)
    }
}

#[cfg(feature = "std")]
impl std::error::Error for ConstructionError {}

/// `Display` helper for public (non-secret) wire types: shows the type name
/// and the base64-encoded wire bytes.
#[cfg(feature = "alloc")]
pub fn fmt_public<T: SerializableToArray + HasTypeName>(
    obj: &T,
    f: &mut fmt::Formatter<'_>,
) -> fmt::Result {
    write!(f, "{}:{}", T::type_name(), base64_encode(&obj.to_array()))
}

/// `Display` helper for secret-bearing types: shows only the type name,
/// never the bytes.
pub fn fmt_secret<T: HasTypeName>(f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}:...", T::type_name())
}

const BASE64_ALPHABET: &[u8; 64] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

#[cfg(feature = "alloc")]
pub(crate) fn base64_encode(bytes: &[u8]) -> alloc::string::String {
    let mut out = alloc::string::String::with_capacity((bytes.len() + 2) / 3 * 4);
    for chunk in bytes.chunks(3) {
        let b0 = chunk[0];
        let b1 = *chunk.get(1).unwrap_or(&0);
        let b2 = *chunk.get(2).unwrap_or(&0);
        let n = (u32::from(b0) << 16) | (u32::from(b1) << 8) | u32::from(b2);
        out.push(BASE64_ALPHABET[((n >> 18) & 0x3f) as usize] as char);
        out.push(BASE64_ALPHABET[((n >> 12) & 0x3f) as usize] as char);
        out.push(if chunk.len() > 1 {
            BASE64_ALPHABET[((n >> 6) & 0x3f) as usize] as char
        } else {
            '='
        });
        out.push(if chunk.len() > 2 {
            BASE64_ALPHABET[(n & 0x3f) as usize] as char
        } else {
            '='
        });
    }
    out
}

/// Decodes a base64 string produced by [`base64_encode`]. Used only by the
/// optional `serde` support (human-facing wire types, not security-critical
/// parsing), so it rejects anything that isn't a clean multiple-of-4-chars
/// encoding rather than trying to be lenient.
#[cfg(feature = "serde")]
pub(crate) fn base64_decode(s: &str) -> Result<alloc::vec::Vec<u8>, &'static str> {
    fn value(c: u8) -> Result<u8, &'static str> {
        BASE64_ALPHABET
            .iter()
            .position(|&b| b == c)
            .map(|i| i as u8)
            .ok_or("invalid base64 character")
    }

    let bytes = s.as_bytes();
    if bytes.is_empty() || bytes.len() % 4 != 0 {
        return Err("base64 input is not a multiple of 4 characters");
    }

    let mut out = alloc::vec::Vec::with_capacity(bytes.len() / 4 * 3);
    for chunk in bytes.chunks(4) {
        let pad = chunk.iter().filter(|&&b| b == b'=').count();
        let n0 = value(chunk[0])?;
        let n1 = value(chunk[1])?;
        let n2 = if chunk[2] == b'=' { 0 } else { value(chunk[2])? };
        let n3 = if chunk[3] == b'=' { 0 } else { value(chunk[3])? };
        let n = (u32::from(n0) << 18) | (u32::from(n1) << 12) | (u32::from(n2) << 6) | u32::from(n3);
        out.push((n >> 16) as u8);
        if pad < 2 {
            out.push((n >> 8) as u8);
        }
        if pad < 1 {
            out.push(n as u8);
        }
    }
    Ok(out)
}

/// Implements `RepresentableAsArray`/`Serializable{To,From}Array` for `bool`,
/// used for the single-byte `mode` flags in `KeyFragProof`.
impl RepresentableAsArray for bool {
    type Size = generic_array::typenum::U1;
}

impl SerializableToArray for bool {
    fn to_array(&self) -> GenericArray<u8, Self::Size> {
        GenericArray::from([*self as u8])
    }
}

impl HasTypeName for bool {
    fn type_name() -> &'static str {
        "bool"
    }
}

impl DeserializableFromArray for bool {
    fn from_array(arr: &GenericArray<u8, Self::Size>) -> Result<Self, ConstructionError> {
        match arr[0] {
            0 => Ok(false),
            1 => Ok(true),
            _ => Err(ConstructionError::new("bool", "not 0 or 1")),
        }
    }
}
