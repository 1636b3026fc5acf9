//! Optional `serde` support. Every wire type (spec.md §6) gets `Serialize`/
//! `Deserialize` for free by delegating to its existing fixed-width byte
//! codec, matching `fetchai-rust-umbral`'s `capsule.rs` (`serde_serialize`/
//! `serde_deserialize`/`Representation`). That file's companion `serde`
//! module wasn't part of the retrieved pack, so this one is built fresh in
//! its evident shape: a `Representation` choosing how the fixed-width bytes
//! are carried over the wire, with `Base64` the only representation any
//! caller in the pack actually selects.

use alloc::string::String;
use alloc::vec::Vec;

use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::traits::{base64_decode, base64_encode, DeserializableFromArray, HasTypeName, SerializableToArray};

/// How a wire type's fixed-width bytes are carried through `serde`.
pub(crate) enum Representation {
    /// Base64-encoded string, used by every wire type in this crate.
    Base64,
}

/// Serializes `obj` via its [`SerializableToArray`] codec, in the given
/// [`Representation`].
pub(crate) fn serde_serialize<T, S>(
    obj: &T,
    serializer: S,
    representation: Representation,
) -> Result<S::Ok, S::Error>
where
    T: SerializableToArray,
    S: Serializer,
{
    match representation {
        Representation::Base64 => serializer.serialize_str(&base64_encode(&obj.to_array())),
    }
}

/// Reverses [`serde_serialize`], routing through [`DeserializableFromArray::from_bytes`]
/// so short/extra-byte inputs are rejected the same way a direct `from_bytes`
/// call would reject them.
pub(crate) fn serde_deserialize<'de, T, D>(
    deserializer: D,
    representation: Representation,
) -> Result<T, D::Error>
where
    T: DeserializableFromArray + HasTypeName,
    D: Deserializer<'de>,
{
    match representation {
        Representation::Base64 => {
            let encoded = String::deserialize(deserializer)?;
            let bytes: Vec<u8> = base64_decode(&encoded).map_err(DeError::custom)?;
            T::from_bytes(bytes).map_err(DeError::custom)
        }
    }
}
