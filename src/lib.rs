//! A threshold proxy re-encryption scheme over secp256k1.
//!
//! Umbral lets a data owner ("delegator") encrypt data once to their own
//! public key, then authorize a set of untrusted proxies to transform the
//! capsule so that a designated recipient can open it with their own secret
//! key — without the proxies or the recipient ever learning the delegator's
//! private key, and without the delegator needing to be online during the
//! transform. Re-encryption is threshold: a capsule is split into `n` key
//! fragments under a `t`-of-`n` scheme, and a recipient needs `t` honestly
//! re-encrypted fragments (out of possibly many more available) to recover
//! the original payload key.
//!
//! The moving pieces, end to end:
//!
//! - [`SecretKey`]/[`PublicKey`] — the delegator's and recipient's asymmetric
//!   keypairs. [`SecretKeyFactory`] deterministically derives per-label
//!   keypairs from a single master seed.
//! - [`encrypt`]/[`encrypt_in_place`] — seal a payload to a delegator's
//!   public key, producing a [`Capsule`] (the KEM half) and a [`Ciphertext`]
//!   (the symmetric half).
//! - [`generate_kfrags`] — split a delegating key into `n` [`VerifiedKeyFrag`]s
//!   under threshold `t`, for handing to proxies.
//! - [`reencrypt`] — a proxy's transform of a [`Capsule`] under one kfrag,
//!   producing a [`VerifiedCapsuleFrag`] for the recipient.
//! - [`decrypt_original`]/[`decrypt_original_in_place`] — the delegator
//!   reading their own ciphertext directly.
//! - [`decrypt_reencrypted`]/[`decrypt_reencrypted_in_place`] — the recipient
//!   reconstructing the payload key from `t` verified capsule fragments and
//!   reading the ciphertext.
//!
//! Every fragment type (`KeyFrag`, `CapsuleFrag`) carries a NIZK proof and is
//! untrusted until it passes its `verify` method, at which point it becomes a
//! `Verified*` wrapper that the rest of the API requires — an invalid or
//! tampered fragment cannot reach [`Capsule::open_reencrypted`].
//!
//! This crate is `no_std`; the `alloc` feature enables `Vec`-returning
//! convenience methods, and the default `std` feature additionally enables
//! `OsRng`-seeded convenience constructors.

#![no_std]
#![warn(missing_docs)]

#[cfg(any(feature = "std", test))]
extern crate std;

extern crate alloc;

mod capsule;
mod capsule_frag;
mod curve;
mod dem;
mod hashing;
mod hashing_ds;
mod key_frag;
mod keys;
mod params;
mod pre;
mod random_oracles;
mod secret_box;
#[cfg(feature = "serde")]
mod serde_support;
mod traits;

pub use capsule::{Capsule, OpenReencryptedError};
pub use capsule_frag::{reencrypt, CapsuleFrag, CapsuleFragProof, VerifiedCapsuleFrag};
pub use key_frag::{generate_kfrags, KeyFrag, KeyFragID, KeyFragProof, VerifiedKeyFrag};
pub use keys::{PublicKey, SecretKey, SecretKeyFactory, Signature, Signer};
pub use pre::{decrypt_original_in_place, DecryptionError};
#[cfg(feature = "alloc")]
pub use pre::{decrypt_reencrypted_in_place, encrypt_in_place};
#[cfg(feature = "std")]
pub use pre::{decrypt_original, decrypt_reencrypted, encrypt};
pub use traits::{ConstructionError, DeserializableFromArray, RepresentableAsArray, SerializableToArray};

#[cfg(feature = "std")]
pub use dem::Ciphertext;
