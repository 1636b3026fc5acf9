//! Domain-separated hash-to-scalar accumulator and the BLAKE2b-based KDF.
//!
//! `ScalarDigest` mirrors `random_oracles.rs`'s `hash_to_scalar`, generalized
//! into an accumulator that the domain-separated hash functions in
//! `hashing_ds.rs` build on top of. The digest is reduced mod the curve order
//! via `elliptic_curve::ops::Reduce`, the same mechanism used throughout the
//! RustCrypto ECDSA stack to turn a hash output into a scalar.
use alloc::vec::Vec;

use blake2::digest::Digest;
use blake2::Blake2b;
use elliptic_curve::bigint::U256;
use elliptic_curve::ops::Reduce;
use generic_array::typenum::U32;
use hkdf::Hkdf;

use crate::curve::CurveScalar;
use crate::traits::SerializableToArray;

type Blake2bHash = Blake2b<U32>;

/// Accumulates a domain-separation tag followed by arbitrary serializable
/// values, then reduces the BLAKE2b digest into a scalar in `[1, n-1]`.
pub(crate) struct ScalarDigest {
    hasher: Blake2bHash,
}

impl ScalarDigest {
    /// Seeds the accumulator with a 1-byte-length-prefixed domain separation
    /// tag, as spec.md §4.1 requires.
    pub(crate) fn new(dst: &'static [u8]) -> Self {
        let mut hasher = Blake2bHash::new();
        debug_assert!(dst.len() <= u8::MAX as usize);
        Digest::update(&mut hasher, [dst.len() as u8]);
        Digest::update(&mut hasher, dst);
        Self { hasher }
    }

    /// Appends raw bytes to the accumulator.
    pub(crate) fn chain_bytes(mut self, bytes: &[u8]) -> Self {
        Digest::update(&mut self.hasher, bytes);
        self
    }

    /// Appends the fixed-width compressed encoding of a serializable value
    /// (points, scalars, keys, ...) to the accumulator.
    pub(crate) fn chain_serializable<T: SerializableToArray>(self, value: &T) -> Self {
        self.chain_bytes(&value.to_array())
    }

    /// Appends a serializable value only if present, matching the optional
    /// pk-folding step of spec.md §4.3/§4.4.
    pub(crate) fn chain_optional_serializable<T: SerializableToArray>(
        self,
        value: Option<&T>,
    ) -> Self {
        match value {
            Some(v) => self.chain_serializable(v),
            None => self,
        }
    }

    /// Finalizes the accumulator into a non-zero scalar, retrying with an
    /// incrementing counter in the vanishingly unlikely event the reduction
    /// yields zero.
    pub(crate) fn finalize(self) -> CurveScalar {
        let digest = self.hasher.finalize();
        let scalar = <CurveScalar as Reduce<U256>>::reduce_bytes(&digest);
        if !bool::from(ff::Field::is_zero(&scalar)) {
            return scalar;
        }

        let mut counter: u32 = 0;
        loop {
            let mut hasher = Blake2bHash::new();
            Digest::update(&mut hasher, digest);
            Digest::update(&mut hasher, counter.to_be_bytes());
            let digest = hasher.finalize();
            let scalar = <CurveScalar as Reduce<U256>>::reduce_bytes(&digest);
            if !bool::from(ff::Field::is_zero(&scalar)) {
                return scalar;
            }
            counter += 1;
        }
    }
}

/// BLAKE2b-based HKDF, producing `length` bytes from `input_bytes` with the
/// given salt and info, per spec.md §4.1.
pub(crate) fn kdf(
    input_bytes: &[u8],
    length: usize,
    salt: Option<&[u8]>,
    info: Option<&[u8]>,
) -> Vec<u8> {
    let hk = Hkdf::<Blake2bHash>::new(salt, input_bytes);
    let mut okm = alloc::vec![0u8; length];
    hk.expand(info.unwrap_or(&[]), &mut okm)
        .expect("HKDF output length is within the digest's valid range");
    okm
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_digest_determinism() {
        let a = ScalarDigest::new(b"TEST").chain_bytes(b"hello").finalize();
        let b = ScalarDigest::new(b"TEST").chain_bytes(b"hello").finalize();
        assert_eq!(a, b);
    }

    #[test]
    fn test_scalar_digest_domain_separation() {
        let a = ScalarDigest::new(b"TEST_A").chain_bytes(b"hello").finalize();
        let b = ScalarDigest::new(b"TEST_B").chain_bytes(b"hello").finalize();
        assert_ne!(a, b);
    }

    #[test]
    fn test_kdf_determinism() {
        let a = kdf(b"seed", 32, Some(b"salt"), Some(b"info"));
        let b = kdf(b"seed", 32, Some(b"salt"), Some(b"info"));
        assert_eq!(a, b);
        assert_eq!(a.len(), 32);
    }
}
