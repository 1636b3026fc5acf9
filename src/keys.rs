//! Key types and signatures: [`SecretKey`]/[`PublicKey`] keypairs,
//! [`SecretKeyFactory`] for deterministic per-label key derivation, and
//! [`Signer`]/[`Signature`] for the BLAKE2b-256-prehash ECDSA signatures used
//! throughout kfrag/cfrag proofs (spec.md §4.1, §4.2).

use core::hash::{Hash, Hasher};

use blake2::{digest::Digest, Blake2b};
use ecdsa::signature::hazmat::{PrehashSigner, PrehashVerifier};
use generic_array::typenum::U32;
use generic_array::GenericArray;
use k256::Secp256k1;
use rand_core::{CryptoRng, RngCore};

use crate::curve::{curve_generator, CurvePoint, CurveScalar, NonZeroCurveScalar, PointSize, ScalarSize};
use crate::hashing::{kdf, ScalarDigest};
use crate::secret_box::SecretBox;
use crate::traits::{
    fmt_public, fmt_secret, ConstructionError, DeserializableFromArray, HasTypeName,
    RepresentableAsArray, SerializableToArray,
};

#[cfg(feature = "serde")]
use crate::serde_support::{serde_deserialize, serde_serialize, Representation};
#[cfg(feature = "serde")]
use serde::{Deserialize, Deserializer, Serialize, Serializer};

type Blake2b256 = Blake2b<U32>;

const SIGNATURE_DST: &[u8] = b"SIGNATURE_PREHASH";
const SKF_FACTORY_INFO: &[u8] = b"SECRET_KEY_FACTORY_FACTORY";
const SKF_KEY_INFO: &[u8] = b"SECRET_KEY_FACTORY_KEY";
const SKF_KEY_DST: &[u8] = b"SKF_SECRET_KEY";

fn prehash(message: &[u8]) -> [u8; 32] {
    let mut hasher = Blake2b256::new();
    Digest::update(&mut hasher, SIGNATURE_DST);
    Digest::update(&mut hasher, message);
    hasher.finalize().into()
}

/// A secret scalar and its associated [`PublicKey`].
pub struct SecretKey {
    scalar: SecretBox<NonZeroCurveScalar>,
}

impl SecretKey {
    /// Draws a uniformly random secret key using the given RNG.
    pub fn random(rng: &mut (impl CryptoRng + RngCore)) -> Self {
        Self { scalar: SecretBox::new(NonZeroCurveScalar::random(rng)) }
    }

    #[cfg(feature = "std")]
    pub fn random_with_os_rng() -> Self {
        Self::random(&mut rand_core::OsRng)
    }

    pub(crate) fn to_secret_scalar(&self) -> &CurveScalar {
        self.scalar.as_secret().as_scalar()
    }

    /// Derives the corresponding public key, `g * sk`.
    pub fn public_key(&self) -> PublicKey {
        PublicKey::from_point(&curve_generator() * self.to_secret_scalar())
    }
}

impl RepresentableAsArray for SecretKey {
    type Size = ScalarSize;
}

impl SerializableToArray for SecretKey {
    fn to_array(&self) -> GenericArray<u8, Self::Size> {
        self.scalar.as_secret().to_array()
    }
}

impl HasTypeName for SecretKey {
    fn type_name() -> &'static str {
        "SecretKey"
    }
}

impl DeserializableFromArray for SecretKey {
    fn from_array(arr: &GenericArray<u8, Self::Size>) -> Result<Self, ConstructionError> {
        Ok(Self { scalar: SecretBox::new(NonZeroCurveScalar::from_array(arr)?) })
    }
}

#[cfg(feature = "serde")]
#[cfg_attr(docsrs, doc(cfg(feature = "serde")))]
impl Serialize for SecretKey {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serde_serialize(self, serializer, Representation::Base64)
    }
}

#[cfg(feature = "serde")]
#[cfg_attr(docsrs, doc(cfg(feature = "serde")))]
impl<'de> Deserialize<'de> for SecretKey {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        serde_deserialize(deserializer, Representation::Base64)
    }
}

impl Clone for SecretKey {
    fn clone(&self) -> Self {
        Self { scalar: SecretBox::new(*self.scalar.as_secret()) }
    }
}

impl core::fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        fmt_secret::<Self>(f)
    }
}

/// A public curve point, the `g * sk` half of a keypair.
#[derive(Clone, Copy, Debug)]
pub struct PublicKey {
    point: CurvePoint,
}

impl PublicKey {
    pub(crate) fn from_point(point: CurvePoint) -> Self {
        Self { point }
    }

    pub(crate) fn from_secret_key(secret_key: &SecretKey) -> Self {
        secret_key.public_key()
    }

    pub(crate) fn to_point(&self) -> CurvePoint {
        self.point
    }
}

impl RepresentableAsArray for PublicKey {
    type Size = PointSize;
}

impl SerializableToArray for PublicKey {
    fn to_array(&self) -> GenericArray<u8, Self::Size> {
        self.point.to_array()
    }
}

impl HasTypeName for PublicKey {
    fn type_name() -> &'static str {
        "PublicKey"
    }
}

impl DeserializableFromArray for PublicKey {
    fn from_array(arr: &GenericArray<u8, Self::Size>) -> Result<Self, ConstructionError> {
        Ok(Self { point: CurvePoint::from_array(arr)? })
    }
}

#[cfg(feature = "serde")]
#[cfg_attr(docsrs, doc(cfg(feature = "serde")))]
impl Serialize for PublicKey {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serde_serialize(self, serializer, Representation::Base64)
    }
}

#[cfg(feature = "serde")]
#[cfg_attr(docsrs, doc(cfg(feature = "serde")))]
impl<'de> Deserialize<'de> for PublicKey {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        serde_deserialize(deserializer, Representation::Base64)
    }
}

impl PartialEq for PublicKey {
    fn eq(&self, other: &Self) -> bool {
        self.to_array() == other.to_array()
    }
}

impl Eq for PublicKey {}

impl Hash for PublicKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.to_array().hash(state);
    }
}

#[cfg(feature = "alloc")]
impl core::fmt::Display for PublicKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        fmt_public(self, f)
    }
}

/// Derives unlimited secret keys from a root seed and arbitrary labels,
/// without needing to persist each derived key (spec.md §4.2's "label-keyed
/// key derivation").
pub struct SecretKeyFactory {
    seed: SecretBox<[u8; 32]>,
}

impl SecretKeyFactory {
    /// Draws a random root seed using the given RNG.
    pub fn random(rng: &mut (impl CryptoRng + RngCore)) -> Self {
        let mut seed = [0u8; 32];
        rng.fill_bytes(&mut seed);
        Self { seed: SecretBox::new(seed) }
    }

    #[cfg(feature = "std")]
    pub fn random_with_os_rng() -> Self {
        Self::random(&mut rand_core::OsRng)
    }

    /// Derives a child factory scoped to `label`, so a caller holding only
    /// the child cannot derive keys outside that label's namespace.
    pub fn make_factory(&self, label: &[u8]) -> Self {
        let derived = kdf(self.seed.as_secret(), 32, Some(label), Some(SKF_FACTORY_INFO));
        let mut seed = [0u8; 32];
        seed.copy_from_slice(&derived);
        Self { seed: SecretBox::new(seed) }
    }

    /// Derives a secret key scoped to `label`. Deterministic: the same
    /// factory and label always yield the same key.
    pub fn make_key(&self, label: &[u8]) -> SecretKey {
        let derived = kdf(self.seed.as_secret(), 64, Some(label), Some(SKF_KEY_INFO));
        let scalar = ScalarDigest::new(SKF_KEY_DST).chain_bytes(&derived).finalize();
        SecretKey { scalar: SecretBox::new(NonZeroCurveScalar::from_nonzero_scalar(scalar)) }
    }
}

impl core::fmt::Debug for SecretKeyFactory {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        fmt_secret::<Self>(f)
    }
}

impl Clone for SecretKeyFactory {
    fn clone(&self) -> Self {
        Self { seed: SecretBox::new(*self.seed.as_secret()) }
    }
}

impl HasTypeName for SecretKeyFactory {
    fn type_name() -> &'static str {
        "SecretKeyFactory"
    }
}

impl RepresentableAsArray for SecretKeyFactory {
    type Size = U32;
}

impl SerializableToArray for SecretKeyFactory {
    fn to_array(&self) -> GenericArray<u8, Self::Size> {
        GenericArray::clone_from_slice(self.seed.as_secret())
    }
}

impl DeserializableFromArray for SecretKeyFactory {
    fn from_array(arr: &GenericArray<u8, Self::Size>) -> Result<Self, ConstructionError> {
        let mut seed = [0u8; 32];
        seed.copy_from_slice(arr);
        Ok(Self { seed: SecretBox::new(seed) })
    }
}

#[cfg(feature = "serde")]
#[cfg_attr(docsrs, doc(cfg(feature = "serde")))]
impl Serialize for SecretKeyFactory {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serde_serialize(self, serializer, Representation::Base64)
    }
}

#[cfg(feature = "serde")]
#[cfg_attr(docsrs, doc(cfg(feature = "serde")))]
impl<'de> Deserialize<'de> for SecretKeyFactory {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        serde_deserialize(deserializer, Representation::Base64)
    }
}

/// Signs messages with a [`SecretKey`], via a BLAKE2b-256 prehash (spec.md
/// §9's deviation from the more common SHA3-256 prehash).
#[derive(Clone)]
pub struct Signer(SecretKey);

impl Signer {
    pub fn new(secret_key: SecretKey) -> Self {
        Self(secret_key)
    }

    pub fn verifying_key(&self) -> PublicKey {
        self.0.public_key()
    }

    pub fn sign(&self, message: &[u8]) -> Signature {
        let signing_key = ecdsa::SigningKey::<Secp256k1>::from_bytes(&self.0.to_secret_scalar().to_array())
            .expect("a non-zero scalar is always a valid ECDSA signing key");
        let digest = prehash(message);
        let sig: ecdsa::Signature<Secp256k1> = signing_key
            .sign_prehash(&digest)
            .expect("prehash signing with a valid signing key does not fail");
        let sig = sig.normalize_s().unwrap_or(sig);
        Signature(sig)
    }
}

impl core::fmt::Debug for Signer {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        fmt_secret::<Self>(f)
    }
}

impl HasTypeName for Signer {
    fn type_name() -> &'static str {
        "Signer"
    }
}

/// A fixed-width `r ‖ s` ECDSA signature.
#[derive(Clone, Copy, Debug)]
pub struct Signature(ecdsa::Signature<Secp256k1>);

impl Signature {
    /// Verifies this signature against `message` under `public_key`.
    pub fn verify(&self, public_key: &PublicKey, message: &[u8]) -> bool {
        let verifying_key = match ecdsa::VerifyingKey::<Secp256k1>::from_affine(public_key.to_point().to_affine()) {
            Ok(k) => k,
            Err(_) => return false,
        };
        let digest = prehash(message);
        verifying_key.verify_prehash(&digest, &self.0).is_ok()
    }
}

impl RepresentableAsArray for Signature {
    type Size = generic_array::typenum::U64;
}

impl SerializableToArray for Signature {
    fn to_array(&self) -> GenericArray<u8, Self::Size> {
        self.0.to_bytes()
    }
}

impl HasTypeName for Signature {
    fn type_name() -> &'static str {
        "Signature"
    }
}

impl DeserializableFromArray for Signature {
    fn from_array(arr: &GenericArray<u8, Self::Size>) -> Result<Self, ConstructionError> {
        ecdsa::Signature::<Secp256k1>::from_slice(arr)
            .map(Signature)
            .map_err(|_| ConstructionError::new(Self::type_name(), "invalid r/s encoding"))
    }
}

#[cfg(feature = "alloc")]
impl core::fmt::Display for Signature {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        fmt_public(self, f)
    }
}

#[cfg(feature = "serde")]
#[cfg_attr(docsrs, doc(cfg(feature = "serde")))]
impl Serialize for Signature {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serde_serialize(self, serializer, Representation::Base64)
    }
}

#[cfg(feature = "serde")]
#[cfg_attr(docsrs, doc(cfg(feature = "serde")))]
impl<'de> Deserialize<'de> for Signature {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        serde_deserialize(deserializer, Representation::Base64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand_core::OsRng;

    #[test]
    fn test_keypair_roundtrip() {
        let sk = SecretKey::random(&mut OsRng);
        let pk = sk.public_key();
        let arr = sk.to_array();
        let sk2 = SecretKey::from_array(&arr).unwrap();
        assert_eq!(sk2.public_key(), pk);
    }

    #[test]
    fn test_public_key_equality_matches_bytes() {
        let sk = SecretKey::random(&mut OsRng);
        let pk_a = sk.public_key();
        let pk_b = PublicKey::from_array(&pk_a.to_array()).unwrap();
        assert_eq!(pk_a, pk_b);

        use std::collections::hash_map::DefaultHasher;
        use std::hash::Hasher as _;
        let mut ha = DefaultHasher::new();
        pk_a.hash(&mut ha);
        let mut hb = DefaultHasher::new();
        pk_b.hash(&mut hb);
        assert_eq!(ha.finish(), hb.finish());
    }

    #[test]
    fn test_sign_and_verify() {
        let sk = SecretKey::random(&mut OsRng);
        let signer = Signer::new(sk.clone());
        let pk = sk.public_key();

        let signature = signer.sign(b"peace at dawn");
        assert!(signature.verify(&pk, b"peace at dawn"));
        assert!(!signature.verify(&pk, b"peace at dusk"));
    }

    #[test]
    fn test_signature_roundtrip() {
        let sk = SecretKey::random(&mut OsRng);
        let signer = Signer::new(sk);
        let signature = signer.sign(b"message");
        let arr = signature.to_array();
        let signature2 = Signature::from_array(&arr).unwrap();
        assert!(signature2.verify(&signer.verifying_key(), b"message"));
    }

    #[test]
    fn test_secret_key_factory_determinism() {
        let factory = SecretKeyFactory::random(&mut OsRng);
        let key_a = factory.make_key(b"alice");
        let key_b = factory.make_key(b"alice");
        assert_eq!(key_a.public_key(), key_b.public_key());

        let key_c = factory.make_key(b"bob");
        assert_ne!(key_a.public_key(), key_c.public_key());
    }

    #[test]
    fn test_secret_key_factory_child_scoping() {
        let factory = SecretKeyFactory::random(&mut OsRng);
        let child = factory.make_factory(b"scope");
        let key_from_child = child.make_key(b"alice");
        let key_from_root = factory.make_key(b"alice");
        assert_ne!(key_from_child.public_key(), key_from_root.public_key());
    }

    #[test]
    fn test_secret_key_factory_roundtrip() {
        let factory = SecretKeyFactory::random(&mut OsRng);
        let arr = factory.to_array();
        let factory2 = SecretKeyFactory::from_array(&arr).unwrap();
        assert_eq!(factory.make_key(b"alice").public_key(), factory2.make_key(b"alice").public_key());
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_public_key_serde_roundtrip() {
        let sk = SecretKey::random(&mut OsRng);
        let pk = sk.public_key();
        let encoded = serde_json::to_string(&pk).unwrap();
        let pk2: PublicKey = serde_json::from_str(&encoded).unwrap();
        assert_eq!(pk, pk2);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_secret_key_serde_roundtrip() {
        let sk = SecretKey::random(&mut OsRng);
        let encoded = serde_json::to_string(&sk).unwrap();
        let sk2: SecretKey = serde_json::from_str(&encoded).unwrap();
        assert_eq!(sk.public_key(), sk2.public_key());
    }
}
