//! Key fragments: Alice's split re-encryption key material, one per proxy
//! (spec.md §4.3). A [`KeyFrag`] carries enough signed context that both the
//! re-encrypting proxy and the final recipient can check it was honestly
//! generated before trusting it.

#[cfg(feature = "alloc")]
use alloc::vec::Vec;

use ff::Field;
use generic_array::typenum::{op, U1};
use generic_array::GenericArray;
use rand_core::{CryptoRng, RngCore};

use crate::curve::{curve_generator, scalar_invert, CurvePoint, CurveScalar, NonZeroCurveScalar, PointSize, ScalarSize};
use crate::hashing_ds::{hash_to_cfrag_signature, hash_to_polynomial_arg, hash_to_shared_secret};
use crate::keys::{PublicKey, SecretKey, Signature, Signer};
use crate::params::Parameters;
use crate::traits::{
    ConstructionError, DeserializableFromArray, HasTypeName, RepresentableAsArray,
    SerializableToArray,
};

#[cfg(feature = "serde")]
use crate::serde_support::{serde_deserialize, serde_serialize, Representation};
#[cfg(feature = "serde")]
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// The identifier of a [`KeyFrag`], the `x`-coordinate's seed used to derive
/// the polynomial evaluation point (spec.md §4.3 step 4a).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct KeyFragID(NonZeroCurveScalar);

impl KeyFragID {
    fn random(rng: &mut (impl CryptoRng + RngCore)) -> Self {
        Self(NonZeroCurveScalar::random(rng))
    }

    pub(crate) fn as_scalar(&self) -> &CurveScalar {
        self.0.as_scalar()
    }
}

impl RepresentableAsArray for KeyFragID {
    type Size = ScalarSize;
}

impl SerializableToArray for KeyFragID {
    fn to_array(&self) -> GenericArray<u8, Self::Size> {
        self.0.to_array()
    }
}

impl HasTypeName for KeyFragID {
    fn type_name() -> &'static str {
        "KeyFragID"
    }
}

impl DeserializableFromArray for KeyFragID {
    fn from_array(arr: &GenericArray<u8, Self::Size>) -> Result<Self, ConstructionError> {
        Ok(Self(NonZeroCurveScalar::from_array(arr)?))
    }
}

type SignatureSize = <Signature as RepresentableAsArray>::Size;
type KeyFragProofSize = op!(PointSize + SignatureSize + SignatureSize + U1 + U1);

/// The proof attached to a [`KeyFrag`]: a Pedersen-style commitment to the
/// fragment's key share, plus two signatures over it — one the proxy can
/// check on its own, one that additionally binds in the delegating/receiving
/// keys when the issuer opted to sign them in (spec.md §4.3 steps 4d/4e).
#[derive(Clone, Copy, Debug)]
pub struct KeyFragProof {
    pub(crate) commitment: CurvePoint,
    pub(crate) signature_for_proxy: Signature,
    pub(crate) signature_for_bob: Signature,
    pub(crate) delegating_key_signed: bool,
    pub(crate) receiving_key_signed: bool,
}

impl RepresentableAsArray for KeyFragProof {
    type Size = KeyFragProofSize;
}

impl SerializableToArray for KeyFragProof {
    fn to_array(&self) -> GenericArray<u8, Self::Size> {
        use generic_array::sequence::Concat;
        self.commitment
            .to_array()
            .concat(self.signature_for_proxy.to_array())
            .concat(self.signature_for_bob.to_array())
            .concat(self.delegating_key_signed.to_array())
            .concat(self.receiving_key_signed.to_array())
    }
}

impl HasTypeName for KeyFragProof {
    fn type_name() -> &'static str {
        "KeyFragProof"
    }
}

impl DeserializableFromArray for KeyFragProof {
    fn from_array(arr: &GenericArray<u8, Self::Size>) -> Result<Self, ConstructionError> {
        let (commitment, rest) = CurvePoint::take(arr.clone())?;
        let (signature_for_proxy, rest) = Signature::take(rest)?;
        let (signature_for_bob, rest) = Signature::take(rest)?;
        let (delegating_key_signed, rest) = bool::take(rest)?;
        let receiving_key_signed = bool::take_last(rest)?;
        Ok(Self {
            commitment,
            signature_for_proxy,
            signature_for_bob,
            delegating_key_signed,
            receiving_key_signed,
        })
    }
}

#[cfg(feature = "serde")]
#[cfg_attr(docsrs, doc(cfg(feature = "serde")))]
impl Serialize for KeyFragProof {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serde_serialize(self, serializer, Representation::Base64)
    }
}

#[cfg(feature = "serde")]
#[cfg_attr(docsrs, doc(cfg(feature = "serde")))]
impl<'de> Deserialize<'de> for KeyFragProof {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        serde_deserialize(deserializer, Representation::Base64)
    }
}

type KeyFragSize = op!(ScalarSize + ScalarSize + PointSize + KeyFragProofSize);

/// A single re-encryption key fragment, issued by Alice (via a
/// [`KeyFragFactory`]) to one proxy.
#[derive(Clone, Copy, Debug)]
pub struct KeyFrag {
    pub(crate) params: Parameters,
    pub(crate) id: KeyFragID,
    pub(crate) key: CurveScalar,
    pub(crate) precursor: CurvePoint,
    pub(crate) proof: KeyFragProof,
}

impl KeyFrag {
    /// Checks both signatures in this fragment's proof, and that the
    /// commitment matches the revealed key share. Consumes `self`; on
    /// success returns a [`VerifiedKeyFrag`] that later APIs require, on
    /// failure hands the fragment back unchanged.
    ///
    /// `maybe_delegating_pk`/`maybe_receiving_pk` must be supplied whenever
    /// the proof says the corresponding key was signed in — if the proof
    /// claims a key was bound and the caller can't supply it, verification
    /// fails rather than silently skipping that half of the check.
    pub fn verify(
        self,
        verifying_pk: &PublicKey,
        maybe_delegating_pk: Option<&PublicKey>,
        maybe_receiving_pk: Option<&PublicKey>,
    ) -> Result<VerifiedKeyFrag, Self> {
        if self.verify_inner(verifying_pk, maybe_delegating_pk, maybe_receiving_pk) {
            Ok(VerifiedKeyFrag(self))
        } else {
            Err(self)
        }
    }

    fn verify_inner(
        &self,
        verifying_pk: &PublicKey,
        maybe_delegating_pk: Option<&PublicKey>,
        maybe_receiving_pk: Option<&PublicKey>,
    ) -> bool {
        let expected_commitment = &self.params.u * &self.key;
        if expected_commitment != self.proof.commitment {
            return false;
        }

        let id_bytes = self.id.to_array();
        let proxy_challenge =
            hash_to_cfrag_signature(&id_bytes, &self.proof.commitment, &self.precursor, None, None);
        if !self.proof.signature_for_proxy.verify(verifying_pk, &proxy_challenge.to_array()) {
            return false;
        }

        let delegating_for_bob = if self.proof.delegating_key_signed {
            match maybe_delegating_pk {
                Some(pk) => Some(pk),
                None => return false,
            }
        } else {
            None
        };
        let receiving_for_bob = if self.proof.receiving_key_signed {
            match maybe_receiving_pk {
                Some(pk) => Some(pk),
                None => return false,
            }
        } else {
            None
        };
        let bob_challenge = hash_to_cfrag_signature(
            &id_bytes,
            &self.proof.commitment,
            &self.precursor,
            delegating_for_bob,
            receiving_for_bob,
        );
        self.proof.signature_for_bob.verify(verifying_pk, &bob_challenge.to_array())
    }
}

impl RepresentableAsArray for KeyFrag {
    type Size = KeyFragSize;
}

impl SerializableToArray for KeyFrag {
    fn to_array(&self) -> GenericArray<u8, Self::Size> {
        use generic_array::sequence::Concat;
        self.id
            .to_array()
            .concat(self.key.to_array())
            .concat(self.precursor.to_array())
            .concat(self.proof.to_array())
    }
}

impl HasTypeName for KeyFrag {
    fn type_name() -> &'static str {
        "KeyFrag"
    }
}

impl DeserializableFromArray for KeyFrag {
    fn from_array(arr: &GenericArray<u8, Self::Size>) -> Result<Self, ConstructionError> {
        let (id, rest) = KeyFragID::take(arr.clone())?;
        let (key, rest) = CurveScalar::take(rest)?;
        let (precursor, rest) = CurvePoint::take(rest)?;
        let proof = KeyFragProof::take_last(rest)?;
        Ok(Self { params: Parameters::new(), id, key, precursor, proof })
    }
}

#[cfg(feature = "serde")]
#[cfg_attr(docsrs, doc(cfg(feature = "serde")))]
impl Serialize for KeyFrag {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serde_serialize(self, serializer, Representation::Base64)
    }
}

#[cfg(feature = "serde")]
#[cfg_attr(docsrs, doc(cfg(feature = "serde")))]
impl<'de> Deserialize<'de> for KeyFrag {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        serde_deserialize(deserializer, Representation::Base64)
    }
}

/// A [`KeyFrag`] that has passed [`KeyFrag::verify`]. The only way to obtain
/// one from outside this crate; [`crate::capsule_frag::reencrypt`] requires
/// it so a proxy cannot accidentally re-encrypt with an unchecked fragment.
#[derive(Clone, Copy, Debug)]
pub struct VerifiedKeyFrag(KeyFrag);

impl VerifiedKeyFrag {
    pub(crate) fn key_frag(&self) -> &KeyFrag {
        &self.0
    }

    /// Strips the verified guarantee back off, e.g. to serialize the
    /// fragment for transport.
    pub fn into_unverified(self) -> KeyFrag {
        self.0
    }
}

/// Issues a threshold's worth of [`KeyFrag`]s sharing one ephemeral
/// precursor, so every fragment evaluates the same degree-`(threshold - 1)`
/// polynomial at a distinct point (spec.md §4.3).
pub(crate) struct KeyFragFactory {
    signer: Signer,
    precursor: CurvePoint,
    /// The ephemeral scalar `x_A` the precursor/dh_point were derived from.
    /// No longer needed once those are computed, but kept around only so it
    /// gets scrubbed by `Drop` rather than leaking in a stack frame (spec.md
    /// §3 Lifecycle, §5).
    precursor_scalar: CurveScalar,
    dh_point: CurvePoint,
    params: Parameters,
    delegating_pk: PublicKey,
    receiving_pk: PublicKey,
    /// `coefficients[0] = sk_A * d_inv` is secret-derived; the rest are
    /// uniformly random polynomial coefficients. Scrubbed on `Drop`.
    coefficients: Vec<CurveScalar>,
    sign_delegating_key: bool,
    sign_receiving_key: bool,
}

impl KeyFragFactory {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        rng: &mut (impl CryptoRng + RngCore),
        delegating_sk: &SecretKey,
        receiving_pk: &PublicKey,
        signer: &Signer,
        threshold: usize,
        sign_delegating_key: bool,
        sign_receiving_key: bool,
    ) -> Self {
        let params = Parameters::new();
        let precursor_scalar = NonZeroCurveScalar::random(rng);
        let precursor = &curve_generator() * precursor_scalar.as_scalar();
        let dh_point = &receiving_pk.to_point() * precursor_scalar.as_scalar();

        let d = hash_to_shared_secret(&precursor, &receiving_pk.to_point(), &dh_point);
        let d_inv = scalar_invert(&d).expect("hash_to_shared_secret never returns zero");

        let mut coefficients = Vec::with_capacity(threshold);
        coefficients.push(*delegating_sk.to_secret_scalar() * d_inv);
        for _ in 1..threshold {
            coefficients.push(CurveScalar::random(&mut *rng));
        }

        Self {
            signer: signer.clone(),
            precursor,
            precursor_scalar: *precursor_scalar.as_scalar(),
            dh_point,
            params,
            delegating_pk: delegating_sk.public_key(),
            receiving_pk: *receiving_pk,
            coefficients,
            sign_delegating_key,
            sign_receiving_key,
        }
    }

    pub(crate) fn make(&self, rng: &mut (impl CryptoRng + RngCore)) -> VerifiedKeyFrag {
        let id = KeyFragID::random(rng);
        let x = hash_to_polynomial_arg(&self.precursor, &self.receiving_pk.to_point(), &self.dh_point, &id.to_array());

        let mut key = CurveScalar::ZERO;
        for coeff in self.coefficients.iter().rev() {
            key = key * x + *coeff;
        }

        let commitment = &self.params.u * &key;

        let id_bytes = id.to_array();
        let proxy_challenge = hash_to_cfrag_signature(&id_bytes, &commitment, &self.precursor, None, None);
        let signature_for_proxy = self.signer.sign(&proxy_challenge.to_array());

        let maybe_delegating = self.sign_delegating_key.then_some(&self.delegating_pk);
        let maybe_receiving = self.sign_receiving_key.then_some(&self.receiving_pk);
        let bob_challenge =
            hash_to_cfrag_signature(&id_bytes, &commitment, &self.precursor, maybe_delegating, maybe_receiving);
        let signature_for_bob = self.signer.sign(&bob_challenge.to_array());

        VerifiedKeyFrag(KeyFrag {
            params: self.params,
            id,
            key,
            precursor: self.precursor,
            proof: KeyFragProof {
                commitment,
                signature_for_proxy,
                signature_for_bob,
                delegating_key_signed: self.sign_delegating_key,
                receiving_key_signed: self.sign_receiving_key,
            },
        })
    }
}

impl Drop for KeyFragFactory {
    fn drop(&mut self) {
        self.precursor_scalar = CurveScalar::ZERO;
        for coeff in self.coefficients.iter_mut() {
            *coeff = CurveScalar::ZERO;
        }
    }
}

/// Splits `delegating_sk` into `num_kfrags` fragments, any `threshold` of
/// which can reconstruct a re-encryption of a capsule meant for
/// `delegating_sk`'s owner into one meant for `receiving_pk`'s owner
/// (spec.md §4.3's `generate_kfrags`).
#[cfg(feature = "alloc")]
#[allow(clippy::too_many_arguments)]
pub fn generate_kfrags(
    rng: &mut (impl CryptoRng + RngCore),
    delegating_sk: &SecretKey,
    receiving_pk: &PublicKey,
    signer: &Signer,
    threshold: usize,
    num_kfrags: usize,
    sign_delegating_key: bool,
    sign_receiving_key: bool,
) -> Vec<VerifiedKeyFrag> {
    let factory = KeyFragFactory::new(rng, delegating_sk, receiving_pk, signer, threshold, sign_delegating_key, sign_receiving_key);
    (0..num_kfrags).map(|_| factory.make(rng)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand_core::OsRng;

    fn setup(threshold: usize, num_kfrags: usize, sign_d: bool, sign_r: bool) -> (PublicKey, PublicKey, PublicKey, Vec<VerifiedKeyFrag>) {
        let delegating_sk = SecretKey::random(&mut OsRng);
        let receiving_sk = SecretKey::random(&mut OsRng);
        let signing_sk = SecretKey::random(&mut OsRng);
        let signer = Signer::new(signing_sk.clone());

        let kfrags = generate_kfrags(
            &mut OsRng,
            &delegating_sk,
            &receiving_sk.public_key(),
            &signer,
            threshold,
            num_kfrags,
            sign_d,
            sign_r,
        );
        (delegating_sk.public_key(), receiving_sk.public_key(), signing_sk.public_key(), kfrags)
    }

    #[test]
    fn test_kfrags_verify_with_full_context() {
        let (delegating_pk, receiving_pk, verifying_pk, kfrags) = setup(2, 3, true, true);
        for kfrag in kfrags {
            let kfrag = kfrag.into_unverified();
            assert!(kfrag.verify(&verifying_pk, Some(&delegating_pk), Some(&receiving_pk)).is_ok());
        }
    }

    #[test]
    fn test_kfrags_verify_without_optional_keys() {
        let (_, _, verifying_pk, kfrags) = setup(2, 3, false, false);
        for kfrag in kfrags {
            let kfrag = kfrag.into_unverified();
            assert!(kfrag.verify(&verifying_pk, None, None).is_ok());
        }
    }

    #[test]
    fn test_kfrag_verify_fails_missing_required_key() {
        let (delegating_pk, _, verifying_pk, kfrags) = setup(2, 3, true, true);
        let kfrag = kfrags.into_iter().next().unwrap().into_unverified();
        assert!(kfrag.verify(&verifying_pk, Some(&delegating_pk), None).is_err());
    }

    #[test]
    fn test_kfrag_verify_fails_wrong_verifying_key() {
        let (delegating_pk, receiving_pk, _, kfrags) = setup(2, 3, true, true);
        let wrong_pk = SecretKey::random(&mut OsRng).public_key();
        let kfrag = kfrags.into_iter().next().unwrap().into_unverified();
        assert!(kfrag.verify(&wrong_pk, Some(&delegating_pk), Some(&receiving_pk)).is_err());
    }

    #[test]
    fn test_kfrag_roundtrip() {
        let (_, _, _, kfrags) = setup(2, 2, false, false);
        let kfrag = kfrags.into_iter().next().unwrap().into_unverified();
        let arr = kfrag.to_array();
        let kfrag2 = KeyFrag::from_array(&arr).unwrap();
        assert_eq!(kfrag2.to_array(), arr);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_kfrag_serde_roundtrip() {
        let (_, _, _, kfrags) = setup(2, 2, true, true);
        let kfrag = kfrags.into_iter().next().unwrap().into_unverified();
        let encoded = serde_json::to_string(&kfrag).unwrap();
        let kfrag2: KeyFrag = serde_json::from_str(&encoded).unwrap();
        assert_eq!(kfrag2.to_array(), kfrag.to_array());
    }
}
