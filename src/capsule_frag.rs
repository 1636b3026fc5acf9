//! Capsule fragments: a proxy's re-encryption of one capsule under one
//! [`VerifiedKeyFrag`], carrying a Chaum-Pedersen NIZK proof that the same
//! key share was used against both KEM points and the kfrag's commitment
//! (spec.md §4.4).

use generic_array::sequence::Concat;
use generic_array::typenum::op;
use generic_array::GenericArray;
use rand_core::{CryptoRng, RngCore};

use crate::capsule::Capsule;
use crate::curve::{CurvePoint, CurveScalar, NonZeroCurveScalar, PointSize, ScalarSize};
use crate::hashing_ds::{hash_to_cfrag_signature, hash_to_cfrag_verification};
use crate::key_frag::{KeyFragID, VerifiedKeyFrag};
use crate::keys::{PublicKey, Signature};
use crate::traits::{
    ConstructionError, DeserializableFromArray, HasTypeName, RepresentableAsArray,
    SerializableToArray,
};

#[cfg(feature = "serde")]
use crate::serde_support::{serde_deserialize, serde_serialize, Representation};
#[cfg(feature = "serde")]
use serde::{Deserialize, Deserializer, Serialize, Serializer};

type SignatureSize = <Signature as RepresentableAsArray>::Size;
type CapsuleFragProofSize = op!(PointSize + PointSize + PointSize + PointSize + ScalarSize + SignatureSize);

/// The NIZK proof that a [`CapsuleFrag`] was computed honestly: a
/// Chaum-Pedersen transcript proving the same scalar was used as the
/// exponent against `E`, `V`, and the independent generator `u` (spec.md
/// §4.4 step 3), plus the kfrag's own proxy-facing signature so a verifier
/// doesn't need the whole [`crate::key_frag::KeyFrag`] to trust the fragment's
/// provenance.
#[derive(Clone, Copy, Debug)]
pub struct CapsuleFragProof {
    pub(crate) point_e2: CurvePoint,
    pub(crate) point_v2: CurvePoint,
    pub(crate) point_u1: CurvePoint,
    pub(crate) point_u2: CurvePoint,
    pub(crate) z: CurveScalar,
    pub(crate) kfrag_signature: Signature,
}

impl RepresentableAsArray for CapsuleFragProof {
    type Size = CapsuleFragProofSize;
}

impl SerializableToArray for CapsuleFragProof {
    fn to_array(&self) -> GenericArray<u8, Self::Size> {
        self.point_e2
            .to_array()
            .concat(self.point_v2.to_array())
            .concat(self.point_u1.to_array())
            .concat(self.point_u2.to_array())
            .concat(self.z.to_array())
            .concat(self.kfrag_signature.to_array())
    }
}

impl HasTypeName for CapsuleFragProof {
    fn type_name() -> &'static str {
        "CapsuleFragProof"
    }
}

impl DeserializableFromArray for CapsuleFragProof {
    fn from_array(arr: &GenericArray<u8, Self::Size>) -> Result<Self, ConstructionError> {
        let (point_e2, rest) = CurvePoint::take(arr.clone())?;
        let (point_v2, rest) = CurvePoint::take(rest)?;
        let (point_u1, rest) = CurvePoint::take(rest)?;
        let (point_u2, rest) = CurvePoint::take(rest)?;
        let (z, rest) = CurveScalar::take(rest)?;
        let kfrag_signature = Signature::take_last(rest)?;
        Ok(Self { point_e2, point_v2, point_u1, point_u2, z, kfrag_signature })
    }
}

#[cfg(feature = "serde")]
#[cfg_attr(docsrs, doc(cfg(feature = "serde")))]
impl Serialize for CapsuleFragProof {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serde_serialize(self, serializer, Representation::Base64)
    }
}

#[cfg(feature = "serde")]
#[cfg_attr(docsrs, doc(cfg(feature = "serde")))]
impl<'de> Deserialize<'de> for CapsuleFragProof {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        serde_deserialize(deserializer, Representation::Base64)
    }
}

type CapsuleFragSize = op!(PointSize + PointSize + ScalarSize + PointSize + CapsuleFragProofSize);

/// A proxy's re-encryption of one [`Capsule`] under one key fragment.
/// Untrusted until [`CapsuleFrag::verify`] converts it into a
/// [`VerifiedCapsuleFrag`] — [`Capsule::open_reencrypted`](crate::capsule::Capsule::open_reencrypted)
/// only accepts the verified form.
#[derive(Clone, Copy, Debug)]
pub struct CapsuleFrag {
    pub(crate) point_e1: CurvePoint,
    pub(crate) point_v1: CurvePoint,
    pub(crate) kfrag_id: KeyFragID,
    pub(crate) precursor: CurvePoint,
    pub(crate) proof: CapsuleFragProof,
}

impl CapsuleFrag {
    /// Checks the Chaum-Pedersen proof against `capsule` and the kfrag
    /// signature against `verifying_pk`. Consumes `self`; on success returns
    /// a [`VerifiedCapsuleFrag`], on failure hands the fragment back.
    pub fn verify(
        self,
        capsule: &Capsule,
        verifying_pk: &PublicKey,
        metadata: Option<&[u8]>,
    ) -> Result<VerifiedCapsuleFrag, Self> {
        if self.verify_inner(capsule, verifying_pk, metadata) {
            Ok(VerifiedCapsuleFrag(self))
        } else {
            Err(self)
        }
    }

    fn verify_inner(&self, capsule: &Capsule, verifying_pk: &PublicKey, metadata: Option<&[u8]>) -> bool {
        let u = capsule.params.u;

        let h = hash_to_cfrag_verification(
            &capsule.point_e,
            &self.point_e1,
            &self.proof.point_e2,
            &capsule.point_v,
            &self.point_v1,
            &self.proof.point_v2,
            &u,
            &self.proof.point_u1,
            &self.proof.point_u2,
            metadata,
        );

        let z = self.proof.z;
        let correct_e = capsule.point_e * z == self.proof.point_e2 + self.point_e1 * h;
        let correct_v = capsule.point_v * z == self.proof.point_v2 + self.point_v1 * h;
        let correct_u = u * z == self.proof.point_u2 + self.proof.point_u1 * h;

        let kfrag_challenge =
            hash_to_cfrag_signature(&self.kfrag_id.to_array(), &self.proof.point_u1, &self.precursor, None, None);
        let valid_kfrag_signature =
            self.proof.kfrag_signature.verify(verifying_pk, &kfrag_challenge.to_array());

        correct_e && correct_v && correct_u && valid_kfrag_signature
    }
}

impl RepresentableAsArray for CapsuleFrag {
    type Size = CapsuleFragSize;
}

impl SerializableToArray for CapsuleFrag {
    fn to_array(&self) -> GenericArray<u8, Self::Size> {
        self.point_e1
            .to_array()
            .concat(self.point_v1.to_array())
            .concat(self.kfrag_id.to_array())
            .concat(self.precursor.to_array())
            .concat(self.proof.to_array())
    }
}

impl HasTypeName for CapsuleFrag {
    fn type_name() -> &'static str {
        "CapsuleFrag"
    }
}

impl DeserializableFromArray for CapsuleFrag {
    fn from_array(arr: &GenericArray<u8, Self::Size>) -> Result<Self, ConstructionError> {
        let (point_e1, rest) = CurvePoint::take(arr.clone())?;
        let (point_v1, rest) = CurvePoint::take(rest)?;
        let (kfrag_id, rest) = KeyFragID::take(rest)?;
        let (precursor, rest) = CurvePoint::take(rest)?;
        let proof = CapsuleFragProof::take_last(rest)?;
        Ok(Self { point_e1, point_v1, kfrag_id, precursor, proof })
    }
}

#[cfg(feature = "serde")]
#[cfg_attr(docsrs, doc(cfg(feature = "serde")))]
impl Serialize for CapsuleFrag {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serde_serialize(self, serializer, Representation::Base64)
    }
}

#[cfg(feature = "serde")]
#[cfg_attr(docsrs, doc(cfg(feature = "serde")))]
impl<'de> Deserialize<'de> for CapsuleFrag {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        serde_deserialize(deserializer, Representation::Base64)
    }
}

/// A [`CapsuleFrag`] that has passed [`CapsuleFrag::verify`].
#[derive(Clone, Copy, Debug)]
pub struct VerifiedCapsuleFrag(CapsuleFrag);

impl VerifiedCapsuleFrag {
    pub(crate) fn inner(&self) -> &CapsuleFrag {
        &self.0
    }

    /// Strips the verified guarantee back off, e.g. to serialize the
    /// fragment for transport.
    pub fn into_unverified(self) -> CapsuleFrag {
        self.0
    }
}

/// Re-encrypts `capsule` under `verified_kfrag`, producing a fragment that a
/// recipient combines (after their own [`CapsuleFrag::verify`] pass) with
/// `threshold - 1` others to recover the encapsulated key (spec.md §4.4).
/// Produced directly in verified form: the proxy trusts its own honest
/// computation from an already-verified kfrag.
pub fn reencrypt(
    rng: &mut (impl CryptoRng + RngCore),
    capsule: &Capsule,
    verified_kfrag: &VerifiedKeyFrag,
    metadata: Option<&[u8]>,
) -> VerifiedCapsuleFrag {
    let kfrag = verified_kfrag.key_frag();
    let rk = kfrag.key;

    let e1 = capsule.point_e * rk;
    let v1 = capsule.point_v * rk;

    let u = capsule.params.u;
    let u1 = kfrag.proof.commitment;

    let t = *NonZeroCurveScalar::random(rng).as_scalar();
    let e2 = capsule.point_e * t;
    let v2 = capsule.point_v * t;
    let u2 = u * t;

    let h = hash_to_cfrag_verification(
        &capsule.point_e,
        &e1,
        &e2,
        &capsule.point_v,
        &v1,
        &v2,
        &u,
        &u1,
        &u2,
        metadata,
    );

    let z = t + rk * h;

    VerifiedCapsuleFrag(CapsuleFrag {
        point_e1: e1,
        point_v1: v1,
        kfrag_id: kfrag.id,
        precursor: kfrag.precursor,
        proof: CapsuleFragProof {
            point_e2: e2,
            point_v2: v2,
            point_u1: u1,
            point_u2: u2,
            z,
            kfrag_signature: kfrag.proof.signature_for_proxy.clone(),
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key_frag::generate_kfrags;
    use crate::keys::{SecretKey, Signer};
    use rand_core::OsRng;

    #[test]
    fn test_reencrypt_and_verify() {
        let delegating_sk = SecretKey::random(&mut OsRng);
        let receiving_sk = SecretKey::random(&mut OsRng);
        let signing_sk = SecretKey::random(&mut OsRng);
        let signer = Signer::new(signing_sk.clone());

        let (capsule, _key_seed) = Capsule::from_public_key(&mut OsRng, &delegating_sk.public_key());

        let kfrags = generate_kfrags(
            &mut OsRng,
            &delegating_sk,
            &receiving_sk.public_key(),
            &signer,
            2,
            3,
            false,
            false,
        );

        let cfrag = reencrypt(&mut OsRng, &capsule, &kfrags[0], None);
        let cfrag = cfrag.into_unverified();
        assert!(cfrag.verify(&capsule, &signing_sk.public_key(), None).is_ok());
    }

    #[test]
    fn test_verify_fails_on_tampered_proof() {
        let delegating_sk = SecretKey::random(&mut OsRng);
        let receiving_sk = SecretKey::random(&mut OsRng);
        let signing_sk = SecretKey::random(&mut OsRng);
        let signer = Signer::new(signing_sk.clone());

        let (capsule, _key_seed) = Capsule::from_public_key(&mut OsRng, &delegating_sk.public_key());
        let kfrags = generate_kfrags(&mut OsRng, &delegating_sk, &receiving_sk.public_key(), &signer, 2, 3, false, false);

        let mut cfrag = reencrypt(&mut OsRng, &capsule, &kfrags[0], None).into_unverified();
        cfrag.proof.z = cfrag.proof.z + CurveScalar::from(1u64);
        assert!(cfrag.verify(&capsule, &signing_sk.public_key(), None).is_err());
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_cfrag_serde_roundtrip() {
        let delegating_sk = SecretKey::random(&mut OsRng);
        let receiving_sk = SecretKey::random(&mut OsRng);
        let signing_sk = SecretKey::random(&mut OsRng);
        let signer = Signer::new(signing_sk.clone());

        let (capsule, _key_seed) = Capsule::from_public_key(&mut OsRng, &delegating_sk.public_key());
        let kfrags = generate_kfrags(&mut OsRng, &delegating_sk, &receiving_sk.public_key(), &signer, 2, 3, false, false);
        let cfrag = reencrypt(&mut OsRng, &capsule, &kfrags[0], None).into_unverified();

        let encoded = serde_json::to_string(&cfrag).unwrap();
        let cfrag2: CapsuleFrag = serde_json::from_str(&encoded).unwrap();
        assert_eq!(cfrag2.to_array(), cfrag.to_array());
    }

    #[test]
    fn test_verify_fails_with_metadata_mismatch() {
        let delegating_sk = SecretKey::random(&mut OsRng);
        let receiving_sk = SecretKey::random(&mut OsRng);
        let signing_sk = SecretKey::random(&mut OsRng);
        let signer = Signer::new(signing_sk.clone());

        let (capsule, _key_seed) = Capsule::from_public_key(&mut OsRng, &delegating_sk.public_key());
        let kfrags = generate_kfrags(&mut OsRng, &delegating_sk, &receiving_sk.public_key(), &signer, 2, 3, false, false);

        let cfrag = reencrypt(&mut OsRng, &capsule, &kfrags[0], Some(b"context")).into_unverified();
        assert!(cfrag.verify(&capsule, &signing_sk.public_key(), None).is_err());
    }
}
