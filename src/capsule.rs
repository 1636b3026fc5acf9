//! The KEM capsule: the asymmetric half of an encryption, carrying a
//! self-certifying correctness proof so a malformed capsule is rejected at
//! construction time rather than needing a separate `verify()` call at every
//! use site (spec.md §4.5, §9 "capsule validity as a construction invariant").

#[cfg(feature = "alloc")]
use alloc::vec::Vec;

use ff::Field;
use generic_array::sequence::Concat;
use generic_array::typenum::op;
use generic_array::GenericArray;
use rand_core::{CryptoRng, RngCore};

use crate::capsule_frag::VerifiedCapsuleFrag;
use crate::curve::{
    curve_generator, curve_identity, scalar_invert, CurvePoint, CurveScalar, NonZeroCurveScalar,
    PointSize, ScalarSize,
};
use crate::hashing_ds::{hash_capsule_points, hash_to_polynomial_arg, hash_to_shared_secret};
use crate::keys::{PublicKey, SecretKey};
use crate::params::Parameters;
use crate::secret_box::SecretBox;
use crate::traits::{
    ConstructionError, DeserializableFromArray, HasTypeName, RepresentableAsArray,
    SerializableToArray,
};

#[cfg(feature = "serde")]
use crate::serde_support::{serde_deserialize, serde_serialize, Representation};
#[cfg(feature = "serde")]
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// The raw KEM output: a compressed curve point's bytes, stretched by
/// [`crate::dem::UmbralDEM`] into a symmetric key. Never exposed directly —
/// always wrapped in a [`SecretBox`].
pub(crate) type KeySeed = GenericArray<u8, PointSize>;

type CapsuleSize = op!(PointSize + PointSize + ScalarSize);

/// A capsule binds two ephemeral KEM points (`E`, `V`) to a Schnorr-style
/// signature proving they were generated together, consistently (spec.md
/// §4.5 step 1). Every live `Capsule` satisfies that proof — it is checked
/// once, at construction, by [`Capsule::new_verified`].
#[derive(Clone, Copy, Debug)]
pub struct Capsule {
    pub(crate) params: Parameters,
    pub(crate) point_e: CurvePoint,
    pub(crate) point_v: CurvePoint,
    pub(crate) signature: CurveScalar,
}

impl Capsule {
    fn new_verified(
        point_e: CurvePoint,
        point_v: CurvePoint,
        signature: CurveScalar,
    ) -> Result<Self, ConstructionError> {
        let candidate = Self { params: Parameters::new(), point_e, point_v, signature };
        if candidate.is_correct() {
            Ok(candidate)
        } else {
            Err(ConstructionError::new(Self::type_name(), "capsule correctness equation does not hold"))
        }
    }

    fn is_correct(&self) -> bool {
        let h = hash_capsule_points(&self.point_e, &self.point_v);
        curve_generator() * self.signature == self.point_v + self.point_e * h
    }

    /// The sender's side of key encapsulation: draws two ephemeral scalars,
    /// forms a capsule bound to `delegating_pk`, and returns the matching
    /// key seed (spec.md §4.5 step 1).
    pub fn from_public_key(
        rng: &mut (impl CryptoRng + RngCore),
        delegating_pk: &PublicKey,
    ) -> (Self, SecretBox<KeySeed>) {
        let g = curve_generator();

        let priv_r = *NonZeroCurveScalar::random(rng).as_scalar();
        let pub_r = g * priv_r;

        let priv_u = *NonZeroCurveScalar::random(rng).as_scalar();
        let pub_u = g * priv_u;

        let h = hash_capsule_points(&pub_r, &pub_u);
        let s = priv_u + priv_r * h;

        let shared_key = delegating_pk.to_point() * (priv_r + priv_u);

        let capsule = Self { params: Parameters::new(), point_e: pub_r, point_v: pub_u, signature: s };
        (capsule, SecretBox::new(shared_key.to_array()))
    }

    /// The delegator's own side of key decapsulation, using their secret key
    /// directly rather than a re-encrypted path (spec.md §4.5 step 2).
    pub fn open_original(&self, delegating_sk: &SecretKey) -> SecretBox<KeySeed> {
        let shared_key = (self.point_e + self.point_v) * *delegating_sk.to_secret_scalar();
        SecretBox::new(shared_key.to_array())
    }

    /// The recipient's side: reconstructs the key seed from `threshold`
    /// verified capsule fragments via Lagrange interpolation of the shared
    /// polynomial at `x = 0` (spec.md §4.5 step 3).
    #[cfg(feature = "alloc")]
    pub fn open_reencrypted(
        &self,
        receiving_sk: &SecretKey,
        delegating_pk: &PublicKey,
        cfrags: &[VerifiedCapsuleFrag],
    ) -> Result<SecretBox<KeySeed>, OpenReencryptedError> {
        if cfrags.is_empty() {
            return Err(OpenReencryptedError::NoCapsuleFrags);
        }

        let precursor = cfrags[0].inner().precursor;
        if cfrags.iter().any(|c| c.inner().precursor != precursor) {
            return Err(OpenReencryptedError::MismatchedCapsuleFrags);
        }

        let mut seen_ids: Vec<CurveScalar> = Vec::with_capacity(cfrags.len());
        for cfrag in cfrags {
            let id_scalar = *cfrag.inner().kfrag_id.as_scalar();
            if seen_ids.contains(&id_scalar) {
                return Err(OpenReencryptedError::RepeatingCapsuleFrags);
            }
            seen_ids.push(id_scalar);
        }

        let receiving_pk_point = receiving_sk.public_key().to_point();
        let dh_point = precursor * *receiving_sk.to_secret_scalar();

        let xs: Vec<CurveScalar> = cfrags
            .iter()
            .map(|c| hash_to_polynomial_arg(&precursor, &receiving_pk_point, &dh_point, &c.inner().kfrag_id.to_array()))
            .collect();

        let mut e_prime = curve_identity();
        let mut v_prime = curve_identity();
        for (i, cfrag) in cfrags.iter().enumerate() {
            let lambda_i = lagrange_coefficient(&xs, i);
            e_prime += cfrag.inner().point_e1 * lambda_i;
            v_prime += cfrag.inner().point_v1 * lambda_i;
        }

        let d = hash_to_shared_secret(&precursor, &receiving_pk_point, &dh_point);
        let d_inv = scalar_invert(&d).expect("hash_to_shared_secret never returns zero");

        let h = hash_capsule_points(&self.point_e, &self.point_v);
        let s_by_d_inv = self.signature * d_inv;

        if delegating_pk.to_point() * s_by_d_inv != e_prime * h + v_prime {
            return Err(OpenReencryptedError::ValidationFailed);
        }

        let shared_key = (e_prime + v_prime) * d;
        Ok(SecretBox::new(shared_key.to_array()))
    }
}

/// The Lagrange coefficient `l_i(0)` for the set of evaluation points `xs`,
/// used to combine capsule fragments into a single reconstructed point
/// (spec.md §4.5 step 3, Shamir reconstruction at `x = 0`).
fn lagrange_coefficient(xs: &[CurveScalar], i: usize) -> CurveScalar {
    let mut result = CurveScalar::ONE;
    for (j, xj) in xs.iter().enumerate() {
        if j != i {
            let denom = scalar_invert(&(*xj - xs[i]))
                .expect("distinct kfrag ids yield distinct x-coordinates with overwhelming probability");
            result = result * *xj * denom;
        }
    }
    result
}

impl RepresentableAsArray for Capsule {
    type Size = CapsuleSize;
}

impl SerializableToArray for Capsule {
    fn to_array(&self) -> GenericArray<u8, Self::Size> {
        self.point_e.to_array().concat(self.point_v.to_array()).concat(self.signature.to_array())
    }
}

impl HasTypeName for Capsule {
    fn type_name() -> &'static str {
        "Capsule"
    }
}

impl DeserializableFromArray for Capsule {
    fn from_array(arr: &GenericArray<u8, Self::Size>) -> Result<Self, ConstructionError> {
        let (point_e, rest) = CurvePoint::take(arr.clone())?;
        let (point_v, rest) = CurvePoint::take(rest)?;
        let signature = CurveScalar::take_last(rest)?;
        Self::new_verified(point_e, point_v, signature)
    }
}

#[cfg(feature = "serde")]
#[cfg_attr(docsrs, doc(cfg(feature = "serde")))]
impl Serialize for Capsule {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serde_serialize(self, serializer, Representation::Base64)
    }
}

#[cfg(feature = "serde")]
#[cfg_attr(docsrs, doc(cfg(feature = "serde")))]
impl<'de> Deserialize<'de> for Capsule {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        serde_deserialize(deserializer, Representation::Base64)
    }
}

/// Why [`Capsule::open_reencrypted`] refused to reconstruct a key seed.
#[derive(Debug, PartialEq, Eq)]
pub enum OpenReencryptedError {
    /// No capsule fragments were supplied.
    NoCapsuleFrags,
    /// The fragments don't all share the same precursor point, so they
    /// weren't all produced from the same kfrag issuance.
    MismatchedCapsuleFrags,
    /// Two or more fragments carry the same kfrag id, which would make the
    /// Lagrange interpolation singular.
    RepeatingCapsuleFrags,
    /// The reconstructed value doesn't satisfy the capsule's correctness
    /// equation — at least one fragment was produced from a kfrag not meant
    /// for this (capsule, recipient) pair.
    ValidationFailed,
}

impl core::fmt::Display for OpenReencryptedError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let msg = match self {
            Self::NoCapsuleFrags => "no capsule fragments were supplied",
            Self::MismatchedCapsuleFrags => "capsule fragments do not share a common precursor",
            Self::RepeatingCapsuleFrags => "capsule fragments repeat a kfrag id",
            Self::ValidationFailed => "reconstructed value failed the capsule's correctness check",
        };
        f.write_str(msg)
    }
}

#[cfg(feature = "std")]
impl std::error::Error for OpenReencryptedError {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capsule_frag::reencrypt;
    use crate::key_frag::generate_kfrags;
    use crate::keys::Signer;
    use rand_core::OsRng;

    #[test]
    fn test_open_original() {
        let delegating_sk = SecretKey::random(&mut OsRng);
        let (capsule, key_seed) = Capsule::from_public_key(&mut OsRng, &delegating_sk.public_key());
        let recovered = capsule.open_original(&delegating_sk);
        assert_eq!(recovered.as_secret(), key_seed.as_secret());
    }

    #[test]
    fn test_capsule_roundtrip() {
        let delegating_sk = SecretKey::random(&mut OsRng);
        let (capsule, _) = Capsule::from_public_key(&mut OsRng, &delegating_sk.public_key());
        let arr = capsule.to_array();
        let capsule2 = Capsule::from_array(&arr).unwrap();
        assert_eq!(capsule2.to_array(), arr);
    }

    #[test]
    fn test_capsule_rejects_tampered_bytes() {
        let delegating_sk = SecretKey::random(&mut OsRng);
        let (capsule, _) = Capsule::from_public_key(&mut OsRng, &delegating_sk.public_key());
        let mut arr = capsule.to_array();
        arr[0] ^= 1;
        assert!(Capsule::from_array(&arr).is_err());
    }

    #[test]
    fn test_open_reencrypted_matches_open_original() {
        let delegating_sk = SecretKey::random(&mut OsRng);
        let receiving_sk = SecretKey::random(&mut OsRng);
        let signing_sk = SecretKey::random(&mut OsRng);
        let signer = Signer::new(signing_sk.clone());

        let (capsule, key_seed) = Capsule::from_public_key(&mut OsRng, &delegating_sk.public_key());

        let threshold = 2;
        let kfrags = generate_kfrags(
            &mut OsRng,
            &delegating_sk,
            &receiving_sk.public_key(),
            &signer,
            threshold,
            3,
            true,
            true,
        );

        let cfrags: Vec<VerifiedCapsuleFrag> = kfrags[0..threshold]
            .iter()
            .map(|kf| reencrypt(&mut OsRng, &capsule, kf, None))
            .collect();

        let recovered = capsule
            .open_reencrypted(&receiving_sk, &delegating_sk.public_key(), &cfrags)
            .unwrap();
        assert_eq!(recovered.as_secret(), key_seed.as_secret());
    }

    #[test]
    fn test_open_reencrypted_rejects_too_few_fragments() {
        let delegating_sk = SecretKey::random(&mut OsRng);
        let receiving_sk = SecretKey::random(&mut OsRng);
        let signing_sk = SecretKey::random(&mut OsRng);
        let signer = Signer::new(signing_sk.clone());

        let (capsule, _) = Capsule::from_public_key(&mut OsRng, &delegating_sk.public_key());
        let threshold = 3;
        let kfrags = generate_kfrags(&mut OsRng, &delegating_sk, &receiving_sk.public_key(), &signer, threshold, 4, true, true);

        let cfrags: Vec<VerifiedCapsuleFrag> =
            kfrags[0..threshold - 1].iter().map(|kf| reencrypt(&mut OsRng, &capsule, kf, None)).collect();

        let result = capsule.open_reencrypted(&receiving_sk, &delegating_sk.public_key(), &cfrags);
        assert_eq!(result.unwrap_err(), OpenReencryptedError::ValidationFailed);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_capsule_serde_roundtrip() {
        let delegating_sk = SecretKey::random(&mut OsRng);
        let (capsule, _) = Capsule::from_public_key(&mut OsRng, &delegating_sk.public_key());
        let encoded = serde_json::to_string(&capsule).unwrap();
        let capsule2: Capsule = serde_json::from_str(&encoded).unwrap();
        assert_eq!(capsule2.to_array(), capsule.to_array());
    }

    #[test]
    fn test_open_reencrypted_rejects_empty() {
        let delegating_sk = SecretKey::random(&mut OsRng);
        let receiving_sk = SecretKey::random(&mut OsRng);
        let (capsule, _) = Capsule::from_public_key(&mut OsRng, &delegating_sk.public_key());
        let result = capsule.open_reencrypted(&receiving_sk, &delegating_sk.public_key(), &[]);
        assert_eq!(result.unwrap_err(), OpenReencryptedError::NoCapsuleFrags);
    }
}
