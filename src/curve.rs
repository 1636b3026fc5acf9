//! Thin wrapper over the `k256`/`elliptic-curve` backend exposing only the
//! scalar and point operations the protocol needs, plus their fixed-width
//! compressed serialization.

use core::ops::{Mul, Sub};

use elliptic_curve::group::Group;
use elliptic_curve::sec1::{FromEncodedPoint, ToEncodedPoint};
use ff::{Field, PrimeField};
use generic_array::typenum::U33;
use generic_array::GenericArray;
use k256::{AffinePoint, EncodedPoint, ProjectivePoint, Scalar};
use rand_core::{CryptoRng, RngCore};
use subtle::ConstantTimeEq;
use zeroize::Zeroize;

use crate::traits::{
    ConstructionError, DeserializableFromArray, HasTypeName, RepresentableAsArray,
    SerializableToArray,
};

/// A scalar in the group order of the chosen curve.
pub(crate) type CurveScalar = Scalar;

/// A point on the chosen curve.
pub(crate) type CurvePoint = ProjectivePoint;

pub(crate) type ScalarSize = generic_array::typenum::U32;
pub(crate) type PointSize = U33;

impl RepresentableAsArray for CurveScalar {
    type Size = ScalarSize;
}

impl SerializableToArray for CurveScalar {
    fn to_array(&self) -> GenericArray<u8, Self::Size> {
        self.to_repr()
    }
}

impl HasTypeName for CurveScalar {
    fn type_name() -> &'static str {
        "Scalar"
    }
}

impl DeserializableFromArray for CurveScalar {
    fn from_array(arr: &GenericArray<u8, Self::Size>) -> Result<Self, ConstructionError> {
        Option::from(Scalar::from_repr(*arr))
            .ok_or_else(|| ConstructionError::new(Self::type_name(), "not a valid scalar"))
    }
}

impl RepresentableAsArray for CurvePoint {
    type Size = PointSize;
}

impl SerializableToArray for CurvePoint {
    fn to_array(&self) -> GenericArray<u8, Self::Size> {
        let encoded = self.to_affine().to_encoded_point(true);
        GenericArray::clone_from_slice(encoded.as_bytes())
    }
}

impl HasTypeName for CurvePoint {
    fn type_name() -> &'static str {
        "CurvePoint"
    }
}

impl DeserializableFromArray for CurvePoint {
    fn from_array(arr: &GenericArray<u8, Self::Size>) -> Result<Self, ConstructionError> {
        let encoded = EncodedPoint::from_bytes(arr)
            .map_err(|_| ConstructionError::new(Self::type_name(), "invalid SEC1 encoding"))?;
        let affine: Option<AffinePoint> = AffinePoint::from_encoded_point(&encoded).into();
        let affine = affine
            .ok_or_else(|| ConstructionError::new(Self::type_name(), "not a point on the curve"))?;
        Ok(CurvePoint::from(affine))
    }
}

/// A non-zero scalar, used wherever the protocol requires a value drawn from
/// `F_n^*` rather than `F_n` (ephemeral precursors, kfrag ids, polynomial
/// coefficients, ...).
#[derive(Clone, Copy, Debug)]
pub(crate) struct NonZeroCurveScalar(CurveScalar);

impl NonZeroCurveScalar {
    /// Draws a uniformly random element of `F_n^*` using the given RNG.
    pub(crate) fn random(rng: &mut (impl CryptoRng + RngCore)) -> Self {
        loop {
            let candidate = CurveScalar::random(&mut *rng);
            if !bool::from(candidate.is_zero()) {
                return Self(candidate);
            }
        }
    }

    pub(crate) fn as_scalar(&self) -> &CurveScalar {
        &self.0
    }

    /// Wraps a scalar already known to be non-zero (e.g. the output of
    /// [`crate::hashing::ScalarDigest::finalize`], which never returns zero).
    pub(crate) fn from_nonzero_scalar(scalar: CurveScalar) -> Self {
        debug_assert!(!bool::from(scalar.is_zero()));
        Self(scalar)
    }
}

impl RepresentableAsArray for NonZeroCurveScalar {
    type Size = ScalarSize;
}

impl SerializableToArray for NonZeroCurveScalar {
    fn to_array(&self) -> GenericArray<u8, Self::Size> {
        self.0.to_array()
    }
}

impl HasTypeName for NonZeroCurveScalar {
    fn type_name() -> &'static str {
        "NonZeroScalar"
    }
}

impl DeserializableFromArray for NonZeroCurveScalar {
    fn from_array(arr: &GenericArray<u8, Self::Size>) -> Result<Self, ConstructionError> {
        let scalar = CurveScalar::from_array(arr)?;
        if bool::from(scalar.is_zero()) {
            return Err(ConstructionError::new(Self::type_name(), "scalar is zero"));
        }
        Ok(Self(scalar))
    }
}

impl Sub for &NonZeroCurveScalar {
    type Output = CurveScalar;

    fn sub(self, other: Self) -> CurveScalar {
        self.0 - other.0
    }
}

impl Mul<&NonZeroCurveScalar> for &CurvePoint {
    type Output = CurvePoint;

    fn mul(self, rhs: &NonZeroCurveScalar) -> CurvePoint {
        self * &rhs.0
    }
}

impl PartialEq for NonZeroCurveScalar {
    fn eq(&self, other: &Self) -> bool {
        bool::from(self.0.ct_eq(&other.0))
    }
}

impl Zeroize for NonZeroCurveScalar {
    fn zeroize(&mut self) {
        self.0 = CurveScalar::ZERO;
    }
}

/// Returns the generator `g` of the curve's prime-order subgroup.
pub(crate) fn curve_generator() -> CurvePoint {
    CurvePoint::generator()
}

/// Returns the additive identity (point at infinity).
pub(crate) fn curve_identity() -> CurvePoint {
    CurvePoint::identity()
}

/// Constant-time equality on secret scalars (spec.md §5's constant-time
/// discipline for comparisons touching secret data).
pub(crate) fn scalar_ct_eq(a: &CurveScalar, b: &CurveScalar) -> bool {
    bool::from(a.ct_eq(b))
}

/// Inverts a scalar mod the curve order. `None` only for the zero scalar.
pub(crate) fn scalar_invert(s: &CurveScalar) -> Option<CurveScalar> {
    Option::from(s.invert())
}
