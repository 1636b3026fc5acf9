//! Process-wide curve parameters: the generator `g` and the independent
//! generator `u` used as the commitment base in kfrags/cfrags (spec.md §3, §9
//! "Global parameters").

use generic_array::GenericArray;

use crate::curve::{curve_generator, CurvePoint, PointSize};
use crate::random_oracles::unsafe_hash_to_point;
use crate::traits::{
    ConstructionError, DeserializableFromArray, HasTypeName, RepresentableAsArray,
    SerializableToArray,
};

const PARAMETERS_DST: &[u8] = b"UMBRAL_PARAMETERS_U";

/// The fixed parameters shared by every `Capsule`/`KeyFrag`/`CapsuleFrag` in
/// a given build of the library: the curve's generator and the independent
/// generator `u` (spec.md §3's "u, U" is one generator under two names).
///
/// Deterministically derived at first use via `unsafe_hash_to_point` of the
/// generator with a fixed label; never mutated afterward.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Parameters {
    pub(crate) u: CurvePoint,
}

impl Parameters {
    /// Derives the parameter set. Cheap enough (one try-and-increment hash to
    /// a curve point) to recompute per call; callers cache it in a
    /// `lazy`/`OnceCell` where that matters.
    pub(crate) fn new() -> Self {
        let g = curve_generator();
        let u = unsafe_hash_to_point(&g.to_array(), PARAMETERS_DST)
            .expect("hash-to-point succeeds with overwhelming probability");
        Self { u }
    }
}

impl RepresentableAsArray for Parameters {
    type Size = PointSize;
}

impl SerializableToArray for Parameters {
    fn to_array(&self) -> GenericArray<u8, Self::Size> {
        self.u.to_array()
    }
}

impl HasTypeName for Parameters {
    fn type_name() -> &'static str {
        "Parameters"
    }
}

impl DeserializableFromArray for Parameters {
    fn from_array(arr: &GenericArray<u8, Self::Size>) -> Result<Self, ConstructionError> {
        let parsed = CurvePoint::from_array(arr)?;
        let expected = Self::new();
        if parsed != expected.u {
            return Err(ConstructionError::new(
                Self::type_name(),
                "does not match this build's fixed parameters",
            ));
        }
        Ok(expected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parameters_deterministic() {
        let a = Parameters::new();
        let b = Parameters::new();
        assert_eq!(a.u, b.u);
    }
}
