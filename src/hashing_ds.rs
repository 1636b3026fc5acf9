//! Domain-separated hash functions built on top of [`ScalarDigest`], one per
//! DST listed in spec.md §6. Each function name matches the protocol step it
//! is used in rather than the raw tag string, for readability at call sites.

use crate::curve::CurvePoint;
use crate::curve::CurveScalar;
use crate::hashing::ScalarDigest;
use crate::keys::PublicKey;

const DST_X_COORDINATE: &[u8] = b"X_COORDINATE";
const DST_KFRAG_SIGNATURE: &[u8] = b"KFRAG_SIGNATURE";
const DST_CFRAG_VERIFICATION: &[u8] = b"CFRAG_VERIFICATION";
const DST_CAPSULE: &[u8] = b"CAPSULE";
const DST_SHARED_SECRET: &[u8] = b"POINT_SHARED";

/// `H_capsule(E, V) -> h`, the challenge binding a capsule's two KEM points
/// to its correctness witness `s` (spec.md §4.5).
pub(crate) fn hash_capsule_points(e: &CurvePoint, v: &CurvePoint) -> CurveScalar {
    ScalarDigest::new(DST_CAPSULE)
        .chain_serializable(e)
        .chain_serializable(v)
        .finalize()
}

/// `H_kfrag_dh(X_A, pk_B, dh_point) -> d`, the shared blinding value that
/// makes the scheme non-interactive (spec.md §4.3 step 2 / §4.5 step 2 of
/// `decapsulate_reencrypted`, symmetric because `sk_B * X_A == x_A * pk_B`).
pub(crate) fn hash_to_shared_secret(
    precursor: &CurvePoint,
    receiving_pk_point: &CurvePoint,
    dh_point: &CurvePoint,
) -> CurveScalar {
    ScalarDigest::new(DST_SHARED_SECRET)
        .chain_serializable(precursor)
        .chain_serializable(receiving_pk_point)
        .chain_serializable(dh_point)
        .finalize()
}

/// `H_X_COORDINATE(id, pk_A, pk_B, X_A) -> x_i`, the x-coordinate at which
/// the generating polynomial is evaluated for a given kfrag id (spec.md §4.3
/// step 4b, reused symmetrically during reconstruction in §4.5 step 3).
pub(crate) fn hash_to_polynomial_arg(
    precursor: &CurvePoint,
    receiving_pk_point: &CurvePoint,
    dh_point: &CurvePoint,
    kfrag_id: &[u8],
) -> CurveScalar {
    ScalarDigest::new(DST_X_COORDINATE)
        .chain_serializable(precursor)
        .chain_serializable(receiving_pk_point)
        .chain_serializable(dh_point)
        .chain_bytes(kfrag_id)
        .finalize()
}

/// `H_kfrag(id, commitment, precursor, [pk_A], [pk_B]) -> metadata`, the
/// message signed into `signature_for_proxy`/`signature_for_bob` (spec.md
/// §4.3 steps 4d/4e, the modern two-signature framing from SPEC_FULL.md §3).
pub(crate) fn hash_to_cfrag_signature(
    kfrag_id: &[u8],
    commitment: &CurvePoint,
    precursor: &CurvePoint,
    maybe_delegating_pk: Option<&PublicKey>,
    maybe_receiving_pk: Option<&PublicKey>,
) -> CurveScalar {
    ScalarDigest::new(DST_KFRAG_SIGNATURE)
        .chain_bytes(kfrag_id)
        .chain_serializable(commitment)
        .chain_serializable(precursor)
        .chain_optional_serializable(maybe_delegating_pk)
        .chain_optional_serializable(maybe_receiving_pk)
        .finalize()
}

/// `H_cfrag_chal(E, E1, E2, V, V1, V2, U, commitment, U2, [metadata]) -> h`,
/// the NIZK challenge for the re-encryption proof (spec.md §4.4 step 3b).
#[allow(clippy::too_many_arguments)]
pub(crate) fn hash_to_cfrag_verification(
    e: &CurvePoint,
    e1: &CurvePoint,
    e2: &CurvePoint,
    v: &CurvePoint,
    v1: &CurvePoint,
    v2: &CurvePoint,
    u: &CurvePoint,
    commitment: &CurvePoint,
    u2: &CurvePoint,
    metadata: Option<&[u8]>,
) -> CurveScalar {
    let digest = ScalarDigest::new(DST_CFRAG_VERIFICATION)
        .chain_serializable(e)
        .chain_serializable(e1)
        .chain_serializable(e2)
        .chain_serializable(v)
        .chain_serializable(v1)
        .chain_serializable(v2)
        .chain_serializable(u)
        .chain_serializable(commitment)
        .chain_serializable(u2);
    match metadata {
        Some(bytes) => digest.chain_bytes(bytes).finalize(),
        None => digest.finalize(),
    }
}
