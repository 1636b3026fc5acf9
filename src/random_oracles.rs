//! Try-and-increment hash-to-point, used once at process start to derive the
//! independent generator `u` (see `params.rs`). Not used anywhere secret data
//! flows through it, since it is not constant-time.

use alloc::vec::Vec;

use blake2::{digest::Digest, Blake2b512};

use crate::curve::CurvePoint;
use crate::traits::DeserializableFromArray;

fn to_fixed_be_bytes(x: usize) -> [u8; 4] {
    (x as u32).to_be_bytes()
}

/// Hashes `data` (with an additional `label`) into a valid curve point using
/// the try-and-increment method, reusing a 64-byte BLAKE2b digest as the
/// candidate compressed point's tag byte and x-coordinate.
///
/// WARNING: not constant-time; only ever called on public, non-secret inputs
/// (the generator, at process start).
pub(crate) fn unsafe_hash_to_point(data: &[u8], label: &[u8]) -> Option<CurvePoint> {
    let len_data = to_fixed_be_bytes(data.len());
    let len_label = to_fixed_be_bytes(label.len());

    let mut label_data = Vec::with_capacity(4 + label.len() + 4 + data.len());
    label_data.extend_from_slice(&len_label);
    label_data.extend_from_slice(label);
    label_data.extend_from_slice(&len_data);
    label_data.extend_from_slice(data);

    for i in 0u32..u32::MAX {
        let mut hasher = Blake2b512::new();
        hasher.update(&label_data);
        hasher.update(i.to_be_bytes());
        let digest = hasher.finalize();

        // Interpret the high byte's parity as the SEC1 compression tag and
        // the next 32 bytes as the candidate x-coordinate.
        let tag = if digest[0] & 1 == 0 { 0x02 } else { 0x03 };
        let mut candidate = generic_array::GenericArray::<u8, generic_array::typenum::U33>::default();
        candidate[0] = tag;
        candidate[1..].copy_from_slice(&digest[1..33]);

        if let Ok(point) = CurvePoint::from_array(&candidate) {
            return Some(point);
        }
    }

    // Only reachable with probability 2^(-32).
    None
}

#[cfg(test)]
mod tests {
    use super::unsafe_hash_to_point;

    #[test]
    fn test_unsafe_hash_to_point_deterministic() {
        let a = unsafe_hash_to_point(b"abcdefg", b"label");
        let b = unsafe_hash_to_point(b"abcdefg", b"label");
        assert_eq!(a, b);
        assert!(a.is_some());
    }

    #[test]
    fn test_unsafe_hash_to_point_domain_separated() {
        let a = unsafe_hash_to_point(b"abcdefg", b"label_a");
        let b = unsafe_hash_to_point(b"abcdefg", b"label_b");
        assert_ne!(a, b);
    }
}
