//! Top-level encrypt/decrypt entry points tying together [`crate::capsule`]
//! (the asymmetric KEM half) and [`crate::dem`] (the symmetric payload
//! cipher), per spec.md §4.6.

#[cfg(feature = "std")]
use alloc::vec::Vec;

use aead::Buffer;
use rand_core::{CryptoRng, RngCore};

use crate::capsule::{Capsule, OpenReencryptedError};
use crate::capsule_frag::VerifiedCapsuleFrag;
#[cfg(feature = "std")]
use crate::dem::Ciphertext;
use crate::dem::UmbralDEM;
use crate::keys::{PublicKey, SecretKey};
use crate::traits::SerializableToArray;

/// Encrypts `buffer`'s current contents for `delegating_pk`, in place.
/// `buffer` holds the plaintext on entry and `nonce ‖ sealed` on success.
#[cfg(feature = "alloc")]
pub fn encrypt_in_place(
    rng: &mut (impl CryptoRng + RngCore),
    buffer: &mut dyn Buffer,
    delegating_pk: &PublicKey,
) -> Option<Capsule> {
    let (capsule, key_seed) = Capsule::from_public_key(rng, delegating_pk);
    let dem = UmbralDEM::new(key_seed.as_secret());
    let capsule_bytes = capsule.to_array();
    dem.encrypt_in_place(rng, buffer, &capsule_bytes)?;
    Some(capsule)
}

/// Encrypts `plaintext` for `delegating_pk`, returning the capsule and the
/// sealed ciphertext.
#[cfg(feature = "std")]
pub fn encrypt(
    rng: &mut (impl CryptoRng + RngCore),
    delegating_pk: &PublicKey,
    plaintext: &[u8],
) -> (Capsule, Ciphertext) {
    let (capsule, key_seed) = Capsule::from_public_key(rng, delegating_pk);
    let dem = UmbralDEM::new(key_seed.as_secret());
    let ciphertext = dem.encrypt(rng, plaintext, &capsule.to_array());
    (capsule, ciphertext)
}

/// Reverses [`encrypt_in_place`] using the delegator's own secret key.
pub fn decrypt_original_in_place(
    buffer: &mut dyn Buffer,
    capsule: &Capsule,
    delegating_sk: &SecretKey,
) -> Option<()> {
    let key_seed = capsule.open_original(delegating_sk);
    let dem = UmbralDEM::new(key_seed.as_secret());
    dem.decrypt_in_place(buffer, &capsule.to_array())
}

/// Reverses [`encrypt`] using the delegator's own secret key.
#[cfg(feature = "std")]
pub fn decrypt_original(
    ciphertext: &Ciphertext,
    capsule: &Capsule,
    delegating_sk: &SecretKey,
) -> Option<Vec<u8>> {
    let key_seed = capsule.open_original(delegating_sk);
    let dem = UmbralDEM::new(key_seed.as_secret());
    dem.decrypt(ciphertext, &capsule.to_array())
}

/// Why a re-encrypted decryption failed: either the capsule fragments
/// didn't reconstruct a valid key seed, or the sealed payload failed
/// authentication under the key seed that was reconstructed.
#[derive(Debug, PartialEq, Eq)]
pub enum DecryptionError {
    Capsule(OpenReencryptedError),
    Dem,
}

impl core::fmt::Display for DecryptionError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Capsule(e) => write!(f, "capsule fragments did not reconstruct a key: {}", e),
            Self::Dem => f.write_str("payload failed to decrypt under the reconstructed key"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for DecryptionError {}

/// Reverses [`encrypt_in_place`] using a receiving secret key and a
/// threshold's worth of verified capsule fragments re-encrypted from the
/// original delegating key.
#[cfg(feature = "alloc")]
pub fn decrypt_reencrypted_in_place(
    buffer: &mut dyn Buffer,
    capsule: &Capsule,
    receiving_sk: &SecretKey,
    delegating_pk: &PublicKey,
    cfrags: &[VerifiedCapsuleFrag],
) -> Result<(), DecryptionError> {
    let key_seed = capsule
        .open_reencrypted(receiving_sk, delegating_pk, cfrags)
        .map_err(DecryptionError::Capsule)?;
    let dem = UmbralDEM::new(key_seed.as_secret());
    dem.decrypt_in_place(buffer, &capsule.to_array()).ok_or(DecryptionError::Dem)
}

/// Reverses [`encrypt`] using a receiving secret key and a threshold's worth
/// of verified capsule fragments re-encrypted from the original delegating
/// key.
#[cfg(feature = "std")]
pub fn decrypt_reencrypted(
    ciphertext: &Ciphertext,
    capsule: &Capsule,
    receiving_sk: &SecretKey,
    delegating_pk: &PublicKey,
    cfrags: &[VerifiedCapsuleFrag],
) -> Result<Vec<u8>, DecryptionError> {
    let key_seed = capsule
        .open_reencrypted(receiving_sk, delegating_pk, cfrags)
        .map_err(DecryptionError::Capsule)?;
    let dem = UmbralDEM::new(key_seed.as_secret());
    dem.decrypt(ciphertext, &capsule.to_array()).ok_or(DecryptionError::Dem)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capsule_frag::reencrypt;
    use crate::key_frag::generate_kfrags;
    use crate::keys::Signer;
    use rand_core::OsRng;

    /// Models the full round trip: Alice delegates to Ursulas, Bob collects
    /// a threshold of re-encrypted fragments, and recovers the plaintext.
    #[test]
    fn test_simple_api() {
        let threshold = 2;
        let num_kfrags = threshold + 1;

        let delegating_sk = SecretKey::random(&mut OsRng);
        let delegating_pk = delegating_sk.public_key();

        let signing_sk = SecretKey::random(&mut OsRng);
        let signer = Signer::new(signing_sk.clone());
        let verifying_pk = signing_sk.public_key();

        let receiving_sk = SecretKey::random(&mut OsRng);
        let receiving_pk = receiving_sk.public_key();

        let plaintext = b"peace at dawn";
        let (capsule, ciphertext) = encrypt(&mut OsRng, &delegating_pk, plaintext);

        let cleartext = decrypt_original(&ciphertext, &capsule, &delegating_sk).unwrap();
        assert_eq!(cleartext, plaintext);

        let kfrags = generate_kfrags(
            &mut OsRng,
            &delegating_sk,
            &receiving_pk,
            &signer,
            threshold,
            num_kfrags,
            true,
            true,
        );

        for kfrag in &kfrags {
            let kfrag = (*kfrag).into_unverified();
            assert!(kfrag.verify(&verifying_pk, Some(&delegating_pk), Some(&receiving_pk)).is_ok());
        }

        let cfrags: Vec<VerifiedCapsuleFrag> =
            kfrags[0..threshold].iter().map(|kf| reencrypt(&mut OsRng, &capsule, kf, None)).collect();

        let reenc_cleartext =
            decrypt_reencrypted(&ciphertext, &capsule, &receiving_sk, &delegating_pk, &cfrags).unwrap();
        assert_eq!(reenc_cleartext, plaintext);
    }

    #[test]
    fn test_in_place_api() {
        let threshold = 2;
        let delegating_sk = SecretKey::random(&mut OsRng);
        let delegating_pk = delegating_sk.public_key();
        let signing_sk = SecretKey::random(&mut OsRng);
        let signer = Signer::new(signing_sk.clone());
        let receiving_sk = SecretKey::random(&mut OsRng);
        let receiving_pk = receiving_sk.public_key();

        let plaintext = b"peace at dawn";
        let mut buffer = plaintext.to_vec();
        let capsule = encrypt_in_place(&mut OsRng, &mut buffer, &delegating_pk).unwrap();

        let mut alice_buffer = buffer.clone();
        decrypt_original_in_place(&mut alice_buffer, &capsule, &delegating_sk).unwrap();
        assert_eq!(alice_buffer, plaintext);

        let kfrags = generate_kfrags(&mut OsRng, &delegating_sk, &receiving_pk, &signer, threshold, 3, false, false);
        let cfrags: Vec<VerifiedCapsuleFrag> =
            kfrags[0..threshold].iter().map(|kf| reencrypt(&mut OsRng, &capsule, kf, None)).collect();

        let mut bob_buffer = buffer;
        decrypt_reencrypted_in_place(&mut bob_buffer, &capsule, &receiving_sk, &delegating_pk, &cfrags).unwrap();
        assert_eq!(bob_buffer, plaintext);
    }

    #[test]
    fn test_below_threshold_fails() {
        let threshold = 3;
        let delegating_sk = SecretKey::random(&mut OsRng);
        let delegating_pk = delegating_sk.public_key();
        let signing_sk = SecretKey::random(&mut OsRng);
        let signer = Signer::new(signing_sk.clone());
        let receiving_sk = SecretKey::random(&mut OsRng);
        let receiving_pk = receiving_sk.public_key();

        let plaintext = b"peace at dawn";
        let (capsule, ciphertext) = encrypt(&mut OsRng, &delegating_pk, plaintext);

        let kfrags = generate_kfrags(&mut OsRng, &delegating_sk, &receiving_pk, &signer, threshold, 4, false, false);
        let cfrags: Vec<VerifiedCapsuleFrag> =
            kfrags[0..threshold - 1].iter().map(|kf| reencrypt(&mut OsRng, &capsule, kf, None)).collect();

        let result = decrypt_reencrypted(&ciphertext, &capsule, &receiving_sk, &delegating_pk, &cfrags);
        assert!(matches!(result, Err(DecryptionError::Capsule(OpenReencryptedError::ValidationFailed))));
    }

    #[test]
    fn test_tampered_ciphertext_fails() {
        let delegating_sk = SecretKey::random(&mut OsRng);
        let delegating_pk = delegating_sk.public_key();
        let (capsule, mut ciphertext) = encrypt(&mut OsRng, &delegating_pk, b"peace at dawn");
        let tampered = {
            let mut bytes = ciphertext.as_bytes().to_vec();
            let last = bytes.len() - 1;
            bytes[last] ^= 1;
            Ciphertext::from_bytes(bytes)
        };
        ciphertext = tampered;
        assert!(decrypt_original(&ciphertext, &capsule, &delegating_sk).is_none());
    }
}
