//! Symmetric payload encryption: a KEM-derived key seed is stretched into a
//! ChaCha20-Poly1305 key, and the capsule's serialized bytes are bound in as
//! associated data (spec.md §4.6).

#[cfg(feature = "std")]
use alloc::vec::Vec;

use chacha20poly1305::aead::{AeadInPlace, Buffer, KeyInit};
use chacha20poly1305::{ChaCha20Poly1305, Key, Nonce};
use generic_array::typenum::Unsigned;
use rand_core::{CryptoRng, RngCore};

use crate::hashing::kdf;

const NONCE_SIZE: usize = 12;
const KDF_INFO: &[u8] = b"DEM_KEY";

/// A ciphertext produced by [`UmbralDEM::encrypt`]: a random 12-byte nonce
/// followed by the AEAD-sealed payload (`nonce ‖ sealed`, spec.md §4.6).
#[cfg(feature = "std")]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Ciphertext {
    bytes: Vec<u8>,
}

#[cfg(feature = "std")]
impl Ciphertext {
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self { bytes: bytes.into() }
    }
}

/// A ChaCha20-Poly1305 instance keyed from a KEM-derived seed, re-stretched
/// through the shared BLAKE2b HKDF so the AEAD key is never the raw shared
/// secret bytes.
pub(crate) struct UmbralDEM {
    cipher: ChaCha20Poly1305,
}

impl UmbralDEM {
    pub(crate) fn new(key_seed: &[u8]) -> Self {
        let key_bytes = kdf(
            key_seed,
            <ChaCha20Poly1305 as KeyInit>::KeySize::to_usize(),
            None,
            Some(KDF_INFO),
        );
        let key = Key::from_slice(&key_bytes);
        Self { cipher: ChaCha20Poly1305::new(key) }
    }

    /// Seals `buffer` in place, replacing its contents with `nonce ‖ sealed`
    /// and authenticating `authenticated_data` (the capsule's serialized
    /// bytes). The nonce is drawn from `rng` and prepended to the output, per
    /// spec.md §4.6's `ct = nonce ‖ sealed` wire format.
    pub(crate) fn encrypt_in_place(
        &self,
        rng: &mut (impl CryptoRng + RngCore),
        buffer: &mut dyn Buffer,
        authenticated_data: &[u8],
    ) -> Option<()> {
        let mut nonce_bytes = [0u8; NONCE_SIZE];
        rng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        self.cipher.encrypt_in_place(nonce, authenticated_data, buffer).ok()?;

        let sealed_len = buffer.len();
        buffer.extend_from_slice(&nonce_bytes).ok()?;
        let all = buffer.as_mut();
        all.copy_within(0..sealed_len, NONCE_SIZE);
        all[..NONCE_SIZE].copy_from_slice(&nonce_bytes);
        Some(())
    }

    /// Reverses [`Self::encrypt_in_place`]: reads the nonce from the front of
    /// `buffer`, then opens the remaining sealed bytes in place.
    pub(crate) fn decrypt_in_place(
        &self,
        buffer: &mut dyn Buffer,
        authenticated_data: &[u8],
    ) -> Option<()> {
        if buffer.len() < NONCE_SIZE {
            return None;
        }
        let mut nonce_bytes = [0u8; NONCE_SIZE];
        nonce_bytes.copy_from_slice(&buffer.as_ref()[..NONCE_SIZE]);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let sealed_len = buffer.len() - NONCE_SIZE;
        let all = buffer.as_mut();
        all.copy_within(NONCE_SIZE.., 0);
        buffer.truncate(sealed_len);

        self.cipher.decrypt_in_place(nonce, authenticated_data, buffer).ok()
    }

    #[cfg(feature = "std")]
    pub(crate) fn encrypt(
        &self,
        rng: &mut (impl CryptoRng + RngCore),
        plaintext: &[u8],
        authenticated_data: &[u8],
    ) -> Ciphertext {
        let mut buffer = plaintext.to_vec();
        self.encrypt_in_place(rng, &mut buffer, authenticated_data)
            .expect("encryption with a freshly generated nonce does not fail");
        Ciphertext { bytes: buffer }
    }

    #[cfg(feature = "std")]
    pub(crate) fn decrypt(&self, ciphertext: &Ciphertext, authenticated_data: &[u8]) -> Option<Vec<u8>> {
        let mut buffer = ciphertext.bytes.clone();
        self.decrypt_in_place(&mut buffer, authenticated_data)?;
        Some(buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand_core::OsRng;

    #[test]
    fn test_roundtrip() {
        let dem = UmbralDEM::new(b"some key seed material, 32+ bytes long for testing");
        let plaintext = b"peace at dawn";
        let aad = b"capsule bytes stand-in";

        let ciphertext = dem.encrypt(&mut OsRng, plaintext, aad);
        let decrypted = dem.decrypt(&ciphertext, aad).unwrap();
        assert_eq!(decrypted, plaintext);
    }

    #[test]
    fn test_wrong_aad_fails() {
        let dem = UmbralDEM::new(b"some key seed material, 32+ bytes long for testing");
        let ciphertext = dem.encrypt(&mut OsRng, b"peace at dawn", b"aad one");
        assert!(dem.decrypt(&ciphertext, b"aad two").is_none());
    }

    #[test]
    fn test_tampered_ciphertext_fails() {
        let dem = UmbralDEM::new(b"some key seed material, 32+ bytes long for testing");
        let mut ciphertext = dem.encrypt(&mut OsRng, b"peace at dawn", b"aad");
        let last = ciphertext.bytes.len() - 1;
        ciphertext.bytes[last] ^= 1;
        assert!(dem.decrypt(&ciphertext, b"aad").is_none());
    }
}
