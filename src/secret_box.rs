//! A small zeroizing wrapper for secret values, used by [`crate::keys`] to
//! keep private scalars and seeds off the heap longer than necessary and to
//! guarantee they're wiped on drop.

use zeroize::Zeroize;

/// Owns a `T` and zeroizes it when dropped. Does not implement `Clone`,
/// `Debug`, or `Display` — the only way to read the value is [`Self::as_secret`].
pub(crate) struct SecretBox<T: Zeroize> {
    inner: T,
}

impl<T: Zeroize> SecretBox<T> {
    pub(crate) fn new(inner: T) -> Self {
        Self { inner }
    }

    pub(crate) fn as_secret(&self) -> &T {
        &self.inner
    }
}

impl<T: Zeroize> Drop for SecretBox<T> {
    fn drop(&mut self) {
        self.inner.zeroize();
    }
}
