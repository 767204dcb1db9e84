//! Pack encryption using AES-256 in CFB-8 mode.
//!
//! CFB-8 is stream-like: no padding, and the ciphertext is exactly the
//! plaintext length plus the 16-byte IV prepended to it. The cipher gives
//! confidentiality only; transfer integrity comes from the separate
//! content-hash check.

use crate::error::{CryptoError, CryptoResult};
use crate::key::{PackKey, IV_SIZE};
use cfb8::cipher::{AsyncStreamCipher, KeyIvInit};
use rand::RngCore;

type Aes256Cfb8Enc = cfb8::Encryptor<aes::Aes256>;
type Aes256Cfb8Dec = cfb8::Decryptor<aes::Aes256>;

/// Encrypts plaintext under the given key.
///
/// A fresh random IV is generated per call, so encrypting the same
/// plaintext twice yields different ciphertexts.
///
/// The output format is: `iv (16 bytes) || ciphertext`.
pub fn encrypt(plaintext: &[u8], key: &PackKey) -> CryptoResult<Vec<u8>> {
    let mut iv = [0u8; IV_SIZE];
    rand::thread_rng().fill_bytes(&mut iv);

    let cipher = Aes256Cfb8Enc::new_from_slices(key.as_bytes(), &iv)
        .map_err(|e| CryptoError::invalid_key(e.to_string()))?;

    let mut out = Vec::with_capacity(IV_SIZE + plaintext.len());
    out.extend_from_slice(&iv);
    out.extend_from_slice(plaintext);
    cipher.encrypt(&mut out[IV_SIZE..]);

    Ok(out)
}

/// Decrypts data that was produced by [`encrypt`].
///
/// # Errors
///
/// Returns a format error if the input is not longer than the IV. Note
/// that CFB-8 has no authentication: decrypting tampered input succeeds
/// and yields garbage, which the caller catches via the content hash.
pub fn decrypt(ciphertext: &[u8], key: &PackKey) -> CryptoResult<Vec<u8>> {
    if ciphertext.len() <= IV_SIZE {
        return Err(CryptoError::format(format!(
            "ciphertext too short: {} bytes, need more than {IV_SIZE}",
            ciphertext.len()
        )));
    }

    let (iv, body) = ciphertext.split_at(IV_SIZE);
    let cipher = Aes256Cfb8Dec::new_from_slices(key.as_bytes(), iv)
        .map_err(|e| CryptoError::invalid_key(e.to_string()))?;

    let mut out = body.to_vec();
    cipher.decrypt(&mut out);
    Ok(out)
}
