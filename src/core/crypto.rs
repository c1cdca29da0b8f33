// Symmetric sealing (XSalsa20-Poly1305, nonce-prefixed) and BLAKE3 hashing.
use crate::core::error::{Error, ErrorKind};
use crate::core::keys::fill_random;
use crypto_secretbox::aead::{Aead, KeyInit};
use crypto_secretbox::{Key, Nonce, XSalsa20Poly1305};

pub const NONCE_LEN: usize = 24;
pub const TAG_LEN: usize = 16;

pub fn encrypt(plain_text: &[u8], key: &[u8; 32]) -> Result<Vec<u8>, Error> {
    let cipher = XSalsa20Poly1305::new(Key::from_slice(key));
    let mut nonce = [0u8; NONCE_LEN];
    fill_random(&mut nonce)?;
    let sealed = cipher
        .encrypt(Nonce::from_slice(&nonce), plain_text)
        .map_err(|_| Error::new(ErrorKind::Internal).with_message("encryption failed"))?;
    let mut out = Vec::with_capacity(NONCE_LEN + sealed.len());
    out.extend_from_slice(&nonce);
    out.extend_from_slice(&sealed);
    Ok(out)
}

pub fn decrypt(bytes: &[u8], key: &[u8; 32]) -> Result<Vec<u8>, Error> {
    if bytes.len() < NONCE_LEN + TAG_LEN {
        return Err(Error::new(ErrorKind::Corrupt).with_message("encrypted payload too small"));
    }
    let (nonce, sealed) = bytes.split_at(NONCE_LEN);
    let cipher = XSalsa20Poly1305::new(Key::from_slice(key));
    cipher
        .decrypt(Nonce::from_slice(nonce), sealed)
        .map_err(|_| Error::new(ErrorKind::Corrupt).with_message("decryption failed"))
}

pub fn hash(bytes: &[u8]) -> [u8; 32] {
    *blake3::hash(bytes).as_bytes()
}

#[cfg(test)]
mod tests {
    use super::{NONCE_LEN, TAG_LEN, decrypt, encrypt, hash};
    use crate::core::error::ErrorKind;

    #[test]
    fn sealed_box_opens_with_same_key() {
        let key = [9u8; 32];
        let sealed = encrypt(b"secret", &key).expect("encrypt");
        assert_eq!(sealed.len(), NONCE_LEN + TAG_LEN + 6);
        assert_eq!(decrypt(&sealed, &key).expect("decrypt"), b"secret");
    }

    #[test]
    fn wrong_key_is_corrupt() {
        let sealed = encrypt(b"secret", &[1u8; 32]).expect("encrypt");
        let err = decrypt(&sealed, &[2u8; 32]).expect_err("wrong key");
        assert_eq!(err.kind(), ErrorKind::Corrupt);
    }

    #[test]
    fn nonces_differ_per_call() {
        let key = [3u8; 32];
        let first = encrypt(b"same", &key).expect("first");
        let second = encrypt(b"same", &key).expect("second");
        assert_ne!(first[..NONCE_LEN], second[..NONCE_LEN]);
    }

    #[test]
    fn truncated_input_is_rejected() {
        let err = decrypt(&[0u8; 10], &[0u8; 32]).expect_err("short");
        assert_eq!(err.kind(), ErrorKind::Corrupt);
    }

    #[test]
    fn hash_is_blake3() {
        assert_eq!(
            hex::encode(hash(b"")),
            "af1349b9f5f9a1a6a0404dea36dcc9499bcb25c9adc112b7cc9a93cae41f3262"
        );
    }
}
