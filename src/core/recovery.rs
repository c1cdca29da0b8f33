//! Purpose: Passphrase-protected recovery files for a secret key.
//! Exports: `create_recovery_file`, `decrypt_recovery_file`.
//! Invariants: Layout is `header line \n sealed(secret)`; key is Argon2id(passphrase, "recovery").
//! Invariants: Legacy `pkarr.org/recovery` header lines are still accepted on decrypt.
use crate::core::crypto;
use crate::core::error::{Error, ErrorKind};
use crate::core::keys::Keypair;
use argon2::Argon2;

const SPEC_NAME: &str = "recovery";
const HEADER_LINE: &str = "pubky.org/recovery";
const LEGACY_HEADER_LINE: &str = "pkarr.org/recovery";

pub fn create_recovery_file(keypair: &Keypair, passphrase: &str) -> Result<Vec<u8>, Error> {
    let key = encryption_key(passphrase)?;
    let sealed = crypto::encrypt(&keypair.secret_key(), &key)?;
    let mut out = Vec::with_capacity(HEADER_LINE.len() + 1 + sealed.len());
    out.extend_from_slice(HEADER_LINE.as_bytes());
    out.push(b'\n');
    out.extend_from_slice(&sealed);
    Ok(out)
}

pub fn decrypt_recovery_file(recovery_file: &[u8], passphrase: &str) -> Result<Keypair, Error> {
    let newline = recovery_file
        .iter()
        .position(|&byte| byte == b'\n')
        .ok_or_else(|| Error::new(ErrorKind::Corrupt).with_message("recovery file has no header line"))?;
    let header_line = &recovery_file[..newline];
    if !(header_line.starts_with(HEADER_LINE.as_bytes())
        || header_line.starts_with(LEGACY_HEADER_LINE.as_bytes()))
    {
        return Err(Error::new(ErrorKind::Corrupt).with_message("unknown recovery file header line"));
    }
    let sealed = &recovery_file[newline + 1..];
    if sealed.is_empty() {
        return Err(Error::new(ErrorKind::Corrupt).with_message("recovery file too small"));
    }
    let key = encryption_key(passphrase)?;
    let plain = crypto::decrypt(sealed, &key)?;
    let length = plain.len();
    let secret: [u8; 32] = plain.try_into().map_err(|_| {
        Error::new(ErrorKind::Corrupt)
            .with_message(format!("recovered secret key has length {length}, expected 32"))
    })?;
    Ok(Keypair::from_secret_key(&secret))
}

fn encryption_key(passphrase: &str) -> Result<[u8; 32], Error> {
    let mut out = [0u8; 32];
    Argon2::default()
        .hash_password_into(passphrase.as_bytes(), SPEC_NAME.as_bytes(), &mut out)
        .map_err(|err| {
            Error::new(ErrorKind::Internal).with_message(format!("key derivation failed: {err}"))
        })?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::{HEADER_LINE, create_recovery_file, decrypt_recovery_file};
    use crate::core::error::ErrorKind;
    use crate::core::keys::Keypair;

    #[test]
    fn recovery_file_restores_secret() {
        let keypair = Keypair::from_secret_key(&[42u8; 32]);
        let file = create_recovery_file(&keypair, "correct horse").expect("create");
        assert!(file.starts_with(HEADER_LINE.as_bytes()));
        let restored = decrypt_recovery_file(&file, "correct horse").expect("decrypt");
        assert_eq!(restored.secret_key(), keypair.secret_key());
    }

    #[test]
    fn wrong_passphrase_fails() {
        let keypair = Keypair::from_secret_key(&[1u8; 32]);
        let file = create_recovery_file(&keypair, "right").expect("create");
        let err = decrypt_recovery_file(&file, "wrong").expect_err("wrong passphrase");
        assert_eq!(err.kind(), ErrorKind::Corrupt);
    }

    #[test]
    fn malformed_files_are_rejected() {
        let err = decrypt_recovery_file(b"no newline here", "x").expect_err("no newline");
        assert_eq!(err.kind(), ErrorKind::Corrupt);

        let err = decrypt_recovery_file(b"example.com/other\nabc", "x").expect_err("header");
        assert_eq!(err.message(), Some("unknown recovery file header line"));

        let err = decrypt_recovery_file(b"pubky.org/recovery\n", "x").expect_err("empty");
        assert_eq!(err.message(), Some("recovery file too small"));
    }

    #[test]
    fn legacy_header_line_is_accepted() {
        let keypair = Keypair::from_secret_key(&[5u8; 32]);
        let file = create_recovery_file(&keypair, "pass").expect("create");
        let mut legacy = b"pkarr.org/recovery".to_vec();
        legacy.extend_from_slice(&file[HEADER_LINE.len()..]);
        let restored = decrypt_recovery_file(&legacy, "pass").expect("legacy");
        assert_eq!(restored.public_key(), keypair.public_key());
    }
}
