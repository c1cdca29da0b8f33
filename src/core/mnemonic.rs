// BIP-39 phrases and the keypair derivation shared with other Pubky clients.
use crate::core::error::{Error, ErrorKind};
use crate::core::keys::{Keypair, fill_random};
use bip39::{Language, Mnemonic};

// 128 bits of entropy -> 12 words.
const ENTROPY_LEN: usize = 16;

pub fn generate_mnemonic() -> Result<String, Error> {
    let mut entropy = [0u8; ENTROPY_LEN];
    fill_random(&mut entropy)?;
    let mnemonic = Mnemonic::from_entropy_in(Language::English, &entropy).map_err(|err| {
        Error::new(ErrorKind::Internal)
            .with_message(format!("Failed to generate mnemonic: {err}"))
    })?;
    Ok(mnemonic.to_string())
}

/// Derives the hex secret key from the first 32 bytes of the BIP-39 seed
/// (empty passphrase).
pub fn mnemonic_to_secret_hex(phrase: &str) -> Result<String, Error> {
    let mnemonic = parse(phrase)?;
    let seed = mnemonic.to_seed("");
    Ok(hex::encode(&seed[..32]))
}

pub fn mnemonic_to_keypair(phrase: &str) -> Result<Keypair, Error> {
    let mnemonic = parse(phrase)?;
    let seed = mnemonic.to_seed("");
    let mut secret = [0u8; 32];
    secret.copy_from_slice(&seed[..32]);
    Ok(Keypair::from_secret_key(&secret))
}

pub fn generate_mnemonic_and_keypair() -> Result<(String, Keypair), Error> {
    let phrase = generate_mnemonic()?;
    let keypair = mnemonic_to_keypair(&phrase)?;
    Ok((phrase, keypair))
}

pub fn validate_mnemonic(phrase: &str) -> bool {
    parse(phrase).is_ok()
}

fn parse(phrase: &str) -> Result<Mnemonic, Error> {
    Mnemonic::parse_in(Language::English, phrase).map_err(|err| {
        Error::new(ErrorKind::Usage)
            .with_message("Invalid mnemonic phrase")
            .with_source(err)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::keys::secret_hex;

    const ABANDON: &str = "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";

    #[test]
    fn generated_phrase_has_twelve_valid_words() {
        let phrase = generate_mnemonic().expect("generate");
        assert_eq!(phrase.split_whitespace().count(), 12);
        assert!(validate_mnemonic(&phrase));
    }

    #[test]
    fn derivation_is_deterministic() {
        let first = mnemonic_to_keypair(ABANDON).expect("first");
        let second = mnemonic_to_keypair(ABANDON).expect("second");
        assert_eq!(first.public_key(), second.public_key());
        assert_eq!(
            mnemonic_to_secret_hex(ABANDON).expect("hex"),
            secret_hex(&first)
        );
    }

    #[test]
    fn derivation_matches_bip39_seed_prefix() {
        // BIP-39 test vector seed for the all-abandon phrase with an empty passphrase.
        assert_eq!(
            mnemonic_to_secret_hex(ABANDON).expect("hex"),
            "5eb00bbddcf069084889a8ab9155568165f5c453ccb85e70811aaed6f6da5fc1"
        );
    }

    #[test]
    fn invalid_phrases_are_rejected() {
        assert!(!validate_mnemonic("invalid words that are not in the bip39 wordlist"));
        assert!(!validate_mnemonic("abandon abandon abandon"));
        let err = mnemonic_to_keypair("invalid mnemonic phrase").expect_err("invalid");
        assert_eq!(err.message(), Some("Invalid mnemonic phrase"));
    }

    #[test]
    fn generated_pair_matches_rederivation() {
        let (phrase, keypair) = generate_mnemonic_and_keypair().expect("pair");
        let again = mnemonic_to_keypair(&phrase).expect("again");
        assert_eq!(again.secret_key(), keypair.secret_key());
    }
}
