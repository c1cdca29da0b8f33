// z-base-32 codec used for public key text form (no padding, MSB first).
use crate::core::error::{Error, ErrorKind};

const ALPHABET: &[u8; 32] = b"ybndrfg8ejkmcpqxot1uwisza345h769";

pub fn encode(input: &[u8]) -> String {
    let mut out = String::with_capacity((input.len() * 8).div_ceil(5));
    let mut buffer: u32 = 0;
    let mut bits = 0u32;
    for &byte in input {
        buffer = (buffer << 8) | u32::from(byte);
        bits += 8;
        while bits >= 5 {
            bits -= 5;
            let index = (buffer >> bits) & 0x1f;
            out.push(ALPHABET[index as usize] as char);
        }
        buffer &= (1 << bits) - 1;
    }
    if bits > 0 {
        let index = (buffer << (5 - bits)) & 0x1f;
        out.push(ALPHABET[index as usize] as char);
    }
    out
}

pub fn decode(input: &str) -> Result<Vec<u8>, Error> {
    let mut out = Vec::with_capacity(input.len() * 5 / 8);
    let mut buffer: u32 = 0;
    let mut bits = 0u32;
    for ch in input.bytes() {
        let value = symbol_value(ch.to_ascii_lowercase()).ok_or_else(|| {
            Error::new(ErrorKind::Usage)
                .with_message(format!("invalid z-base-32 character '{}'", ch as char))
        })?;
        buffer = (buffer << 5) | u32::from(value);
        bits += 5;
        if bits >= 8 {
            bits -= 8;
            out.push((buffer >> bits) as u8);
            buffer &= (1 << bits) - 1;
        }
    }
    Ok(out)
}

fn symbol_value(ch: u8) -> Option<u8> {
    ALPHABET
        .iter()
        .position(|&candidate| candidate == ch)
        .map(|index| index as u8)
}

#[cfg(test)]
mod tests {
    use super::{decode, encode};
    use crate::core::error::ErrorKind;

    #[test]
    fn public_key_length_is_52_chars() {
        let encoded = encode(&[0xab; 32]);
        assert_eq!(encoded.len(), 52);
        assert_eq!(decode(&encoded).expect("decode"), vec![0xab; 32]);
    }

    #[test]
    fn known_vectors() {
        assert_eq!(encode(&[]), "");
        assert_eq!(encode(&[0x00]), "yy");
        assert_eq!(encode(&[0xff]), "9h");
        assert_eq!(encode(b"hello"), "pb1sa5dx");
    }

    #[test]
    fn decode_is_case_insensitive() {
        assert_eq!(decode("PB1SA5DX").expect("decode"), b"hello".to_vec());
    }

    #[test]
    fn decode_rejects_foreign_symbols() {
        let err = decode("pb1sa5d0").expect_err("0 is not in the alphabet");
        assert_eq!(err.kind(), ErrorKind::Usage);
    }
}
