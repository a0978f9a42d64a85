//! Codec and MAC primitives shared by the token, cookie and OAuth code.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use hmac::{Hmac, Mac};
use rand::Rng;
use sha2::{Digest, Sha256};

type HmacSha256 = Hmac<Sha256>;

/// Base64url without padding.
pub fn b64url_encode(input: impl AsRef<[u8]>) -> String {
    URL_SAFE_NO_PAD.encode(input)
}

/// Decodes base64url, tolerating trailing `=` padding.
pub fn b64url_decode(input: &str) -> Result<Vec<u8>, base64::DecodeError> {
    URL_SAFE_NO_PAD.decode(input.trim_end_matches('='))
}

pub fn sha256(input: impl AsRef<[u8]>) -> [u8; 32] {
    Sha256::digest(input).into()
}

fn mac_for(secret: &[u8]) -> HmacSha256 {
    HmacSha256::new_from_slice(secret).expect("HMAC accepts keys of any length")
}

/// HMAC-SHA256 of `data`, base64url encoded.
pub fn hmac_sign(secret: &[u8], data: &str) -> String {
    let mut mac = mac_for(secret);
    mac.update(data.as_bytes());
    b64url_encode(mac.finalize().into_bytes())
}

/// Constant-time check of a base64url HMAC-SHA256 signature.
pub fn hmac_verify(secret: &[u8], data: &str, signature: &str) -> bool {
    let Ok(signature) = b64url_decode(signature) else {
        return false;
    };

    let mut mac = mac_for(secret);
    mac.update(data.as_bytes());
    mac.verify_slice(&signature).is_ok()
}

/// `n` bytes from the OS RNG, base64url encoded.
pub fn random_token(n: usize) -> String {
    let mut bytes = vec![0u8; n];
    rand::rng().fill(bytes.as_mut_slice());
    b64url_encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &[u8] = b"test-secret-test-secret-test-secret";

    #[test]
    fn b64url_round_trips_arbitrary_bytes() {
        let samples: Vec<Vec<u8>> = vec![
            vec![],
            vec![0],
            vec![0, 0, 0],
            vec![0xfb, 0xff, 0xfe, 0x00, 0x3e, 0x3f],
            (0..=255u8).collect(),
        ];

        for sample in samples {
            let encoded = b64url_encode(&sample);
            assert!(!encoded.contains('='));
            assert!(!encoded.contains('+'));
            assert!(!encoded.contains('/'));
            assert_eq!(b64url_decode(&encoded).unwrap(), sample);
        }
    }

    #[test]
    fn b64url_decode_accepts_padding() {
        assert_eq!(b64url_decode("YQ==").unwrap(), b"a");
        assert_eq!(b64url_decode("YQ").unwrap(), b"a");
    }

    #[test]
    fn sha256_matches_known_vector() {
        assert_eq!(
            hex::encode(sha256("abc")),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn hmac_round_trip() {
        for payload in ["", "hello", "eyJleHAiOjF9", "with.dots.and spaces"] {
            let signature = hmac_sign(SECRET, payload);
            assert!(hmac_verify(SECRET, payload, &signature));
        }
    }

    #[test]
    fn hmac_rejects_any_single_bit_flip_in_signature() {
        let payload = "eyJleHAiOjE3MDAwMDAwMDB9";
        let signature = b64url_decode(&hmac_sign(SECRET, payload)).unwrap();

        for byte in 0..signature.len() {
            for bit in 0..8 {
                let mut mutated = signature.clone();
                mutated[byte] ^= 1 << bit;
                assert!(!hmac_verify(SECRET, payload, &b64url_encode(&mutated)));
            }
        }
    }

    #[test]
    fn hmac_rejects_mutated_payload_and_wrong_secret() {
        let signature = hmac_sign(SECRET, "payload");
        assert!(!hmac_verify(SECRET, "payloae", &signature));
        assert!(!hmac_verify(b"other-secret", "payload", &signature));
        assert!(!hmac_verify(SECRET, "payload", "not base64 !!"));
    }

    #[test]
    fn random_tokens_differ() {
        let a = random_token(32);
        let b = random_token(32);
        assert_eq!(a.len(), 43);
        assert_ne!(a, b);
    }
}
