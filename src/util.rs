use rand::{CryptoRng, RngCore};


/// The alphabet we use for the compact base64 encoding of keys inside IDs.
/// This is the URL-safe alphabet, so IDs can be used in URLs without escaping.
pub(crate) const BASE64_DIGITS: &[u8; 64] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-_";

/// Returns the 6 bit value of the given base64 digit or `None` if it is not a
/// valid digit of `BASE64_DIGITS`.
pub(crate) fn base64_decode(ascii: u8) -> Option<u8> {
    let n = match ascii {
        b'A'..=b'Z' => ascii - b'A',
        b'a'..=b'z' => ascii - b'a' + 26,
        b'0'..=b'9' => ascii - b'0' + 52,
        b'-' => 62,
        b'_' => 63,
        _ => return None,
    };

    Some(n)
}

/// Generate random bytes with a crypotgraphically secure RNG.
pub(crate) fn gen_random_bytes_crypto<const N: usize>() -> [u8; N] {
    // The explicit `CryptoRng` bound makes sure that a future `rand` update
    // that makes `rng()` non-cryptographic does not silently compile.
    fn imp<const N: usize>(mut rng: impl RngCore + CryptoRng) -> [u8; N] {
        let mut bytes = [0; N];
        rng.fill_bytes(&mut bytes);
        bytes
    }

    imp(rand::rng())
}


#[cfg(test)]
mod tests {
    use super::{BASE64_DIGITS, base64_decode};

    #[test]
    fn base64_digits_roundtrip() {
        for (i, &d) in BASE64_DIGITS.iter().enumerate() {
            assert_eq!(base64_decode(d), Some(i as u8));
        }
    }

    #[test]
    fn base64_invalid_digits() {
        for d in [b'*', b'?', b'/', b'+', b'=', b' ', 0xC3] {
            assert_eq!(base64_decode(d), None);
        }
    }
}
