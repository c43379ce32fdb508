use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::util::{BASE64_DIGITS, base64_decode};



/// Our primary ID type, which we call "key". This is the numeric `ID` column
/// of the WordPress users table (`bigint unsigned`). We have a separate Rust
/// type for it so that it cannot be confused with other integers.
///
/// `Display` and `FromStr` use the plain decimal representation that is also
/// used in the database. The compact base64 form is only used inside API IDs.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub(crate) struct Key(pub(crate) u64);

impl Key {
    pub(crate) fn from_base64(s: &str) -> Option<Self> {
        if s.len() != 11 {
            return None;
        }

        decode_base64(s.as_bytes())
    }

    pub(crate) fn to_base64<'a>(&self, out: &'a mut [u8; 11]) -> &'a str {
        // After this loop, `n` is always 0, because `u64::MAX` divided by 64
        // eleven times is 0.
        let mut n = self.0;
        for i in (0..out.len()).rev() {
            out[i] = BASE64_DIGITS[(n % 64) as usize];
            n /= 64;
        }
        debug_assert!(n == 0);

        std::str::from_utf8(out)
            .expect("bug: base64 did produce non-ASCII character")
    }
}

fn decode_base64(src: &[u8]) -> Option<Key> {
    let src: [u8; 11] = src.try_into().ok()?;

    // `u64::MAX` encodes to `P__________`, so the next higher number would
    // carry through and make the highest digit a `Q`. So we just make sure the
    // first digit is between 'A' and 'P'.
    if src[0] > b'P' || src[0] < b'A' {
        return None;
    }

    src.iter()
        .rev()
        .enumerate()
        .map(|(i, &d)| base64_decode(d).map(|n| n as u64 * 64u64.pow(i as u32)))
        .sum::<Option<u64>>()
        .map(Key)
}

impl FromStr for Key {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse().map(Key)
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut buf = [0; 11];
        write!(f, "Key({} :: {})", self.0, self.to_base64(&mut buf))
    }
}


#[cfg(test)]
mod tests {
    use super::Key;

    #[test]
    fn base64_roundtrip_edges() {
        for n in [0, 1, 63, 64, 4711, u64::MAX - 1, u64::MAX] {
            let mut buf = [0; 11];
            let s = Key(n).to_base64(&mut buf).to_owned();
            assert_eq!(Key::from_base64(&s), Some(Key(n)));
        }
    }

    #[test]
    fn base64_rejects_overflow_and_garbage() {
        assert_eq!(Key::from_base64("QAAAAAAAAAA"), None);
        assert_eq!(Key::from_base64("___________"), None);
        assert_eq!(Key::from_base64("AAAAAAAAAA*"), None);
        assert_eq!(Key::from_base64("AAAA"), None);
    }

    #[test]
    fn decimal() {
        assert_eq!("42".parse::<Key>(), Ok(Key(42)));
        assert!("-1".parse::<Key>().is_err());
        assert!("1; drop table wp_users".parse::<Key>().is_err());
        assert_eq!(Key(18446744073709551615).to_string(), "18446744073709551615");
    }
}
