//! Checking passwords against hashes stored by WordPress.
//!
//! WordPress (before 6.8) stores "portable" phpass hashes: `$P$` followed by
//! one character encoding the log2 of the iteration count, an 8 character
//! salt and the 22 character encoded MD5 digest. Very old installations
//! stored plain hex MD5 hashes, which WordPress still accepts, so we do too.

use crate::util::gen_random_bytes_crypto;


/// The alphabet of phpass' own base64 variant. Note that the order differs
/// from standard base64.
const ITOA64: &[u8; 64] = b"./0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";

/// phpass refuses to hash longer passwords.
const MAX_PASSWORD_LEN: usize = 4096;

/// log2 of the iteration count of new hashes. Same as WordPress uses.
const HASH_COST: usize = 8;

const PORTABLE_HASH_LEN: usize = 34;


/// Returns `true` if `password` matches the `stored` hash. Hashes in an
/// unknown format never match.
pub(crate) fn check(password: &str, stored: &str) -> bool {
    if password.len() > MAX_PASSWORD_LEN {
        return false;
    }

    if is_legacy_md5(stored) {
        return format!("{:x}", md5::compute(password)) == stored.to_ascii_lowercase();
    }

    match crypt_portable(password.as_bytes(), stored) {
        Some(computed) => computed == stored,
        None => false,
    }
}

/// Creates a new portable hash of `password` with a random salt.
pub(crate) fn hash(password: &str) -> String {
    let mut setting = String::from("$P$");
    setting.push(ITOA64[HASH_COST + 5] as char);
    encode64(&gen_random_bytes_crypto::<6>(), &mut setting);

    crypt_portable(password.as_bytes(), &setting)
        .expect("bug: generated invalid phpass setting")
}

fn is_legacy_md5(stored: &str) -> bool {
    stored.len() == 32 && stored.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Hashes `password` with the parameters found in the first 12 characters of
/// `setting`. Returns `None` if `setting` is not a valid portable hash
/// setting.
fn crypt_portable(password: &[u8], setting: &str) -> Option<String> {
    let setting = setting.as_bytes();
    if setting.len() < 12 || !(setting.starts_with(b"$P$") || setting.starts_with(b"$H$")) {
        return None;
    }

    let count_log2 = ITOA64.iter().position(|&c| c == setting[3])?;
    if !(7..=30).contains(&count_log2) {
        return None;
    }
    let salt = &setting[4..12];

    let mut hash = md5_concat(salt, password);
    for _ in 0..(1u32 << count_log2) {
        hash = md5_concat(&hash, password);
    }

    // Fails if the salt ends in the middle of a multibyte character.
    let prefix = std::str::from_utf8(&setting[..12]).ok()?;
    let mut out = String::with_capacity(PORTABLE_HASH_LEN);
    out.push_str(prefix);
    encode64(&hash, &mut out);
    Some(out)
}

fn md5_concat(a: &[u8], b: &[u8]) -> [u8; 16] {
    let mut ctx = md5::Context::new();
    ctx.consume(a);
    ctx.consume(b);
    ctx.compute().0
}

/// phpass' base64 variant: little endian groups of 3 bytes, no padding.
fn encode64(input: &[u8], out: &mut String) {
    let digit = |v: u32| ITOA64[(v & 0x3f) as usize] as char;

    for chunk in input.chunks(3) {
        let value = chunk.iter()
            .enumerate()
            .fold(0u32, |acc, (i, &b)| acc | (b as u32) << (8 * i));

        out.push(digit(value));
        out.push(digit(value >> 6));
        if chunk.len() > 1 {
            out.push(digit(value >> 12));
        }
        if chunk.len() > 2 {
            out.push(digit(value >> 18));
        }
    }
}
