use portal_core::shortcode::BASE62_ALPHABET;

/// Encodes `value` as exactly `width` base62 digits, most significant first.
///
/// Higher digits that do not fit in `width` are dropped, so callers must keep
/// `value < 62^width`.
pub fn encode_fixed(mut value: u64, width: usize) -> String {
    let mut digits = vec![BASE62_ALPHABET[0]; width];
    for slot in digits.iter_mut().rev() {
        *slot = BASE62_ALPHABET[(value % 62) as usize];
        value /= 62;
    }
    // The alphabet is ASCII.
    digits.into_iter().map(char::from).collect()
}

/// Decodes a base62 string. Returns `None` on foreign characters or overflow.
pub fn decode(encoded: &str) -> Option<u64> {
    encoded.bytes().try_fold(0_u64, |acc, b| {
        let digit = BASE62_ALPHABET.iter().position(|&c| c == b)? as u64;
        acc.checked_mul(62)?.checked_add(digit)
    })
}

/// `62^width`, the size of the code space for codes of `width` characters.
pub fn space(width: usize) -> u64 {
    62_u64.pow(width as u32)
}
