//! Random node label values.

use rand::Rng;

/// Alphabet of the Kubernetes simple name generator
const ALPHABET: &[u8] = b"bcdfghjklmnpqrstvwxz2456789";
const RANDOM_LENGTH: usize = 5;
const MAX_NAME_LENGTH: usize = 63;
const MAX_PREFIX_LENGTH: usize = MAX_NAME_LENGTH - RANDOM_LENGTH;

/// Returns `prefix` followed by five random characters.
///
/// Overlong prefixes are truncated so the result stays a valid label value.
pub fn generate_name(prefix: &str) -> String {
    let prefix = match prefix.char_indices().nth(MAX_PREFIX_LENGTH) {
        Some((end, _)) => &prefix[..end],
        None => prefix,
    };
    let mut rng = rand::rng();
    let suffix: String = (0..RANDOM_LENGTH)
        .map(|_| ALPHABET[rng.random_range(0..ALPHABET.len())] as char)
        .collect();
    format!("{prefix}{suffix}")
}
