//! String utility functions

use rand::Rng;
use rand::distributions::Alphanumeric;

/// Length of generated span-name tokens
pub const NAME_TOKEN_LENGTH: usize = 8;

/// Generate a random alphanumeric token of the given length.
///
/// Used as a fallback span name when the producer sent an empty one.
pub fn random_name_token(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_name_token_length() {
        assert_eq!(random_name_token(NAME_TOKEN_LENGTH).len(), 8);
        assert_eq!(random_name_token(16).len(), 16);
        assert_eq!(random_name_token(0).len(), 0);
    }

    #[test]
    fn test_random_name_token_alphanumeric() {
        let token = random_name_token(64);
        assert!(token.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn test_random_name_token_varies() {
        // Two 32-char draws colliding would mean a broken RNG
        assert_ne!(random_name_token(32), random_name_token(32));
    }
}
