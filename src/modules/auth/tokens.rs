use rand::Rng;

pub const DEFAULT_KEY_LENGTH: usize = 32;
pub const DEFAULT_KEY_CHARS: &str =
    "abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Generates session tokens of a fixed length over a fixed alphabet
#[derive(Debug, Clone)]
pub struct TokenGenerator {
    alphabet: Vec<char>,
    length: usize,
}

impl TokenGenerator {
    /// Returns `None` for an empty alphabet or a zero length
    pub fn new(alphabet: &str, length: usize) -> Option<Self> {
        let alphabet: Vec<char> = alphabet.chars().collect();
        if alphabet.is_empty() || length == 0 {
            return None;
        }
        Some(Self { alphabet, length })
    }

    /// Each character is drawn independently and uniformly from the alphabet
    pub fn generate(&self) -> String {
        let mut rng = rand::thread_rng();
        (0..self.length)
            .map(|_| self.alphabet[rng.gen_range(0..self.alphabet.len())])
            .collect()
    }

    /// Entropy of one token in bits
    pub fn entropy_bits(&self) -> f64 {
        self.length as f64 * (self.alphabet.len() as f64).log2()
    }
}

impl Default for TokenGenerator {
    fn default() -> Self {
        Self {
            alphabet: DEFAULT_KEY_CHARS.chars().collect(),
            length: DEFAULT_KEY_LENGTH,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_default_generator() {
        let generator = TokenGenerator::default();
        let token = generator.generate();
        assert_eq!(token.chars().count(), 32);
        assert!(token.chars().all(|c| c.is_ascii_alphanumeric()));
        // 32 symbols over 62 characters
        assert!(generator.entropy_bits() > 190.0);
    }

    #[test]
    fn test_custom_alphabet() {
        let generator = TokenGenerator::new("asdfjkl;2357", 26).unwrap();
        let token = generator.generate();
        assert_eq!(token.chars().count(), 26);
        assert!(token.chars().all(|c| "asdfjkl;2357".contains(c)));
    }

    #[test]
    fn test_rejects_degenerate_config() {
        assert!(TokenGenerator::new("", 32).is_none());
        assert!(TokenGenerator::new("abc", 0).is_none());
    }

    #[test]
    fn test_tokens_are_distinct() {
        let generator = TokenGenerator::default();
        let tokens: HashSet<String> = (0..1000).map(|_| generator.generate()).collect();
        assert_eq!(tokens.len(), 1000);
    }
}
