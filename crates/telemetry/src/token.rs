//! Token estimation.
//!
//! A byte-length heuristic (about four bytes per token) used for the
//! context-size breakdown and as the fallback when a provider omits usage.

/// Estimate the token count of `text`, rounding up.
pub fn estimate_tokens(text: &str) -> u64 {
    text.len().div_ceil(4) as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_text_is_zero() {
        assert_eq!(estimate_tokens(""), 0);
    }

    #[test]
    fn rounds_up() {
        assert_eq!(estimate_tokens("abcd"), 1);
        assert_eq!(estimate_tokens("abcde"), 2);
        // 20 bytes ≈ 5 tokens
        assert_eq!(estimate_tokens("12345678901234567890"), 5);
    }

    #[test]
    fn counts_bytes_not_chars() {
        // "ü" is two bytes in UTF-8
        assert_eq!(estimate_tokens("üüüü"), 2);
    }
}
