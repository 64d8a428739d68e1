//! Order reference extraction from transfer notes
//!
//! Bank transfer notes arrive as free text ("Thanh toan ORD1001", sometimes
//! with bank-injected prefixes or extra words). The order reference is the
//! first whitespace-separated token shaped like `ORDER<digits>` or
//! `ORD<digits>`. When no token matches, the whole trimmed note is taken as
//! the candidate: payers sometimes paste the bare order id with spaces
//! stripped by their banking app.

use regex::Regex;
use std::sync::OnceLock;

static ORDER_REF: OnceLock<Regex> = OnceLock::new();

fn order_ref_pattern() -> &'static Regex {
    ORDER_REF.get_or_init(|| Regex::new(r"^(?:ORDER|ORD)\d+$").expect("valid order ref pattern"))
}

/// Recover a candidate order id from a transfer note. Blank notes carry no
/// candidate at all.
pub fn extract_order_id(content: &str) -> Option<String> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return None;
    }

    trimmed
        .split_whitespace()
        .find(|token| order_ref_pattern().is_match(token))
        .map(str::to_string)
        .or_else(|| Some(trimmed.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_prefixed_token_from_note() {
        assert_eq!(
            extract_order_id("Thanh toan ORD1001").as_deref(),
            Some("ORD1001")
        );
        assert_eq!(
            extract_order_id("ORDER123 chuyen khoan").as_deref(),
            Some("ORDER123")
        );
    }

    #[test]
    fn first_matching_token_wins() {
        assert_eq!(
            extract_order_id("ORD1 then ORD2").as_deref(),
            Some("ORD1")
        );
    }

    #[test]
    fn falls_back_to_whole_trimmed_note() {
        assert_eq!(extract_order_id("  ABC999  ").as_deref(), Some("ABC999"));
        assert_eq!(
            extract_order_id("thanh toan don hang").as_deref(),
            Some("thanh toan don hang")
        );
    }

    #[test]
    fn blank_note_has_no_candidate() {
        assert_eq!(extract_order_id(""), None);
        assert_eq!(extract_order_id("   "), None);
    }

    #[test]
    fn prefix_without_digits_does_not_match() {
        // "ORDER" alone fails the pattern, so the fallback applies
        assert_eq!(extract_order_id("ORDER").as_deref(), Some("ORDER"));
    }
}
