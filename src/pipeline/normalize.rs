//! Field-level normalization shared by every scraper: price-text parsing,
//! discount derivation, title cleanup. Scrapers produce raw JSON values;
//! everything that turns those into comparable numbers lives here.

/// Parse a price string like `"$1,299.99"`, `"1299.99"`, or `"$25"` into a
/// numeric dollar value. Returns None for free/unparseable text.
pub fn parse_price_text(s: &str) -> Option<f64> {
    let cleaned: String = s
        .trim()
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    // Reject strings with more than one decimal point ("1.2.3")
    if cleaned.matches('.').count() > 1 {
        return None;
    }
    let value: f64 = cleaned.parse().ok()?;
    if value > 0.0 { Some(value) } else { None }
}

/// Derive discount_percent from the current and original price when the
/// listing did not carry one. Returns None unless both prices are usable and
/// the original is strictly higher.
pub fn derive_discount(price: Option<f64>, original: Option<f64>) -> Option<f64> {
    let price = price?;
    let original = original?;
    if original <= 0.0 || price <= 0.0 || price >= original {
        return None;
    }
    Some(((original - price) / original * 100.0 * 10.0).round() / 10.0)
}

/// Clamp an upstream-reported discount into the valid 0-100 range.
/// Values outside the range come from layout changes upstream; out-of-range
/// input is dropped rather than clamped so the scorer sees it as absent.
pub fn sanitize_discount(discount: Option<f64>) -> Option<f64> {
    discount.filter(|d| (0.0..=100.0).contains(d) && d.is_finite())
}

/// Collapse whitespace runs and trim a scraped title.
pub fn clean_title(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Parse a rating field that may arrive as `"4.5"`, `"4.5 out of 5"`, or a
/// bare number.
pub fn parse_rating(s: &str) -> Option<f64> {
    let first = s.trim().split_whitespace().next()?;
    let value: f64 = first.parse().ok()?;
    if (0.0..=5.0).contains(&value) { Some(value) } else { None }
}

/// Parse a review count like `"1,234"`.
pub fn parse_reviews_count(s: &str) -> Option<i64> {
    let cleaned: String = s.trim().chars().filter(|c| c.is_ascii_digit()).collect();
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse().ok()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn price_text_variants() {
        assert_eq!(parse_price_text("$1,299.99"), Some(1299.99));
        assert_eq!(parse_price_text("899.99"), Some(899.99));
        assert_eq!(parse_price_text("$25"), Some(25.0));
        assert_eq!(parse_price_text("  $5.00 "), Some(5.0));
        assert_eq!(parse_price_text("FREE"), None);
        assert_eq!(parse_price_text(""), None);
        assert_eq!(parse_price_text("$0.00"), None);
        assert_eq!(parse_price_text("1.2.3"), None);
    }

    #[test]
    fn discount_derivation() {
        assert_eq!(derive_discount(Some(899.99), Some(1499.99)), Some(40.0));
        assert_eq!(derive_discount(Some(90.0), Some(100.0)), Some(10.0));
        // price above original means no discount, not a negative one
        assert_eq!(derive_discount(Some(120.0), Some(100.0)), None);
        assert_eq!(derive_discount(None, Some(100.0)), None);
        assert_eq!(derive_discount(Some(50.0), None), None);
        assert_eq!(derive_discount(Some(50.0), Some(0.0)), None);
    }

    #[test]
    fn discount_sanitization() {
        assert_eq!(sanitize_discount(Some(40.0)), Some(40.0));
        assert_eq!(sanitize_discount(Some(0.0)), Some(0.0));
        assert_eq!(sanitize_discount(Some(100.0)), Some(100.0));
        assert_eq!(sanitize_discount(Some(-5.0)), None);
        assert_eq!(sanitize_discount(Some(150.0)), None);
        assert_eq!(sanitize_discount(Some(f64::NAN)), None);
        assert_eq!(sanitize_discount(None), None);
    }

    #[test]
    fn title_cleanup() {
        assert_eq!(
            clean_title("  Samsung 55\"  OLED\nTV  "),
            "Samsung 55\" OLED TV"
        );
    }

    #[test]
    fn rating_and_reviews() {
        assert_eq!(parse_rating("4.5 out of 5"), Some(4.5));
        assert_eq!(parse_rating("4.7"), Some(4.7));
        assert_eq!(parse_rating("9.9"), None);
        assert_eq!(parse_reviews_count("1,234"), Some(1234));
        assert_eq!(parse_reviews_count("no reviews"), None);
    }
}
