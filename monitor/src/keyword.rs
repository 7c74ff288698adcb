//! Keyword matcher: parses a comma-separated keyword string into five
//! classes (`+kw`, `-kw`, `*kw`, `SKU:X`, `/regex/`) and evaluates them in
//! a fixed, short-circuiting order against a product title/description/SKU.

use regex::Regex;

#[derive(Debug, Default, Clone)]
pub struct KeywordMatcher {
    positive: Vec<String>,
    negative: Vec<String>,
    required: Vec<String>,
    skus: Vec<String>,
    regexes: Vec<Regex>,
}

impl KeywordMatcher {
    pub fn parse(spec: &str) -> Self {
        let mut matcher = KeywordMatcher::default();
        for raw in spec.split(',') {
            let token = raw.trim();
            if token.is_empty() {
                continue;
            }
            if let Some(rest) = token.strip_prefix('+') {
                matcher.positive.push(rest.trim().to_lowercase());
            } else if let Some(rest) = token.strip_prefix('-') {
                matcher.negative.push(rest.trim().to_lowercase());
            } else if let Some(rest) = token.strip_prefix('*') {
                matcher.required.push(rest.trim().to_lowercase());
            } else if let Some(rest) = token.strip_prefix("SKU:").or_else(|| token.strip_prefix("sku:")) {
                matcher.skus.push(rest.trim().to_lowercase());
            } else if token.starts_with('/') && token.ends_with('/') && token.len() >= 2 {
                let pattern = &token[1..token.len() - 1];
                if let Ok(re) = Regex::new(&format!("(?i){pattern}")) {
                    matcher.regexes.push(re);
                }
            } else {
                matcher.positive.push(token.to_lowercase());
            }
        }
        matcher
    }

    /// Returns `(matched, confidence)`, checking SKU, negative, required,
    /// regex, then positive keywords in that order, short-circuiting on
    /// the first hit or rejection.
    pub fn evaluate(&self, title: &str, description: &str, sku: Option<&str>) -> (bool, f64) {
        let haystack = format!("{} {}", title, description).to_lowercase();
        let sku_lower = sku.map(str::to_lowercase).unwrap_or_default();

        if !self.skus.is_empty() {
            let sku_hit = self
                .skus
                .iter()
                .any(|s| !s.is_empty() && (sku_lower.contains(s.as_str()) || s.contains(sku_lower.as_str())));
            if sku_hit {
                return (true, 1.0);
            }
        }

        if self.negative.iter().any(|n| haystack.contains(n.as_str())) {
            return (false, 0.0);
        }

        if self.required.iter().any(|r| !haystack.contains(r.as_str())) {
            return (false, 0.0);
        }

        if self.regexes.iter().any(|re| re.is_match(&haystack)) {
            return (true, 0.9);
        }

        if !self.positive.is_empty() {
            let matched = self.positive.iter().filter(|p| haystack.contains(p.as_str())).count();
            return if matched == 0 {
                (false, 0.0)
            } else {
                (true, (0.5 + 0.5 * matched as f64 / self.positive.len() as f64).min(1.0))
            };
        }

        if self.skus.is_empty() {
            return (true, 0.5);
        }

        (false, 0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matcher() -> KeywordMatcher {
        KeywordMatcher::parse("+jordan, +1, -gs, *retro, SKU:DZ5485-612")
    }

    #[test]
    fn sku_match_short_circuits_to_full_confidence() {
        let (matched, confidence) =
            matcher().evaluate("Air Jordan 1 Retro High", "", Some("dz5485-612"));
        assert!(matched);
        assert_eq!(confidence, 1.0);
    }

    #[test]
    fn partial_positive_match_without_sku_is_uncertain_but_over_half() {
        let (matched, confidence) = matcher().evaluate("Jordan 1 Retro Mid", "", Some("XX-000"));
        assert!(matched);
        assert!(confidence > 0.5);
    }

    #[test]
    fn negative_keyword_rejects_regardless_of_positives() {
        let (matched, confidence) = matcher().evaluate("Jordan 1 Retro GS", "", None);
        assert!(!matched);
        assert_eq!(confidence, 0.0);
    }

    #[test]
    fn pure_monitor_mode_with_no_positive_or_sku_matches_everything() {
        let matcher = KeywordMatcher::parse("-gs");
        let (matched, confidence) = matcher.evaluate("Anything At All", "", None);
        assert!(matched);
        assert_eq!(confidence, 0.5);
    }

    #[test]
    fn missing_required_keyword_rejects() {
        let matcher = KeywordMatcher::parse("+jordan, *retro");
        let (matched, _) = matcher.evaluate("Jordan 1 High", "", None);
        assert!(!matched);
    }

    #[test]
    fn regex_class_matches_case_insensitively() {
        let matcher = KeywordMatcher::parse(r"/travis\s*scott/");
        let (matched, confidence) = matcher.evaluate("Air Jordan 1 TRAVIS SCOTT", "", None);
        assert!(matched);
        assert_eq!(confidence, 0.9);
    }
}
