pub mod csrf;
pub mod sqli;
pub mod xss;

pub use csrf::CsrfAuditor;
pub use sqli::SqlInjection;
pub use xss::ReflectedXss;

use std::collections::HashSet;
use url::Url;

/// Query parameters in order of appearance, keeping the first value of a repeated name.
///
/// Blank values (`?c=`) are kept and tested like any other parameter. A
/// `parse_qs`-style parser drops them, which would leave `c` untested.
pub fn query_params(url: &Url) -> Vec<(String, String)> {
    let mut seen = HashSet::new();
    url.query_pairs()
        .filter(|(name, _)| seen.insert(name.to_string()))
        .map(|(name, value)| (name.into_owned(), value.into_owned()))
        .collect()
}

/// `url` with its query string replaced by the re-encoded `params`.
pub fn with_query(url: &Url, params: &[(String, String)]) -> String {
    let mut mutated = url.clone();
    mutated.query_pairs_mut().clear().extend_pairs(params);
    mutated.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_params_keeps_first_value() {
        let url = Url::parse("http://t/x?a=1&b=2&a=3&c=").unwrap();
        assert_eq!(
            query_params(&url),
            vec![
                ("a".to_string(), "1".to_string()),
                ("b".to_string(), "2".to_string()),
                ("c".to_string(), String::new()),
            ]
        );
    }

    #[test]
    fn test_with_query_reencodes() {
        let url = Url::parse("http://t/x?a=1#frag").unwrap();
        let params = vec![("a".to_string(), "<b> 'x'".to_string())];
        assert_eq!(with_query(&url, &params), "http://t/x?a=%3Cb%3E+%27x%27#frag");
    }
}
