// Fixed payload catalogs and oracle constants.

use std::time::Duration;

/// Markup payloads shared by the reflected and DOM-based XSS detectors.
pub const XSS_PAYLOADS: &[&str] = &[
    "<script>alert(1)</script>",
    "'><svg/onload=confirm(1)>",
    "<img src=x onerror=alert(1)>",
    "<svg><script>confirm(1)</script>",
    "<body onload=prompt(1)>",
];

/// Quote and comment breakers, boolean tautologies, then one time-delay trigger.
pub const SQLI_PAYLOADS: &[&str] = &[
    "'",
    "\"",
    "'--",
    "\"--",
    "')--",
    "' or '1'='1",
    "\" or \"1\"=\"1\"",
    "' OR sleep(5)--",
];

/// Lowercase database error fingerprints.
pub const SQL_ERROR_FINGERPRINTS: &[&str] = &["sql syntax", "mysql_fetch", "ora-00933"];

/// Latency above which a SQLi probe counts as a timing hit.
pub const SQLI_DELAY_THRESHOLD: Duration = Duration::from_millis(4500);

/// Must stay above `SQLI_DELAY_THRESHOLD` or the timing signal is never observed.
pub const SQLI_TIMEOUT: Duration = Duration::from_secs(8);

pub const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

pub fn xss_catalog() -> Vec<String> {
    XSS_PAYLOADS.iter().map(|p| p.to_string()).collect()
}

pub fn sqli_catalog() -> Vec<String> {
    SQLI_PAYLOADS.iter().map(|p| p.to_string()).collect()
}
