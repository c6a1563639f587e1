// Error-based and time-based blind SQL injection.
//
// Unlike the GET XSS detector, one parameter is mutated at a time while its
// siblings keep their original values.

use super::{query_params, with_query};
use crate::finding::Finding;
use crate::payloads::{self, SQL_ERROR_FINGERPRINTS};
use crate::probe::{Detection, Detector, Probe, ProbeFailure};
use scour_scanner::HttpClient;
use std::time::Duration;
use tracing::info;
use url::Url;

/// Which oracle fired for a probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqliSignal {
    /// Body contains a known database error fingerprint
    Error(&'static str),
    /// Round trip exceeded the delay threshold
    Timing(Duration),
}

/// Evaluate both oracles on a response. The error fingerprint wins when both fire.
pub fn evaluate(body: &str, elapsed: Duration, delay_threshold: Duration) -> Option<SqliSignal> {
    let lowered = body.to_lowercase();
    if let Some(fingerprint) = SQL_ERROR_FINGERPRINTS
        .iter()
        .find(|fp| lowered.contains(*fp))
    {
        return Some(SqliSignal::Error(fingerprint));
    }
    if elapsed > delay_threshold {
        return Some(SqliSignal::Timing(elapsed));
    }
    None
}

pub struct SqlInjection {
    client: HttpClient,
    payloads: Vec<String>,
    timeout: Duration,
    delay_threshold: Duration,
}

impl SqlInjection {
    pub fn new(client: HttpClient) -> Self {
        Self {
            client,
            payloads: payloads::sqli_catalog(),
            timeout: payloads::SQLI_TIMEOUT,
            delay_threshold: payloads::SQLI_DELAY_THRESHOLD,
        }
    }

    /// Override the per-request timeout and the timing threshold.
    ///
    /// The timeout must stay above the threshold for the timing oracle to be observable.
    pub fn with_timing(mut self, timeout: Duration, delay_threshold: Duration) -> Self {
        self.timeout = timeout;
        self.delay_threshold = delay_threshold;
        self
    }

    pub fn with_payloads(mut self, payloads: Vec<String>) -> Self {
        self.payloads = payloads;
        self
    }

    pub async fn scan(&self, url: &str) -> Detection {
        let mut detection = Detection::default();

        let Ok(parsed) = Url::parse(url) else {
            return detection;
        };
        let params = query_params(&parsed);

        for index in 0..params.len() {
            for payload in &self.payloads {
                let mut mutated = params.clone();
                mutated[index].1 = payload.clone();
                let test_url = with_query(&parsed, &mutated);

                let probe = match self.client.get_with_timeout(&test_url, self.timeout).await {
                    Ok(response) => {
                        match evaluate(&response.body, response.elapsed, self.delay_threshold) {
                            Some(signal) => {
                                info!(
                                    "[SQLi] {} parameter {:?} with {:?}: {:?}",
                                    url, params[index].0, payload, signal
                                );
                                Probe::Hit(Finding::sqli(url, &test_url, payload))
                            }
                            None => Probe::Miss,
                        }
                    }
                    Err(e) => Probe::Failed(ProbeFailure::new(Detector::Sqli, &test_url, &e)),
                };

                // First hit settles this parameter
                if detection.record(probe) {
                    break;
                }
            }
        }

        detection
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::finding::Technique;
    use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate, matchers::method};

    /// Returns a MySQL error only when some value carries a single quote.
    struct QuoteSensitive;

    impl Respond for QuoteSensitive {
        fn respond(&self, request: &Request) -> ResponseTemplate {
            let quoted = request.url.query_pairs().any(|(_, v)| v.contains('\''));
            if quoted {
                ResponseTemplate::new(500)
                    .set_body_string("You have an error in your SQL syntax near ''' at line 1")
            } else {
                ResponseTemplate::new(200).set_body_string("ok")
            }
        }
    }

    #[test]
    fn test_evaluate_matches_fingerprints_case_insensitively() {
        let fast = Duration::from_millis(10);
        let threshold = Duration::from_millis(4500);

        assert_eq!(
            evaluate("Warning: MYSQL_FETCH_array()", fast, threshold),
            Some(SqliSignal::Error("mysql_fetch"))
        );
        assert_eq!(
            evaluate("ORA-00933: SQL command not properly ended", fast, threshold),
            Some(SqliSignal::Error("ora-00933"))
        );
        assert_eq!(evaluate("all good", fast, threshold), None);
        assert_eq!(
            evaluate("all good", Duration::from_secs(5), threshold),
            Some(SqliSignal::Timing(Duration::from_secs(5)))
        );
    }

    #[tokio::test]
    async fn test_only_quote_payloads_trigger() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(QuoteSensitive)
            .mount(&mock_server)
            .await;

        // Without early stop: every quote-bearing payload hits, the rest miss
        let url = format!("{}/item?id=1&cat=2", mock_server.uri());
        for payload in payloads::SQLI_PAYLOADS {
            let detection = SqlInjection::new(HttpClient::new().unwrap())
                .with_payloads(vec![payload.to_string()])
                .scan(&url)
                .await;

            if payload.contains('\'') {
                // One finding per parameter
                assert_eq!(detection.findings.len(), 2, "payload {:?}", payload);
            } else {
                assert!(detection.findings.is_empty(), "payload {:?}", payload);
            }
        }
    }

    #[tokio::test]
    async fn test_siblings_keep_original_values() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(QuoteSensitive)
            .mount(&mock_server)
            .await;

        let url = format!("{}/item?id=1&cat=2", mock_server.uri());
        let detection = SqlInjection::new(HttpClient::new().unwrap()).scan(&url).await;

        // First catalog payload is a bare quote, hitting once per parameter
        assert_eq!(detection.findings.len(), 2);
        for finding in &detection.findings {
            assert_eq!(finding.technique(), Technique::Sqli);
            assert_eq!(finding.payload_or_note(), "'");
            assert_eq!(finding.origin_page(), url);
        }

        let first = Url::parse(detection.findings[0].tested_url()).unwrap();
        let pairs: Vec<(String, String)> = first.query_pairs().into_owned().collect();
        assert_eq!(
            pairs,
            vec![
                ("id".to_string(), "'".to_string()),
                ("cat".to_string(), "2".to_string())
            ]
        );

        let second = Url::parse(detection.findings[1].tested_url()).unwrap();
        let pairs: Vec<(String, String)> = second.query_pairs().into_owned().collect();
        assert_eq!(
            pairs,
            vec![
                ("id".to_string(), "1".to_string()),
                ("cat".to_string(), "'".to_string())
            ]
        );
    }

    #[tokio::test]
    async fn test_timing_oracle() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("fine")
                    .set_delay(Duration::from_millis(300)),
            )
            .mount(&mock_server)
            .await;

        let url = format!("{}/item?id=1", mock_server.uri());
        let detection = SqlInjection::new(HttpClient::new().unwrap())
            .with_timing(Duration::from_secs(2), Duration::from_millis(150))
            .scan(&url)
            .await;

        // Slow for every payload, so the first one settles the only parameter
        assert_eq!(detection.findings.len(), 1);
        assert_eq!(detection.findings[0].payload_or_note(), payloads::SQLI_PAYLOADS[0]);
    }

    #[tokio::test]
    async fn test_timeout_is_a_miss_not_a_hit() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
            .mount(&mock_server)
            .await;

        let url = format!("{}/item?id=1", mock_server.uri());
        let detection = SqlInjection::new(HttpClient::new().unwrap())
            .with_payloads(vec!["'".into()])
            .with_timing(Duration::from_millis(100), Duration::from_millis(50))
            .scan(&url)
            .await;

        assert!(detection.findings.is_empty());
        assert_eq!(detection.failures.len(), 1);
    }
}
