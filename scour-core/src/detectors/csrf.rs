// Structural CSRF audit of POST forms. Sends no payloads.

use crate::finding::Finding;
use crate::probe::{Detection, Detector, Probe, ProbeFailure};
use scour_scanner::html::{self, FormDescriptor, FormMethod};
use scour_scanner::HttpClient;
use tracing::info;
use url::Url;

pub const MISSING_TOKEN: &str = "missing CSRF token";
pub const NO_SAMESITE: &str = "cookie lacks SameSite";
pub const NO_SECURE: &str = "cookie lacks Secure";

pub struct CsrfAuditor {
    client: HttpClient,
}

impl CsrfAuditor {
    pub fn new(client: HttpClient) -> Self {
        Self { client }
    }

    pub async fn scan(&self, page: &str) -> Detection {
        let mut detection = Detection::default();

        let Ok(page_url) = Url::parse(page) else {
            return detection;
        };
        let response = match self.client.get(page).await {
            Ok(response) => response,
            Err(e) => {
                detection.record(Probe::Failed(ProbeFailure::new(Detector::Csrf, page, &e)));
                return detection;
            }
        };

        let forms = html::extract_forms(&response.body, &page_url);
        let cookies = response.joined_header("set-cookie");

        for finding in audit_forms(page, &forms, cookies.as_deref()) {
            info!("[CSRF] {}: {}", finding.tested_url(), finding.payload_or_note());
            detection.record(Probe::Hit(finding));
        }

        detection
    }
}

/// One finding per POST form without a token-like input.
///
/// `set_cookie` is every `Set-Cookie` value of the page response joined together;
/// `None` means the header was absent and counts as lacking both attributes.
pub fn audit_forms(page: &str, forms: &[FormDescriptor], set_cookie: Option<&str>) -> Vec<Finding> {
    let cookies = set_cookie.unwrap_or_default().to_lowercase();

    forms
        .iter()
        .filter(|form| form.method == FormMethod::Post)
        .filter(|form| !has_token_field(form))
        .map(|form| {
            let mut notes = vec![MISSING_TOKEN];
            if !cookies.contains("samesite") {
                notes.push(NO_SAMESITE);
            }
            if !cookies.contains("secure") {
                notes.push(NO_SECURE);
            }
            Finding::csrf(page, &form.action, notes.join(" | "))
        })
        .collect()
}

fn has_token_field(form: &FormDescriptor) -> bool {
    form.input_names().any(|name| {
        let name = name.to_lowercase();
        name.contains("csrf") || name.contains("token")
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::finding::Technique;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{method, path},
    };

    fn forms(markup: &str) -> Vec<FormDescriptor> {
        html::extract_forms(markup, &Url::parse("http://t/").unwrap())
    }

    #[test]
    fn test_token_field_suppresses_finding() {
        let page = forms(
            r#"<form method="POST" action="/a"><input name="user"><input name="CSRF_Token" type="hidden"></form>
               <form method="post" action="/b"><input name="authenticity_token"></form>"#,
        );
        assert!(audit_forms("http://t/", &page, None).is_empty());
    }

    #[test]
    fn test_get_forms_are_ignored() {
        let page = forms(r#"<form action="/search"><input name="q"></form>"#);
        assert!(audit_forms("http://t/", &page, None).is_empty());
    }

    #[test]
    fn test_cookie_attributes_shape_the_note() {
        let page = forms(r#"<form method="post" action="/login"><input name="user"></form>"#);

        let hardened = audit_forms("http://t/", &page, Some("sid=1; Secure; SameSite=Lax"));
        assert_eq!(hardened.len(), 1);
        assert_eq!(hardened[0].payload_or_note(), MISSING_TOKEN);

        let partial = audit_forms("http://t/", &page, Some("sid=1; Secure"));
        assert_eq!(
            partial[0].payload_or_note(),
            "missing CSRF token | cookie lacks SameSite"
        );
        assert_eq!(partial[0].tested_url(), "http://t/login");
    }

    #[tokio::test]
    async fn test_post_form_without_cookie_reports_all_phrases() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/login"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"<form method="post" action="/session"><input name="user"><input name="pass"></form>"#,
            ))
            .mount(&mock_server)
            .await;

        let page = format!("{}/login", mock_server.uri());
        let detection = CsrfAuditor::new(HttpClient::new().unwrap())
            .scan(&page)
            .await;

        assert_eq!(detection.findings.len(), 1);
        let finding = &detection.findings[0];
        assert_eq!(finding.technique(), Technique::Csrf);
        assert_eq!(finding.origin_page(), page);
        assert_eq!(finding.tested_url(), format!("{}/session", mock_server.uri()));
        assert_eq!(
            finding.payload_or_note(),
            "missing CSRF token | cookie lacks SameSite | cookie lacks Secure"
        );
    }

    #[tokio::test]
    async fn test_repeated_set_cookie_headers_are_joined() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .append_header("Set-Cookie", "a=1; Secure")
                    .append_header("Set-Cookie", "b=2; SameSite=Strict")
                    .set_body_string(r#"<form method="post"><input name="x"></form>"#),
            )
            .mount(&mock_server)
            .await;

        let detection = CsrfAuditor::new(HttpClient::new().unwrap())
            .scan(&format!("{}/", mock_server.uri()))
            .await;

        assert_eq!(detection.findings.len(), 1);
        assert_eq!(detection.findings[0].payload_or_note(), MISSING_TOKEN);
    }
}
