// Reflected XSS through query parameters and form submissions.
//
// The oracle is a raw substring match of the payload in the response body. It
// does not confirm the HTML context, so a page that echoes the payload inside a
// comment or an attribute still counts.

use super::{query_params, with_query};
use crate::finding::Finding;
use crate::payloads;
use crate::probe::{Detection, Detector, Probe, ProbeFailure};
use scour_scanner::html::{self, FormDescriptor, FormMethod};
use scour_scanner::{HttpClient, HttpResponse};
use tracing::{debug, info};
use url::Url;

pub struct ReflectedXss {
    client: HttpClient,
    payloads: Vec<String>,
}

impl ReflectedXss {
    pub fn new(client: HttpClient) -> Self {
        Self {
            client,
            payloads: payloads::xss_catalog(),
        }
    }

    pub fn with_payloads(mut self, payloads: Vec<String>) -> Self {
        self.payloads = payloads;
        self
    }

    /// Replace every query value with each payload in turn.
    ///
    /// All payloads are tried even after a hit, so one URL can yield several findings.
    pub async fn scan_get(&self, url: &str) -> Detection {
        let mut detection = Detection::default();

        let Ok(parsed) = Url::parse(url) else {
            return detection;
        };
        let params = query_params(&parsed);
        if params.is_empty() {
            return detection;
        }

        for payload in &self.payloads {
            let mutated: Vec<(String, String)> = params
                .iter()
                .map(|(name, _)| (name.clone(), payload.clone()))
                .collect();
            let test_url = with_query(&parsed, &mutated);

            let probe = match self.client.get(&test_url).await {
                Ok(response) if reflects(&response, payload) => {
                    Probe::Hit(Finding::reflected_get(url, &test_url, payload))
                }
                Ok(_) => Probe::Miss,
                Err(e) => Probe::Failed(ProbeFailure::new(Detector::GetXss, &test_url, &e)),
            };

            if detection.record(probe) {
                info!("[XSS] {} reflects {:?} via GET", url, payload);
            }
        }

        detection
    }

    /// Submit every form on the page with all fields set to each payload.
    ///
    /// The first reflecting payload ends testing for that form.
    pub async fn scan_forms(&self, page: &str) -> Detection {
        let mut detection = Detection::default();

        let Ok(page_url) = Url::parse(page) else {
            return detection;
        };
        let body = match self.client.get(page).await {
            Ok(response) => response.body,
            Err(e) => {
                detection.record(Probe::Failed(ProbeFailure::new(Detector::FormXss, page, &e)));
                return detection;
            }
        };

        let forms = html::extract_forms(&body, &page_url);
        debug!("[XSS] {} forms on {}", forms.len(), page);

        for form in &forms {
            for payload in &self.payloads {
                let probe = match self.submit(form, payload).await {
                    Ok(response) if reflects(&response, payload) => Probe::Hit(
                        Finding::reflected_form(page, &form.action, form.method, payload),
                    ),
                    Ok(_) => Probe::Miss,
                    Err(e) => Probe::Failed(ProbeFailure::new(Detector::FormXss, &form.action, &e)),
                };

                if detection.record(probe) {
                    info!(
                        "[XSS] form {} on {} reflects {:?} via {}",
                        form.action,
                        page,
                        payload,
                        form.method.as_str()
                    );
                    break;
                }
            }
        }

        detection
    }

    async fn submit(
        &self,
        form: &FormDescriptor,
        payload: &str,
    ) -> scour_scanner::error::Result<HttpResponse> {
        let fields = form.fill(payload);
        match form.method {
            FormMethod::Post => self.client.post_form(&form.action, &fields).await,
            FormMethod::Get => self.client.get_form(&form.action, &fields).await,
        }
    }
}

fn reflects(response: &HttpResponse, payload: &str) -> bool {
    response.body.contains(payload)
}
