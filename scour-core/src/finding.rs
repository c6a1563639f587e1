use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
    Info,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "critical",
            Severity::High => "high",
            Severity::Medium => "medium",
            Severity::Low => "low",
            Severity::Info => "info",
        }
    }
}

/// How a finding was established.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    /// Deterministic oracle: reflection, DB error, timing, structure or a browser dialog
    Rule,
    /// Classifier verdict on request features only
    Model,
}

impl Confidence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Confidence::Rule => "rule",
            Confidence::Model => "model",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Family {
    Xss,
    Sqli,
    Csrf,
}

impl Family {
    pub const ALL: [Family; 3] = [Family::Xss, Family::Sqli, Family::Csrf];

    pub fn as_str(&self) -> &'static str {
        match self {
            Family::Xss => "XSS",
            Family::Sqli => "SQLi",
            Family::Csrf => "CSRF",
        }
    }
}

/// Detection technique. The wire strings are the canonical record values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Technique {
    #[serde(rename = "GET")]
    Get,
    #[serde(rename = "POST")]
    Post,
    #[serde(rename = "SQLi")]
    Sqli,
    #[serde(rename = "CSRF")]
    Csrf,
    #[serde(rename = "DOM")]
    Dom,
    #[serde(rename = "SQLi-AI")]
    SqliAi,
    #[serde(rename = "XSS-AI")]
    XssAi,
}

impl Technique {
    pub const ALL: [Technique; 7] = [
        Technique::Get,
        Technique::Post,
        Technique::Sqli,
        Technique::Csrf,
        Technique::Dom,
        Technique::SqliAi,
        Technique::XssAi,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Technique::Get => "GET",
            Technique::Post => "POST",
            Technique::Sqli => "SQLi",
            Technique::Csrf => "CSRF",
            Technique::Dom => "DOM",
            Technique::SqliAi => "SQLi-AI",
            Technique::XssAi => "XSS-AI",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == s)
    }

    pub fn family(&self) -> Family {
        match self {
            Technique::Get | Technique::Post | Technique::Dom | Technique::XssAi => Family::Xss,
            Technique::Sqli | Technique::SqliAi => Family::Sqli,
            Technique::Csrf => Family::Csrf,
        }
    }

    pub fn confidence(&self) -> Confidence {
        match self {
            Technique::SqliAi | Technique::XssAi => Confidence::Model,
            _ => Confidence::Rule,
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            Technique::Sqli => Severity::Critical,
            Technique::Get | Technique::Post | Technique::Dom => Severity::High,
            Technique::Csrf => Severity::Medium,
            Technique::SqliAi | Technique::XssAi => Severity::Low,
        }
    }
}

impl fmt::Display for Technique {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One suspected vulnerability instance.
///
/// Fields are private: a finding is built once by the detector that observed it
/// and never changes afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Finding {
    origin_page: String,
    tested_url: String,
    technique: Technique,
    /// Payload that triggered the oracle, or an explanatory note for payload-less checks
    #[serde(rename = "evidence")]
    payload_or_note: String,
}

impl Finding {
    fn new(origin_page: &str, tested_url: &str, technique: Technique, evidence: String) -> Self {
        Self {
            origin_page: origin_page.to_string(),
            tested_url: tested_url.to_string(),
            technique,
            payload_or_note: evidence,
        }
    }

    pub fn reflected_get(origin_page: &str, tested_url: &str, payload: &str) -> Self {
        Self::new(origin_page, tested_url, Technique::Get, payload.to_string())
    }

    /// Reflection through a form submission; the technique follows the form method.
    pub fn reflected_form(
        origin_page: &str,
        action: &str,
        method: scour_scanner::FormMethod,
        payload: &str,
    ) -> Self {
        let technique = match method {
            scour_scanner::FormMethod::Post => Technique::Post,
            scour_scanner::FormMethod::Get => Technique::Get,
        };
        Self::new(origin_page, action, technique, payload.to_string())
    }

    pub fn sqli(origin_page: &str, tested_url: &str, payload: &str) -> Self {
        Self::new(origin_page, tested_url, Technique::Sqli, payload.to_string())
    }

    pub fn csrf(origin_page: &str, action: &str, note: String) -> Self {
        Self::new(origin_page, action, Technique::Csrf, note)
    }

    pub fn dom(page: &str, payload: &str) -> Self {
        Self::new(page, page, Technique::Dom, payload.to_string())
    }

    /// Classifier verdict. Only the two model techniques are accepted.
    pub fn model_flag(url: &str, technique: Technique, note: String) -> Option<Self> {
        match technique {
            Technique::SqliAi | Technique::XssAi => Some(Self::new(url, url, technique, note)),
            _ => None,
        }
    }

    /// Rebuild a stored finding. Used by sinks reading back their own records.
    pub fn from_record(
        origin_page: String,
        tested_url: String,
        technique: Technique,
        payload_or_note: String,
    ) -> Self {
        Self {
            origin_page,
            tested_url,
            technique,
            payload_or_note,
        }
    }

    pub fn origin_page(&self) -> &str {
        &self.origin_page
    }

    pub fn tested_url(&self) -> &str {
        &self.tested_url
    }

    pub fn technique(&self) -> Technique {
        self.technique
    }

    pub fn payload_or_note(&self) -> &str {
        &self.payload_or_note
    }

    pub fn severity(&self) -> Severity {
        self.technique.severity()
    }

    pub fn confidence(&self) -> Confidence {
        self.technique.confidence()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scour_scanner::FormMethod;

    #[test]
    fn test_technique_wire_strings_roundtrip() {
        for technique in Technique::ALL {
            assert_eq!(Technique::parse(technique.as_str()), Some(technique));
            let json = serde_json::to_string(&technique).unwrap();
            assert_eq!(json, format!("\"{}\"", technique.as_str()));
        }
        assert_eq!(Technique::parse("XSS"), None);
    }

    #[test]
    fn test_model_techniques_are_weighted_separately() {
        assert_eq!(Technique::SqliAi.confidence(), Confidence::Model);
        assert_eq!(Technique::XssAi.confidence(), Confidence::Model);
        assert_eq!(Technique::Dom.confidence(), Confidence::Rule);
        assert_eq!(Technique::SqliAi.family(), Family::Sqli);
        assert_eq!(Technique::XssAi.family(), Family::Xss);
    }

    #[test]
    fn test_form_finding_follows_method() {
        let post = Finding::reflected_form("http://t/", "http://t/login", FormMethod::Post, "<x>");
        let get = Finding::reflected_form("http://t/", "http://t/search", FormMethod::Get, "<x>");
        assert_eq!(post.technique(), Technique::Post);
        assert_eq!(get.technique(), Technique::Get);
        assert_eq!(post.tested_url(), "http://t/login");
    }

    #[test]
    fn test_model_flag_rejects_rule_techniques() {
        assert!(Finding::model_flag("http://t/?a=1", Technique::Sqli, "n".into()).is_none());
        assert!(Finding::model_flag("http://t/?a=1", Technique::XssAi, "n".into()).is_some());
    }

    #[test]
    fn test_finding_serializes_evidence_field() {
        let finding = Finding::sqli("http://t/?a=1", "http://t/?a=%27", "'");
        let value = serde_json::to_value(&finding).unwrap();
        assert_eq!(value["technique"], "SQLi");
        assert_eq!(value["evidence"], "'");
        assert_eq!(value["origin_page"], "http://t/?a=1");
    }
}
