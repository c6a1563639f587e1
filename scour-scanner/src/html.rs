//! HTML extraction for anchors and forms.
//!
//! Malformed markup never raises: the parser recovers what it can and every
//! function here degrades to an empty result.

use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormMethod {
    Get,
    Post,
}

impl FormMethod {
    /// Anything other than `post` submits as a query string.
    pub fn from_attr(method: Option<&str>) -> Self {
        match method.map(|m| m.trim().to_ascii_lowercase()) {
            Some(m) if m == "post" => FormMethod::Post,
            _ => FormMethod::Get,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FormMethod::Get => "get",
            FormMethod::Post => "post",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldTag {
    Input,
    Textarea,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormField {
    pub name: String,
    pub tag: FieldTag,
}

/// A form with its action resolved against the page it was found on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormDescriptor {
    pub action: String,
    pub method: FormMethod,
    /// Named `input`/`textarea` fields in document order
    pub fields: Vec<FormField>,
}

impl FormDescriptor {
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }

    pub fn input_names(&self) -> impl Iterator<Item = &str> {
        self.fields
            .iter()
            .filter(|f| f.tag == FieldTag::Input)
            .map(|f| f.name.as_str())
    }

    /// Every field set to the same value, ready for submission.
    pub fn fill(&self, value: &str) -> Vec<(String, String)> {
        self.fields
            .iter()
            .map(|f| (f.name.clone(), value.to_string()))
            .collect()
    }
}

fn selector(css: &str) -> Option<Selector> {
    Selector::parse(css).ok()
}

/// Resolve an href against the page URL. Skips pseudo-schemes and fragment-only
/// references, strips fragments, and keeps http(s) only.
pub fn resolve_link(base: &Url, href: &str) -> Option<Url> {
    let href = href.trim();
    if href.is_empty()
        || href.starts_with("javascript:")
        || href.starts_with("mailto:")
        || href.starts_with("tel:")
        || href.starts_with('#')
    {
        return None;
    }

    let mut url = base.join(href).ok()?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return None;
    }
    url.set_fragment(None);
    Some(url)
}

/// Absolute URLs of every `a[href]` on the page, in document order.
pub fn extract_links(html: &str, base: &Url) -> Vec<Url> {
    let Some(anchor) = selector("a[href]") else {
        return Vec::new();
    };

    let document = Html::parse_document(html);
    document
        .select(&anchor)
        .filter_map(|a| a.value().attr("href"))
        .filter_map(|href| resolve_link(base, href))
        .collect()
}

pub fn has_form(html: &str) -> bool {
    let Some(form) = selector("form") else {
        return false;
    };
    Html::parse_document(html).select(&form).next().is_some()
}

pub fn extract_forms(html: &str, page: &Url) -> Vec<FormDescriptor> {
    let (Some(form_selector), Some(field_selector)) = (selector("form"), selector("input, textarea"))
    else {
        return Vec::new();
    };

    let document = Html::parse_document(html);
    document
        .select(&form_selector)
        .map(|form| describe_form(form, &field_selector, page))
        .collect()
}

fn describe_form(form: ElementRef<'_>, field_selector: &Selector, page: &Url) -> FormDescriptor {
    let action = form
        .value()
        .attr("action")
        .map(str::trim)
        .filter(|a| !a.is_empty())
        .and_then(|a| page.join(a).ok())
        .unwrap_or_else(|| page.clone());

    let fields = form
        .select(field_selector)
        .filter_map(|field| {
            let name = field.value().attr("name")?.trim();
            if name.is_empty() {
                return None;
            }
            let tag = if field.value().name() == "textarea" {
                FieldTag::Textarea
            } else {
                FieldTag::Input
            };
            Some(FormField {
                name: name.to_string(),
                tag,
            })
        })
        .collect();

    FormDescriptor {
        action: action.to_string(),
        method: FormMethod::from_attr(form.value().attr("method")),
        fields,
    }
}
