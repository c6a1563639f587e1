use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Query string appended to visited pages that carry no parameters of their own.
pub const SYNTHETIC_QUERY: &str = "test=x";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkKind {
    /// URL with a parameterized query string
    Get,
    /// Page that contains at least one form
    Form,
    /// Plain same-origin link to follow
    Next,
}

impl LinkKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LinkKind::Get => "get",
            LinkKind::Form => "form",
            LinkKind::Next => "next",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PageLink {
    pub url: String,
    pub kind: LinkKind,
    /// Added by the post-crawl `?test=x` pass rather than found on a page
    pub synthetic: bool,
}

impl PageLink {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            kind: LinkKind::Get,
            synthetic: false,
        }
    }

    pub fn form(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            kind: LinkKind::Form,
            synthetic: false,
        }
    }

    pub fn next(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            kind: LinkKind::Next,
            synthetic: false,
        }
    }

    pub fn synthetic_get(page: &str) -> Self {
        Self {
            url: format!("{}?{}", page, SYNTHETIC_QUERY),
            kind: LinkKind::Get,
            synthetic: true,
        }
    }

    pub fn is_candidate(&self) -> bool {
        matches!(self.kind, LinkKind::Get | LinkKind::Form)
    }
}

/// Outcome of one bounded crawl.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CrawlResult {
    pub root: String,
    /// Successfully fetched URLs in fetch order
    pub visited: Vec<String>,
    /// Every classified link, deduplicated, in discovery order
    pub links: Vec<PageLink>,
    /// URLs whose fetch failed and were dropped from their wave
    pub dropped: Vec<String>,
}

impl CrawlResult {
    pub fn new(root: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            ..Default::default()
        }
    }

    pub(crate) fn push_link(&mut self, link: PageLink, seen: &mut HashSet<PageLink>) {
        if seen.insert(link.clone()) {
            self.links.push(link);
        }
    }

    pub fn get_candidates(&self) -> impl Iterator<Item = &PageLink> {
        self.links.iter().filter(|l| l.kind == LinkKind::Get)
    }

    pub fn form_candidates(&self) -> impl Iterator<Item = &PageLink> {
        self.links.iter().filter(|l| l.kind == LinkKind::Form)
    }

    /// Distinct GET and form candidate URLs: the per-page detection targets.
    pub fn scan_targets(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.links
            .iter()
            .filter(|l| l.is_candidate())
            .filter(|l| seen.insert(l.url.as_str()))
            .map(|l| l.url.clone())
            .collect()
    }
}
