use crate::error::{Result, ScanError};
use crate::html;
use crate::http::HttpClient;
use crate::result::{CrawlResult, PageLink};
use futures::future::join_all;
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

pub type ProgressCallback = Arc<dyn Fn(usize, String) + Send + Sync>;

/// Width of a crawl wave and of the fetch worker pool.
pub const DEFAULT_WORKERS: usize = 10;

/// Per-page fetch timeout used while crawling.
pub const DEFAULT_CRAWL_TIMEOUT: Duration = Duration::from_secs(3);

/// Host and explicit port of the crawl root. The scheme is not part of the
/// scope, so `http://h/` and `https://h/` are the same site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scope {
    host: String,
    port: Option<u16>,
}

impl Scope {
    pub fn of(root: &Url) -> Result<Self> {
        let host = root
            .host_str()
            .ok_or_else(|| ScanError::InvalidUrl(format!("{} has no host", root)))?;
        Ok(Self {
            host: host.to_ascii_lowercase(),
            port: root.port(),
        })
    }

    pub fn contains(&self, url: &Url) -> bool {
        url.host_str()
            .is_some_and(|h| h.eq_ignore_ascii_case(&self.host))
            && url.port() == self.port
    }
}

/// What one worker brings back from a page.
struct FetchedPage {
    has_query_param: bool,
    has_form: bool,
    links: Vec<Url>,
}

pub struct Crawler {
    client: HttpClient,
    workers: usize,
    progress_callback: Option<ProgressCallback>,
}

impl Crawler {
    pub fn new() -> Result<Self> {
        Ok(Self::with_client(HttpClient::with_timeout(
            DEFAULT_CRAWL_TIMEOUT,
        )?))
    }

    pub fn with_client(client: HttpClient) -> Self {
        Self {
            client,
            workers: DEFAULT_WORKERS,
            progress_callback: None,
        }
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn with_progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    /// Breadth-first crawl of `root`'s origin, fetching at most `budget` pages.
    ///
    /// Pages are fetched in waves of up to `workers` URLs taken from the head of
    /// the frontier. A page that fails to fetch is dropped for good.
    pub async fn crawl(&self, root: &str, budget: usize) -> Result<CrawlResult> {
        let root_url =
            Url::parse(root).map_err(|e| ScanError::InvalidUrl(format!("{}: {}", root, e)))?;
        let scope = Scope::of(&root_url)?;

        info!(
            "Starting crawl of {} (budget {}, {} workers)",
            root_url, budget, self.workers
        );

        let mut result = CrawlResult::new(root_url.to_string());
        let mut seen_links = HashSet::new();

        // Everything ever queued: frontier, visited and dropped
        let mut queued: HashSet<String> = HashSet::new();
        let mut frontier: VecDeque<String> = VecDeque::new();
        queued.insert(root_url.to_string());
        frontier.push_back(root_url.to_string());

        while !frontier.is_empty() && result.visited.len() < budget {
            let width = self
                .workers
                .min(budget - result.visited.len())
                .min(frontier.len());
            let wave: Vec<String> = frontier.drain(..width).collect();
            debug!("Dispatching wave of {} URLs", wave.len());

            let handles: Vec<_> = wave
                .into_iter()
                .enumerate()
                .map(|(slot, url)| {
                    let client = self.client.clone();
                    let progress_cb = self.progress_callback.clone();
                    tokio::spawn(async move {
                        if let Some(callback) = progress_cb {
                            callback(slot, url.clone());
                        }
                        let page = Self::fetch_page(&client, &url).await;
                        (url, page)
                    })
                })
                .collect();

            for joined in join_all(handles).await {
                let (url, page) = match joined {
                    Ok(done) => done,
                    Err(e) => {
                        warn!("Crawl worker failed: {}", e);
                        continue;
                    }
                };

                let page = match page {
                    Ok(page) => page,
                    Err(e) => {
                        debug!("Dropping {}: {}", url, e);
                        result.dropped.push(url);
                        continue;
                    }
                };

                result.visited.push(url.clone());
                if page.has_query_param {
                    result.push_link(PageLink::get(url.clone()), &mut seen_links);
                }
                if page.has_form {
                    result.push_link(PageLink::form(url.clone()), &mut seen_links);
                }

                for link in page.links {
                    if !scope.contains(&link) {
                        continue;
                    }
                    let link = link.to_string();
                    if queued.insert(link.clone()) {
                        frontier.push_back(link.clone());
                        result.push_link(PageLink::next(link), &mut seen_links);
                    }
                }
            }
        }

        // Every parameterless page still gets one injection point
        let synthetic: Vec<PageLink> = result
            .visited
            .iter()
            .filter(|u| Url::parse(u).is_ok_and(|p| p.query().is_none()))
            .map(|u| PageLink::synthetic_get(u))
            .collect();
        for link in synthetic {
            result.push_link(link, &mut seen_links);
        }

        info!(
            "Crawl complete. Visited {} pages, dropped {}, {} candidates",
            result.visited.len(),
            result.dropped.len(),
            result.scan_targets().len()
        );
        Ok(result)
    }

    async fn fetch_page(client: &HttpClient, url: &str) -> Result<FetchedPage> {
        let parsed = Url::parse(url).map_err(|e| ScanError::InvalidUrl(e.to_string()))?;
        let response = client.get(url).await?;

        Ok(FetchedPage {
            has_query_param: parsed.query().is_some_and(|q| q.contains('=')),
            has_form: html::has_form(&response.body),
            links: html::extract_links(&response.body, &parsed),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result::{LinkKind, SYNTHETIC_QUERY};
    use std::collections::HashMap;
    use tokio::sync::Mutex as TokioMutex;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{method, path},
    };

    async fn mount_html(server: &MockServer, route: &str, html: String) {
        Mock::given(method("GET"))
            .and(path(route.to_string()))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/html")
                    .set_body_string(html),
            )
            .mount(server)
            .await;
    }

    /// Test basic link discovery
    #[tokio::test]
    async fn test_link_discovery() {
        let mock_server = MockServer::start().await;
        let uri = mock_server.uri();

        mount_html(
            &mock_server,
            "/",
            format!(
                r#"<html><body>
                    <a href="{uri}/page1">Page 1</a>
                    <a href="/page2?id=7">Page 2</a>
                    <a href="http://elsewhere.invalid/x">External</a>
                </body></html>"#
            ),
        )
        .await;
        mount_html(&mock_server, "/page1", "<form><input name='q'></form>".into()).await;
        mount_html(&mock_server, "/page2", "<p>P2</p>".into()).await;

        let crawler = Crawler::new().unwrap();
        let result = crawler.crawl(&uri, 10).await.unwrap();

        println!("Visited: {:?}", result.visited);
        assert_eq!(result.visited.len(), 3);
        assert!(result.visited.iter().all(|u| u.starts_with(&uri)));

        let gets: Vec<&str> = result.get_candidates().map(|l| l.url.as_str()).collect();
        assert!(gets.contains(&format!("{uri}/page2?id=7").as_str()));

        let forms: Vec<&str> = result.form_candidates().map(|l| l.url.as_str()).collect();
        assert_eq!(forms, vec![format!("{uri}/page1").as_str()]);
    }

    #[tokio::test]
    async fn test_budget_bounds_visited() {
        let mock_server = MockServer::start().await;
        let uri = mock_server.uri();

        let mut root_html = String::from("<html><body>");
        for i in 1..=30 {
            root_html.push_str(&format!(r#"<a href="/page{i}">Page {i}</a>"#));
        }
        root_html.push_str("</body></html>");
        mount_html(&mock_server, "/", root_html).await;
        for i in 1..=30 {
            mount_html(&mock_server, &format!("/page{i}"), "<p>leaf</p>".into()).await;
        }

        for budget in [0, 1, 5, 11, 25] {
            let result = Crawler::new().unwrap().crawl(&uri, budget).await.unwrap();
            assert!(
                result.visited.len() <= budget,
                "budget {} exceeded: {}",
                budget,
                result.visited.len()
            );
        }

        let result = Crawler::new().unwrap().crawl(&uri, 11).await.unwrap();
        assert_eq!(result.visited.len(), 11);
    }

    #[tokio::test]
    async fn test_synthetic_query_only_for_parameterless_pages() {
        let mock_server = MockServer::start().await;
        let uri = mock_server.uri();

        mount_html(
            &mock_server,
            "/",
            r#"<a href="/plain">plain</a><a href="/item?id=1">item</a>"#.into(),
        )
        .await;
        mount_html(&mock_server, "/plain", "<p>plain</p>".into()).await;
        mount_html(&mock_server, "/item", "<p>item</p>".into()).await;

        let result = Crawler::new().unwrap().crawl(&uri, 10).await.unwrap();

        for link in result.get_candidates() {
            let parsed = Url::parse(&link.url).unwrap();
            let query = parsed.query().unwrap_or_default();
            assert!(query.contains('='), "GET candidate without '=': {}", link.url);
            if link.synthetic {
                assert_eq!(query, SYNTHETIC_QUERY);
            }
        }

        let synthetic: Vec<&str> = result
            .get_candidates()
            .filter(|l| l.synthetic)
            .map(|l| l.url.as_str())
            .collect();
        assert!(synthetic.contains(&format!("{uri}/plain?test=x").as_str()));
        assert!(synthetic.contains(&format!("{uri}/?test=x").as_str()));
        assert!(!synthetic.iter().any(|u| u.contains("/item?id=1?")));
    }

    #[tokio::test]
    async fn test_failed_page_is_dropped_without_aborting() {
        let mock_server = MockServer::start().await;
        let uri = mock_server.uri();

        mount_html(
            &mock_server,
            "/",
            r#"<a href="/slow">slow</a><a href="/ok">ok</a>"#.into(),
        )
        .await;
        Mock::given(method("GET"))
            .and(path("/slow"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(800)))
            .mount(&mock_server)
            .await;
        mount_html(&mock_server, "/ok", r#"<a href="/slow">again</a>"#.into()).await;

        let client = HttpClient::with_timeout(Duration::from_millis(200)).unwrap();
        let result = Crawler::with_client(client).crawl(&uri, 10).await.unwrap();

        assert_eq!(result.dropped, vec![format!("{uri}/slow")]);
        assert!(result.visited.contains(&format!("{uri}/ok")));
        assert!(!result.visited.contains(&format!("{uri}/slow")));
    }

    #[tokio::test]
    async fn test_frontier_never_requeues_visited() {
        let mock_server = MockServer::start().await;
        let uri = mock_server.uri();

        // Pages link back to each other and to the root
        mount_html(&mock_server, "/", r#"<a href="/a">a</a><a href="/">self</a>"#.into()).await;
        mount_html(&mock_server, "/a", r#"<a href="/">root</a><a href="/b">b</a>"#.into()).await;
        mount_html(&mock_server, "/b", r#"<a href="/a">a</a>"#.into()).await;

        let result = Crawler::new().unwrap().crawl(&uri, 50).await.unwrap();

        let unique: HashSet<&String> = result.visited.iter().collect();
        assert_eq!(unique.len(), result.visited.len());
        assert_eq!(result.visited.len(), 3);
        assert_eq!(
            result.links.iter().filter(|l| l.kind == LinkKind::Next).count(),
            2
        );
    }

    /// Test that a wave spreads over several worker slots
    #[tokio::test]
    async fn test_wave_uses_multiple_slots() {
        let slots: Arc<TokioMutex<HashMap<usize, Vec<String>>>> =
            Arc::new(TokioMutex::new(HashMap::new()));
        let slots_clone = slots.clone();

        let mock_server = MockServer::start().await;
        let uri = mock_server.uri();

        let mut root_html = String::new();
        for i in 1..=10 {
            root_html.push_str(&format!(r#"<a href="/page{i}">Page {i}</a>"#));
        }
        mount_html(&mock_server, "/", root_html).await;
        for i in 1..=10 {
            mount_html(&mock_server, &format!("/page{i}"), "<p>Page</p>".into()).await;
        }

        let crawler = Crawler::new()
            .unwrap()
            .with_workers(4)
            .with_progress_callback(Arc::new(move |slot, url| {
                let slots = slots_clone.clone();
                tokio::spawn(async move {
                    slots.lock().await.entry(slot).or_default().push(url);
                });
            }));

        crawler.crawl(&uri, 11).await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        let slots = slots.lock().await;
        println!(
            "Slot distribution: {:?}",
            slots.iter().map(|(k, v)| (k, v.len())).collect::<Vec<_>>()
        );
        assert_eq!(slots.len(), 4);
        assert!(slots.values().all(|urls| !urls.is_empty()));
    }

    #[tokio::test]
    async fn test_invalid_root_is_an_error() {
        let err = Crawler::new().unwrap().crawl("not a url", 5).await;
        assert!(matches!(err, Err(ScanError::InvalidUrl(_))));
    }

    #[test]
    fn test_scope_matches_host_and_explicit_port() {
        let root = Url::parse("http://example.com/").unwrap();
        let scope = Scope::of(&root).unwrap();

        assert!(scope.contains(&Url::parse("http://example.com/a?b=1").unwrap()));
        assert!(scope.contains(&Url::parse("http://EXAMPLE.com:80/").unwrap()));
        assert!(!scope.contains(&Url::parse("http://example.com:8080/").unwrap()));
        assert!(!scope.contains(&Url::parse("http://sub.example.com/").unwrap()));
        assert!(scope.contains(&Url::parse("https://example.com/login").unwrap()));
        assert!(!scope.contains(&Url::parse("https://example.com:8443/").unwrap()));
    }
}
