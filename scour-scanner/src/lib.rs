pub mod crawler;
pub mod error;
pub mod html;
pub mod http;
pub mod result;

pub use crawler::{Crawler, ProgressCallback, Scope};
pub use error::ScanError;
pub use html::{FormDescriptor, FormMethod};
pub use http::{HttpClient, HttpResponse};
pub use result::{CrawlResult, LinkKind, PageLink};
