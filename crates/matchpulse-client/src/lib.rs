#[cfg(feature = "browser")]
pub mod browser_fetcher;
pub mod fetcher;
pub mod forwarder;
pub mod html;

#[cfg(feature = "browser")]
pub use browser_fetcher::BrowserConnector;
pub use fetcher::HttpConnector;
pub use forwarder::HttpIngestionForwarder;
pub use html::{HtmlNode, HtmlParser, HtmlSnapshot};
