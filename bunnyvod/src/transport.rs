//! HTTP seam between the protocol stages and the network.

use std::sync::Arc;
use std::time::Duration;

use reqwest::cookie::{CookieStore, Jar};
use reqwest::header::HeaderMap;
use reqwest::{Client, Url};

use crate::error::Result;

/// Status and body of a finished request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub status: u16,
    pub body: String,
}

impl Reply {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[allow(async_fn_in_trait)]
pub trait Transport {
    async fn get(&self, url: Url, headers: &HeaderMap) -> Result<Reply>;

    /// `Cookie` header value the session has collected for `url`, if any.
    fn cookie_header(&self, url: &Url) -> Option<String>;
}

/// reqwest-backed transport. One per session: the cookie store lives and dies with it.
pub struct HttpTransport {
    client: Client,
    jar: Arc<Jar>,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self> {
        let jar = Arc::new(Jar::default());
        let client = Client::builder()
            .cookie_provider(Arc::clone(&jar))
            .timeout(timeout)
            .build()?;
        Ok(HttpTransport { client, jar })
    }
}

impl Transport for HttpTransport {
    fn cookie_header(&self, url: &Url) -> Option<String> {
        self.jar
            .cookies(url)
            .and_then(|value| value.to_str().ok().map(str::to_string))
    }

    async fn get(&self, url: Url, headers: &HeaderMap) -> Result<Reply> {
        let response = self.client.get(url).headers(headers.clone()).send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        Ok(Reply { status, body })
    }
}
