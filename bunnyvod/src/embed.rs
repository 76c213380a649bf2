//! Embed page scraping.
//!
//! Pulls the session bootstrap values out of the iframe page. Any missing
//! value means the page layout changed or the URL is wrong, so there is no retry.

use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Url;
use reqwest::header::HeaderMap;
use scraper::{Html, Selector};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::session::EmbedInfo;
use crate::transport::Transport;

pub const VIDEO_EXTENSION: &str = ".mp4";
const FALLBACK_FILE_NAME: &str = "video";

static SERVER_ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"https://video-(.*?)\.mediadelivery\.net").unwrap());

static CONTEXT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"contextId=(.*?)&secret=(.*?)""#).unwrap());

static EXTENSION_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\.[^.]*$").unwrap());

static OG_TITLE: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"meta[property="og:title"]"#).unwrap());

pub async fn scrape<T: Transport>(transport: &T, embed_url: &Url, headers: &HeaderMap) -> Result<EmbedInfo> {
    info!("Fetching embed page {}", embed_url);
    let reply = transport.get(embed_url.clone(), headers).await?;
    if !reply.is_success() {
        return Err(Error::Status {
            stage: "Embed page",
            status: reply.status,
        });
    }
    parse_embed_page(&reply.body)
}

pub fn parse_embed_page(page: &str) -> Result<EmbedInfo> {
    let server_id = SERVER_ID_RE
        .captures(page)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .ok_or(Error::Extraction("server id"))?;

    let (context_id, secret) = CONTEXT_RE
        .captures(page)
        .map(|caps| (caps[1].to_string(), caps[2].to_string()))
        .ok_or(Error::Extraction("context id and secret"))?;

    let suggested_title = og_title(page);
    debug!(
        "server id: {}, context id: {}, title: {:?}",
        server_id, context_id, suggested_title
    );

    Ok(EmbedInfo {
        server_id,
        context_id,
        secret,
        suggested_title,
    })
}

// attribute values come back from scraper already entity-decoded
fn og_title(page: &str) -> Option<String> {
    let document = Html::parse_document(page);
    document
        .select(&OG_TITLE)
        .next()
        .and_then(|meta| meta.value().attr("content"))
        .map(str::trim)
        .filter(|title| !title.is_empty())
        .map(str::to_string)
}

/// Replace characters that are unsafe in file names on common filesystems.
pub fn sanitize(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    cleaned.trim_matches(|c: char| c == '.' || c.is_whitespace()).to_string()
}

/// Output file name: explicit name wins, then the page title, then `video.mp4`.
pub fn file_name(explicit: Option<&str>, suggested_title: Option<&str>) -> String {
    if let Some(name) = explicit.map(sanitize).filter(|n| !n.is_empty()) {
        return format!("{}{}", name, VIDEO_EXTENSION);
    }
    let Some(title) = suggested_title else {
        return format!("{}{}", FALLBACK_FILE_NAME, VIDEO_EXTENSION);
    };
    let stem = sanitize(&EXTENSION_RE.replace(title, ""));
    if stem.is_empty() {
        return format!("{}{}", FALLBACK_FILE_NAME, VIDEO_EXTENSION);
    }
    format!("{}{}", stem, VIDEO_EXTENSION)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headers::HeaderProfiles;
    use crate::transport::fake::FakeTransport;

    fn embed_headers() -> HeaderMap {
        HeaderProfiles::new("https://ref.example/", "https://iframe.mediadelivery.net/embed/1/guid")
            .unwrap()
            .embed
    }

    const PAGE: &str = r#"<html><head>
<meta property="og:title" content="Tom &amp; Jerry: Part 2">
</head><body>
<link rel="preconnect" href="https://video-sv3.mediadelivery.net">
<script>var src = "https://iframe.mediadelivery.net/x?contextId=ABC&secret=XYZ";</script>
</body></html>"#;

    #[test]
    fn test_parse_embed_page() {
        let info = parse_embed_page(PAGE).unwrap();
        assert_eq!(info.server_id, "sv3");
        assert_eq!(info.context_id, "ABC");
        assert_eq!(info.secret, "XYZ");
        assert_eq!(info.suggested_title.as_deref(), Some("Tom & Jerry: Part 2"));
    }

    #[test]
    fn test_missing_server_id() {
        let page = PAGE.replace("video-sv3.mediadelivery.net", "cdn.example.com");
        assert!(matches!(
            parse_embed_page(&page),
            Err(Error::Extraction("server id"))
        ));
    }

    #[test]
    fn test_missing_context() {
        let page = PAGE.replace("contextId=ABC&", "");
        assert!(matches!(
            parse_embed_page(&page),
            Err(Error::Extraction("context id and secret"))
        ));
    }

    #[test]
    fn test_title_is_optional() {
        let page = PAGE.replace("og:title", "og:description");
        assert_eq!(parse_embed_page(&page).unwrap().suggested_title, None);
    }

    #[test]
    fn test_file_name_rules() {
        assert_eq!(file_name(Some("lecture 1"), Some("ignored")), "lecture 1.mp4");
        assert_eq!(file_name(None, Some("My Video")), "My Video.mp4");
        assert_eq!(file_name(None, Some("clip.mov")), "clip.mp4");
        assert_eq!(file_name(None, Some("Tom & Jerry: Part 2")), "Tom & Jerry_ Part 2.mp4");
        assert_eq!(file_name(None, None), "video.mp4");
        assert_eq!(file_name(Some("  "), None), "video.mp4");
        assert_eq!(file_name(None, Some("...")), "video.mp4");
        assert_eq!(file_name(Some("a/b"), None), "a_b.mp4");
    }

    #[test]
    fn test_sanitize() {
        assert_eq!(sanitize("a/b\\c"), "a_b_c");
        assert_eq!(sanitize("what?\t"), "what__");
        assert_eq!(sanitize(" .hidden. "), "hidden");
    }

    #[tokio::test]
    async fn test_scrape_sends_embed_headers() {
        let transport = FakeTransport::new().route("/embed/1/guid", 200, PAGE);
        let url = Url::parse("https://iframe.mediadelivery.net/embed/1/guid").unwrap();
        let info = scrape(&transport, &url, &embed_headers()).await.unwrap();
        assert_eq!(info.server_id, "sv3");
        let calls = transport.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].referer.as_deref(), Some("https://ref.example/"));
    }

    #[tokio::test]
    async fn test_scrape_fails_on_http_error() {
        let transport = FakeTransport::new().route("/embed/1/guid", 404, "");
        let url = Url::parse("https://iframe.mediadelivery.net/embed/1/guid").unwrap();
        let err = scrape(&transport, &url, &embed_headers()).await.unwrap_err();
        assert!(matches!(err, Error::Status { status: 404, .. }));
    }
}
