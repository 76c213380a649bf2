//! Browser-identity header profiles for one session.
//!
//! Built once when the session starts and only read afterwards, so nothing
//! leaks between download attempts.

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};

use crate::error::Result;

pub const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/107.0.0.0 Safari/537.36";
pub const IFRAME_ORIGIN: &str = "https://iframe.mediadelivery.net";

const BROWSER_IDENTITY: &[(&str, &str)] = &[
    (
        "sec-ch-ua",
        r#""Google Chrome";v="107", "Chromium";v="107", "Not=A?Brand";v="24""#,
    ),
    ("sec-ch-ua-mobile", "?0"),
    ("sec-ch-ua-platform", r#""Linux""#),
    ("user-agent", USER_AGENT),
    ("accept", "*/*"),
    ("accept-language", "en-US,en;q=0.9"),
    ("cache-control", "no-cache"),
    ("pragma", "no-cache"),
];

fn build(pairs: &[(&'static str, &str)]) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    for &(name, value) in BROWSER_IDENTITY {
        headers.insert(HeaderName::from_static(name), HeaderValue::from_static(value));
    }
    for &(name, value) in pairs {
        headers.insert(HeaderName::from_static(name), HeaderValue::from_str(value)?);
    }
    Ok(headers)
}

/// Headers for the embed page itself, which the browser loads as an iframe.
fn embed(referer: &str) -> Result<HeaderMap> {
    build(&[
        ("referer", referer),
        ("sec-fetch-dest", "iframe"),
        ("sec-fetch-mode", "navigate"),
        ("sec-fetch-site", "cross-site"),
        ("upgrade-insecure-requests", "1"),
    ])
}

#[derive(Debug, Clone)]
pub struct HeaderProfiles {
    pub embed: HeaderMap,
    /// ping and activate on the video server
    pub drm: HeaderMap,
    /// playlist.drm and video.drm on the iframe host
    pub playlist: HeaderMap,
}

impl HeaderProfiles {
    pub fn new(referer: &str, embed_url: &str) -> Result<Self> {
        let iframe_referer = format!("{}/", IFRAME_ORIGIN);
        Ok(HeaderProfiles {
            embed: embed(referer)?,
            drm: build(&[
                ("origin", IFRAME_ORIGIN),
                ("referer", iframe_referer.as_str()),
                ("sec-fetch-dest", "empty"),
                ("sec-fetch-mode", "cors"),
                ("sec-fetch-site", "same-site"),
            ])?,
            playlist: build(&[
                ("referer", embed_url),
                ("sec-fetch-dest", "empty"),
                ("sec-fetch-mode", "cors"),
                ("sec-fetch-site", "same-origin"),
            ])?,
        })
    }
}
