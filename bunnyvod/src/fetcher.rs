//! Hand-off to the external stream downloader.
//!
//! Segment fetching, retries and muxing are yt-dlp's job. We only give it the
//! authorized URL, the same identity headers and cookies used while
//! negotiating, and where to put the file.

use std::path::PathBuf;
use std::process::Stdio;

use reqwest::Url;
use serde::Serialize;
use tokio::fs;
use tokio::process::Command;
use tracing::{debug, info};

use crate::config::FetcherConfig;
use crate::error::{Error, Result};
use crate::headers::USER_AGENT;
use crate::session::Session;
use crate::transport::Transport;

/// Everything the fetcher needs, nothing more.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Handoff {
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub output_dir: PathBuf,
    pub file_name: String,
}

impl Handoff {
    pub fn new(session: &Session, output_dir: PathBuf) -> Result<Self> {
        Ok(Handoff {
            url: session.stream_url()?.to_string(),
            headers: vec![
                ("Referer".to_string(), session.embed_url.to_string()),
                ("User-Agent".to_string(), USER_AGENT.to_string()),
            ],
            output_dir,
            file_name: session.file_name.clone(),
        })
    }

    /// Carry over whatever cookies the transport holds for the stream host.
    pub fn with_cookies<T: Transport>(mut self, transport: &T) -> Self {
        let cookie = Url::parse(&self.url)
            .ok()
            .and_then(|url| transport.cookie_header(&url));
        if let Some(cookie) = cookie {
            self.headers.push(("Cookie".to_string(), cookie));
        }
        self
    }

    pub fn output_path(&self) -> PathBuf {
        self.output_dir.join(&self.file_name)
    }
}

#[allow(async_fn_in_trait)]
pub trait StreamFetcher {
    async fn fetch(&self, handoff: &Handoff) -> Result<PathBuf>;
}

pub struct YtDlpFetcher {
    config: FetcherConfig,
}

impl YtDlpFetcher {
    pub fn new(config: FetcherConfig) -> Self {
        YtDlpFetcher { config }
    }

    pub fn args(&self, handoff: &Handoff) -> Vec<String> {
        let mut args = Vec::new();
        for (name, value) in &handoff.headers {
            args.push("--add-header".to_string());
            args.push(format!("{}:{}", name, value));
        }
        let fragments = self.config.concurrent_fragments.to_string();
        let home = format!("home:{}", handoff.output_dir.display());
        let temp = format!(
            "temp:{}",
            handoff
                .output_dir
                .join(format!(".{}", handoff.file_name))
                .display()
        );
        for arg in [
            "--concurrent-fragments",
            fragments.as_str(),
            "--no-check-certificates",
            "--windows-filenames",
            "--no-part",
            "--retries",
            "infinite",
            "--extractor-retries",
            "infinite",
            "--fragment-retries",
            "infinite",
            "--abort-on-unavailable-fragments",
            "--no-warnings",
            "--format",
            "best",
            "--buffer-size",
            "1M",
            "--http-chunk-size",
            "10M",
            "--paths",
            home.as_str(),
            "--paths",
            temp.as_str(),
            "--output",
            handoff.file_name.as_str(),
            handoff.url.as_str(),
        ] {
            args.push(arg.to_string());
        }
        args
    }
}

impl StreamFetcher for YtDlpFetcher {
    async fn fetch(&self, handoff: &Handoff) -> Result<PathBuf> {
        if !handoff.output_dir.exists() {
            fs::create_dir_all(&handoff.output_dir).await?;
        }
        let args = self.args(handoff);
        debug!("{} {:?}", self.config.binary, args);
        info!("Handing {} to {}", handoff.url, self.config.binary);

        // progress is rendered by the downloader itself
        let status = Command::new(&self.config.binary)
            .args(&args)
            .stdin(Stdio::null())
            .status()
            .await
            .map_err(|e| Error::Fetch(format!("can't start {}: {}", self.config.binary, e)))?;

        if !status.success() {
            return Err(Error::Fetch(format!(
                "{} exited with {}",
                self.config.binary,
                status
                    .code()
                    .map(|c| c.to_string())
                    .unwrap_or_else(|| "a signal".to_string())
            )));
        }
        Ok(handoff.output_path())
    }
}
