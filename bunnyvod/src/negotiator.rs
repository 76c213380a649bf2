//! Session negotiation.
//!
//! Runs the player handshake strictly in order:
//! idle ping, activate, master playlist, quality choice, resolution playlist,
//! then a burst of "playing" pings. Only the master playlist is allowed to fail
//! the negotiation; every other call is best effort and just logs a warning.

use std::ops::Range;
use std::time::Duration;

use once_cell::sync::Lazy;
use rand::Rng;
use regex::Regex;
use reqwest::Url;
use reqwest::header::HeaderMap;
use tracing::{debug, info, warn};

use crate::chooser::ResolutionChooser;
use crate::error::{Error, Result};
use crate::quality;
use crate::session::{PingEvent, Session};
use crate::transport::Transport;

// Observed minimum the server wants to see before it serves full quality
// segments. Keep these literal.
const WARMUP_RANGE: Range<u32> = 0..29;
const WARMUP_STEP: usize = 4;

static RESOLUTION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s*(.*?)\s*/video\.drm").unwrap());

/// Resolution paths from a master playlist, highest first.
///
/// The provider lists them low to high.
pub fn parse_resolutions(playlist: &str) -> Vec<String> {
    let mut resolutions: Vec<String> = RESOLUTION_RE
        .captures_iter(playlist)
        .map(|caps| caps[1].to_string())
        .collect();
    resolutions.reverse();
    resolutions
}

/// Warm-up ping timestamps: every nominal 4s slot plus sub-second jitter.
pub fn warmup_schedule<R: Rng>(rng: &mut R) -> Vec<f64> {
    WARMUP_RANGE
        .step_by(WARMUP_STEP)
        .map(|base| {
            let jitter: f64 = rng.gen_range(0.0..1.0);
            base as f64 + ((jitter * 1e6).round() / 1e6).min(0.999_999)
        })
        .collect()
}

pub struct Negotiator<'a, T, C> {
    transport: &'a T,
    chooser: &'a C,
    warmup_pacing: Option<Duration>,
}

impl<'a, T: Transport, C: ResolutionChooser> Negotiator<'a, T, C> {
    pub fn new(transport: &'a T, chooser: &'a C) -> Self {
        Negotiator {
            transport,
            chooser,
            warmup_pacing: None,
        }
    }

    /// Sleep this long between warm-up pings instead of sending them back to back.
    pub fn with_warmup_pacing(mut self, pacing: Duration) -> Self {
        self.warmup_pacing = Some(pacing);
        self
    }

    /// Runs every stage and records the chosen resolution on the session.
    pub async fn negotiate(&self, session: &mut Session) -> Result<String> {
        self.ping(session, PingEvent::idle(session)).await;
        self.activate(session).await;

        let resolutions = self.master_playlist(session).await?;
        let options = quality::options(&resolutions);
        let choice = self.chooser.choose(&options).await?;
        let (resolution, option) = resolutions
            .get(choice)
            .zip(options.get(choice))
            .ok_or_else(|| {
                Error::Config(format!(
                    "quality {} chosen but the playlist only has {}",
                    choice.saturating_add(1),
                    options.len()
                ))
            })?;
        let resolution = resolution.clone();
        session.choose_resolution(resolution.clone())?;
        info!("Selected {}", option);

        self.resolution_playlist(session, &resolution).await;
        self.warm_up(session, &resolution).await;
        Ok(resolution)
    }

    async fn ping(&self, session: &Session, event: PingEvent) {
        let url = match session.ping_url(&event) {
            Ok(url) => url,
            Err(e) => {
                warn!("Ping request failed: {}", e);
                return;
            }
        };
        debug!("ping time={} paused={}", event.time, event.paused);
        self.best_effort("Ping", url, &session.headers.drm).await;
    }

    async fn activate(&self, session: &Session) {
        match session.activate_url() {
            Ok(url) => self.best_effort("Activation", url, &session.headers.drm).await,
            Err(e) => warn!("Activation request failed: {}", e),
        }
    }

    async fn master_playlist(&self, session: &Session) -> Result<Vec<String>> {
        let reply = self
            .transport
            .get(session.playlist_url()?, &session.headers.playlist)
            .await?;
        if !reply.is_success() {
            return Err(Error::Status {
                stage: "Playlist",
                status: reply.status,
            });
        }
        let resolutions = parse_resolutions(&reply.body);
        if resolutions.is_empty() {
            return Err(Error::ManifestEmpty);
        }
        debug!("playlist offers {:?}", resolutions);
        Ok(resolutions)
    }

    // the body is not needed, the request only marks the resolution as in use
    async fn resolution_playlist(&self, session: &Session, resolution: &str) {
        match session.resolution_url(resolution) {
            Ok(url) => {
                self.best_effort("Resolution playlist", url, &session.headers.playlist)
                    .await
            }
            Err(e) => warn!("Resolution playlist request failed: {}", e),
        }
    }

    async fn warm_up(&self, session: &Session, resolution: &str) {
        let schedule = warmup_schedule(&mut rand::thread_rng());
        info!("Warming up session with {} pings", schedule.len());
        for (i, time) in schedule.into_iter().enumerate() {
            if i > 0 {
                if let Some(pacing) = self.warmup_pacing {
                    tokio::time::sleep(pacing).await;
                }
            }
            self.ping(session, PingEvent::playing(session, time, resolution))
                .await;
        }
    }

    async fn best_effort(&self, stage: &str, url: Url, headers: &HeaderMap) {
        match self.transport.get(url, headers).await {
            Ok(reply) if reply.is_success() => {}
            Ok(reply) => warn!("{} request failed: HTTP {}", stage, reply.status),
            Err(e) => warn!("{} request failed: {}", stage, e),
        }
    }
}
