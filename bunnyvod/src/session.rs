use reqwest::Url;

use crate::error::{Error, Result};
use crate::headers::{HeaderProfiles, IFRAME_ORIGIN};
use crate::quality;
use crate::token;

/// Bootstrap values scraped from the embed page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbedInfo {
    pub server_id: String,
    pub context_id: String,
    pub secret: String,
    pub suggested_title: Option<String>,
}

/// State of one download attempt. Never reused across attempts.
#[derive(Debug)]
pub struct Session {
    pub referer: String,
    pub embed_url: Url,
    pub video_guid: String,
    pub server_id: String,
    pub context_id: String,
    pub secret: String,
    pub file_name: String,
    pub headers: HeaderProfiles,
    chosen_resolution: Option<String>,
}

/// Last path segment of the embed URL.
pub fn video_guid(embed_url: &Url) -> Result<String> {
    embed_url
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .filter(|guid| !guid.is_empty())
        .map(str::to_string)
        .ok_or_else(|| Error::Config(format!("no video id in embed URL {}", embed_url)))
}

impl Session {
    pub fn new(
        referer: &str,
        embed_url: Url,
        headers: HeaderProfiles,
        info: EmbedInfo,
        file_name: String,
    ) -> Result<Self> {
        for (field, value) in [
            ("server id", &info.server_id),
            ("context id", &info.context_id),
            ("secret", &info.secret),
        ] {
            if value.is_empty() {
                return Err(Error::Config(format!("empty {} for session", field)));
            }
        }
        Ok(Session {
            referer: referer.to_string(),
            video_guid: video_guid(&embed_url)?,
            headers,
            embed_url,
            server_id: info.server_id,
            context_id: info.context_id,
            secret: info.secret,
            file_name,
            chosen_resolution: None,
        })
    }

    pub fn chosen_resolution(&self) -> Option<&str> {
        self.chosen_resolution.as_deref()
    }

    /// Can only be set once per session.
    pub fn choose_resolution(&mut self, resolution: String) -> Result<()> {
        if let Some(existing) = &self.chosen_resolution {
            return Err(Error::Config(format!(
                "resolution already chosen ({})",
                existing
            )));
        }
        self.chosen_resolution = Some(resolution);
        Ok(())
    }

    fn drm_url(&self, action: &str) -> Result<Url> {
        let raw = format!(
            "https://video-{}.mediadelivery.net/.drm/{}/{}",
            self.server_id, self.context_id, action
        );
        Url::parse(&raw).map_err(|e| Error::Config(format!("bad url {}: {}", raw, e)))
    }

    fn iframe_url(&self, path: &str, params: &[(&str, &str)]) -> Result<Url> {
        let raw = format!("{}/{}/{}", IFRAME_ORIGIN, self.video_guid, path);
        Url::parse_with_params(&raw, params)
            .map_err(|e| Error::Config(format!("bad url {}: {}", raw, e)))
    }

    pub fn ping_url(&self, event: &PingEvent) -> Result<Url> {
        let mut url = self.drm_url("ping")?;
        url.query_pairs_mut()
            .append_pair("hash", &event.fingerprint)
            .append_pair("time", &token::format_time(event.time))
            .append_pair("paused", if event.paused { "true" } else { "false" })
            .append_pair("chosen_res", &event.resolution_height);
        Ok(url)
    }

    pub fn activate_url(&self) -> Result<Url> {
        self.drm_url("activate")
    }

    pub fn playlist_url(&self) -> Result<Url> {
        self.iframe_url(
            "playlist.drm",
            &[
                ("contextId", self.context_id.as_str()),
                ("secret", self.secret.as_str()),
            ],
        )
    }

    pub fn resolution_url(&self, resolution: &str) -> Result<Url> {
        self.iframe_url(
            &format!("{}/video.drm", resolution),
            &[("contextId", self.context_id.as_str())],
        )
    }

    /// Authorized stream URL, once a resolution has been chosen.
    pub fn stream_url(&self) -> Result<Url> {
        let resolution = self
            .chosen_resolution()
            .ok_or_else(|| Error::Config("no resolution chosen".into()))?;
        self.resolution_url(resolution)
    }
}

/// One heartbeat. Built, sent, dropped.
#[derive(Debug, Clone, PartialEq)]
pub struct PingEvent {
    pub time: f64,
    pub paused: bool,
    pub resolution_height: String,
    pub fingerprint: String,
}

impl PingEvent {
    pub fn new(session: &Session, time: f64, paused: bool, resolution_height: &str) -> Self {
        PingEvent {
            time,
            paused,
            resolution_height: resolution_height.to_string(),
            fingerprint: token::fingerprint(
                &session.secret,
                &session.context_id,
                time,
                paused,
                resolution_height,
            ),
        }
    }

    /// Presence ping sent before anything is chosen.
    pub fn idle(session: &Session) -> Self {
        Self::new(session, 0.0, true, "0")
    }

    pub fn playing(session: &Session, time: f64, resolution: &str) -> Self {
        Self::new(session, time, false, quality::height_of(resolution))
    }
}

#[cfg(test)]
pub(crate) fn test_session() -> Session {
    let referer = "https://iframe.mediadelivery.net/";
    let embed_url = Url::parse("https://iframe.mediadelivery.net/embed/1234/guid-42").unwrap();
    Session::new(
        referer,
        embed_url.clone(),
        HeaderProfiles::new(referer, embed_url.as_str()).unwrap(),
        EmbedInfo {
            server_id: "sv3".into(),
            context_id: "ABC".into(),
            secret: "XYZ".into(),
            suggested_title: None,
        },
        "My Video.mp4".into(),
    )
    .unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_video_guid_is_last_segment() {
        let url = Url::parse("https://iframe.mediadelivery.net/embed/77/abc-def").unwrap();
        assert_eq!(video_guid(&url).unwrap(), "abc-def");
        let bare = Url::parse("https://iframe.mediadelivery.net/").unwrap();
        assert!(video_guid(&bare).is_err());
    }

    #[test]
    fn test_empty_credentials_rejected() {
        let info = EmbedInfo {
            server_id: "sv3".into(),
            context_id: String::new(),
            secret: "XYZ".into(),
            suggested_title: None,
        };
        let url = Url::parse("https://iframe.mediadelivery.net/embed/1/g").unwrap();
        let headers = HeaderProfiles::new("https://r/", url.as_str()).unwrap();
        let err = Session::new("https://r/", url, headers, info, "v.mp4".into()).unwrap_err();
        assert!(matches!(err, Error::Config(msg) if msg.contains("context id")));
    }

    #[test]
    fn test_protocol_urls() {
        let session = test_session();
        assert_eq!(
            session.activate_url().unwrap().as_str(),
            "https://video-sv3.mediadelivery.net/.drm/ABC/activate"
        );
        assert_eq!(
            session.playlist_url().unwrap().as_str(),
            "https://iframe.mediadelivery.net/guid-42/playlist.drm?contextId=ABC&secret=XYZ"
        );
        assert_eq!(
            session.resolution_url("640x360").unwrap().as_str(),
            "https://iframe.mediadelivery.net/guid-42/640x360/video.drm?contextId=ABC"
        );
    }

    #[test]
    fn test_idle_ping_url() {
        let session = test_session();
        let url = session.ping_url(&PingEvent::idle(&session)).unwrap();
        assert_eq!(
            url.as_str(),
            "https://video-sv3.mediadelivery.net/.drm/ABC/ping?hash=9cdfe664fa31c72e0332ba68a0fc0280&time=0&paused=true&chosen_res=0"
        );
    }

    #[test]
    fn test_resolution_set_once() {
        let mut session = test_session();
        assert!(session.stream_url().is_err());
        session.choose_resolution("1920x1080".into()).unwrap();
        assert!(session.choose_resolution("640x360".into()).is_err());
        assert_eq!(session.chosen_resolution(), Some("1920x1080"));
        assert_eq!(
            session.stream_url().unwrap().as_str(),
            "https://iframe.mediadelivery.net/guid-42/1920x1080/video.drm?contextId=ABC"
        );
    }

    #[test]
    fn test_playing_ping_uses_height() {
        let session = test_session();
        let event = PingEvent::playing(&session, 4.5, "1920x1080");
        assert!(!event.paused);
        assert_eq!(event.resolution_height, "1080");
        assert_eq!(event.fingerprint, "35a1305501173cd226ec8f2ba106a929");
    }
}
