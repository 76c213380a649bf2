mod chooser;
mod config;
mod embed;
mod error;
mod fetcher;
mod headers;
mod negotiator;
mod quality;
mod session;
mod token;
mod transport;

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use reqwest::Url;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use chooser::{FixedChooser, FzfChooser, ResolutionChooser, TerminalChooser};
use config::{Config, expand_home};
use error::{Error, Result};
use fetcher::{Handoff, StreamFetcher, YtDlpFetcher};
use headers::HeaderProfiles;
use negotiator::Negotiator;
use session::Session;
use transport::HttpTransport;

const WARMUP_PACING: Duration = Duration::from_secs(4);

/// Download videos from Bunny CDN DRM embeds
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Embed URL (https://iframe.mediadelivery.net/embed/{library}/{video}); prompted for when missing
    url: Option<String>,

    /// Output file name, without extension
    #[arg(short, long)]
    name: Option<String>,

    /// Download directory
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Referer sent with the embed page request
    #[arg(long)]
    referer: Option<String>,

    /// Quality number to pick without prompting (1 is the highest)
    #[arg(short, long)]
    quality: Option<usize>,

    /// Pick the quality with fzf
    #[arg(long)]
    fzf: bool,

    /// Print the downloader hand-off as JSON instead of downloading
    #[arg(long)]
    print_handoff: bool,

    /// Send the warm-up pings back to back instead of 4s apart. Saves about
    /// 30s per video, but servers that check wall-clock spacing may refuse the stream
    #[arg(long)]
    no_pace: bool,

    /// Config file (default: <config dir>/bunnyvod/config.toml)
    #[arg(long)]
    config: Option<PathBuf>,
}

/// Inputs for one download attempt after prompting and config merging.
struct Request {
    embed_url: Url,
    name: Option<String>,
    output_dir: PathBuf,
    referer: String,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("bunnyvod=info")),
        )
        .with_target(false)
        .init();

    let args = Args::parse();
    let result = tokio::select! {
        result = run(args) => result,
        _ = tokio::signal::ctrl_c() => Err(Error::Cancelled),
    };

    let code = match result {
        Ok(()) => 0,
        Err(Error::Cancelled) => {
            println!("\n{}", Error::Cancelled);
            0
        }
        Err(e) => {
            error!("{}", e);
            e.exit_code()
        }
    };
    // exit right away, a cancelled prompt can still be blocked on stdin
    std::process::exit(i32::from(code));
}

async fn run(args: Args) -> Result<()> {
    let config = Config::load(args.config.as_deref()).await?;
    let request = resolve_request(&args, &config).await?;
    let transport = HttpTransport::new(config.request_timeout())?;

    let headers = HeaderProfiles::new(&request.referer, request.embed_url.as_str())?;

    let info = embed::scrape(&transport, &request.embed_url, &headers.embed).await?;
    let file_name = embed::file_name(request.name.as_deref(), info.suggested_title.as_deref());
    let mut session = Session::new(&request.referer, request.embed_url, headers, info, file_name)?;
    info!(
        "Negotiating session for {} (referer {})",
        session.video_guid, session.referer
    );

    let pacing = warmup_pacing(&args, &config);
    let resolution = if let Some(index) = args.quality {
        negotiate(&transport, &FixedChooser(index), pacing, &mut session).await?
    } else if args.fzf || config.use_fzf {
        negotiate(&transport, &FzfChooser, pacing, &mut session).await?
    } else {
        negotiate(&transport, &TerminalChooser, pacing, &mut session).await?
    };

    let handoff = Handoff::new(&session, request.output_dir)?.with_cookies(&transport);
    if args.print_handoff {
        println!("{}", serde_json::to_string_pretty(&handoff)?);
        return Ok(());
    }

    println!("\nDownloading video in {}...", resolution);
    let saved = YtDlpFetcher::new(config.fetcher.clone())
        .fetch(&handoff)
        .await?;
    println!("\nDownload completed! File saved to: {}", saved.display());
    Ok(())
}

/// `--no-pace` wins over `pace_warmup` in the config file.
fn warmup_pacing(args: &Args, config: &Config) -> Option<Duration> {
    (config.pace_warmup && !args.no_pace).then_some(WARMUP_PACING)
}

async fn negotiate<C: ResolutionChooser>(
    transport: &HttpTransport,
    chooser: &C,
    pacing: Option<Duration>,
    session: &mut Session,
) -> Result<String> {
    let mut negotiator = Negotiator::new(transport, chooser);
    if let Some(pacing) = pacing {
        negotiator = negotiator.with_warmup_pacing(pacing);
    }
    negotiator.negotiate(session).await
}

/// CLI flags win over the config file. Without a URL argument, ask for everything.
async fn resolve_request(args: &Args, config: &Config) -> Result<Request> {
    let (raw_url, name, output_dir) = match &args.url {
        Some(url) => (url.clone(), args.name.clone(), args.output_dir.clone()),
        None => {
            println!("Bunny CDN Video Downloader");
            println!("=========================\n");
            let url = prompt("Enter the embed URL: ").await?;
            let name = prompt("Enter the file name (without extension): ").await?;
            let path = prompt("Enter the download path (leave blank for default): ").await?;
            (
                url,
                Some(name).filter(|n| !n.is_empty()).or_else(|| args.name.clone()),
                Some(PathBuf::from(path))
                    .filter(|p| !p.as_os_str().is_empty())
                    .or_else(|| args.output_dir.clone()),
            )
        }
    };

    if raw_url.is_empty() {
        return Err(Error::Config("Embed URL is required".into()));
    }
    let embed_url = Url::parse(&raw_url)
        .map_err(|e| Error::Config(format!("invalid embed URL {}: {}", raw_url, e)))?;

    let output_dir = output_dir
        .map(|dir| expand_home(&dir))
        .unwrap_or_else(|| config.output_dir());
    info!("Saving to {}", output_dir.display());

    Ok(Request {
        embed_url,
        name,
        output_dir,
        referer: args.referer.clone().unwrap_or_else(|| config.referer.clone()),
    })
}

/// Read one trimmed line from stdin. EOF counts as cancelling.
async fn prompt(question: &'static str) -> Result<String> {
    tokio::task::spawn_blocking(move || -> Result<String> {
        let mut stdout = io::stdout().lock();
        write!(stdout, "{}", question)?;
        stdout.flush()?;
        let mut line = String::new();
        if io::stdin().lock().read_line(&mut line)? == 0 {
            return Err(Error::Cancelled);
        }
        Ok(line.trim().to_string())
    })
    .await
    .map_err(|e| Error::Io(io::Error::other(e)))?
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_parse() {
        let args = Args::try_parse_from([
            "bunnyvod",
            "https://iframe.mediadelivery.net/embed/1/abc",
            "-n",
            "lecture",
            "-q",
            "2",
            "--print-handoff",
        ])
        .unwrap();
        assert_eq!(args.url.as_deref(), Some("https://iframe.mediadelivery.net/embed/1/abc"));
        assert_eq!(args.name.as_deref(), Some("lecture"));
        assert_eq!(args.quality, Some(2));
        assert!(args.print_handoff);
        assert!(!args.fzf);
    }

    #[test]
    fn test_warmup_is_paced_unless_disabled() {
        let url = "https://iframe.mediadelivery.net/embed/1/abc";
        let paced = Args::try_parse_from(["bunnyvod", url]).unwrap();
        let unpaced = Args::try_parse_from(["bunnyvod", url, "--no-pace"]).unwrap();
        let config = Config::default();
        assert_eq!(warmup_pacing(&paced, &config), Some(WARMUP_PACING));
        assert_eq!(warmup_pacing(&unpaced, &config), None);

        let off = Config {
            pace_warmup: false,
            ..Config::default()
        };
        assert_eq!(warmup_pacing(&paced, &off), None);
    }

    #[tokio::test]
    async fn test_request_prefers_flags() {
        let args = Args::try_parse_from([
            "bunnyvod",
            "https://iframe.mediadelivery.net/embed/1/abc",
            "-o",
            "/srv/videos",
            "--referer",
            "https://school.example/",
        ])
        .unwrap();
        let request = resolve_request(&args, &Config::default()).await.unwrap();
        assert_eq!(request.output_dir, PathBuf::from("/srv/videos"));
        assert_eq!(request.referer, "https://school.example/");
        assert_eq!(request.embed_url.path(), "/embed/1/abc");
    }

    #[tokio::test]
    async fn test_request_falls_back_to_config() {
        let args = Args::try_parse_from(["bunnyvod", "https://iframe.mediadelivery.net/embed/1/abc"])
            .unwrap();
        let file_config = Config {
            output_dir: Some(PathBuf::from("/data/bunny")),
            ..Config::default()
        };
        let request = resolve_request(&args, &file_config).await.unwrap();
        assert_eq!(request.output_dir, PathBuf::from("/data/bunny"));
        assert_eq!(request.referer, config::DEFAULT_REFERER);
    }

    #[tokio::test]
    async fn test_request_rejects_bad_url() {
        let args = Args::try_parse_from(["bunnyvod", "not a url"]).unwrap();
        assert!(matches!(
            resolve_request(&args, &Config::default()).await,
            Err(Error::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_request_rejects_empty_url() {
        let args = Args::try_parse_from(["bunnyvod", ""]).unwrap();
        assert!(matches!(
            resolve_request(&args, &Config::default()).await,
            Err(Error::Config(msg)) if msg == "Embed URL is required"
        ));
    }

    #[tokio::test]
    async fn test_embed_to_handoff() {
        use crate::transport::fake::FakeTransport;

        let page = r#"<html><head><meta property="og:title" content="My Video"></head>
<body><script src="https://video-sv9.mediadelivery.net/player.js"></script>
<iframe src="/play?contextId=ABC&secret=XYZ"></iframe></body></html>"#;
        let master = "#EXTM3U\n640x360/video.drm\n1920x1080/video.drm\n";
        let transport = FakeTransport::new()
            .with_cookie("sid=s3ss10n")
            .route("/embed/55/guid-7", 200, page)
            .route("/playlist.drm", 200, master);

        let embed_url = Url::parse("https://iframe.mediadelivery.net/embed/55/guid-7").unwrap();
        let referer = config::DEFAULT_REFERER;
        let headers = HeaderProfiles::new(referer, embed_url.as_str()).unwrap();
        let info = embed::scrape(&transport, &embed_url, &headers.embed).await.unwrap();
        let file_name = embed::file_name(None, info.suggested_title.as_deref());
        let mut session = Session::new(referer, embed_url, headers, info, file_name).unwrap();

        let resolution = Negotiator::new(&transport, &FixedChooser(1))
            .negotiate(&mut session)
            .await
            .unwrap();
        assert_eq!(resolution, "1920x1080");

        let calls = transport.calls();
        let pings: Vec<_> = calls
            .iter()
            .filter(|c| c.url.path() == "/.drm/ABC/ping")
            .collect();
        assert_eq!(calls.len(), 1 + 4 + 8);
        assert_eq!(pings.len(), 9);
        assert!(pings[1..].iter().all(|c| c.url.query().unwrap().ends_with("chosen_res=1080")));
        assert_eq!(calls[0].url.host_str(), Some("iframe.mediadelivery.net"));
        assert_eq!(calls[1].url.host_str(), Some("video-sv9.mediadelivery.net"));

        let handoff = Handoff::new(&session, PathBuf::from("/tmp/out"))
            .unwrap()
            .with_cookies(&transport);
        assert_eq!(
            handoff.url,
            "https://iframe.mediadelivery.net/guid-7/1920x1080/video.drm?contextId=ABC"
        );
        assert_eq!(handoff.output_path(), PathBuf::from("/tmp/out/My Video.mp4"));
        assert!(handoff.headers.contains(&("Cookie".to_string(), "sid=s3ss10n".to_string())));
    }
}
