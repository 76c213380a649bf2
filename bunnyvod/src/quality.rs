use std::fmt;

/// Known video standard for a pixel height.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QualitySpec {
    pub label: &'static str,
    pub name: &'static str,
    pub resolution: &'static str,
    pub bitrate: &'static str,
}

const QUALITY_SPECS: &[QualitySpec] = &[
    QualitySpec { label: "2160p", name: "4K UHD", resolution: "3840x2160", bitrate: "35-45 Mbps" },
    QualitySpec { label: "1440p", name: "2K QHD", resolution: "2560x1440", bitrate: "16-24 Mbps" },
    QualitySpec { label: "1080p", name: "Full HD", resolution: "1920x1080", bitrate: "8-12 Mbps" },
    QualitySpec { label: "720p", name: "HD", resolution: "1280x720", bitrate: "5-7.5 Mbps" },
    QualitySpec { label: "480p", name: "SD", resolution: "854x480", bitrate: "2.5-4 Mbps" },
    QualitySpec { label: "360p", name: "LD", resolution: "640x360", bitrate: "1-1.5 Mbps" },
    QualitySpec { label: "240p", name: "Very LD", resolution: "426x240", bitrate: "0.5-0.7 Mbps" },
];

/// Height part of a `WxH` token. Tokens without an `x` are returned whole.
pub fn height_of(resolution: &str) -> &str {
    resolution.rsplit('x').next().unwrap_or(resolution)
}

pub fn lookup(height: &str) -> Option<&'static QualitySpec> {
    let label = format!("{}p", height);
    QUALITY_SPECS.iter().find(|spec| spec.label == label)
}

/// One numbered entry of the resolution picker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QualityOption {
    pub index: usize,
    pub height_label: String,
    pub descriptive_name: Option<&'static str>,
    pub resolution: String,
    pub bitrate_range: Option<&'static str>,
}

impl QualityOption {
    pub fn new(index: usize, resolution: &str) -> Self {
        let height = height_of(resolution);
        let spec = lookup(height);
        QualityOption {
            index,
            height_label: format!("{}p", height),
            descriptive_name: spec.map(|s| s.name),
            resolution: spec
                .map(|s| s.resolution.to_string())
                .unwrap_or_else(|| resolution.to_string()),
            bitrate_range: spec.map(|s| s.bitrate),
        }
    }
}

impl fmt::Display for QualityOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.descriptive_name, self.bitrate_range) {
            (Some(name), Some(bitrate)) => write!(
                f,
                "{} ({}) - Resolution: {}, Bitrate: {}",
                self.height_label, name, self.resolution, bitrate
            ),
            _ => write!(f, "{} - Resolution: {}", self.height_label, self.resolution),
        }
    }
}

/// Number the resolutions from 1, in the order given.
pub fn options(resolutions: &[String]) -> Vec<QualityOption> {
    resolutions
        .iter()
        .enumerate()
        .map(|(i, res)| QualityOption::new(i + 1, res))
        .collect()
}
