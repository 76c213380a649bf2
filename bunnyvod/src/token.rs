use md5::{Digest, Md5};

/// Render a playback position the way the player does: `0`, `4.123456`.
pub fn format_time(time: f64) -> String {
    format!("{}", time)
}

/// Keyed fingerprint for ping calls.
///
/// The hash input is `{secret}_{context_id}_{time}_{paused}_{height}`. The server
/// recomputes it, so the field order and separators have to stay exactly like this.
pub fn fingerprint(secret: &str, context_id: &str, time: f64, paused: bool, height: &str) -> String {
    let mut hasher = Md5::new();
    hasher.update(
        format!(
            "{}_{}_{}_{}_{}",
            secret,
            context_id,
            format_time(time),
            paused,
            height
        )
        .as_bytes(),
    );
    format!("{:x}", hasher.finalize())
}
