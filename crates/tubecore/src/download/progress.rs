//! Progress events produced by download sources.

use crate::download::resolution::Resolution;

/// One progress sample of a running download
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceProgress {
    pub percent: u8,
    /// Bytes per second
    pub speed_bps: Option<f64>,
    pub eta_seconds: Option<u64>,
    pub downloaded_bytes: Option<u64>,
    pub total_bytes: Option<u64>,
}

/// Events a download source emits while working on a request.
#[derive(Debug, Clone, PartialEq)]
pub enum DownloadEvent {
    /// Metadata became known
    Metadata { title: String, duration_secs: Option<u64> },
    /// Requested resolution was missing and a substitute is used
    ResolutionFallback { requested: Resolution, chosen: Resolution },
    Progress(SourceProgress),
}

/// Parses progress from a yt-dlp output line
/// Example: "[download]  45.2% of 10.00MiB at 500.00KiB/s ETA 00:10"
pub fn parse_progress(line: &str) -> Option<SourceProgress> {
    if !line.contains("[download]") {
        return None;
    }

    // "[download] Destination: ..." and friends
    if !line.contains('%') {
        log::trace!("Download line without percent: {}", line);
        return None;
    }

    let mut percent = None;
    let mut speed_bps = None;
    let mut eta_seconds = None;
    let mut total_bytes = None;

    let parts: Vec<&str> = line.split_whitespace().collect();
    for (i, part) in parts.iter().enumerate() {
        let next = parts.get(i + 1).copied();
        match *part {
            "of" => total_bytes = next.and_then(parse_size),
            "at" => speed_bps = next.and_then(parse_size).map(|s| s as f64),
            "ETA" => eta_seconds = next.and_then(parse_eta),
            p if p.ends_with('%') => {
                if let Ok(value) = p.trim_end_matches('%').parse::<f32>() {
                    // Garbage values must not jump the bar to 100%
                    percent = Some(value.clamp(0.0, 100.0) as u8);
                }
            }
            _ => {}
        }
    }

    let percent = percent?;
    let downloaded_bytes = total_bytes.map(|total| (total as f64 * (f64::from(percent) / 100.0)) as u64);

    Some(SourceProgress {
        percent,
        speed_bps,
        eta_seconds,
        downloaded_bytes,
        total_bytes,
    })
}

/// Parses sizes like "10.00MiB", "~1.2GiB" or "500.00KiB/s" into bytes
fn parse_size(size_str: &str) -> Option<u64> {
    let size_str = size_str.trim_start_matches('~').trim_end_matches("/s");
    let units: [(&str, f64); 7] = [
        ("GiB", 1024.0 * 1024.0 * 1024.0),
        ("MiB", 1024.0 * 1024.0),
        ("KiB", 1024.0),
        ("GB", 1000.0 * 1000.0 * 1000.0),
        ("MB", 1000.0 * 1000.0),
        ("KB", 1000.0),
        ("B", 1.0),
    ];
    units.iter().find_map(|(suffix, factor)| {
        size_str
            .strip_suffix(suffix)
            .and_then(|num| num.parse::<f64>().ok())
            .map(|value| (value * factor) as u64)
    })
}

/// Parses ETA like "00:10", "1:23" or "1:02:03"
fn parse_eta(eta_str: &str) -> Option<u64> {
    let mut total = 0u64;
    let mut count = 0;
    for part in eta_str.split(':') {
        total = total * 60 + part.parse::<u64>().ok()?;
        count += 1;
    }
    (1..=3).contains(&count).then_some(total)
}
