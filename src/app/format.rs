use chrono::{Local, TimeZone};

pub(crate) fn truncate(s: &str, max: usize) -> String {
    let mut out = s.to_string();
    if out.chars().count() > max {
        out = out.chars().take(max.saturating_sub(3)).collect::<String>() + "...";
    }
    out
}

/// `m:ss` below an hour, `h:mm:ss` above.
pub(crate) fn format_clock(secs: f64) -> String {
    if !secs.is_finite() || secs < 0.0 {
        return "--:--".to_string();
    }
    let total = secs.floor() as u64;
    let (hours, minutes, seconds) = (total / 3600, (total % 3600) / 60, total % 60);
    if hours > 0 {
        format!("{hours}:{minutes:02}:{seconds:02}")
    } else {
        format!("{minutes}:{seconds:02}")
    }
}

pub(crate) fn format_timestamp(millis: i64) -> String {
    Local
        .timestamp_millis_opt(millis)
        .single()
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "-".to_string())
}

pub(crate) fn resume_text(current_time: Option<f64>, duration: Option<f64>) -> String {
    match (current_time, duration) {
        (Some(time), Some(duration)) if duration > 0.0 => {
            format!("{} / {}", format_clock(time), format_clock(duration))
        }
        (Some(time), _) => format_clock(time),
        _ => "-".to_string(),
    }
}

pub(crate) fn build_progress_gauge(position: f64, duration: f64) -> Option<(f64, String)> {
    if !duration.is_finite() || duration <= 0.0 {
        return None;
    }
    let ratio = (position / duration).clamp(0.0, 1.0);
    Some((
        ratio,
        format!("{} / {}", format_clock(position), format_clock(duration)),
    ))
}
