/// Human readable rendering of a duration in seconds, used in log lines.
///
/// `45` -> `45s`, `125` -> `2m 5s`, `120` -> `2m`, `3780` -> `1h 3m`, `3600` -> `1h`.
pub fn format_duration(seconds: i64) -> String {
    let seconds = seconds.max(0);
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;

    match (hours, minutes, secs) {
        (0, 0, secs) => format!("{}s", secs),
        (0, minutes, 0) => format!("{}m", minutes),
        (0, minutes, secs) => format!("{}m {}s", minutes, secs),
        (hours, 0, _) => format!("{}h", hours),
        (hours, minutes, _) => format!("{}h {}m", hours, minutes),
    }
}
