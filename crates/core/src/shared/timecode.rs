/// Formats seconds as `HH:MM:SS`, truncating fractional seconds.
///
/// Negative and non-finite inputs format as `00:00:00`. Hours are not
/// wrapped, so a 30 hour video formats as `30:00:00`.
pub fn format_timestamp(seconds: f64) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 {
        seconds as u64
    } else {
        0
    };
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let secs = total % 60;
    format!("{hours:02}:{minutes:02}:{secs:02}")
}
