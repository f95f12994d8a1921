//! Duration literal parsing.

/// Parses a duration literal into minutes.
///
/// Accepted forms are `Nmin`, `Nhr`, `Nh` and `Nh Mmin`, optionally prefixed
/// with `-`. `N` may carry a decimal part; the minutes of the compound form
/// must be a whole number.
///
/// ```rust
/// use zman_syntax::parse_duration;
///
/// assert_eq!(parse_duration("72min"), Some(72.0));
/// assert_eq!(parse_duration("1h 30min"), Some(90.0));
/// assert_eq!(parse_duration("-1.5h"), Some(-90.0));
/// assert_eq!(parse_duration("72"), None);
/// ```
pub fn parse_duration(text: &str) -> Option<f64> {
    let text = text.trim();
    if let Some(rest) = text.strip_prefix('-') {
        if rest.starts_with('-') {
            return None;
        }
        return parse_duration(rest).map(|m| -m);
    }

    let (value, suffix) = split_number(text)?;
    match suffix {
        "min" => Some(value),
        "hr" | "h" => Some(value * 60.0),
        s => {
            let rest = s.strip_prefix('h')?;
            if !rest.starts_with(char::is_whitespace) {
                return None;
            }
            let (minutes, tail) = split_number(rest.trim_start())?;
            if tail != "min" || minutes.fract() != 0.0 {
                return None;
            }
            Some(value * 60.0 + minutes)
        }
    }
}

fn split_number(s: &str) -> Option<(f64, &str)> {
    let end = s
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(s.len());
    if end == 0 {
        return None;
    }
    let value = s[..end].parse::<f64>().ok()?;
    Some((value, &s[end..]))
}
