//! Stateless parsing of the transcoder's progress stream.
//!
//! The transcoder interleaves stats lines of the form
//! `frame= 2000 fps= 25 ... time=00:01:23.45 ... speed=1.5x` with unrelated
//! status chatter. Lines that do not match yield `None` and are silently
//! skipped. Two free-text banners mark phase transitions independently of the
//! timed format; phase is decided here, once, as a closed enum -- downstream
//! code never re-sniffs message text.

/// Phase transition signalled by a banner line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseHint {
    /// Stream-mapping announcement: input analysis is underway.
    Analyzing,
    /// Stop-hint banner: encoding output is about to start.
    Converting,
}

/// One structured result extracted from a single output line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ProgressLine {
    /// A timed stats sample.
    Timed {
        /// Elapsed media time in seconds.
        elapsed_secs: f64,
        /// The tool's own reported speed multiplier, when present.
        speed: Option<f64>,
    },
    /// A phase-only update from a banner line.
    Phase(PhaseHint),
}

/// Parse one line of transcoder output.
pub fn parse_line(line: &str) -> Option<ProgressLine> {
    if line.contains("Stream mapping:") {
        return Some(ProgressLine::Phase(PhaseHint::Analyzing));
    }
    if line.contains("Press [q] to stop") {
        return Some(ProgressLine::Phase(PhaseHint::Converting));
    }

    let elapsed_secs = parse_clock(field_after(line, "time=")?)?;
    let speed = field_after(line, "speed=").and_then(parse_speed);

    Some(ProgressLine::Timed {
        elapsed_secs,
        speed,
    })
}

/// The whitespace-delimited token following `key` in `line`. The transcoder
/// pads some values with spaces after the `=`, so leading whitespace is
/// skipped.
fn field_after<'a>(line: &'a str, key: &str) -> Option<&'a str> {
    let start = line.find(key)? + key.len();
    let rest = line[start..].trim_start();
    let end = rest
        .find(char::is_whitespace)
        .unwrap_or(rest.len());
    if end == 0 {
        return None;
    }
    Some(&rest[..end])
}

/// Convert `HH:MM:SS.hh` into total seconds.
fn parse_clock(field: &str) -> Option<f64> {
    let mut parts = field.split(':');
    let hours: f64 = parts.next()?.parse().ok()?;
    let minutes: f64 = parts.next()?.parse().ok()?;
    let seconds: f64 = parts.next()?.parse().ok()?;
    if parts.next().is_some() {
        return None;
    }
    Some(hours * 3600.0 + minutes * 60.0 + seconds)
}

/// Parse a `<float>x` speed field. `N/A` and malformed values yield `None`.
fn parse_speed(field: &str) -> Option<f64> {
    field.strip_suffix('x')?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    const STATS_LINE: &str =
        "frame= 2087 fps= 25 q=28.0 size=     512kB time=00:01:23.45 bitrate=  50.3kbits/s speed=1.5x";

    #[test]
    fn stats_line_yields_elapsed_and_speed() {
        let parsed = parse_line(STATS_LINE).unwrap();
        match parsed {
            ProgressLine::Timed {
                elapsed_secs,
                speed,
            } => {
                assert!((elapsed_secs - 83.45).abs() < 1e-9);
                assert_eq!(speed, Some(1.5));
            }
            other => panic!("unexpected parse: {other:?}"),
        }
    }

    #[test]
    fn speed_with_padded_value() {
        let parsed = parse_line("time=00:00:10.00 bitrate=N/A speed=  0.98x").unwrap();
        assert_eq!(
            parsed,
            ProgressLine::Timed {
                elapsed_secs: 10.0,
                speed: Some(0.98),
            }
        );
    }

    #[test]
    fn missing_speed_is_none() {
        let parsed = parse_line("size=  128kB time=01:00:00.00 bitrate= 1.2kbits/s").unwrap();
        assert_eq!(
            parsed,
            ProgressLine::Timed {
                elapsed_secs: 3600.0,
                speed: None,
            }
        );
    }

    #[test]
    fn not_available_speed_is_none() {
        let parsed = parse_line("time=00:00:01.00 speed=N/A").unwrap();
        assert_eq!(
            parsed,
            ProgressLine::Timed {
                elapsed_secs: 1.0,
                speed: None,
            }
        );
    }

    #[test]
    fn not_available_time_is_skipped() {
        assert_eq!(parse_line("time=N/A bitrate=N/A speed=N/A"), None);
    }

    #[test]
    fn chatter_lines_are_skipped() {
        assert_eq!(parse_line(""), None);
        assert_eq!(parse_line("Input #0, matroska,webm, from 'in.mkv':"), None);
        assert_eq!(parse_line("  Metadata:"), None);
        assert_eq!(
            parse_line("[libx264 @ 0x7f8] using cpu capabilities: MMX2 SSE2"),
            None
        );
    }

    #[test]
    fn stream_mapping_banner_is_analyzing() {
        assert_eq!(
            parse_line("Stream mapping:"),
            Some(ProgressLine::Phase(PhaseHint::Analyzing))
        );
    }

    #[test]
    fn stop_hint_banner_is_converting() {
        assert_eq!(
            parse_line("Press [q] to stop, [?] for help"),
            Some(ProgressLine::Phase(PhaseHint::Converting))
        );
    }

    #[test]
    fn clock_requires_three_components() {
        assert_eq!(parse_line("time=12.5 speed=1x"), None);
        assert_eq!(parse_line("time=00:01:02:03 speed=1x"), None);
    }

    #[test]
    fn hundredths_are_preserved() {
        let parsed = parse_line("time=02:15:07.89 speed=12.3x").unwrap();
        match parsed {
            ProgressLine::Timed { elapsed_secs, .. } => {
                assert!((elapsed_secs - (2.0 * 3600.0 + 15.0 * 60.0 + 7.89)).abs() < 1e-9);
            }
            other => panic!("unexpected parse: {other:?}"),
        }
    }
}
