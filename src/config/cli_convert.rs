//! CLI to Config conversion utilities

use crate::config::cli;
use crate::mesh::SymmetryMode;
use anyhow::{Context, Result};
use std::time::Duration;

/// Parse a duration string (e.g., "500ms", "60s", "5m", "1h")
///
/// A bare number is taken as seconds.
pub fn parse_duration(s: &str) -> Result<Duration> {
    let s = s.trim().to_lowercase();

    let (num_str, unit_ms) = if let Some(n) = s.strip_suffix("ms") {
        (n, 1u64)
    } else if let Some(n) = s.strip_suffix("sec") {
        (n, 1_000)
    } else if let Some(n) = s.strip_suffix("min") {
        (n, 60_000)
    } else if let Some(n) = s.strip_suffix("hr") {
        (n, 3_600_000)
    } else if let Some(n) = s.strip_suffix('s') {
        (n, 1_000)
    } else if let Some(n) = s.strip_suffix('m') {
        (n, 60_000)
    } else if let Some(n) = s.strip_suffix('h') {
        (n, 3_600_000)
    } else {
        (s.as_str(), 1_000)
    };

    let num: u64 = num_str
        .trim()
        .parse()
        .with_context(|| format!("Invalid duration format: {}", s))?;

    let millis = num
        .checked_mul(unit_ms)
        .with_context(|| format!("Duration out of range: {}", s))?;

    Ok(Duration::from_millis(millis))
}

/// Convert CLI Symmetry to mesh SymmetryMode
pub fn convert_symmetry(cli_symmetry: cli::Symmetry) -> SymmetryMode {
    match cli_symmetry {
        cli::Symmetry::FullMeshDirected => SymmetryMode::FullMeshDirected,
        cli::Symmetry::UniqueUndirected => SymmetryMode::UniqueUndirected,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_duration_seconds() {
        assert_eq!(parse_duration("60").unwrap(), Duration::from_secs(60));
        assert_eq!(parse_duration("60s").unwrap(), Duration::from_secs(60));
        assert_eq!(parse_duration("60sec").unwrap(), Duration::from_secs(60));
    }

    #[test]
    fn test_parse_duration_millis() {
        assert_eq!(parse_duration("500ms").unwrap(), Duration::from_millis(500));
        assert_eq!(parse_duration(" 200MS ").unwrap(), Duration::from_millis(200));
    }

    #[test]
    fn test_parse_duration_minutes() {
        assert_eq!(parse_duration("5m").unwrap(), Duration::from_secs(300));
        assert_eq!(parse_duration("5min").unwrap(), Duration::from_secs(300));
    }

    #[test]
    fn test_parse_duration_hours() {
        assert_eq!(parse_duration("1h").unwrap(), Duration::from_secs(3600));
        assert_eq!(parse_duration("2hr").unwrap(), Duration::from_secs(7200));
    }

    #[test]
    fn test_parse_duration_invalid() {
        assert!(parse_duration("fast").is_err());
        assert!(parse_duration("").is_err());
        assert!(parse_duration("-5s").is_err());
    }

    #[test]
    fn test_parse_duration_overflow() {
        let err = parse_duration("10000000000000000h").unwrap_err();
        assert!(err.to_string().contains("out of range"));
        assert!(parse_duration("18446744073709551615ms").is_ok());
        assert!(parse_duration("18446744073709551615s").is_err());
    }

    #[test]
    fn test_convert_symmetry() {
        assert_eq!(
            convert_symmetry(cli::Symmetry::UniqueUndirected),
            SymmetryMode::UniqueUndirected
        );
        assert_eq!(
            convert_symmetry(cli::Symmetry::FullMeshDirected),
            SymmetryMode::FullMeshDirected
        );
    }
}
