//! `ping` output grammar
//!
//! Extracts per-reply round-trip times, the summary line and packet loss from
//! the text printed by iputils `ping` (Linux) and BSD/macOS `ping`:
//!
//! ```text
//! 64 bytes from 10.0.1.10: icmp_seq=1 ttl=64 time=0.412 ms
//! --- 10.0.1.10 ping statistics ---
//! 100 packets transmitted, 100 received, 0% packet loss, time 19804ms
//! rtt min/avg/max/mdev = 0.321/0.456/0.789/0.044 ms
//! ```
//!
//! BSD prints `round-trip min/avg/max/stddev = ...` and `N packets received`.
//! Replies reported as `time<1 ms` only carry an upper bound and are not
//! counted as samples.
//! Output with none of these yields an empty [`ProbeOutput`] carrying the raw
//! text, which the executor reports as a parse failure.

use super::{ProbeOutput, ReportedStats};
use regex::Regex;
use std::sync::OnceLock;

fn reply_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"time=\s*([0-9]+(?:\.[0-9]+)?)\s*ms").expect("valid reply regex")
    })
}

fn summary_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?:rtt|round-trip)\s+min/avg/max/(?:mdev|stddev)\s*=\s*([0-9.]+)/([0-9.]+)/([0-9.]+)/([0-9.]+)\s*ms",
        )
        .expect("valid summary regex")
    })
}

fn received_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\d+)\s+(?:packets\s+)?received").expect("valid received regex"))
}

fn loss_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"([0-9]+(?:\.[0-9]+)?)%\s+packet loss").expect("valid loss regex")
    })
}

/// Parse `ping` output into a probe outcome
pub fn parse_ping_output(text: &str) -> ProbeOutput {
    let samples = reply_regex()
        .captures_iter(text)
        .filter_map(|caps| caps[1].parse::<f64>().ok())
        .collect();

    let reported = summary_regex().captures(text).and_then(|caps| {
        Some(ReportedStats {
            min_ms: caps[1].parse().ok()?,
            avg_ms: caps[2].parse().ok()?,
            max_ms: caps[3].parse().ok()?,
            deviation_ms: caps[4].parse().ok()?,
        })
    });

    let received = received_regex()
        .captures(text)
        .and_then(|caps| caps[1].parse().ok());

    let packet_loss_pct = loss_regex()
        .captures(text)
        .and_then(|caps| caps[1].parse().ok());

    ProbeOutput {
        samples,
        reported,
        received,
        packet_loss_pct,
        raw_text: text.to_string(),
    }
}
