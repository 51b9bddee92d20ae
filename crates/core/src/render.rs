//! Fallback rendering shared by the context builder and the prompt composer.
//!
//! Absent or blank values always render as [`UNKNOWN`]; no other module writes
//! the placeholder itself.

use chrono::{DateTime, Utc};

use crate::domain::webhook::{Affiliation, Party};

pub const UNKNOWN: &str = "Unknown";

pub fn or_unknown(value: Option<&str>) -> String {
    value.map(str::trim).filter(|text| !text.is_empty()).unwrap_or(UNKNOWN).to_string()
}

/// `1834` seconds renders as `30m 34s`; calls of an hour or more include hours.
pub fn duration_or_unknown(seconds: Option<u64>) -> String {
    let Some(total) = seconds else {
        return UNKNOWN.to_string();
    };

    let hours = total / 3_600;
    let minutes = (total % 3_600) / 60;
    let secs = total % 60;
    if hours > 0 {
        format!("{hours}h {minutes}m {secs}s")
    } else {
        format!("{minutes}m {secs}s")
    }
}

/// RFC 3339 timestamps render as `2026-10-01 15:00 UTC`; anything else that is
/// non-blank is passed through unchanged.
pub fn timestamp_or_unknown(value: Option<&str>) -> String {
    let Some(raw) = value.map(str::trim).filter(|text| !text.is_empty()) else {
        return UNKNOWN.to_string();
    };

    match DateTime::parse_from_rfc3339(raw) {
        Ok(parsed) => parsed.with_timezone(&Utc).format("%Y-%m-%d %H:%M UTC").to_string(),
        Err(_) => raw.to_string(),
    }
}

/// Millisecond offset from call start as `[mm:ss]`.
pub fn offset_or_unknown(millis: Option<u64>) -> String {
    match millis {
        Some(ms) => {
            let total = ms / 1_000;
            format!("[{:02}:{:02}]", total / 60, total % 60)
        }
        None => format!("[{UNKNOWN}]"),
    }
}

pub fn affiliation_label(affiliation: Option<Affiliation>) -> String {
    match affiliation {
        Some(Affiliation::Internal) => "Internal".to_string(),
        Some(Affiliation::External) => "External".to_string(),
        Some(Affiliation::Unknown) | None => UNKNOWN.to_string(),
    }
}

/// `Name, Title (Affiliation)` with every missing part replaced.
pub fn party_label(party: &Party) -> String {
    format!(
        "{}, {} ({})",
        or_unknown(party.name.as_deref()),
        or_unknown(party.title.as_deref()),
        affiliation_label(party.affiliation)
    )
}

#[cfg(test)]
mod tests {
    use super::{
        duration_or_unknown, offset_or_unknown, or_unknown, party_label, timestamp_or_unknown,
        UNKNOWN,
    };
    use crate::domain::webhook::{Affiliation, Party};

    #[test]
    fn blank_and_missing_values_render_unknown() {
        assert_eq!(or_unknown(None), UNKNOWN);
        assert_eq!(or_unknown(Some("   ")), UNKNOWN);
        assert_eq!(or_unknown(Some(" Zoom ")), "Zoom");
    }

    #[test]
    fn durations_render_compactly() {
        assert_eq!(duration_or_unknown(Some(1_834)), "30m 34s");
        assert_eq!(duration_or_unknown(Some(3_725)), "1h 2m 5s");
        assert_eq!(duration_or_unknown(Some(0)), "0m 0s");
        assert_eq!(duration_or_unknown(None), UNKNOWN);
    }

    #[test]
    fn timestamps_normalize_to_utc_or_pass_through() {
        assert_eq!(timestamp_or_unknown(Some("2026-10-01T17:00:00+02:00")), "2026-10-01 15:00 UTC");
        assert_eq!(timestamp_or_unknown(Some("next tuesday")), "next tuesday");
        assert_eq!(timestamp_or_unknown(Some("")), UNKNOWN);
    }

    #[test]
    fn offsets_render_minutes_and_seconds() {
        assert_eq!(offset_or_unknown(Some(460_230)), "[07:40]");
        assert_eq!(offset_or_unknown(None), "[Unknown]");
    }

    #[test]
    fn party_label_falls_back_per_field() {
        let complete = Party {
            name: Some("Ada Lovelace".to_string()),
            title: Some("AE".to_string()),
            affiliation: Some(Affiliation::Internal),
            ..Party::default()
        };
        assert_eq!(party_label(&complete), "Ada Lovelace, AE (Internal)");

        let sparse = Party { name: Some("Grace".to_string()), ..Party::default() };
        assert_eq!(party_label(&sparse), "Grace, Unknown (Unknown)");

        assert_eq!(party_label(&Party::default()), "Unknown, Unknown (Unknown)");
    }
}
