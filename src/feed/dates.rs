use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

use crate::xml::Element;

/// Converts an ISO-8601 timestamp to the RFC 2822 form RSS expects.
///
/// Accepts RFC 3339 date-times, naive date-times (`T` or space separated)
/// and plain dates. Naive values are taken as UTC. Returns `None` for
/// anything else, including values that are already RFC 2822.
pub fn iso_to_rfc2822(iso: &str) -> Option<String> {
    let iso = iso.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(iso) {
        return Some(dt.to_rfc2822());
    }

    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(iso, format) {
            return Some(naive.and_utc().to_rfc2822());
        }
    }

    NaiveDate::parse_from_str(iso, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc().to_rfc2822())
}

/// RFC 2822 timestamp for `lastBuildDate`.
pub fn build_date(now: DateTime<Utc>) -> String {
    now.to_rfc2822()
}

/// Rewrites an item's ISO-8601 `pubDate` in place. Other values are kept.
pub fn normalize_pub_date(item: &mut Element) {
    let Some(pub_date) = item.child_mut("pubDate") else {
        return;
    };
    let current = pub_date.text();
    if let Some(converted) = iso_to_rfc2822(&current) {
        tracing::debug!(from = %current.trim(), to = %converted, "Normalized pubDate");
        pub_date.set_text(converted);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_rfc3339_keeps_offset() {
        assert_eq!(
            iso_to_rfc2822("2025-11-06T08:30:00+02:00").as_deref(),
            Some("Thu, 6 Nov 2025 08:30:00 +0200")
        );
    }

    #[test]
    fn test_naive_datetime_is_utc() {
        assert_eq!(
            iso_to_rfc2822("2025-11-06T08:30:00").as_deref(),
            Some("Thu, 6 Nov 2025 08:30:00 +0000")
        );
    }

    #[test]
    fn test_plain_date_is_midnight_utc() {
        assert_eq!(
            iso_to_rfc2822("2025-11-06").as_deref(),
            Some("Thu, 6 Nov 2025 00:00:00 +0000")
        );
    }

    #[test]
    fn test_rfc2822_input_is_not_iso() {
        assert_eq!(iso_to_rfc2822("Thu, 6 Nov 2025 00:00:00 +0000"), None);
        assert_eq!(iso_to_rfc2822("yesterday"), None);
    }

    #[test]
    fn test_build_date_format() {
        let now = Utc.with_ymd_and_hms(2026, 10, 19, 6, 0, 0).unwrap();
        assert_eq!(build_date(now), "Mon, 19 Oct 2026 06:00:00 +0000");
    }

    #[test]
    fn test_normalize_pub_date_in_item() {
        let mut item = Element::new("item");
        item.children.push(crate::xml::Node::Element(Element::with_text(
            "pubDate",
            "2025-11-06",
        )));
        normalize_pub_date(&mut item);
        assert_eq!(
            item.child_text("pubDate").as_deref(),
            Some("Thu, 6 Nov 2025 00:00:00 +0000")
        );
    }
}
