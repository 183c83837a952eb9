use chrono::{DateTime, NaiveDate, NaiveDateTime};

/// How a pattern's trailing zone is handled.
#[derive(Debug, Clone, Copy)]
enum Zone {
    /// Numeric offset parsed with `%z` (`+0000`, `-05:00`).
    Offset,
    /// Alphabetic abbreviation (`GMT`, `UTC`, `EST`) that is dropped; the
    /// wall-clock date is kept.
    Name,
    /// No zone at all.
    None,
}

/// Date layouts tried in order; the first that parses wins.
///
/// RFC 822 layouts are matched after any leading `Www,` weekday is removed,
/// since chrono rejects a weekday that disagrees with the date and feeds get
/// that wrong often enough to matter.
const PATTERNS: [(&str, Zone); 5] = [
    ("%d %b %Y %H:%M:%S %z", Zone::Offset),
    ("%d %b %Y %H:%M:%S", Zone::Name),
    ("%d %b %Y %H:%M:%S", Zone::None),
    ("%Y-%m-%dT%H:%M:%S%z", Zone::Offset),
    ("%Y-%m-%dT%H:%M:%S", Zone::None),
];

/// Parses an RSS `pubDate` into the calendar date it names.
///
/// The date is taken in the timezone the feed wrote it in (no conversion to
/// UTC). Returns `None` for empty or unrecognized input; never panics.
///
/// ```
/// use podcrawler::feed::parse_pub_date;
///
/// let date = parse_pub_date("Mon, 02 Jan 2023 15:04:05 +0000").unwrap();
/// assert_eq!(date.to_string(), "2023-01-02");
/// assert!(parse_pub_date("not a date").is_none());
/// ```
pub fn parse_pub_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    let text = strip_weekday(raw);

    PATTERNS
        .iter()
        .find_map(|(format, zone)| parse_with(text, format, *zone))
        .or_else(|| DateTime::parse_from_rfc3339(text).ok().map(|dt| dt.date_naive()))
}

/// [`parse_pub_date`] rendered as `YYYY-MM-DD`, or `""` when unparsable.
pub fn normalize_pub_date(raw: &str) -> String {
    parse_pub_date(raw)
        .map(|date| date.format("%Y-%m-%d").to_string())
        .unwrap_or_default()
}

fn parse_with(text: &str, format: &str, zone: Zone) -> Option<NaiveDate> {
    match zone {
        Zone::Offset => DateTime::parse_from_str(text, format)
            .ok()
            .map(|dt| dt.date_naive()),
        Zone::Name => {
            let (stamp, name) = text.rsplit_once(' ')?;
            if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphabetic()) {
                return None;
            }
            NaiveDateTime::parse_from_str(stamp.trim_end(), format)
                .ok()
                .map(|dt| dt.date())
        }
        Zone::None => NaiveDateTime::parse_from_str(text, format)
            .ok()
            .map(|dt| dt.date()),
    }
}

/// Drops a leading three-letter weekday and its comma (`"Mon, "`).
fn strip_weekday(text: &str) -> &str {
    match text.split_once(',') {
        Some((day, rest)) if day.len() == 3 && day.chars().all(|c| c.is_ascii_alphabetic()) => {
            rest.trim_start()
        }
        _ => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rfc822_with_numeric_offset() {
        assert_eq!(normalize_pub_date("Mon, 02 Jan 2023 15:04:05 +0000"), "2023-01-02");
        assert_eq!(normalize_pub_date("Tue, 10 Oct 2023 23:30:00 -0500"), "2023-10-10");
    }

    #[test]
    fn test_date_kept_in_feed_timezone() {
        // 23:30 at -05:00 is already the 11th in UTC; the feed's own date wins
        assert_eq!(normalize_pub_date("Tue, 10 Oct 2023 23:30:00 -0500"), "2023-10-10");
    }

    #[test]
    fn test_rfc822_with_zone_name() {
        assert_eq!(normalize_pub_date("Wed, 15 Mar 2023 08:00:00 GMT"), "2023-03-15");
        assert_eq!(normalize_pub_date("Wed, 15 Mar 2023 08:00:00 EST"), "2023-03-15");
    }

    #[test]
    fn test_rfc822_without_zone() {
        assert_eq!(normalize_pub_date("Fri, 01 Dec 2023 12:00:00"), "2023-12-01");
    }

    #[test]
    fn test_rfc822_without_weekday() {
        assert_eq!(normalize_pub_date("02 Jan 2023 15:04:05 +0100"), "2023-01-02");
    }

    #[test]
    fn test_wrong_weekday_still_parses() {
        // 2 Jan 2023 was a Monday
        assert_eq!(normalize_pub_date("Fri, 02 Jan 2023 15:04:05 +0000"), "2023-01-02");
    }

    #[test]
    fn test_iso8601_variants() {
        assert_eq!(normalize_pub_date("2023-06-30T10:00:00+0200"), "2023-06-30");
        assert_eq!(normalize_pub_date("2023-06-30T10:00:00+02:00"), "2023-06-30");
        assert_eq!(normalize_pub_date("2023-06-30T10:00:00Z"), "2023-06-30");
        assert_eq!(normalize_pub_date("2023-06-30T10:00:00"), "2023-06-30");
    }

    #[test]
    fn test_surrounding_whitespace_ignored() {
        assert_eq!(normalize_pub_date("  Mon, 02 Jan 2023 15:04:05 +0000\n"), "2023-01-02");
    }

    #[test]
    fn test_unparsable_dates_normalize_to_empty() {
        for raw in [
            "",
            "   ",
            "not a date",
            "yesterday",
            "2023-13-45T00:00:00",
            "Mon, 32 Jan 2023 15:04:05 +0000",
            "Mon,",
        ] {
            assert_eq!(normalize_pub_date(raw), "", "input: {raw:?}");
        }
    }
}
