//! Area-code timezone resolution for NANP phone numbers.
//!
//! Maps the 3-digit area code to a fixed UTC offset (standard time).
//! Unknown area codes return None — callers must treat that as
//! "calling hours unverifiable" and deny.

use chrono::{DateTime, FixedOffset, Utc};

/// UTC offset hours per NANP area code, standard time.
/// Covers the continental US zones plus Alaska and Hawaii.
const AREA_CODE_OFFSETS: &[(&str, i32)] = &[
    // Eastern (UTC-5)
    ("201", -5), ("202", -5), ("203", -5), ("207", -5), ("212", -5),
    ("215", -5), ("216", -5), ("240", -5), ("267", -5), ("301", -5),
    ("305", -5), ("315", -5), ("321", -5), ("347", -5), ("404", -5),
    ("407", -5), ("410", -5), ("412", -5), ("434", -5), ("443", -5),
    ("470", -5), ("475", -5), ("484", -5), ("516", -5), ("518", -5),
    ("561", -5), ("571", -5), ("585", -5), ("607", -5), ("610", -5),
    ("617", -5), ("631", -5), ("646", -5), ("678", -5), ("703", -5),
    ("704", -5), ("716", -5), ("717", -5), ("718", -5), ("727", -5),
    ("732", -5), ("757", -5), ("770", -5), ("786", -5), ("803", -5),
    ("804", -5), ("813", -5), ("845", -5), ("856", -5), ("860", -5),
    ("862", -5), ("904", -5), ("908", -5), ("914", -5), ("917", -5),
    ("919", -5), ("929", -5), ("941", -5), ("954", -5), ("973", -5),
    // Central (UTC-6)
    ("205", -6), ("210", -6), ("214", -6), ("225", -6), ("251", -6),
    ("254", -6), ("281", -6), ("312", -6), ("314", -6), ("316", -6),
    ("318", -6), ("331", -6), ("402", -6), ("405", -6), ("414", -6),
    ("417", -6), ("469", -6), ("501", -6), ("504", -6), ("512", -6),
    ("515", -6), ("531", -6), ("601", -6), ("608", -6), ("612", -6),
    ("615", -6), ("630", -6), ("651", -6), ("682", -6), ("708", -6),
    ("713", -6), ("731", -6), ("763", -6), ("773", -6), ("815", -6),
    ("816", -6), ("817", -6), ("832", -6), ("847", -6), ("901", -6),
    ("913", -6), ("918", -6), ("920", -6), ("936", -6), ("940", -6),
    ("952", -6), ("972", -6), ("985", -6),
    // Mountain (UTC-7)
    ("303", -7), ("307", -7), ("385", -7), ("406", -7), ("435", -7),
    ("480", -7), ("505", -7), ("520", -7), ("575", -7), ("602", -7),
    ("623", -7), ("719", -7), ("720", -7), ("801", -7), ("915", -7),
    ("928", -7), ("970", -7),
    // Pacific (UTC-8)
    ("206", -8), ("209", -8), ("213", -8), ("253", -8), ("310", -8),
    ("323", -8), ("360", -8), ("408", -8), ("415", -8), ("425", -8),
    ("442", -8), ("458", -8), ("503", -8), ("509", -8), ("510", -8),
    ("530", -8), ("541", -8), ("559", -8), ("562", -8), ("619", -8),
    ("626", -8), ("650", -8), ("657", -8), ("661", -8), ("669", -8),
    ("702", -8), ("707", -8), ("714", -8), ("725", -8), ("747", -8),
    ("760", -8), ("775", -8), ("805", -8), ("818", -8), ("831", -8),
    ("858", -8), ("909", -8), ("916", -8), ("925", -8), ("949", -8),
    ("951", -8), ("971", -8),
    // Alaska (UTC-9)
    ("907", -9),
    // Hawaii (UTC-10)
    ("808", -10),
];

/// Extract the NANP area code from a phone number.
/// Accepts "+1XXXYYYZZZZ", "1XXXYYYZZZZ", or bare "XXXYYYZZZZ".
pub fn area_code(phone: &str) -> Option<&str> {
    let digits_start = phone.strip_prefix('+').unwrap_or(phone);
    let digits_start = if digits_start.len() == 11 {
        digits_start.strip_prefix('1')?
    } else {
        digits_start
    };
    if digits_start.len() != 10 || !digits_start.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    Some(&digits_start[..3])
}

/// Resolve a phone number's UTC offset from its area code.
pub fn offset_for(phone: &str) -> Option<FixedOffset> {
    let code = area_code(phone)?;
    let hours = AREA_CODE_OFFSETS
        .iter()
        .find(|(ac, _)| *ac == code)
        .map(|(_, h)| *h)?;
    FixedOffset::east_opt(hours * 3600)
}

/// The contact's local time, or None when the timezone is unresolvable.
pub fn local_time(phone: &str, now: DateTime<Utc>) -> Option<DateTime<FixedOffset>> {
    offset_for(phone).map(|offset| now.with_timezone(&offset))
}
