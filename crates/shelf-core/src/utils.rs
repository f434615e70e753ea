//! LOT-number validation and barcode parsing.

use std::sync::LazyLock;

use regex::Regex;

use crate::model::Location;

/// 9 alphanumerics, a dot, 2 digits (e.g. `ABC123DEF.01`).
static LOT_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9]{9}\.\d{2}$").expect("regex should compile"));

/// Accepted location barcode shapes, matched after stripping whitespace and
/// upper-casing: `L2-B3`, `L2B3`, `2-3`, `2,3`, `2_3`.
static LOCATION_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"^L(\d+)-?B(\d+)$",
        r"^(\d+)-(\d+)$",
        r"^(\d+),(\d+)$",
        r"^(\d+)_(\d+)$",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("regex should compile"))
    .collect()
});

/// `L<n>-B<n>` tokens inside an error message.
static LOCATION_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"L(\d+)-B(\d+)").expect("regex should compile"));

/// Checks the LOT-number format. Surrounding whitespace is ignored.
pub fn is_valid_lot_number(lot_no: &str) -> bool {
    LOT_PATTERN.is_match(lot_no.trim())
}

/// Parses a scanned location barcode.
///
/// Returns `None` for unrecognized shapes and for zero coordinates.
pub fn parse_location_from_barcode(barcode: &str) -> Option<Location> {
    let normalized: String = barcode
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_uppercase();
    if normalized.is_empty() {
        return None;
    }

    LOCATION_PATTERNS.iter().find_map(|re| {
        let caps = re.captures(&normalized)?;
        let level = caps.get(1)?.as_str().parse().ok()?;
        let block = caps.get(2)?.as_str().parse().ok()?;
        Location::new(level, block)
    })
}

/// Builds the wrong-location message stored on the active job.
///
/// The first location token is the scanned (wrong) cell, the second the
/// expected one; [`wrong_location_from_message`] reads it back.
pub fn wrong_location_message(scanned: Location, expected: Location) -> String {
    format!("Wrong location: scanned {scanned}, expected {expected}")
}

/// Extracts the scanned (wrong) cell from a wrong-location message.
pub fn wrong_location_from_message(message: &str) -> Option<Location> {
    let caps = LOCATION_TOKEN.captures(message)?;
    let level = caps.get(1)?.as_str().parse().ok()?;
    let block = caps.get(2)?.as_str().parse().ok()?;
    Location::new(level, block)
}
