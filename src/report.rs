// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Zone discovery from integration report text.
//!
//! Integration reports are diagnostic dumps with no fixed layout. The parser
//! looks for a zones section and reads one zone per line:
//!
//! ```text
//! Zones:
//! ID    Name            Type
//! 28    Main Bedroom    DIMMER
//! 5, Kitchen
//! 12 | Porch | SWITCH
//! 3 Guest Room
//! ```
//!
//! Fields are separated by `,`, `;`, `|`, a tab, or two or more spaces, and
//! are the integration id, the name and an optional device type. A line
//! with none of those separators is read as an id followed by a name.
//! Lines that cannot be read are returned with the reason instead of
//! failing the whole report.

use std::collections::HashSet;
use std::fmt;

use crate::types::ZoneId;
use crate::zone::Zone;

/// Lines that open a zones section, compared without case and without a
/// trailing colon.
pub const ZONE_SECTION_HEADERS: &[&str] = &[
    "zones",
    "[zones]",
    "zone list",
    "[zone list]",
    "outputs",
    "[outputs]",
    "output list",
];

/// Words that make up a column header row.
const COLUMN_HEADER_WORDS: &[&str] = &[
    "#",
    "id",
    "zone",
    "zone id",
    "integration id",
    "iid",
    "name",
    "zone name",
    "type",
    "device type",
    "output type",
];

const FIELD_DELIMITERS: &[char] = &[',', ';', '|', '\t'];

/// Why a report line was not turned into a zone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The line has no id field.
    MissingId,
    /// The id field is not a positive integer.
    InvalidId(String),
    /// The line has an id but no name.
    MissingName,
    /// An earlier line already defined this id.
    DuplicateId(ZoneId),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingId => f.write_str("missing zone id"),
            Self::InvalidId(raw) => write!(f, "invalid zone id `{raw}`"),
            Self::MissingName => f.write_str("missing zone name"),
            Self::DuplicateId(id) => write!(f, "duplicate zone id {id}"),
        }
    }
}

/// A report line that was skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedLine {
    /// 1-based line number in the report text.
    pub line_number: usize,
    /// The trimmed line.
    pub text: String,
    /// Why it was skipped.
    pub reason: SkipReason,
}

/// Result of parsing a report.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ZoneReport {
    /// Zones in report order, one per id.
    pub zones: Vec<Zone>,
    /// Lines that could not be used.
    pub skipped: Vec<SkippedLine>,
}

impl ZoneReport {
    /// Returns how many lines were skipped.
    #[must_use]
    pub fn skipped_count(&self) -> usize {
        self.skipped.len()
    }

    /// Returns `true` if no zones were found.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.zones.is_empty()
    }
}

/// Parses the zones out of an integration report.
///
/// Only the lines after a zones section header are read, up to the next
/// section header. A report without any zones header is read as a bare
/// zone list. Blank lines, rule lines such as `-----` and column header
/// rows are ignored.
///
/// # Examples
///
/// ```
/// use lipfade::report::parse_report;
///
/// let report = parse_report("Zones:\n28, Bedroom, DIMMER\n5, Kitchen\nx, Broken\n");
/// assert_eq!(report.zones.len(), 2);
/// assert_eq!(report.zones[0].name, "Bedroom");
/// assert_eq!(report.skipped_count(), 1);
/// ```
#[must_use]
pub fn parse_report(text: &str) -> ZoneReport {
    let has_header = text.lines().any(is_zone_header);
    let mut in_section = !has_header;

    let mut report = ZoneReport::default();
    let mut seen = HashSet::new();

    for (index, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if is_zone_header(line) {
            in_section = true;
            continue;
        }
        if has_header && in_section && is_section_header(line) {
            in_section = false;
            continue;
        }
        if !in_section || line.is_empty() || is_rule(line) {
            continue;
        }

        let fields = split_fields(line);
        if is_column_header(&fields) {
            continue;
        }

        let skip = |reason: SkipReason| SkippedLine {
            line_number: index + 1,
            text: line.to_string(),
            reason,
        };

        match parse_entry(&fields) {
            Ok(zone) if seen.insert(zone.id) => {
                tracing::trace!(zone = %zone.id, name = %zone.name, "report zone");
                report.zones.push(zone);
            }
            Ok(zone) => report.skipped.push(skip(SkipReason::DuplicateId(zone.id))),
            Err(reason) => report.skipped.push(skip(reason)),
        }
    }

    for skipped in &report.skipped {
        tracing::warn!(
            line = skipped.line_number,
            text = %skipped.text,
            reason = %skipped.reason,
            "skipped report line"
        );
    }
    report
}

fn parse_entry(fields: &[&str]) -> Result<Zone, SkipReason> {
    let (id, rest) = fields.split_first().ok_or(SkipReason::MissingId)?;
    let id = id
        .parse::<u32>()
        .ok()
        .and_then(|id| ZoneId::new(id).ok())
        .ok_or_else(|| SkipReason::InvalidId((*id).to_string()))?;
    let (name, rest) = rest.split_first().ok_or(SkipReason::MissingName)?;

    let zone = Zone::new(id, *name);
    Ok(match rest.first() {
        Some(device_type) => zone.with_device_type(*device_type),
        None => zone,
    })
}

/// Splits a line on the first delimiter kind it contains. Empty fields are
/// dropped.
///
/// A line that is still one field is split after a leading integer, the
/// rest being the name.
fn split_fields(line: &str) -> Vec<&str> {
    let fields: Vec<&str> = match FIELD_DELIMITERS.iter().find(|d| line.contains(**d)) {
        Some(delimiter) => line.split(*delimiter).collect(),
        None => line.split("  ").collect(),
    };
    let fields: Vec<&str> = fields
        .into_iter()
        .map(str::trim)
        .filter(|field| !field.is_empty())
        .collect();

    if let [single] = fields.as_slice()
        && let Some((id, name)) = single.split_once(char::is_whitespace)
        && !id.is_empty()
        && id.chars().all(|c| c.is_ascii_digit())
    {
        return vec![id, name.trim()];
    }
    fields
}

fn normalize(line: &str) -> String {
    line.trim().trim_end_matches(':').trim().to_ascii_lowercase()
}

fn is_zone_header(line: &str) -> bool {
    let line = normalize(line);
    ZONE_SECTION_HEADERS.contains(&line.as_str())
}

/// Any other section title: `[Name]`, or a line ending in a colon without
/// field delimiters.
fn is_section_header(line: &str) -> bool {
    let bracketed = line.starts_with('[') && line.ends_with(']');
    let titled = line.ends_with(':') && split_fields(line).len() == 1;
    bracketed || titled
}

fn is_rule(line: &str) -> bool {
    line.chars()
        .all(|c| matches!(c, '-' | '=' | '+' | '*' | '|' | ' ' | '\t'))
}

fn is_column_header(fields: &[&str]) -> bool {
    !fields.is_empty()
        && fields
            .iter()
            .all(|field| COLUMN_HEADER_WORDS.contains(&normalize(field).as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const REPORT: &str = "\
Lutron Integration Report
Processor: Main Repeater

[Zones]
ID    Name            Type
----  --------------  ------
28    Main Bedroom    DIMMER
5     Kitchen         DIMMER
12,Porch,SWITCH
abc   Nowhere
40; Hallway
41
7 | Dining Room

[Devices]
1, Keypad Entry
";

    fn ids(report: &ZoneReport) -> Vec<u32> {
        report.zones.iter().map(|z| z.id.value()).collect()
    }

    #[test]
    fn five_zones_and_two_skipped_lines() {
        let report = parse_report(REPORT);

        assert_eq!(ids(&report), vec![28, 5, 12, 40, 7]);
        assert_eq!(report.skipped_count(), 2);
        assert_eq!(report.skipped[0].line_number, 10);
        assert_eq!(
            report.skipped[0].reason,
            SkipReason::InvalidId("abc".to_string())
        );
        assert_eq!(report.skipped[1].text, "41");
        assert_eq!(report.skipped[1].reason, SkipReason::MissingName);
    }

    #[test]
    fn names_and_types() {
        let report = parse_report(REPORT);
        let bedroom = &report.zones[0];
        assert_eq!(bedroom.name, "Main Bedroom");
        assert_eq!(bedroom.device_type.as_deref(), Some("DIMMER"));
        let hallway = &report.zones[3];
        assert_eq!(hallway.name, "Hallway");
        assert_eq!(hallway.device_type, None);
        assert!(report.zones.iter().all(|z| z.brightness.is_none()));
    }

    #[test]
    fn lines_outside_the_zones_section_are_ignored() {
        let report = parse_report(REPORT);
        assert!(!report.zones.iter().any(|z| z.name == "Keypad Entry"));
        assert!(!report.skipped.iter().any(|s| s.text.contains("Processor")));
    }

    #[test]
    fn duplicate_ids_keep_the_first() {
        let report = parse_report("Zones:\n3, Study\n3, Office\n4, Den\n");
        assert_eq!(ids(&report), vec![3, 4]);
        assert_eq!(report.zones[0].name, "Study");
        assert_eq!(
            report.skipped[0].reason,
            SkipReason::DuplicateId(ZoneId::new(3).unwrap())
        );
    }

    #[test]
    fn zero_id_is_invalid() {
        let report = parse_report("OUTPUTS\n0, Ghost\n1, Real\n");
        assert_eq!(ids(&report), vec![1]);
        assert_eq!(report.skipped[0].reason, SkipReason::InvalidId("0".to_string()));
    }

    #[test]
    fn bare_list_without_header() {
        let report = parse_report("1\tLiving\n2\tBath\tSWITCH\n");
        assert_eq!(ids(&report), vec![1, 2]);
        assert_eq!(report.zones[1].device_type.as_deref(), Some("SWITCH"));
    }

    #[test]
    fn header_matching_ignores_case_and_colon() {
        assert!(is_zone_header("ZONE LIST:"));
        assert!(is_zone_header("  [zones]  "));
        assert!(!is_zone_header("Zones of the house"));
    }

    #[test]
    fn empty_text_yields_empty_report() {
        let report = parse_report("");
        assert!(report.is_empty());
        assert_eq!(report.skipped_count(), 0);
    }

    #[test]
    fn single_spaced_lines_are_id_and_name() {
        let report = parse_report("Zones:\n28 Bedroom\n5 Kitchen DIMMER\nZone Name\nabc Nowhere\n");
        assert_eq!(ids(&report), vec![28, 5]);
        assert_eq!(report.zones[0].name, "Bedroom");
        assert_eq!(report.zones[1].name, "Kitchen DIMMER");
        assert_eq!(report.zones[1].device_type, None);
        assert_eq!(report.skipped_count(), 1);
        assert_eq!(
            report.skipped[0].reason,
            SkipReason::InvalidId("abc Nowhere".to_string())
        );
    }

    #[test]
    fn split_prefers_explicit_delimiters() {
        assert_eq!(split_fields("5,  Big  Room"), vec!["5", "Big  Room"]);
        assert_eq!(split_fields("5   Big Room   DIMMER"), vec!["5", "Big Room", "DIMMER"]);
        assert_eq!(split_fields("5 Big Room"), vec!["5", "Big Room"]);
        assert_eq!(split_fields("Zone Name"), vec!["Zone Name"]);
    }
}
