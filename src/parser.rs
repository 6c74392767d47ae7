//! Allotment list line parser.
//!
//! Text extracted from the list PDF runs its columns together, so a data
//! line is taken apart from both ends: the fixed-shape trailing tokens are
//! stripped right to left, then rank, roll number, percentile, name,
//! location and category are read left to right from what remains.

use crate::error::{AnalyzerError, LineError, Result};
use crate::logging::redact_value;
use crate::models::{
    AdmissionRecord, Category, DisabilityStatus, LayoutConfig, MinorityStatus, Sex,
};
use regex::Regex;
use rust_decimal::Decimal;
use std::str::FromStr;
use tracing::{debug, trace};

/// What a trimmed line is, before any field extraction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineKind<'a> {
    Blank,
    Institution { code: &'a str, name: &'a str },
    Program { code: &'a str, name: &'a str },
    Data(&'a str),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedLine {
    pub line_number: usize,
    pub reason: LineError,
}

#[derive(Debug, Clone, Default)]
pub struct ParseReport {
    pub records: Vec<AdmissionRecord>,
    pub skipped: Vec<SkippedLine>,
    pub institution_headers: usize,
    pub program_headers: usize,
}

impl ParseReport {
    /// True when the document produced no records at all.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

// Sticky header values, reset for every document.
#[derive(Debug, Default)]
struct HeaderContext {
    institution_code: String,
    institution_name: String,
    program_code: String,
    program_name: String,
}

/// Trailing tokens stripped from a data line before left-to-right parsing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct TrailingFields {
    admission_detail: String,
    disability: DisabilityStatus,
    minority: MinorityStatus,
    sex: Sex,
}

pub struct LineRecordParser {
    layout: LayoutConfig,
    admission_detail: Regex,
    disability: Regex,
    minority: Regex,
    sex: Regex,
    rank: Regex,
    identifier: Regex,
    percentile: Regex,
    location: Regex,
}

impl LineRecordParser {
    pub fn new(layout: &LayoutConfig) -> Result<Self> {
        validate_layout(layout)?;

        let prefixes = alternation(&layout.admission_prefixes);
        let suffixes = alternation(&layout.admission_suffixes);
        let identifier_tail = layout.identifier_length - layout.identifier_prefix.len();

        Ok(Self {
            admission_detail: Regex::new(&format!(r"(?:^|\s)((?:{prefixes}).*(?:{suffixes}))$"))?,
            disability: trailing_token(DisabilityStatus::MARKER)?,
            minority: trailing_token(MinorityStatus::MARKER)?,
            sex: Regex::new(r"(?:^|\s)([FM])$")?,
            // ASCII digits only
            rank: Regex::new(r"^([0-9]{1,6})\s")?,
            identifier: Regex::new(&format!(
                r"\b({}[0-9]{{{identifier_tail}}})\b",
                regex::escape(&layout.identifier_prefix)
            ))?,
            percentile: Regex::new(r"[0-9]+\.[0-9]+")?,
            location: Regex::new(&format!(r"\b{}\b", regex::escape(&layout.location_code)))?,
            layout: layout.clone(),
        })
    }

    pub fn layout(&self) -> &LayoutConfig {
        &self.layout
    }

    /// Parse a whole document; malformed lines are dropped.
    pub fn parse<I, S>(&self, lines: I) -> Vec<AdmissionRecord>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.parse_report(lines).records
    }

    pub fn parse_text(&self, text: &str) -> ParseReport {
        self.parse_report(text.lines())
    }

    pub fn parse_report<I, S>(&self, lines: I) -> ParseReport
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut report = ParseReport::default();
        let mut context = HeaderContext::default();

        for (index, raw) in lines.into_iter().enumerate() {
            let line_number = index + 1;
            match self.classify(raw.as_ref()) {
                LineKind::Blank => {}
                LineKind::Institution { code, name } => {
                    trace!(line = line_number, code, "institution header");
                    context.institution_code = code.to_string();
                    context.institution_name = name.to_string();
                    report.institution_headers += 1;
                }
                LineKind::Program { code, name } => {
                    trace!(line = line_number, code, "program header");
                    context.program_code = code.to_string();
                    context.program_name = name.to_string();
                    report.program_headers += 1;
                }
                LineKind::Data(line) => match self.extract_record(line, &context) {
                    Ok(record) => report.records.push(record),
                    Err(reason) => {
                        debug!(
                            line = line_number,
                            %reason,
                            text = redact_value(line),
                            "skipping list line"
                        );
                        report.skipped.push(SkippedLine {
                            line_number,
                            reason,
                        });
                    }
                },
            }
        }

        debug!(
            records = report.records.len(),
            skipped = report.skipped.len(),
            "parsed allotment list"
        );
        report
    }

    pub fn classify<'a>(&self, raw: &'a str) -> LineKind<'a> {
        let line = raw.trim();
        if is_separator(line) {
            return LineKind::Blank;
        }
        if let Some(rest) = line.strip_prefix(self.layout.institution_marker.as_str()) {
            let (code, name) = self.split_header(rest);
            return LineKind::Institution { code, name };
        }
        if let Some(rest) = line.strip_prefix(self.layout.program_marker.as_str()) {
            let (code, name) = self.split_header(rest);
            return LineKind::Program { code, name };
        }
        LineKind::Data(line)
    }

    fn split_header<'a>(&self, rest: &'a str) -> (&'a str, &'a str) {
        match rest.split_once(self.layout.header_delimiter.as_str()) {
            Some((code, name)) => (code.trim(), name.trim()),
            None => (rest.trim(), ""),
        }
    }

    fn extract_record(
        &self,
        line: &str,
        context: &HeaderContext,
    ) -> std::result::Result<AdmissionRecord, LineError> {
        let (trailing, body) = self.strip_trailing_fields(line);

        let rank_match = self
            .rank
            .captures(body)
            .and_then(|caps| caps.get(1))
            .ok_or(LineError::MissingRank)?;
        let rank: u32 = rank_match
            .as_str()
            .parse()
            .map_err(|_| LineError::MissingRank)?;

        let (identifier_number, identifier_end) =
            find_after(&self.identifier, body, rank_match.end())
                .ok_or(LineError::MissingIdentifier)?;

        let (percentile_text, percentile_end) = find_after(&self.percentile, body, identifier_end)
            .ok_or(LineError::MissingPercentile)?;
        let percentile = Decimal::from_str(percentile_text)
            .map_err(|_| LineError::InvalidPercentile(percentile_text.to_string()))?;

        let location = self
            .location
            .find(&body[percentile_end..])
            .ok_or(LineError::MissingLocation)?;
        let candidate_name = body[percentile_end..percentile_end + location.start()].trim();

        let category = find_category(&body[percentile_end + location.end()..])
            .ok_or(LineError::MissingCategory)?;

        Ok(AdmissionRecord {
            institution_code: context.institution_code.clone(),
            institution_name: context.institution_name.clone(),
            program_code: context.program_code.clone(),
            program_name: context.program_name.clone(),
            rank,
            identifier_number: identifier_number.to_string(),
            percentile,
            candidate_name: candidate_name.to_string(),
            location_code: self.layout.location_code.clone(),
            category,
            sex: trailing.sex,
            minority: trailing.minority,
            disability: trailing.disability,
            admission_detail: trailing.admission_detail,
        })
    }

    // Order matters: each step only sees what the previous one left.
    fn strip_trailing_fields<'a>(&self, line: &'a str) -> (TrailingFields, &'a str) {
        let (detail, rest) = strip_trailing(&self.admission_detail, line);
        let (disability, rest) = strip_trailing(&self.disability, rest);
        let (minority, rest) = strip_trailing(&self.minority, rest);
        let (sex, rest) = strip_trailing(&self.sex, rest);

        let fields = TrailingFields {
            admission_detail: detail.unwrap_or_default().to_string(),
            disability: if disability.is_some() {
                DisabilityStatus::Pho
            } else {
                DisabilityStatus::None
            },
            minority: if minority.is_some() {
                MinorityStatus::Msm
            } else {
                MinorityStatus::None
            },
            sex: sex.map(Sex::from_code).unwrap_or_default(),
        };
        (fields, rest)
    }
}

/// Split off the token captured by `pattern` at the end of `text`.
fn strip_trailing<'a>(pattern: &Regex, text: &'a str) -> (Option<&'a str>, &'a str) {
    match pattern.captures(text).and_then(|caps| caps.get(1)) {
        Some(token) => (Some(token.as_str()), text[..token.start()].trim_end()),
        None => (None, text),
    }
}

/// First match of `pattern` at or after `offset`, with its absolute end.
fn find_after<'a>(pattern: &Regex, text: &'a str, offset: usize) -> Option<(&'a str, usize)> {
    let found = pattern.find(&text[offset..])?;
    Some((found.as_str(), offset + found.end()))
}

/// Earliest category code starting a token, testing codes in priority order
/// at each position.
fn find_category(text: &str) -> Option<Category> {
    let mut at_boundary = true;
    for (index, ch) in text.char_indices() {
        if at_boundary {
            let rest = &text[index..];
            if let Some(category) = Category::PRIORITY
                .iter()
                .copied()
                .find(|category| rest.starts_with(category.code()))
            {
                return Some(category);
            }
        }
        at_boundary = !ch.is_alphanumeric();
    }
    None
}

fn is_separator(line: &str) -> bool {
    line.chars()
        .all(|c| c.is_whitespace() || matches!(c, '-' | '=' | '_' | '*'))
}

fn trailing_token(marker: &str) -> Result<Regex> {
    Ok(Regex::new(&format!(r"(?:^|\s)({})$", regex::escape(marker)))?)
}

fn alternation(parts: &[String]) -> String {
    parts
        .iter()
        .map(|part| regex::escape(part))
        .collect::<Vec<_>>()
        .join("|")
}

fn validate_layout(layout: &LayoutConfig) -> Result<()> {
    let invalid = |reason: &str| {
        Err(AnalyzerError::InvalidLayout {
            reason: reason.to_string(),
        })
    };

    if layout.institution_marker.trim().is_empty() || layout.program_marker.trim().is_empty() {
        return invalid("header markers must not be empty");
    }
    if layout.header_delimiter.is_empty() {
        return invalid("header delimiter must not be empty");
    }
    if layout.location_code.trim().is_empty() {
        return invalid("location code must not be empty");
    }
    if !layout.identifier_prefix.chars().all(|c| c.is_ascii_digit()) {
        return invalid("identifier prefix must be digits");
    }
    if layout.identifier_prefix.len() >= layout.identifier_length {
        return invalid("identifier prefix must be shorter than the identifier length");
    }
    if layout.admission_prefixes.is_empty()
        || layout.admission_suffixes.is_empty()
        || layout
            .admission_prefixes
            .iter()
            .chain(&layout.admission_suffixes)
            .any(String::is_empty)
    {
        return invalid("admission detail prefixes and suffixes must be non-empty");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const FULL_LINE: &str = "105 24123456789 92.45 RAVI KUMAR OU BCA F MSM NS-GEN-P2";

    fn parser() -> LineRecordParser {
        LineRecordParser::new(&LayoutConfig::default()).unwrap()
    }

    #[test]
    fn recovers_every_field_of_a_full_line() {
        let records = parser().parse([
            "COLL :: JNTH - JNTU COLLEGE OF ENGINEERING HYDERABAD",
            "CRS :: CSE - COMPUTER SCIENCE AND ENGINEERING",
            FULL_LINE,
        ]);

        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.institution_code, "JNTH");
        assert_eq!(record.institution_name, "JNTU COLLEGE OF ENGINEERING HYDERABAD");
        assert_eq!(record.program_code, "CSE");
        assert_eq!(record.program_name, "COMPUTER SCIENCE AND ENGINEERING");
        assert_eq!(record.rank, 105);
        assert_eq!(record.identifier_number, "24123456789");
        assert_eq!(record.percentile, Decimal::from_str("92.45").unwrap());
        assert_eq!(record.percentile.to_string(), "92.45");
        assert_eq!(record.candidate_name, "RAVI KUMAR");
        assert_eq!(record.location_code, "OU");
        assert_eq!(record.category, Category::Bca);
        assert_eq!(record.sex, Sex::Female);
        assert_eq!(record.minority, MinorityStatus::Msm);
        assert_eq!(record.disability, DisabilityStatus::None);
        assert_eq!(record.admission_detail, "NS-GEN-P2");
    }

    #[test]
    fn header_and_malformed_lines_yield_one_record() {
        let report = parser().parse_report([
            "COLL :: MVSR - MVSR ENGINEERING COLLEGE",
            "CRS :: ECE - ELECTRONICS",
            "RANK HTNO PERCENTILE NAME",
            "12 NOT A ROLL NUMBER",
            "2301 24000000017 88.1 SITA DEVI OU SC F S-SPORTS-P1",
        ]);

        assert_eq!(report.records.len(), 1);
        assert_eq!(report.records[0].institution_code, "MVSR");
        assert_eq!(report.records[0].program_code, "ECE");
        assert_eq!(report.records[0].category, Category::Sc);
        assert_eq!(report.records[0].admission_detail, "S-SPORTS-P1");
        assert_eq!(
            report.skipped,
            vec![
                SkippedLine {
                    line_number: 3,
                    reason: LineError::MissingRank
                },
                SkippedLine {
                    line_number: 4,
                    reason: LineError::MissingIdentifier
                },
            ]
        );
        assert_eq!(report.institution_headers, 1);
        assert_eq!(report.program_headers, 1);
    }

    #[test]
    fn context_is_sticky_until_replaced() {
        let records = parser().parse([
            "COLL :: AAA - FIRST COLLEGE",
            "CRS :: CSE - COMPUTERS",
            "1 24000000001 99.9 A ONE OU OC M",
            "CRS :: IT - INFORMATION TECHNOLOGY",
            "2 24000000002 99.8 B TWO OU OC M",
            "COLL :: BBB - SECOND COLLEGE",
            "3 24000000003 99.7 C THREE OU OC M",
        ]);

        let context: Vec<_> = records
            .iter()
            .map(|r| (r.institution_code.as_str(), r.program_code.as_str()))
            .collect();
        assert_eq!(context, vec![("AAA", "CSE"), ("AAA", "IT"), ("BBB", "IT")]);
    }

    #[test]
    fn context_does_not_leak_between_documents() {
        let parser = parser();
        let first = parser.parse(["COLL :: AAA - FIRST", "CRS :: CSE - CS", FULL_LINE]);
        let second = parser.parse([FULL_LINE]);

        assert_eq!(first[0].institution_code, "AAA");
        assert_eq!(second[0].institution_code, "");
        assert_eq!(second[0].program_name, "");
    }

    #[test]
    fn parse_is_total() {
        let parser = parser();
        assert!(parser.parse(Vec::<String>::new()).is_empty());
        assert!(parser.parse(["", "   ", "------", "=====", "-- -- --"]).is_empty());
        assert!(parser.parse_text("COLL ::\nCRS ::\n\u{0}\n9").is_empty());
    }

    #[test]
    fn classify_splits_headers_on_first_delimiter() {
        let parser = parser();
        assert_eq!(
            parser.classify("  COLL :: VASV - VASAVI COLLEGE - IBRAHIMBAGH  "),
            LineKind::Institution {
                code: "VASV",
                name: "VASAVI COLLEGE - IBRAHIMBAGH"
            }
        );
        assert_eq!(
            parser.classify("CRS :: CIV"),
            LineKind::Program {
                code: "CIV",
                name: ""
            }
        );
        assert_eq!(parser.classify(" ---- "), LineKind::Blank);
        assert_eq!(parser.classify(" 1 x "), LineKind::Data("1 x"));
    }

    #[test]
    fn trailing_fields_are_stripped_right_to_left() {
        let parser = parser();
        let (fields, rest) =
            parser.strip_trailing_fields("7 24111111111 95.0 ASHA OU ST F MSM PHO NS-CAP-P4");
        assert_eq!(rest, "7 24111111111 95.0 ASHA OU ST");
        assert_eq!(fields.admission_detail, "NS-CAP-P4");
        assert_eq!(fields.disability, DisabilityStatus::Pho);
        assert_eq!(fields.minority, MinorityStatus::Msm);
        assert_eq!(fields.sex, Sex::Female);

        let (fields, rest) = parser.strip_trailing_fields("7 24111111111 95.0 ASHA OU ST");
        assert_eq!(fields, TrailingFields::default());
        assert_eq!(rest, "7 24111111111 95.0 ASHA OU ST");
    }

    #[test]
    fn name_initial_is_not_taken_as_sex() {
        let records = parser().parse(["40 24222222222 90.01 RAJU M OU BCD"]);
        assert_eq!(records[0].candidate_name, "RAJU M");
        assert_eq!(records[0].sex, Sex::Unspecified);
        assert_eq!(records[0].category, Category::Bcd);
    }

    #[test]
    fn location_inside_a_name_is_ignored() {
        let records = parser().parse(["41 24222222223 90.02 GOURI SOUJANYA OU BCE F"]);
        assert_eq!(records[0].candidate_name, "GOURI SOUJANYA");
        assert_eq!(records[0].category, Category::Bce);
    }

    #[test]
    fn roll_number_must_be_a_whole_digit_run() {
        let report = parser().parse_report(["5 2412345678901 92.45 X OU OC"]);
        assert_eq!(report.skipped[0].reason, LineError::MissingIdentifier);
    }

    #[test]
    fn each_missing_field_has_its_own_reason() {
        let report = parser().parse_report([
            "1234567 24123456789 92.45 X OU OC",
            "12 24123456789 NAME OU BCA",
            "12 24123456789 91.2 NAME BCA",
            "12 24123456789 91.2 NAME OU",
        ]);
        let reasons: Vec<_> = report.skipped.iter().map(|s| s.reason.clone()).collect();
        assert_eq!(
            reasons,
            vec![
                LineError::MissingRank,
                LineError::MissingPercentile,
                LineError::MissingLocation,
                LineError::MissingCategory,
            ]
        );
        assert!(report.is_empty());
    }

    #[test]
    fn percentile_is_searched_after_the_roll_number() {
        let records = parser().parse(["3.5 OOPS"]);
        assert!(records.is_empty());

        let records = parser().parse(["9 24333333333 77.125 NAME OU OC"]);
        assert_eq!(records[0].percentile.to_string(), "77.125");
    }

    #[test]
    fn non_ascii_digits_are_not_numbers() {
        let report = parser().parse_report([
            // Devanagari digits after the 24 prefix
            "105 24\u{967}\u{968}\u{969}\u{96A}\u{96B}\u{96C}\u{96D}\u{96E}\u{96F} 92.45 X OU BCA",
            "\u{967}\u{966}\u{96B} 24123456789 92.45 RAVI OU BCA F",
            "105 24123456789 \u{669}\u{662}.45 RAVI OU BCA F",
        ]);
        let reasons: Vec<_> = report.skipped.iter().map(|s| s.reason.clone()).collect();
        assert_eq!(
            reasons,
            vec![
                LineError::MissingIdentifier,
                LineError::MissingRank,
                LineError::MissingPercentile,
            ]
        );
        assert!(report.is_empty());
    }

    #[test]
    fn oversized_percentile_is_skipped() {
        let report =
            parser().parse_report(["7 24123456789 999999999999999999999999999999.5 NAME OU OC"]);
        assert!(report.is_empty());
        assert_eq!(
            report.skipped[0].reason,
            LineError::InvalidPercentile("999999999999999999999999999999.5".to_string())
        );
    }

    #[test]
    fn category_prefers_earliest_token_then_priority() {
        assert_eq!(find_category(" BCB"), Some(Category::Bcb));
        assert_eq!(find_category(" XSC ST"), Some(Category::St));
        assert_eq!(find_category(" OC SC"), Some(Category::Oc));
        assert_eq!(find_category(" BCAX"), Some(Category::Bca));
        assert_eq!(find_category(" GEN"), None);
    }

    #[test]
    fn custom_layout_changes_markers_and_location() {
        let layout = LayoutConfig {
            institution_marker: "INST:".to_string(),
            program_marker: "PROG:".to_string(),
            header_delimiter: " | ".to_string(),
            identifier_prefix: "25".to_string(),
            location_code: "AU".to_string(),
            ..LayoutConfig::default()
        };
        let parser = LineRecordParser::new(&layout).unwrap();
        let records = parser.parse([
            "INST: AUCE | ANDHRA UNIVERSITY",
            "PROG: MEC | MECHANICAL",
            "8 25123456789 81.5 DEVI AU SC F",
        ]);

        assert_eq!(records[0].institution_name, "ANDHRA UNIVERSITY");
        assert_eq!(records[0].program_code, "MEC");
        assert_eq!(records[0].location_code, "AU");
        assert_eq!(records[0].candidate_name, "DEVI");
    }

    #[test]
    fn invalid_layouts_are_rejected() {
        let cases = [
            LayoutConfig {
                identifier_prefix: "2A".to_string(),
                ..LayoutConfig::default()
            },
            LayoutConfig {
                identifier_length: 2,
                ..LayoutConfig::default()
            },
            LayoutConfig {
                program_marker: " ".to_string(),
                ..LayoutConfig::default()
            },
            LayoutConfig {
                admission_suffixes: Vec::new(),
                ..LayoutConfig::default()
            },
        ];
        for layout in cases {
            assert!(matches!(
                LineRecordParser::new(&layout),
                Err(AnalyzerError::InvalidLayout { .. })
            ));
        }
    }

    fn admission_tail() -> impl Strategy<Value = String> {
        (prop::sample::select(vec!["NS-", "S-"]), "[A-Z]{2,5}", 1u8..=4)
            .prop_map(|(prefix, quota, phase)| format!("{prefix}{quota}-P{phase}"))
    }

    proptest! {
        #[test]
        fn any_lines_parse_without_panicking(lines in prop::collection::vec(".{0,80}", 0..20)) {
            let report = parser().parse_report(&lines);
            prop_assert!(report.records.len() + report.skipped.len() <= lines.len());
            for skipped in &report.skipped {
                prop_assert!(skipped.line_number >= 1 && skipped.line_number <= lines.len());
            }
        }

        #[test]
        fn generated_rows_round_trip_their_fields(
            rank in "[1-9][0-9]{0,6}",
            roll in "[0-9]{9}",
            percentile in "[1-9][0-9]?\\.[0-9]{1,2}",
            name in "[A-Z]{1,10}( [A-Z]{1,10}){0,2}",
            category in prop::sample::select(Category::PRIORITY.to_vec()),
            sex in prop::option::of(prop::sample::select(vec!["M", "F"])),
            tail in prop::option::of(admission_tail()),
        ) {
            prop_assume!(!name.split(' ').any(|word| word == "OU"));

            let mut line = format!("{rank} 24{roll} {percentile} {name} OU {}", category.code());
            for token in [sex, tail.as_deref()].into_iter().flatten() {
                line.push(' ');
                line.push_str(token);
            }

            let report = parser().parse_report([line.as_str()]);
            if rank.len() > 6 {
                prop_assert!(report.is_empty());
                prop_assert_eq!(&report.skipped[0].reason, &LineError::MissingRank);
            } else {
                prop_assert_eq!(report.records.len(), 1);
                let record = &report.records[0];
                prop_assert_eq!(record.rank.to_string(), rank);
                prop_assert_eq!(&record.identifier_number, &format!("24{roll}"));
                prop_assert_eq!(record.percentile.to_string(), percentile);
                prop_assert_eq!(&record.candidate_name, &name);
                prop_assert_eq!(record.category, category);
                prop_assert_eq!(record.sex, sex.map(Sex::from_code).unwrap_or_default());
                prop_assert_eq!(record.admission_detail.clone(), tail.unwrap_or_default());
            }
        }
    }
}
