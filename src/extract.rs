use crate::model::{Assignment, ClassRecord, ScoreValue};

/// Case-insensitive marker separating portal chrome from the gradebook payload.
const MARKER: &str = "grade book";

const CATEGORY_TASKS: &str = "All Tasks / Assessments";
const CATEGORY_PRACTICE: &str = "Practice / Preparation";

const UNKNOWN_CLASS: &str = "Unknown Class";

/// Field positions relative to a locator line, one table per paste layout.
/// The exports are rigidly positional; keeping every offset here means a new
/// export format becomes a new table instead of new literals in the scan loop.
struct BlockOffsets {
    date_first: isize,
    /// Second date line, joined to the first with a space ("Show Done" splits
    /// the month and day across two lines).
    date_second: Option<isize>,
    name: isize,
    score: isize,
}

const SHOW_DONE_OFFSETS: BlockOffsets = BlockOffsets {
    date_first: -3,
    date_second: Some(-2),
    name: -1,
    score: 1,
};

const DEFAULT_OFFSETS: BlockOffsets = BlockOffsets {
    date_first: -2,
    date_second: None,
    name: -1,
    score: 1,
};

#[derive(Debug, Clone, Copy, PartialEq)]
enum Variant {
    ShowDone,
    Default,
}

/// An assignment block that failed the numeric score/total gate. Skips are
/// reported, not fatal; extraction continues with the remaining locators.
#[derive(Debug, Clone)]
pub struct SkippedAssignment {
    pub name: String,
    pub score: String,
    pub total: String,
}

#[derive(Debug, Clone)]
pub struct Extraction {
    pub record: ClassRecord,
    /// Leading text the source system prepended before the marker, trimmed.
    pub discarded_text: String,
    pub marker_found: bool,
    pub skipped: Vec<SkippedAssignment>,
}

/// Split a multi-class submission. Classes are concatenated with exactly three
/// newlines; empty chunks are dropped.
pub fn split_submissions(raw: &str) -> Vec<&str> {
    raw.split("\n\n\n").filter(|c| !c.is_empty()).collect()
}

/// Extract one class record from a block of pasted text.
///
/// `year` is the current calendar year, injected so callers (and tests)
/// control year resolution. The marker being absent is not an error: the
/// result carries a placeholder record and `marker_found == false` for the
/// caller to surface.
pub fn extract_class(raw: &str, class_id: &str, year: i32) -> Extraction {
    let lower = raw.to_ascii_lowercase();
    let Some(marker_at) = lower.find(MARKER) else {
        return Extraction {
            record: ClassRecord {
                id: class_id.to_string(),
                name: UNKNOWN_CLASS.to_string(),
                assignments: Vec::new(),
                last_visited: None,
            },
            discarded_text: String::new(),
            marker_found: false,
            skipped: Vec::new(),
        };
    };

    // marker_at indexes an ASCII byte, so it is a char boundary in `raw` too.
    let discarded_text = raw[..marker_at].trim().to_string();

    // Class name sits two trimmed, non-empty lines below the marker line (the
    // source format has a one-line structural gap between them).
    let lines: Vec<&str> = raw
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();
    let name = lines
        .iter()
        .position(|l| l.to_ascii_lowercase().contains(MARKER))
        .and_then(|i| lines.get(i + 2))
        .map(|l| l.to_string())
        .unwrap_or_else(|| UNKNOWN_CLASS.to_string());

    // Working buffer: past the marker plus one separator character, minus the
    // final character of input. Both are fixed quirks of the source
    // representation and must be preserved for compatibility.
    let start = floor_char_boundary(raw, marker_at + MARKER.len() + 1);
    let end = floor_char_boundary(raw, raw.len().saturating_sub(1));
    let cleaned = if start < end { &raw[start..end] } else { "" };

    let variant = if cleaned.contains("Show Done") {
        Variant::ShowDone
    } else {
        Variant::Default
    };

    // Both layouts bury the listing behind a fixed header suffix: 12
    // characters past the header token. "Show Done" additionally ends before
    // the last "Outline", one character early.
    let window = match variant {
        Variant::ShowDone => {
            let from = cleaned
                .find("total items")
                .map(|i| floor_char_boundary(cleaned, i + 12))
                .unwrap_or(0);
            let to = cleaned
                .rfind("Outline")
                .map(|i| floor_char_boundary(cleaned, i.saturating_sub(1)))
                .unwrap_or(cleaned.len());
            if from < to {
                &cleaned[from..to]
            } else {
                ""
            }
        }
        Variant::Default => {
            let from = cleaned
                .find("Assignments")
                .map(|i| floor_char_boundary(cleaned, i + 12))
                .unwrap_or(0);
            &cleaned[from..]
        }
    };

    // Positional scanning wants raw line geometry; only strip CR so CRLF
    // pastes line up with LF ones.
    let content: Vec<&str> = window.split('\n').map(|l| l.trim_end_matches('\r')).collect();

    let locators: Vec<usize> = content
        .iter()
        .enumerate()
        .filter(|(_, l)| l.contains(CATEGORY_PRACTICE) || l.contains(CATEGORY_TASKS))
        .map(|(i, _)| i)
        .collect();

    let mut assignments: Vec<Assignment> = Vec::new();
    let mut skipped: Vec<SkippedAssignment> = Vec::new();

    for &x in &locators {
        let block = match variant {
            Variant::ShowDone => parse_show_done_block(&content, x, year),
            Variant::Default => parse_default_block(&content, x, year),
        };

        let earned = block.score_text.as_deref().and_then(coerce_number);
        let total = block.total_text.as_deref().and_then(coerce_number);
        match (earned, total) {
            (Some(earned), Some(total)) => {
                assignments.push(Assignment {
                    id: format!("{}-{}", class_id, assignments.len()),
                    name: block.name,
                    date: block.date,
                    weight: block.weight,
                    earned_score: ScoreValue::Number(earned),
                    total_score: ScoreValue::Number(total),
                });
            }
            _ => skipped.push(SkippedAssignment {
                name: block.name,
                score: block.score_text.unwrap_or_default(),
                total: block.total_text.unwrap_or_default(),
            }),
        }
    }

    // The source gradebook lists most-recent-first; reverse into chronological
    // order after ids are assigned in scan order.
    assignments.reverse();

    Extraction {
        record: ClassRecord {
            id: class_id.to_string(),
            name,
            assignments,
            last_visited: None,
        },
        discarded_text,
        marker_found: true,
        skipped,
    }
}

/// One assignment block before the numeric acceptance gate. A `None` score or
/// total means the line layout itself was broken (missing separator, window
/// edge), which fails the gate the same way an unparseable number does.
struct Block {
    name: String,
    date: String,
    weight: f64,
    score_text: Option<String>,
    total_text: Option<String>,
}

fn parse_show_done_block(content: &[&str], x: usize, year: i32) -> Block {
    let offs = &SHOW_DONE_OFFSETS;
    let locator = line_at(content, x, 0);
    // Locator line doubles as category and denominator: "<category> | <n> points".
    let (label, points) = match locator.split_once(" | ") {
        Some((label, points)) => (label, Some(points.replace(" points", "").trim().to_string())),
        None => (locator, None),
    };
    Block {
        name: line_at(content, x, offs.name).to_string(),
        date: resolve_year(&block_date(content, x, offs), year),
        weight: category_weight(label),
        score_text: opt_line_at(content, x, offs.score).map(str::to_string),
        total_text: points,
    }
}

fn parse_default_block(content: &[&str], x: usize, year: i32) -> Block {
    let offs = &DEFAULT_OFFSETS;
    // Score line reads "<earned> out of <total>".
    let (score_text, total_text) = match opt_line_at(content, x, offs.score)
        .and_then(|l| l.split_once(" out of "))
    {
        Some((s, t)) => (Some(s.to_string()), Some(t.to_string())),
        None => (None, None),
    };
    let label = line_at(content, x, 0).replace("\t0\t", "");
    Block {
        name: line_at(content, x, offs.name).to_string(),
        date: resolve_year(&block_date(content, x, offs), year),
        weight: category_weight(&label),
        score_text,
        total_text,
    }
}

fn block_date(content: &[&str], x: usize, offs: &BlockOffsets) -> String {
    let first = line_at(content, x, offs.date_first);
    match offs.date_second {
        Some(off) => format!("{} {}", first, line_at(content, x, off)),
        // Single-line dates carry the listing's literal tab characters.
        None => first.replace('\t', ""),
    }
}

fn category_weight(label: &str) -> f64 {
    if label.contains(CATEGORY_TASKS) {
        return 90.0;
    }
    if label.contains(CATEGORY_PRACTICE) {
        return 10.0;
    }
    0.0
}

/// Append the current calendar year to a date that lacks an explicit 4-digit
/// one. The source scopes every undated month/day to the year in progress;
/// dates that have not happened yet this year are NOT rolled into next year.
fn resolve_year(date: &str, year: i32) -> String {
    if ends_with_year(date) {
        return date.to_string();
    }
    format!("{}, {}", date, year)
}

fn ends_with_year(s: &str) -> bool {
    let tail: Vec<char> = s.chars().rev().take(4).collect();
    tail.len() == 4 && tail.iter().all(|c| c.is_ascii_digit())
}

/// Numeric coercion with source semantics: surrounding whitespace ignored and
/// an empty field reading as 0; anything else must parse fully.
fn coerce_number(s: &str) -> Option<f64> {
    let t = s.trim();
    if t.is_empty() {
        return Some(0.0);
    }
    t.parse::<f64>().ok().filter(|n| n.is_finite())
}

fn opt_line_at<'a>(content: &[&'a str], x: usize, off: isize) -> Option<&'a str> {
    let idx = x as isize + off;
    if idx < 0 {
        return None;
    }
    content.get(idx as usize).copied()
}

/// Out-of-range context lines read as empty (the window edges of a truncated
/// paste); the numeric gate decides whether the block survives.
fn line_at<'a>(content: &[&'a str], x: usize, off: isize) -> &'a str {
    opt_line_at(content, x, off).unwrap_or("")
}

fn floor_char_boundary(s: &str, i: usize) -> usize {
    let mut i = i.min(s.len());
    while i > 0 && !s.is_char_boundary(i) {
        i -= 1;
    }
    i
}

#[cfg(test)]
mod tests {
    use super::*;

    fn join(lines: &[&str]) -> String {
        let mut out = lines.join("\n");
        out.push('\n');
        out
    }

    fn sample_default() -> String {
        join(&[
            "Jefferson High Portal",
            "Grade Book",
            "Term S1",
            "Algebra II",
            "Mr. Patel",
            "Assignments",
            "\t4/02",
            "Chapter 5 Test",
            "\t0\tAll Tasks / Assessments",
            "88 out of 100",
            "\t3/25",
            "Quiz 3",
            "\t0\tAll Tasks / Assessments",
            "85 out of 100",
            "\t3/18",
            "Homework 12",
            "\t0\tPractice / Preparation",
            "9 out of 10",
        ])
    }

    fn sample_show_done() -> String {
        join(&[
            "District Portal",
            "Grade Book",
            "Q3",
            "Chemistry",
            "Show Done",
            "12 total items",
            "MAR",
            "28",
            "Lab Report 4",
            "All Tasks / Assessments | 100 points",
            "91",
            "MAR",
            "21",
            "Prelab Worksheet",
            "Practice / Preparation | 10 points",
            "10",
            "Outline",
        ])
    }

    #[test]
    fn default_layout_extracts_assignments_in_chronological_order() {
        let ex = extract_class(&sample_default(), "1700000000000", 2031);
        assert!(ex.marker_found);
        assert_eq!(ex.discarded_text, "Jefferson High Portal");
        assert_eq!(ex.record.name, "Algebra II");
        assert!(ex.skipped.is_empty());

        let a = &ex.record.assignments;
        assert_eq!(a.len(), 3);
        // Source order is most-recent-first; extraction restores oldest-first.
        assert_eq!(a[0].name, "Homework 12");
        assert_eq!(a[1].name, "Quiz 3");
        assert_eq!(a[2].name, "Chapter 5 Test");

        assert_eq!(a[1].earned_score, ScoreValue::Number(85.0));
        assert_eq!(a[1].total_score, ScoreValue::Number(100.0));
        assert_eq!(a[1].weight, 90.0);
        assert_eq!(a[1].date, "3/25, 2031");
        assert_eq!(a[0].weight, 10.0);
    }

    #[test]
    fn show_done_layout_joins_split_dates_and_reads_pipe_totals() {
        let ex = extract_class(&sample_show_done(), "1700000000001", 2031);
        assert!(ex.marker_found);
        assert_eq!(ex.record.name, "Chemistry");

        let a = &ex.record.assignments;
        assert_eq!(a.len(), 2);
        assert_eq!(a[0].name, "Prelab Worksheet");
        assert_eq!(a[0].date, "MAR 21, 2031");
        assert_eq!(a[0].weight, 10.0);
        assert_eq!(a[0].earned_score, ScoreValue::Number(10.0));
        assert_eq!(a[0].total_score, ScoreValue::Number(10.0));

        assert_eq!(a[1].name, "Lab Report 4");
        assert_eq!(a[1].date, "MAR 28, 2031");
        assert_eq!(a[1].weight, 90.0);
        assert_eq!(a[1].earned_score, ScoreValue::Number(91.0));
        assert_eq!(a[1].total_score, ScoreValue::Number(100.0));
    }

    #[test]
    fn assignment_ids_are_distinct_within_a_class() {
        let ex = extract_class(&sample_default(), "1700000000002", 2031);
        let mut ids: Vec<&str> = ex.record.assignments.iter().map(|a| a.id.as_str()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), ex.record.assignments.len());
        assert!(ids.iter().all(|id| id.starts_with("1700000000002-")));
    }

    #[test]
    fn missing_marker_yields_placeholder_without_failing() {
        let ex = extract_class("no payload here at all", "17", 2031);
        assert!(!ex.marker_found);
        assert_eq!(ex.record.name, "Unknown Class");
        assert!(ex.record.assignments.is_empty());
        assert_eq!(ex.discarded_text, "");
    }

    #[test]
    fn marker_at_start_discards_nothing() {
        let raw = sample_default();
        let raw = raw.trim_start_matches("Jefferson High Portal\n");
        let ex = extract_class(raw, "17", 2031);
        assert!(ex.marker_found);
        assert_eq!(ex.discarded_text, "");
        // Name still reads two non-empty lines below the marker.
        assert_eq!(ex.record.name, "Algebra II");
    }

    #[test]
    fn unparseable_score_skips_only_that_assignment() {
        let raw = sample_default().replace("85 out of 100", "eighty-five out of 100");
        let ex = extract_class(&raw, "17", 2031);
        assert_eq!(ex.record.assignments.len(), 2);
        assert_eq!(ex.skipped.len(), 1);
        assert_eq!(ex.skipped[0].name, "Quiz 3");
        assert_eq!(ex.skipped[0].score, "eighty-five");
    }

    #[test]
    fn date_with_explicit_year_passes_through() {
        assert_eq!(resolve_year("MAR 25, 2025", 2031), "MAR 25, 2025");
        assert_eq!(resolve_year("3/25/2025", 2031), "3/25/2025");
        assert_eq!(resolve_year("3/25", 2031), "3/25, 2031");
        // Unrecognized shapes still get the year suffix appended verbatim.
        assert_eq!(resolve_year("sometime soon", 2031), "sometime soon, 2031");
    }

    #[test]
    fn split_submissions_on_triple_newline() {
        let combined = format!("{}\n\n\n{}", sample_default().trim_end(), sample_show_done());
        let chunks = split_submissions(&combined);
        assert_eq!(chunks.len(), 2);
        assert!(chunks[0].contains("Algebra II"));
        assert!(chunks[1].contains("Chemistry"));

        assert_eq!(split_submissions("\n\n\nonly one").len(), 1);
    }

    #[test]
    fn crlf_paste_parses_like_lf() {
        let raw = sample_default().replace('\n', "\r\n");
        let ex = extract_class(&raw, "17", 2031);
        assert_eq!(ex.record.name, "Algebra II");
        assert_eq!(ex.record.assignments.len(), 3);
    }
}
