//! Best-effort extraction of SQL, explanation, suggestions and cost from free-form model output.
//!
//! Nothing in here fails. A missing section degrades to its default value.

use crate::llm::models::GenerationResult;
use once_cell::sync::Lazy;
use regex::{Match, Regex};
use tracing::debug;

pub const DEFAULT_EXPLANATION: &str = "Schema generated successfully";
pub const DEFAULT_SUGGESTION: &str = "Schema is optimized for your requirements";

static SQL_FENCE_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)```sql\b[ \t]*\r?\n?(.*?)```").unwrap());

static EXPLANATION_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)explanation").unwrap());

static SUGGESTIONS_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)suggestions?").unwrap());

// "Estimated Cost:", "Cost Analysis:", "Estimated cost - $20"
static COST_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bcost\b(?:[^\n:]{0,40}:|[ \t]*-)").unwrap());

// A line opening with "cost" after at most two words and no separator: "Estimated cost $20"
static COST_LINE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?im)^[ \t]*(?:#+[ \t]*|\*\*|__)?(?:[a-z]+[ \t]+){0,2}cost\b").unwrap()
});

// Numbered ("1." / "1)") or bulleted ("-", "*", "•") line starts
static LIST_ITEM_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\n[ \t]*(?:\d+[.)]|[-*•])[ \t]*").unwrap());

const MARKUP: &[char] = &['*', '#', '_', '>'];

pub fn parse_response(raw: &str) -> GenerationResult {
    let (sql, rest) = split_sql(raw);

    let explanation_marker = EXPLANATION_REGEX.find(&rest);
    let search_from = explanation_marker.map_or(0, |m| m.end());
    // Suggestions usually follow the explanation but may come first
    let suggestions_marker = SUGGESTIONS_REGEX
        .find_at(&rest, search_from)
        .or_else(|| SUGGESTIONS_REGEX.find(&rest));

    let explanation = explanation_marker
        .map(|marker| {
            let start = body_start(&rest, marker.end());
            let end = next_boundary(&rest, marker.end(), start);
            slice(&rest, start, end).trim().to_string()
        })
        .filter(|text| !text.is_empty())
        .unwrap_or_else(|| DEFAULT_EXPLANATION.to_string());

    let mut suggestions = suggestions_marker
        .map(|marker| {
            let start = body_start(&rest, marker.end());
            let end = [
                find_cost(&rest, marker.end()).map(|cost| cost.start()),
                explanation_marker
                    .map(|explanation| explanation.start())
                    .filter(|&explanation| explanation > marker.end()),
            ]
            .into_iter()
            .flatten()
            .map(|boundary| section_end(&rest, boundary, start))
            .min()
            .unwrap_or(rest.len());
            split_list(slice(&rest, start, end))
        })
        .unwrap_or_default();
    if suggestions.is_empty() {
        suggestions.push(DEFAULT_SUGGESTION.to_string());
    }

    let estimated_cost = find_cost(&rest, 0).and_then(|marker| cost_value(&rest, marker.end()));

    debug!(
        sql_chars = sql.len(),
        suggestions = suggestions.len(),
        has_cost = estimated_cost.is_some(),
        "Parsed model response"
    );

    GenerationResult {
        sql,
        explanation,
        suggestions,
        estimated_cost,
    }
}

// Returns the SQL and the text left once the fence is cut out. Without a fence the whole
// response stands in for the SQL.
fn split_sql(raw: &str) -> (String, String) {
    if let Some(caps) = SQL_FENCE_REGEX.captures(raw) {
        if let (Some(whole), Some(body)) = (caps.get(0), caps.get(1)) {
            let rest = format!("{}\n{}", &raw[..whole.start()], &raw[whole.end()..]);
            return (body.as_str().trim().to_string(), rest);
        }
    }

    debug!("No fenced SQL block found, using the full response as SQL");
    (raw.to_string(), raw.to_string())
}

fn slice(text: &str, start: usize, end: usize) -> &str {
    if start >= end { "" } else { &text[start..end] }
}

// Where a section's text begins. A heading such as "## Design Explanation" or
// "**Suggestions:**" starts its body on the following line; "Explanation: ..." keeps it inline.
fn body_start(text: &str, marker_end: usize) -> usize {
    let line_end = text[marker_end..]
        .find('\n')
        .map_or(text.len(), |i| marker_end + i);
    let tail = text[marker_end..line_end]
        .trim_end()
        .trim_end_matches(MARKUP)
        .trim_end();

    if tail.is_empty() || tail.ends_with(':') {
        return line_end;
    }

    let inline = text[marker_end..line_end]
        .trim_start_matches(|c: char| c == ':' || c == '-' || c.is_whitespace() || MARKUP.contains(&c));
    line_end - inline.len()
}

// End of the explanation: the next suggestions or cost marker, whichever comes first.
fn next_boundary(text: &str, from: usize, floor: usize) -> usize {
    [SUGGESTIONS_REGEX.find_at(text, from), find_cost(text, from)]
        .into_iter()
        .flatten()
        .map(|m| section_end(text, m.start(), floor))
        .min()
        .unwrap_or(text.len())
}

fn line_start(text: &str, pos: usize) -> usize {
    text[..pos].rfind('\n').map_or(0, |i| i + 1)
}

// First cost marker at or after `from`. On a shared line the form with a separator wins, since it
// ends past words like "Analysis".
fn find_cost(text: &str, from: usize) -> Option<Match<'_>> {
    let marked = COST_REGEX.find_at(text, from);
    let bare = COST_LINE_REGEX.find_at(text, from);
    match (marked, bare) {
        (Some(marked), Some(bare)) if bare.start() < line_start(text, marked.start()) => Some(bare),
        (Some(marked), _) => Some(marked),
        (None, bare) => bare,
    }
}

// A marker that opens its own heading line ("**Estimated Cost:**") ends the previous section at
// the start of that line, so its decoration does not leak into the text before it.
fn section_end(text: &str, marker_start: usize, floor: usize) -> usize {
    let line_start = line_start(text, marker_start);
    let lead = text[line_start..marker_start]
        .trim_matches(|c: char| c.is_whitespace() || MARKUP.contains(&c));

    if line_start >= floor && lead.split_whitespace().count() <= 2 {
        line_start
    } else {
        marker_start
    }
}

fn split_list(body: &str) -> Vec<String> {
    let body = format!("\n{}", body);
    LIST_ITEM_REGEX
        .split(&body)
        .map(|item| item.trim())
        .filter(|item| item.chars().any(char::is_alphanumeric))
        .map(str::to_string)
        .collect()
}

fn cost_value(text: &str, marker_end: usize) -> Option<String> {
    let clean = |s: &str| {
        s.trim_matches(|c: char| c.is_whitespace() || MARKUP.contains(&c))
            .to_string()
    };

    let line_end = text[marker_end..]
        .find('\n')
        .map_or(text.len(), |i| marker_end + i);
    let same_line = clean(text[marker_end..line_end].trim_start_matches(|c: char| {
        c == ':' || c == '-' || c.is_whitespace() || MARKUP.contains(&c)
    }));
    if !same_line.is_empty() {
        return Some(same_line);
    }

    text[line_end..]
        .lines()
        .map(clean)
        .find(|line| !line.is_empty())
}
