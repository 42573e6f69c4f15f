//! Line-oriented extraction of fields from CLI output.
//!
//! Every function here is pure and never fails on non-matching text: a miss
//! is `None` or an empty `Vec`. Patterns are compiled once into
//! [`FieldPattern`]s, so an invalid regular expression is reported when the
//! pattern is built, not when it is used.
//!
//! ```
//! use cliconf::parser::{parse_field, FieldPattern};
//!
//! let output = "cable rpd node1\n rpd-index 12\n ucam 2 dcam 11\n";
//! let pattern = FieldPattern::line(r"^\s*rpd-index (?P<value>\d+)").unwrap();
//! assert_eq!(parse_field(output, &pattern).as_deref(), Some("12"));
//! ```

use indexmap::IndexMap;
use regex::{Captures, Regex};
use std::borrow::Cow;
use std::fmt;

use crate::error::{Error, Result};

/// Name of the capture group whose text is the extracted value.
pub const VALUE_GROUP: &str = "value";

/// How a pattern is applied to CLI output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MatchMode {
    /// Applied to each line separately; `^`/`$` anchor the line.
    #[default]
    Line,
    /// Applied to the whole blob; `.` also matches newlines.
    Block,
}

/// A compiled, reusable extraction pattern.
#[derive(Clone)]
pub struct FieldPattern {
    source: String,
    regex: Regex,
    mode: MatchMode,
}

impl FieldPattern {
    /// Compile a pattern applied line by line.
    pub fn line(pattern: &str) -> Result<Self> {
        Self::new(pattern, MatchMode::Line)
    }

    /// Compile a pattern applied across the whole output.
    pub fn block(pattern: &str) -> Result<Self> {
        Self::new(pattern, MatchMode::Block)
    }

    /// Compile a pattern with an explicit mode.
    pub fn new(pattern: &str, mode: MatchMode) -> Result<Self> {
        let compiled = match mode {
            MatchMode::Line => Cow::Borrowed(pattern),
            MatchMode::Block => Cow::Owned(format!("(?ms){}", pattern)),
        };
        let regex = Regex::new(&compiled).map_err(|e| Error::pattern(pattern, e.to_string()))?;
        Ok(Self {
            source: pattern.to_string(),
            regex,
            mode,
        })
    }

    /// Pattern text as written.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Match mode.
    pub fn mode(&self) -> MatchMode {
        self.mode
    }

    /// Names of the capture groups in declaration order.
    pub fn group_names(&self) -> impl Iterator<Item = &str> {
        self.regex.capture_names().flatten()
    }

    /// True when `text` matches anywhere.
    pub fn is_match(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }

    fn value_of(&self, caps: &Captures<'_>) -> String {
        if let Some(m) = caps.name(VALUE_GROUP) {
            return m.as_str().to_string();
        }
        caps.iter()
            .skip(1)
            .flatten()
            .next()
            .or_else(|| caps.get(0))
            .map(|m| m.as_str().to_string())
            .unwrap_or_default()
    }

    fn record_of(&self, caps: &Captures<'_>) -> IndexMap<String, String> {
        self.group_names()
            .filter_map(|name| {
                caps.name(name)
                    .map(|m| (name.to_string(), m.as_str().to_string()))
            })
            .collect()
    }

    /// Every capture set in order of appearance.
    fn captures<'t>(&'t self, output: &'t str) -> Vec<Captures<'t>> {
        match self.mode {
            MatchMode::Line => lines(output)
                .flat_map(|line| self.regex.captures_iter(line))
                .collect(),
            MatchMode::Block => self.regex.captures_iter(output).collect(),
        }
    }
}

impl fmt::Debug for FieldPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldPattern")
            .field("pattern", &self.source)
            .field("mode", &self.mode)
            .finish()
    }
}

/// Lines of `output` with `\r` endings removed.
fn lines(output: &str) -> impl Iterator<Item = &str> {
    output.lines().map(|l| l.trim_end_matches('\r'))
}

fn normalize(output: &str) -> Cow<'_, str> {
    if output.contains('\r') {
        Cow::Owned(output.replace("\r\n", "\n"))
    } else {
        Cow::Borrowed(output)
    }
}

fn indent_of(line: &str) -> usize {
    line.len() - line.trim_start().len()
}

/// Extract the first match, or `None`.
pub fn parse_field(output: &str, pattern: &FieldPattern) -> Option<String> {
    let output = normalize(output);
    let caps = pattern.captures(&output);
    caps.first().map(|c| pattern.value_of(c))
}

/// Extract every match in order of appearance.
pub fn parse_fields(output: &str, pattern: &FieldPattern) -> Vec<String> {
    let output = normalize(output);
    pattern
        .captures(&output)
        .iter()
        .map(|c| pattern.value_of(c))
        .collect()
}

/// True when the pattern matches anywhere in `output`.
pub fn contains(output: &str, pattern: &FieldPattern) -> bool {
    let output = normalize(output);
    match pattern.mode {
        MatchMode::Line => lines(&output).any(|l| pattern.is_match(l)),
        MatchMode::Block => pattern.is_match(&output),
    }
}

/// Where a line sits in the output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineContext<'a> {
    /// The line, without line terminator
    pub line: &'a str,
    /// 1-based line number
    pub line_number: usize,
    /// Closest preceding line with smaller indentation
    pub header: Option<&'a str>,
}

/// Walk `output` annotating each non-blank line with its enclosing header.
fn contexts(output: &str) -> Vec<LineContext<'_>> {
    let mut stack: Vec<(usize, &str)> = Vec::new();
    let mut result = Vec::new();
    for (idx, line) in lines(output).enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let indent = indent_of(line);
        while stack.last().is_some_and(|(i, _)| *i >= indent) {
            stack.pop();
        }
        result.push(LineContext {
            line,
            line_number: idx + 1,
            header: stack.last().map(|(_, h)| h.trim()),
        });
        stack.push((indent, line));
    }
    result
}

/// Extract matches from lines accepted by `predicate`.
///
/// Only line-mode patterns can be filtered per line; a block-mode pattern is
/// applied to the concatenation of the accepted lines.
pub fn parse_fields_where<F>(output: &str, pattern: &FieldPattern, predicate: F) -> Vec<String>
where
    F: Fn(&LineContext<'_>) -> bool,
{
    let accepted: Vec<&str> = contexts(output)
        .into_iter()
        .filter(|ctx| predicate(ctx))
        .map(|ctx| ctx.line)
        .collect();
    match pattern.mode {
        MatchMode::Line => accepted
            .iter()
            .flat_map(|line| pattern.regex.captures_iter(line))
            .map(|c| pattern.value_of(&c))
            .collect(),
        MatchMode::Block => parse_fields(&accepted.join("\n"), pattern),
    }
}

/// All named groups of the first match.
pub fn parse_record(output: &str, pattern: &FieldPattern) -> Option<IndexMap<String, String>> {
    let output = normalize(output);
    let caps = pattern.captures(&output);
    caps.first().map(|c| pattern.record_of(c))
}

/// All named groups of every match.
pub fn parse_records(output: &str, pattern: &FieldPattern) -> Vec<IndexMap<String, String>> {
    let output = normalize(output);
    pattern
        .captures(&output)
        .iter()
        .map(|c| pattern.record_of(c))
        .collect()
}

/// One indentation-delimited block of output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    /// Header line, trimmed
    pub header: String,
    /// Selected value of the header match
    pub value: String,
    /// Named groups of the header match
    pub captures: IndexMap<String, String>,
    /// Lines nested under the header
    pub body: String,
}

/// Split `output` into blocks whose header matches `header`.
///
/// A block runs until the next line indented no deeper than its header.
pub fn sections(output: &str, header: &FieldPattern) -> Vec<Section> {
    let mut result = Vec::new();
    let mut current: Option<(usize, Section, Vec<&str>)> = None;

    for line in lines(output) {
        if let Some((indent, _, body)) = current.as_mut() {
            if line.trim().is_empty() || indent_of(line) > *indent {
                body.push(line);
                continue;
            }
        }
        if let Some((_, mut section, body)) = current.take() {
            section.body = join_body(&body);
            result.push(section);
        }
        if let Some(caps) = header.regex.captures(line) {
            let section = Section {
                header: line.trim().to_string(),
                value: header.value_of(&caps),
                captures: header.record_of(&caps),
                body: String::new(),
            };
            current = Some((indent_of(line), section, Vec::new()));
        }
    }
    if let Some((_, mut section, body)) = current.take() {
        section.body = join_body(&body);
        result.push(section);
    }
    result
}

fn join_body(body: &[&str]) -> String {
    let trimmed_end = body
        .iter()
        .rposition(|l| !l.trim().is_empty())
        .map_or(0, |i| i + 1);
    let mut text = body[..trimmed_end].join("\n");
    if !text.is_empty() {
        text.push('\n');
    }
    text
}

/// Body of the block whose header line equals `header_line`.
pub fn section(output: &str, header_line: &str) -> Option<String> {
    let wanted = header_line.trim();
    let mut indent = None;
    let mut body = Vec::new();
    for line in lines(output) {
        match indent {
            None => {
                if line.trim() == wanted {
                    indent = Some(indent_of(line));
                }
            }
            Some(i) => {
                if line.trim().is_empty() || indent_of(line) > i {
                    body.push(line);
                } else {
                    break;
                }
            }
        }
    }
    indent.map(|_| join_body(&body))
}
