//! Fact extraction from generated script text.
//!
//! Generated scripts come out of template expansion, so the only handle on an interpolated
//! value is the fixed text around it. A [`ScriptPattern`] describes that skeleton and names
//! the dynamic segments; [`extract_facts`] returns them, or `None` when the skeleton is not
//! there at all.

use std::collections::BTreeMap;
use std::fmt;

use regex::Regex;

/// Named captures from one successful match.
pub type Facts = BTreeMap<String, String>;

/// A compiled skeleton with at least one named capture group.
#[derive(Debug, Clone)]
pub struct ScriptPattern {
    regex: Regex,
}

impl ScriptPattern {
    /// Compiles `pattern` with multi-line (`^`/`$` per line) and dot-all semantics.
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        let regex = Regex::new(&format!("(?ms){pattern}"))?;
        Ok(Self { regex })
    }

    pub fn group_names(&self) -> impl Iterator<Item = &str> {
        self.regex.capture_names().flatten()
    }
}

impl fmt::Display for ScriptPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.regex.as_str())
    }
}

/// Matches `pattern` against `script` and returns every named group that participated.
pub fn extract_facts(script: &str, pattern: &ScriptPattern) -> Option<Facts> {
    let caps = pattern.regex.captures(script)?;
    Some(
        pattern
            .regex
            .capture_names()
            .flatten()
            .filter_map(|name| {
                caps.name(name)
                    .map(|m| (name.to_string(), m.as_str().to_string()))
            })
            .collect(),
    )
}

/// Skeleton of the `formFieldEntries` object injected into the Devolutions web client patch.
///
/// Deliberately pedantic: each lazy wildcard is pinned between anchor lines so it cannot run
/// past the object's closing `};`.
pub const FORM_FIELD_ENTRIES: &str = r#"^const formFieldEntries = \{$.*?^\s+username: \{$.*?^\s*?querySelector.*?,$.*?^\s*value: "(?<username>.+?)",$.*?password: \{$.*?^\s+querySelector: .*?,$.*?^\s*value: "(?<password>.+?)",$.*?^};$"#;

/// Non-blank lines with leading indentation removed. Comparison helper only.
///
/// Splits on `\n` alone, so a CRLF script keeps its trailing `\r` on every line.
pub fn normalized_lines(script: &str) -> Vec<&str> {
    script
        .split('\n')
        .filter(|line| !line.is_empty())
        .map(str::trim_start)
        .collect()
}

/// Expectation about a single normalized line.
#[derive(Debug, Clone)]
pub enum LineMatcher {
    Exact(String),
    Pattern(Regex),
}

impl LineMatcher {
    pub fn exact(line: impl Into<String>) -> Self {
        LineMatcher::Exact(line.into())
    }

    pub fn pattern(pattern: &str) -> Result<Self, regex::Error> {
        Regex::new(pattern).map(LineMatcher::Pattern)
    }

    pub fn matches(&self, line: &str) -> bool {
        match self {
            LineMatcher::Exact(expected) => line == expected,
            LineMatcher::Pattern(regex) => regex.is_match(line),
        }
    }
}

impl fmt::Display for LineMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LineMatcher::Exact(line) => write!(f, "{line:?}"),
            LineMatcher::Pattern(regex) => write!(f, "/{}/", regex.as_str()),
        }
    }
}

/// Matchers with no matching line, in the order given. Empty means every matcher was satisfied.
pub fn missing_lines<'m>(lines: &[&str], matchers: &'m [LineMatcher]) -> Vec<&'m LineMatcher> {
    matchers
        .iter()
        .filter(|matcher| !lines.iter().any(|line| matcher.matches(line)))
        .collect()
}

pub fn contains_all(lines: &[&str], matchers: &[LineMatcher]) -> bool {
    missing_lines(lines, matchers).is_empty()
}
