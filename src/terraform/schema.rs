use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::TerraformError;

static VARIABLE_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?m)^[ \t]*(variable)[ \t]+"([^"]+)"[ \t]*\{"#).expect("valid variable regex")
});

static HEREDOC_START: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^<<-?([A-Za-z_][A-Za-z0-9_-]*)[ \t]*\r?\n").expect("valid heredoc regex")
});

static DEFAULT_ATTRIBUTE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^[ \t]*default[ \t]*=").expect("valid default regex"));

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariableDecl {
    pub name: String,
    pub required: bool,
}

/// Input variables a module declares, in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariableSchema {
    pub variables: Vec<VariableDecl>,
}

impl VariableSchema {
    pub fn new(variables: Vec<VariableDecl>) -> Self {
        Self { variables }
    }

    /// Treats every key of a known-good variable set as required.
    pub fn all_required<'a, I>(names: I) -> Self
    where
        I: IntoIterator<Item = &'a String>,
    {
        Self {
            variables: names
                .into_iter()
                .map(|name| VariableDecl {
                    name: name.clone(),
                    required: true,
                })
                .collect(),
        }
    }

    /// Reads `variable` blocks from the top-level `*.tf` files of a module.
    ///
    /// A variable is required when its block has no `default` attribute. Files are read in
    /// name order so the result is stable across platforms.
    pub fn from_module_dir(module_dir: &Path) -> Result<Self, TerraformError> {
        let mut files: Vec<_> = std::fs::read_dir(module_dir)?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.is_file() && path.extension().is_some_and(|ext| ext == "tf"))
            .collect();
        files.sort();

        let mut schema = Self::default();
        for file in files {
            let source = std::fs::read_to_string(&file)?;
            schema.variables.extend(parse_variables(&source));
        }

        tracing::debug!(
            module = %module_dir.display(),
            declared = schema.variables.len(),
            required = schema.required().count(),
            "variable schema loaded"
        );

        Ok(schema)
    }

    pub fn required(&self) -> impl Iterator<Item = &VariableDecl> {
        self.variables.iter().filter(|v| v.required)
    }

    pub fn get(&self, name: &str) -> Option<&VariableDecl> {
        self.variables.iter().find(|v| v.name == name)
    }
}

fn parse_variables(source: &str) -> Vec<VariableDecl> {
    let code = code_only(source);

    VARIABLE_BLOCK
        .captures_iter(source)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let keyword = caps.get(1)?;
            // Headers inside comments, strings or heredocs are blanked out of `code`.
            if !code[keyword.start()..].starts_with("variable") {
                return None;
            }
            let name = caps.get(2)?.as_str().to_string();
            let body = block_body(&code[whole.end()..]);
            Some(VariableDecl {
                name,
                required: !DEFAULT_ATTRIBUTE.is_match(&top_level(body)),
            })
        })
        .collect()
}

#[derive(Debug, Clone, Copy)]
enum Literal {
    Quoted,
    Interpolation(usize),
}

// Same-length copy of `source` with string literals, heredoc bodies and comments blanked to
// spaces. Newlines are kept so line anchors still line up.
fn code_only(source: &str) -> String {
    let bytes = source.as_bytes();
    let mut out = bytes.to_vec();
    let mut stack: Vec<Literal> = Vec::new();
    let mut i = 0usize;

    while i < bytes.len() {
        let rest = &bytes[i..];
        let end = match stack.last().copied() {
            Some(Literal::Quoted) => {
                if rest[0] == b'\\' {
                    i + 2
                } else if rest.starts_with(b"${") || rest.starts_with(b"%{") {
                    stack.push(Literal::Interpolation(0));
                    i + 2
                } else {
                    if rest[0] == b'"' {
                        stack.pop();
                    }
                    i + 1
                }
            }
            Some(Literal::Interpolation(depth)) => {
                match rest[0] {
                    b'"' => stack.push(Literal::Quoted),
                    b'{' => set_top(&mut stack, Literal::Interpolation(depth + 1)),
                    b'}' if depth == 0 => {
                        stack.pop();
                    }
                    b'}' => set_top(&mut stack, Literal::Interpolation(depth - 1)),
                    _ => {}
                }
                i + 1
            }
            None if rest[0] == b'#' || rest.starts_with(b"//") => source[i..]
                .find('\n')
                .map_or(bytes.len(), |offset| i + offset),
            None if rest.starts_with(b"/*") => source[i + 2..]
                .find("*/")
                .map_or(bytes.len(), |offset| i + 2 + offset + 2),
            None if rest.starts_with(b"<<") => match heredoc_end(source, i) {
                Some(end) => end,
                None => {
                    i += 2;
                    continue;
                }
            },
            None if rest[0] == b'"' => {
                stack.push(Literal::Quoted);
                i + 1
            }
            None => {
                i += 1;
                continue;
            }
        };

        let end = end.min(bytes.len());
        for byte in &mut out[i..end] {
            if *byte != b'\n' {
                *byte = b' ';
            }
        }
        i = end;
    }

    String::from_utf8_lossy(&out).into_owned()
}

fn set_top(stack: &mut [Literal], literal: Literal) {
    if let Some(top) = stack.last_mut() {
        *top = literal;
    }
}

// End of a heredoc starting at `start` (just past its closing marker line), or `None` when
// `<<` does not open one. An unterminated heredoc runs to the end of the source.
fn heredoc_end(source: &str, start: usize) -> Option<usize> {
    let caps = HEREDOC_START.captures(&source[start..])?;
    let marker = caps.get(1)?.as_str();
    let mut pos = start + caps.get(0)?.end();

    for line in source[pos..].split_inclusive('\n') {
        pos += line.len();
        if line.trim() == marker {
            return Some(pos);
        }
    }

    Some(source.len())
}

// Text up to the brace closing the block that was just opened. Expects `code_only` text.
fn block_body(rest: &str) -> &str {
    let mut depth = 1usize;

    for (idx, byte) in rest.bytes().enumerate() {
        match byte {
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return &rest[..idx];
                }
            }
            _ => {}
        }
    }

    rest
}

// Drops nested blocks (`validation { ... }`) so only attributes of the variable itself remain.
fn top_level(body: &str) -> String {
    let mut depth = 0usize;
    body.chars()
        .filter(|&ch| {
            match ch {
                '{' => depth += 1,
                '}' => depth = depth.saturating_sub(1),
                _ => {}
            }
            depth == 0 || ch == '\n'
        })
        .collect()
}
