//! Leading doc-comment parsing.
//!
//! Only the first comment of a file is considered, and only when nothing but
//! whitespace precedes it:
//!
//! ```text
//! /**
//!  * @providesModule Button
//!  * @extern
//!  */
//! ```

use indexmap::IndexMap;
use memchr::memmem;
use regex::Regex;
use std::sync::LazyLock;

static DIRECTIVE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^\s*@(\S+)[ \t]*(.*?)\s*$").ok());

/// Streaming predicate for `read_until`: keep reading while the content so
/// far is blank or an unterminated leading comment.
pub fn in_docblock(content: &str) -> bool {
    let trimmed = content.trim_start();
    if trimmed.is_empty() {
        return true;
    }
    // A lone "/" may still become "/*" in the next chunk
    if trimmed == "/" {
        return true;
    }
    if !trimmed.starts_with("/*") {
        return false;
    }
    memmem::find(trimmed.as_bytes(), b"*/").is_none()
}

/// The leading comment of `source`, delimiters included.
pub fn extract(source: &str) -> Option<&str> {
    let trimmed = source.trim_start();
    if !trimmed.starts_with("/*") {
        return None;
    }
    let end = memmem::find(&trimmed.as_bytes()[2..], b"*/")? + 4;
    Some(&trimmed[..end])
}

/// Parsed directives of a doc block, in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocBlock {
    directives: IndexMap<String, String>,
}

impl DocBlock {
    /// Parse the leading comment of `source`. Sources without one yield an
    /// empty block.
    pub fn parse(source: &str) -> Self {
        let Some(comment) = extract(source) else {
            return Self::default();
        };

        let body = comment
            .trim_start_matches('/')
            .trim_start_matches('*')
            .trim_end_matches('/')
            .trim_end_matches('*');

        let mut directives = IndexMap::new();
        for line in body.lines() {
            let line = line.trim_start().trim_start_matches('*');
            if let Some(captures) = DIRECTIVE.as_ref().and_then(|re| re.captures(line)) {
                directives.insert(captures[1].to_string(), captures[2].to_string());
            }
        }

        Self { directives }
    }

    pub fn get(&self, directive: &str) -> Option<&str> {
        self.directives.get(directive).map(String::as_str)
    }

    pub fn contains(&self, directive: &str) -> bool {
        self.directives.contains_key(directive)
    }

    /// Declared global name: first token of `@providesModule` or `@provides`.
    pub fn provides_module(&self) -> Option<&str> {
        self.get("providesModule")
            .or_else(|| self.get("provides"))
            .and_then(|value| value.split_whitespace().next())
    }

    /// `@extern` modules are prebuilt and their requires are not followed.
    pub fn is_extern(&self) -> bool {
        self.contains("extern")
    }
}
