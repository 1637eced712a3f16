//! Path specification compiler
//!
//! Turns a path specification such as `/roles/user/:id`, `/files/*.txt` or
//! `/api/v[1-3]/(users)/:id` into an anchored regular expression.
//!
//! Productions:
//!
//! - literal characters match themselves; `.+^$|{}\\` are escaped, so `|`
//!   is a literal bar and never an alternation
//! - `:name` matches one or more word characters (`[0-9A-Za-z_]+`)
//! - `*` matches any run of characters; whether it crosses `/` depends on
//!   [`WildcardMode`]
//! - `?` matches any single character
//! - `[`, `]`, `(`, `)` pass through, and so does `-`, so character classes
//!   such as `[a-z]` keep their ranges
//!
//! The whole path must match; `/api/users/*` does not match `/api/users`.

use crate::config::{PatternConfig, WildcardMode};
use crate::error::{AuthzError, Result};
use lru::LruCache;
use parking_lot::Mutex;
use regex::{Regex, RegexBuilder};
use std::fmt;
use std::num::NonZeroUsize;
use tracing::{debug, error};

/// Upper bound on the compiled size of one pattern
const REGEX_SIZE_LIMIT: usize = 1 << 20;

const PARAM_MATCH: &str = "[0-9A-Za-z_]+";

/// A compiled path specification
#[derive(Clone)]
pub struct CompiledPattern {
    source: String,
    regex: Regex,
}

impl CompiledPattern {
    /// The path specification this was compiled from
    pub fn source(&self) -> &str {
        &self.source
    }

    /// The generated regular expression
    pub fn as_regex_str(&self) -> &str {
        self.regex.as_str()
    }

    /// Whole-path match
    pub fn matches(&self, path: &str) -> bool {
        self.regex.is_match(path)
    }
}

impl fmt::Debug for CompiledPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledPattern")
            .field("source", &self.source)
            .field("regex", &self.regex.as_str())
            .finish()
    }
}

impl PartialEq for CompiledPattern {
    fn eq(&self, other: &Self) -> bool {
        self.regex.as_str() == other.regex.as_str()
    }
}

impl Eq for CompiledPattern {}

fn is_word(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Translate a path specification into anchored regex source
pub fn translate(source: &str, mode: WildcardMode) -> String {
    let mut out = String::with_capacity(source.len() * 2 + 2);
    out.push('^');

    let mut chars = source.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            ':' if chars.peek().copied().is_some_and(is_word) => {
                while chars.peek().copied().is_some_and(is_word) {
                    chars.next();
                }
                out.push_str(PARAM_MATCH);
            }
            '*' => out.push_str(match mode {
                WildcardMode::CrossSegment => ".*",
                WildcardMode::SingleSegment => "[^/]*",
            }),
            '?' => out.push('.'),
            '[' | ']' | '(' | ')' => out.push(c),
            '.' | '+' | '^' | '$' | '{' | '}' | '|' | '\\' => {
                out.push('\\');
                out.push(c);
            }
            _ => out.push(c),
        }
    }

    out.push('$');
    out
}

/// Compile a single path specification.
///
/// Pure function of `(source, mode)`.
pub fn compile_pattern(source: &str, mode: WildcardMode) -> Result<CompiledPattern> {
    let translated = translate(source, mode);
    let regex = RegexBuilder::new(&translated)
        .size_limit(REGEX_SIZE_LIMIT)
        .build()
        .map_err(|e| AuthzError::InvalidPattern {
            source_pattern: source.to_string(),
            reason: e.to_string(),
        })?;

    Ok(CompiledPattern {
        source: source.to_string(),
        regex,
    })
}

/// Pattern compiler with an in-process LRU memo.
///
/// Safe to share across requests; only successful compilations are memoized.
pub struct PatternCompiler {
    mode: WildcardMode,
    memo: Mutex<LruCache<String, CompiledPattern>>,
}

impl PatternCompiler {
    pub fn new(config: &PatternConfig) -> Self {
        let capacity = NonZeroUsize::new(config.memo_capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            mode: config.wildcard,
            memo: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn mode(&self) -> WildcardMode {
        self.mode
    }

    /// Compile one specification, served from the memo when possible
    pub fn compile(&self, source: &str) -> Result<CompiledPattern> {
        if let Some(hit) = self.memo.lock().get(source) {
            return Ok(hit.clone());
        }

        let compiled = compile_pattern(source, self.mode)?;
        self.memo.lock().put(source.to_string(), compiled.clone());
        Ok(compiled)
    }

    /// Compile a list, logging and dropping entries that fail
    pub fn compile_all<S: AsRef<str>>(&self, sources: &[S]) -> Vec<CompiledPattern> {
        sources
            .iter()
            .filter_map(|source| match self.compile(source.as_ref()) {
                Ok(pattern) => Some(pattern),
                Err(e) => {
                    error!(pattern = %source.as_ref(), "Error transforming pattern string: {}", e);
                    None
                }
            })
            .collect()
    }

    /// Number of memoized patterns
    pub fn memo_len(&self) -> usize {
        self.memo.lock().len()
    }

    pub fn clear_memo(&self) {
        self.memo.lock().clear();
        debug!("Pattern memo cleared");
    }
}

impl Default for PatternCompiler {
    fn default() -> Self {
        Self::new(&PatternConfig::default())
    }
}
