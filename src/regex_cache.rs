//! Compilation of `REGEXP` rule patterns.
//!
//! Patterns follow ECMAScript `RegExp` syntax and semantics without flags: `\d` and `\w` are
//! ASCII-only and `.` does not match line terminators. Lookaround and backreferences are
//! supported, so flag sets authored for other runtimes match the same strings here.
//!
//! By default a pattern is compiled every time a rule is evaluated. [`RegexCache`] is a
//! thread-safe memo of compiled patterns shared by all evaluations of an
//! [`Evaluator`](crate::Evaluator); the results are the same either way.
use std::{
    collections::HashMap,
    sync::{Arc, RwLock},
};

use regress::Regex;

use crate::{Error, Result};

/// Source of compiled regular expressions for rule evaluation.
pub(crate) trait RegexSource {
    fn get_regex(&self, pattern: &str) -> Result<Arc<Regex>>;
}

/// Compiles the pattern on every call.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct CompileEachTime;

impl RegexSource for CompileEachTime {
    fn get_regex(&self, pattern: &str) -> Result<Arc<Regex>> {
        compile(pattern).map(Arc::new)
    }
}

/// Memoizes compiled patterns. Patterns that fail to compile are not cached, so the error is
/// reported on every evaluation that reaches them.
#[derive(Debug, Default)]
pub(crate) struct RegexCache {
    regexes: RwLock<HashMap<String, Arc<Regex>>>,
}

impl RegexCache {
    pub fn new() -> RegexCache {
        RegexCache::default()
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.regexes
            .read()
            .expect("thread holding regex cache lock should not panic")
            .len()
    }
}

impl RegexSource for RegexCache {
    fn get_regex(&self, pattern: &str) -> Result<Arc<Regex>> {
        {
            // self.regexes.read() should always return Ok(). Err() is possible only if the lock is
            // poisoned (writer panicked while holding the lock), which should never happen.
            let regexes = self
                .regexes
                .read()
                .expect("thread holding regex cache lock should not panic");
            if let Some(regex) = regexes.get(pattern) {
                return Ok(regex.clone());
            }
        }

        let regex = Arc::new(compile(pattern)?);

        let mut regexes = self
            .regexes
            .write()
            .expect("thread holding regex cache lock should not panic");
        Ok(regexes
            .entry(pattern.to_owned())
            .or_insert(regex)
            .clone())
    }
}

fn compile(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|err| Error::InvalidRegex {
        pattern: pattern.to_owned(),
        reason: err.to_string(),
    })
}
