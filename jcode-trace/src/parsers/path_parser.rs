//! Homework directory resolution
//!
//! Paths arrive from the kernel untouched, so they are validated and
//! normalized lexically before any lookup. A path outside the supported
//! project roots is a normal outcome (`Ok(None)`); a path that breaks the
//! data contract is an error.

use crate::errors::PathParseError;
use regex::Regex;
use std::sync::OnceLock;

/// `/home/<user>/hwN` and `/workspace/<project>/hwN`, N in 0..=20.
const HOMEWORK_PATTERN: &str =
    r"^/(?:home|workspace)/[^/]+/(hw(?:[0-9]|1[0-9]|20))(?:/|$)";

fn homework_regex() -> &'static Regex {
    static HOMEWORK: OnceLock<Regex> = OnceLock::new();
    HOMEWORK.get_or_init(|| Regex::new(HOMEWORK_PATTERN).expect("homework pattern is valid"))
}

fn is_homework_segment(segment: &str) -> bool {
    segment
        .strip_prefix("hw")
        .is_some_and(|digits| !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()))
}

pub struct PathParser;

impl PathParser {
    /// Returns the `hwN` token of the homework directory containing `path`.
    pub fn parse(path: &str) -> Result<Option<String>, PathParseError> {
        if path.is_empty() {
            return Err(PathParseError::EmptyPath);
        }

        if path.chars().any(char::is_control) {
            return Err(PathParseError::ControlCharacter {
                path: path.to_string(),
            });
        }

        let normalized = Self::normalize(path);
        if !normalized.starts_with('/') {
            return Err(PathParseError::NotAbsolute { path: normalized });
        }

        let count = normalized
            .split('/')
            .filter(|segment| is_homework_segment(segment))
            .count();
        if count > 1 {
            return Err(PathParseError::NestedHomeworkDirectory {
                path: normalized,
                count,
            });
        }

        Ok(homework_regex()
            .captures(&normalized)
            .and_then(|captures| captures.get(1))
            .map(|token| token.as_str().to_string()))
    }

    /// Collapses `.`, `..` and repeated separators without touching the
    /// filesystem. `..` never climbs above `/`.
    pub fn normalize(path: &str) -> String {
        let absolute = path.starts_with('/');
        let mut segments: Vec<&str> = Vec::new();

        for segment in path.split('/') {
            match segment {
                "" | "." => {}
                ".." => match segments.last() {
                    Some(&last) if last != ".." => {
                        segments.pop();
                    }
                    _ if absolute => {}
                    _ => segments.push(".."),
                },
                other => segments.push(other),
            }
        }

        let joined = segments.join("/");
        if absolute {
            format!("/{}", joined)
        } else if joined.is_empty() {
            ".".to_string()
        } else {
            joined
        }
    }
}
