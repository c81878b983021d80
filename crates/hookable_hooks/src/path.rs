//! Argument paths.
//!
//! A [`Path`] addresses a value inside a hook's positional arguments. The
//! first segment is always the argument index; the rest walk object keys and
//! array indices. Dotted and bracketed spellings are interchangeable:
//!
//! | Path              | Segments          |
//! |-------------------|-------------------|
//! | `0`               | `0`               |
//! | `0.name`          | `0`, `name`       |
//! | `[0].name`        | `0`, `name`       |
//! | `[0]["na.me"]`    | `0`, `na.me`      |
//! | `1.items[2].id`   | `1`, `items`, `2`, `id` |
//!
//! Resolution never fails: a missing member, a non-container along the way,
//! or an out-of-range index all yield `None`.

use core::fmt;
use core::str::FromStr;
use std::mem;

use crate::value::Value;

/// Errors produced while parsing a [`Path`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PathError {
    /// The path has no segments.
    #[error("path is empty")]
    Empty,
    /// A dot with nothing on one side.
    #[error("empty path segment at byte {position}")]
    EmptySegment {
        /// Byte offset of the offending dot or end of input.
        position: usize,
    },
    /// A `[` without a matching `]`.
    #[error("unclosed bracket starting at byte {position}")]
    Unclosed {
        /// Byte offset of the opening bracket.
        position: usize,
    },
    /// A character that cannot appear where it was found.
    #[error("unexpected '{ch}' at byte {position}")]
    Unexpected {
        /// The offending character.
        ch: char,
        /// Its byte offset.
        position: usize,
    },
}

/// A parsed argument path.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Path {
    source: String,
    segments: Vec<String>,
}

impl Path {
    /// Parses a path expression.
    ///
    /// # Errors
    ///
    /// Returns [`PathError`] when the expression is empty or malformed.
    pub fn parse(source: &str) -> Result<Self, PathError> {
        let mut segments = Vec::new();
        let mut current = String::new();
        let mut chars = source.char_indices().peekable();
        // Set at the start of input and after each dot.
        let mut need_segment = true;

        while let Some((position, ch)) = chars.next() {
            match ch {
                '.' => {
                    if need_segment {
                        return Err(PathError::EmptySegment { position });
                    }
                    if !current.is_empty() {
                        segments.push(mem::take(&mut current));
                    }
                    need_segment = true;
                }
                '[' => {
                    if !current.is_empty() {
                        segments.push(mem::take(&mut current));
                    }
                    segments.push(parse_bracket(&mut chars, position)?);
                    need_segment = false;
                }
                ']' => return Err(PathError::Unexpected { ch, position }),
                _ => {
                    // `[0]name` is missing its dot.
                    if !need_segment && current.is_empty() {
                        return Err(PathError::Unexpected { ch, position });
                    }
                    current.push(ch);
                    need_segment = false;
                }
            }
        }

        if need_segment {
            return Err(if segments.is_empty() {
                PathError::Empty
            } else {
                PathError::EmptySegment {
                    position: source.len(),
                }
            });
        }
        if !current.is_empty() {
            segments.push(current);
        }

        Ok(Self {
            source: source.to_owned(),
            segments,
        })
    }

    /// Returns the path as it was written.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Returns the parsed segments.
    #[must_use]
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Resolves the path against positional arguments.
    ///
    /// The first segment must be a decimal argument index.
    #[must_use]
    pub fn resolve(&self, args: &[Value]) -> Option<Value> {
        let (first, rest) = self.segments.split_first()?;
        let index = first.parse::<usize>().ok()?;
        let mut node = args.get(index)?.clone();
        for segment in rest {
            node = node.get(segment)?;
        }
        Some(node)
    }
}

fn parse_bracket(
    chars: &mut core::iter::Peekable<core::str::CharIndices<'_>>,
    open: usize,
) -> Result<String, PathError> {
    let unclosed = PathError::Unclosed { position: open };
    let mut segment = String::new();

    match chars.peek().copied() {
        Some((_, quote @ ('"' | '\''))) => {
            chars.next();
            loop {
                match chars.next() {
                    Some((_, ch)) if ch == quote => break,
                    Some((_, ch)) => segment.push(ch),
                    None => return Err(unclosed),
                }
            }
            match chars.next() {
                Some((_, ']')) => Ok(segment),
                Some((position, ch)) => Err(PathError::Unexpected { ch, position }),
                None => Err(unclosed),
            }
        }
        _ => {
            loop {
                match chars.next() {
                    Some((_, ']')) => break,
                    Some((position, '[')) => {
                        return Err(PathError::Unexpected { ch: '[', position });
                    }
                    Some((_, ch)) => segment.push(ch),
                    None => return Err(unclosed),
                }
            }
            let trimmed = segment.trim();
            if trimmed.is_empty() {
                return Err(PathError::EmptySegment { position: open });
            }
            Ok(trimmed.to_owned())
        }
    }
}

impl FromStr for Path {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Debug for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Path({:?})", self.source)
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn segments(path: &str) -> Vec<String> {
        Path::parse(path)
            .expect("path should parse")
            .segments()
            .to_vec()
    }

    #[test]
    fn dotted_and_bracketed_spellings_agree() {
        assert_eq!(segments("0.name"), vec!["0", "name"]);
        assert_eq!(segments("[0].name"), vec!["0", "name"]);
        assert_eq!(segments("[0][\"name\"]"), vec!["0", "name"]);
        assert_eq!(segments("[0]['na.me']"), vec!["0", "na.me"]);
        assert_eq!(segments("1.items[2].id"), vec!["1", "items", "2", "id"]);
    }

    #[test]
    fn malformed_paths_are_rejected() {
        assert_eq!(Path::parse(""), Err(PathError::Empty));
        assert_eq!(
            Path::parse(".a"),
            Err(PathError::EmptySegment { position: 0 })
        );
        assert_eq!(
            Path::parse("a."),
            Err(PathError::EmptySegment { position: 2 })
        );
        assert_eq!(
            Path::parse("a[0"),
            Err(PathError::Unclosed { position: 1 })
        );
        assert_eq!(
            Path::parse("[0]x"),
            Err(PathError::Unexpected { ch: 'x', position: 3 })
        );
        assert!(Path::parse("a]").is_err());
        assert!(Path::parse("a[]").is_err());
    }

    #[test]
    fn resolves_into_arguments() {
        let args = vec![
            Value::from(json!({ "name": "n1", "tags": ["x", "y"] })),
            Value::from(2),
        ];

        let path = Path::parse("0.name").expect("valid");
        assert_eq!(path.resolve(&args), Some(Value::from("n1")));

        let path = Path::parse("[0].tags[1]").expect("valid");
        assert_eq!(path.resolve(&args), Some(Value::from("y")));

        let path = Path::parse("1").expect("valid");
        assert_eq!(path.resolve(&args), Some(Value::from(2)));
    }

    #[test]
    fn unresolvable_paths_yield_none() {
        let args = vec![Value::from(json!({ "name": "n1" })), Value::from(2)];

        for path in ["0.missing", "1.name", "5", "name", "0.name.deeper"] {
            let path = Path::parse(path).expect("valid");
            assert_eq!(path.resolve(&args), None, "{path}");
        }
    }

    #[test]
    fn resolution_preserves_identity() {
        let inner = Value::from(json!({ "id": 1 }));
        let outer = crate::value::Object::new();
        outer.insert("inner", inner.clone());
        let args = vec![Value::from(outer)];

        let resolved = Path::parse("0.inner")
            .expect("valid")
            .resolve(&args)
            .expect("present");

        assert!(resolved.same(&inner));
    }
}
