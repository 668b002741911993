//! Regular expression to host wildcard translation.
//!
//! Only the subset of regex syntax with an exact wildcard counterpart is
//! accepted. Everything else is rejected as `Unsupported` rather than mapped
//! to an approximation.

use std::iter::Peekable;
use std::str::Chars;

use crate::error::{BridgeError, BridgeResult};

const WILDCARD_SPECIALS: &[char] = &['?', '*', '@', '[', ']', '{', '}', '<', '>', '(', ')', '\\', '!'];
const DIGIT_CLASS: &str = "0-9";
const WORD_CLASS: &str = "A-Za-z0-9_";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Last {
    Nothing,
    Dot,
    Atom,
    Quantifier,
}

pub fn regex_to_wildcard(pattern: &str) -> BridgeResult<String> {
    let mut out = String::with_capacity(pattern.len() + 8);
    let mut chars = pattern.chars().peekable();
    let mut last = Last::Nothing;

    while let Some(ch) = chars.next() {
        match ch {
            '.' => {
                // The wildcard `*` stops at the shortest match, so a greedy
                // `.*` or `.+` has no exact counterpart.
                if let Some(&next @ ('*' | '+')) = chars.peek() {
                    return Err(unsupported(pattern, &format!("'.{next}'")));
                }
                out.push('?');
                last = Last::Dot;
            }
            '+' => {
                quantifier_target(last, '+')?;
                out.push('@');
                last = Last::Quantifier;
            }
            '{' => {
                quantifier_target(last, '{')?;
                out.push('{');
                out.push_str(&repetition(&mut chars)?);
                out.push('}');
                last = Last::Quantifier;
            }
            '*' | '?' => {
                if last == Last::Nothing {
                    return Err(BridgeError::invalid(format!(
                        "'{ch}' has nothing to repeat in regex '{pattern}'"
                    )));
                }
                return Err(unsupported(pattern, &format!("'{ch}' quantifier")));
            }
            '[' => {
                out.push('[');
                out.push_str(&class(&mut chars, pattern)?);
                out.push(']');
                last = Last::Atom;
            }
            '\\' => {
                let escaped = chars.next().ok_or_else(|| {
                    BridgeError::invalid(format!("regex '{pattern}' ends with a lone '\\'"))
                })?;
                match escaped {
                    'd' => out.push_str(&format!("[{DIGIT_CLASS}]")),
                    'w' => out.push_str(&format!("[{WORD_CLASS}]")),
                    c if c.is_ascii_punctuation() => push_literal(&mut out, c),
                    c => return Err(unsupported(pattern, &format!("'\\{c}'"))),
                }
                last = Last::Atom;
            }
            '|' => return Err(unsupported(pattern, "alternation")),
            '(' | ')' => return Err(unsupported(pattern, "groups")),
            '^' | '$' => return Err(unsupported(pattern, "anchors")),
            other => {
                push_literal(&mut out, other);
                last = Last::Atom;
            }
        }
    }

    if out.is_empty() {
        return Err(BridgeError::invalid("regex pattern is empty"));
    }
    Ok(out)
}

fn quantifier_target(last: Last, quantifier: char) -> BridgeResult<()> {
    match last {
        Last::Atom | Last::Dot => Ok(()),
        Last::Nothing => Err(BridgeError::invalid(format!(
            "'{quantifier}' has nothing to repeat"
        ))),
        Last::Quantifier => Err(BridgeError::Unsupported(format!(
            "stacked or lazy quantifier '{quantifier}' has no wildcard equivalent"
        ))),
    }
}

fn repetition(chars: &mut Peekable<Chars<'_>>) -> BridgeResult<String> {
    let mut counts = String::new();
    loop {
        match chars.next() {
            Some('}') => break,
            Some(c) if c.is_ascii_digit() || c == ',' => counts.push(c),
            _ => return Err(BridgeError::invalid("malformed '{n,m}' repetition in regex")),
        }
    }
    let valid = match counts.split_once(',') {
        Some((min, max)) => {
            !min.is_empty() && !max.contains(',') && min.chars().all(|c| c.is_ascii_digit())
        }
        None => !counts.is_empty(),
    };
    if !valid {
        return Err(BridgeError::invalid(format!(
            "malformed '{{{counts}}}' repetition in regex"
        )));
    }
    Ok(counts)
}

fn class(chars: &mut Peekable<Chars<'_>>, pattern: &str) -> BridgeResult<String> {
    let mut body = String::new();
    if chars.peek() == Some(&'^') {
        chars.next();
        body.push('!');
    }
    while let Some(c) = chars.next() {
        match c {
            ']' if body.is_empty() || body == "!" => body.push(']'),
            ']' => return Ok(body),
            '\\' => match chars.next() {
                Some('d') => body.push_str(DIGIT_CLASS),
                Some('w') => body.push_str(WORD_CLASS),
                Some(escaped) if escaped.is_ascii_punctuation() => body.push(escaped),
                Some(escaped) => {
                    return Err(unsupported(pattern, &format!("'\\{escaped}' inside a class")))
                }
                None => break,
            },
            '[' if chars.peek() == Some(&':') => {
                return Err(unsupported(pattern, "POSIX character classes"))
            }
            other => body.push(other),
        }
    }
    Err(BridgeError::invalid(format!(
        "regex '{pattern}' has an unterminated '[' class"
    )))
}

fn push_literal(out: &mut String, ch: char) {
    if WILDCARD_SPECIALS.contains(&ch) {
        out.push('\\');
    }
    out.push(ch);
}

fn unsupported(pattern: &str, construct: &str) -> BridgeError {
    BridgeError::Unsupported(format!(
        "regex '{pattern}' uses {construct}, which the host wildcard syntax cannot express"
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn kind(pattern: &str) -> ErrorKind {
        regex_to_wildcard(pattern).unwrap_err().kind()
    }

    #[test]
    fn translates_supported_subset() {
        assert_eq!(regex_to_wildcard("20.4").unwrap(), "20?4");
        assert_eq!(regex_to_wildcard(".{2,3}x").unwrap(), "?{2,3}x");
        assert_eq!(regex_to_wildcard(r"\d{4}").unwrap(), "[0-9]{4}");
        assert_eq!(regex_to_wildcard("[^aeiou]+").unwrap(), "[!aeiou]@");
        assert_eq!(regex_to_wildcard(r"\w{2,5}").unwrap(), "[A-Za-z0-9_]{2,5}");
        assert_eq!(regex_to_wildcard(r"v1\.0").unwrap(), "v1.0");
        assert_eq!(regex_to_wildcard(r"what\?").unwrap(), r"what\?");
        assert_eq!(regex_to_wildcard("a@b").unwrap(), r"a\@b");
        assert_eq!(regex_to_wildcard(r"[\d.]").unwrap(), "[0-9.]");
    }

    #[test]
    fn rejects_constructs_without_equivalent() {
        assert_eq!(kind("cat|dog"), ErrorKind::Unsupported);
        assert_eq!(kind("(ab)+"), ErrorKind::Unsupported);
        assert_eq!(kind("^start"), ErrorKind::Unsupported);
        assert_eq!(kind("colou?r"), ErrorKind::Unsupported);
        assert_eq!(kind("ab*"), ErrorKind::Unsupported);
        assert_eq!(kind(r"\bword"), ErrorKind::Unsupported);
        assert_eq!(kind(r"a\sb"), ErrorKind::Unsupported);
        assert_eq!(kind("a+?"), ErrorKind::Unsupported);
        assert_eq!(kind("a.*b"), ErrorKind::Unsupported);
        assert_eq!(kind("a.+b"), ErrorKind::Unsupported);
    }

    #[test]
    fn rejects_malformed_patterns() {
        assert_eq!(kind("+a"), ErrorKind::InvalidArgument);
        assert_eq!(kind("[abc"), ErrorKind::InvalidArgument);
        assert_eq!(kind(r"abc\"), ErrorKind::InvalidArgument);
        assert_eq!(kind("a{x}"), ErrorKind::InvalidArgument);
        assert_eq!(kind(""), ErrorKind::InvalidArgument);
    }
}
