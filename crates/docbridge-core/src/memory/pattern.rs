use regex::{Regex, RegexBuilder};

use crate::error::{HostError, HostResult};
use crate::host::SearchOptions;

/// Class body shared by the query filter and the text gap when punctuation
/// is ignored: Unicode punctuation plus ASCII symbols such as `+` and `$`.
const PUNCTUATION: &str = r"\p{P}[:punct:]";

/// Compiles a native search query into a regex over the body text.
pub fn compile(query: &str, options: &SearchOptions) -> HostResult<Regex> {
    let body = if options.match_wildcards {
        wildcard_to_regex(query)?
    } else {
        literal_pattern(query, options)?
    };

    if body.is_empty() {
        return Err(HostError::invalid("search text is empty"));
    }

    let mut pattern = format!("(?:{body})");
    if options.match_whole_word || options.match_prefix {
        pattern = format!(r"\b{pattern}");
    }
    if options.match_whole_word || options.match_suffix {
        pattern = format!(r"{pattern}\b");
    }

    RegexBuilder::new(&pattern)
        .case_insensitive(!options.match_case)
        .size_limit(1024 * 100)
        .build()
        .map_err(|err| HostError::invalid(format!("search pattern '{query}' is invalid: {err}")))
}

fn literal_pattern(query: &str, options: &SearchOptions) -> HostResult<String> {
    let gap = match (options.ignore_space, options.ignore_punct) {
        (true, true) => format!(r"[\s{PUNCTUATION}]*"),
        (true, false) => r"\s*".to_string(),
        (false, true) => format!("[{PUNCTUATION}]*"),
        (false, false) => String::new(),
    };
    let punctuation = Regex::new(&format!("^[{PUNCTUATION}]$"))
        .map_err(|err| HostError::invalid(format!("punctuation class is invalid: {err}")))?;

    let pieces: Vec<String> = query
        .chars()
        .filter(|ch| {
            let skip_punct =
                options.ignore_punct && punctuation.is_match(ch.encode_utf8(&mut [0; 4]));
            !(options.ignore_space && ch.is_whitespace() || skip_punct)
        })
        .map(|ch| regex::escape(ch.encode_utf8(&mut [0; 4])))
        .collect();

    Ok(pieces.join(&gap))
}

/// Translates the host wildcard dialect (`?`, `*`, `@`, `[...]`, `[!...]`,
/// `{n,m}`, `<`, `>`, `\x`) into regex syntax.
fn wildcard_to_regex(query: &str) -> HostResult<String> {
    let mut out = String::with_capacity(query.len() * 2);
    let mut chars = query.chars().peekable();
    let mut has_atom = false;

    while let Some(ch) = chars.next() {
        match ch {
            '?' => {
                out.push('.');
                has_atom = true;
            }
            '*' => {
                out.push_str(".*?");
                has_atom = false;
            }
            '@' => {
                if !has_atom {
                    return Err(HostError::invalid("'@' must follow a character or class"));
                }
                out.push('+');
                has_atom = false;
            }
            '{' => {
                if !has_atom {
                    return Err(HostError::invalid("'{' must follow a character or class"));
                }
                let mut counts = String::new();
                loop {
                    match chars.next() {
                        Some('}') => break,
                        Some(c) if c.is_ascii_digit() || c == ',' => counts.push(c),
                        _ => return Err(HostError::invalid("malformed '{n,m}' repetition")),
                    }
                }
                if counts.is_empty() || counts.starts_with(',') {
                    return Err(HostError::invalid("malformed '{n,m}' repetition"));
                }
                out.push('{');
                out.push_str(&counts);
                out.push('}');
                has_atom = false;
            }
            '[' => {
                out.push('[');
                if chars.peek() == Some(&'!') {
                    chars.next();
                    out.push('^');
                }
                let mut closed = false;
                for c in chars.by_ref() {
                    if c == ']' {
                        closed = true;
                        break;
                    }
                    if c == '-' {
                        out.push('-');
                    } else {
                        out.push_str(&regex::escape(c.encode_utf8(&mut [0; 4])));
                    }
                }
                if !closed {
                    return Err(HostError::invalid("unterminated '[' class"));
                }
                out.push(']');
                has_atom = true;
            }
            '<' | '>' => {
                out.push_str(r"\b");
                has_atom = false;
            }
            '(' | ')' => {
                out.push(ch);
                has_atom = ch == ')';
            }
            '\\' => {
                let escaped = chars
                    .next()
                    .ok_or_else(|| HostError::invalid("trailing '\\' in wildcard pattern"))?;
                out.push_str(&regex::escape(escaped.encode_utf8(&mut [0; 4])));
                has_atom = true;
            }
            other => {
                out.push_str(&regex::escape(other.encode_utf8(&mut [0; 4])));
                has_atom = true;
            }
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options() -> SearchOptions {
        SearchOptions::default()
    }

    #[test]
    fn literal_queries_are_escaped() {
        let regex = compile("a.b", &options()).unwrap();
        assert!(regex.is_match("A.B"));
        assert!(!regex.is_match("axb"));
    }

    #[test]
    fn whole_word_respects_boundaries() {
        let regex = compile(
            "cat",
            &SearchOptions {
                match_whole_word: true,
                ..options()
            },
        )
        .unwrap();
        assert!(regex.is_match("a cat sat"));
        assert!(!regex.is_match("concatenate"));
    }

    #[test]
    fn ignore_space_and_punctuation() {
        let regex = compile(
            "New York",
            &SearchOptions {
                ignore_space: true,
                ignore_punct: true,
                ..options()
            },
        )
        .unwrap();
        assert!(regex.is_match("NewYork"));
        assert!(regex.is_match("New-York"));
    }

    #[test]
    fn ignore_punctuation_covers_ascii_symbols() {
        let options = SearchOptions {
            ignore_punct: true,
            ..options()
        };
        let regex = compile("a+b", &options).unwrap();
        assert!(regex.is_match("a+b"));
        assert!(regex.is_match("ab"));
        assert!(regex.is_match("a$|b"));
        assert!(regex.is_match("a\u{2014}b"));

        let regex = compile("cost $5", &options).unwrap();
        assert!(regex.is_match("cost 5"));
    }

    #[test]
    fn translates_wildcards() {
        assert_eq!(wildcard_to_regex("b?t").unwrap(), "b.t");
        assert_eq!(wildcard_to_regex("[!a-c]").unwrap(), "[^a-c]");
        assert_eq!(wildcard_to_regex("1@").unwrap(), "1+");
        assert_eq!(wildcard_to_regex("[0-9]{4}").unwrap(), "[0-9]{4}");
        assert_eq!(wildcard_to_regex(r"\?").unwrap(), r"\?");

        let regex = compile(
            "<[0-9]{4}>",
            &SearchOptions {
                match_wildcards: true,
                ..options()
            },
        )
        .unwrap();
        assert!(regex.is_match("in 2024 we"));
        assert!(!regex.is_match("in 20245 we"));
    }

    #[test]
    fn rejects_malformed_wildcards() {
        assert!(wildcard_to_regex("@a").is_err());
        assert!(wildcard_to_regex("[abc").is_err());
        assert!(wildcard_to_regex("a{x}").is_err());
        assert!(wildcard_to_regex("a\\").is_err());
    }
}
