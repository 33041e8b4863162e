//! Tokenizer for interpolation references embedded in string scalars.
//!
//! The wire syntax is `${resolver:argument,k1=v1,k2=v2}` with `\$` and `\\`
//! escapes. A token body without a `:` is a self-reference into the owning
//! document (`${db.host}`). Tokens nest; the scanner only recognizes
//! delimiters at nesting depth zero and leaves inner token text untouched
//! so the resolution engine can re-parse it inner-first.

use crate::error::Error;
use regex::Regex;
use std::sync::OnceLock;

/// One piece of a scanned scalar: literal text or an interpolation token.
#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    Literal(String),
    Token(Token),
}

/// A single `${...}` occurrence.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// `${path.to.key}` — a dotted path into the same document.
    SelfRef { path: String },
    /// `${name:arg,k=v,...}` — dispatch to a named resolver. `arg` and the
    /// kwarg values are raw and may contain nested tokens.
    Call {
        name: String,
        arg: String,
        kwargs: Vec<(String, String)>,
    },
}

fn name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("static regex"))
}

fn self_ref_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z0-9._-]+$").expect("static regex"))
}

/// Whether `name` is acceptable as a resolver name.
pub(crate) fn is_valid_name(name: &str) -> bool {
    name_pattern().is_match(name)
}

/// Cheap pre-check used by the raw-validation mode and fast paths.
pub(crate) fn contains_token(input: &str) -> bool {
    let bytes = input.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b'$' if bytes.get(i + 1) == Some(&b'{') => return true,
            _ => i += 1,
        }
    }
    false
}

/// Scan a scalar into literal and token segments, applying the `\$` and
/// `\\` escapes in literal text. Malformed tokens are a parse error for the
/// whole scalar.
pub fn parse(input: &str) -> Result<Vec<Segment>, Error> {
    let chars: Vec<char> = input.chars().collect();
    let mut segments = Vec::new();
    let mut literal = String::new();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if c == '\\' && i + 1 < chars.len() {
            match chars[i + 1] {
                '$' => literal.push('$'),
                '\\' => literal.push('\\'),
                other => {
                    literal.push('\\');
                    literal.push(other);
                }
            }
            i += 2;
        } else if c == '$' && chars.get(i + 1) == Some(&'{') {
            let (body, next) = scan_body(&chars, i + 2, input)?;
            if !literal.is_empty() {
                segments.push(Segment::Literal(std::mem::take(&mut literal)));
            }
            segments.push(Segment::Token(parse_token(&body)?));
            i = next;
        } else {
            literal.push(c);
            i += 1;
        }
    }
    if !literal.is_empty() {
        segments.push(Segment::Literal(literal));
    }
    Ok(segments)
}

/// Collect the raw token body up to the matching close brace, keeping
/// escapes and nested tokens intact. Returns the body and the index just
/// past the `}`.
fn scan_body(chars: &[char], start: usize, scalar: &str) -> Result<(String, usize), Error> {
    let mut body = String::new();
    let mut depth = 0usize;
    let mut i = start;
    while i < chars.len() {
        let c = chars[i];
        if c == '\\' && i + 1 < chars.len() {
            body.push(c);
            body.push(chars[i + 1]);
            i += 2;
            continue;
        }
        if c == '$' && chars.get(i + 1) == Some(&'{') {
            depth += 1;
            body.push_str("${");
            i += 2;
            continue;
        }
        if c == '}' {
            if depth == 0 {
                return Ok((body, i + 1));
            }
            depth -= 1;
        }
        body.push(c);
        i += 1;
    }
    Err(Error::Parse(format!(
        "unterminated interpolation token in {scalar:?}"
    )))
}

fn parse_token(body: &str) -> Result<Token, Error> {
    let parts = split_top_level(body);
    let head = parts.first().cloned().unwrap_or_default();

    match find_top_level_colon(&head) {
        Some(idx) => {
            let name = head[..idx].to_string();
            let arg = head[idx + 1..].to_string();
            if !is_valid_name(&name) {
                return Err(Error::Parse(format!(
                    "invalid resolver name '{name}' in token '${{{body}}}'"
                )));
            }
            let mut kwargs = Vec::with_capacity(parts.len().saturating_sub(1));
            for part in &parts[1..] {
                let Some((key, value)) = part.split_once('=') else {
                    return Err(Error::Parse(format!(
                        "malformed kwarg '{part}' in token '${{{body}}}': expected key=value"
                    )));
                };
                if !is_valid_name(key) {
                    return Err(Error::Parse(format!(
                        "invalid kwarg name '{key}' in token '${{{body}}}'"
                    )));
                }
                kwargs.push((key.to_string(), value.to_string()));
            }
            Ok(Token::Call { name, arg, kwargs })
        }
        None => {
            if parts.len() > 1 {
                return Err(Error::Parse(format!(
                    "self-reference '${{{body}}}' does not take arguments"
                )));
            }
            if self_ref_pattern().is_match(&head) {
                Ok(Token::SelfRef { path: head })
            } else {
                Err(Error::Parse(format!(
                    "malformed interpolation token '${{{body}}}': missing ':'"
                )))
            }
        }
    }
}

/// Split a token body on commas at nesting depth zero. `\,` and `\}` become
/// the literal character here; `\$` and `\\` are left for the later literal
/// pass; text inside nested tokens is copied verbatim.
fn split_top_level(body: &str) -> Vec<String> {
    let chars: Vec<char> = body.chars().collect();
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if c == '\\' && i + 1 < chars.len() {
            let next = chars[i + 1];
            if depth == 0 && (next == ',' || next == '}') {
                current.push(next);
            } else {
                current.push(c);
                current.push(next);
            }
            i += 2;
            continue;
        }
        if c == '$' && chars.get(i + 1) == Some(&'{') {
            depth += 1;
            current.push_str("${");
            i += 2;
            continue;
        }
        if c == '}' && depth > 0 {
            depth -= 1;
        } else if c == ',' && depth == 0 {
            parts.push(std::mem::take(&mut current));
            i += 1;
            continue;
        }
        current.push(c);
        i += 1;
    }
    parts.push(current);
    parts
}

/// First `:` outside any nested token, if any.
fn find_top_level_colon(head: &str) -> Option<usize> {
    let chars: Vec<char> = head.chars().collect();
    let mut depth = 0usize;
    let mut i = 0;
    let mut byte_offset = 0;
    while i < chars.len() {
        let c = chars[i];
        if c == '\\' && i + 1 < chars.len() {
            byte_offset += c.len_utf8() + chars[i + 1].len_utf8();
            i += 2;
            continue;
        }
        if c == '$' && chars.get(i + 1) == Some(&'{') {
            depth += 1;
            byte_offset += 2;
            i += 2;
            continue;
        }
        if c == '}' && depth > 0 {
            depth -= 1;
        } else if c == ':' && depth == 0 {
            return Some(byte_offset);
        }
        byte_offset += c.len_utf8();
        i += 1;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn literal(text: &str) -> Segment {
        Segment::Literal(text.to_string())
    }

    #[test]
    fn test_plain_text_passes_through() {
        assert_eq!(parse("hello").unwrap(), vec![literal("hello")]);
        assert_eq!(parse("").unwrap(), vec![]);
    }

    #[test]
    fn test_escapes() {
        assert_eq!(parse(r"\${env:X}").unwrap(), vec![literal("${env:X}")]);
        assert_eq!(parse(r"a\\b").unwrap(), vec![literal(r"a\b")]);
        assert_eq!(parse(r"win\path").unwrap(), vec![literal(r"win\path")]);
    }

    #[test]
    fn test_single_resolver_token() {
        assert_eq!(
            parse("${env:HOME}").unwrap(),
            vec![Segment::Token(Token::Call {
                name: "env".to_string(),
                arg: "HOME".to_string(),
                kwargs: vec![],
            })]
        );
    }

    #[test]
    fn test_kwargs() {
        let segments = parse("${env:PORT,default=8080,sensitive=true}").unwrap();
        assert_eq!(
            segments,
            vec![Segment::Token(Token::Call {
                name: "env".to_string(),
                arg: "PORT".to_string(),
                kwargs: vec![
                    ("default".to_string(), "8080".to_string()),
                    ("sensitive".to_string(), "true".to_string()),
                ],
            })]
        );
    }

    #[test]
    fn test_escaped_comma_in_arg() {
        let segments = parse(r"${env:A\,B}").unwrap();
        assert_eq!(
            segments,
            vec![Segment::Token(Token::Call {
                name: "env".to_string(),
                arg: "A,B".to_string(),
                kwargs: vec![],
            })]
        );
    }

    #[test]
    fn test_self_reference() {
        assert_eq!(
            parse("${db.host}").unwrap(),
            vec![Segment::Token(Token::SelfRef {
                path: "db.host".to_string()
            })]
        );
    }

    #[test]
    fn test_mixed_text_and_tokens() {
        let segments = parse("postgres://${db.host}:${db.port}/app").unwrap();
        assert_eq!(
            segments,
            vec![
                literal("postgres://"),
                Segment::Token(Token::SelfRef {
                    path: "db.host".to_string()
                }),
                literal(":"),
                Segment::Token(Token::SelfRef {
                    path: "db.port".to_string()
                }),
                literal("/app"),
            ]
        );
    }

    #[test]
    fn test_nested_token_kept_raw() {
        let segments = parse("${file:${env:CONF_DIR}/app.yaml}").unwrap();
        assert_eq!(
            segments,
            vec![Segment::Token(Token::Call {
                name: "file".to_string(),
                arg: "${env:CONF_DIR}/app.yaml".to_string(),
                kwargs: vec![],
            })]
        );
    }

    #[test]
    fn test_nested_token_with_kwargs_kept_whole() {
        let segments = parse("${file:${env:A,default=d}/x,default=y}").unwrap();
        assert_eq!(
            segments,
            vec![Segment::Token(Token::Call {
                name: "file".to_string(),
                arg: "${env:A,default=d}/x".to_string(),
                kwargs: vec![("default".to_string(), "y".to_string())],
            })]
        );
    }

    #[test]
    fn test_unterminated_token() {
        let err = parse("${env:HOME").unwrap_err();
        assert!(err.to_string().contains("unterminated"));
    }

    #[test]
    fn test_missing_colon_with_illegal_chars() {
        let err = parse("${not a path}").unwrap_err();
        assert!(err.to_string().contains("missing ':'"));
    }

    #[test]
    fn test_self_reference_rejects_arguments() {
        let err = parse("${db.host,default=x}").unwrap_err();
        assert!(err.to_string().contains("does not take arguments"));
    }

    #[test]
    fn test_invalid_resolver_name() {
        let err = parse("${9bad:arg}").unwrap_err();
        assert!(err.to_string().contains("invalid resolver name"));
    }

    #[test]
    fn test_contains_token() {
        assert!(contains_token("a ${env:X} b"));
        assert!(!contains_token(r"a \${env:X} b"));
        assert!(!contains_token("plain"));
    }
}
