//! Conservative JavaScript minification for the bootstrap script.
//!
//! Two passes: comments are stripped, then whitespace is collapsed. String,
//! template and regular expression literals are copied verbatim by both.
//! Line breaks survive wherever dropping them could change automatic
//! semicolon insertion. Anything the scanner cannot account for is an
//! `Err`, and the caller ships the unminified script instead.

use std::iter::Peekable;
use std::str::Chars;

/// A `/` after one of these starts a regular expression, not a division.
const REGEX_PRECEDERS: &str = "(,=:[!&|?{};+-*%<>~^";
/// A line break after one of these can never terminate a statement.
const TIGHT_AFTER: &str = "{;,([=:?&|*%<>!";
/// A line break before one of these can never terminate a statement.
const TIGHT_BEFORE: &str = ")]},;.";

pub fn strip_comments(input: &str) -> Result<String, String> {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '"' | '\'' | '`' => copy_quoted(ch, &mut chars, &mut out)?,
            '/' => match chars.peek() {
                Some('/') => {
                    while let Some(&c) = chars.peek() {
                        if c == '\n' || c == '\r' {
                            break;
                        }
                        chars.next();
                    }
                }
                Some('*') => {
                    chars.next();
                    let mut prev = '\0';
                    let mut closed = false;
                    let mut multiline = false;
                    for c in chars.by_ref() {
                        if prev == '*' && c == '/' {
                            closed = true;
                            break;
                        }
                        multiline |= c == '\n';
                        prev = c;
                    }
                    if !closed {
                        return Err("unterminated block comment".to_string());
                    }
                    // A comment spanning lines still separates statements.
                    out.push(if multiline { '\n' } else { ' ' });
                }
                _ if regex_can_start(&out) => copy_regex(&mut chars, &mut out)?,
                _ => out.push('/'),
            },
            _ => out.push(ch),
        }
    }

    Ok(out)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Gap {
    None,
    Space,
    Newline,
}

/// Input must already be free of comments.
pub fn collapse_whitespace(input: &str) -> Result<String, String> {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();
    let mut gap = Gap::None;

    while let Some(ch) = chars.next() {
        if ch.is_whitespace() {
            let this = if matches!(ch, '\n' | '\r' | '\u{2028}' | '\u{2029}') {
                Gap::Newline
            } else {
                Gap::Space
            };
            gap = gap.max(this);
            continue;
        }

        if gap != Gap::None {
            push_gap(&mut out, gap, ch);
            gap = Gap::None;
        }

        match ch {
            '"' | '\'' | '`' => copy_quoted(ch, &mut chars, &mut out)?,
            '/' if regex_can_start(&out) && !matches!(chars.peek(), Some('/' | '*')) => {
                copy_regex(&mut chars, &mut out)?
            }
            _ => out.push(ch),
        }
    }

    Ok(out)
}

pub fn minify_js(input: &str) -> Result<String, String> {
    let no_comments = strip_comments(input)?;
    collapse_whitespace(&no_comments)
}

fn push_gap(out: &mut String, gap: Gap, next: char) {
    let Some(prev) = out.chars().last() else {
        return;
    };

    let keep_newline =
        gap == Gap::Newline && !TIGHT_AFTER.contains(prev) && !TIGHT_BEFORE.contains(next);
    if keep_newline {
        out.push('\n');
    } else if needs_space(prev, next) {
        out.push(' ');
    }
}

fn needs_space(prev: char, next: char) -> bool {
    // `a + +b` and `a - -b` must not fuse into increment/decrement.
    if (prev == '+' || prev == '-') && prev == next {
        return true;
    }
    if prev == '/' && (next == '/' || next == '*') {
        return true;
    }
    (is_word_char(prev) && is_word_char(next)) || (prev.is_ascii_digit() && next == '.')
}

fn is_word_char(ch: char) -> bool {
    ch.is_alphanumeric() || ch == '_' || ch == '$' || ch == '\\' || !ch.is_ascii()
}

fn regex_can_start(out: &str) -> bool {
    match out.trim_end().chars().last() {
        None => true,
        Some(prev) => REGEX_PRECEDERS.contains(prev),
    }
}

fn copy_quoted(quote: char, chars: &mut Peekable<Chars<'_>>, out: &mut String) -> Result<(), String> {
    out.push(quote);
    while let Some(ch) = chars.next() {
        out.push(ch);
        match ch {
            '\\' => {
                if let Some(escaped) = chars.next() {
                    out.push(escaped);
                }
            }
            '\n' if quote != '`' => {
                return Err(format!("line break inside {quote} string literal"));
            }
            c if c == quote => return Ok(()),
            _ => {}
        }
    }
    Err(format!("unterminated {quote} string literal"))
}

/// The opening `/` has already been consumed.
fn copy_regex(chars: &mut Peekable<Chars<'_>>, out: &mut String) -> Result<(), String> {
    out.push('/');
    let mut in_class = false;
    while let Some(ch) = chars.next() {
        out.push(ch);
        match ch {
            '\\' => {
                if let Some(escaped) = chars.next() {
                    out.push(escaped);
                }
            }
            '[' => in_class = true,
            ']' => in_class = false,
            '/' if !in_class => {
                while let Some(&flag) = chars.peek() {
                    if !flag.is_ascii_alphabetic() {
                        break;
                    }
                    out.push(flag);
                    chars.next();
                }
                return Ok(());
            }
            '\n' => return Err("line break inside regular expression".to_string()),
            _ => {}
        }
    }
    Err("unterminated regular expression".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_block_comments() {
        let input = "/* block comment */ var x = 1;";
        let output = strip_comments(input).unwrap();
        assert!(!output.contains("block comment"));
        assert!(output.contains("var x = 1;"));
    }

    #[test]
    fn test_strip_line_comments() {
        let input = "var x = 1; // line comment\nvar y = 2;";
        let output = strip_comments(input).unwrap();
        assert!(!output.contains("line comment"));
        assert!(output.contains("var x = 1; \nvar y = 2;"));
    }

    #[test]
    fn test_comment_markers_inside_literals_are_kept() {
        let input = r#"var a = "/* no */"; var b = `// no`; var c = /\/\//g;"#;
        let output = strip_comments(input).unwrap();
        assert_eq!(output, input);
    }

    #[test]
    fn test_division_is_not_a_regex() {
        let input = r#"const a = x / y; const ok = /ab/.test("z");"#;
        let output = minify_js(input).unwrap();
        assert_eq!(output, r#"const a=x/y;const ok=/ab/.test("z");"#);
    }

    #[test]
    fn test_collapse_whitespace() {
        let input = "function foo ( x ) { return x + 1 ; }";
        let output = collapse_whitespace(input).unwrap();
        assert_eq!(output, "function foo(x){return x+1;}");
    }

    #[test]
    fn test_preserve_spaces_in_strings() {
        let input = r#"var x = "hello   world";"#;
        let output = collapse_whitespace(input).unwrap();
        assert!(output.contains("hello   world"));
    }

    #[test]
    fn test_newlines_kept_where_statements_end() {
        let output = minify_js("var a = 1\nvar b = a++\nb").unwrap();
        assert_eq!(output, "var a=1\nvar b=a++\nb");
    }

    #[test]
    fn test_unary_operators_stay_apart() {
        assert_eq!(collapse_whitespace("a + +b").unwrap(), "a+ +b");
        assert_eq!(collapse_whitespace("a - -b").unwrap(), "a- -b");
        assert_eq!(collapse_whitespace("1 .toString()").unwrap(), "1 .toString()");
    }

    #[test]
    fn test_full_minify() {
        let input = r#"
            /* This is a comment */
            function test(x) {
                return x + 1;
            }
        "#;
        let output = minify_js(input).unwrap();
        assert!(!output.contains("This is a comment"));
        assert_eq!(output, "function test(x){return x+1;}");
    }

    #[test]
    fn test_unterminated_input_is_an_error() {
        assert!(strip_comments("var s = \"abc").is_err());
        assert!(strip_comments("var s = 1; /* open").is_err());
        assert!(collapse_whitespace("var r = /abc").is_err());
    }

    #[test]
    fn test_runtime_survives_minification() {
        let output = minify_js(crate::RUNTIME_JS).unwrap();
        assert!(output.contains("__SITECRAFT_REFS__"));
        assert!(output.contains("__SITECRAFT_STATE__"));
        assert!(output.len() < crate::RUNTIME_JS.len());
    }
}
