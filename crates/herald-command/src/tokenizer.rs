//! Shell-like lexer for raw command lines.
//!
//! Splits on whitespace outside quotes; both `'...'` and `"..."` delimit
//! literal spans that may contain whitespace, and the quotes are stripped
//! from the resulting token. `$VAR` / `${VAR}` references are substituted
//! from the caller's environment map everywhere except inside single quotes.
//!
//! An unterminated quote never fails the lexer: it sets the matching
//! dangling flag and the pipeline short-circuits before resolving anything.

use std::collections::{BTreeMap, HashMap};

/// Quoting state left over at the end of a raw line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TokenFlags {
    /// The line ended inside a `"..."` span.
    pub dangling_double: bool,
    /// The line ended inside a `'...'` span.
    pub dangling_single: bool,
}

/// Tokenize a raw line, substituting environment variables.
///
/// Backslash escapes the next character outside single quotes; inside double
/// quotes only `"`, `\` and `$` are escapable (a backslash before anything
/// else stays literal). Single-quoted spans are fully literal.
pub fn tokenize(raw: &str, env: &HashMap<String, String>) -> (Vec<String>, TokenFlags) {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut chars = raw.chars().peekable();
    let mut in_single = false;
    let mut in_double = false;

    while let Some(ch) = chars.next() {
        if in_single {
            if ch == '\'' {
                in_single = false;
            } else {
                current.push(ch);
            }
        } else if in_double {
            if ch == '"' {
                in_double = false;
            } else if ch == '\\'
                && let Some(&next) = chars.peek()
            {
                match next {
                    '"' | '\\' | '$' => {
                        chars.next();
                        current.push(next);
                    },
                    _ => current.push('\\'),
                }
            } else if ch == '$' {
                current.push_str(&expand_var(&mut chars, env));
            } else {
                current.push(ch);
            }
        } else {
            match ch {
                '\'' => in_single = true,
                '"' => in_double = true,
                '\\' => {
                    if let Some(next) = chars.next() {
                        current.push(next);
                    }
                },
                '$' => current.push_str(&expand_var(&mut chars, env)),
                c if c.is_whitespace() => {
                    if !current.is_empty() {
                        tokens.push(std::mem::take(&mut current));
                    }
                },
                _ => current.push(ch),
            }
        }
    }

    if !current.is_empty() {
        tokens.push(current);
    }

    (
        tokens,
        TokenFlags {
            dangling_double: in_double,
            dangling_single: in_single,
        },
    )
}

/// Consume a `VAR` or `{VAR}` reference after a `$` and return its value.
///
/// A `$` followed by neither an identifier nor `{` stays a literal `$`.
/// Unknown variables expand to the empty string.
fn expand_var(
    chars: &mut std::iter::Peekable<std::str::Chars<'_>>,
    env: &HashMap<String, String>,
) -> String {
    if chars.peek() == Some(&'{') {
        chars.next();
        let mut name = String::new();
        for ch in chars.by_ref() {
            if ch == '}' {
                return env.get(&name).cloned().unwrap_or_default();
            }
            name.push(ch);
        }
        // No closing brace: keep the text literally.
        return format!("${{{name}");
    }

    let mut name = String::new();
    while let Some(&ch) = chars.peek() {
        if ch.is_alphanumeric() || ch == '_' {
            name.push(ch);
            chars.next();
        } else {
            break;
        }
    }
    if name.is_empty() {
        "$".to_string()
    } else {
        env.get(&name).cloned().unwrap_or_default()
    }
}

/// Split the tokens after the command name into positional arguments and a
/// named-argument map.
///
/// `--name=value` and `--name value` assign named arguments; a `--name` at
/// the end of the line or directly followed by another `--flag` gets the
/// literal value `"true"`. Everything else stays positional. This split runs
/// strictly after quoting, so `--title "a b"` carries its space.
pub fn split_named(args: &[String]) -> (Vec<String>, BTreeMap<String, String>) {
    let mut positional = Vec::new();
    let mut named = BTreeMap::new();
    let mut i = 0;

    while i < args.len() {
        let arg = &args[i];
        if let Some(name) = arg.strip_prefix("--")
            && !name.is_empty()
        {
            if let Some((key, value)) = name.split_once('=') {
                named.insert(key.to_string(), value.to_string());
            } else if let Some(next) = args.get(i + 1)
                && !next.starts_with("--")
            {
                named.insert(name.to_string(), next.clone());
                i += 1;
            } else {
                named.insert(name.to_string(), "true".to_string());
            }
        } else {
            positional.push(arg.clone());
        }
        i += 1;
    }

    (positional, named)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn toks(raw: &str) -> Vec<String> {
        tokenize(raw, &HashMap::new()).0
    }

    #[test]
    fn splits_on_whitespace() {
        assert_eq!(toks("rank daily 5"), ["rank", "daily", "5"]);
    }

    #[test]
    fn collapses_repeated_whitespace() {
        assert_eq!(toks("a \t  b"), ["a", "b"]);
    }

    #[test]
    fn double_quotes_keep_spaces() {
        assert_eq!(toks(r#"say "hello there" now"#), ["say", "hello there", "now"]);
    }

    #[test]
    fn single_quotes_keep_spaces() {
        assert_eq!(toks("say 'hello there'"), ["say", "hello there"]);
    }

    #[test]
    fn quotes_are_stripped() {
        assert_eq!(toks(r#""a"'b'"#), ["ab"]);
    }

    #[test]
    fn dangling_double_quote_sets_flag() {
        let (_, flags) = tokenize(r#"say "oops"#, &HashMap::new());
        assert!(flags.dangling_double);
        assert!(!flags.dangling_single);
    }

    #[test]
    fn dangling_single_quote_sets_flag() {
        let (_, flags) = tokenize("say 'oops", &HashMap::new());
        assert!(flags.dangling_single);
        assert!(!flags.dangling_double);
    }

    #[test]
    fn clean_line_sets_no_flags() {
        let (_, flags) = tokenize("say ok", &HashMap::new());
        assert_eq!(flags, TokenFlags::default());
    }

    #[test]
    fn expands_bare_var() {
        let e = env(&[("MODE", "daily")]);
        assert_eq!(tokenize("rank $MODE", &e).0, ["rank", "daily"]);
    }

    #[test]
    fn expands_braced_var() {
        let e = env(&[("M", "weekly")]);
        assert_eq!(tokenize("rank ${M}x", &e).0, ["rank", "weeklyx"]);
    }

    #[test]
    fn unknown_var_expands_empty() {
        assert_eq!(toks("rank $NOPE end"), ["rank", "end"]);
    }

    #[test]
    fn expands_inside_double_quotes() {
        let e = env(&[("WHO", "it is me")]);
        assert_eq!(tokenize(r#"say "$WHO!""#, &e).0, ["say", "it is me!"]);
    }

    #[test]
    fn single_quotes_suppress_expansion() {
        let e = env(&[("WHO", "me")]);
        assert_eq!(tokenize("say '$WHO'", &e).0, ["say", "$WHO"]);
    }

    #[test]
    fn lone_dollar_is_literal() {
        assert_eq!(toks("a $ b"), ["a", "$", "b"]);
    }

    #[test]
    fn backslash_escapes_outside_quotes() {
        assert_eq!(toks(r"a\ b"), ["a b"]);
    }

    #[test]
    fn backslash_escapes_dollar_in_double_quotes() {
        let e = env(&[("X", "no")]);
        assert_eq!(tokenize(r#""\$X""#, &e).0, ["$X"]);
    }

    #[test]
    fn empty_input_yields_no_tokens() {
        let (tokens, flags) = tokenize("", &HashMap::new());
        assert!(tokens.is_empty());
        assert_eq!(flags, TokenFlags::default());
    }

    // -- split_named --

    fn owned(args: &[&str]) -> Vec<String> {
        args.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn named_equals_form() {
        let (pos, named) = split_named(&owned(&["a", "--mode=daily", "b"]));
        assert_eq!(pos, ["a", "b"]);
        assert_eq!(named["mode"], "daily");
    }

    #[test]
    fn named_space_form() {
        let (pos, named) = split_named(&owned(&["--mode", "daily", "b"]));
        assert_eq!(pos, ["b"]);
        assert_eq!(named["mode"], "daily");
    }

    #[test]
    fn trailing_flag_is_true() {
        let (pos, named) = split_named(&owned(&["a", "--verbose"]));
        assert_eq!(pos, ["a"]);
        assert_eq!(named["verbose"], "true");
    }

    #[test]
    fn flag_before_flag_is_true() {
        let (_, named) = split_named(&owned(&["--verbose", "--mode=x"]));
        assert_eq!(named["verbose"], "true");
        assert_eq!(named["mode"], "x");
    }

    #[test]
    fn bare_double_dash_stays_positional() {
        let (pos, named) = split_named(&owned(&["--", "a"]));
        assert_eq!(pos, ["--", "a"]);
        assert!(named.is_empty());
    }

    #[test]
    fn single_dash_tokens_stay_positional() {
        let (pos, named) = split_named(&owned(&["-5", "x"]));
        assert_eq!(pos, ["-5", "x"]);
        assert!(named.is_empty());
    }

    #[test]
    fn later_duplicate_named_wins() {
        let (_, named) = split_named(&owned(&["--m=a", "--m=b"]));
        assert_eq!(named["m"], "b");
    }

    // -- properties --

    mod props {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn tokenize_never_panics(raw in ".{0,200}") {
                let _ = tokenize(&raw, &HashMap::new());
            }

            #[test]
            fn tokens_never_contain_unquoted_space(raw in "[a-z ]{0,60}") {
                let (tokens, _) = tokenize(&raw, &HashMap::new());
                for t in &tokens {
                    prop_assert!(!t.contains(' '));
                }
            }

            #[test]
            fn quoted_word_round_trips(word in "[a-z ]{1,20}") {
                let (tokens, flags) = tokenize(&format!("\"{word}\""), &HashMap::new());
                prop_assert!(!flags.dangling_double);
                prop_assert_eq!(&tokens[0], &word);
            }

            #[test]
            fn split_named_conserves_tokens(args in proptest::collection::vec("[a-z-]{1,8}", 0..8)) {
                let (pos, named) = split_named(&args);
                prop_assert!(pos.len() + named.len() <= args.len());
            }
        }
    }
}
