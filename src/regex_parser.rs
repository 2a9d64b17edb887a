use log::warn;
use winnow::ModalResult;
use winnow::combinator::{alt, cut_err, eof, fail, opt, preceded, repeat, separated, terminated};
use winnow::error::{ContextError, ErrMode, StrContext};
use winnow::prelude::*;
use winnow::token::{any, none_of, one_of, take_while};

use crate::error::PatternError;
use crate::regex_ast::*;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct Flags {
    caseless: bool,
    dot_all: bool,
}

/// Parses a PCRE-style pattern, either bare or as `/body/flags`.
pub fn parse_pattern(source: &str) -> Result<Pattern, PatternError> {
    let (body, flags) = split_delimiters(source)?;
    let body = strip_end_anchor(body);

    let mut input = body;
    let result = terminated(|i: &mut &str| top_level(i, flags), eof).parse_next(&mut input);
    result.map_err(|err| pattern_error(err, body, input))
}

/// A leading `^` must be on every top-level alternative or on none of them.
fn top_level(input: &mut &str, flags: Flags) -> ModalResult<Pattern> {
    let mut branches: Vec<(bool, Regex)> =
        separated(1.., |i: &mut &str| anchored_branch(i, flags), '|').parse_next(input)?;
    let anchored = branches[0].0;
    if branches.iter().any(|(branch, _)| *branch != anchored) {
        return unsupported("anchor on only some alternatives").parse_next(input);
    }
    let regex = if branches.len() == 1 {
        branches.remove(0).1
    } else {
        Regex::Alternate(branches.into_iter().map(|(_, regex)| regex).collect())
    };
    Ok(Pattern { regex, anchored })
}

fn anchored_branch(input: &mut &str, flags: Flags) -> ModalResult<(bool, Regex)> {
    let anchored = opt('^').parse_next(input)?.is_some();
    Ok((anchored, concat(input, flags)?))
}

fn pattern_error(err: ErrMode<ContextError>, body: &str, rest: &str) -> PatternError {
    let label = match &err {
        ErrMode::Backtrack(e) | ErrMode::Cut(e) => e.context().find_map(|c| match c {
            StrContext::Label(label) => Some(*label),
            _ => None,
        }),
        ErrMode::Incomplete(_) => None,
    };
    if let Some(label) = label {
        return PatternError::Unsupported(label.to_string());
    }
    let message = match rest.chars().next() {
        Some(c) => format!("unexpected `{c}`"),
        None => "unexpected end of pattern".to_string(),
    };
    PatternError::Syntax {
        offset: body.len() - rest.len(),
        message,
    }
}

fn split_delimiters(source: &str) -> Result<(&str, Flags), PatternError> {
    let Some(inner) = source.strip_prefix('/') else {
        return Ok((source, Flags::default()));
    };
    let Some(close) = inner.rfind('/') else {
        return Err(PatternError::Syntax {
            offset: source.len(),
            message: "missing closing `/`".to_string(),
        });
    };

    let mut flags = Flags::default();
    for c in inner[close + 1..].chars() {
        match c {
            'i' => flags.caseless = true,
            's' => flags.dot_all = true,
            'm' => {}
            other => return Err(PatternError::Unsupported(format!("flag `{other}`"))),
        }
    }
    Ok((&inner[..close], flags))
}

/// ANML states cannot test for end of data, so a trailing `$` is dropped.
fn strip_end_anchor(body: &str) -> &str {
    let Some(stripped) = body.strip_suffix('$') else {
        return body;
    };
    let escapes = stripped.chars().rev().take_while(|&c| c == '\\').count();
    if escapes % 2 == 1 {
        return body;
    }
    warn!(pattern = body; "Dropping end-of-line anchor");
    stripped
}

fn alternation(input: &mut &str, flags: Flags) -> ModalResult<Regex> {
    let first = concat(input, flags)?;
    let rest: Vec<Regex> =
        repeat(0.., preceded('|', |i: &mut &str| concat(i, flags))).parse_next(input)?;
    if rest.is_empty() {
        return Ok(first);
    }
    let mut branches = vec![first];
    branches.extend(rest);
    Ok(Regex::Alternate(branches))
}

fn concat(input: &mut &str, flags: Flags) -> ModalResult<Regex> {
    let mut items: Vec<Regex> =
        repeat(0.., |i: &mut &str| repetition(i, flags)).parse_next(input)?;
    Ok(match items.len() {
        0 => Regex::Empty,
        1 => items.remove(0),
        _ => Regex::Concat(items),
    })
}

fn repetition(input: &mut &str, flags: Flags) -> ModalResult<Regex> {
    let mut regex = atom(input, flags)?;
    while let Some((min, max, counted)) = opt(quantifier).parse_next(input)? {
        // lazy and possessive forms match the same set of inputs
        let _mode = opt(one_of(['?', '+'])).parse_next(input)?;
        regex = Regex::Repeat {
            inner: Box::new(regex),
            min,
            max,
            counted,
        };
    }
    Ok(regex)
}

fn quantifier(input: &mut &str) -> ModalResult<(u32, Option<u32>, bool)> {
    alt((
        '*'.value((0, None, false)),
        '+'.value((1, None, false)),
        '?'.value((0, Some(1), false)),
        counted,
    ))
    .parse_next(input)
}

/// `{m}`, `{m,}` or `{m,n}`. Anything else starting with `{` is a literal.
fn counted(input: &mut &str) -> ModalResult<(u32, Option<u32>, bool)> {
    '{'.parse_next(input)?;
    let min = bound(input)?;
    let upper: Option<Option<u32>> = opt(preceded(',', opt(bound))).parse_next(input)?;
    '}'.parse_next(input)?;
    let max = match upper {
        None => Some(min),
        Some(None) => None,
        Some(Some(max)) => Some(max),
    };
    if max.is_some_and(|max| max < min) {
        return cut_err(fail.context(StrContext::Label("repetition bounds out of order")))
            .parse_next(input);
    }
    Ok((min, max, true))
}

fn bound(input: &mut &str) -> ModalResult<u32> {
    let digits = take_while(1.., |c: char| c.is_ascii_digit()).parse_next(input)?;
    match digits.parse::<u32>() {
        Ok(count) => Ok(count),
        Err(_) => unsupported("repetition count out of range").parse_next(input),
    }
}

fn atom(input: &mut &str, flags: Flags) -> ModalResult<Regex> {
    if input.starts_with(['^', '$']) {
        return unsupported("anchor inside pattern").parse_next(input);
    }
    alt((
        |i: &mut &str| group(i, flags),
        |i: &mut &str| class(i, flags),
        '.'.map(move |_| {
            let mut set = ByteSet::full();
            if !flags.dot_all {
                set.remove(b'\n');
            }
            Regex::Class(set)
        }),
        escape.map(move |escaped| match escaped {
            Escaped::Byte(byte) => Regex::Class(fold(ByteSet::single(byte), flags)),
            Escaped::Set(set) => Regex::Class(set),
        }),
        none_of(['|', '(', ')', '*', '+', '?', '[', '\\', '.'])
            .map(move |c: char| literal_char(c, flags)),
    ))
    .parse_next(input)
}

fn literal_char(c: char, flags: Flags) -> Regex {
    if c.is_ascii() {
        return Regex::Class(fold(ByteSet::single(c as u8), flags));
    }
    let mut buf = [0u8; 4];
    let bytes = c.encode_utf8(&mut buf).as_bytes();
    Regex::Concat(
        bytes
            .iter()
            .map(|&b| Regex::Class(ByteSet::single(b)))
            .collect(),
    )
}

fn fold(set: ByteSet, flags: Flags) -> ByteSet {
    if flags.caseless { set.case_folded() } else { set }
}

fn group(input: &mut &str, flags: Flags) -> ModalResult<Regex> {
    '('.parse_next(input)?;
    if opt("?:").parse_next(input)?.is_none() && input.starts_with('?') {
        return unsupported("look-around or inline group").parse_next(input);
    }
    let inner = alternation(input, flags)?;
    cut_err(')').parse_next(input)?;
    Ok(inner)
}

fn class(input: &mut &str, flags: Flags) -> ModalResult<Regex> {
    '['.parse_next(input)?;
    let negated = opt('^').parse_next(input)?.is_some();
    if input.starts_with("[:") {
        return unsupported("POSIX character class").parse_next(input);
    }

    let mut set = ByteSet::new();
    let mut first = true;
    loop {
        if !first && opt(']').parse_next(input)?.is_some() {
            break;
        }
        first = false;
        match class_item(input)? {
            Escaped::Set(items) => set = set.union(&items),
            Escaped::Byte(lo) => {
                let range_end = if input.starts_with('-') && !input[1..].starts_with(']') {
                    '-'.parse_next(input)?;
                    Some(class_item(input)?)
                } else {
                    None
                };
                match range_end {
                    None => set.insert(lo),
                    Some(Escaped::Byte(hi)) if hi >= lo => set.insert_range(lo, hi),
                    Some(_) => {
                        return cut_err(fail.context(StrContext::Label("invalid class range")))
                            .parse_next(input);
                    }
                }
            }
        }
    }

    let set = fold(set, flags);
    Ok(Regex::Class(if negated { set.negated() } else { set }))
}

fn class_item(input: &mut &str) -> ModalResult<Escaped> {
    if input.starts_with("\\b") {
        "\\b".parse_next(input)?;
        return Ok(Escaped::Byte(0x08));
    }
    if input.starts_with('\\') {
        return escape(input);
    }
    let c: char = cut_err(any).parse_next(input)?;
    if !c.is_ascii() {
        return unsupported("non-ASCII character in class").parse_next(input);
    }
    Ok(Escaped::Byte(c as u8))
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Escaped {
    Byte(u8),
    Set(ByteSet),
}

fn escape(input: &mut &str) -> ModalResult<Escaped> {
    '\\'.parse_next(input)?;
    let c: char = cut_err(any).parse_next(input)?;
    let escaped = match c {
        'd' => Escaped::Set(digits()),
        'D' => Escaped::Set(digits().negated()),
        'w' => Escaped::Set(word()),
        'W' => Escaped::Set(word().negated()),
        's' => Escaped::Set(space()),
        'S' => Escaped::Set(space().negated()),
        'n' => Escaped::Byte(b'\n'),
        'r' => Escaped::Byte(b'\r'),
        't' => Escaped::Byte(b'\t'),
        'f' => Escaped::Byte(0x0c),
        'v' => Escaped::Byte(0x0b),
        'e' => Escaped::Byte(0x1b),
        'a' => Escaped::Byte(0x07),
        '0' => Escaped::Byte(0),
        'x' => {
            if input.starts_with('{') {
                return unsupported("braced hex escape").parse_next(input);
            }
            let byte = cut_err(
                take_while(1..=2, |c: char| c.is_ascii_hexdigit())
                    .try_map(|hex| u8::from_str_radix(hex, 16)),
            )
            .parse_next(input)?;
            Escaped::Byte(byte)
        }
        '1'..='9' => return unsupported("back-reference").parse_next(input),
        'b' | 'B' | 'A' | 'z' | 'Z' | 'G' => return unsupported("assertion").parse_next(input),
        c if c.is_ascii_alphanumeric() => return unsupported("escape sequence").parse_next(input),
        c if c.is_ascii() => Escaped::Byte(c as u8),
        _ => return unsupported("non-ASCII escape").parse_next(input),
    };
    Ok(escaped)
}

fn digits() -> ByteSet {
    ByteSet::range(b'0', b'9')
}

fn word() -> ByteSet {
    ByteSet::range(b'a', b'z')
        .union(&ByteSet::range(b'A', b'Z'))
        .union(&digits())
        .union(&ByteSet::single(b'_'))
}

fn space() -> ByteSet {
    [b' ', b'\t', b'\n', b'\r', 0x0b, 0x0c]
        .into_iter()
        .fold(ByteSet::new(), |set, b| set.union(&ByteSet::single(b)))
}

fn unsupported<'s, O>(what: &'static str) -> impl Parser<&'s str, O, ErrMode<ContextError>> {
    cut_err(fail.context(StrContext::Label(what)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn class_of(bytes: &[u8]) -> Regex {
        Regex::Class(
            bytes
                .iter()
                .fold(ByteSet::new(), |set, &b| set.union(&ByteSet::single(b))),
        )
    }

    #[test]
    fn parse_literal_sequence() {
        let pattern = parse_pattern("ab").unwrap();
        assert_eq!(pattern.regex, Regex::Concat(vec![class_of(b"a"), class_of(b"b")]));
        assert!(!pattern.anchored);
    }

    #[test]
    fn parse_delimited_with_flags() {
        let pattern = parse_pattern("/a/i").unwrap();
        assert_eq!(pattern.regex, class_of(b"aA"));
        assert!(matches!(
            parse_pattern("/a/x"),
            Err(PatternError::Unsupported(_))
        ));
        assert!(matches!(
            parse_pattern("/abc"),
            Err(PatternError::Syntax { .. })
        ));
    }

    #[test]
    fn parse_anchors() {
        let pattern = parse_pattern("^ab$").unwrap();
        assert!(pattern.anchored);
        assert_eq!(pattern.regex, Regex::Concat(vec![class_of(b"a"), class_of(b"b")]));
        let escaped = parse_pattern(r"a\$").unwrap();
        assert_eq!(escaped.regex, Regex::Concat(vec![class_of(b"a"), class_of(b"$")]));
        assert_eq!(
            parse_pattern("a^b").unwrap_err(),
            PatternError::Unsupported("anchor inside pattern".to_string())
        );
    }

    #[test]
    fn anchors_apply_per_alternative() {
        let pattern = parse_pattern("^a|^b").unwrap();
        assert!(pattern.anchored);
        assert_eq!(
            pattern.regex,
            Regex::Alternate(vec![class_of(b"a"), class_of(b"b")])
        );
        assert_eq!(
            parse_pattern("^a|b").unwrap_err(),
            PatternError::Unsupported("anchor on only some alternatives".to_string())
        );
        assert_eq!(
            parse_pattern("a|^b").unwrap_err(),
            PatternError::Unsupported("anchor on only some alternatives".to_string())
        );
        assert_eq!(
            parse_pattern("(^a|b)").unwrap_err(),
            PatternError::Unsupported("anchor inside pattern".to_string())
        );
    }

    #[test]
    fn parse_alternation_and_groups() {
        let pattern = parse_pattern("a|(?:b|c)").unwrap();
        assert_eq!(
            pattern.regex,
            Regex::Alternate(vec![
                class_of(b"a"),
                Regex::Alternate(vec![class_of(b"b"), class_of(b"c")]),
            ])
        );
    }

    #[test]
    fn parse_quantifiers() {
        let pattern = parse_pattern("a*?b+c?").unwrap();
        let Regex::Concat(items) = pattern.regex else {
            panic!("expected concatenation");
        };
        assert_eq!(
            items[0],
            Regex::Repeat {
                inner: Box::new(class_of(b"a")),
                min: 0,
                max: None,
                counted: false
            }
        );
        assert_eq!(
            items[2],
            Regex::Repeat {
                inner: Box::new(class_of(b"c")),
                min: 0,
                max: Some(1),
                counted: false
            }
        );
    }

    #[test]
    fn parse_counted_forms() {
        let exact = parse_pattern("a{3}").unwrap();
        assert_eq!(
            exact.regex,
            Regex::Repeat {
                inner: Box::new(class_of(b"a")),
                min: 3,
                max: Some(3),
                counted: true
            }
        );
        let open = parse_pattern("a{2,}").unwrap();
        assert!(matches!(open.regex, Regex::Repeat { min: 2, max: None, .. }));
        let range = parse_pattern("a{2,4}").unwrap();
        assert!(range.regex.has_counted_repetition());
        assert!(matches!(
            parse_pattern("a{4,2}"),
            Err(PatternError::Unsupported(_))
        ));
    }

    #[test]
    fn oversized_counts_are_rejected() {
        assert_eq!(
            parse_pattern("a{99999999999}b").unwrap_err(),
            PatternError::Unsupported("repetition count out of range".to_string())
        );
        assert_eq!(
            parse_pattern("a{1,99999999999}").unwrap_err(),
            PatternError::Unsupported("repetition count out of range".to_string())
        );
        let largest = parse_pattern("a{4294967295}").unwrap();
        assert!(largest.regex.has_counted_repetition());
    }

    #[test]
    fn braces_that_are_not_quantifiers_are_literal() {
        let pattern = parse_pattern("a{x}").unwrap();
        assert!(!pattern.regex.has_counted_repetition());
        assert_eq!(
            pattern.regex,
            Regex::Concat(vec![
                class_of(b"a"),
                class_of(b"{"),
                class_of(b"x"),
                class_of(b"}")
            ])
        );
        let in_class = parse_pattern("[{}]").unwrap();
        assert_eq!(in_class.regex, class_of(b"{}"));
    }

    #[test]
    fn parse_classes() {
        assert_eq!(
            parse_pattern("[a-c_]").unwrap().regex,
            class_of(b"abc_")
        );
        assert_eq!(parse_pattern("[]a]").unwrap().regex, class_of(b"]a"));
        assert_eq!(parse_pattern("[a-]").unwrap().regex, class_of(b"a-"));
        let Regex::Class(negated) = parse_pattern("[^a]").unwrap().regex else {
            panic!("expected class");
        };
        assert_eq!(negated.len(), 255);
        let Regex::Class(folded) = parse_pattern("/[^a]/i").unwrap().regex else {
            panic!("expected class");
        };
        assert!(!folded.contains(b'A'));
        assert_eq!(parse_pattern(r"[\x41\d]").unwrap().regex.clone(), {
            let mut set = ByteSet::range(b'0', b'9');
            set.insert(b'A');
            Regex::Class(set)
        });
        assert!(matches!(
            parse_pattern("[z-a]"),
            Err(PatternError::Unsupported(_))
        ));
    }

    #[test]
    fn parse_escapes() {
        assert_eq!(parse_pattern(r"\x0a").unwrap().regex, class_of(b"\n"));
        assert_eq!(parse_pattern(r"\.").unwrap().regex, class_of(b"."));
        let Regex::Class(dot) = parse_pattern(".").unwrap().regex else {
            panic!("expected class");
        };
        assert!(!dot.contains(b'\n'));
        let Regex::Class(dot_all) = parse_pattern("/./s").unwrap().regex else {
            panic!("expected class");
        };
        assert!(dot_all.is_full());
    }

    #[test]
    fn unsupported_constructs() {
        assert_eq!(
            parse_pattern(r"(a)\1").unwrap_err(),
            PatternError::Unsupported("back-reference".to_string())
        );
        assert_eq!(
            parse_pattern(r"a(?=b)").unwrap_err(),
            PatternError::Unsupported("look-around or inline group".to_string())
        );
        assert_eq!(
            parse_pattern(r"\bword").unwrap_err(),
            PatternError::Unsupported("assertion".to_string())
        );
    }

    #[test]
    fn syntax_errors() {
        assert!(matches!(
            parse_pattern("(ab"),
            Err(PatternError::Syntax { .. })
        ));
        assert!(matches!(
            parse_pattern("ab)"),
            Err(PatternError::Syntax { offset: 2, .. })
        ));
        assert!(matches!(
            parse_pattern("*a"),
            Err(PatternError::Syntax { offset: 0, .. })
        ));
    }

    #[test]
    fn non_ascii_literal_becomes_byte_sequence() {
        let pattern = parse_pattern("é").unwrap();
        assert_eq!(
            pattern.regex,
            Regex::Concat(vec![class_of(&[0xc3]), class_of(&[0xa9])])
        );
    }
}
