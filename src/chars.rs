//! Character names shared by the reader (`#\space`) and the printer.

const NAMED: &[(&str, char)] = &[
    ("nul", '\0'),
    ("null", '\0'),
    ("backspace", '\u{8}'),
    ("tab", '\t'),
    ("newline", '\n'),
    ("linefeed", '\n'),
    ("vtab", '\u{b}'),
    ("page", '\u{c}'),
    ("return", '\r'),
    ("space", ' '),
    ("rubout", '\u{7f}'),
    ("delete", '\u{7f}'),
];

/// Character for a name like `space` or `newline`.
pub fn named_char(name: &str) -> Option<char> {
    NAMED
        .iter()
        .find(|(n, _)| n.eq_ignore_ascii_case(name))
        .map(|&(_, c)| c)
}

/// The preferred name of a named character (the first listed).
pub fn char_name(c: char) -> Option<&'static str> {
    NAMED.iter().find(|&&(_, nc)| nc == c).map(|&(n, _)| n)
}

/// True if the character prints as itself after `#\`.
pub fn is_printable(c: char) -> bool {
    !c.is_control() && !c.is_whitespace()
}
