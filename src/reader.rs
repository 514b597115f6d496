use crate::chars;
use crate::error::{EvalError, EvalResult};
use crate::heap::Heap;
use crate::symbol::{sym, SymbolTable};
use crate::value::Value;

fn read_error(msg: impl Into<String>) -> EvalError {
    EvalError::Read(msg.into())
}

/// Parses source text into data on the heap.
pub struct Reader<'a> {
    input: &'a str,
    pos: usize,
    heap: &'a mut Heap,
    symbols: &'a mut SymbolTable,
}

impl<'a> Reader<'a> {
    pub fn new(input: &'a str, heap: &'a mut Heap, symbols: &'a mut SymbolTable) -> Self {
        Reader {
            input,
            pos: 0,
            heap,
            symbols,
        }
    }

    /// Read one datum. Returns None at end of input.
    pub fn read(&mut self) -> EvalResult<Option<Value>> {
        self.skip_atmosphere()?;
        if self.at_end() {
            return Ok(None);
        }
        Ok(Some(self.read_datum()?))
    }

    /// Byte offset just past the last datum read.
    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn read_all(&mut self) -> EvalResult<Vec<Value>> {
        let mut data = Vec::new();
        while let Some(datum) = self.read()? {
            data.push(datum);
        }
        Ok(data)
    }

    fn at_end(&self) -> bool {
        self.pos >= self.input.len()
    }

    fn peek(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn peek_second(&self) -> Option<char> {
        let mut chars = self.input[self.pos..].chars();
        chars.next();
        chars.next()
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    /// Skip whitespace, `;` line comments, `#| |#` block comments and
    /// `#;` datum comments.
    fn skip_atmosphere(&mut self) -> EvalResult<()> {
        loop {
            match self.peek() {
                Some(c) if c.is_whitespace() => {
                    self.advance();
                }
                Some(';') => {
                    while let Some(c) = self.advance() {
                        if c == '\n' {
                            break;
                        }
                    }
                }
                Some('#') if self.peek_second() == Some('|') => self.skip_block_comment()?,
                Some('#') if self.peek_second() == Some(';') => {
                    self.pos += 2;
                    self.skip_atmosphere()?;
                    if self.at_end() {
                        return Err(read_error("expected a datum after #;"));
                    }
                    self.read_datum()?;
                }
                _ => return Ok(()),
            }
        }
    }

    /// Block comments nest.
    fn skip_block_comment(&mut self) -> EvalResult<()> {
        self.pos += 2;
        let mut depth = 1;
        while depth > 0 {
            match self.advance() {
                None => return Err(read_error("unterminated block comment")),
                Some('|') if self.peek() == Some('#') => {
                    self.advance();
                    depth -= 1;
                }
                Some('#') if self.peek() == Some('|') => {
                    self.advance();
                    depth += 1;
                }
                Some(_) => {}
            }
        }
        Ok(())
    }

    fn read_datum(&mut self) -> EvalResult<Value> {
        self.skip_atmosphere()?;
        let c = self.peek().ok_or_else(|| read_error("unexpected end of input"))?;

        match c {
            '(' => self.read_list(')'),
            '[' => self.read_list(']'),
            ')' | ']' => Err(read_error(format!("unexpected '{c}'"))),
            '\'' => {
                self.advance();
                self.read_prefixed(Value::Symbol(sym::QUOTE))
            }
            '"' => self.read_string(),
            '|' => self.read_bar_symbol(),
            '#' => self.read_hash(),
            _ => self.read_word(),
        }
    }

    /// `(a b c)`, `(a . b)` or `(a b . c)`, closed by `close`.
    fn read_list(&mut self, close: char) -> EvalResult<Value> {
        self.advance();
        let mut elements = Vec::new();
        let mut tail = Value::Null;

        loop {
            self.skip_atmosphere()?;
            match self.peek() {
                None => return Err(read_error("unterminated list")),
                Some(c) if c == close => {
                    self.advance();
                    break;
                }
                Some(')') | Some(']') => {
                    return Err(read_error(format!("expected '{close}' to close list")));
                }
                Some('.') if self.is_dot_separator() => {
                    if elements.is_empty() {
                        return Err(read_error("illegal use of '.'"));
                    }
                    self.advance();
                    tail = self.read_datum()?;
                    self.skip_atmosphere()?;
                    if self.advance() != Some(close) {
                        return Err(read_error("expected one datum after '.'"));
                    }
                    break;
                }
                Some(_) => elements.push(self.read_datum()?),
            }
        }

        self.heap.list_with_tail(&elements, tail)
    }

    fn is_dot_separator(&self) -> bool {
        match self.peek_second() {
            None => true,
            Some(c) => c.is_whitespace() || is_delimiter(c),
        }
    }

    /// `'x` → `(quote x)`, `#'x` → `(syntax x)`.
    fn read_prefixed(&mut self, keyword: Value) -> EvalResult<Value> {
        let datum = self.read_datum()?;
        self.heap.list(&[keyword, datum])
    }

    fn read_string(&mut self) -> EvalResult<Value> {
        self.advance();
        let mut text = String::new();
        loop {
            match self.advance() {
                None => return Err(read_error("unterminated string")),
                Some('"') => break,
                Some('\\') => match self.advance() {
                    Some('n') => text.push('\n'),
                    Some('t') => text.push('\t'),
                    Some('r') => text.push('\r'),
                    Some('a') => text.push('\u{7}'),
                    Some('b') => text.push('\u{8}'),
                    Some('0') => text.push('\0'),
                    Some('\\') => text.push('\\'),
                    Some('"') => text.push('"'),
                    Some('x') => text.push(self.read_hex_escape()?),
                    Some('\n') => {
                        // Line continuation: skip leading whitespace on the next line.
                        while matches!(self.peek(), Some(c) if c == ' ' || c == '\t') {
                            self.advance();
                        }
                    }
                    Some(other) => return Err(read_error(format!("unknown string escape: \\{other}"))),
                    None => return Err(read_error("unterminated string")),
                },
                Some(c) => text.push(c),
            }
        }
        Ok(Value::Str(self.heap.alloc_string(text)?))
    }

    /// `\xHH;` inside a string. The terminating `;` is optional.
    fn read_hex_escape(&mut self) -> EvalResult<char> {
        let input = self.input;
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_ascii_hexdigit()) {
            self.advance();
        }
        let digits = &input[start..self.pos];
        if self.peek() == Some(';') {
            self.advance();
        }
        u32::from_str_radix(digits, 16)
            .ok()
            .and_then(char::from_u32)
            .ok_or_else(|| read_error(format!("bad hex escape: \\x{digits}")))
    }

    fn read_bar_symbol(&mut self) -> EvalResult<Value> {
        self.advance();
        let start = self.pos;
        loop {
            match self.advance() {
                None => return Err(read_error("unterminated |symbol|")),
                Some('|') => break,
                Some(_) => {}
            }
        }
        let name = &self.input[start..self.pos - 1];
        Ok(Value::Symbol(self.symbols.intern(name)))
    }

    fn read_hash(&mut self) -> EvalResult<Value> {
        match self.peek_second() {
            Some('\'') => {
                self.pos += 2;
                self.read_prefixed(Value::Symbol(sym::SYNTAX))
            }
            Some('\\') => {
                self.pos += 2;
                self.read_char()
            }
            _ => {
                let word = self.take_word();
                match word {
                    "#t" | "#true" => Ok(Value::True),
                    "#f" | "#false" => Ok(Value::False),
                    _ => Err(read_error(format!("bad syntax `{word}`"))),
                }
            }
        }
    }

    /// After `#\`: a single character, a name like `space`, or `xHH`.
    fn read_char(&mut self) -> EvalResult<Value> {
        let input = self.input;
        let first = self.advance().ok_or_else(|| read_error("expected a character after #\\"))?;
        let start = self.pos - first.len_utf8();
        while matches!(self.peek(), Some(c) if c.is_alphanumeric()) {
            self.advance();
        }
        let word = &input[start..self.pos];
        if word.chars().count() == 1 {
            return Ok(Value::Char(first));
        }
        if let Some(c) = chars::named_char(word) {
            return Ok(Value::Char(c));
        }
        if let Some(hex) = word.strip_prefix('x').or_else(|| word.strip_prefix('u')) {
            if let Some(c) = u32::from_str_radix(hex, 16).ok().and_then(char::from_u32) {
                return Ok(Value::Char(c));
            }
        }
        Err(read_error(format!("bad character constant: #\\{word}")))
    }

    fn take_word(&mut self) -> &'a str {
        let input = self.input;
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c.is_whitespace() || is_delimiter(c) {
                break;
            }
            self.advance();
        }
        &input[start..self.pos]
    }

    /// A number or a symbol.
    fn read_word(&mut self) -> EvalResult<Value> {
        let word = self.take_word();
        if word == "." {
            return Err(read_error("illegal use of '.'"));
        }
        if looks_numeric(word) {
            return word
                .parse::<i64>()
                .map(Value::Fixnum)
                .map_err(|_| read_error(format!("number out of fixnum range: {word}")));
        }
        Ok(Value::Symbol(self.symbols.intern(word)))
    }
}

fn is_delimiter(c: char) -> bool {
    matches!(c, '(' | ')' | '[' | ']' | '"' | ';' | '\'')
}

/// Optional sign followed by one or more digits.
fn looks_numeric(word: &str) -> bool {
    let digits = word.strip_prefix(['+', '-']).unwrap_or(word);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}

/// Read every datum in `input`.
pub fn read_all(input: &str, heap: &mut Heap, symbols: &mut SymbolTable) -> EvalResult<Vec<Value>> {
    Reader::new(input, heap, symbols).read_all()
}

/// Read the datum starting at byte `pos`, returning it with the position
/// just after it.
pub fn read_one_at(
    input: &str,
    pos: usize,
    heap: &mut Heap,
    symbols: &mut SymbolTable,
) -> EvalResult<Option<(Value, usize)>> {
    let mut reader = Reader::new(&input[pos..], heap, symbols);
    match reader.read()? {
        Some(val) => Ok(Some((val, pos + reader.position()))),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::printer::Printer;

    fn read_back(input: &str) -> Vec<String> {
        let mut heap = Heap::new(4096, 4096);
        let mut symbols = SymbolTable::new();
        let data = read_all(input, &mut heap, &mut symbols).unwrap();
        let printer = Printer::new(&heap, &symbols, &[]);
        data.into_iter().map(|d| printer.write(d)).collect()
    }

    fn read_fails(input: &str) -> bool {
        let mut heap = Heap::new(4096, 4096);
        let mut symbols = SymbolTable::new();
        matches!(read_all(input, &mut heap, &mut symbols), Err(EvalError::Read(_)))
    }

    #[test]
    fn atoms() {
        assert_eq!(
            read_back("42 -7 +3 foo #t #false \"hi\\n\" #\\a #\\space #\\x41"),
            vec!["42", "-7", "3", "foo", "#t", "#f", "\"hi\\n\"", "#\\a", "#\\space", "#\\A"]
        );
    }

    #[test]
    fn lists_and_brackets() {
        assert_eq!(read_back("(1 2 3)"), vec!["(1 2 3)"]);
        assert_eq!(read_back("[a (b . c)]"), vec!["(a (b . c))"]);
        assert_eq!(read_back("(a b . c)"), vec!["(a b . c)"]);
        assert_eq!(read_back("()"), vec!["()"]);
    }

    #[test]
    fn quote_abbreviations() {
        assert_eq!(read_back("'x #'(a b)"), vec!["'x", "#'(a b)"]);
    }

    #[test]
    fn comments_are_skipped() {
        assert_eq!(read_back("; line\n1 #| block #| nested |# |# 2 #;(ignored) 3"), vec!["1", "2", "3"]);
    }

    #[test]
    fn symbols_with_sign_characters() {
        assert_eq!(read_back("+ - ... ->x |a b|"), vec!["+", "-", "...", "->x", "|a b|"]);
    }

    #[test]
    fn malformed_input() {
        assert!(read_fails("(1 2"));
        assert!(read_fails(")"));
        assert!(read_fails("(1 . 2 3)"));
        assert!(read_fails("(1 ]"));
        assert!(read_fails("\"open"));
        assert!(read_fails("99999999999999999999"));
        assert!(read_fails("#\\bogus"));
    }

    #[test]
    fn read_one_at_reports_position() {
        let mut heap = Heap::new(64, 64);
        let mut symbols = SymbolTable::new();
        let src = "1 (2) ";
        let (first, next) = read_one_at(src, 0, &mut heap, &mut symbols).unwrap().unwrap();
        assert_eq!(first, Value::Fixnum(1));
        let (second, next) = read_one_at(src, next, &mut heap, &mut symbols).unwrap().unwrap();
        assert!(second.is_pair());
        assert!(read_one_at(src, next, &mut heap, &mut symbols).unwrap().is_none());
    }
}
