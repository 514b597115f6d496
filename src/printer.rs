use crate::chars;
use crate::heap::Heap;
use crate::procedure::Primitive;
use crate::symbol::{sym, SymbolTable};
use crate::value::Value;

/// Nesting limit; deeper structure (including cycles through the car) prints as `...`.
const MAX_DEPTH: usize = 1000;
/// Longest list spine printed before eliding the rest.
const MAX_LENGTH: usize = 100_000;

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mode {
    Write,
    Display,
}

/// Renders values to text. `write` output reads back as the same datum;
/// `display` prints strings and characters raw.
pub struct Printer<'a> {
    heap: &'a Heap,
    symbols: &'a SymbolTable,
    primitives: &'a [Primitive],
}

impl<'a> Printer<'a> {
    pub fn new(heap: &'a Heap, symbols: &'a SymbolTable, primitives: &'a [Primitive]) -> Self {
        Printer {
            heap,
            symbols,
            primitives,
        }
    }

    pub fn write(&self, val: Value) -> String {
        let mut out = String::new();
        self.print(val, Mode::Write, &mut out, 0);
        out
    }

    pub fn display(&self, val: Value) -> String {
        let mut out = String::new();
        self.print(val, Mode::Display, &mut out, 0);
        out
    }

    fn print(&self, val: Value, mode: Mode, out: &mut String, depth: usize) {
        if depth > MAX_DEPTH {
            out.push_str("...");
            return;
        }

        match val {
            Value::Null => out.push_str("()"),
            Value::True => out.push_str("#t"),
            Value::False => out.push_str("#f"),
            Value::Eof => out.push_str("#<eof>"),
            Value::Void => out.push_str("#<void>"),
            Value::MultipleValues => out.push_str("#<values>"),
            Value::Fixnum(n) => out.push_str(&n.to_string()),
            Value::Symbol(id) => self.print_symbol(self.symbols.name(id), mode, out),
            Value::Char(c) => match mode {
                Mode::Display => out.push(c),
                Mode::Write => print_char(c, out),
            },
            Value::Str(id) => match mode {
                Mode::Display => out.push_str(self.heap.string(id)),
                Mode::Write => print_string(self.heap.string(id), out),
            },
            Value::Pair(_) => self.print_list(val, mode, out, depth),
            Value::Primitive(id) => {
                out.push_str("#<primitive:");
                out.push_str(self.primitives[id.index()].name);
                out.push('>');
            }
            Value::Closure(id) => match self.heap.closure(id).name {
                Some(name) => {
                    out.push_str("#<procedure:");
                    out.push_str(self.symbols.name(name));
                    out.push('>');
                }
                None => out.push_str("#<procedure>"),
            },
            Value::Syntax(id) => {
                out.push_str("#<syntax ");
                self.print(self.heap.syntax(id).payload, Mode::Write, out, depth + 1);
                out.push('>');
            }
            Value::Environment(_) => out.push_str("#<environment>"),
        }
    }

    fn print_symbol(&self, name: &str, mode: Mode, out: &mut String) {
        if mode == Mode::Write && needs_bars(name) {
            out.push('|');
            out.push_str(name);
            out.push('|');
        } else {
            out.push_str(name);
        }
    }

    fn print_list(&self, val: Value, mode: Mode, out: &mut String, depth: usize) {
        let Value::Pair(id) = val else { return };
        let (car, cdr) = (self.heap.car(id), self.heap.cdr(id));

        // Reader abbreviations: 'x and #'x
        if let (Value::Symbol(head), Value::Pair(rest)) = (car, cdr) {
            let prefix = match head {
                sym::QUOTE => Some("'"),
                sym::SYNTAX => Some("#'"),
                _ => None,
            };
            if let Some(prefix) = prefix {
                if self.heap.cdr(rest).is_null() {
                    out.push_str(prefix);
                    self.print(self.heap.car(rest), mode, out, depth + 1);
                    return;
                }
            }
        }

        out.push('(');
        self.print(car, mode, out, depth + 1);
        let mut current = cdr;
        let mut length = 1;
        loop {
            match current {
                Value::Null => break,
                Value::Pair(pid) => {
                    if length >= MAX_LENGTH {
                        out.push_str(" ...");
                        break;
                    }
                    out.push(' ');
                    self.print(self.heap.car(pid), mode, out, depth + 1);
                    current = self.heap.cdr(pid);
                    length += 1;
                }
                tail => {
                    out.push_str(" . ");
                    self.print(tail, mode, out, depth + 1);
                    break;
                }
            }
        }
        out.push(')');
    }
}

fn needs_bars(name: &str) -> bool {
    name.is_empty()
        || name == "."
        || name.starts_with('#')
        || name.parse::<i64>().is_ok()
        || name.chars().any(|c| {
            c.is_whitespace() || matches!(c, '(' | ')' | '[' | ']' | '"' | ';' | '\'' | '|' | '\\')
        })
}

fn print_char(c: char, out: &mut String) {
    out.push_str("#\\");
    if let Some(name) = chars::char_name(c) {
        out.push_str(name);
    } else if chars::is_printable(c) {
        out.push(c);
    } else {
        out.push_str(&format!("x{:x}", c as u32));
    }
}

fn print_string(text: &str, out: &mut String) {
    out.push('"');
    for c in text.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            '\0' => out.push_str("\\0"),
            c if c.is_control() => out.push_str(&format!("\\x{:x};", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
}
