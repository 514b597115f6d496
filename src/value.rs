use std::fmt;

use crate::heap::Heap;

macro_rules! handle {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash)]
        pub struct $name(pub u32);

        impl $name {
            #[inline]
            pub fn index(self) -> usize {
                self.0 as usize
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }
    };
}

handle!(
    /// Unique identifier for an interned symbol.
    SymbolId
);
handle!(
    /// Index into the pair arena. This is the GC handle for cons cells.
    PairId
);
handle!(
    /// Index into the string arena. Strings are mutable buffers.
    StringId
);
handle!(
    /// Index into the closure arena.
    ClosureId
);
handle!(
    /// Index into the syntax-object arena.
    SyntaxId
);
handle!(
    /// Index into the frame arena. An environment is named by its innermost frame.
    EnvId
);
handle!(
    /// Index into the interpreter's primitive table. Primitives are never collected.
    PrimitiveId
);

/// The fundamental Scheme value. Copy semantics: heap-backed data lives in
/// the arenas and is reached through the handle.
///
/// The derived `PartialEq` is identity equality (`eq?`): handles compare by
/// index, fixnums and characters compare by value.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub enum Value {
    Null,
    True,
    False,
    Eof,
    Void,
    /// Returned by a producer of zero or several values; the values
    /// themselves sit in the interpreter's values buffer.
    MultipleValues,
    Symbol(SymbolId),
    Fixnum(i64),
    Char(char),
    Str(StringId),
    Pair(PairId),
    Primitive(PrimitiveId),
    Closure(ClosureId),
    Syntax(SyntaxId),
    Environment(EnvId),
}

impl Value {
    pub fn from_bool(b: bool) -> Value {
        if b {
            Value::True
        } else {
            Value::False
        }
    }

    /// Only `#f` is false.
    #[inline]
    pub fn is_true(self) -> bool {
        self != Value::False
    }

    pub fn is_null(self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn is_pair(self) -> bool {
        matches!(self, Value::Pair(_))
    }

    pub fn is_symbol(self) -> bool {
        matches!(self, Value::Symbol(_))
    }

    pub fn is_syntax(self) -> bool {
        matches!(self, Value::Syntax(_))
    }

    pub fn is_procedure(self) -> bool {
        matches!(self, Value::Primitive(_) | Value::Closure(_))
    }

    pub fn as_pair(self) -> Option<PairId> {
        match self {
            Value::Pair(id) => Some(id),
            _ => None,
        }
    }

    pub fn as_symbol(self) -> Option<SymbolId> {
        match self {
            Value::Symbol(id) => Some(id),
            _ => None,
        }
    }

    pub fn as_fixnum(self) -> Option<i64> {
        match self {
            Value::Fixnum(n) => Some(n),
            _ => None,
        }
    }

    /// Short type name used in diagnostics.
    pub fn type_name(self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::True | Value::False => "boolean",
            Value::Eof => "eof",
            Value::Void => "void",
            Value::MultipleValues => "multiple values",
            Value::Symbol(_) => "symbol",
            Value::Fixnum(_) => "fixnum",
            Value::Char(_) => "char",
            Value::Str(_) => "string",
            Value::Pair(_) => "pair",
            Value::Primitive(_) | Value::Closure(_) => "procedure",
            Value::Syntax(_) => "syntax",
            Value::Environment(_) => "environment",
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "Null"),
            Value::True => write!(f, "True"),
            Value::False => write!(f, "False"),
            Value::Eof => write!(f, "Eof"),
            Value::Void => write!(f, "Void"),
            Value::MultipleValues => write!(f, "MultipleValues"),
            Value::Symbol(id) => write!(f, "Sym({})", id.0),
            Value::Fixnum(n) => write!(f, "Fixnum({n})"),
            Value::Char(c) => write!(f, "Char({c:?})"),
            Value::Str(id) => write!(f, "Str({})", id.0),
            Value::Pair(id) => write!(f, "Pair({})", id.0),
            Value::Primitive(id) => write!(f, "Prim({})", id.0),
            Value::Closure(id) => write!(f, "Clo({})", id.0),
            Value::Syntax(id) => write!(f, "Stx({})", id.0),
            Value::Environment(id) => write!(f, "Env({})", id.0),
        }
    }
}

/// Structural equality (`equal?`): strings by content, pairs by recursive
/// car/cdr comparison, everything else by identity.
///
/// Cyclic pair structure may not terminate.
pub fn equal(heap: &Heap, a: Value, b: Value) -> bool {
    let (mut a, mut b) = (a, b);
    loop {
        match (a, b) {
            (Value::Str(x), Value::Str(y)) => return heap.string(x) == heap.string(y),
            (Value::Pair(x), Value::Pair(y)) => {
                if x == y {
                    return true;
                }
                if !equal(heap, heap.car(x), heap.car(y)) {
                    return false;
                }
                a = heap.cdr(x);
                b = heap.cdr(y);
            }
            _ => return a == b,
        }
    }
}
