use std::fmt;

use smallvec::SmallVec;

use crate::error::EvalResult;
use crate::eval::Interpreter;
use crate::value::{EnvId, SymbolId, Value};

/// Allowed argument-count shape of a procedure.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Arity {
    Fixed(usize),
    AtLeast(usize),
    /// Inclusive on both ends, `min <= max`.
    Range(usize, usize),
}

impl Arity {
    pub fn from_formals(fixed: usize, has_rest: bool) -> Arity {
        if has_rest {
            Arity::AtLeast(fixed)
        } else {
            Arity::Fixed(fixed)
        }
    }

    pub fn accepts(self, n: usize) -> bool {
        match self {
            Arity::Fixed(k) => n == k,
            Arity::AtLeast(min) => n >= min,
            Arity::Range(min, max) => n >= min && n <= max,
        }
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arity::Fixed(k) => write!(f, "exactly {k}"),
            Arity::AtLeast(k) => write!(f, "at least {k}"),
            Arity::Range(min, max) => write!(f, "between {min} and {max}"),
        }
    }
}

/// Parsed lambda list: `(a b)`, `(a b . rest)` or a bare `rest`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Formals {
    pub fixed: SmallVec<[SymbolId; 4]>,
    pub rest: Option<SymbolId>,
}

impl Formals {
    pub fn arity(&self) -> Arity {
        Arity::from_formals(self.fixed.len(), self.rest.is_some())
    }
}

/// A user procedure: formals, body and the environment captured at creation.
#[derive(Clone, Debug)]
pub struct Closure {
    pub formals: Formals,
    /// A single expression; multi-expression bodies are wrapped in `begin`.
    pub body: Value,
    pub env: EnvId,
    pub name: Option<SymbolId>,
    pub arity: Arity,
}

impl Closure {
    pub fn new(formals: Formals, body: Value, env: EnvId) -> Self {
        let arity = formals.arity();
        Closure {
            formals,
            body,
            env,
            name: None,
            arity,
        }
    }

    /// Names an anonymous closure. A name, once given, is never replaced.
    pub fn set_name_once(&mut self, name: SymbolId) -> bool {
        if self.name.is_some() {
            return false;
        }
        self.name = Some(name);
        true
    }
}

pub type PrimitiveFn = fn(&mut Interpreter, &[Value]) -> EvalResult<Value>;

/// How a primitive is invoked. Most are plain native functions; the rest
/// need the caller's environment or must re-enter the evaluator, so the
/// application protocol handles them at the call site.
#[derive(Clone, Copy)]
pub enum PrimitiveKind {
    Native(PrimitiveFn),
    Eval,
    Apply,
    CurrentEnvironment,
    AndMap,
    OrMap,
    Map,
    ForEach,
    CallWithValues,
}

impl fmt::Debug for PrimitiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PrimitiveKind::Native(_) => write!(f, "Native"),
            PrimitiveKind::Eval => write!(f, "Eval"),
            PrimitiveKind::Apply => write!(f, "Apply"),
            PrimitiveKind::CurrentEnvironment => write!(f, "CurrentEnvironment"),
            PrimitiveKind::AndMap => write!(f, "AndMap"),
            PrimitiveKind::OrMap => write!(f, "OrMap"),
            PrimitiveKind::Map => write!(f, "Map"),
            PrimitiveKind::ForEach => write!(f, "ForEach"),
            PrimitiveKind::CallWithValues => write!(f, "CallWithValues"),
        }
    }
}

/// A built-in procedure. Immutable once constructed.
#[derive(Clone, Copy, Debug)]
pub struct Primitive {
    pub name: &'static str,
    pub arity: Arity,
    pub kind: PrimitiveKind,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arity_accepts() {
        assert!(Arity::Fixed(2).accepts(2));
        assert!(!Arity::Fixed(2).accepts(1));
        assert!(Arity::AtLeast(1).accepts(5));
        assert!(!Arity::AtLeast(1).accepts(0));
        assert!(Arity::Range(1, 2).accepts(2));
        assert!(!Arity::Range(1, 2).accepts(3));
    }

    #[test]
    fn arity_from_formals() {
        assert_eq!(Arity::from_formals(2, false), Arity::Fixed(2));
        assert_eq!(Arity::from_formals(2, true), Arity::AtLeast(2));
        assert_eq!(Arity::Range(1, 3).to_string(), "between 1 and 3");
    }
}
