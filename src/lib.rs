//! minischeme: the core of a small Scheme-like interpreter.
//!
//! Values live in an arena heap with a precise mark-sweep collector.
//! Evaluation runs on a trampoline, so tail calls use constant native stack.
//! Multiple return values pass through a per-interpreter buffer, and syntax
//! objects pair data with a source location.
//!
//! ```no_run
//! use minischeme::{Config, Interpreter, Value};
//!
//! let mut interp = Interpreter::new(Config::default())?;
//! let result = interp.eval_str("(let-values (((a b) (values 1 2))) (+ a b))")?;
//! assert_eq!(result, Value::Fixnum(3));
//! # Ok::<(), minischeme::EvalError>(())
//! ```

pub mod chars;
pub mod config;
pub mod env;
pub mod error;
pub mod eval;
mod forms;
pub mod globals;
pub mod heap;
pub mod multiple;
pub mod primitives;
pub mod printer;
pub mod procedure;
pub mod reader;
pub mod symbol;
pub mod syntax;
pub mod value;

pub use config::Config;
pub use error::{EvalError, EvalResult};
pub use eval::Interpreter;
pub use heap::{GcStats, Heap};
pub use procedure::Arity;
pub use symbol::SymbolTable;
pub use value::{equal, EnvId, SymbolId, Value};
