#![allow(dead_code)]

use std::cell::RefCell;
use std::io::{self, Write};
use std::rc::Rc;

use minischeme::{Config, EvalError, Interpreter, Value};

/// Output sink shared between the interpreter and the test.
#[derive(Clone, Default)]
pub struct Captured(Rc<RefCell<Vec<u8>>>);

impl Captured {
    pub fn take(&self) -> String {
        String::from_utf8(std::mem::take(&mut *self.0.borrow_mut())).unwrap()
    }
}

impl Write for Captured {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

pub struct Session {
    pub interp: Interpreter,
    pub out: Captured,
}

impl Session {
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    pub fn with_config(config: Config) -> Self {
        let out = Captured::default();
        let interp = Interpreter::with_output(config, Box::new(out.clone())).unwrap();
        Session { interp, out }
    }

    pub fn eval(&mut self, source: &str) -> Result<Value, EvalError> {
        self.interp.eval_str(source)
    }

    /// Evaluate and render the result with `write`.
    pub fn show(&mut self, source: &str) -> String {
        match self.interp.eval_str(source) {
            Ok(val) => self.interp.write_string(val),
            Err(e) => panic!("{source}: {e}"),
        }
    }

    pub fn error(&mut self, source: &str) -> EvalError {
        match self.interp.eval_str(source) {
            Ok(val) => panic!("{source}: expected an error, got {}", self.interp.write_string(val)),
            Err(e) => e,
        }
    }
}

/// Evaluate in a fresh session and render the result.
pub fn show(source: &str) -> String {
    Session::new().show(source)
}

pub fn error(source: &str) -> EvalError {
    Session::new().error(source)
}
