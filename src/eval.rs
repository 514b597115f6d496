use std::io::{self, Write};

use smallvec::SmallVec;
use tracing::{trace, Level};

use crate::config::Config;
use crate::env;
use crate::error::{EvalError, EvalResult};
use crate::globals;
use crate::heap::{GcStats, Heap};
use crate::multiple::ValuesBuffer;
use crate::primitives;
use crate::printer::Printer;
use crate::procedure::{Arity, Closure, Formals, Primitive, PrimitiveKind};
use crate::reader;
use crate::symbol::SymbolTable;
use crate::syntax;
use crate::value::{ClosureId, EnvId, PrimitiveId, SymbolId, Value};

/// Evaluated arguments of one application.
pub(crate) type Args = SmallVec<[Value; 8]>;

/// Result of a single evaluation step.
pub(crate) enum Step {
    /// The expression produced a value.
    Return(Value),
    /// Tail position: evaluate this expression in this environment next,
    /// without growing the native stack.
    Continue(Value, EnvId),
}

/// How `andmap`, `ormap`, `map` and `for-each` combine per-element results.
#[derive(Clone, Copy)]
enum MapMode {
    All,
    Any,
    Collect,
    Each,
}

/// The interpreter instance. All evaluation state lives here so the
/// collector can find every root and separate instances stay isolated.
pub struct Interpreter {
    pub heap: Heap,
    pub symbols: SymbolTable,
    primitives: Vec<Primitive>,
    values: ValuesBuffer,
    /// Shadow stack of in-flight values: every active `(expr, env)` pair
    /// plus temporaries that are alive across a nested evaluation.
    pub(crate) roots: Vec<Value>,
    /// Values registered by the embedder.
    pinned: Vec<Value>,
    root_env: EnvId,
    global_env: EnvId,
    sugar: bool,
    output: Box<dyn Write>,
}

impl Interpreter {
    /// Build an interpreter whose output primitives write to stdout.
    pub fn new(config: Config) -> EvalResult<Self> {
        Self::with_output(config, Box::new(io::stdout()))
    }

    pub fn with_output(config: Config, output: Box<dyn Write>) -> EvalResult<Self> {
        let mut heap = Heap::new(config.heap_capacity, config.gc_threshold);
        let mut symbols = SymbolTable::new();
        let primitives = primitives::table();
        let (root_env, global_env) = globals::build_globals(&mut heap, &mut symbols, &primitives)?;

        Ok(Interpreter {
            heap,
            symbols,
            primitives,
            values: ValuesBuffer::new(),
            roots: Vec::with_capacity(256),
            pinned: Vec::new(),
            root_env,
            global_env,
            sugar: config.sugar,
            output,
        })
    }

    /// The environment holding all primitive bindings and top-level definitions.
    pub fn global_env(&self) -> EnvId {
        self.global_env
    }

    /// The fixed empty frame every environment chain ends in.
    pub fn root_env(&self) -> EnvId {
        self.root_env
    }

    pub fn sugar_enabled(&self) -> bool {
        self.sugar
    }

    pub fn intern(&mut self, name: &str) -> Value {
        Value::Symbol(self.symbols.intern(name))
    }

    pub fn primitive(&self, id: PrimitiveId) -> &Primitive {
        &self.primitives[id.index()]
    }

    /// Keep `val` alive across collections until released.
    pub fn register_root(&mut self, val: Value) {
        self.pinned.push(val);
    }

    pub fn release_root(&mut self, val: Value) {
        if let Some(i) = self.pinned.iter().rposition(|&v| v == val) {
            self.pinned.swap_remove(i);
        }
    }

    pub fn collect_garbage(&mut self) -> GcStats {
        let fixed = [Value::Environment(self.root_env), Value::Environment(self.global_env)];
        let roots = self
            .roots
            .iter()
            .chain(&self.pinned)
            .chain(self.values.live())
            .copied()
            .chain(fixed);
        self.heap.collect(roots)
    }

    /// The values handed off by the last multi-valued result.
    pub fn values(&self) -> &[Value] {
        self.values.live()
    }

    pub fn take_values(&mut self) -> Vec<Value> {
        self.values.take()
    }

    pub fn output(&mut self) -> &mut dyn Write {
        self.output.as_mut()
    }

    fn printer(&self) -> Printer<'_> {
        Printer::new(&self.heap, &self.symbols, &self.primitives)
    }

    /// Machine-readable rendering, as `write` prints it.
    pub fn write_string(&self, val: Value) -> String {
        self.printer().write(val)
    }

    /// Human-readable rendering, as `display` prints it.
    pub fn display_string(&self, val: Value) -> String {
        self.printer().display(val)
    }

    // ========================================================================
    // Variables
    // ========================================================================

    pub fn lookup(&self, env: EnvId, name: SymbolId) -> EvalResult<Value> {
        env::lookup(&self.heap, env, name)
            .ok_or_else(|| EvalError::UnboundVariable(self.symbols.name(name).to_string()))
    }

    /// `set!`: mutate the nearest binding and return the old value.
    pub fn set_variable(&mut self, env: EnvId, name: SymbolId, val: Value) -> EvalResult<Value> {
        match env::set(&mut self.heap, env, name, val) {
            Some(old) => Ok(old),
            None => Err(EvalError::UnboundVariable(self.symbols.name(name).to_string())),
        }
    }

    pub fn define(&mut self, env: EnvId, name: SymbolId, val: Value) {
        env::define(&mut self.heap, env, name, val);
    }

    pub fn define_global(&mut self, name: &str, val: Value) {
        let name = self.symbols.intern(name);
        self.define(self.global_env, name, val);
    }

    // ========================================================================
    // Core evaluation entry points
    // ========================================================================

    /// Evaluate every form in `source` in the global environment and return
    /// the last result.
    pub fn eval_str(&mut self, source: &str) -> EvalResult<Value> {
        let mut pos = 0;
        let mut last = Value::Void;
        while let Some((expr, next)) =
            reader::read_one_at(source, pos, &mut self.heap, &mut self.symbols)?
        {
            pos = next;
            last = self.eval(expr, self.global_env)?;
        }
        Ok(last)
    }

    /// Evaluate `expr` in `env`.
    pub fn eval(&mut self, expr: Value, env: EnvId) -> EvalResult<Value> {
        let base = self.roots.len();
        self.roots.push(expr);
        self.roots.push(Value::Environment(env));
        let result = self.run(base, expr, env);
        self.roots.truncate(base);
        result
    }

    /// The trampoline. Tail positions come back as `Step::Continue` and
    /// replace `(expr, env)` in place; only non-tail subexpressions recurse.
    fn run(&mut self, base: usize, mut expr: Value, mut env: EnvId) -> EvalResult<Value> {
        loop {
            // Safe point: everything live is on the root stack.
            if self.heap.should_gc() {
                self.collect_garbage();
            }

            let step = self.step(expr, env)?;
            self.roots.truncate(base + 2);
            match step {
                Step::Return(val) => return Ok(val),
                Step::Continue(next_expr, next_env) => {
                    expr = next_expr;
                    env = next_env;
                    self.roots[base] = expr;
                    self.roots[base + 1] = Value::Environment(env);
                }
            }
        }
    }

    fn step(&mut self, expr: Value, env: EnvId) -> EvalResult<Step> {
        match expr {
            Value::Symbol(name) => Ok(Step::Return(self.lookup(env, name)?)),
            Value::Null => Err(EvalError::BadSyntax(
                "application: missing procedure expression in: ()".to_string(),
            )),
            Value::Pair(id) => {
                if let Value::Symbol(head) = self.heap.car(id) {
                    if let Some(form) = self.special_form(head) {
                        return self.eval_form(form, expr, env);
                    }
                }
                self.eval_application(expr, env)
            }
            _ => Ok(Step::Return(expr)),
        }
    }

    fn eval_application(&mut self, expr: Value, env: EnvId) -> EvalResult<Step> {
        let Some(items) = self.heap.list_to_vec(expr) else {
            return Err(self.bad_syntax("application", expr));
        };
        // Operator and operands stay on the root stack until the step ends.
        let base = self.roots.len();
        for &item in &items {
            let val = self.eval(item, env)?;
            let val = self.single_value(val, "application")?;
            self.roots.push(val);
        }
        let proc = self.roots[base];
        let args: Args = self.roots[base + 1..].iter().copied().collect();
        self.apply_procedure(proc, args, env)
    }

    // ========================================================================
    // Application protocol
    // ========================================================================

    /// Apply `proc` to `args`, which the caller keeps rooted. `env` is the
    /// call site's environment, needed by `eval` and `current-environment`.
    pub(crate) fn apply_procedure(
        &mut self,
        mut proc: Value,
        mut args: Args,
        env: EnvId,
    ) -> EvalResult<Step> {
        loop {
            let id = match proc {
                Value::Closure(id) => return self.apply_closure(id, &args),
                Value::Primitive(id) => id,
                other => return Err(EvalError::NotAProcedure(self.write_string(other))),
            };
            let prim = self.primitives[id.index()];
            self.check_arity(prim.name, prim.arity, args.len())?;

            match prim.kind {
                PrimitiveKind::Native(func) => return Ok(Step::Return(func(self, &args)?)),
                PrimitiveKind::CurrentEnvironment => {
                    return Ok(Step::Return(Value::Environment(env)));
                }
                PrimitiveKind::Eval => {
                    let target = match args.get(1) {
                        None => env,
                        Some(&Value::Environment(target)) => target,
                        Some(&other) => return Err(self.bad_type("eval", "environment", other)),
                    };
                    let datum = syntax::strip_syntax(&mut self.heap, args[0])?;
                    return Ok(Step::Continue(datum, target));
                }
                PrimitiveKind::Apply => {
                    let spread = self.spread_apply_args(&args)?;
                    proc = args[0];
                    args = spread;
                    self.roots.extend(args.iter().copied());
                }
                PrimitiveKind::CallWithValues => {
                    let (producer, consumer) = (args[0], args[1]);
                    let produced = self.call(producer, Args::new(), env)?;
                    args = self.receive_all(produced);
                    proc = consumer;
                    self.roots.extend(args.iter().copied());
                }
                PrimitiveKind::AndMap => return self.map_lists(MapMode::All, prim.name, &args, env),
                PrimitiveKind::OrMap => return self.map_lists(MapMode::Any, prim.name, &args, env),
                PrimitiveKind::Map => return self.map_lists(MapMode::Collect, prim.name, &args, env),
                PrimitiveKind::ForEach => return self.map_lists(MapMode::Each, prim.name, &args, env),
            }
        }
    }

    /// Non-tail application: run `proc` to completion and return its result.
    pub(crate) fn call(&mut self, proc: Value, args: Args, env: EnvId) -> EvalResult<Value> {
        let base = self.roots.len();
        self.roots.push(proc);
        self.roots.extend(args.iter().copied());
        let result = match self.apply_procedure(proc, args, env) {
            Ok(Step::Return(val)) => Ok(val),
            Ok(Step::Continue(expr, env)) => self.eval(expr, env),
            Err(err) => Err(err),
        };
        self.roots.truncate(base);
        result
    }

    /// Bind arguments in a fresh frame over the captured environment and
    /// continue with the body.
    fn apply_closure(&mut self, id: ClosureId, args: &[Value]) -> EvalResult<Step> {
        let closure = self.heap.closure(id);
        let (arity, captured, body) = (closure.arity, closure.env, closure.body);
        if !arity.accepts(args.len()) {
            return Err(EvalError::ArityMismatch {
                procedure: self.procedure_name(Value::Closure(id)),
                expected: arity,
                given: args.len(),
            });
        }
        let formals = closure.formals.clone();
        if tracing::enabled!(Level::TRACE) {
            let name = self.procedure_name(Value::Closure(id));
            trace!(procedure = %name, args = args.len(), "apply closure");
        }

        let frame = env::extend(&mut self.heap, captured)?;
        for (&name, &arg) in formals.fixed.iter().zip(args) {
            env::define(&mut self.heap, frame, name, arg);
        }
        if let Some(rest) = formals.rest {
            let rest_list = self.heap.list(&args[formals.fixed.len()..])?;
            env::define(&mut self.heap, frame, rest, rest_list);
        }
        Ok(Step::Continue(body, frame))
    }

    fn check_arity(&self, name: &str, arity: Arity, given: usize) -> EvalResult<()> {
        if arity.accepts(given) {
            return Ok(());
        }
        Err(EvalError::ArityMismatch {
            procedure: name.to_string(),
            expected: arity,
            given,
        })
    }

    /// `(apply f a ... lst)` → `(f a ... . lst)`.
    fn spread_apply_args(&self, args: &[Value]) -> EvalResult<Args> {
        let (&last, middle) = match args[1..].split_last() {
            Some(split) => split,
            None => return Err(self.bad_type("apply", "list", Value::Void)),
        };
        let Some(tail) = self.heap.list_to_vec(last) else {
            return Err(self.bad_type("apply", "list", last));
        };
        let mut spread = Args::with_capacity(middle.len() + tail.len());
        spread.extend_from_slice(middle);
        spread.extend(tail);
        Ok(spread)
    }

    fn map_lists(
        &mut self,
        mode: MapMode,
        name: &'static str,
        args: &[Value],
        env: EnvId,
    ) -> EvalResult<Step> {
        let proc = args[0];
        let mut lists = Vec::with_capacity(args.len() - 1);
        for &list in &args[1..] {
            match self.heap.list_to_vec(list) {
                Some(items) => lists.push(items),
                None => return Err(self.bad_type(name, "list", list)),
            }
        }
        let len = lists[0].len();
        if let Some(i) = lists.iter().position(|l| l.len() != len) {
            return Err(self.bad_type(name, "lists of the same length", args[i + 1]));
        }
        // A callback may cut the lists apart with set-cdr!; pin the elements.
        for list in &lists {
            self.roots.extend(list.iter().copied());
        }

        let mut results = Vec::new();
        for i in 0..len {
            let call_args: Args = lists.iter().map(|l| l[i]).collect();
            if i + 1 == len && matches!(mode, MapMode::All | MapMode::Any) {
                return self.apply_procedure(proc, call_args, env);
            }
            let val = self.call(proc, call_args, env)?;
            match mode {
                MapMode::All => {
                    if !self.single_value(val, name)?.is_true() {
                        return Ok(Step::Return(Value::False));
                    }
                }
                MapMode::Any => {
                    let val = self.single_value(val, name)?;
                    if val.is_true() {
                        return Ok(Step::Return(val));
                    }
                }
                MapMode::Collect => {
                    let val = self.single_value(val, name)?;
                    self.roots.push(val);
                    results.push(val);
                }
                MapMode::Each => {
                    self.discard_values(val);
                }
            }
        }

        Ok(Step::Return(match mode {
            MapMode::All => Value::True,
            MapMode::Any => Value::False,
            MapMode::Collect => self.heap.list(&results)?,
            MapMode::Each => Value::Void,
        }))
    }

    // ========================================================================
    // Multiple values
    // ========================================================================

    /// Producer side: one value is returned directly, any other count goes
    /// through the values buffer.
    pub(crate) fn return_values(&mut self, vals: &[Value]) -> Value {
        if let [single] = vals {
            return *single;
        }
        self.values.store(vals);
        Value::MultipleValues
    }

    /// Consumer side for contexts that expect exactly one value.
    pub(crate) fn single_value(&mut self, val: Value, context: &str) -> EvalResult<Value> {
        if val != Value::MultipleValues {
            return Ok(val);
        }
        let mut vals = self.values.take();
        if vals.len() == 1 {
            return Ok(vals.remove(0));
        }
        Err(EvalError::ArityMismatch {
            procedure: context.to_string(),
            expected: Arity::Fixed(1),
            given: vals.len(),
        })
    }

    /// Consumer side for contexts that expect exactly `count` values.
    pub(crate) fn receive(&mut self, count: usize, val: Value, context: &str) -> EvalResult<Args> {
        let vals = self.receive_all(val);
        if vals.len() != count {
            return Err(EvalError::ArityMismatch {
                procedure: context.to_string(),
                expected: Arity::Fixed(count),
                given: vals.len(),
            });
        }
        Ok(vals)
    }

    /// Normalize a single or multiple result into a list of values.
    pub(crate) fn receive_all(&mut self, val: Value) -> Args {
        if val == Value::MultipleValues {
            self.values.take().into_iter().collect()
        } else {
            smallvec::smallvec![val]
        }
    }

    /// Effect context: results, multiple or not, are dropped.
    pub(crate) fn discard_values(&mut self, val: Value) {
        if val == Value::MultipleValues {
            self.values.take();
        }
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    pub(crate) fn make_closure(&mut self, formals: Formals, body: Value, env: EnvId) -> EvalResult<Value> {
        let id = self.heap.alloc_closure(Closure::new(formals, body, env))?;
        Ok(Value::Closure(id))
    }

    /// Name used in diagnostics for a procedure value.
    pub fn procedure_name(&self, proc: Value) -> String {
        match proc {
            Value::Closure(id) => match self.heap.closure(id).name {
                Some(name) => self.symbols.name(name).to_string(),
                None => "#<procedure>".to_string(),
            },
            Value::Primitive(id) => self.primitive(id).name.to_string(),
            other => self.write_string(other),
        }
    }

    pub(crate) fn bad_syntax(&self, keyword: &str, expr: Value) -> EvalError {
        EvalError::BadSyntax(format!("{keyword}: bad syntax in: {}", self.write_string(expr)))
    }

    pub(crate) fn bad_type(&self, procedure: &str, expected: &'static str, given: Value) -> EvalError {
        EvalError::BadType {
            procedure: procedure.to_string(),
            expected,
            given: self.write_string(given),
        }
    }
}
