//! Special forms and the sugar that expands into them.
//!
//! Every form checks its shape before anything is evaluated, so a malformed
//! form never runs half its effects. Tail positions are returned as
//! `Step::Continue`.

use smallvec::SmallVec;
use tracing::trace;

use crate::env;
use crate::error::{EvalError, EvalResult};
use crate::eval::{Interpreter, Step};
use crate::procedure::Formals;
use crate::symbol::sym;
use crate::syntax::{self, SyntaxObject};
use crate::value::{EnvId, SymbolId, Value};

type Ids = SmallVec<[SymbolId; 4]>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Form {
    Quote,
    QuoteSyntax,
    SyntaxLoc,
    Set,
    If,
    Lambda,
    Begin,
    DefineValues,
    LetValues,
    LetrecValues,
    Cond,
    And,
    Or,
    Define,
    Let,
    Letrec,
}

impl Form {
    fn keyword(self) -> &'static str {
        match self {
            Form::Quote => "quote",
            Form::QuoteSyntax => "quote-syntax",
            Form::SyntaxLoc => "syntax/loc",
            Form::Set => "set!",
            Form::If => "if",
            Form::Lambda => "lambda",
            Form::Begin => "begin",
            Form::DefineValues => "define-values",
            Form::LetValues => "let-values",
            Form::LetrecValues => "letrec-values",
            Form::Cond => "cond",
            Form::And => "and",
            Form::Or => "or",
            Form::Define => "define",
            Form::Let => "let",
            Form::Letrec => "letrec",
        }
    }
}

/// One clause of `let-values` / `letrec-values`.
struct Binding {
    ids: Ids,
    expr: Value,
}

impl Interpreter {
    /// The form introduced by `head`, if any. Sugar keywords only count when
    /// sugar was enabled at construction.
    pub(crate) fn special_form(&self, head: SymbolId) -> Option<Form> {
        let form = match head {
            sym::QUOTE => Form::Quote,
            sym::QUOTE_SYNTAX | sym::SYNTAX => Form::QuoteSyntax,
            sym::SYNTAX_LOC => Form::SyntaxLoc,
            sym::SET => Form::Set,
            sym::IF => Form::If,
            sym::LAMBDA => Form::Lambda,
            sym::BEGIN => Form::Begin,
            sym::DEFINE_VALUES => Form::DefineValues,
            sym::LET_VALUES => Form::LetValues,
            sym::LETREC_VALUES => Form::LetrecValues,
            sym::COND => Form::Cond,
            sym::AND => Form::And,
            sym::OR => Form::Or,
            sym::DEFINE if self.sugar_enabled() => Form::Define,
            sym::LET if self.sugar_enabled() => Form::Let,
            sym::LETREC if self.sugar_enabled() => Form::Letrec,
            _ => return None,
        };
        Some(form)
    }

    pub(crate) fn eval_form(&mut self, form: Form, expr: Value, env: EnvId) -> EvalResult<Step> {
        let Some(items) = self.heap.list_to_vec(expr) else {
            return Err(self.bad_syntax(form.keyword(), expr));
        };
        trace!(form = form.keyword(), "special form");

        match form {
            Form::Quote => {
                self.check_shape(form, expr, items.len() == 2)?;
                Ok(Step::Return(items[1]))
            }
            Form::QuoteSyntax => {
                self.check_shape(form, expr, items.len() == 2)?;
                Ok(Step::Return(syntax::wrap(&mut self.heap, items[1], Value::False)?))
            }
            Form::SyntaxLoc => self.eval_syntax_loc(expr, &items, env),
            Form::Set => self.eval_set(expr, &items, env),
            Form::If => self.eval_if(expr, &items, env),
            Form::Lambda => self.eval_lambda(expr, &items, env),
            Form::Begin => self.eval_body(&items[1..], env),
            Form::DefineValues => self.eval_define_values(expr, &items, env),
            Form::LetValues => self.eval_let_values(expr, &items, env),
            Form::LetrecValues => self.eval_letrec_values(expr, &items, env),
            Form::Cond => self.eval_cond(expr, &items, env),
            Form::And => self.eval_and_or(true, &items[1..], env),
            Form::Or => self.eval_and_or(false, &items[1..], env),
            Form::Define => Ok(Step::Continue(self.expand_define(expr, &items)?, env)),
            Form::Let => Ok(Step::Continue(self.expand_let(expr, &items)?, env)),
            Form::Letrec => Ok(Step::Continue(self.expand_letrec(expr, &items)?, env)),
        }
    }

    fn check_shape(&self, form: Form, expr: Value, ok: bool) -> EvalResult<()> {
        if ok {
            Ok(())
        } else {
            Err(self.bad_syntax(form.keyword(), expr))
        }
    }

    /// Evaluate a sequence: all but the last for effect, the last in tail
    /// position. An empty sequence is Void.
    fn eval_body(&mut self, body: &[Value], env: EnvId) -> EvalResult<Step> {
        let Some((&last, init)) = body.split_last() else {
            return Ok(Step::Return(Value::Void));
        };
        if !init.is_empty() {
            // The frame may be fresh and referenced by nothing else yet.
            self.roots.push(Value::Environment(env));
        }
        for &expr in init {
            let val = self.eval(expr, env)?;
            self.discard_values(val);
        }
        Ok(Step::Continue(last, env))
    }

    fn eval_syntax_loc(&mut self, expr: Value, items: &[Value], env: EnvId) -> EvalResult<Step> {
        self.check_shape(Form::SyntaxLoc, expr, items.len() == 3)?;
        let loc = self.eval(items[1], env)?;
        let loc = self.single_value(loc, "syntax/loc")?;
        let location = match loc {
            Value::Syntax(id) => self.heap.syntax(id).location,
            other => other,
        };
        let payload = match items[2] {
            Value::Syntax(id) => self.heap.syntax(id).payload,
            other => other,
        };
        let id = self.heap.alloc_syntax(SyntaxObject { payload, location })?;
        Ok(Step::Return(Value::Syntax(id)))
    }

    fn eval_set(&mut self, expr: Value, items: &[Value], env: EnvId) -> EvalResult<Step> {
        let target = match items {
            [_, Value::Symbol(name), _] => *name,
            _ => return Err(self.bad_syntax("set!", expr)),
        };
        let val = self.eval(items[2], env)?;
        let val = self.single_value(val, "set!")?;
        self.set_variable(env, target, val)?;
        Ok(Step::Return(Value::Void))
    }

    fn eval_if(&mut self, expr: Value, items: &[Value], env: EnvId) -> EvalResult<Step> {
        self.check_shape(Form::If, expr, matches!(items.len(), 3 | 4))?;
        let test = self.eval(items[1], env)?;
        if self.single_value(test, "if")?.is_true() {
            Ok(Step::Continue(items[2], env))
        } else if let Some(&alternative) = items.get(3) {
            Ok(Step::Continue(alternative, env))
        } else {
            Ok(Step::Return(Value::Void))
        }
    }

    fn eval_lambda(&mut self, expr: Value, items: &[Value], env: EnvId) -> EvalResult<Step> {
        self.check_shape(Form::Lambda, expr, items.len() >= 3)?;
        let formals = self.parse_formals(expr, items[1])?;
        let body = if items.len() == 3 {
            items[2]
        } else {
            // Reuse the body list itself: `(begin . body)`.
            let body_list = self.list_tail(expr, 2);
            self.heap.cons(Value::Symbol(sym::BEGIN), body_list)?
        };
        Ok(Step::Return(self.make_closure(formals, body, env)?))
    }

    fn eval_define_values(&mut self, expr: Value, items: &[Value], env: EnvId) -> EvalResult<Step> {
        self.check_shape(Form::DefineValues, expr, items.len() == 3)?;
        let ids = self.parse_ids(Form::DefineValues, expr, items[1])?;
        let produced = self.eval(items[2], env)?;
        let vals = self.receive(ids.len(), produced, "define-values")?;
        for (&id, &val) in ids.iter().zip(&vals) {
            env::define(&mut self.heap, env, id, val);
        }
        if let [id] = ids[..] {
            self.name_closure(vals[0], id);
        }
        Ok(Step::Return(Value::Void))
    }

    fn eval_let_values(&mut self, expr: Value, items: &[Value], env: EnvId) -> EvalResult<Step> {
        self.check_shape(Form::LetValues, expr, items.len() >= 3)?;
        let bindings = self.parse_bindings(Form::LetValues, expr, items[1])?;

        let base = self.roots.len();
        for binding in &bindings {
            let produced = self.eval(binding.expr, env)?;
            let vals = self.receive(binding.ids.len(), produced, "let-values")?;
            self.roots.extend(vals);
        }

        let frame = env::extend(&mut self.heap, env)?;
        self.bind_all(frame, &bindings, base);
        self.roots.truncate(base);
        self.eval_body(&items[2..], frame)
    }

    fn eval_letrec_values(&mut self, expr: Value, items: &[Value], env: EnvId) -> EvalResult<Step> {
        self.check_shape(Form::LetrecValues, expr, items.len() >= 3)?;
        let bindings = self.parse_bindings(Form::LetrecValues, expr, items[1])?;

        let frame = env::extend(&mut self.heap, env)?;
        self.roots.push(Value::Environment(frame));
        let base = self.roots.len();
        for binding in &bindings {
            let produced = self.eval(binding.expr, frame)?;
            let vals = self.receive(binding.ids.len(), produced, "letrec-values")?;
            self.roots.extend(vals);
        }

        self.bind_all(frame, &bindings, base);
        self.roots.truncate(base);
        self.eval_body(&items[2..], frame)
    }

    /// Commit the values collected on the root stack from `base` onward.
    fn bind_all(&mut self, frame: EnvId, bindings: &[Binding], base: usize) {
        let mut next = base;
        for binding in bindings {
            for &id in &binding.ids {
                let val = self.roots[next];
                env::define(&mut self.heap, frame, id, val);
                next += 1;
            }
            if let [id] = binding.ids[..] {
                self.name_closure(self.roots[next - 1], id);
            }
        }
    }

    fn eval_cond(&mut self, expr: Value, items: &[Value], env: EnvId) -> EvalResult<Step> {
        let mut clauses = Vec::with_capacity(items.len() - 1);
        for (i, &clause) in items[1..].iter().enumerate() {
            let parts = match self.heap.list_to_vec(clause) {
                Some(parts) if !parts.is_empty() => parts,
                _ => return Err(self.bad_syntax("cond", expr)),
            };
            if parts[0] == Value::Symbol(sym::ELSE) {
                if i + 2 != items.len() {
                    return Err(EvalError::BadSyntax(format!(
                        "cond: else must be last in: {}",
                        self.write_string(expr)
                    )));
                }
                self.check_shape(Form::Cond, expr, parts.len() >= 2)?;
            }
            clauses.push(parts);
        }

        for parts in &clauses {
            if parts[0] == Value::Symbol(sym::ELSE) {
                return self.eval_body(&parts[1..], env);
            }
            let test = self.eval(parts[0], env)?;
            let test = self.single_value(test, "cond")?;
            if test.is_true() {
                if parts.len() == 1 {
                    return Ok(Step::Return(test));
                }
                return self.eval_body(&parts[1..], env);
            }
        }
        Ok(Step::Return(Value::Void))
    }

    /// `and` when `conjunction` is set, `or` otherwise.
    fn eval_and_or(&mut self, conjunction: bool, operands: &[Value], env: EnvId) -> EvalResult<Step> {
        let Some((&last, init)) = operands.split_last() else {
            return Ok(Step::Return(Value::from_bool(conjunction)));
        };
        let context = if conjunction { "and" } else { "or" };
        for &operand in init {
            let val = self.eval(operand, env)?;
            let val = self.single_value(val, context)?;
            if val.is_true() != conjunction {
                return Ok(Step::Return(val));
            }
        }
        Ok(Step::Continue(last, env))
    }

    // ========================================================================
    // Sugar
    // ========================================================================

    /// `(define id e)` and `(define (f . formals) body ...)`.
    fn expand_define(&mut self, expr: Value, items: &[Value]) -> EvalResult<Value> {
        self.check_shape(Form::Define, expr, items.len() >= 3)?;
        let define_values = Value::Symbol(sym::DEFINE_VALUES);
        match items[1] {
            Value::Symbol(_) => {
                self.check_shape(Form::Define, expr, items.len() == 3)?;
                let ids = self.heap.list(&[items[1]])?;
                self.heap.list(&[define_values, ids, items[2]])
            }
            Value::Pair(header) => {
                let name = self.heap.car(header);
                self.check_shape(Form::Define, expr, name.is_symbol())?;
                let formals = self.heap.cdr(header);
                let body = self.list_tail(expr, 2);
                let lambda = self.heap.cons(formals, body)?;
                let lambda = self.heap.cons(Value::Symbol(sym::LAMBDA), lambda)?;
                let ids = self.heap.list(&[name])?;
                self.heap.list(&[define_values, ids, lambda])
            }
            _ => Err(self.bad_syntax("define", expr)),
        }
    }

    /// `(let ((id e) ...) body ...)` and named `let`.
    fn expand_let(&mut self, expr: Value, items: &[Value]) -> EvalResult<Value> {
        self.check_shape(Form::Let, expr, items.len() >= 3)?;
        if let Value::Symbol(_) = items[1] {
            return self.expand_named_let(expr, items);
        }
        let pairs = self.parse_let_bindings(Form::Let, expr, items[1])?;
        let clauses = self.single_id_clauses(&pairs)?;
        let body = self.list_tail(expr, 2);
        let tail = self.heap.cons(clauses, body)?;
        self.heap.cons(Value::Symbol(sym::LET_VALUES), tail)
    }

    /// `(let name ((id e) ...) body ...)` →
    /// `((letrec-values (((name) (lambda (id ...) body ...))) name) e ...)`.
    fn expand_named_let(&mut self, expr: Value, items: &[Value]) -> EvalResult<Value> {
        self.check_shape(Form::Let, expr, items.len() >= 4)?;
        let name = items[1];
        let pairs = self.parse_let_bindings(Form::Let, expr, items[2])?;
        let params: Vec<Value> = pairs.iter().map(|&(id, _)| Value::Symbol(id)).collect();
        let inits: Vec<Value> = pairs.iter().map(|&(_, init)| init).collect();

        let params = self.heap.list(&params)?;
        let body = self.list_tail(expr, 3);
        let lambda = self.heap.cons(params, body)?;
        let lambda = self.heap.cons(Value::Symbol(sym::LAMBDA), lambda)?;
        let ids = self.heap.list(&[name])?;
        let clause = self.heap.list(&[ids, lambda])?;
        let clauses = self.heap.list(&[clause])?;
        let letrec = self.heap.list(&[Value::Symbol(sym::LETREC_VALUES), clauses, name])?;
        let inits = self.heap.list(&inits)?;
        self.heap.cons(letrec, inits)
    }

    /// `(letrec ((id e) ...) body ...)`.
    fn expand_letrec(&mut self, expr: Value, items: &[Value]) -> EvalResult<Value> {
        self.check_shape(Form::Letrec, expr, items.len() >= 3)?;
        let pairs = self.parse_let_bindings(Form::Letrec, expr, items[1])?;
        let clauses = self.single_id_clauses(&pairs)?;
        let body = self.list_tail(expr, 2);
        let tail = self.heap.cons(clauses, body)?;
        self.heap.cons(Value::Symbol(sym::LETREC_VALUES), tail)
    }

    /// `((id e) ...)` → `(((id) e) ...)`.
    fn single_id_clauses(&mut self, pairs: &[(SymbolId, Value)]) -> EvalResult<Value> {
        let mut clauses = Vec::with_capacity(pairs.len());
        for &(id, init) in pairs {
            let ids = self.heap.list(&[Value::Symbol(id)])?;
            clauses.push(self.heap.list(&[ids, init])?);
        }
        self.heap.list(&clauses)
    }

    // ========================================================================
    // Shape parsing
    // ========================================================================

    /// `(a b)`, `(a b . rest)` or a bare `rest`, with no duplicates.
    fn parse_formals(&self, expr: Value, spec: Value) -> EvalResult<Formals> {
        let mut fixed = Ids::new();
        let mut current = spec;
        let rest = loop {
            match current {
                Value::Null => break None,
                Value::Symbol(id) => break Some(id),
                Value::Pair(pair) => match self.heap.car(pair) {
                    Value::Symbol(id) => {
                        fixed.push(id);
                        current = self.heap.cdr(pair);
                    }
                    _ => return Err(self.bad_syntax("lambda", expr)),
                },
                _ => return Err(self.bad_syntax("lambda", expr)),
            }
        };
        let all = fixed.iter().copied().chain(rest);
        if has_duplicates(all) {
            return Err(EvalError::BadSyntax(format!(
                "lambda: duplicate argument name in: {}",
                self.write_string(expr)
            )));
        }
        Ok(Formals { fixed, rest })
    }

    /// A proper list of distinct identifiers.
    fn parse_ids(&self, form: Form, expr: Value, list: Value) -> EvalResult<Ids> {
        let Some(items) = self.heap.list_to_vec(list) else {
            return Err(self.bad_syntax(form.keyword(), expr));
        };
        let mut ids = Ids::new();
        for item in items {
            match item {
                Value::Symbol(id) => ids.push(id),
                _ => return Err(self.bad_syntax(form.keyword(), expr)),
            }
        }
        if has_duplicates(ids.iter().copied()) {
            return Err(self.duplicate_binding(form, expr));
        }
        Ok(ids)
    }

    /// `(((id ...) expr) ...)` with every id distinct across all clauses.
    fn parse_bindings(&self, form: Form, expr: Value, list: Value) -> EvalResult<Vec<Binding>> {
        let Some(clauses) = self.heap.list_to_vec(list) else {
            return Err(self.bad_syntax(form.keyword(), expr));
        };
        let mut bindings = Vec::with_capacity(clauses.len());
        for clause in clauses {
            match self.heap.list_to_vec(clause).as_deref() {
                Some(&[ids, init]) => bindings.push(Binding {
                    ids: self.parse_ids(form, expr, ids)?,
                    expr: init,
                }),
                _ => return Err(self.bad_syntax(form.keyword(), expr)),
            }
        }
        if has_duplicates(bindings.iter().flat_map(|b| b.ids.iter().copied())) {
            return Err(self.duplicate_binding(form, expr));
        }
        Ok(bindings)
    }

    /// `((id expr) ...)` as used by the sugar forms.
    fn parse_let_bindings(&self, form: Form, expr: Value, list: Value) -> EvalResult<Vec<(SymbolId, Value)>> {
        let Some(clauses) = self.heap.list_to_vec(list) else {
            return Err(self.bad_syntax(form.keyword(), expr));
        };
        let mut pairs = Vec::with_capacity(clauses.len());
        for clause in clauses {
            match self.heap.list_to_vec(clause).as_deref() {
                Some(&[Value::Symbol(id), init]) => pairs.push((id, init)),
                _ => return Err(self.bad_syntax(form.keyword(), expr)),
            }
        }
        if has_duplicates(pairs.iter().map(|&(id, _)| id)) {
            return Err(self.duplicate_binding(form, expr));
        }
        Ok(pairs)
    }

    fn duplicate_binding(&self, form: Form, expr: Value) -> EvalError {
        EvalError::BadSyntax(format!(
            "{}: duplicate identifier in: {}",
            form.keyword(),
            self.write_string(expr)
        ))
    }

    /// The list after dropping `n` elements. Callers have already checked
    /// that `list` is proper and long enough.
    fn list_tail(&self, list: Value, n: usize) -> Value {
        let mut current = list;
        for _ in 0..n {
            if let Value::Pair(id) = current {
                current = self.heap.cdr(id);
            }
        }
        current
    }

    fn name_closure(&mut self, val: Value, name: SymbolId) {
        if let Value::Closure(id) = val {
            self.heap.closure_mut(id).set_name_once(name);
        }
    }
}

fn has_duplicates(mut ids: impl Iterator<Item = SymbolId>) -> bool {
    let mut seen = rustc_hash::FxHashSet::default();
    ids.any(|id| !seen.insert(id))
}
