use crate::error::{EvalError, EvalResult};
use crate::eval::Interpreter;
use crate::procedure::{Arity, Primitive, PrimitiveFn, PrimitiveKind};
use crate::syntax;
use crate::value::{equal, PairId, StringId, SymbolId, Value};

use Arity::{AtLeast, Fixed, Range};

fn native(name: &'static str, arity: Arity, func: PrimitiveFn) -> Primitive {
    Primitive {
        name,
        arity,
        kind: PrimitiveKind::Native(func),
    }
}

/// Primitives the application protocol handles at the call site.
fn control(name: &'static str, arity: Arity, kind: PrimitiveKind) -> Primitive {
    Primitive { name, arity, kind }
}

/// Every built-in procedure, in the order they are bound in the global frame.
pub fn table() -> Vec<Primitive> {
    vec![
        // equality
        native("eq?", Fixed(2), prim_eq),
        native("eqv?", Fixed(2), prim_eq),
        native("equal?", Fixed(2), prim_equal),
        native("not", Fixed(1), prim_not),
        // type predicates
        native("null?", Fixed(1), prim_null_p),
        native("pair?", Fixed(1), prim_pair_p),
        native("list?", Fixed(1), prim_list_p),
        native("symbol?", Fixed(1), prim_symbol_p),
        native("string?", Fixed(1), prim_string_p),
        native("char?", Fixed(1), prim_char_p),
        native("boolean?", Fixed(1), prim_boolean_p),
        native("number?", Fixed(1), prim_fixnum_p),
        native("integer?", Fixed(1), prim_fixnum_p),
        native("procedure?", Fixed(1), prim_procedure_p),
        native("void?", Fixed(1), prim_void_p),
        native("eof-object?", Fixed(1), prim_eof_p),
        // pairs and lists
        native("cons", Fixed(2), prim_cons),
        native("car", Fixed(1), prim_car),
        native("cdr", Fixed(1), prim_cdr),
        native("set-car!", Fixed(2), prim_set_car),
        native("set-cdr!", Fixed(2), prim_set_cdr),
        native("list", AtLeast(0), prim_list),
        native("length", Fixed(1), prim_length),
        native("reverse", Fixed(1), prim_reverse),
        native("append", AtLeast(0), prim_append),
        native("list-tail", Fixed(2), prim_list_tail),
        native("list-ref", Fixed(2), prim_list_ref),
        native("memq", Fixed(2), prim_memq),
        native("assq", Fixed(2), prim_assq),
        // fixnums
        native("+", AtLeast(0), prim_add),
        native("-", AtLeast(1), prim_sub),
        native("*", AtLeast(0), prim_mul),
        native("quotient", Fixed(2), prim_quotient),
        native("remainder", Fixed(2), prim_remainder),
        native("modulo", Fixed(2), prim_modulo),
        native("=", AtLeast(1), prim_num_eq),
        native("<", AtLeast(1), prim_lt),
        native(">", AtLeast(1), prim_gt),
        native("<=", AtLeast(1), prim_le),
        native(">=", AtLeast(1), prim_ge),
        native("zero?", Fixed(1), prim_zero_p),
        // characters and strings
        native("char->integer", Fixed(1), prim_char_to_integer),
        native("integer->char", Fixed(1), prim_integer_to_char),
        native("string-length", Fixed(1), prim_string_length),
        native("string-ref", Fixed(2), prim_string_ref),
        native("string-set!", Fixed(3), prim_string_set),
        native("string-append", AtLeast(0), prim_string_append),
        native("string=?", AtLeast(1), prim_string_eq),
        native("make-string", Range(1, 2), prim_make_string),
        native("string->symbol", Fixed(1), prim_string_to_symbol),
        native("symbol->string", Fixed(1), prim_symbol_to_string),
        native("number->string", Fixed(1), prim_number_to_string),
        // control
        native("procedure-arity-includes?", Fixed(2), prim_arity_includes),
        native("void", AtLeast(0), prim_void),
        native("eof-object", Fixed(0), prim_eof_object),
        native("values", AtLeast(0), prim_values),
        control("call-with-values", Fixed(2), PrimitiveKind::CallWithValues),
        control("apply", AtLeast(2), PrimitiveKind::Apply),
        control("eval", Range(1, 2), PrimitiveKind::Eval),
        control("current-environment", Fixed(0), PrimitiveKind::CurrentEnvironment),
        control("andmap", AtLeast(2), PrimitiveKind::AndMap),
        control("ormap", AtLeast(2), PrimitiveKind::OrMap),
        control("map", AtLeast(2), PrimitiveKind::Map),
        control("for-each", AtLeast(2), PrimitiveKind::ForEach),
        // syntax
        native("syntax?", Fixed(1), prim_syntax_p),
        native("syntax-e", Fixed(1), prim_syntax_e),
        native("syntax->datum", Fixed(1), prim_syntax_to_datum),
        native("datum->syntax", Range(1, 2), prim_datum_to_syntax),
        native("syntax->list", Fixed(1), prim_syntax_to_list),
        native("syntax-source", Fixed(1), prim_syntax_source),
        // output
        native("display", Fixed(1), prim_display),
        native("write", Fixed(1), prim_write),
        native("newline", Fixed(0), prim_newline),
        native("error", AtLeast(1), prim_error),
    ]
}

// ============================================================================
// Argument checks
// ============================================================================

fn fixnum(interp: &Interpreter, name: &str, val: Value) -> EvalResult<i64> {
    match val {
        Value::Fixnum(n) => Ok(n),
        other => Err(interp.bad_type(name, "fixnum", other)),
    }
}

fn index(interp: &Interpreter, name: &str, val: Value) -> EvalResult<usize> {
    match val {
        Value::Fixnum(n) if n >= 0 => Ok(n as usize),
        other => Err(interp.bad_type(name, "exact-nonnegative-integer", other)),
    }
}

fn pair(interp: &Interpreter, name: &str, val: Value) -> EvalResult<PairId> {
    match val {
        Value::Pair(id) => Ok(id),
        other => Err(interp.bad_type(name, "pair", other)),
    }
}

fn list(interp: &Interpreter, name: &str, val: Value) -> EvalResult<Vec<Value>> {
    interp
        .heap
        .list_to_vec(val)
        .ok_or_else(|| interp.bad_type(name, "list", val))
}

fn string(interp: &Interpreter, name: &str, val: Value) -> EvalResult<StringId> {
    match val {
        Value::Str(id) => Ok(id),
        other => Err(interp.bad_type(name, "string", other)),
    }
}

fn character(interp: &Interpreter, name: &str, val: Value) -> EvalResult<char> {
    match val {
        Value::Char(c) => Ok(c),
        other => Err(interp.bad_type(name, "char", other)),
    }
}

fn symbol(interp: &Interpreter, name: &str, val: Value) -> EvalResult<SymbolId> {
    match val {
        Value::Symbol(id) => Ok(id),
        other => Err(interp.bad_type(name, "symbol", other)),
    }
}

fn syntax_object(interp: &Interpreter, name: &str, val: Value) -> EvalResult<syntax::SyntaxObject> {
    match val {
        Value::Syntax(id) => Ok(*interp.heap.syntax(id)),
        other => Err(interp.bad_type(name, "syntax", other)),
    }
}

// ============================================================================
// Equality and predicates
// ============================================================================

fn prim_eq(_: &mut Interpreter, args: &[Value]) -> EvalResult<Value> {
    Ok(Value::from_bool(args[0] == args[1]))
}

fn prim_equal(interp: &mut Interpreter, args: &[Value]) -> EvalResult<Value> {
    Ok(Value::from_bool(equal(&interp.heap, args[0], args[1])))
}

fn prim_not(_: &mut Interpreter, args: &[Value]) -> EvalResult<Value> {
    Ok(Value::from_bool(args[0] == Value::False))
}

fn prim_null_p(_: &mut Interpreter, args: &[Value]) -> EvalResult<Value> {
    Ok(Value::from_bool(args[0].is_null()))
}

fn prim_pair_p(_: &mut Interpreter, args: &[Value]) -> EvalResult<Value> {
    Ok(Value::from_bool(args[0].is_pair()))
}

fn prim_list_p(interp: &mut Interpreter, args: &[Value]) -> EvalResult<Value> {
    Ok(Value::from_bool(interp.heap.is_proper_list(args[0])))
}

fn prim_symbol_p(_: &mut Interpreter, args: &[Value]) -> EvalResult<Value> {
    Ok(Value::from_bool(args[0].is_symbol()))
}

fn prim_string_p(_: &mut Interpreter, args: &[Value]) -> EvalResult<Value> {
    Ok(Value::from_bool(matches!(args[0], Value::Str(_))))
}

fn prim_char_p(_: &mut Interpreter, args: &[Value]) -> EvalResult<Value> {
    Ok(Value::from_bool(matches!(args[0], Value::Char(_))))
}

fn prim_boolean_p(_: &mut Interpreter, args: &[Value]) -> EvalResult<Value> {
    Ok(Value::from_bool(matches!(args[0], Value::True | Value::False)))
}

fn prim_fixnum_p(_: &mut Interpreter, args: &[Value]) -> EvalResult<Value> {
    Ok(Value::from_bool(matches!(args[0], Value::Fixnum(_))))
}

fn prim_procedure_p(_: &mut Interpreter, args: &[Value]) -> EvalResult<Value> {
    Ok(Value::from_bool(args[0].is_procedure()))
}

fn prim_void_p(_: &mut Interpreter, args: &[Value]) -> EvalResult<Value> {
    Ok(Value::from_bool(args[0] == Value::Void))
}

fn prim_eof_p(_: &mut Interpreter, args: &[Value]) -> EvalResult<Value> {
    Ok(Value::from_bool(args[0] == Value::Eof))
}

// ============================================================================
// Pairs and lists
// ============================================================================

fn prim_cons(interp: &mut Interpreter, args: &[Value]) -> EvalResult<Value> {
    interp.heap.cons(args[0], args[1])
}

fn prim_car(interp: &mut Interpreter, args: &[Value]) -> EvalResult<Value> {
    let id = pair(interp, "car", args[0])?;
    Ok(interp.heap.car(id))
}

fn prim_cdr(interp: &mut Interpreter, args: &[Value]) -> EvalResult<Value> {
    let id = pair(interp, "cdr", args[0])?;
    Ok(interp.heap.cdr(id))
}

fn prim_set_car(interp: &mut Interpreter, args: &[Value]) -> EvalResult<Value> {
    let id = pair(interp, "set-car!", args[0])?;
    interp.heap.set_car(id, args[1]);
    Ok(Value::Void)
}

fn prim_set_cdr(interp: &mut Interpreter, args: &[Value]) -> EvalResult<Value> {
    let id = pair(interp, "set-cdr!", args[0])?;
    interp.heap.set_cdr(id, args[1]);
    Ok(Value::Void)
}

fn prim_list(interp: &mut Interpreter, args: &[Value]) -> EvalResult<Value> {
    interp.heap.list(args)
}

fn prim_length(interp: &mut Interpreter, args: &[Value]) -> EvalResult<Value> {
    let items = list(interp, "length", args[0])?;
    Ok(Value::Fixnum(items.len() as i64))
}

fn prim_reverse(interp: &mut Interpreter, args: &[Value]) -> EvalResult<Value> {
    let items = list(interp, "reverse", args[0])?;
    let mut acc = Value::Null;
    for item in items {
        acc = interp.heap.cons(item, acc)?;
    }
    Ok(acc)
}

/// Every argument but the last is copied; the last becomes the shared tail.
fn prim_append(interp: &mut Interpreter, args: &[Value]) -> EvalResult<Value> {
    let Some((&tail, lists)) = args.split_last() else {
        return Ok(Value::Null);
    };
    let mut items = Vec::new();
    for &l in lists {
        items.extend(list(interp, "append", l)?);
    }
    interp.heap.list_with_tail(&items, tail)
}

fn prim_list_tail(interp: &mut Interpreter, args: &[Value]) -> EvalResult<Value> {
    let k = index(interp, "list-tail", args[1])?;
    let mut current = args[0];
    for _ in 0..k {
        match current {
            Value::Pair(id) => current = interp.heap.cdr(id),
            _ => return Err(interp.bad_type("list-tail", "list with enough elements", args[0])),
        }
    }
    Ok(current)
}

fn prim_list_ref(interp: &mut Interpreter, args: &[Value]) -> EvalResult<Value> {
    let k = index(interp, "list-ref", args[1])?;
    let mut current = args[0];
    for _ in 0..k {
        match current {
            Value::Pair(id) => current = interp.heap.cdr(id),
            _ => break,
        }
    }
    match current {
        Value::Pair(id) => Ok(interp.heap.car(id)),
        _ => Err(interp.bad_type("list-ref", "list with enough elements", args[0])),
    }
}

fn prim_memq(interp: &mut Interpreter, args: &[Value]) -> EvalResult<Value> {
    let mut current = args[1];
    while let Value::Pair(id) = current {
        if interp.heap.car(id) == args[0] {
            return Ok(current);
        }
        current = interp.heap.cdr(id);
    }
    match current {
        Value::Null => Ok(Value::False),
        _ => Err(interp.bad_type("memq", "list", args[1])),
    }
}

fn prim_assq(interp: &mut Interpreter, args: &[Value]) -> EvalResult<Value> {
    let mut current = args[1];
    while let Value::Pair(id) = current {
        let entry = interp.heap.car(id);
        let Value::Pair(entry_id) = entry else {
            return Err(interp.bad_type("assq", "association list", args[1]));
        };
        if interp.heap.car(entry_id) == args[0] {
            return Ok(entry);
        }
        current = interp.heap.cdr(id);
    }
    match current {
        Value::Null => Ok(Value::False),
        _ => Err(interp.bad_type("assq", "list", args[1])),
    }
}

// ============================================================================
// Fixnum arithmetic
// ============================================================================

fn overflow(interp: &Interpreter, name: &str, val: Value) -> EvalError {
    interp.bad_type(name, "result within fixnum range", val)
}

fn prim_add(interp: &mut Interpreter, args: &[Value]) -> EvalResult<Value> {
    let mut total: i64 = 0;
    for &arg in args {
        let n = fixnum(interp, "+", arg)?;
        total = total.checked_add(n).ok_or_else(|| overflow(interp, "+", arg))?;
    }
    Ok(Value::Fixnum(total))
}

fn prim_sub(interp: &mut Interpreter, args: &[Value]) -> EvalResult<Value> {
    let first = fixnum(interp, "-", args[0])?;
    if args.len() == 1 {
        return first
            .checked_neg()
            .map(Value::Fixnum)
            .ok_or_else(|| overflow(interp, "-", args[0]));
    }
    let mut total = first;
    for &arg in &args[1..] {
        let n = fixnum(interp, "-", arg)?;
        total = total.checked_sub(n).ok_or_else(|| overflow(interp, "-", arg))?;
    }
    Ok(Value::Fixnum(total))
}

fn prim_mul(interp: &mut Interpreter, args: &[Value]) -> EvalResult<Value> {
    let mut total: i64 = 1;
    for &arg in args {
        let n = fixnum(interp, "*", arg)?;
        total = total.checked_mul(n).ok_or_else(|| overflow(interp, "*", arg))?;
    }
    Ok(Value::Fixnum(total))
}

fn divide(
    interp: &Interpreter,
    name: &str,
    args: &[Value],
    op: fn(i64, i64) -> Option<i64>,
) -> EvalResult<Value> {
    let a = fixnum(interp, name, args[0])?;
    let b = fixnum(interp, name, args[1])?;
    if b == 0 {
        return Err(interp.bad_type(name, "non-zero divisor", args[1]));
    }
    op(a, b)
        .map(Value::Fixnum)
        .ok_or_else(|| overflow(interp, name, args[0]))
}

fn prim_quotient(interp: &mut Interpreter, args: &[Value]) -> EvalResult<Value> {
    divide(interp, "quotient", args, i64::checked_div)
}

fn prim_remainder(interp: &mut Interpreter, args: &[Value]) -> EvalResult<Value> {
    divide(interp, "remainder", args, i64::checked_rem)
}

/// The result takes the sign of the divisor.
fn prim_modulo(interp: &mut Interpreter, args: &[Value]) -> EvalResult<Value> {
    divide(interp, "modulo", args, |a, b| {
        let r = a.checked_rem(b)?;
        if r != 0 && (r < 0) != (b < 0) {
            Some(r + b)
        } else {
            Some(r)
        }
    })
}

fn compare(interp: &Interpreter, name: &str, args: &[Value], holds: fn(i64, i64) -> bool) -> EvalResult<Value> {
    let mut nums = Vec::with_capacity(args.len());
    for &arg in args {
        nums.push(fixnum(interp, name, arg)?);
    }
    Ok(Value::from_bool(nums.windows(2).all(|w| holds(w[0], w[1]))))
}

fn prim_num_eq(interp: &mut Interpreter, args: &[Value]) -> EvalResult<Value> {
    compare(interp, "=", args, |a, b| a == b)
}

fn prim_lt(interp: &mut Interpreter, args: &[Value]) -> EvalResult<Value> {
    compare(interp, "<", args, |a, b| a < b)
}

fn prim_gt(interp: &mut Interpreter, args: &[Value]) -> EvalResult<Value> {
    compare(interp, ">", args, |a, b| a > b)
}

fn prim_le(interp: &mut Interpreter, args: &[Value]) -> EvalResult<Value> {
    compare(interp, "<=", args, |a, b| a <= b)
}

fn prim_ge(interp: &mut Interpreter, args: &[Value]) -> EvalResult<Value> {
    compare(interp, ">=", args, |a, b| a >= b)
}

fn prim_zero_p(interp: &mut Interpreter, args: &[Value]) -> EvalResult<Value> {
    Ok(Value::from_bool(fixnum(interp, "zero?", args[0])? == 0))
}

// ============================================================================
// Characters and strings
// ============================================================================

fn prim_char_to_integer(interp: &mut Interpreter, args: &[Value]) -> EvalResult<Value> {
    let c = character(interp, "char->integer", args[0])?;
    Ok(Value::Fixnum(c as i64))
}

fn prim_integer_to_char(interp: &mut Interpreter, args: &[Value]) -> EvalResult<Value> {
    let n = fixnum(interp, "integer->char", args[0])?;
    u32::try_from(n)
        .ok()
        .and_then(char::from_u32)
        .map(Value::Char)
        .ok_or_else(|| interp.bad_type("integer->char", "valid Unicode scalar value", args[0]))
}

fn prim_string_length(interp: &mut Interpreter, args: &[Value]) -> EvalResult<Value> {
    let id = string(interp, "string-length", args[0])?;
    Ok(Value::Fixnum(interp.heap.string(id).chars().count() as i64))
}

fn prim_string_ref(interp: &mut Interpreter, args: &[Value]) -> EvalResult<Value> {
    let id = string(interp, "string-ref", args[0])?;
    let k = index(interp, "string-ref", args[1])?;
    interp
        .heap
        .string(id)
        .chars()
        .nth(k)
        .map(Value::Char)
        .ok_or_else(|| interp.bad_type("string-ref", "index in range", args[1]))
}

fn prim_string_set(interp: &mut Interpreter, args: &[Value]) -> EvalResult<Value> {
    let id = string(interp, "string-set!", args[0])?;
    let k = index(interp, "string-set!", args[1])?;
    let c = character(interp, "string-set!", args[2])?;
    let mut chars: Vec<char> = interp.heap.string(id).chars().collect();
    match chars.get_mut(k) {
        Some(slot) => *slot = c,
        None => return Err(interp.bad_type("string-set!", "index in range", args[1])),
    }
    *interp.heap.string_mut(id) = chars.into_iter().collect();
    Ok(Value::Void)
}

fn prim_string_append(interp: &mut Interpreter, args: &[Value]) -> EvalResult<Value> {
    let mut text = String::new();
    for &arg in args {
        let id = string(interp, "string-append", arg)?;
        text.push_str(interp.heap.string(id));
    }
    Ok(Value::Str(interp.heap.alloc_string(text)?))
}

fn prim_string_eq(interp: &mut Interpreter, args: &[Value]) -> EvalResult<Value> {
    let mut ids = Vec::with_capacity(args.len());
    for &arg in args {
        ids.push(string(interp, "string=?", arg)?);
    }
    let heap = &interp.heap;
    Ok(Value::from_bool(ids.windows(2).all(|w| heap.string(w[0]) == heap.string(w[1]))))
}

fn prim_make_string(interp: &mut Interpreter, args: &[Value]) -> EvalResult<Value> {
    let k = index(interp, "make-string", args[0])?;
    let fill = match args.get(1) {
        Some(&c) => character(interp, "make-string", c)?,
        None => '\0',
    };
    let mut text = String::new();
    k.checked_mul(fill.len_utf8())
        .and_then(|bytes| text.try_reserve_exact(bytes).ok())
        .ok_or(EvalError::HeapOverflow)?;
    text.extend(std::iter::repeat(fill).take(k));
    Ok(Value::Str(interp.heap.alloc_string(text)?))
}

fn prim_string_to_symbol(interp: &mut Interpreter, args: &[Value]) -> EvalResult<Value> {
    let id = string(interp, "string->symbol", args[0])?;
    let name = interp.heap.string(id).to_string();
    Ok(interp.intern(&name))
}

fn prim_symbol_to_string(interp: &mut Interpreter, args: &[Value]) -> EvalResult<Value> {
    let id = symbol(interp, "symbol->string", args[0])?;
    let name = interp.symbols.name(id).to_string();
    Ok(Value::Str(interp.heap.alloc_string(name)?))
}

fn prim_number_to_string(interp: &mut Interpreter, args: &[Value]) -> EvalResult<Value> {
    let n = fixnum(interp, "number->string", args[0])?;
    Ok(Value::Str(interp.heap.alloc_string(n.to_string())?))
}

// ============================================================================
// Control
// ============================================================================

fn prim_arity_includes(interp: &mut Interpreter, args: &[Value]) -> EvalResult<Value> {
    let arity = match args[0] {
        Value::Closure(id) => interp.heap.closure(id).arity,
        Value::Primitive(id) => interp.primitive(id).arity,
        other => return Err(interp.bad_type("procedure-arity-includes?", "procedure", other)),
    };
    let k = index(interp, "procedure-arity-includes?", args[1])?;
    Ok(Value::from_bool(arity.accepts(k)))
}

fn prim_void(_: &mut Interpreter, _: &[Value]) -> EvalResult<Value> {
    Ok(Value::Void)
}

fn prim_eof_object(_: &mut Interpreter, _: &[Value]) -> EvalResult<Value> {
    Ok(Value::Eof)
}

fn prim_values(interp: &mut Interpreter, args: &[Value]) -> EvalResult<Value> {
    Ok(interp.return_values(args))
}

// ============================================================================
// Syntax objects
// ============================================================================

fn prim_syntax_p(_: &mut Interpreter, args: &[Value]) -> EvalResult<Value> {
    Ok(Value::from_bool(args[0].is_syntax()))
}

fn prim_syntax_e(interp: &mut Interpreter, args: &[Value]) -> EvalResult<Value> {
    Ok(syntax_object(interp, "syntax-e", args[0])?.payload)
}

fn prim_syntax_to_datum(interp: &mut Interpreter, args: &[Value]) -> EvalResult<Value> {
    syntax::strip_syntax(&mut interp.heap, args[0])
}

fn prim_datum_to_syntax(interp: &mut Interpreter, args: &[Value]) -> EvalResult<Value> {
    let location = match args.get(1) {
        None => Value::False,
        Some(&Value::Syntax(id)) => interp.heap.syntax(id).location,
        Some(&other) => other,
    };
    syntax::to_syntax(&mut interp.heap, args[0], location)
}

fn prim_syntax_to_list(interp: &mut Interpreter, args: &[Value]) -> EvalResult<Value> {
    syntax::syntax_to_list(&mut interp.heap, args[0])
}

fn prim_syntax_source(interp: &mut Interpreter, args: &[Value]) -> EvalResult<Value> {
    Ok(syntax_object(interp, "syntax-source", args[0])?.location)
}

// ============================================================================
// Output and errors
// ============================================================================

fn prim_display(interp: &mut Interpreter, args: &[Value]) -> EvalResult<Value> {
    let text = interp.display_string(args[0]);
    interp.output().write_all(text.as_bytes())?;
    Ok(Value::Void)
}

fn prim_write(interp: &mut Interpreter, args: &[Value]) -> EvalResult<Value> {
    let text = interp.write_string(args[0]);
    interp.output().write_all(text.as_bytes())?;
    Ok(Value::Void)
}

fn prim_newline(interp: &mut Interpreter, _: &[Value]) -> EvalResult<Value> {
    interp.output().write_all(b"\n")?;
    Ok(Value::Void)
}

/// `(error 'who "message" irritant ...)` or `(error "message" irritant ...)`.
/// Irritants are rendered with `write`.
fn prim_error(interp: &mut Interpreter, args: &[Value]) -> EvalResult<Value> {
    let mut message = String::new();
    let mut rest = args;
    if let [Value::Symbol(who), tail @ ..] = args {
        message.push_str(interp.symbols.name(*who));
        message.push(':');
        rest = tail;
    }
    if let [Value::Str(text), tail @ ..] = rest {
        if !message.is_empty() {
            message.push(' ');
        }
        message.push_str(interp.heap.string(*text));
        rest = tail;
    }
    for &irritant in rest {
        if !message.is_empty() {
            message.push(' ');
        }
        message.push_str(&interp.write_string(irritant));
    }
    Err(EvalError::User(message))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn interp() -> Interpreter {
        Interpreter::with_output(Config::default(), Box::new(std::io::sink())).unwrap()
    }

    #[test]
    fn primitive_names_are_unique() {
        let mut names: Vec<_> = table().iter().map(|p| p.name).collect();
        names.sort_unstable();
        let before = names.len();
        names.dedup();
        assert_eq!(before, names.len());
    }

    #[test]
    fn arithmetic_overflow_is_a_type_error() {
        let mut interp = interp();
        let result = prim_add(&mut interp, &[Value::Fixnum(i64::MAX), Value::Fixnum(1)]);
        assert!(matches!(result, Err(EvalError::BadType { .. })));
        let result = prim_quotient(&mut interp, &[Value::Fixnum(i64::MIN), Value::Fixnum(-1)]);
        assert!(matches!(result, Err(EvalError::BadType { .. })));
    }

    #[test]
    fn modulo_follows_divisor_sign() {
        let mut interp = interp();
        let m = prim_modulo(&mut interp, &[Value::Fixnum(-7), Value::Fixnum(2)]).unwrap();
        assert_eq!(m, Value::Fixnum(1));
        let r = prim_remainder(&mut interp, &[Value::Fixnum(-7), Value::Fixnum(2)]).unwrap();
        assert_eq!(r, Value::Fixnum(-1));
        let m = prim_modulo(&mut interp, &[Value::Fixnum(7), Value::Fixnum(-2)]).unwrap();
        assert_eq!(m, Value::Fixnum(-1));
    }

    #[test]
    fn division_by_zero_is_rejected() {
        let mut interp = interp();
        let result = prim_quotient(&mut interp, &[Value::Fixnum(1), Value::Fixnum(0)]);
        assert!(matches!(result, Err(EvalError::BadType { .. })));
    }

    #[test]
    fn error_message_includes_who_and_irritants() {
        let mut interp = interp();
        let who = interp.intern("check");
        let msg = Value::Str(interp.heap.alloc_string("bad value".into()).unwrap());
        let err = prim_error(&mut interp, &[who, msg, Value::Fixnum(3)]).unwrap_err();
        assert_eq!(err, EvalError::User("check: bad value 3".into()));
    }

    #[test]
    fn oversized_strings_are_refused() {
        let mut interp = interp();
        let huge = Value::Fixnum(4_611_686_018_427_387_903);
        let result = prim_make_string(&mut interp, &[huge]);
        assert_eq!(result, Err(EvalError::HeapOverflow));
        let result = prim_make_string(&mut interp, &[huge, Value::Char('λ')]);
        assert_eq!(result, Err(EvalError::HeapOverflow));
        let small = prim_make_string(&mut interp, &[Value::Fixnum(2), Value::Char('λ')]).unwrap();
        let Value::Str(id) = small else { panic!("expected a string") };
        assert_eq!(interp.heap.string(id), "λλ");
    }
}
