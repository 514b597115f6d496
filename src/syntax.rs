//! Syntax objects: a value paired with a source location.
//!
//! `to_syntax` lifts a datum into a congruent wrapped tree (every pair and
//! every cdr is wrapped), `strip_syntax` undoes it, and `syntax_to_list`
//! views a wrapped list as a list of wrapped elements.

use rustc_hash::FxHashSet;

use crate::error::{EvalError, EvalResult};
use crate::heap::Heap;
use crate::value::{PairId, Value};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SyntaxObject {
    pub payload: Value,
    /// Source location, or `#f` when unknown.
    pub location: Value,
}

/// Wrap a single value. Already wrapped values are returned unchanged.
pub fn wrap(heap: &mut Heap, payload: Value, location: Value) -> EvalResult<Value> {
    if payload.is_syntax() {
        return Ok(payload);
    }
    Ok(Value::Syntax(heap.alloc_syntax(SyntaxObject { payload, location })?))
}

fn check_wrappable(val: Value) -> EvalResult<()> {
    match val {
        Value::Null
        | Value::True
        | Value::False
        | Value::Void
        | Value::Symbol(_)
        | Value::Fixnum(_)
        | Value::Char(_)
        | Value::Str(_)
        | Value::Pair(_)
        | Value::Syntax(_) => Ok(()),
        other => Err(EvalError::Conversion(other.type_name().to_string())),
    }
}

/// Recursively lift `val` into syntax, giving every new wrapper `location`.
/// Cyclic data cannot be lifted.
pub fn to_syntax(heap: &mut Heap, val: Value, location: Value) -> EvalResult<Value> {
    lift(heap, val, location, &mut FxHashSet::default())
}

fn lift(
    heap: &mut Heap,
    val: Value,
    location: Value,
    active: &mut FxHashSet<PairId>,
) -> EvalResult<Value> {
    check_wrappable(val)?;
    let Value::Pair(_) = val else {
        return wrap(heap, val, location);
    };

    // Walk the spine iteratively so long lists do not recurse on the cdr.
    let mut spine = Vec::new();
    let mut cars = Vec::new();
    let mut current = val;
    while let Value::Pair(id) = current {
        if !active.insert(id) {
            release(active, &spine);
            return Err(EvalError::Conversion("cyclic data".to_string()));
        }
        spine.push(id);
        cars.push(heap.car(id));
        current = heap.cdr(id);
        if current.is_syntax() {
            break;
        }
    }
    let lifted = lift_spine(heap, current, &cars, location, active);
    release(active, &spine);
    lifted
}

fn lift_spine(
    heap: &mut Heap,
    tail: Value,
    cars: &[Value],
    location: Value,
    active: &mut FxHashSet<PairId>,
) -> EvalResult<Value> {
    check_wrappable(tail)?;
    let mut acc = wrap(heap, tail, location)?;
    for &car in cars.iter().rev() {
        let car = lift(heap, car, location, active)?;
        let pair = heap.cons(car, acc)?;
        acc = wrap(heap, pair, location)?;
    }
    Ok(acc)
}

/// Recursively unwrap syntax objects. Values without syntax inside are
/// returned as-is; otherwise the pair structure is rebuilt. Cyclic
/// structure is returned as-is.
pub fn strip_syntax(heap: &mut Heap, val: Value) -> EvalResult<Value> {
    strip(heap, val, &mut FxHashSet::default())
}

fn strip(heap: &mut Heap, val: Value, active: &mut FxHashSet<PairId>) -> EvalResult<Value> {
    let val = unwrap_all(heap, val);
    let Value::Pair(_) = val else {
        return Ok(val);
    };

    let mut spine = Vec::new();
    let mut cars = Vec::new();
    let mut changed = false;
    let mut current = val;
    while let Value::Pair(id) = current {
        if !active.insert(id) {
            release(active, &spine);
            return Ok(val);
        }
        spine.push(id);
        let car = heap.car(id);
        let stripped = match strip(heap, car, active) {
            Ok(stripped) => stripped,
            Err(err) => {
                release(active, &spine);
                return Err(err);
            }
        };
        changed |= stripped != car;
        cars.push(stripped);
        let cdr = heap.cdr(id);
        current = unwrap_all(heap, cdr);
        changed |= current != cdr;
    }
    release(active, &spine);
    if !changed {
        return Ok(val);
    }
    heap.list_with_tail(&cars, current)
}

fn release(active: &mut FxHashSet<PairId>, spine: &[PairId]) {
    for id in spine {
        active.remove(id);
    }
}

/// Remove any number of wrappers from the outside of `val`.
pub fn unwrap_all(heap: &Heap, mut val: Value) -> Value {
    while let Value::Syntax(id) = val {
        val = heap.syntax(id).payload;
    }
    val
}

/// `#f` if the stripped payload is not a proper list, else a list whose
/// elements are each lifted with `to_syntax`.
pub fn syntax_to_list(heap: &mut Heap, val: Value) -> EvalResult<Value> {
    let stripped = strip_syntax(heap, val)?;
    if !heap.is_proper_list(stripped) {
        return Ok(Value::False);
    }
    let location = match val {
        Value::Syntax(id) => heap.syntax(id).location,
        _ => Value::False,
    };
    let mut elements = Vec::new();
    let mut current = unwrap_all(heap, val);
    while let Value::Pair(id) = current {
        elements.push(heap.car(id));
        current = unwrap_all(heap, heap.cdr(id));
    }
    let mut wrapped = Vec::with_capacity(elements.len());
    for element in elements {
        wrapped.push(to_syntax(heap, element, location)?);
    }
    heap.list(&wrapped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::equal;

    #[test]
    fn wrapping_is_idempotent() {
        let mut heap = Heap::new(256, 256);
        let once = wrap(&mut heap, Value::Fixnum(1), Value::False).unwrap();
        let twice = wrap(&mut heap, once, Value::Fixnum(9)).unwrap();
        assert_eq!(once, twice);
        assert_eq!(to_syntax(&mut heap, once, Value::False).unwrap(), once);
    }

    #[test]
    fn to_syntax_wraps_every_pair_and_cdr() {
        let mut heap = Heap::new(256, 256);
        let list = heap.list(&[Value::Fixnum(1), Value::Fixnum(2)]).unwrap();
        let stx = to_syntax(&mut heap, list, Value::False).unwrap();
        let outer = unwrap_all(&heap, stx).as_pair().unwrap();
        assert!(heap.car(outer).is_syntax());
        assert!(heap.cdr(outer).is_syntax());
        let stripped = strip_syntax(&mut heap, stx).unwrap();
        assert!(equal(&heap, stripped, list));
    }

    #[test]
    fn strip_leaves_plain_data_alone() {
        let mut heap = Heap::new(256, 256);
        let list = heap.list(&[Value::Fixnum(1), Value::Char('a')]).unwrap();
        assert_eq!(strip_syntax(&mut heap, list).unwrap(), list);
    }

    #[test]
    fn procedures_cannot_be_lifted() {
        let mut heap = Heap::new(256, 256);
        let prim = Value::Primitive(crate::value::PrimitiveId(0));
        assert!(matches!(to_syntax(&mut heap, prim, Value::False), Err(EvalError::Conversion(_))));
        let list = heap.list(&[Value::Fixnum(1), prim]).unwrap();
        assert!(matches!(to_syntax(&mut heap, list, Value::False), Err(EvalError::Conversion(_))));
    }

    #[test]
    fn syntax_to_list_rejects_improper_payloads() {
        let mut heap = Heap::new(256, 256);
        let dotted = heap.cons(Value::Fixnum(1), Value::Fixnum(2)).unwrap();
        let stx = to_syntax(&mut heap, dotted, Value::False).unwrap();
        assert_eq!(syntax_to_list(&mut heap, stx).unwrap(), Value::False);

        let list = heap.list(&[Value::Fixnum(1), Value::Fixnum(2)]).unwrap();
        let stx = to_syntax(&mut heap, list, Value::False).unwrap();
        let elements = syntax_to_list(&mut heap, stx).unwrap();
        let elements = heap.list_to_vec(elements).unwrap();
        assert_eq!(elements.len(), 2);
        assert!(elements.iter().all(|e| e.is_syntax()));
    }

    #[test]
    fn cyclic_data_is_left_alone_or_rejected() {
        let mut heap = Heap::new(256, 256);
        let list = heap.list(&[Value::Fixnum(1), Value::Fixnum(2)]).unwrap();
        let last = heap.cdr(list.as_pair().unwrap()).as_pair().unwrap();
        heap.set_cdr(last, list);
        assert_eq!(strip_syntax(&mut heap, list).unwrap(), list);
        assert_eq!(syntax_to_list(&mut heap, list).unwrap(), Value::False);
        assert!(matches!(to_syntax(&mut heap, list, Value::False), Err(EvalError::Conversion(_))));

        let cell = heap.cons(Value::Fixnum(1), Value::Null).unwrap();
        let id = cell.as_pair().unwrap();
        heap.set_car(id, cell);
        assert_eq!(strip_syntax(&mut heap, cell).unwrap(), cell);
        assert!(matches!(to_syntax(&mut heap, cell, Value::False), Err(EvalError::Conversion(_))));
    }

    #[test]
    fn shared_structure_is_not_mistaken_for_a_cycle() {
        let mut heap = Heap::new(256, 256);
        let shared = heap.list(&[Value::Fixnum(1)]).unwrap();
        let outer = heap.list(&[shared, shared]).unwrap();
        let stx = to_syntax(&mut heap, outer, Value::False).unwrap();
        let stripped = strip_syntax(&mut heap, stx).unwrap();
        assert!(equal(&heap, stripped, outer));
    }
}
