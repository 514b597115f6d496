use tracing::debug;

use crate::env::Frame;
use crate::error::{EvalError, EvalResult};
use crate::procedure::Closure;
use crate::syntax::SyntaxObject;
use crate::value::{ClosureId, EnvId, PairId, StringId, SyntaxId, Value};

/// A single cons cell on the heap.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Pair {
    pub car: Value,
    pub cdr: Value,
}

struct Slot<T> {
    value: Option<T>,
    mark: bool,
}

/// A growable pool of cells of one kind. Handles are indices into `slots`;
/// swept slots go on the free list and are reused by later allocations.
pub struct Arena<T> {
    slots: Vec<Slot<T>>,
    free_list: Vec<u32>,
}

impl<T> Arena<T> {
    pub fn new() -> Self {
        Arena {
            slots: Vec::new(),
            free_list: Vec::new(),
        }
    }

    pub fn alloc(&mut self, value: T) -> u32 {
        if let Some(index) = self.free_list.pop() {
            let slot = &mut self.slots[index as usize];
            slot.value = Some(value);
            slot.mark = false;
            return index;
        }
        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            value: Some(value),
            mark: false,
        });
        index
    }

    #[inline]
    pub fn get(&self, index: u32) -> &T {
        match &self.slots[index as usize].value {
            Some(value) => value,
            None => dangling(index),
        }
    }

    #[inline]
    pub fn get_mut(&mut self, index: u32) -> &mut T {
        match &mut self.slots[index as usize].value {
            Some(value) => value,
            None => dangling(index),
        }
    }

    /// Total slots, including free-listed ones.
    pub fn capacity_used(&self) -> usize {
        self.slots.len()
    }

    pub fn live_count(&self) -> usize {
        self.slots.len() - self.free_list.len()
    }

    /// Set the mark bit. Returns true if the slot was not marked before.
    pub fn mark(&mut self, index: u32) -> bool {
        let slot = &mut self.slots[index as usize];
        if slot.mark {
            return false;
        }
        slot.mark = true;
        true
    }

    pub fn is_marked(&self, index: u32) -> bool {
        self.slots[index as usize].mark
    }

    pub fn clear_marks(&mut self) {
        for slot in &mut self.slots {
            slot.mark = false;
        }
    }

    /// Free every live unmarked slot. Returns how many were freed.
    pub fn sweep(&mut self) -> usize {
        let mut freed = 0;
        for (i, slot) in self.slots.iter_mut().enumerate() {
            if !slot.mark && slot.value.is_some() {
                slot.value = None;
                self.free_list.push(i as u32);
                freed += 1;
            }
        }
        freed
    }
}

impl<T> Default for Arena<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cold]
fn dangling(index: u32) -> ! {
    panic!("heap handle {index} refers to a collected cell")
}

/// Result of one collection cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GcStats {
    pub live: usize,
    pub freed: usize,
}

/// All heap-allocated objects. Each kind lives in its own arena and is
/// addressed by a typed handle.
pub struct Heap {
    pairs: Arena<Pair>,
    strings: Arena<String>,
    closures: Arena<Closure>,
    syntax: Arena<SyntaxObject>,
    frames: Arena<Frame>,
    capacity: usize,
    /// Number of allocations since last GC (for triggering).
    allocs_since_gc: usize,
    /// GC threshold: trigger GC when allocs_since_gc reaches this.
    gc_threshold: usize,
}

impl Heap {
    pub fn new(capacity: usize, gc_threshold: usize) -> Self {
        Heap {
            pairs: Arena::new(),
            strings: Arena::new(),
            closures: Arena::new(),
            syntax: Arena::new(),
            frames: Arena::new(),
            capacity,
            allocs_since_gc: 0,
            gc_threshold: gc_threshold.max(1),
        }
    }

    fn reserve(&mut self) -> EvalResult<()> {
        if self.live_count() >= self.capacity {
            return Err(EvalError::HeapOverflow);
        }
        self.allocs_since_gc += 1;
        Ok(())
    }

    pub fn alloc_pair(&mut self, car: Value, cdr: Value) -> EvalResult<PairId> {
        self.reserve()?;
        Ok(PairId(self.pairs.alloc(Pair { car, cdr })))
    }

    pub fn alloc_string(&mut self, text: String) -> EvalResult<StringId> {
        self.reserve()?;
        Ok(StringId(self.strings.alloc(text)))
    }

    pub fn alloc_closure(&mut self, closure: Closure) -> EvalResult<ClosureId> {
        self.reserve()?;
        Ok(ClosureId(self.closures.alloc(closure)))
    }

    pub fn alloc_syntax(&mut self, object: SyntaxObject) -> EvalResult<SyntaxId> {
        self.reserve()?;
        Ok(SyntaxId(self.syntax.alloc(object)))
    }

    pub fn alloc_frame(&mut self, frame: Frame) -> EvalResult<EnvId> {
        self.reserve()?;
        Ok(EnvId(self.frames.alloc(frame)))
    }

    /// Allocate a pair and return it as a value.
    pub fn cons(&mut self, car: Value, cdr: Value) -> EvalResult<Value> {
        Ok(Value::Pair(self.alloc_pair(car, cdr)?))
    }

    #[inline]
    pub fn car(&self, id: PairId) -> Value {
        self.pairs.get(id.0).car
    }

    #[inline]
    pub fn cdr(&self, id: PairId) -> Value {
        self.pairs.get(id.0).cdr
    }

    #[inline]
    pub fn set_car(&mut self, id: PairId, val: Value) {
        self.pairs.get_mut(id.0).car = val;
    }

    #[inline]
    pub fn set_cdr(&mut self, id: PairId, val: Value) {
        self.pairs.get_mut(id.0).cdr = val;
    }

    pub fn string(&self, id: StringId) -> &str {
        self.strings.get(id.0)
    }

    pub fn string_mut(&mut self, id: StringId) -> &mut String {
        self.strings.get_mut(id.0)
    }

    pub fn closure(&self, id: ClosureId) -> &Closure {
        self.closures.get(id.0)
    }

    pub fn closure_mut(&mut self, id: ClosureId) -> &mut Closure {
        self.closures.get_mut(id.0)
    }

    pub fn syntax(&self, id: SyntaxId) -> &SyntaxObject {
        self.syntax.get(id.0)
    }

    pub fn frame(&self, id: EnvId) -> &Frame {
        self.frames.get(id.0)
    }

    pub fn frame_mut(&mut self, id: EnvId) -> &mut Frame {
        self.frames.get_mut(id.0)
    }

    /// Build a proper list from a slice of values.
    pub fn list(&mut self, values: &[Value]) -> EvalResult<Value> {
        self.list_with_tail(values, Value::Null)
    }

    /// Build `(v0 v1 ... . tail)`.
    pub fn list_with_tail(&mut self, values: &[Value], tail: Value) -> EvalResult<Value> {
        let mut result = tail;
        for &val in values.iter().rev() {
            result = self.cons(val, result)?;
        }
        Ok(result)
    }

    /// Returns true if this value is a finite, null-terminated list.
    pub fn is_proper_list(&self, val: Value) -> bool {
        let mut slow = val;
        let mut fast = val;
        loop {
            match fast {
                Value::Null => return true,
                Value::Pair(id) => fast = self.cdr(id),
                _ => return false,
            }
            match fast {
                Value::Null => return true,
                Value::Pair(id) => fast = self.cdr(id),
                _ => return false,
            }
            if let Value::Pair(id) = slow {
                slow = self.cdr(id);
            }
            if slow == fast {
                return false;
            }
        }
    }

    /// Collect a proper list into a Vec. Returns None if not a proper list.
    pub fn list_to_vec(&self, val: Value) -> Option<Vec<Value>> {
        if !self.is_proper_list(val) {
            return None;
        }
        let mut result = Vec::new();
        let mut current = val;
        while let Value::Pair(id) = current {
            result.push(self.car(id));
            current = self.cdr(id);
        }
        Some(result)
    }

    /// Returns the number of live objects across all arenas.
    pub fn live_count(&self) -> usize {
        self.pairs.live_count()
            + self.strings.live_count()
            + self.closures.live_count()
            + self.syntax.live_count()
            + self.frames.live_count()
    }

    /// Returns the number of allocated slots (including free-listed ones).
    pub fn total_cells(&self) -> usize {
        self.pairs.capacity_used()
            + self.strings.capacity_used()
            + self.closures.capacity_used()
            + self.syntax.capacity_used()
            + self.frames.capacity_used()
    }

    /// Returns true if we should trigger a GC cycle.
    pub fn should_gc(&self) -> bool {
        self.allocs_since_gc >= self.gc_threshold
    }

    /// Whether a pair survived the last mark phase.
    pub fn is_pair_marked(&self, id: PairId) -> bool {
        self.pairs.is_marked(id.0)
    }

    // === GC methods ===

    /// Mark-sweep collection. Everything not reachable from `roots` is freed.
    pub fn collect(&mut self, roots: impl IntoIterator<Item = Value>) -> GcStats {
        self.clear_marks();
        let mut worklist = Vec::new();
        for root in roots {
            self.mark_value(root, &mut worklist);
        }
        self.process_worklist(&mut worklist);

        let freed = self.pairs.sweep()
            + self.strings.sweep()
            + self.closures.sweep()
            + self.syntax.sweep()
            + self.frames.sweep();
        self.allocs_since_gc = 0;
        self.adjust_gc_threshold();

        let stats = GcStats {
            live: self.live_count(),
            freed,
        };
        debug!(live = stats.live, freed = stats.freed, threshold = self.gc_threshold, "gc");
        stats
    }

    fn clear_marks(&mut self) {
        self.pairs.clear_marks();
        self.strings.clear_marks();
        self.closures.clear_marks();
        self.syntax.clear_marks();
        self.frames.clear_marks();
    }

    /// Mark a value as reachable. Objects with outgoing references go on the worklist.
    fn mark_value(&mut self, val: Value, worklist: &mut Vec<Value>) {
        let fresh = match val {
            Value::Pair(id) => self.pairs.mark(id.0),
            Value::Str(id) => {
                self.strings.mark(id.0);
                false
            }
            Value::Closure(id) => self.closures.mark(id.0),
            Value::Syntax(id) => self.syntax.mark(id.0),
            Value::Environment(id) => self.frames.mark(id.0),
            _ => false,
        };
        if fresh {
            worklist.push(val);
        }
    }

    /// Process the mark worklist: mark everything each object refers to.
    fn process_worklist(&mut self, worklist: &mut Vec<Value>) {
        while let Some(val) = worklist.pop() {
            match val {
                Value::Pair(id) => {
                    let Pair { car, cdr } = *self.pairs.get(id.0);
                    self.mark_value(car, worklist);
                    self.mark_value(cdr, worklist);
                }
                Value::Closure(id) => {
                    let closure = self.closures.get(id.0);
                    let (body, env) = (closure.body, closure.env);
                    self.mark_value(body, worklist);
                    self.mark_value(Value::Environment(env), worklist);
                }
                Value::Syntax(id) => {
                    let object = *self.syntax.get(id.0);
                    self.mark_value(object.payload, worklist);
                    self.mark_value(object.location, worklist);
                }
                Value::Environment(id) => {
                    let frame = self.frames.get(id.0);
                    let parent = frame.parent();
                    let children: Vec<Value> = frame.bindings().map(|(_, v)| v).collect();
                    for child in children {
                        self.mark_value(child, worklist);
                    }
                    if let Some(parent) = parent {
                        self.mark_value(Value::Environment(parent), worklist);
                    }
                }
                _ => {}
            }
        }
    }

    /// Adjust GC threshold based on occupancy.
    fn adjust_gc_threshold(&mut self) {
        let live = self.live_count();
        let total = self.total_cells();
        if total > 0 {
            let occupancy = live as f64 / total as f64;
            if occupancy > 0.75 {
                // High occupancy: double the threshold to avoid thrashing
                self.gc_threshold = (self.gc_threshold * 2).min(self.capacity.max(1));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alloc_and_mutate_pairs() {
        let mut heap = Heap::new(16, 16);
        let p = heap.alloc_pair(Value::Fixnum(1), Value::Null).unwrap();
        heap.set_car(p, Value::Fixnum(2));
        heap.set_cdr(p, Value::Pair(p));
        assert_eq!(heap.car(p), Value::Fixnum(2));
        assert_eq!(heap.cdr(p), Value::Pair(p));
    }

    #[test]
    fn capacity_is_enforced() {
        let mut heap = Heap::new(2, 100);
        heap.alloc_pair(Value::Null, Value::Null).unwrap();
        heap.alloc_pair(Value::Null, Value::Null).unwrap();
        assert_eq!(heap.alloc_pair(Value::Null, Value::Null), Err(EvalError::HeapOverflow));
    }

    #[test]
    fn proper_list_detection_handles_cycles() {
        let mut heap = Heap::new(64, 64);
        let list = heap.list(&[Value::Fixnum(1), Value::Fixnum(2), Value::Fixnum(3)]).unwrap();
        assert!(heap.is_proper_list(list));
        assert!(heap.is_proper_list(Value::Null));
        let dotted = heap.cons(Value::Fixnum(1), Value::Fixnum(2)).unwrap();
        assert!(!heap.is_proper_list(dotted));
        let cell = heap.alloc_pair(Value::Fixnum(1), Value::Null).unwrap();
        heap.set_cdr(cell, Value::Pair(cell));
        assert!(!heap.is_proper_list(Value::Pair(cell)));
        assert_eq!(heap.list_to_vec(Value::Pair(cell)), None);
    }

    #[test]
    fn collect_frees_unreachable_cells_and_keeps_cycles_alive() {
        let mut heap = Heap::new(64, 64);
        let kept = heap.list(&[Value::Fixnum(1), Value::Fixnum(2)]).unwrap();
        let garbage = heap.list(&[Value::Fixnum(3), Value::Fixnum(4), Value::Fixnum(5)]).unwrap();
        let cycle = heap.alloc_pair(Value::Null, Value::Null).unwrap();
        heap.set_cdr(cycle, Value::Pair(cycle));
        heap.set_car(cycle, kept);

        let stats = heap.collect([Value::Pair(cycle)]);
        assert_eq!(stats.freed, 3);
        assert_eq!(stats.live, 3);
        assert!(heap.is_pair_marked(cycle));
        assert!(!heap.is_pair_marked(garbage.as_pair().unwrap()));
        assert_eq!(heap.list_to_vec(kept), Some(vec![Value::Fixnum(1), Value::Fixnum(2)]));

        // freed slots are reused
        let before = heap.total_cells();
        heap.alloc_pair(Value::Null, Value::Null).unwrap();
        assert_eq!(heap.total_cells(), before);
    }

    #[test]
    fn frames_keep_their_bindings_and_parents_alive() {
        let mut heap = Heap::new(64, 64);
        let root = heap.alloc_frame(Frame::new(None)).unwrap();
        let child = heap.alloc_frame(Frame::new(Some(root))).unwrap();
        let s = heap.alloc_string("hello".to_string()).unwrap();
        heap.frame_mut(root).define(crate::value::SymbolId(0), Value::Str(s));

        heap.collect([Value::Environment(child)]);
        assert_eq!(heap.string(s), "hello");
        assert_eq!(heap.frame(child).parent(), Some(root));
    }
}
