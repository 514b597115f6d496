//! Environments: chains of mutable binding frames living in the heap.
//!
//! An environment is named by its innermost frame. Every frame except the
//! fixed empty root has a parent. Frames are shared by reference; closures
//! that captured a frame see later mutations of it.

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::error::EvalResult;
use crate::heap::Heap;
use crate::value::{EnvId, SymbolId, Value};

/// Frames larger than this get a hash index next to their slots.
const INDEX_THRESHOLD: usize = 8;

/// One link of an environment chain: an insertion-ordered mapping from
/// symbol to value. A name appears at most once per frame.
#[derive(Debug, Default)]
pub struct Frame {
    slots: SmallVec<[(SymbolId, Value); 4]>,
    index: Option<FxHashMap<SymbolId, usize>>,
    parent: Option<EnvId>,
}

impl Frame {
    pub fn new(parent: Option<EnvId>) -> Self {
        Frame {
            slots: SmallVec::new(),
            index: None,
            parent,
        }
    }

    pub fn parent(&self) -> Option<EnvId> {
        self.parent
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    fn position(&self, name: SymbolId) -> Option<usize> {
        match &self.index {
            Some(index) => index.get(&name).copied(),
            None => self.slots.iter().position(|&(n, _)| n == name),
        }
    }

    pub fn get(&self, name: SymbolId) -> Option<Value> {
        self.position(name).map(|i| self.slots[i].1)
    }

    /// Overwrite an existing binding in this frame. Returns the old value,
    /// or None if the name is not bound here.
    pub fn replace(&mut self, name: SymbolId, val: Value) -> Option<Value> {
        let i = self.position(name)?;
        Some(std::mem::replace(&mut self.slots[i].1, val))
    }

    /// Bind `name` in this frame, overwriting any binding it already has here.
    pub fn define(&mut self, name: SymbolId, val: Value) {
        if self.replace(name, val).is_some() {
            return;
        }
        let i = self.slots.len();
        self.slots.push((name, val));
        match &mut self.index {
            Some(index) => {
                index.insert(name, i);
            }
            None if self.slots.len() > INDEX_THRESHOLD => {
                let index = self.slots.iter().enumerate().map(|(i, &(n, _))| (n, i)).collect();
                self.index = Some(index);
            }
            None => {}
        }
    }

    /// Bindings in insertion order.
    pub fn bindings(&self) -> impl Iterator<Item = (SymbolId, Value)> + '_ {
        self.slots.iter().copied()
    }
}

/// Prepend an empty frame to `parent`.
pub fn extend(heap: &mut Heap, parent: EnvId) -> EvalResult<EnvId> {
    heap.alloc_frame(Frame::new(Some(parent)))
}

/// Bind `name` in the innermost frame of `env`. Never touches outer frames.
pub fn define(heap: &mut Heap, env: EnvId, name: SymbolId, val: Value) {
    heap.frame_mut(env).define(name, val);
}

/// Walk the chain outward and return the nearest binding of `name`.
pub fn lookup(heap: &Heap, env: EnvId, name: SymbolId) -> Option<Value> {
    let mut current = Some(env);
    while let Some(id) = current {
        let frame = heap.frame(id);
        if let Some(val) = frame.get(name) {
            return Some(val);
        }
        current = frame.parent();
    }
    None
}

/// Mutate the nearest frame binding `name`. Returns the old value, or None
/// if the name is unbound everywhere in the chain.
pub fn set(heap: &mut Heap, env: EnvId, name: SymbolId, val: Value) -> Option<Value> {
    let mut current = Some(env);
    while let Some(id) = current {
        let frame = heap.frame_mut(id);
        if let Some(old) = frame.replace(name, val) {
            return Some(old);
        }
        current = frame.parent();
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn heap_with_root() -> (Heap, EnvId) {
        let mut heap = Heap::new(1024, 1024);
        let root = heap.alloc_frame(Frame::new(None)).unwrap();
        (heap, root)
    }

    #[test]
    fn define_overwrites_in_same_frame() {
        let (mut heap, root) = heap_with_root();
        let x = SymbolId(100);
        define(&mut heap, root, x, Value::Fixnum(1));
        define(&mut heap, root, x, Value::Fixnum(2));
        assert_eq!(heap.frame(root).len(), 1);
        assert_eq!(lookup(&heap, root, x), Some(Value::Fixnum(2)));
    }

    #[test]
    fn inner_define_shadows_without_mutating_outer() {
        let (mut heap, root) = heap_with_root();
        let x = SymbolId(100);
        define(&mut heap, root, x, Value::Fixnum(1));
        let inner = extend(&mut heap, root).unwrap();
        define(&mut heap, inner, x, Value::Fixnum(2));
        assert_eq!(lookup(&heap, inner, x), Some(Value::Fixnum(2)));
        assert_eq!(lookup(&heap, root, x), Some(Value::Fixnum(1)));
    }

    #[test]
    fn set_mutates_nearest_binding() {
        let (mut heap, root) = heap_with_root();
        let x = SymbolId(100);
        define(&mut heap, root, x, Value::Fixnum(1));
        let inner = extend(&mut heap, root).unwrap();
        assert_eq!(set(&mut heap, inner, x, Value::Fixnum(5)), Some(Value::Fixnum(1)));
        assert_eq!(lookup(&heap, root, x), Some(Value::Fixnum(5)));
        assert_eq!(set(&mut heap, inner, SymbolId(101), Value::Null), None);
        assert_eq!(lookup(&heap, inner, SymbolId(101)), None);
    }

    #[test]
    fn large_frames_stay_consistent_after_indexing() {
        let mut frame = Frame::new(None);
        for i in 0..32 {
            frame.define(SymbolId(i), Value::Fixnum(i64::from(i)));
        }
        frame.define(SymbolId(3), Value::True);
        assert_eq!(frame.len(), 32);
        assert_eq!(frame.get(SymbolId(3)), Some(Value::True));
        assert_eq!(frame.get(SymbolId(31)), Some(Value::Fixnum(31)));
        let order: Vec<_> = frame.bindings().map(|(n, _)| n.0).take(3).collect();
        assert_eq!(order, vec![0, 1, 2]);
    }
}
