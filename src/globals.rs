use tracing::debug;

use crate::env::{self, Frame};
use crate::error::EvalResult;
use crate::heap::Heap;
use crate::procedure::Primitive;
use crate::symbol::SymbolTable;
use crate::value::{EnvId, PrimitiveId, Value};

/// Build the initial environments.
///
/// Returns `(root, global)`: the root frame stays empty forever and ends
/// every chain; the global frame extends it and holds one binding per entry
/// of `primitives`, each bound to a handle indexing that table.
pub fn build_globals(
    heap: &mut Heap,
    symbols: &mut SymbolTable,
    primitives: &[Primitive],
) -> EvalResult<(EnvId, EnvId)> {
    let root = heap.alloc_frame(Frame::new(None))?;
    let global = env::extend(heap, root)?;

    for (index, prim) in primitives.iter().enumerate() {
        let name = symbols.intern(prim.name);
        let handle = PrimitiveId(index as u32);
        env::define(heap, global, name, Value::Primitive(handle));
    }

    debug!(primitives = primitives.len(), "global environment built");
    Ok((root, global))
}
