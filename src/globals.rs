use crate::error::SchemeResult;
use crate::heap::Heap;
use crate::primitives::INTRINSICS;
use crate::symbol::{self, sym};
use crate::value::{EnvId, IntrinsicId, Value};

/// Build the initial global environment and record it in the heap.
///
/// The chain is the global frame marker followed by one binding per
/// built-in: the structural and I/O intrinsics, then `call/cc` and
/// `apply`, then arithmetic, `number?`, `error` and `globals`. Top-level
/// `define`s are inserted right after the marker, ahead of all of these.
pub fn build_globals(heap: &mut Heap) -> SchemeResult<EnvId> {
    let marker = heap.alloc_frame(None, Value::Nil, None)?;

    let split = INTRINSICS
        .iter()
        .position(|i| i.name == "+")
        .unwrap_or(INTRINSICS.len());

    let mut bindings: Vec<(crate::value::SymbolId, Value)> = Vec::new();
    for (i, intrinsic) in INTRINSICS.iter().enumerate() {
        if i == split {
            bindings.push((sym::CALLCC, Value::CallCc));
            bindings.push((sym::APPLY, Value::Apply));
        }
        bindings.push((
            symbol::intern(intrinsic.name),
            Value::Intrinsic(IntrinsicId(i as u16)),
        ));
    }

    let mut next = None;
    for (name, val) in bindings.into_iter().rev() {
        next = Some(heap.alloc_frame(Some(name), val, next)?);
    }
    heap.frame_mut(marker).next = next;
    heap.global_env = Some(marker);
    Ok(marker)
}
