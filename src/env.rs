//! Environments are chains of single-binding frames in the heap. A frame
//! with no symbol marks where a call frame (or the global environment)
//! starts; `define` inserts right after that marker.

use crate::error::{ArityKind, Error, SchemeResult};
use crate::heap::Heap;
use crate::printer;
use crate::symbol;
use crate::value::{EnvId, SymbolId, Value};

/// Search the chain for the frame binding `sym`.
pub fn look_for(heap: &Heap, env: EnvId, sym: SymbolId) -> SchemeResult<EnvId> {
    let mut current = Some(env);
    while let Some(id) = current {
        let frame = heap.frame(id);
        if frame.sym == Some(sym) {
            return Ok(id);
        }
        current = frame.next;
    }
    Err(Error::Reference(symbol::name(sym).to_string()))
}

/// Value bound to `sym`.
pub fn lookup(heap: &Heap, env: EnvId, sym: SymbolId) -> SchemeResult<Value> {
    look_for(heap, env, sym).map(|id| heap.frame(id).val)
}

/// Overwrite the value held by a binding frame.
pub fn assign(heap: &mut Heap, binding: EnvId, val: Value) {
    heap.frame_mut(binding).val = val;
}

/// Add a binding to the definition scope of `env`: right after the frame
/// marker at its head, so every closure sharing that marker sees it.
pub fn define(heap: &mut Heap, env: EnvId, sym: SymbolId, val: Value) -> SchemeResult<()> {
    let next = heap.frame(env).next;
    let binding = heap.alloc_frame(Some(sym), val, next)?;
    heap.frame_mut(env).next = Some(binding);
    Ok(())
}

/// Build a call frame for a closure: a fresh marker followed by the
/// parameters bound pairwise to the arguments, on top of `parent`.
///
/// A dotted tail in `params` (or a bare symbol) takes the remaining
/// arguments as a list.
pub fn bind_params(
    heap: &mut Heap,
    callee: Value,
    params: Value,
    args: Value,
    parent: EnvId,
) -> SchemeResult<EnvId> {
    let mut bindings: Vec<(SymbolId, Value)> = Vec::new();
    let mut p = params;
    let mut a = args;
    loop {
        match (p, a) {
            (Value::Nil, Value::Nil) => break,
            (Value::Symbol(rest), _) => {
                bindings.push((rest, a));
                break;
            }
            (Value::Pair(pid), Value::Pair(aid)) => {
                let sym = heap
                    .car(pid)
                    .as_symbol()
                    .ok_or_else(|| bad_param(heap, params))?;
                bindings.push((sym, heap.car(aid)));
                p = heap.cdr(pid);
                a = heap.cdr(aid);
            }
            (Value::Pair(_), _) => return Err(arity(heap, callee, args, ArityKind::TooFew)),
            (Value::Nil, _) => return Err(arity(heap, callee, args, ArityKind::TooMany)),
            _ => return Err(bad_param(heap, params)),
        }
    }

    let mut next = Some(parent);
    for (sym, val) in bindings.into_iter().rev() {
        next = Some(heap.alloc_frame(Some(sym), val, next)?);
    }
    heap.alloc_frame(None, Value::Nil, next)
}

fn arity(heap: &Heap, callee: Value, args: Value, kind: ArityKind) -> Error {
    Error::Arity {
        callee: printer::print_val(callee, heap, true),
        args: printer::print_val(args, heap, true),
        kind,
    }
}

fn bad_param(heap: &Heap, params: Value) -> Error {
    Error::Syntax(format!(
        "bad parameter list: {}",
        printer::print_val(params, heap, true)
    ))
}
