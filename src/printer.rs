use crate::heap::Heap;
use crate::primitives;
use crate::stack::Frame;
use crate::symbol;
use crate::value::{EnvId, Value};

/// Print a value to a string. In write mode strings keep their quotes;
/// in display mode they are printed raw.
///
/// Nesting depth is only limited by memory: pending work is kept on an
/// explicit stack rather than the native one.
pub fn print_val(val: Value, heap: &Heap, write: bool) -> String {
    let mut out = String::new();
    let mut work = vec![Piece::Val(val)];
    while let Some(piece) = work.pop() {
        match piece {
            Piece::Text(text) => out.push_str(text),
            Piece::Owned(text) => out.push_str(&text),
            Piece::Rest(rest) => match rest {
                Value::Nil => out.push(')'),
                Value::Pair(id) => {
                    out.push(' ');
                    work.push(Piece::Rest(heap.cdr(id)));
                    work.push(Piece::Val(heap.car(id)));
                }
                tail => {
                    out.push_str(" . ");
                    work.push(Piece::Text(")"));
                    work.push(Piece::Val(tail));
                }
            },
            Piece::Val(val) => print_atom(val, heap, write, &mut out, &mut work),
        }
    }
    out
}

/// Pending printer work, popped last-in first-out.
enum Piece {
    Val(Value),
    /// The rest of a list whose opening element is already printed.
    Rest(Value),
    Text(&'static str),
    Owned(String),
}

fn print_atom(val: Value, heap: &Heap, write: bool, out: &mut String, work: &mut Vec<Piece>) {
    match val {
        Value::Nil => out.push_str("()"),
        Value::Bool(true) => out.push_str("#t"),
        Value::Bool(false) => out.push_str("#f"),
        Value::Number(id) => out.push_str(&heap.get_number(id).to_string()),
        Value::Str(id) => {
            if write {
                out.push('"');
                out.push_str(heap.get_str(id));
                out.push('"');
            } else {
                out.push_str(heap.get_str(id));
            }
        }
        Value::Symbol(id) => out.push_str(symbol::name(id)),
        Value::Pair(id) => {
            out.push('(');
            work.push(Piece::Rest(heap.cdr(id)));
            work.push(Piece::Val(heap.car(id)));
        }
        Value::Closure(id) => {
            let clo = heap.get_closure(id);
            out.push_str("#<");
            work.push(Piece::Owned(format!(":{}>", print_env(clo.env, heap))));
            work.push(Piece::Val(clo.body));
            work.push(Piece::Text(":"));
            work.push(Piece::Val(clo.params));
        }
        Value::Intrinsic(id) => {
            let intrinsic = primitives::intrinsic(id);
            out.push_str(&format!("$<{}:{}>", intrinsic.name, intrinsic.arity));
        }
        Value::Continuation(id) => out.push_str(&print_stack(heap.get_continuation(id), heap)),
        Value::CallCc => out.push_str("#<call/cc>"),
        Value::Apply => out.push_str("#<apply>"),
        Value::Void => out.push_str("#<VOID>"),
        Value::Eof => out.push_str("#<EOF>"),
    }
}

/// Render an environment chain as its bound names, `|` for each call-frame
/// marker, up to the global environment.
pub fn print_env(env: EnvId, heap: &Heap) -> String {
    let mut names = Vec::new();
    let mut current = Some(env);
    while let Some(id) = current {
        if Some(id) == heap.global_env {
            names.push("GlobalEnv");
            break;
        }
        let frame = heap.frame(id);
        names.push(match frame.sym {
            Some(sym) => symbol::name(sym),
            None => "|",
        });
        current = frame.next;
    }
    format!("#<{}>", names.join(" "))
}

/// Render frames bottom to top, one per line. Used both for printing
/// continuations and for decorating evaluator errors.
pub fn print_stack(frames: &[Frame], heap: &Heap) -> String {
    let lines: Vec<String> = frames
        .iter()
        .map(|frame| format!("{} {}", frame.name(), print_payload(frame, heap)))
        .collect();
    format!("$<{}>", lines.join("\n\t  "))
}

fn print_payload(frame: &Frame, heap: &Heap) -> String {
    match *frame {
        Frame::Then {
            consequent,
            alternative,
        } => match alternative {
            Some(alt) => format!(
                "({} {})",
                print_val(consequent, heap, true),
                print_val(alt, heap, true)
            ),
            None => format!("({})", print_val(consequent, heap, true)),
        },
        Frame::Define(sym) => symbol::name(sym).to_string(),
        Frame::SetQ(env) | Frame::RestoreEnv(env) => print_env(env, heap),
        Frame::Begin(v)
        | Frame::Apply(v)
        | Frame::ApplyFun(v)
        | Frame::EvalArg(v)
        | Frame::ConsArgs(v) => print_val(v, heap, true),
    }
}
