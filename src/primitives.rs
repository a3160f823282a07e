use std::cmp::Ordering;
use std::fmt;

use crate::error::{Error, SchemeResult};
use crate::heap::Heap;
use crate::number::Number;
use crate::printer::print_val;
use crate::reader::TokenQueue;
use crate::value::{IntrinsicId, Value};

/// How many arguments an intrinsic takes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Arity {
    Fixed(usize),
    Variadic,
}

impl Arity {
    pub fn accepts(self, nargs: usize) -> bool {
        match self {
            Arity::Fixed(n) => n == nargs,
            Arity::Variadic => true,
        }
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arity::Fixed(n) => write!(f, "{}", n),
            Arity::Variadic => write!(f, "-1"),
        }
    }
}

/// What an intrinsic hands back to the evaluator.
pub enum Reply {
    /// The call's result.
    Value(Value),
    /// Output was produced; let the host run before continuing with void.
    Yield,
    /// The input queue ran dry mid-expression; retry the call once the host
    /// has supplied more input.
    NeedInput,
}

/// The parts of the machine an intrinsic may touch.
pub struct Context<'a> {
    pub heap: &'a mut Heap,
    pub input: &'a mut TokenQueue,
    pub output: &'a mut String,
}

pub type IntrinsicFn = fn(&mut Context<'_>, &[Value]) -> SchemeResult<Reply>;

/// A built-in procedure.
pub struct Intrinsic {
    pub name: &'static str,
    pub arity: Arity,
    pub fun: IntrinsicFn,
}

macro_rules! intrinsic {
    ($name:expr, $arity:expr, $fun:expr) => {
        Intrinsic {
            name: $name,
            arity: $arity,
            fun: $fun,
        }
    };
}

/// Every intrinsic, in the order they appear in the global environment
/// (innermost first). `IntrinsicId` indexes into this table.
pub static INTRINSICS: &[Intrinsic] = &[
    intrinsic!("car", Arity::Fixed(1), prim_car),
    intrinsic!("cdr", Arity::Fixed(1), prim_cdr),
    intrinsic!("cons", Arity::Fixed(2), prim_cons),
    intrinsic!("eq?", Arity::Fixed(2), prim_eq),
    intrinsic!("eqv?", Arity::Fixed(2), prim_eqv),
    intrinsic!("pair?", Arity::Fixed(1), prim_pair_p),
    intrinsic!("null?", Arity::Fixed(1), prim_null_p),
    intrinsic!("not", Arity::Fixed(1), prim_not),
    intrinsic!("list", Arity::Variadic, prim_list),
    intrinsic!("display", Arity::Fixed(1), prim_display),
    intrinsic!("newline", Arity::Fixed(0), prim_newline),
    intrinsic!("read", Arity::Fixed(0), prim_read),
    intrinsic!("eof-object?", Arity::Fixed(1), prim_eof_object_p),
    intrinsic!("symbol?", Arity::Fixed(1), prim_symbol_p),
    intrinsic!("+", Arity::Fixed(2), prim_add),
    intrinsic!("-", Arity::Fixed(2), prim_sub),
    intrinsic!("*", Arity::Fixed(2), prim_mul),
    intrinsic!("<", Arity::Fixed(2), prim_less),
    intrinsic!("=", Arity::Fixed(2), prim_num_eq),
    intrinsic!("number?", Arity::Fixed(1), prim_number_p),
    intrinsic!("error", Arity::Fixed(2), prim_error),
    intrinsic!("globals", Arity::Fixed(0), prim_globals),
];

pub fn intrinsic(id: IntrinsicId) -> &'static Intrinsic {
    &INTRINSICS[id.0 as usize]
}

fn value(v: Value) -> SchemeResult<Reply> {
    Ok(Reply::Value(v))
}

fn boolean(b: bool) -> SchemeResult<Reply> {
    Ok(Reply::Value(Value::Bool(b)))
}

fn number<'h>(heap: &'h Heap, v: Value, who: &str) -> SchemeResult<&'h Number> {
    match v {
        Value::Number(id) => Ok(heap.get_number(id)),
        _ => Err(Error::Type(format!(
            "{}: not a number: {}",
            who,
            print_val(v, heap, true)
        ))),
    }
}

fn arith(
    ctx: &mut Context<'_>,
    args: &[Value],
    who: &str,
    op: fn(&Number, &Number) -> Number,
) -> SchemeResult<Reply> {
    let a = number(ctx.heap, args[0], who)?;
    let b = number(ctx.heap, args[1], who)?;
    let result = op(a, b);
    value(ctx.heap.number(result)?)
}

fn compare(ctx: &Context<'_>, args: &[Value], who: &str) -> SchemeResult<Option<Ordering>> {
    let a = number(ctx.heap, args[0], who)?;
    let b = number(ctx.heap, args[1], who)?;
    Ok(a.compare(b))
}

// === Structure ===

fn prim_car(ctx: &mut Context<'_>, args: &[Value]) -> SchemeResult<Reply> {
    value(ctx.heap.car_val(args[0])?)
}

fn prim_cdr(ctx: &mut Context<'_>, args: &[Value]) -> SchemeResult<Reply> {
    value(ctx.heap.cdr_val(args[0])?)
}

fn prim_cons(ctx: &mut Context<'_>, args: &[Value]) -> SchemeResult<Reply> {
    value(ctx.heap.cons(args[0], args[1])?)
}

/// (eq? a b): numbers of the same exactness compare by value, strings
/// by content, everything else by identity.
fn prim_eq(ctx: &mut Context<'_>, args: &[Value]) -> SchemeResult<Reply> {
    boolean(same(ctx.heap, args[0], args[1]))
}

fn same(heap: &Heap, a: Value, b: Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (heap.get_number(x), heap.get_number(y)) {
            (Number::Exact(p), Number::Exact(q)) => p == q,
            // 0.0 and -0.0 differ, NaN is itself
            (Number::Inexact(p), Number::Inexact(q)) => {
                p.to_bits() == q.to_bits() || (p.is_nan() && q.is_nan())
            }
            _ => false,
        },
        (Value::Str(x), Value::Str(y)) => heap.get_str(x) == heap.get_str(y),
        _ => a == b,
    }
}

/// (eqv? a b): `eq?`, or numeric equality across exactness.
fn prim_eqv(ctx: &mut Context<'_>, args: &[Value]) -> SchemeResult<Reply> {
    if same(ctx.heap, args[0], args[1]) {
        return boolean(true);
    }
    match (args[0], args[1]) {
        (Value::Number(a), Value::Number(b)) => {
            let ord = ctx.heap.get_number(a).compare(ctx.heap.get_number(b));
            boolean(ord == Some(Ordering::Equal))
        }
        _ => boolean(false),
    }
}

fn prim_pair_p(_ctx: &mut Context<'_>, args: &[Value]) -> SchemeResult<Reply> {
    boolean(args[0].is_pair())
}

fn prim_null_p(_ctx: &mut Context<'_>, args: &[Value]) -> SchemeResult<Reply> {
    boolean(args[0].is_nil())
}

fn prim_not(_ctx: &mut Context<'_>, args: &[Value]) -> SchemeResult<Reply> {
    boolean(args[0].is_false())
}

fn prim_list(ctx: &mut Context<'_>, args: &[Value]) -> SchemeResult<Reply> {
    value(ctx.heap.list(args)?)
}

// === Predicates ===

fn prim_eof_object_p(_ctx: &mut Context<'_>, args: &[Value]) -> SchemeResult<Reply> {
    boolean(args[0] == Value::Eof)
}

fn prim_symbol_p(_ctx: &mut Context<'_>, args: &[Value]) -> SchemeResult<Reply> {
    boolean(matches!(args[0], Value::Symbol(_)))
}

fn prim_number_p(_ctx: &mut Context<'_>, args: &[Value]) -> SchemeResult<Reply> {
    boolean(matches!(args[0], Value::Number(_)))
}

// === I/O ===

fn prim_display(ctx: &mut Context<'_>, args: &[Value]) -> SchemeResult<Reply> {
    let text = print_val(args[0], ctx.heap, false);
    ctx.output.push_str(&text);
    Ok(Reply::Yield)
}

fn prim_newline(ctx: &mut Context<'_>, _args: &[Value]) -> SchemeResult<Reply> {
    ctx.output.push('\n');
    Ok(Reply::Yield)
}

/// (read): next expression from the interactive input, or the EOF object
/// once the host reports end of input.
fn prim_read(ctx: &mut Context<'_>, _args: &[Value]) -> SchemeResult<Reply> {
    match ctx.input.read_expression(ctx.heap) {
        Ok(v) => value(v),
        Err(Error::EndOfInput) if ctx.input.take_eof() => value(Value::Eof),
        Err(Error::EndOfInput) => Ok(Reply::NeedInput),
        Err(e) => Err(e),
    }
}

// === Arithmetic ===

fn prim_add(ctx: &mut Context<'_>, args: &[Value]) -> SchemeResult<Reply> {
    arith(ctx, args, "+", Number::add)
}

fn prim_sub(ctx: &mut Context<'_>, args: &[Value]) -> SchemeResult<Reply> {
    arith(ctx, args, "-", Number::sub)
}

fn prim_mul(ctx: &mut Context<'_>, args: &[Value]) -> SchemeResult<Reply> {
    arith(ctx, args, "*", Number::mul)
}

fn prim_less(ctx: &mut Context<'_>, args: &[Value]) -> SchemeResult<Reply> {
    boolean(compare(ctx, args, "<")? == Some(Ordering::Less))
}

fn prim_num_eq(ctx: &mut Context<'_>, args: &[Value]) -> SchemeResult<Reply> {
    boolean(compare(ctx, args, "=")? == Some(Ordering::Equal))
}

// === Misc ===

/// (error reason irritant): raise a guest error.
fn prim_error(ctx: &mut Context<'_>, args: &[Value]) -> SchemeResult<Reply> {
    Err(Error::Guest {
        reason: print_val(args[0], ctx.heap, false),
        irritant: print_val(args[1], ctx.heap, true),
    })
}

/// (globals): names bound in the global environment.
fn prim_globals(ctx: &mut Context<'_>, _args: &[Value]) -> SchemeResult<Reply> {
    let global = ctx
        .heap
        .global_env
        .ok_or_else(|| Error::Internal("no global environment".into()))?;
    let mut result = Value::Nil;
    let mut current = ctx.heap.frame(global).next;
    while let Some(id) = current {
        let frame = ctx.heap.frame(id);
        let (sym, next) = (frame.sym, frame.next);
        if let Some(sym) = sym {
            result = ctx.heap.cons(Value::Symbol(sym), result)?;
        }
        current = next;
    }
    value(result)
}
