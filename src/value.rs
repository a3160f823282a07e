use std::fmt;

/// Unique identifier for an interned symbol.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct SymbolId(pub u32);

/// Index into the cons-cell arena.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct PairId(pub u32);

/// Index into the number arena.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct NumId(pub u32);

/// Index into the string arena.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct StrId(pub u32);

/// Index into the environment-frame arena.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct EnvId(pub u32);

/// Index into the closure arena.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClosureId(pub u32);

/// Index into the continuation arena.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContId(pub u32);

/// Index into the static intrinsic table.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct IntrinsicId(pub u16);

/// The fundamental Scheme value. A small `Copy` handle: the payload of
/// anything bigger than a boolean lives in the heap arenas.
///
/// Equality on `Value` is identity: two numbers read from separate
/// literals are different values even when numerically equal.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub enum Value {
    /// The empty list.
    Nil,
    Bool(bool),
    Number(NumId),
    Str(StrId),
    Symbol(SymbolId),
    Pair(PairId),
    Closure(ClosureId),
    Intrinsic(IntrinsicId),
    Continuation(ContId),
    /// The `call/cc` procedure.
    CallCc,
    /// The `apply` procedure.
    Apply,
    /// The result of an expression that has no value.
    Void,
    /// The end-of-file object.
    Eof,
}

impl Value {
    pub fn is_nil(self) -> bool {
        matches!(self, Value::Nil)
    }

    pub fn is_pair(self) -> bool {
        matches!(self, Value::Pair(_))
    }

    pub fn is_false(self) -> bool {
        matches!(self, Value::Bool(false))
    }

    pub fn as_pair(self) -> Option<PairId> {
        match self {
            Value::Pair(id) => Some(id),
            _ => None,
        }
    }

    pub fn as_symbol(self) -> Option<SymbolId> {
        match self {
            Value::Symbol(id) => Some(id),
            _ => None,
        }
    }

    pub fn as_number(self) -> Option<NumId> {
        match self {
            Value::Number(id) => Some(id),
            _ => None,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => write!(f, "Nil"),
            Value::Bool(b) => write!(f, "Bool({})", b),
            Value::Number(id) => write!(f, "Number({})", id.0),
            Value::Str(id) => write!(f, "Str({})", id.0),
            Value::Symbol(id) => write!(f, "Sym({})", id.0),
            Value::Pair(id) => write!(f, "Pair({})", id.0),
            Value::Closure(id) => write!(f, "Closure({})", id.0),
            Value::Intrinsic(id) => write!(f, "Intrinsic({})", id.0),
            Value::Continuation(id) => write!(f, "Continuation({})", id.0),
            Value::CallCc => write!(f, "CallCc"),
            Value::Apply => write!(f, "Apply"),
            Value::Void => write!(f, "Void"),
            Value::Eof => write!(f, "Eof"),
        }
    }
}

impl fmt::Debug for SymbolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SymbolId({})", self.0)
    }
}

impl fmt::Debug for PairId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PairId({})", self.0)
    }
}

impl fmt::Debug for EnvId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EnvId({})", self.0)
    }
}
