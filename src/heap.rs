use crate::error::{Error, SchemeResult};
use crate::number::Number;
use crate::stack::Frame;
use crate::symbol;
use crate::value::{ClosureId, ContId, EnvId, NumId, PairId, StrId, SymbolId, Value};

/// A single cons cell on the heap.
pub struct ConsCell {
    pub car: Value,
    pub cdr: Value,
}

/// One binding in an environment chain. `sym == None` marks the start
/// of a call frame (the global environment starts with one too).
pub struct EnvFrame {
    pub sym: Option<SymbolId>,
    pub val: Value,
    pub next: Option<EnvId>,
}

/// A lambda expression together with the environment it closed over.
/// The environment is shared, never copied.
pub struct Closure {
    pub params: Value,
    pub body: Value,
    pub env: EnvId,
}

/// Slots of one object kind, with mark bits and a free list.
struct Arena<T> {
    slots: Vec<T>,
    marks: Vec<bool>,
    free_list: Vec<u32>,
}

impl<T> Arena<T> {
    fn new() -> Self {
        Arena {
            slots: Vec::new(),
            marks: Vec::new(),
            free_list: Vec::new(),
        }
    }

    fn alloc(&mut self, obj: T, capacity: usize) -> SchemeResult<u32> {
        if let Some(i) = self.free_list.pop() {
            self.slots[i as usize] = obj;
            return Ok(i);
        }
        if self.slots.len() >= capacity {
            return Err(Error::HeapOverflow);
        }
        self.slots.push(obj);
        self.marks.push(false);
        Ok((self.slots.len() - 1) as u32)
    }

    #[inline]
    fn get(&self, i: u32) -> &T {
        &self.slots[i as usize]
    }

    #[inline]
    fn get_mut(&mut self, i: u32) -> &mut T {
        &mut self.slots[i as usize]
    }

    fn live(&self) -> usize {
        self.slots.len() - self.free_list.len()
    }

    fn clear_marks(&mut self) {
        self.marks.iter_mut().for_each(|m| *m = false);
    }

    /// Set the mark bit; true if it was clear.
    fn mark(&mut self, i: u32) -> bool {
        !std::mem::replace(&mut self.marks[i as usize], true)
    }

    /// Put every unmarked slot on the free list, letting `scrub` drop
    /// whatever the dead object owns.
    fn sweep(&mut self, mut scrub: impl FnMut(&mut T)) {
        self.free_list.clear();
        for (i, slot) in self.slots.iter_mut().enumerate() {
            if !self.marks[i] {
                scrub(slot);
                self.free_list.push(i as u32);
            }
        }
    }
}

/// An object whose children still have to be marked.
pub enum Gray {
    Pair(PairId),
    Frame(EnvId),
    Closure(ClosureId),
    Continuation(ContId),
}

/// Allocations between collections never exceed this.
const MAX_GC_THRESHOLD: usize = 64 * 1024;

/// The object heap. Every non-immediate value lives in one of these
/// arenas and is addressed by index.
///
/// Each arena holds at most `capacity` objects. Unreachable objects are
/// reclaimed by `collect`, a mark/sweep pass over everything reachable
/// from the roots the machine hands in.
pub struct Heap {
    cells: Arena<ConsCell>,
    numbers: Arena<Number>,
    strings: Arena<String>,
    frames: Arena<EnvFrame>,
    closures: Arena<Closure>,
    continuations: Arena<Vec<Frame>>,
    capacity: usize,
    /// Number of allocations since last GC (for triggering).
    allocs_since_gc: usize,
    gc_threshold: usize,
    /// Head of the global environment, once it has been built.
    pub global_env: Option<EnvId>,
}

impl Heap {
    pub fn new(capacity: usize) -> Self {
        Heap {
            cells: Arena::new(),
            numbers: Arena::new(),
            strings: Arena::new(),
            frames: Arena::new(),
            closures: Arena::new(),
            continuations: Arena::new(),
            capacity,
            allocs_since_gc: 0,
            gc_threshold: (capacity / 2).clamp(1, MAX_GC_THRESHOLD),
            global_env: None,
        }
    }

    /// Allocate a new cons cell.
    /// Returns Err(HeapOverflow) if capacity is exceeded.
    pub fn alloc(&mut self, car: Value, cdr: Value) -> SchemeResult<PairId> {
        self.allocs_since_gc += 1;
        Ok(PairId(self.cells.alloc(ConsCell { car, cdr }, self.capacity)?))
    }

    /// Allocate a pair and return it as a value.
    pub fn cons(&mut self, car: Value, cdr: Value) -> SchemeResult<Value> {
        Ok(Value::Pair(self.alloc(car, cdr)?))
    }

    #[inline]
    pub fn car(&self, id: PairId) -> Value {
        self.cells.get(id.0).car
    }

    #[inline]
    pub fn cdr(&self, id: PairId) -> Value {
        self.cells.get(id.0).cdr
    }

    /// Car of a value that must be a pair.
    pub fn car_val(&self, val: Value) -> SchemeResult<Value> {
        match val {
            Value::Pair(id) => Ok(self.car(id)),
            _ => Err(Error::Type("car of non-pair".into())),
        }
    }

    /// Cdr of a value that must be a pair.
    pub fn cdr_val(&self, val: Value) -> SchemeResult<Value> {
        match val {
            Value::Pair(id) => Ok(self.cdr(id)),
            _ => Err(Error::Type("cdr of non-pair".into())),
        }
    }

    /// Build a proper list from a slice of values.
    pub fn list(&mut self, values: &[Value]) -> SchemeResult<Value> {
        let mut result = Value::Nil;
        for &val in values.iter().rev() {
            result = self.cons(val, result)?;
        }
        Ok(result)
    }

    /// Build a fresh list with the elements of `list` in reverse order.
    pub fn reverse(&mut self, list: Value) -> SchemeResult<Value> {
        let mut result = Value::Nil;
        let mut current = list;
        while let Value::Pair(id) = current {
            result = self.cons(self.car(id), result)?;
            current = self.cdr(id);
        }
        Ok(result)
    }

    /// Collect a list into a Vec. An improper list yields `Err(tail)`
    /// holding the non-`()` terminator.
    pub fn list_to_vec(&self, val: Value) -> Result<Vec<Value>, Value> {
        let mut result = Vec::new();
        let mut current = val;
        loop {
            match current {
                Value::Nil => return Ok(result),
                Value::Pair(id) => {
                    result.push(self.car(id));
                    current = self.cdr(id);
                }
                tail => return Err(tail),
            }
        }
    }

    /// Returns true if this value is a proper list.
    pub fn is_proper_list(&self, val: Value) -> bool {
        self.list_to_vec(val).is_ok()
    }

    // === Atoms ===

    pub fn number(&mut self, n: Number) -> SchemeResult<Value> {
        self.allocs_since_gc += 1;
        Ok(Value::Number(NumId(self.numbers.alloc(n, self.capacity)?)))
    }

    pub fn get_number(&self, id: NumId) -> &Number {
        self.numbers.get(id.0)
    }

    pub fn string(&mut self, s: impl Into<String>) -> SchemeResult<Value> {
        self.allocs_since_gc += 1;
        Ok(Value::Str(StrId(self.strings.alloc(s.into(), self.capacity)?)))
    }

    pub fn get_str(&self, id: StrId) -> &str {
        self.strings.get(id.0)
    }

    pub fn symbol(&self, name: &str) -> Value {
        Value::Symbol(symbol::intern(name))
    }

    // === Environment frames ===

    pub fn alloc_frame(
        &mut self,
        sym: Option<SymbolId>,
        val: Value,
        next: Option<EnvId>,
    ) -> SchemeResult<EnvId> {
        self.allocs_since_gc += 1;
        Ok(EnvId(self.frames.alloc(EnvFrame { sym, val, next }, self.capacity)?))
    }

    #[inline]
    pub fn frame(&self, id: EnvId) -> &EnvFrame {
        self.frames.get(id.0)
    }

    #[inline]
    pub fn frame_mut(&mut self, id: EnvId) -> &mut EnvFrame {
        self.frames.get_mut(id.0)
    }

    // === Procedures ===

    pub fn closure(&mut self, params: Value, body: Value, env: EnvId) -> SchemeResult<Value> {
        self.allocs_since_gc += 1;
        let id = self.closures.alloc(Closure { params, body, env }, self.capacity)?;
        Ok(Value::Closure(ClosureId(id)))
    }

    pub fn get_closure(&self, id: ClosureId) -> &Closure {
        self.closures.get(id.0)
    }

    /// Store a snapshot of control frames as a continuation.
    pub fn continuation(&mut self, frames: Vec<Frame>) -> SchemeResult<Value> {
        self.allocs_since_gc += 1;
        let id = self.continuations.alloc(frames, self.capacity)?;
        Ok(Value::Continuation(ContId(id)))
    }

    pub fn get_continuation(&self, id: ContId) -> &[Frame] {
        self.continuations.get(id.0)
    }

    /// Returns the number of pair cells currently in use.
    pub fn total_cells(&self) -> usize {
        self.cells.live()
    }

    /// Returns the number of live objects across all arenas.
    pub fn live_objects(&self) -> usize {
        self.cells.live()
            + self.numbers.live()
            + self.strings.live()
            + self.frames.live()
            + self.closures.live()
            + self.continuations.live()
    }

    // === GC methods ===

    /// Returns true if we should trigger a GC cycle.
    pub fn should_gc(&self) -> bool {
        self.allocs_since_gc >= self.gc_threshold
    }

    /// Clear all mark bits (phase 1 of mark-sweep).
    pub fn clear_marks(&mut self) {
        self.cells.clear_marks();
        self.numbers.clear_marks();
        self.strings.clear_marks();
        self.frames.clear_marks();
        self.closures.clear_marks();
        self.continuations.clear_marks();
    }

    /// Mark a value as reachable, queueing anything with children.
    pub fn mark_value(&mut self, val: Value, worklist: &mut Vec<Gray>) {
        match val {
            Value::Pair(id) => {
                if self.cells.mark(id.0) {
                    worklist.push(Gray::Pair(id));
                }
            }
            Value::Number(id) => {
                self.numbers.mark(id.0);
            }
            Value::Str(id) => {
                self.strings.mark(id.0);
            }
            Value::Closure(id) => {
                if self.closures.mark(id.0) {
                    worklist.push(Gray::Closure(id));
                }
            }
            Value::Continuation(id) => {
                if self.continuations.mark(id.0) {
                    worklist.push(Gray::Continuation(id));
                }
            }
            _ => {}
        }
    }

    pub fn mark_env(&mut self, env: EnvId, worklist: &mut Vec<Gray>) {
        if self.frames.mark(env.0) {
            worklist.push(Gray::Frame(env));
        }
    }

    /// Mark everything a control frame refers to.
    pub fn mark_frame(&mut self, frame: Frame, worklist: &mut Vec<Gray>) {
        match frame {
            Frame::Then {
                consequent,
                alternative,
            } => {
                self.mark_value(consequent, worklist);
                if let Some(alt) = alternative {
                    self.mark_value(alt, worklist);
                }
            }
            Frame::Begin(v)
            | Frame::Apply(v)
            | Frame::ApplyFun(v)
            | Frame::EvalArg(v)
            | Frame::ConsArgs(v) => self.mark_value(v, worklist),
            Frame::SetQ(env) | Frame::RestoreEnv(env) => self.mark_env(env, worklist),
            Frame::Define(_) => {}
        }
    }

    /// Process the mark worklist until everything reachable is marked.
    pub fn process_worklist(&mut self, worklist: &mut Vec<Gray>) {
        while let Some(obj) = worklist.pop() {
            match obj {
                Gray::Pair(id) => {
                    let cell = self.cells.get(id.0);
                    let (car, cdr) = (cell.car, cell.cdr);
                    self.mark_value(car, worklist);
                    self.mark_value(cdr, worklist);
                }
                Gray::Frame(id) => {
                    let frame = self.frames.get(id.0);
                    let (val, next) = (frame.val, frame.next);
                    self.mark_value(val, worklist);
                    if let Some(next) = next {
                        self.mark_env(next, worklist);
                    }
                }
                Gray::Closure(id) => {
                    let clo = self.closures.get(id.0);
                    let (params, body, env) = (clo.params, clo.body, clo.env);
                    self.mark_value(params, worklist);
                    self.mark_value(body, worklist);
                    self.mark_env(env, worklist);
                }
                Gray::Continuation(id) => {
                    let frames = std::mem::take(self.continuations.get_mut(id.0));
                    for &frame in &frames {
                        self.mark_frame(frame, worklist);
                    }
                    *self.continuations.get_mut(id.0) = frames;
                }
            }
        }
    }

    /// Sweep: free every unmarked object (phase 2 of mark-sweep), then
    /// size the next collection interval by the headroom left.
    pub fn sweep(&mut self) {
        self.cells.sweep(|cell| {
            cell.car = Value::Void;
            cell.cdr = Value::Void;
        });
        self.numbers.sweep(|n| *n = Number::Inexact(0.0));
        self.strings.sweep(|s| *s = String::new());
        self.frames.sweep(|_| {});
        self.closures.sweep(|_| {});
        self.continuations.sweep(|frames| *frames = Vec::new());

        let fullest = [
            self.cells.live(),
            self.numbers.live(),
            self.strings.live(),
            self.frames.live(),
            self.closures.live(),
            self.continuations.live(),
        ]
        .into_iter()
        .max()
        .unwrap_or(0);
        let headroom = self.capacity.saturating_sub(fullest);
        self.gc_threshold = (headroom / 2).clamp(1, MAX_GC_THRESHOLD);
        self.allocs_since_gc = 0;
    }
}
