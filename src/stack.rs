use crate::value::{EnvId, SymbolId, Value};

/// One pending step of the evaluator. The frame stack is the whole of the
/// evaluator's control state, so capturing a continuation is just copying
/// a `Vec<Frame>`.
#[derive(Clone, Copy, Debug)]
pub enum Frame {
    /// Pending `if`: the consequent and the optional alternative.
    Then {
        consequent: Value,
        alternative: Option<Value>,
    },
    /// Pending sequence: the expressions still to evaluate.
    Begin(Value),
    /// Bind the symbol once the value is ready.
    Define(SymbolId),
    /// Overwrite this binding once the value is ready.
    SetQ(EnvId),
    /// Operator is being evaluated; these are the unevaluated arguments.
    Apply(Value),
    /// All arguments are in; call this operator.
    ApplyFun(Value),
    /// Evaluate this argument next.
    EvalArg(Value),
    /// Arguments evaluated so far, most recent first.
    ConsArgs(Value),
    /// Switch back to this environment on return.
    RestoreEnv(EnvId),
}

impl Frame {
    /// Operation name used when rendering a stack.
    pub fn name(&self) -> &'static str {
        match self {
            Frame::Then { .. } => "Then",
            Frame::Begin(_) => "Begin",
            Frame::Define(_) => "Define",
            Frame::SetQ(_) => "SetQ",
            Frame::Apply(_) => "Apply",
            Frame::ApplyFun(_) => "ApplyFun",
            Frame::EvalArg(_) => "EvalArg",
            Frame::ConsArgs(_) => "ConsArgs",
            Frame::RestoreEnv(_) => "RestoreEnv",
        }
    }
}

/// LIFO sequence of control frames.
#[derive(Clone, Default)]
pub struct FrameStack {
    frames: Vec<Frame>,
}

impl FrameStack {
    pub fn new() -> Self {
        FrameStack { frames: Vec::new() }
    }

    /// Rebuild a stack from a captured snapshot.
    pub fn from_snapshot(frames: &[Frame]) -> Self {
        FrameStack {
            frames: frames.to_vec(),
        }
    }

    /// A structural copy of the current frames, independent of later pushes
    /// and pops.
    pub fn snapshot(&self) -> Vec<Frame> {
        self.frames.clone()
    }

    pub fn push(&mut self, frame: Frame) {
        self.frames.push(frame);
    }

    pub fn pop(&mut self) -> Option<Frame> {
        self.frames.pop()
    }

    /// Push RestoreEnv unless the top already is one. A call in tail
    /// position finds the caller's RestoreEnv on top and must not grow the
    /// stack.
    pub fn push_restore_env(&mut self, env: EnvId) {
        if let Some(Frame::RestoreEnv(_)) = self.frames.last() {
            return;
        }
        self.frames.push(Frame::RestoreEnv(env));
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn clear(&mut self) {
        self.frames.clear();
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }
}
