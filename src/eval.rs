use log::{debug, trace};

use crate::env;
use crate::error::{ArityKind, Error, SchemeResult};
use crate::globals;
use crate::heap::Heap;
use crate::primitives::{self, Context, Reply};
use crate::printer::{print_stack, print_val};
use crate::reader::{self, Token};
use crate::stack::{Frame, FrameStack};
use crate::stream::Console;
use crate::symbol::sym;
use crate::value::{EnvId, Value};

/// Library-side configuration of a machine.
#[derive(Clone, Debug)]
pub struct MachineConfig {
    /// Maximum number of live objects of each kind the heap may hold.
    pub heap_capacity: usize,
}

impl Default for MachineConfig {
    fn default() -> Self {
        MachineConfig {
            heap_capacity: 16 * 1024 * 1024,
        }
    }
}

/// How far an evaluation got before handing control back to the host.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Step {
    /// Finished with this value.
    Done(Value),
    /// `read` needs more input: call `supply_input`, then `resume`.
    AwaitInput,
    /// `display` or `newline` wrote output: flush `take_output`, then `resume`.
    Yield,
}

/// Where a suspended evaluation picks up again.
enum Pending {
    /// Continue draining the stack with this result.
    Value(Value),
    /// Retry this call (an input request).
    Call { fun: Value, args: Value },
}

/// What the run loop does next.
enum Control {
    /// Phase A: reduce the current expression.
    Reduce,
    /// Phase B: pop frames with the current result.
    Drain,
    /// The stack is empty; the current result is final.
    Finished,
    Suspend(Step),
}

/// The evaluation machine.
/// All interpreter state lives here: the heap, the global environment,
/// buffered interactive input, pending output and the registers of the
/// evaluation in progress.
pub struct Machine {
    pub heap: Heap,
    pub global: EnvId,
    /// Tokens of interactive input, shared by the REPL and `read`.
    pub input: reader::TokenQueue,
    output: String,

    /// Current expression in Phase A, current result in Phase B.
    exp: Value,
    env: EnvId,
    stack: FrameStack,
    pending: Option<Pending>,
    /// Deepest the frame stack got during the current evaluation.
    max_depth: usize,
}

impl Machine {
    pub fn new(config: MachineConfig) -> SchemeResult<Self> {
        let mut heap = Heap::new(config.heap_capacity);
        let global = globals::build_globals(&mut heap)?;
        Ok(Machine {
            heap,
            global,
            input: reader::TokenQueue::new(),
            output: String::new(),
            exp: Value::Void,
            env: global,
            stack: FrameStack::new(),
            pending: None,
            max_depth: 0,
        })
    }

    // ========================================================================
    // Host interface
    // ========================================================================

    /// Start evaluating an expression in the global environment.
    pub fn evaluate(&mut self, expr: Value) -> SchemeResult<Step> {
        if self.pending.is_some() {
            return Err(Error::Busy);
        }
        self.exp = expr;
        self.env = self.global;
        self.stack.clear();
        self.max_depth = 0;
        self.run(Control::Reduce)
    }

    /// Continue a suspended evaluation exactly where it stopped.
    pub fn resume(&mut self) -> SchemeResult<Step> {
        let pending = self
            .pending
            .take()
            .ok_or_else(|| Error::Internal("no suspended evaluation".into()))?;
        let control = match pending {
            Pending::Value(v) => {
                self.exp = v;
                Ok(Control::Drain)
            }
            Pending::Call { fun, args } => self.apply_function(fun, args),
        };
        match control {
            Ok(control) => self.run(control),
            Err(e) => Err(self.fail(e)),
        }
    }

    /// Hand a line of input to a suspended `read`, or `None` for end of file.
    pub fn supply_input(&mut self, line: Option<&str>) {
        match line {
            Some(text) => self.input.push_text(text),
            None => self.input.set_eof(),
        }
    }

    /// Drain the output written since the last call.
    pub fn take_output(&mut self) -> String {
        std::mem::take(&mut self.output)
    }

    pub fn is_suspended(&self) -> bool {
        self.pending.is_some()
    }

    /// Drop a suspended evaluation without finishing it.
    pub fn abandon(&mut self) {
        self.pending = None;
        self.stack.clear();
        self.env = self.global;
    }

    /// Deepest the frame stack got during the most recent evaluation.
    pub fn max_stack_depth(&self) -> usize {
        self.max_depth
    }

    /// Evaluate to completion with no host attached: output stays buffered
    /// in `take_output` and `read` sees end of file once the buffered
    /// tokens run out.
    pub fn eval(&mut self, expr: Value) -> SchemeResult<Value> {
        let mut step = self.evaluate(expr)?;
        loop {
            match step {
                Step::Done(v) => return Ok(v),
                Step::Yield => {}
                Step::AwaitInput => self.input.set_eof(),
            }
            step = self.resume()?;
        }
    }

    /// Evaluate to completion, flushing output to `console` at every yield
    /// and feeding it input lines whenever `read` asks for them.
    pub fn eval_with(&mut self, expr: Value, console: &mut dyn Console) -> SchemeResult<Value> {
        let mut step = self.evaluate(expr)?;
        loop {
            let out = self.take_output();
            if !out.is_empty() {
                if let Err(e) = console.write_text(&out) {
                    self.abandon();
                    return Err(e);
                }
            }
            match step {
                Step::Done(v) => return Ok(v),
                Step::Yield => {}
                Step::AwaitInput => match console.read_line() {
                    Ok(line) => self.supply_input(line.as_deref()),
                    Err(e) => {
                        self.abandon();
                        return Err(e);
                    }
                },
            }
            step = self.resume()?;
        }
    }

    /// Evaluate each expression of a source unit in order. Returns the
    /// value of the last one, or void for an empty unit.
    pub fn load_source(&mut self, text: &str) -> SchemeResult<Value> {
        self.load_tokens(text, |m, expr| m.eval(expr))
    }

    /// Like `load_source`, with I/O going through `console`.
    pub fn load_source_with(&mut self, text: &str, console: &mut dyn Console) -> SchemeResult<Value> {
        self.load_tokens(text, |m, expr| m.eval_with(expr, console))
    }

    fn load_tokens(
        &mut self,
        text: &str,
        mut eval: impl FnMut(&mut Machine, Value) -> SchemeResult<Value>,
    ) -> SchemeResult<Value> {
        let mut tokens: std::collections::VecDeque<Token> = reader::tokenize(text).into();
        debug!("loading {} tokens", tokens.len());
        let mut result = Value::Void;
        while !tokens.is_empty() {
            let expr = reader::parse_one(&mut tokens, &mut self.heap)?;
            result = eval(self, expr)?;
        }
        Ok(result)
    }

    // ========================================================================
    // The run loop
    // ========================================================================

    fn run(&mut self, mut control: Control) -> SchemeResult<Step> {
        loop {
            // Between steps every live object is reachable from the registers.
            if self.heap.should_gc() {
                self.collect_garbage();
            }
            let next = match control {
                Control::Reduce => self.reduce(),
                Control::Drain => self.drain(),
                Control::Finished => return Ok(Step::Done(self.exp)),
                Control::Suspend(step) => return Ok(step),
            };
            control = match next {
                Ok(c) => c,
                Err(e) => return Err(self.fail(e)),
            };
        }
    }

    /// Mark everything reachable from the registers, the frame stack and
    /// the global environment, then sweep the rest.
    fn collect_garbage(&mut self) {
        let before = self.heap.live_objects();
        let mut worklist = Vec::new();
        self.heap.clear_marks();
        self.heap.mark_value(self.exp, &mut worklist);
        self.heap.mark_env(self.env, &mut worklist);
        self.heap.mark_env(self.global, &mut worklist);
        for &frame in self.stack.frames() {
            self.heap.mark_frame(frame, &mut worklist);
        }
        match self.pending {
            Some(Pending::Value(v)) => self.heap.mark_value(v, &mut worklist),
            Some(Pending::Call { fun, args }) => {
                self.heap.mark_value(fun, &mut worklist);
                self.heap.mark_value(args, &mut worklist);
            }
            None => {}
        }
        self.heap.process_worklist(&mut worklist);
        self.heap.sweep();
        debug!(
            "gc: {} -> {} live objects ({} pairs)",
            before,
            self.heap.live_objects(),
            self.heap.total_cells()
        );
    }

    /// Abort the evaluation. Evaluator faults raised with frames still on
    /// the stack are decorated with a rendering of those frames; guest
    /// errors pass through untouched.
    fn fail(&mut self, e: Error) -> Error {
        let decorate = !e.is_guest() && !matches!(e, Error::Traced { .. }) && !self.stack.is_empty();
        let err = if decorate {
            Error::Traced {
                error: Box::new(e),
                trace: print_stack(self.stack.frames(), &self.heap),
            }
        } else {
            e
        };
        self.abandon();
        err
    }

    fn push(&mut self, frame: Frame) {
        self.stack.push(frame);
        self.max_depth = self.max_depth.max(self.stack.len());
    }

    fn push_restore_env(&mut self) {
        self.stack.push_restore_env(self.env);
        self.max_depth = self.max_depth.max(self.stack.len());
    }

    /// Split a form's operand list into its first element and the rest.
    fn split(&self, list: Value, form: &str) -> SchemeResult<(Value, Value)> {
        match list {
            Value::Pair(id) => Ok((self.heap.car(id), self.heap.cdr(id))),
            _ => Err(Error::Syntax(format!("malformed {}", form))),
        }
    }

    // ========================================================================
    // Phase A: reduce the expression to a value or a pending call
    // ========================================================================

    fn reduce(&mut self) -> SchemeResult<Control> {
        loop {
            let id = match self.exp {
                Value::Pair(id) => id,
                Value::Symbol(name) => {
                    self.exp = env::lookup(&self.heap, self.env, name)?;
                    return Ok(Control::Drain);
                }
                // numbers, strings, booleans and procedures evaluate to themselves
                _ => return Ok(Control::Drain),
            };
            let head = self.heap.car(id);
            let rest = self.heap.cdr(id);

            match head {
                Value::Symbol(s) if s == sym::QUOTE => {
                    let (quoted, _) = self.split(rest, "quote")?;
                    self.exp = quoted;
                    return Ok(Control::Drain);
                }
                Value::Symbol(s) if s == sym::IF => {
                    let (test, branches) = self.split(rest, "if")?;
                    let (consequent, alt) = self.split(branches, "if")?;
                    let alternative = alt.as_pair().map(|a| self.heap.car(a));
                    self.push(Frame::Then {
                        consequent,
                        alternative,
                    });
                    self.exp = test;
                }
                Value::Symbol(s) if s == sym::BEGIN => {
                    if rest.is_nil() {
                        self.exp = Value::Void;
                        return Ok(Control::Drain);
                    }
                    let (first, more) = self.split(rest, "begin")?;
                    if !more.is_nil() {
                        self.push(Frame::Begin(more));
                    }
                    self.exp = first;
                }
                Value::Symbol(s) if s == sym::LAMBDA => {
                    let (params, body) = self.split(rest, "lambda")?;
                    self.exp = self.heap.closure(params, body, self.env)?;
                    return Ok(Control::Drain);
                }
                Value::Symbol(s) if s == sym::DEFINE => {
                    let (target, value) = self.split(rest, "define")?;
                    match target {
                        Value::Symbol(name) => {
                            let (init, _) = self.split(value, "define")?;
                            self.push(Frame::Define(name));
                            self.exp = init;
                        }
                        // (define (name . params) body...)
                        Value::Pair(sig) => {
                            let name = self
                                .heap
                                .car(sig)
                                .as_symbol()
                                .ok_or_else(|| Error::Syntax("malformed define".into()))?;
                            let params = self.heap.cdr(sig);
                            self.push(Frame::Define(name));
                            self.exp = self.heap.closure(params, value, self.env)?;
                            return Ok(Control::Drain);
                        }
                        _ => return Err(Error::Syntax("malformed define".into())),
                    }
                }
                Value::Symbol(s) if s == sym::SETQ => {
                    let (target, value) = self.split(rest, "set!")?;
                    let name = target
                        .as_symbol()
                        .ok_or_else(|| Error::Syntax("malformed set!".into()))?;
                    let binding = env::look_for(&self.heap, self.env, name)?;
                    let (init, _) = self.split(value, "set!")?;
                    self.push(Frame::SetQ(binding));
                    self.exp = init;
                }
                _ => {
                    self.push(Frame::Apply(rest));
                    self.exp = head;
                }
            }
        }
    }

    // ========================================================================
    // Phase B: drain the frame stack with the current result
    // ========================================================================

    fn drain(&mut self) -> SchemeResult<Control> {
        loop {
            let frame = match self.stack.pop() {
                Some(frame) => frame,
                None => return Ok(Control::Finished),
            };
            match frame {
                Frame::Then {
                    consequent,
                    alternative,
                } => {
                    if self.exp.is_false() {
                        match alternative {
                            Some(alt) => {
                                self.exp = alt;
                                return Ok(Control::Reduce);
                            }
                            None => self.exp = Value::Void,
                        }
                    } else {
                        self.exp = consequent;
                        return Ok(Control::Reduce);
                    }
                }
                Frame::Begin(body) => {
                    let (first, more) = self.split(body, "body")?;
                    if !more.is_nil() {
                        self.push(Frame::Begin(more));
                    }
                    self.exp = first;
                    return Ok(Control::Reduce);
                }
                Frame::Define(name) => {
                    env::define(&mut self.heap, self.env, name, self.exp)?;
                    self.exp = Value::Void;
                }
                Frame::SetQ(binding) => {
                    env::assign(&mut self.heap, binding, self.exp);
                    self.exp = Value::Void;
                }
                Frame::Apply(arg_exprs) => {
                    if arg_exprs.is_nil() {
                        match self.apply_function(self.exp, Value::Nil)? {
                            Control::Drain => continue,
                            other => return Ok(other),
                        }
                    }
                    let args = self.heap.list_to_vec(arg_exprs).map_err(|_| {
                        Error::Syntax(format!(
                            "improper argument list: {}",
                            print_val(arg_exprs, &self.heap, true)
                        ))
                    })?;
                    self.push(Frame::ApplyFun(self.exp));
                    for &arg in args[1..].iter().rev() {
                        self.push(Frame::EvalArg(arg));
                    }
                    self.push(Frame::ConsArgs(Value::Nil));
                    self.exp = args[0];
                    return Ok(Control::Reduce);
                }
                Frame::ConsArgs(collected) => {
                    let collected = self.heap.cons(self.exp, collected)?;
                    match self.stack.pop() {
                        Some(Frame::EvalArg(next)) => {
                            self.exp = next;
                            self.push(Frame::ConsArgs(collected));
                            return Ok(Control::Reduce);
                        }
                        Some(Frame::ApplyFun(fun)) => {
                            let args = self.heap.reverse(collected)?;
                            match self.apply_function(fun, args)? {
                                Control::Drain => continue,
                                other => return Ok(other),
                            }
                        }
                        other => {
                            return Err(Error::Internal(format!(
                                "invalid operation after ConsArgs: {:?}",
                                other
                            )))
                        }
                    }
                }
                Frame::RestoreEnv(saved) => self.env = saved,
                Frame::ApplyFun(_) | Frame::EvalArg(_) => {
                    return Err(Error::Internal(format!("invalid operation: {:?}", frame)))
                }
            }
        }
    }

    // ========================================================================
    // Calls
    // ========================================================================

    fn apply_function(&mut self, fun: Value, args: Value) -> SchemeResult<Control> {
        let (mut fun, mut args) = (fun, args);
        loop {
            match fun {
                Value::CallCc => {
                    let [receiver] = self.fixed_args::<1>(fun, args)?;
                    self.push_restore_env();
                    let k = self.heap.continuation(self.stack.snapshot())?;
                    debug!("call/cc captured {} frames", self.stack.len());
                    fun = receiver;
                    args = self.heap.list(&[k])?;
                }
                Value::Apply => {
                    let [target, list] = self.fixed_args::<2>(fun, args)?;
                    if !self.heap.is_proper_list(list) {
                        return Err(Error::Type(format!(
                            "apply: not a list: {}",
                            print_val(list, &self.heap, true)
                        )));
                    }
                    fun = target;
                    args = list;
                }
                _ => break,
            }
        }

        match fun {
            Value::Intrinsic(id) => {
                let intrinsic = primitives::intrinsic(id);
                let argv = self
                    .heap
                    .list_to_vec(args)
                    .map_err(|_| Error::Type("improper argument list".into()))?;
                if !intrinsic.arity.accepts(argv.len()) {
                    let kind = match intrinsic.arity {
                        primitives::Arity::Fixed(n) if argv.len() < n => ArityKind::TooFew,
                        _ => ArityKind::TooMany,
                    };
                    return Err(self.arity_error(fun, args, kind));
                }
                trace!("intrinsic {} with {} args", intrinsic.name, argv.len());
                let mut ctx = Context {
                    heap: &mut self.heap,
                    input: &mut self.input,
                    output: &mut self.output,
                };
                match (intrinsic.fun)(&mut ctx, &argv)? {
                    Reply::Value(v) => {
                        self.exp = v;
                        Ok(Control::Drain)
                    }
                    Reply::Yield => {
                        self.pending = Some(Pending::Value(Value::Void));
                        Ok(Control::Suspend(Step::Yield))
                    }
                    Reply::NeedInput => {
                        self.pending = Some(Pending::Call { fun, args });
                        Ok(Control::Suspend(Step::AwaitInput))
                    }
                }
            }
            Value::Closure(id) => {
                let clo = self.heap.get_closure(id);
                let (params, body, captured) = (clo.params, clo.body, clo.env);
                trace!("apply closure {} at depth {}", id.0, self.stack.len());
                self.push_restore_env();
                let frame = env::bind_params(&mut self.heap, fun, params, args, captured)?;
                if !body.is_nil() {
                    self.push(Frame::Begin(body));
                }
                self.env = frame;
                self.exp = Value::Void;
                Ok(Control::Drain)
            }
            Value::Continuation(id) => {
                self.stack = FrameStack::from_snapshot(self.heap.get_continuation(id));
                debug!("continuation reinstated with {} frames", self.stack.len());
                self.exp = match args {
                    Value::Pair(first) => self.heap.car(first),
                    _ => Value::Void,
                };
                Ok(Control::Drain)
            }
            _ => Err(Error::NotCallable {
                callee: print_val(fun, &self.heap, true),
                args: print_val(args, &self.heap, true),
            }),
        }
    }

    /// Exactly `N` arguments for one of the built-in control procedures.
    fn fixed_args<const N: usize>(&self, fun: Value, args: Value) -> SchemeResult<[Value; N]> {
        let argv = self
            .heap
            .list_to_vec(args)
            .map_err(|_| Error::Type("improper argument list".into()))?;
        if argv.len() != N {
            let kind = if argv.len() < N {
                ArityKind::TooFew
            } else {
                ArityKind::TooMany
            };
            return Err(self.arity_error(fun, args, kind));
        }
        let mut out = [Value::Nil; N];
        out.copy_from_slice(&argv);
        Ok(out)
    }

    fn arity_error(&self, fun: Value, args: Value, kind: ArityKind) -> Error {
        Error::Arity {
            callee: print_val(fun, &self.heap, true),
            args: print_val(args, &self.heap, true),
            kind,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::read_str;

    fn machine() -> Machine {
        Machine::new(MachineConfig {
            heap_capacity: 1 << 22,
        })
        .unwrap()
    }

    fn run(m: &mut Machine, text: &str) -> String {
        match m.load_source(text) {
            Ok(v) => print_val(v, &m.heap, true),
            Err(e) => panic!("{} failed: {}", text, e),
        }
    }

    fn eval_str(text: &str) -> String {
        run(&mut machine(), text)
    }

    fn fails(text: &str) -> Error {
        machine().load_source(text).unwrap_err()
    }

    #[test]
    fn self_evaluating_and_quote() {
        assert_eq!(eval_str("42"), "42");
        assert_eq!(eval_str("\"s\""), "\"s\"");
        assert_eq!(eval_str("#f"), "#f");
        assert_eq!(eval_str("'()"), "()");
        assert_eq!(eval_str("(quote (1 . 2))"), "(1 . 2)");
        assert_eq!(eval_str("'(a (b c) . d)"), "(a (b c) . d)");
    }

    #[test]
    fn arithmetic_and_comparison() {
        assert_eq!(eval_str("(+ 1 2)"), "3");
        assert_eq!(eval_str("(- 1 3)"), "-2");
        assert_eq!(eval_str("(* 6 7)"), "42");
        assert_eq!(eval_str("(+ 0.5 0.5)"), "1.0");
        assert_eq!(eval_str("(+ 1 2.5)"), "3.5");
        assert_eq!(eval_str("(< 1 2)"), "#t");
        assert_eq!(eval_str("(= 2 2.0)"), "#t");
        assert_eq!(
            eval_str("(* 99999999999 99999999999)"),
            "9999999999800000000001"
        );
    }

    #[test]
    fn only_false_is_false() {
        assert_eq!(eval_str("(if '() 1 2)"), "1");
        assert_eq!(eval_str("(if 0 1 2)"), "1");
        assert_eq!(eval_str("(if #f 1 2)"), "2");
        let mut m = machine();
        assert_eq!(m.load_source("(if #f 1)"), Ok(Value::Void));
    }

    #[test]
    fn begin_yields_last_value() {
        assert_eq!(eval_str("(begin 1 2 3)"), "3");
        let mut m = machine();
        assert_eq!(m.load_source("(begin)"), Ok(Value::Void));
        assert_eq!(m.load_source(""), Ok(Value::Void));
    }

    #[test]
    fn define_and_self_recursion() {
        let mut m = machine();
        assert_eq!(m.load_source("(define x 5)"), Ok(Value::Void));
        assert_eq!(run(&mut m, "x"), "5");
        let text = "(define (f n) (if (= n 0) 0 (f (- n 1)))) (f 10)";
        assert_eq!(run(&mut m, text), "0");
    }

    #[test]
    fn set_is_visible_to_closures() {
        let text = "(define x 1) (define (get) x) (set! x 2) (get)";
        assert_eq!(eval_str(text), "2");
    }

    #[test]
    fn set_of_unbound_variable_fails() {
        assert_eq!(fails("(set! nowhere 1)").root(), &Error::Reference("nowhere".into()));
    }

    #[test]
    fn closures_keep_private_state() {
        let text = "
            (define (make-counter)
              (define n 0)
              (lambda () (set! n (+ n 1)) n))
            (define c (make-counter))
            (define d (make-counter))
            (c) (c) (d)
            (list (c) (d))";
        assert_eq!(eval_str(text), "(3 2)");
    }

    #[test]
    fn rest_parameters() {
        assert_eq!(eval_str("((lambda (a . rest) rest) 1 2 3)"), "(2 3)");
        assert_eq!(eval_str("((lambda args args))"), "()");
        assert_eq!(eval_str("(define (f . xs) xs) (f 1 2)"), "(1 2)");
    }

    #[test]
    fn empty_body_is_void() {
        let mut m = machine();
        assert_eq!(m.load_source("((lambda ()))"), Ok(Value::Void));
    }

    #[test]
    fn arguments_are_evaluated_left_to_right() {
        let text = "
            (define trail '())
            (define (note x) (set! trail (cons x trail)) x)
            (list (note 1) (note 2) (note 3))
            trail";
        assert_eq!(eval_str(text), "(3 2 1)");
    }

    #[test]
    fn tail_calls_run_in_constant_stack() {
        let mut m = machine();
        let text = "(define (loop n) (if (= n 0) 'done (loop (- n 1)))) (loop 100000)";
        assert_eq!(run(&mut m, text), "done");
        assert!(m.max_stack_depth() < 20, "depth {}", m.max_stack_depth());

        let text = "(define (even n) (if (= n 0) #t (odd (- n 1))))
                    (define (odd n) (if (= n 0) #f (even (- n 1))))
                    (even 50001)";
        assert_eq!(run(&mut m, text), "#f");
        assert!(m.max_stack_depth() < 20, "depth {}", m.max_stack_depth());
    }

    #[test]
    fn non_tail_recursion_grows_the_stack() {
        let mut m = machine();
        let text = "(define (count n) (if (= n 0) 0 (+ 1 (count (- n 1))))) (count 1000)";
        assert_eq!(run(&mut m, text), "1000");
        assert!(m.max_stack_depth() > 1000);
    }

    #[test]
    fn call_cc_escapes() {
        assert_eq!(eval_str("(+ 1 (call/cc (lambda (k) (+ 10 (k 10)))))"), "11");
        assert_eq!(eval_str("(call/cc (lambda (k) 7))"), "7");
        let mut m = machine();
        assert_eq!(m.load_source("(call/cc (lambda (k) (k)))"), Ok(Value::Void));
    }

    #[test]
    fn continuations_are_multi_shot() {
        let mut m = machine();
        run(&mut m, "(define r #f)");
        assert_eq!(run(&mut m, "(+ 1 (call/cc (lambda (k) (set! r k) 1)))"), "2");
        assert_eq!(run(&mut m, "(r 5)"), "6");
        assert_eq!(run(&mut m, "(r 10)"), "11");
    }

    #[test]
    fn re_entering_a_body_repeats_its_rest() {
        let text = "
            (define again #f)
            (define count 0)
            (begin
              (call/cc (lambda (k) (set! again k)))
              (set! count (+ count 1))
              (if (< count 3) (again 'more) count))";
        assert_eq!(eval_str(text), "3");
    }

    #[test]
    fn continuation_restores_environment() {
        let text = "
            (define saved #f)
            (define (f x) (+ (call/cc (lambda (k) (set! saved k) 0)) x))
            (define first (f 100))
            (define x 1)
            (if (< first 105) (saved 5) first)
            first";
        assert_eq!(eval_str(text), "105");
    }

    #[test]
    fn apply_spreads_a_list() {
        assert_eq!(eval_str("(apply + (list 1 2))"), "3");
        assert_eq!(eval_str("(apply list '(1 2 3))"), "(1 2 3)");
        assert_eq!(eval_str("(apply (lambda (a b) b) '(1 2))"), "2");
        assert_eq!(eval_str("(apply apply (list + '(3 4)))"), "7");
        assert!(matches!(fails("(apply + 1)").root(), Error::Type(_)));
        assert!(matches!(fails("(apply +)").root(), Error::Arity { .. }));
    }

    #[test]
    fn call_cc_through_apply() {
        assert_eq!(eval_str("(+ 1 (apply call/cc (list (lambda (k) (k 2)))))"), "3");
    }

    #[test]
    fn arity_mismatches() {
        let err = fails("((lambda (x y) x) 1)");
        assert!(
            matches!(err.root(), Error::Arity { kind: ArityKind::TooFew, .. }),
            "{:?}",
            err
        );
        let err = fails("((lambda (x) x) 1 2)");
        assert!(matches!(err.root(), Error::Arity { kind: ArityKind::TooMany, .. }));
        let err = fails("(car 1 2)");
        assert!(err.to_string().contains("too many arguments"), "{}", err);
        assert!(matches!(fails("(cons 1)").root(), Error::Arity { kind: ArityKind::TooFew, .. }));
    }

    #[test]
    fn rejected_call_keeps_only_argument_effects() {
        let mut m = machine();
        run(&mut m, "(define t 0)");
        let err = m.load_source("(cons (begin (set! t 1) 1))").unwrap_err();
        assert!(matches!(err.root(), Error::Arity { kind: ArityKind::TooFew, .. }), "{:?}", err);
        assert_eq!(run(&mut m, "t"), "1");
        assert!(m.take_output().is_empty());
    }

    #[test]
    fn unbound_and_uncallable() {
        assert_eq!(fails("nope"), Error::Reference("nope".into()));
        assert!(matches!(fails("(1 2)"), Error::NotCallable { .. }));
        assert!(matches!(fails("(\"f\")"), Error::NotCallable { .. }));
    }

    #[test]
    fn improper_lists() {
        assert_eq!(eval_str("(cons 1 2)"), "(1 . 2)");
        assert_eq!(eval_str("(cons 1 (cons 2 3))"), "(1 2 . 3)");
        assert_eq!(eval_str("(cdr '(1 . 2))"), "2");
        assert!(matches!(fails("(+ . 1)").root(), Error::Syntax(_)));
    }

    #[test]
    fn predicates() {
        assert_eq!(eval_str("(list (pair? '(1)) (pair? '()) (null? '()) (null? 0))"), "(#t #f #t #f)");
        assert_eq!(eval_str("(list (symbol? 'a) (symbol? \"a\") (number? 1) (not #f) (not 0))"), "(#t #f #t #t #f)");
        assert_eq!(eval_str("(list (eq? 'a 'a) (eq? '() '()) (eqv? 1 1) (eqv? 1 2))"), "(#t #t #t #f)");
        assert_eq!(eval_str("(define p '(1)) (eq? p p)"), "#t");
        assert_eq!(eval_str("(eq? (list 1) (list 1))"), "#f");
    }

    #[test]
    fn eq_sees_equal_numbers_and_strings() {
        assert_eq!(eval_str("(list (eq? 1 1) (eq? (+ 1 1) 2) (eq? \"a\" \"a\") (eq? 1 1.0))"), "(#t #t #t #f)");
        let text = "(define (f n) (if (eq? n 0) 'done (f (- n 1)))) (f 3)";
        assert_eq!(eval_str(text), "done");
    }

    #[test]
    fn guest_errors_are_not_decorated() {
        let err = fails("(error \"bad thing\" '(1 \"two\"))");
        assert_eq!(
            err,
            Error::Guest {
                reason: "bad thing".into(),
                irritant: "(1 \"two\")".into()
            }
        );
        assert_eq!(err.to_string(), "bad thing: (1 \"two\")");
        let err = fails("(+ 1 (error \"oops\" 5))");
        assert!(err.is_guest(), "{:?}", err);
    }

    #[test]
    fn evaluator_errors_carry_the_stack() {
        let err = fails("(+ 1 (car 5))");
        match &err {
            Error::Traced { error, trace } => {
                assert!(matches!(**error, Error::Type(_)));
                assert!(trace.contains("ApplyFun"), "{}", trace);
            }
            other => panic!("expected a traced error, got {:?}", other),
        }
        assert!(err.to_string().contains("\n\t"));
        // nothing pending: the top-level failure has an empty stack
        assert!(matches!(fails("(car 5)"), Error::Type(_)));
    }

    #[test]
    fn errors_leave_the_machine_usable() {
        let mut m = machine();
        run(&mut m, "(define x 1)");
        assert!(m.load_source("(+ 1 (car 5))").is_err());
        assert!(!m.is_suspended());
        assert_eq!(run(&mut m, "(+ x 1)"), "2");
    }

    #[test]
    fn display_and_newline_yield() {
        let mut m = machine();
        let expr = read_str("(begin (display \"a\") (display 'b) (newline) 1)", &mut m.heap).unwrap();
        assert_eq!(m.evaluate(expr), Ok(Step::Yield));
        assert_eq!(m.take_output(), "a");
        assert_eq!(m.resume(), Ok(Step::Yield));
        assert_eq!(m.take_output(), "b");
        assert_eq!(m.resume(), Ok(Step::Yield));
        assert_eq!(m.take_output(), "\n");
        let done = m.resume().unwrap();
        match done {
            Step::Done(v) => assert_eq!(print_val(v, &m.heap, true), "1"),
            other => panic!("{:?}", other),
        }
        assert!(m.resume().is_err());
    }

    #[test]
    fn read_suspends_until_input_arrives() {
        let mut m = machine();
        let expr = read_str("(cons 'got (read))", &mut m.heap).unwrap();
        assert_eq!(m.evaluate(expr), Ok(Step::AwaitInput));
        let other = read_str("1", &mut m.heap).unwrap();
        assert_eq!(m.evaluate(other), Err(Error::Busy));

        m.supply_input(Some("(a"));
        assert_eq!(m.resume(), Ok(Step::AwaitInput));
        m.supply_input(Some("b)"));
        match m.resume().unwrap() {
            Step::Done(v) => assert_eq!(print_val(v, &m.heap, true), "(got a b)"),
            other => panic!("{:?}", other),
        }
    }

    #[test]
    fn read_at_end_of_input() {
        let mut m = machine();
        assert_eq!(m.load_source("(read)"), Ok(Value::Eof));
        assert_eq!(eval_str("(eof-object? (read))"), "#t");
    }

    #[test]
    fn display_output_is_buffered_by_eval() {
        let mut m = machine();
        run(&mut m, "(define (show x) (display x) (newline)) (show \"hi\") (show '(1 \"s\"))");
        assert_eq!(m.take_output(), "hi\n(1 s)\n");
    }

    #[test]
    fn globals_lists_definitions() {
        let mut m = machine();
        let out = run(&mut m, "(define zzz 1) (globals)");
        assert!(out.contains("zzz"), "{}", out);
        assert!(out.contains("call/cc"), "{}", out);
        assert!(out.contains("car"), "{}", out);
    }

    #[test]
    fn heap_overflow_is_reported() {
        let mut m = Machine::new(MachineConfig { heap_capacity: 2000 }).unwrap();
        let text = "(define (build n acc) (if (= n 0) acc (build (- n 1) (cons n acc))))
                    (build 100000 '())";
        assert_eq!(m.load_source(text).unwrap_err().root(), &Error::HeapOverflow);
    }

    #[test]
    fn tail_loop_outlives_the_heap_capacity() {
        let mut m = Machine::new(MachineConfig { heap_capacity: 5000 }).unwrap();
        let text = "(define (loop n) (if (= n 0) 'done (loop (- n 1)))) (loop 100000)";
        assert_eq!(run(&mut m, text), "done");
        assert!(m.heap.live_objects() < 5000);
    }

    #[test]
    fn collection_keeps_reachable_state() {
        let mut m = Machine::new(MachineConfig { heap_capacity: 5000 }).unwrap();
        run(&mut m, "(define r #f)");
        run(&mut m, "(define (make-counter) (define n 0) (lambda () (set! n (+ n 1)) n))");
        run(&mut m, "(define c (make-counter))");
        run(&mut m, "(define keep (list \"kept\" 1.5 'x))");
        assert_eq!(run(&mut m, "(+ 1 (call/cc (lambda (k) (set! r k) (c) 1)))"), "2");
        run(&mut m, "(define (loop n) (if (= n 0) 'done (loop (- n 1))))");
        assert_eq!(run(&mut m, "(loop 20000)"), "done");
        assert_eq!(run(&mut m, "(r 41)"), "42");
        assert_eq!(run(&mut m, "(c)"), "2");
        assert_eq!(run(&mut m, "keep"), "(\"kept\" 1.5 x)");
    }

    #[test]
    fn procedures_print() {
        assert!(eval_str("(lambda (x) x)").starts_with("#<"));
        assert_eq!(eval_str("call/cc"), "#<call/cc>");
        assert_eq!(eval_str("apply"), "#<apply>");
        assert!(eval_str("car").starts_with("$<car"));
    }
}
