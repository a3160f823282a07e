//! A little Scheme whose evaluator keeps every piece of control state on an
//! explicit frame stack, so `call/cc` can copy it and replay it later.
//!
//! The pieces, leaf first:
//!
//! - `symbol`: the process-wide intern table
//! - `heap`: arenas for pairs, numbers, strings, frames, closures and continuations
//! - `reader` / `printer`: text to values and back
//! - `env`: chained mutable binding frames
//! - `eval`: the frame-stack machine
//! - `primitives` / `globals`: the intrinsic table and the initial environment
//! - `stream`: the `Console` the host supplies for prompts, output and input
//! - `repl`: load and read-eval-print drivers over a `Console`

pub mod env;
pub mod error;
pub mod eval;
pub mod globals;
pub mod heap;
pub mod number;
pub mod options;
pub mod primitives;
pub mod printer;
pub mod reader;
pub mod repl;
pub mod stream;
pub mod stack;
pub mod symbol;
pub mod value;

pub use error::{Error, SchemeResult};
pub use eval::{Machine, MachineConfig, Step};
pub use value::Value;
