use std::path::Path;

use log::{debug, warn};

use crate::error::{Error, SchemeResult};
use crate::eval::Machine;
use crate::printer::print_val;
use crate::value::Value;

pub use crate::stream::{Console, ScriptConsole, StdConsole};

pub const PROMPT: &str = "> ";
pub const CONTINUATION_PROMPT: &str = "| ";
pub const FAREWELL: &str = "Goodbye\n";

/// A machine wired to a console.
pub struct Session<C: Console> {
    pub machine: Machine,
    pub console: C,
}

impl<C: Console> Session<C> {
    pub fn new(machine: Machine, console: C) -> Self {
        Session { machine, console }
    }

    /// Evaluate every expression of a source file. Stops at the first error.
    pub fn load_file(&mut self, path: &Path) -> SchemeResult<Value> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::Io(format!("{}: {}", path.display(), e)))?;
        debug!("loading {}", path.display());
        self.load_str(&text)
    }

    pub fn load_str(&mut self, text: &str) -> SchemeResult<Value> {
        self.machine.load_source_with(text, &mut self.console)
    }

    /// Read the next expression, prompting and pulling lines from the
    /// console until one is complete. `None` at end of input.
    pub fn read_expression(&mut self) -> SchemeResult<Option<Value>> {
        loop {
            let fresh = self.machine.input.is_empty();
            match self.machine.input.read_expression(&mut self.machine.heap) {
                Ok(expr) => return Ok(Some(expr)),
                Err(Error::EndOfInput) => {
                    self.console
                        .write_text(if fresh { PROMPT } else { CONTINUATION_PROMPT })?;
                    match self.console.read_line()? {
                        Some(line) => self.machine.input.push_text(&line),
                        None => return Ok(None),
                    }
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Read, evaluate and print until the console runs dry. Errors are
    /// reported and the loop carries on.
    pub fn run_repl(&mut self) -> SchemeResult<()> {
        loop {
            let result = match self.read_expression() {
                Ok(Some(expr)) => self.machine.eval_with(expr, &mut self.console).map(Some),
                Ok(None) => Ok(None),
                Err(e) => Err(e),
            };
            match result {
                Ok(None) => {
                    self.console.write_text(FAREWELL)?;
                    return Ok(());
                }
                Ok(Some(Value::Void)) => {}
                Ok(Some(val)) => {
                    let text = print_val(val, &self.machine.heap, true);
                    self.console.write_text(&text)?;
                    self.console.write_text("\n")?;
                }
                Err(Error::Io(msg)) => {
                    warn!("console failure: {}", msg);
                    return Err(Error::Io(msg));
                }
                Err(e) => {
                    self.console.write_text(&e.to_string())?;
                    self.console.write_text("\n")?;
                }
            }
        }
    }
}
