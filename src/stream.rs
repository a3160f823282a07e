use std::collections::VecDeque;
use std::io::{self, BufRead, Write};

use crate::error::SchemeResult;

/// The host side of interactive I/O: where prompts and program output go,
/// and where input lines come from.
pub trait Console {
    /// The next line of input without its terminator, or `None` at end of file.
    fn read_line(&mut self) -> SchemeResult<Option<String>>;
    fn write_text(&mut self, text: &str) -> SchemeResult<()>;
}

/// Standard input and output.
pub struct StdConsole {
    stdin: io::Stdin,
    stdout: io::Stdout,
    eof: bool,
}

impl StdConsole {
    pub fn new() -> Self {
        StdConsole {
            stdin: io::stdin(),
            stdout: io::stdout(),
            eof: false,
        }
    }
}

impl Default for StdConsole {
    fn default() -> Self {
        Self::new()
    }
}

impl Console for StdConsole {
    fn read_line(&mut self) -> SchemeResult<Option<String>> {
        if self.eof {
            return Ok(None);
        }
        let mut line = String::new();
        if self.stdin.lock().read_line(&mut line)? == 0 {
            self.eof = true;
            return Ok(None);
        }
        while line.ends_with('\n') || line.ends_with('\r') {
            line.pop();
        }
        Ok(Some(line))
    }

    fn write_text(&mut self, text: &str) -> SchemeResult<()> {
        let mut out = self.stdout.lock();
        out.write_all(text.as_bytes())?;
        out.flush()?;
        Ok(())
    }
}

/// A console fed from a fixed script, collecting everything written.
#[derive(Default)]
pub struct ScriptConsole {
    lines: VecDeque<String>,
    pub transcript: String,
}

impl ScriptConsole {
    pub fn new(script: &str) -> Self {
        ScriptConsole {
            lines: script.lines().map(str::to_string).collect(),
            transcript: String::new(),
        }
    }
}

impl Console for ScriptConsole {
    fn read_line(&mut self) -> SchemeResult<Option<String>> {
        Ok(self.lines.pop_front())
    }

    fn write_text(&mut self, text: &str) -> SchemeResult<()> {
        self.transcript.push_str(text);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn script_console_replays_lines_then_eof() {
        let mut console = ScriptConsole::new("(+ 1\n2)\n");
        assert_eq!(console.read_line().unwrap().as_deref(), Some("(+ 1"));
        assert_eq!(console.read_line().unwrap().as_deref(), Some("2)"));
        assert_eq!(console.read_line().unwrap(), None);
        assert_eq!(console.read_line().unwrap(), None);
        console.write_text("> ").unwrap();
        console.write_text("3\n").unwrap();
        assert_eq!(console.transcript, "> 3\n");
    }
}
