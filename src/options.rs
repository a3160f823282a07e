use std::ffi::OsString;
use std::path::PathBuf;

use crate::eval::MachineConfig;

pub const USAGE: &str = "\
Usage: scm [options] [FILE [-]]
Options:
  -h, --help: Print this help message
  --heap-capacity <objects>: Maximum live objects of each kind (default: 16m)
Load FILE, then exit. A trailing '-' starts the REPL after loading.
With no FILE, start the REPL.";

/// Command-line options of the `scm` binary.
#[derive(Debug, Clone, PartialEq)]
pub struct Options {
    pub help: bool,
    pub heap_capacity: usize,
    pub filename: Option<PathBuf>,
    /// Enter the REPL after loading `filename`.
    pub interactive: bool,
}

impl Options {
    pub fn new() -> Self {
        Options {
            help: false,
            heap_capacity: MachineConfig::default().heap_capacity,
            filename: None,
            interactive: true,
        }
    }

    pub fn parse() -> Result<Self, String> {
        parse_from(std::env::args_os().skip(1).collect())
    }

    pub fn machine_config(&self) -> MachineConfig {
        MachineConfig {
            heap_capacity: self.heap_capacity,
        }
    }
}

impl Default for Options {
    fn default() -> Self {
        Self::new()
    }
}

/// Accepts a plain count or one with a `k`/`m`/`g` suffix.
fn read_uint_from_str(s: &str) -> Result<usize, String> {
    let lower = s.to_ascii_lowercase();
    let (digits, scale) = match lower.chars().last() {
        Some('k') => (&lower[..lower.len() - 1], 1024),
        Some('m') => (&lower[..lower.len() - 1], 1024 * 1024),
        Some('g') => (&lower[..lower.len() - 1], 1024 * 1024 * 1024),
        _ => (&lower[..], 1),
    };
    digits
        .parse::<usize>()
        .map(|n| n * scale)
        .map_err(|_| format!("invalid size: {}", s))
}

pub fn parse_from(argv: Vec<OsString>) -> Result<Options, String> {
    let mut args = pico_args::Arguments::from_vec(argv);
    let mut options = Options::new();

    if args.contains(["-h", "--help"]) {
        options.help = true;
        return Ok(options);
    }

    options.heap_capacity = match args.opt_value_from_str::<_, String>("--heap-capacity") {
        Ok(Some(size)) => read_uint_from_str(&size)?,
        Ok(None) => options.heap_capacity,
        Err(e) => return Err(e.to_string()),
    };

    let rest = args.finish();
    let mut rest = rest.into_iter();
    if let Some(file) = rest.next() {
        let file = PathBuf::from(file);
        if file.as_os_str().to_string_lossy().starts_with('-') {
            return Err(format!("unknown option: {}", file.display()));
        }
        options.filename = Some(file);
        options.interactive = false;
    }
    match rest.next() {
        Some(flag) if flag == "-" => options.interactive = true,
        Some(other) => return Err(format!("unexpected argument: {}", other.to_string_lossy())),
        None => {}
    }
    if let Some(extra) = rest.next() {
        return Err(format!("unexpected argument: {}", extra.to_string_lossy()));
    }
    Ok(options)
}
