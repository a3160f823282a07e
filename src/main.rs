use std::time::Instant;

use log::info;

use scm::eval::Machine;
use scm::options::{Options, USAGE};
use scm::repl::{Session, StdConsole};

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let options = match Options::parse() {
        Ok(options) => options,
        Err(e) => {
            eprintln!("{}", e);
            eprintln!("Try 'scm --help' for usage information.");
            std::process::exit(2);
        }
    };
    if options.help {
        println!("{}", USAGE);
        return;
    }

    let machine = match Machine::new(options.machine_config()) {
        Ok(machine) => machine,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    };
    let mut session = Session::new(machine, StdConsole::new());

    if let Some(path) = &options.filename {
        let start = Instant::now();
        if let Err(e) = session.load_file(path) {
            eprintln!("Error loading {}: {}", path.display(), e);
            std::process::exit(1);
        }
        info!(
            "loaded {} in {:.2}s ({} live objects, {} symbols interned)",
            path.display(),
            start.elapsed().as_secs_f64(),
            session.machine.heap.live_objects(),
            scm::symbol::count()
        );
    }

    if options.interactive {
        if let Err(e) = session.run_repl() {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    }
}
