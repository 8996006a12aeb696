mod commands;

use crate::commands::Sinklog;
use clap::Parser;
use std::process::ExitCode;
use yansi::Paint;

fn main() -> ExitCode {
    let sinklog = Sinklog::parse();

    match sinklog.run() {
        Err(err) => {
            let root = err.root_cause();

            eprintln!("{}", format!("Error: {}", err).red());
            eprintln!();
            eprintln!("{}", "Caused by:".red());
            eprintln!("{}", format!("  {}", root).red());
            ExitCode::from(1)
        }
        Ok(_) => ExitCode::from(0),
    }
}
