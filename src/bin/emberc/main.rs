//! # emberc
//!
//! This binary is the compiler for Ember. It combines the parser, analyzer
//! and C emitter with an external C toolchain into a single application.

mod cli;
mod commands;

use cli::*;

fn main() -> std::process::ExitCode {
    let args = Cli::init();

    let verbosity = if matches!(args.command, Commands::Compile(ref c) if c.verbose) {
        args.verbosity.bumped()
    } else {
        args.verbosity.clone()
    };
    simple_logger::init_with_level((&verbosity).into()).unwrap();

    let result = match &args.command {
        Commands::Compile(compile_args) => commands::compile::compile(compile_args),
        Commands::Check(check_args) => commands::check::check(check_args),
        Commands::Setup => commands::setup::setup().map(|_| 0),
    };

    match result {
        Ok(code) => std::process::ExitCode::from(code as u8),
        Err(err) => {
            log::error!("{err}");
            std::process::ExitCode::from(2)
        }
    }
}
