use std::error::Error;
use std::fs;

use crate::cli::CheckArgs;

/// Type-check only, no C emission or toolchain invocation. Exit 0 if no
/// diagnostic reached error severity, 1 otherwise.
pub fn check(args: &CheckArgs) -> Result<i32, Box<dyn Error>> {
    let file = fs::canonicalize(&args.file)?;

    match emberc::check_file(&file) {
        Ok(diagnostics) => {
            for diagnostic in diagnostics.iter() {
                eprintln!("{diagnostic}");
            }
            Ok(0)
        }
        Err(err) => {
            eprintln!("{err}");
            Ok(1)
        }
    }
}
