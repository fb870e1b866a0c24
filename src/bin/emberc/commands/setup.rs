use std::error::Error;

use log::info;

/// Placeholder subcommand — there is no bundled runtime library to install
/// yet.
pub fn setup() -> Result<(), Box<dyn Error>> {
    info!("nothing to set up yet");
    Ok(())
}
