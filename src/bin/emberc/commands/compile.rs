use std::error::Error;
use std::fs;

use log::{error, info};

use emberc::toolchain::{
    BuildArtifact, BuildRequest, LinkMode, OptLevel, ProcessToolchain, Toolchain, ToolchainError,
};
use emberc::{cache, config::Config};

use crate::cli::CompileArgs;

/// Exit codes per : 0 success, 1 compilation error
/// (lex/parse/analyze/emit), 2 external-toolchain failure.
pub fn compile(args: &CompileArgs) -> Result<i32, Box<dyn Error>> {
    let file = fs::canonicalize(&args.file)?;

    let output = match emberc::compile_file(&file) {
        Ok(output) => output,
        Err(err) => {
            error!("{err}");
            return Ok(1);
        }
    };

    for diagnostic in output.diagnostics.iter() {
        eprintln!("{diagnostic}");
    }

    let project_root = file.parent().unwrap_or(&file).to_path_buf();
    let config = Config::load_from_dir(&project_root).unwrap_or_else(|err| {
        error!("{err}");
        Config::empty()
    });

    let cc = config.resolve_cc(args.cc.as_deref());
    let cflags = config.resolve_cflags(args.cflags.as_deref());

    let link_mode = if args.shared {
        LinkMode::Shared
    } else if args.static_ {
        LinkMode::Static
    } else {
        LinkMode::Executable
    };
    let opt_level = if args.maximum_performance {
        OptLevel::MaximumPerformance
    } else if args.release {
        OptLevel::Release
    } else {
        OptLevel::Debug
    };

    let hash = cache::compute_hash(&output.c_source, &cc, &cflags);
    let c_source = cache::embed_hash_header(&output.c_source, &hash);

    let destination = args
        .output
        .clone()
        .unwrap_or_else(|| file.with_extension(""));

    if !args.no_cache && cache::is_fresh(&destination, &hash) {
        info!("'{}' is up to date, skipping the C toolchain", destination.display());
        return Ok(0);
    }

    let cfile = match &args.cfile {
        Some(path) => path.clone(),
        None => std::env::temp_dir().join(format!("emberc-{hash}.c")),
    };
    fs::write(&cfile, &c_source)?;

    let request = BuildRequest {
        cc,
        cflags,
        source: cfile.clone(),
        destination: destination.clone(),
        link_mode,
        opt_level,
    };

    let toolchain = ProcessToolchain;
    match toolchain.build(&request) {
        Ok(artifact) => {
            report_success(&artifact);
            let _ = cache::record_hash(&destination, &hash);
            Ok(0)
        }
        Err(err) => {
            report_toolchain_error(&err);
            Ok(2)
        }
    }
}

fn report_success(artifact: &BuildArtifact) {
    info!("built '{}'", artifact.path.display());
}

fn report_toolchain_error(err: &ToolchainError) {
    error!("{err}");
}
