//! The external C toolchain collaborator. Everything this
//! module touches past "build an argument list and hand it to a process" is
//! explicitly out of scope — compilers, linkers and their myriad flags are
//! not this crate's concern — so the actual `Command` invocation sits
//! behind a trait, keeping the process boundary narrow and swappable for
//! tests instead of inlining it into the caller.

use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Command;

/// How the produced artifact should be linked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LinkMode {
    #[default]
    Executable,
    Shared,
    Static,
}

/// Optimization intent, passed through to the flag string rather than
/// interpreted here — this crate doesn't know what `-O3` means, only that
/// the CLI surface has a `--release`/`--maximum-performance` axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OptLevel {
    #[default]
    Debug,
    Release,
    MaximumPerformance,
}

/// One toolchain invocation: a C source file in, a destination artifact
/// out, plus whatever flags the CLI/config layer assembled.
#[derive(Debug, Clone)]
pub struct BuildRequest {
    pub cc: String,
    pub cflags: String,
    pub source: PathBuf,
    pub destination: PathBuf,
    pub link_mode: LinkMode,
    pub opt_level: OptLevel,
}

/// What a toolchain invocation produced.
#[derive(Debug, Clone)]
pub struct BuildArtifact {
    pub path: PathBuf,
    pub executable: bool,
}

#[derive(Debug, Clone)]
pub struct ToolchainError {
    pub message: String,
}

impl fmt::Display for ToolchainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for ToolchainError {}

/// The narrow seam between this crate and an actual C compiler. Production
/// code uses [`ProcessToolchain`]; tests substitute a fake that records the
/// requests it was asked to run instead of spawning a real `cc`.
pub trait Toolchain {
    fn build(&self, request: &BuildRequest) -> Result<BuildArtifact, ToolchainError>;
}

/// Turn a [`BuildRequest`] into the argument list a real `cc`-compatible
/// driver would accept, without running anything — kept separate from
/// [`ProcessToolchain::build`] so the flag assembly itself is unit-testable
/// without a compiler installed.
pub fn assemble_args(request: &BuildRequest) -> Vec<String> {
    let mut args = vec![request.source.to_string_lossy().to_string()];

    match request.opt_level {
        OptLevel::Debug => args.push("-O0".to_string()),
        OptLevel::Release => args.push("-O2".to_string()),
        OptLevel::MaximumPerformance => args.push("-O3".to_string()),
    }

    match request.link_mode {
        LinkMode::Executable => {}
        LinkMode::Shared => args.push("-shared".to_string()),
        LinkMode::Static => args.push("-static".to_string()),
    }

    if !request.cflags.trim().is_empty() {
        args.extend(request.cflags.split_whitespace().map(str::to_string));
    }

    args.push("-o".to_string());
    args.push(request.destination.to_string_lossy().to_string());
    args
}

/// Drives a real external C compiler as a subprocess.
pub struct ProcessToolchain;

impl Toolchain for ProcessToolchain {
    fn build(&self, request: &BuildRequest) -> Result<BuildArtifact, ToolchainError> {
        let args = assemble_args(request);
        let output = Command::new(&request.cc)
            .args(&args)
            .output()
            .map_err(|e| ToolchainError {
                message: format!("failed to invoke '{}': {e}", request.cc),
            })?;

        if !output.status.success() {
            return Err(ToolchainError {
                message: format!(
                    "'{}' exited with status {:?}:\n{}",
                    request.cc,
                    output.status.code(),
                    String::from_utf8_lossy(&output.stderr)
                ),
            });
        }

        Ok(BuildArtifact {
            path: request.destination.clone(),
            executable: matches!(request.link_mode, LinkMode::Executable),
        })
    }
}

/// Path `Path::exists`-based sanity check so CLI-level integration tests
/// can confirm a build actually left something behind without hardcoding a
/// filesystem layout in the test itself.
pub fn artifact_exists(artifact: &BuildArtifact) -> bool {
    artifact.path.exists()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> BuildRequest {
        BuildRequest {
            cc: "cc".to_string(),
            cflags: String::new(),
            source: PathBuf::from("out.c"),
            destination: PathBuf::from("out"),
            link_mode: LinkMode::Executable,
            opt_level: OptLevel::Debug,
        }
    }

    #[test]
    fn release_requests_O2() {
        let mut req = request();
        req.opt_level = OptLevel::Release;
        let args = assemble_args(&req);
        assert!(args.contains(&"-O2".to_string()));
    }

    #[test]
    fn shared_link_mode_adds_the_shared_flag() {
        let mut req = request();
        req.link_mode = LinkMode::Shared;
        let args = assemble_args(&req);
        assert!(args.contains(&"-shared".to_string()));
    }

    #[test]
    fn cflags_are_split_on_whitespace_and_appended() {
        let mut req = request();
        req.cflags = "-Wall -Wextra".to_string();
        let args = assemble_args(&req);
        assert!(args.contains(&"-Wall".to_string()));
        assert!(args.contains(&"-Wextra".to_string()));
    }

    struct FakeToolchain {
        last: std::cell::RefCell<Option<BuildRequest>>,
    }

    impl Toolchain for FakeToolchain {
        fn build(&self, request: &BuildRequest) -> Result<BuildArtifact, ToolchainError> {
            *self.last.borrow_mut() = Some(request.clone());
            Ok(BuildArtifact {
                path: request.destination.clone(),
                executable: true,
            })
        }
    }

    #[test]
    fn a_fake_toolchain_can_stand_in_for_a_real_compiler() {
        let fake = FakeToolchain { last: std::cell::RefCell::new(None) };
        let artifact = fake.build(&request()).expect("build");
        assert!(artifact.executable);
        assert!(fake.last.borrow().is_some());
    }
}
