use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus};

use crate::error::CompileError;

pub const AS_COMMAND: &str = "powerpc-eabi-as";
pub const OBJCOPY_COMMAND: &str = "powerpc-eabi-objcopy";

/// Flags selecting 32-bit mode, big-endian output, named-register syntax
/// and the Gekko CPU variant. Every assembler invocation starts here.
pub const AS_BASE_ARGS: [&str; 4] = ["-a32", "-mbig", "-mregnames", "-mgekko"];

pub const UNIT_EXTENSION: &str = "asmtemp";
pub const CODE_EXTENSION: &str = "out";
pub const BATCH_OBJECT_NAME: &str = "compiled.elf";

/// Names of the external tools. Overridable so embedders and tests can
/// point at alternate builds; the defaults are the fixed toolchain names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toolchain {
    pub as_command: String,
    pub objcopy_command: String,
}

impl Default for Toolchain {
    fn default() -> Self {
        Self {
            as_command: AS_COMMAND.to_string(),
            objcopy_command: OBJCOPY_COMMAND.to_string(),
        }
    }
}

/// Everything a compile needs besides the request itself: the project
/// root (include path and home of the shared batch object), an optional
/// `-defsym NAME=VALUE` definition, and the tool names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileConfig {
    pub project_root: PathBuf,
    pub defsym: Option<String>,
    pub toolchain: Toolchain,
}

impl CompileConfig {
    #[must_use]
    pub fn new(project_root: impl Into<PathBuf>) -> Self {
        Self {
            project_root: project_root.into(),
            defsym: None,
            toolchain: Toolchain::default(),
        }
    }
}

/// Runs one external tool and captures stdout and stderr together, the
/// way the toolchain's diagnostics are meant to be read. A tool that
/// cannot be started at all is distinct from one that ran and failed;
/// callers turn a failing exit status into their own error.
pub(crate) fn run_captured(
    command: &str,
    args: &[OsString],
) -> Result<(ExitStatus, String), CompileError> {
    let output = Command::new(command)
        .args(args)
        .output()
        .map_err(|err| CompileError::ToolSpawn {
            tool: command.to_string(),
            detail: err.to_string(),
        })?;

    let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
    combined.push_str(&String::from_utf8_lossy(&output.stderr));
    Ok((output.status, combined))
}

/// Directory of a fragment, for `-I` include resolution. A bare file
/// name resolves to the current directory.
pub(crate) fn fragment_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// Removes the wrapped scratch path on drop. Removal is best-effort: a
/// file that was never created, or a failing removal, never masks the
/// error that unwound past the guard.
#[derive(Debug)]
pub(crate) struct ScratchFile {
    path: PathBuf,
}

impl ScratchFile {
    pub(crate) fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl Drop for ScratchFile {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}

#[cfg(test)]
mod tests {
    use super::{fragment_dir, run_captured, ScratchFile, Toolchain};
    use std::fs;
    use std::path::{Path, PathBuf};

    #[test]
    fn default_toolchain_uses_the_powerpc_eabi_names() {
        let tools = Toolchain::default();
        assert_eq!(tools.as_command, "powerpc-eabi-as");
        assert_eq!(tools.objcopy_command, "powerpc-eabi-objcopy");
    }

    #[test]
    fn fragment_dir_falls_back_to_current_directory() {
        assert_eq!(fragment_dir(Path::new("frag.asm")), PathBuf::from("."));
        assert_eq!(
            fragment_dir(Path::new("codes/frag.asm")),
            PathBuf::from("codes")
        );
    }

    #[test]
    fn scratch_file_removes_its_path_on_drop() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("unit.asmtemp");
        fs::write(&path, "nop\n").expect("write scratch");

        drop(ScratchFile::new(path.clone()));
        assert!(!path.exists());

        // A path that was never created is fine too.
        drop(ScratchFile::new(dir.path().join("absent.out")));
    }

    #[test]
    fn missing_tool_reports_a_spawn_failure() {
        let err = run_captured("gekkoasm-no-such-tool", &[]).expect_err("spawn must fail");
        assert!(err.to_string().contains("gekkoasm-no-such-tool"));
    }
}
