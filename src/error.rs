use std::path::PathBuf;

use thiserror::Error;

/// Broad failure classes a caller can branch on when deciding whether to
/// abort the whole process or propagate the error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Broken build environment: unreadable or unwritable scratch files,
    /// a toolchain invocation that failed, or toolchain output that does
    /// not match the expected layout.
    Infrastructure,
    /// The toolchain ran, but the evaluated injection address is outside
    /// the plausible target memory range.
    Validation,
}

#[derive(Debug, Clone, Error)]
pub enum CompileError {
    #[error("failed to read assembly source {}: {detail}", .path.display())]
    SourceRead { path: PathBuf, detail: String },
    #[error("failed to write assembly unit {}: {detail}", .path.display())]
    UnitWrite { path: PathBuf, detail: String },
    #[error("failed to run {tool}: {detail}")]
    ToolSpawn { tool: String, detail: String },
    #[error("failed to assemble {}\n{output}", .file.display())]
    Assemble { file: PathBuf, output: String },
    #[error("failed to assemble batch of {count} units\n{output}")]
    AssembleBatch { count: usize, output: String },
    #[error("failed to extract code from {}\n{output}", .object.display())]
    Extract { object: PathBuf, output: String },
    #[error("failed to read compiled output {}: {detail}", .path.display())]
    OutputRead { path: PathBuf, detail: String },
    #[error("no injection address found in {}; object layout does not match the expected toolchain output", .object.display())]
    AddressMissing { object: PathBuf },
    #[error("injection address in {} evaluated to {address:#010x}, which does not start with {expected}, probably an invalid address", .file.display())]
    ImplausibleAddress {
        file: PathBuf,
        address: u32,
        expected: &'static str,
    },
    #[error("batch compile terminated before delivering a result")]
    BatchAborted,
}

impl CompileError {
    #[must_use]
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::ImplausibleAddress { .. } => ErrorClass::Validation,
            _ => ErrorClass::Infrastructure,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{CompileError, ErrorClass};
    use std::path::PathBuf;

    #[test]
    fn implausible_address_is_a_validation_failure() {
        let err = CompileError::ImplausibleAddress {
            file: PathBuf::from("frag.asm"),
            address: 0x7f00_0000,
            expected: "0x80",
        };
        assert_eq!(err.class(), ErrorClass::Validation);
        let text = err.to_string();
        assert!(text.contains("frag.asm"));
        assert!(text.contains("0x7f000000"));
        assert!(text.contains("probably an invalid address"));
    }

    #[test]
    fn toolchain_failures_are_infrastructure() {
        let err = CompileError::AssembleBatch {
            count: 3,
            output: "as: unknown opcode".to_string(),
        };
        assert_eq!(err.class(), ErrorClass::Infrastructure);
        assert!(err.to_string().contains("as: unknown opcode"));
    }
}
