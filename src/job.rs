use std::path::PathBuf;

use crossbeam_channel::{Receiver, Sender};

use crate::error::CompileError;

/// One fragment to assemble plus the expression the assembler evaluates
/// to its injection address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileRequest {
    pub source_path: PathBuf,
    pub address_expr: String,
}

impl CompileRequest {
    #[must_use]
    pub fn new(source_path: impl Into<PathBuf>, address_expr: impl Into<String>) -> Self {
        Self {
            source_path: source_path.into(),
            address_expr: address_expr.into(),
        }
    }
}

/// Assembled machine code plus the resolved injection address as an
/// 8-character lowercase hex string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileResult {
    pub code: Vec<u8>,
    pub address: String,
}

impl CompileResult {
    pub(crate) fn from_code_and_address(code: Vec<u8>, address: [u8; 4]) -> Self {
        Self {
            code,
            address: format!("{:08x}", u32::from_be_bytes(address)),
        }
    }
}

pub type CompileReply = Result<CompileResult, CompileError>;

/// A queued request together with the sending half of its one-shot
/// response channel. The scheduler owns the job until a dispatch takes
/// it; whichever path runs the job writes the channel exactly once.
#[derive(Debug)]
pub struct CompileJob {
    pub request: CompileRequest,
    response: Sender<CompileReply>,
}

impl CompileJob {
    #[must_use]
    pub fn new(request: CompileRequest) -> (Self, Receiver<CompileReply>) {
        let (response, receiver) = crossbeam_channel::bounded(1);
        (Self { request, response }, receiver)
    }

    /// Delivers the job's result. A caller that has already gone away is
    /// ignored; the reply has nowhere else to go.
    pub fn deliver(&self, reply: CompileReply) {
        let _ = self.response.send(reply);
    }
}
