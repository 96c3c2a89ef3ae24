use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::CompileError;
use crate::job::{CompileJob, CompileRequest, CompileResult};
use crate::toolchain::{
    fragment_dir, run_captured, CompileConfig, ScratchFile, AS_BASE_ARGS, BATCH_OBJECT_NAME,
    CODE_EXTENSION, UNIT_EXTENSION,
};
use crate::unit::write_unit;

/// Runs one dispatched batch to completion, answering every job's reply
/// channel exactly once.
///
/// All fragments are assembled in a single invocation into a shared
/// object under the project root, each inside its own named section, then
/// every section is dumped back out next to its fragment in a single
/// objcopy invocation. A fragment whose unit cannot be written fails
/// alone and drops out of the batch; a failure in either shared
/// invocation fails every job still in it.
pub fn run_batch(config: &CompileConfig, jobs: Vec<CompileJob>) {
    if jobs.is_empty() {
        return;
    }

    let object_path = config.project_root.join(BATCH_OBJECT_NAME);
    let _object_guard = ScratchFile::new(object_path.clone());

    let mut unit_guards = Vec::with_capacity(jobs.len());
    let mut live: Vec<(usize, &CompileJob)> = Vec::with_capacity(jobs.len());
    for (index, job) in jobs.iter().enumerate() {
        let unit_path = job.request.source_path.with_extension(UNIT_EXTENSION);
        unit_guards.push(ScratchFile::new(unit_path.clone()));
        let built = write_unit(
            &job.request.source_path,
            &job.request.address_expr,
            &unit_path,
            Some(&section_tag(index)),
        );
        match built {
            Ok(()) => live.push((index, job)),
            Err(err) => job.deliver(Err(err)),
        }
    }
    if live.is_empty() {
        return;
    }

    // Section dumps land next to their fragments; the guards also cover a
    // dispatch that dies before the dump happens.
    let mut code_guards = Vec::with_capacity(live.len());
    let mut sections = Vec::with_capacity(live.len());
    for (index, job) in &live {
        let code_path = job.request.source_path.with_extension(CODE_EXTENSION);
        code_guards.push(ScratchFile::new(code_path.clone()));
        sections.push((section_tag(*index), code_path));
    }

    if let Err(err) = assemble_and_extract(config, &object_path, &live, &sections) {
        for (_, job) in &live {
            job.deliver(Err(err.clone()));
        }
        return;
    }

    for ((_, job), (_, code_path)) in live.iter().zip(&sections) {
        let reply = match fs::read(code_path) {
            Ok(contents) => split_dump(contents, &job.request.source_path, code_path),
            Err(err) => Err(CompileError::OutputRead {
                path: code_path.clone(),
                detail: err.to_string(),
            }),
        };
        job.deliver(reply);
    }
}

/// The shared stages of a dispatch: one assembler invocation over every
/// live unit, then one objcopy invocation dumping each tagged section.
fn assemble_and_extract(
    config: &CompileConfig,
    object_path: &Path,
    live: &[(usize, &CompileJob)],
    sections: &[(String, PathBuf)],
) -> Result<(), CompileError> {
    let requests: Vec<&CompileRequest> = live.iter().map(|(_, job)| &job.request).collect();
    let args = assemble_args(config, &requests, object_path);
    let (status, output) = run_captured(&config.toolchain.as_command, &args)?;
    if !status.success() {
        return Err(CompileError::AssembleBatch {
            count: live.len(),
            output,
        });
    }

    let args = extract_args(object_path, sections);
    let (status, output) = run_captured(&config.toolchain.objcopy_command, &args)?;
    if !status.success() {
        return Err(CompileError::Extract {
            object: object_path.to_path_buf(),
            output,
        });
    }
    Ok(())
}

/// Section name a fragment assembles into, by its position in the batch.
#[must_use]
pub(crate) fn section_tag(index: usize) -> String {
    format!("file{index}")
}

/// Argument list for a combined assembly. `-W` quiets warnings that the
/// fragments, written as standalone files, would otherwise trip over
/// each other. Includes resolve against the project root first, then
/// each distinct fragment directory in batch order.
#[must_use]
pub(crate) fn assemble_args(
    config: &CompileConfig,
    requests: &[&CompileRequest],
    object_path: &Path,
) -> Vec<OsString> {
    let mut args: Vec<OsString> = AS_BASE_ARGS.iter().map(OsString::from).collect();
    args.push(OsString::from("-W"));
    if let Some(defsym) = &config.defsym {
        args.push(OsString::from("-defsym"));
        args.push(OsString::from(defsym));
    }
    args.push(OsString::from("-I"));
    args.push(config.project_root.as_os_str().to_os_string());

    let mut seen: Vec<PathBuf> = Vec::new();
    for request in requests {
        let dir = fragment_dir(&request.source_path);
        if !seen.contains(&dir) {
            args.push(OsString::from("-I"));
            args.push(dir.clone().into_os_string());
            seen.push(dir);
        }
    }

    args.push(OsString::from("-o"));
    args.push(object_path.as_os_str().to_os_string());
    for request in requests {
        args.push(
            request
                .source_path
                .with_extension(UNIT_EXTENSION)
                .into_os_string(),
        );
    }
    args
}

/// Argument list for dumping every tagged section out of the shared
/// object.
#[must_use]
pub(crate) fn extract_args(object_path: &Path, sections: &[(String, PathBuf)]) -> Vec<OsString> {
    let mut args = vec![object_path.as_os_str().to_os_string()];
    for (tag, code_path) in sections {
        args.push(OsString::from("--dump-section"));
        let mut pair = OsString::from(tag);
        pair.push("=");
        pair.push(code_path.as_os_str());
        args.push(pair);
    }
    args
}

/// Splits one dumped section into code bytes and the trailing big-endian
/// address word. A batched fragment may target cached or uncached
/// memory, so 0x80 and 0x81 leading bytes both pass.
fn split_dump(
    contents: Vec<u8>,
    source_path: &Path,
    code_path: &Path,
) -> Result<CompileResult, CompileError> {
    if contents.len() < 4 {
        return Err(CompileError::AddressMissing {
            object: code_path.to_path_buf(),
        });
    }
    let split = contents.len() - 4;
    let mut address = [0u8; 4];
    address.copy_from_slice(&contents[split..]);
    if address[0] != 0x80 && address[0] != 0x81 {
        return Err(CompileError::ImplausibleAddress {
            file: source_path.to_path_buf(),
            address: u32::from_be_bytes(address),
            expected: "0x80 or 0x81",
        });
    }

    let mut code = contents;
    code.truncate(split);
    Ok(CompileResult::from_code_and_address(code, address))
}
