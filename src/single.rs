use std::ffi::OsString;
use std::fs;
use std::path::Path;

use crate::error::CompileError;
use crate::job::{CompileRequest, CompileResult};
use crate::toolchain::{
    fragment_dir, run_captured, CompileConfig, ScratchFile, AS_BASE_ARGS, CODE_EXTENSION,
    UNIT_EXTENSION,
};
use crate::unit::write_unit;

/// Byte pattern the assembler emits immediately after the address word in
/// the relocatable object. The injection address is the four bytes before
/// the last occurrence.
const ADDRESS_SENTINEL: [u8; 9] = [0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0xFF, 0xF1, 0x00];

/// Assembles one fragment on its own and returns its machine code and
/// resolved injection address.
///
/// The fragment gets a private assembler run: the unit is written next to
/// the source, assembled to a relocatable object, the address word is
/// recovered from the object, and the object is then flattened in place
/// to raw bytes. Scratch files are removed on the way out whether the
/// compile succeeded or not.
pub fn compile_single(
    config: &CompileConfig,
    request: &CompileRequest,
) -> Result<CompileResult, CompileError> {
    let unit_path = request.source_path.with_extension(UNIT_EXTENSION);
    let object_path = request.source_path.with_extension(CODE_EXTENSION);
    let _unit_guard = ScratchFile::new(unit_path.clone());
    let _object_guard = ScratchFile::new(object_path.clone());

    write_unit(&request.source_path, &request.address_expr, &unit_path, None)?;

    let args = assemble_args(config, &request.source_path, &unit_path, &object_path);
    let (status, output) = run_captured(&config.toolchain.as_command, &args)?;
    if !status.success() {
        return Err(CompileError::Assemble {
            file: request.source_path.clone(),
            output,
        });
    }

    let object = fs::read(&object_path).map_err(|err| CompileError::OutputRead {
        path: object_path.clone(),
        detail: err.to_string(),
    })?;
    let address = recover_address(&object, &request.source_path, &object_path)?;

    let flatten_args = [
        OsString::from("-O"),
        OsString::from("binary"),
        object_path.as_os_str().to_os_string(),
        object_path.as_os_str().to_os_string(),
    ];
    let (status, output) = run_captured(&config.toolchain.objcopy_command, &flatten_args)?;
    if !status.success() {
        return Err(CompileError::Extract {
            object: object_path.clone(),
            output,
        });
    }

    let mut code = fs::read(&object_path).map_err(|err| CompileError::OutputRead {
        path: object_path.clone(),
        detail: err.to_string(),
    })?;
    // The flat image ends with the four address bytes the unit's `.long`
    // emitted; they are not fragment code.
    code.truncate(code.len().saturating_sub(4));

    Ok(CompileResult::from_code_and_address(code, address))
}

/// Argument list for a standalone assembly. Includes resolve against the
/// fragment's own directory first, then the project root.
#[must_use]
pub(crate) fn assemble_args(
    config: &CompileConfig,
    source_path: &Path,
    unit_path: &Path,
    object_path: &Path,
) -> Vec<OsString> {
    let mut args: Vec<OsString> = AS_BASE_ARGS.iter().map(OsString::from).collect();
    if let Some(defsym) = &config.defsym {
        args.push(OsString::from("-defsym"));
        args.push(OsString::from(defsym));
    }
    args.push(OsString::from("-I"));
    args.push(fragment_dir(source_path).into_os_string());
    args.push(OsString::from("-I"));
    args.push(config.project_root.as_os_str().to_os_string());
    args.push(OsString::from("-o"));
    args.push(object_path.as_os_str().to_os_string());
    args.push(unit_path.as_os_str().to_os_string());
    args
}

/// Finds the last sentinel occurrence in the relocatable object and reads
/// the four bytes before it as the big-endian injection address. A lone
/// fragment must land in cached memory, so the leading byte has to be
/// 0x80.
fn recover_address(
    object: &[u8],
    source_path: &Path,
    object_path: &Path,
) -> Result<[u8; 4], CompileError> {
    let sentinel_start = object
        .windows(ADDRESS_SENTINEL.len())
        .rposition(|window| window == ADDRESS_SENTINEL)
        .ok_or_else(|| CompileError::AddressMissing {
            object: object_path.to_path_buf(),
        })?;
    let address_start =
        sentinel_start
            .checked_sub(4)
            .ok_or_else(|| CompileError::AddressMissing {
                object: object_path.to_path_buf(),
            })?;

    let mut address = [0u8; 4];
    address.copy_from_slice(&object[address_start..sentinel_start]);
    if address[0] != 0x80 {
        return Err(CompileError::ImplausibleAddress {
            file: source_path.to_path_buf(),
            address: u32::from_be_bytes(address),
            expected: "0x80",
        });
    }
    Ok(address)
}
