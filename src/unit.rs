use std::fs;
use std::path::Path;

use crate::error::CompileError;
use crate::label::isolate_labels;

/// Writes the self-contained assembly unit for one fragment to a scratch
/// path.
///
/// With a section tag the fragment is destined for a combined batch
/// object: a `.section <tag>` line goes on top so its code can be dumped
/// individually later, and its labels are rewritten into numeric local
/// labels. An untagged unit (single compile) keeps the source verbatim,
/// since nothing else will be assembled with it.
///
/// The tail is always a blank line, a `.long` emitting the evaluated
/// address expression, and one more blank line. The assembler silently
/// drops the final instruction of a unit whose last line has trailing
/// spaces and no newline; the closing blank line keeps that from ever
/// happening.
pub fn write_unit(
    source_path: &Path,
    address_expr: &str,
    target_path: &Path,
    section: Option<&str>,
) -> Result<(), CompileError> {
    let contents = fs::read_to_string(source_path).map_err(|err| CompileError::SourceRead {
        path: source_path.to_path_buf(),
        detail: err.to_string(),
    })?;

    let mut unit = match section {
        Some(tag) => {
            let mut tagged = format!(".section {tag}\r\n");
            tagged.push_str(&contents);
            isolate_labels(&tagged)
        }
        None => contents,
    };

    unit.push_str("\r\n");
    unit.push_str(&format!(".long {address_expr}\r\n"));
    unit.push_str("\r\n");

    fs::write(target_path, unit).map_err(|err| CompileError::UnitWrite {
        path: target_path.to_path_buf(),
        detail: err.to_string(),
    })
}
