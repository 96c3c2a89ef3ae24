use crate::cli::Args;
use crate::error::CompileError;
use crate::job::{CompileRequest, CompileResult};
use crate::scheduler::Scheduler;
use crate::single::compile_single;
use crate::toolchain::CompileConfig;

/// Compiles every requested fragment and prints one `ADDRESS CODE` line
/// per fragment, both in lowercase hex, in input order.
///
/// Fragments normally go through the batching scheduler so the whole run
/// costs a single assembler invocation; `--single` assembles each one on
/// its own instead. Nothing prints unless every fragment compiled.
pub fn run(args: Args) -> anyhow::Result<()> {
    if args.inputs.is_empty() {
        anyhow::bail!("no input files")
    }

    let mut config = CompileConfig::new(&args.project_root);
    config.defsym = args.defsym.clone();
    if let Some(as_cmd) = &args.as_cmd {
        config.toolchain.as_command = as_cmd.clone();
    }
    if let Some(objcopy_cmd) = &args.objcopy_cmd {
        config.toolchain.objcopy_command = objcopy_cmd.clone();
    }

    let results = if args.single {
        compile_each(&config, &args.inputs)?
    } else {
        compile_batched(config, &args.inputs, args.batch)?
    };

    for (request, result) in args.inputs.iter().zip(&results) {
        if args.verbose {
            eprintln!(
                "{}: {} byte(s) at {}",
                request.source_path.display(),
                result.code.len(),
                result.address
            );
        }
        println!("{} {}", result.address, hex_string(&result.code));
    }
    if args.verbose {
        eprintln!("gekkoasm: compiled {} fragment(s)", results.len());
    }
    Ok(())
}

/// Runs every request through one scheduler. Replies are collected for
/// all requests and the dispatch threads joined before the first failure
/// propagates, so scratch cleanup finishes even on a failed run.
fn compile_batched(
    config: CompileConfig,
    requests: &[CompileRequest],
    batch: Option<usize>,
) -> anyhow::Result<Vec<CompileResult>> {
    let scheduler = Scheduler::new(config, batch.unwrap_or(requests.len()));
    let receivers: Vec<_> = requests
        .iter()
        .map(|request| scheduler.submit(request.clone()))
        .collect();
    scheduler.flush();

    let replies: Vec<_> = receivers
        .into_iter()
        .map(|receiver| receiver.recv().unwrap_or(Err(CompileError::BatchAborted)))
        .collect();
    scheduler.wait();

    let mut results = Vec::with_capacity(replies.len());
    for reply in replies {
        results.push(reply?);
    }
    Ok(results)
}

fn compile_each(
    config: &CompileConfig,
    requests: &[CompileRequest],
) -> anyhow::Result<Vec<CompileResult>> {
    let mut results = Vec::with_capacity(requests.len());
    for request in requests {
        results.push(compile_single(config, request)?);
    }
    Ok(results)
}

fn hex_string(bytes: &[u8]) -> String {
    bytes.iter().map(|byte| format!("{byte:02x}")).collect()
}
