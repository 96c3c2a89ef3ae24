use clap::Parser;

use gekkoasm::error::{CompileError, ErrorClass};

fn main() {
    let args = gekkoasm::cli::Args::parse();
    if let Err(err) = gekkoasm::run(args) {
        eprintln!("{err}");
        let validation = err
            .downcast_ref::<CompileError>()
            .is_some_and(|compile_err| compile_err.class() == ErrorClass::Validation);
        std::process::exit(if validation { 2 } else { 1 });
    }
}
