use std::path::PathBuf;

use clap::Parser;

use crate::job::CompileRequest;

fn parse_request(input: &str) -> Result<CompileRequest, String> {
    let s = input.trim();
    let (file, address) = s
        .split_once('=')
        .ok_or_else(|| format!("expected FILE=ADDRESS, got '{input}'"))?;
    let file = file.trim();
    let address = address.trim();
    if file.is_empty() {
        return Err(format!("missing file in '{input}'"));
    }
    if address.is_empty() {
        return Err(format!("missing address in '{input}'"));
    }
    Ok(CompileRequest::new(PathBuf::from(file), address))
}

#[derive(Debug, Parser)]
#[command(name = "gekkoasm", version)]
pub struct Args {
    #[arg(short = 'r', long = "project-root", default_value = ".")]
    pub project_root: PathBuf,

    #[arg(long = "defsym", value_name = "NAME=VALUE")]
    pub defsym: Option<String>,

    #[arg(short = 'b', long = "batch", value_name = "N")]
    pub batch: Option<usize>,

    #[arg(long = "as", value_name = "CMD")]
    pub as_cmd: Option<String>,

    #[arg(long = "objcopy", value_name = "CMD")]
    pub objcopy_cmd: Option<String>,

    #[arg(long = "single")]
    pub single: bool,

    #[arg(long = "verbose", short = 'v')]
    pub verbose: bool,

    #[arg(value_name = "FILE=ADDRESS", value_parser = parse_request)]
    pub inputs: Vec<CompileRequest>,
}
