use anyhow::{Context, Result};
use clap::Parser;
use log::{debug, info};
use pcap_filter::compile::{default_expression_compiler, BpfAsm};
use pcap_filter::*;
use simplelog::{ColorChoice, Config, TermLogger, TerminalMode};
use std::io::{self, BufWriter, ErrorKind, Write};
use std::path::Path;
use std::process::ExitCode;

mod cli;

use crate::cli::{Cli, FilterArgs};

/// Exit status when the output pipe was closed (128 + SIGPIPE)
const EXIT_BROKEN_PIPE: u8 = 141;
/// Exit status when interrupted (128 + SIGINT)
const EXIT_INTERRUPTED: u8 = 130;

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) if is_broken_pipe(&e) => ExitCode::from(EXIT_BROKEN_PIPE),
        Err(e) if is_interrupted(&e) => ExitCode::from(EXIT_INTERRUPTED),
        Err(e) => {
            eprintln!("Error: {:?}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    TermLogger::init(
        cli.log_level.into(),
        Config::default(),
        TerminalMode::Stderr, // stdout carries the pcap output
        ColorChoice::Auto,
    )?;

    let mut running = Running::new();
    running.register_term_signals()?;

    let inputs: Vec<Input> = cli.files.into_iter().map(Input::from).collect();
    let output = BufWriter::new(io::stdout().lock());
    filter(&cli.filter, &cli.bpf_asm, &inputs, output, running)?;
    info!("done");
    Ok(())
}

/// Build the filter program, then filter `inputs` into `output`
///
/// Nothing is written to `output` unless the program is valid.
fn filter<W: Write>(
    args: &FilterArgs,
    bpf_asm: &Path,
    inputs: &[Input],
    output: W,
    running: Running,
) -> Result<PipelineStats> {
    let program = build_program(args, bpf_asm)?;
    match &program {
        Some(p) => debug!("filter program: {}", p),
        None => debug!("no filter program, accepting all packets"),
    }

    let writer = PcapWriter::new(output, OUTPUT_LINKTYPE, OUTPUT_SNAPLEN)
        .context("Could not write pcap header")?;
    let mut pipeline = FilterPipeline::new(program, writer).with_running(running);

    let res = pipeline.run(inputs);
    let res = match res {
        Err(e @ PipelineError::Write(_)) => return Err(e.into()),
        other => other,
    };
    // records written before an interruption are kept
    let (stats, _) = pipeline.finish()?;
    stats.report();
    res?;
    Ok(stats)
}

fn build_program(filter: &FilterArgs, bpf_asm: &Path) -> Result<Option<BpfProgram>> {
    let program = if let Some(bytecode) = &filter.bytecode {
        BpfProgram::from_bytecode(bytecode)?
    } else if let Some(expr) = &filter.expr {
        let compiler = default_expression_compiler();
        BpfProgram::from_expression(compiler.as_ref(), expr, OUTPUT_LINKTYPE, OUTPUT_SNAPLEN)?
    } else if let Some(path) = &filter.compile {
        BpfProgram::from_bytecode_file(&BpfAsm::new(bpf_asm), path)?
    } else {
        return Ok(None);
    };
    Ok(Some(program))
}

fn is_broken_pipe(e: &anyhow::Error) -> bool {
    e.chain().any(|cause| match cause.downcast_ref::<io::Error>() {
        Some(io_error) => io_error.kind() == ErrorKind::BrokenPipe,
        None => false,
    })
}

fn is_interrupted(e: &anyhow::Error) -> bool {
    matches!(
        e.downcast_ref::<PipelineError>(),
        Some(PipelineError::Interrupted)
    )
}
