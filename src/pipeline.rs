//! Filtering pipeline
//!
//! A [`FilterPipeline`] reads one or more pcap sources in order, runs every record through the
//! filter program and writes the accepted records to a single output stream. The output holds
//! exactly one global header, written when the [`PcapWriter`] is created.

use crate::bpf::BpfProgram;
use crate::linktype::Linktype;
use crate::pcap::{PcapReader, PcapRecord, PcapWriter, WriteError, DEFAULT_CAPACITY};
use crate::signals::Running;
use crate::utils::nanos_to_micros;
use log::{debug, info, warn};
use std::fmt;
use std::fs::File;
use std::io::{self, Read, Write};
use std::path::PathBuf;
use thiserror::Error;

/// Snapshot length of the output stream
pub const OUTPUT_SNAPLEN: u32 = 65536;
/// Link type of the output stream
pub const OUTPUT_LINKTYPE: Linktype = Linktype::ETHERNET;

/// Errors ending a pipeline run
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("cannot write output: {0}")]
    Write(#[from] WriteError),
    #[error("interrupted")]
    Interrupted,
    #[error("no input could be read")]
    NoUsableInput,
}

impl PipelineError {
    /// Returns true if the output was closed by its reader
    pub fn is_broken_pipe(&self) -> bool {
        matches!(self, PipelineError::Write(e) if e.is_broken_pipe())
    }
}

/// A pcap source
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Input {
    Stdin,
    File(PathBuf),
}

impl From<PathBuf> for Input {
    /// `-` designates the standard input
    fn from(path: PathBuf) -> Self {
        if path.as_os_str() == "-" {
            Input::Stdin
        } else {
            Input::File(path)
        }
    }
}

impl fmt::Display for Input {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Input::Stdin => f.write_str("<stdin>"),
            Input::File(path) => write!(f, "{}", path.display()),
        }
    }
}

/// How a single source was consumed
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SourceOutcome {
    /// All records were read
    Completed,
    /// The stream ended in the middle of a record; preceding records were processed
    Truncated,
    /// A malformed record or a read error ended the source early
    Ended,
    /// The source could not be opened, or its global header is invalid
    Unreadable,
}

/// Counters maintained over a pipeline run
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PipelineStats {
    pub sources_read: u64,
    pub sources_failed: u64,
    pub sources_truncated: u64,
    pub sources_ended: u64,
    pub packets_read: u64,
    pub packets_accepted: u64,
    pub packets_rejected: u64,
    /// Accepted packets written with fewer bytes than captured
    pub packets_truncated: u64,
    pub packets_faulted: u64,
}

impl PipelineStats {
    /// Report statistics. Should be called after processing was completed.
    pub fn report(&self) {
        info!(
            "{} packet(s) read from {} source(s): {} accepted, {} rejected",
            self.packets_read, self.sources_read, self.packets_accepted, self.packets_rejected
        );
        if self.packets_truncated != 0 {
            info!("{} packet(s) were truncated", self.packets_truncated);
        }
        if self.packets_faulted != 0 {
            warn!(
                "{} packet(s) were rejected because the filter program faulted",
                self.packets_faulted
            );
        }
        if self.sources_failed != 0 {
            warn!("{} source(s) could not be read", self.sources_failed);
        }
        if self.sources_truncated + self.sources_ended != 0 {
            warn!(
                "{} source(s) ended early",
                self.sources_truncated + self.sources_ended
            );
        }
    }
}

/// Reads pcap sources, filters their records and writes them to one output
pub struct FilterPipeline<W>
where
    W: Write,
{
    program: Option<BpfProgram>,
    writer: PcapWriter<W>,
    running: Running,
    stats: PipelineStats,
}

impl<W> FilterPipeline<W>
where
    W: Write,
{
    /// Creates a pipeline. Without a program, all records are accepted unmodified.
    pub fn new(program: Option<BpfProgram>, writer: PcapWriter<W>) -> FilterPipeline<W> {
        FilterPipeline {
            program,
            writer,
            running: Running::new(),
            stats: PipelineStats::default(),
        }
    }

    /// Use `running` to stop processing (checked between records)
    pub fn with_running(mut self, running: Running) -> Self {
        self.running = running;
        self
    }

    pub fn stats(&self) -> &PipelineStats {
        &self.stats
    }

    /// Process all inputs in order, or the standard input if `inputs` is empty
    ///
    /// Inputs that cannot be opened are skipped. Fails with [`PipelineError::NoUsableInput`] if
    /// no input had a valid global header.
    pub fn run(&mut self, inputs: &[Input]) -> Result<(), PipelineError> {
        let stdin_only = [Input::Stdin];
        let inputs = if inputs.is_empty() {
            &stdin_only[..]
        } else {
            inputs
        };
        for input in inputs {
            if !self.running.running() {
                return Err(PipelineError::Interrupted);
            }
            let name = input.to_string();
            match input {
                Input::Stdin => {
                    let stdin = io::stdin();
                    self.process_source(&name, stdin.lock())?;
                }
                Input::File(path) => match File::open(path) {
                    Ok(file) => {
                        self.process_source(&name, file)?;
                    }
                    Err(e) => {
                        warn!("{}: {}", name, e);
                        self.stats.sources_failed += 1;
                    }
                },
            }
        }
        if !self.running.running() {
            return Err(PipelineError::Interrupted);
        }
        if self.stats.sources_read == 0 {
            return Err(PipelineError::NoUsableInput);
        }
        Ok(())
    }

    /// Filter all records of one source into the output
    ///
    /// Problems with the source itself end (or skip) that source only. Write errors and
    /// interruptions end the whole run.
    pub fn process_source<R: Read>(
        &mut self,
        name: &str,
        input: R,
    ) -> Result<SourceOutcome, PipelineError> {
        let mut reader = match PcapReader::new(DEFAULT_CAPACITY, input) {
            Ok(reader) => reader,
            Err(e) => {
                warn!("{}: not a pcap stream: {}", name, e);
                self.stats.sources_failed += 1;
                return Ok(SourceOutcome::Unreadable);
            }
        };
        self.stats.sources_read += 1;
        let network = reader.header().network;
        if network != self.writer.header().network {
            // records are copied as-is, under the output link type
            warn!(
                "{}: link type {} differs from output link type {}",
                name,
                network,
                self.writer.header().network
            );
        }
        let nanosecond = reader.header().is_nanosecond_precision();
        let mut outcome = SourceOutcome::Completed;
        while let Some(item) = reader.next() {
            if !self.running.running() {
                return Err(PipelineError::Interrupted);
            }
            match item {
                Ok(record) => self.filter_record(record, nanosecond)?,
                Err(e) => {
                    warn!("{}: {} (after {} bytes)", name, e, reader.consumed());
                    self.stats.sources_ended += 1;
                    outcome = SourceOutcome::Ended;
                }
            }
        }
        // a signal may arrive while blocked in read(), the stream then ends without more records
        if !self.running.running() {
            return Err(PipelineError::Interrupted);
        }
        if reader.truncated() {
            warn!("{}: truncated record at end of stream", name);
            self.stats.sources_truncated += 1;
            outcome = SourceOutcome::Truncated;
        }
        debug!("{}: {:?} after {} bytes", name, outcome, reader.consumed());
        Ok(outcome)
    }

    fn filter_record(
        &mut self,
        mut record: PcapRecord,
        nanosecond: bool,
    ) -> Result<(), PipelineError> {
        self.stats.packets_read += 1;
        let accepted = match &self.program {
            None => record.caplen,
            Some(program) => match program.run(&record.data, record.origlen) {
                Ok(len) => len,
                Err(fault) => {
                    debug!("packet {}: {}", self.stats.packets_read, fault);
                    self.stats.packets_faulted += 1;
                    return Ok(());
                }
            },
        };
        if accepted == 0 {
            self.stats.packets_rejected += 1;
            return Ok(());
        }
        let kept = accepted.min(record.caplen).min(self.writer.snaplen());
        if kept < record.caplen {
            record.data.truncate(kept as usize);
            record.caplen = kept;
            self.stats.packets_truncated += 1;
        }
        record.origlen = record.origlen.max(kept);
        if nanosecond {
            record.ts_frac = nanos_to_micros(record.ts_frac);
        }
        self.writer.write(&record.as_block())?;
        self.stats.packets_accepted += 1;
        Ok(())
    }

    /// Flush the output, and return the statistics and the underlying sink
    pub fn finish(self) -> Result<(PipelineStats, W), PipelineError> {
        let sink = self.writer.into_inner()?;
        Ok((self.stats, sink))
    }
}
