//! # BPF filter for pcap streams
//!
//! This crate reads pcap streams, runs each packet through a classic BPF program, and writes the
//! accepted packets (possibly truncated to the length accepted by the program) to a single
//! pcap output stream. Several inputs are concatenated under one global header.
//!
//! The main pieces are:
//!
//! - [`BpfProgram`]: an immutable classic BPF program, built from literal bytecode (as printed
//!   by `tcpdump -ddd`) or through an external compiler (see the [`compile`] module), and its
//!   interpreter ([`BpfProgram::evaluate`]),
//! - [`PcapReader`]: a streaming reader over legacy pcap data, in any byte order and timestamp
//!   resolution,
//! - [`PcapWriter`]: a writer producing little-endian, microsecond pcap streams,
//! - [`FilterPipeline`]: ties them together over a list of inputs.
//!
//! # Example
//!
//! ```rust
//! use pcap_filter::*;
//!
//! # let input: &[u8] = &[
//! #     0xd4, 0xc3, 0xb2, 0xa1, 2, 0, 4, 0, 0, 0, 0, 0, 0, 0, 0, 0,
//! #     0xff, 0xff, 0, 0, 1, 0, 0, 0,
//! # ];
//! // keep IPv4 packets
//! let program = BpfProgram::from_bytecode("4,40 0 0 12,21 0 1 2048,6 0 0 65535,6 0 0 0")
//!     .expect("valid bytecode");
//! let writer = PcapWriter::new(Vec::new(), OUTPUT_LINKTYPE, OUTPUT_SNAPLEN).expect("writer");
//! let mut pipeline = FilterPipeline::new(Some(program), writer);
//! pipeline.process_source("input", input).expect("process");
//! let (stats, output) = pipeline.finish().expect("flush");
//! println!("{} packet(s) accepted, {} bytes", stats.packets_accepted, output.len());
//! ```

mod utils;

mod error;
mod linktype;
pub use error::*;
pub use linktype::*;

pub mod bpf;
pub mod compile;
pub mod pcap;
pub mod pipeline;
pub mod signals;

pub use bpf::{BpfError, BpfInsn, BpfProgram, EvaluationFault};
pub use compile::{BytecodeCompiler, CompileError, ExpressionCompiler};
pub use pcap::*;
pub use pipeline::*;
pub use signals::Running;
