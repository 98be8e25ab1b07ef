//! Classic BPF programs
//!
//! A [`BpfProgram`] is a flat array of [`BpfInsn`] built once (from literal bytecode, or through
//! an external compiler) and then run against every packet with [`BpfProgram::evaluate`]. The
//! interpreter follows the classic BPF machine: an accumulator `A`, an index register `X` and
//! 16 words of scratch memory, all reset for each packet.
//!
//! The result of a run is the accepted length: 0 rejects the packet, any other value is the
//! number of bytes to keep.

pub mod insn;
mod program;
mod vm;

pub use insn::BpfInsn;
pub use program::*;
pub use vm::*;
