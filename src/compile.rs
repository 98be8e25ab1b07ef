//! External filter compilers
//!
//! Filter expressions (`"tcp port 80"`) and filter program files are not compiled here: they
//! are handed to an external compiler which returns literal bytecode, in the form accepted by
//! [`BpfProgram::from_bytecode`](crate::BpfProgram::from_bytecode).

use crate::bpf::insn::{BPF_K, BPF_RET};
use crate::bpf::BpfProgram;
use crate::linktype::Linktype;
use log::debug;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use thiserror::Error;

/// Errors reported by external compilers
#[derive(Error, Debug)]
pub enum CompileError {
    #[error("no compiler available: {0}")]
    Unavailable(String),
    #[error("{0}")]
    Rejected(String),
    #[error("cannot read {path}: {source}")]
    Input { path: PathBuf, source: io::Error },
    #[error("cannot run {program}: {source}")]
    Spawn { program: String, source: io::Error },
    #[error("compiler output is not valid UTF-8")]
    InvalidOutput,
}

/// Compiles a filter expression for a link type and snapshot length
pub trait ExpressionCompiler {
    fn compile(&self, expr: &str, linktype: Linktype, snaplen: u32)
        -> Result<String, CompileError>;
}

/// Compiles a filter program file
pub trait BytecodeCompiler {
    fn compile_file(&self, path: &Path) -> Result<String, CompileError>;
}

/// Expression compiler used when no compiler is built in
#[derive(Debug, Default)]
pub struct NoExpressionCompiler;

impl ExpressionCompiler for NoExpressionCompiler {
    fn compile(&self, _expr: &str, _: Linktype, _: u32) -> Result<String, CompileError> {
        Err(CompileError::Unavailable(
            "built without libpcap support (enable the `libpcap` feature)".to_string(),
        ))
    }
}

/// Expression compiler backed by libpcap's `pcap_compile`
#[cfg(feature = "libpcap")]
#[derive(Debug)]
pub struct LibpcapCompiler {
    pub optimize: bool,
}

#[cfg(feature = "libpcap")]
impl Default for LibpcapCompiler {
    fn default() -> Self {
        LibpcapCompiler { optimize: true }
    }
}

#[cfg(feature = "libpcap")]
impl ExpressionCompiler for LibpcapCompiler {
    fn compile(
        &self,
        expr: &str,
        linktype: Linktype,
        snaplen: u32,
    ) -> Result<String, CompileError> {
        debug!(
            "compiling {:?} for link type {} (snaplen {})",
            expr, linktype, snaplen
        );
        let capture = ::pcap::Capture::dead(::pcap::Linktype(linktype.0))
            .map_err(|e| CompileError::Unavailable(e.to_string()))?;
        let program = capture
            .compile(expr, self.optimize)
            .map_err(|e| CompileError::Rejected(e.to_string()))?;
        let insns = program.get_instructions();
        let mut text = insns.len().to_string();
        for insn in insns {
            text.push(',');
            text.push_str(&insn.to_string());
        }
        clamp_return_lengths(&text, snaplen)
    }
}

/// Lower every `ret #k` above `snaplen` to `snaplen` in literal bytecode
///
/// A snapshot length of 0 leaves the program unchanged.
pub fn clamp_return_lengths(text: &str, snaplen: u32) -> Result<String, CompileError> {
    let program =
        BpfProgram::from_bytecode(text).map_err(|e| CompileError::Rejected(e.to_string()))?;
    if snaplen == 0 {
        return Ok(program.to_string());
    }
    let insns = program
        .instructions()
        .iter()
        .map(|insn| {
            let mut insn = *insn;
            if insn.code == BPF_RET | BPF_K && insn.k > snaplen {
                insn.k = snaplen;
            }
            insn
        })
        .collect();
    let program = BpfProgram::new(insns).map_err(|e| CompileError::Rejected(e.to_string()))?;
    Ok(program.to_string())
}

/// The expression compiler available in this build
pub fn default_expression_compiler() -> Box<dyn ExpressionCompiler> {
    #[cfg(feature = "libpcap")]
    {
        Box::new(LibpcapCompiler::default())
    }
    #[cfg(not(feature = "libpcap"))]
    {
        Box::new(NoExpressionCompiler)
    }
}

/// Runs an external BPF assembler (the kernel's `bpf_asm` by default) on a program file
///
/// The assembler is expected to print the literal bytecode on its standard output.
#[derive(Debug, Clone)]
pub struct BpfAsm {
    program: PathBuf,
}

impl BpfAsm {
    pub fn new<P: Into<PathBuf>>(program: P) -> BpfAsm {
        BpfAsm {
            program: program.into(),
        }
    }
}

impl Default for BpfAsm {
    fn default() -> Self {
        BpfAsm::new("bpf_asm")
    }
}

impl BytecodeCompiler for BpfAsm {
    fn compile_file(&self, path: &Path) -> Result<String, CompileError> {
        File::open(path).map_err(|source| CompileError::Input {
            path: path.to_path_buf(),
            source,
        })?;
        debug!("running {} {}", self.program.display(), path.display());
        let output = Command::new(&self.program)
            .arg(path)
            .stdin(Stdio::null())
            .output()
            .map_err(|source| CompileError::Spawn {
                program: self.program.display().to_string(),
                source,
            })?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(CompileError::Rejected(format!(
                "{} failed ({}): {}",
                self.program.display(),
                output.status,
                stderr.trim()
            )));
        }
        String::from_utf8(output.stdout).map_err(|_| CompileError::InvalidOutput)
    }
}
