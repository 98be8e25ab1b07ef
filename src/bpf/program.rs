use crate::bpf::insn::BpfInsn;
use crate::compile::{BytecodeCompiler, ExpressionCompiler};
use crate::linktype::Linktype;
use nom::bytes::complete::take_while1;
use nom::character::complete::u64 as dec_u64;
use nom::combinator::{all_consuming, opt};
use nom::multi::separated_list0;
use nom::sequence::delimited;
use nom::IResult;
use std::convert::TryFrom;
use std::fmt;
use std::path::Path;
use thiserror::Error;

/// Errors raised while building a filter program
#[derive(Error, Debug, PartialEq, Eq)]
pub enum BpfError {
    #[error("Malformed BPF bytecode: {0}")]
    MalformedBytecode(String),
    #[error("Unsupported filter expression: {0}")]
    UnsupportedExpression(String),
}

/// An immutable classic BPF program
///
/// Instructions are kept as a flat array, executed from index 0 with relative forward jumps.
/// A program always holds at least one instruction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BpfProgram {
    insns: Vec<BpfInsn>,
}

impl BpfProgram {
    pub fn new(insns: Vec<BpfInsn>) -> Result<BpfProgram, BpfError> {
        if insns.is_empty() {
            return Err(BpfError::MalformedBytecode("empty program".to_string()));
        }
        Ok(BpfProgram { insns })
    }

    /// Parse literal bytecode, as printed by `tcpdump -ddd`
    ///
    /// The text is a list of unsigned decimal integers separated by commas and/or whitespace.
    /// The first value is the instruction count, followed by one `code jt jf k` group per
    /// instruction:
    ///
    /// ```rust
    /// use pcap_filter::BpfProgram;
    ///
    /// // accept IPv4 over Ethernet
    /// let prog = BpfProgram::from_bytecode("4,40 0 0 12,21 0 1 2048,6 0 0 65535,6 0 0 0,")
    ///     .expect("valid bytecode");
    /// assert_eq!(prog.instructions().len(), 4);
    /// ```
    pub fn from_bytecode(text: &str) -> Result<BpfProgram, BpfError> {
        let values = match all_consuming(bytecode_values)(text) {
            Ok((_, v)) => v,
            Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => {
                let token = e.input.split(is_separator).next().unwrap_or_default();
                return Err(BpfError::MalformedBytecode(format!(
                    "invalid token {:?}",
                    token
                )));
            }
            Err(nom::Err::Incomplete(_)) => {
                return Err(BpfError::MalformedBytecode("incomplete input".to_string()))
            }
        };
        let (count, values) = values
            .split_first()
            .ok_or_else(|| BpfError::MalformedBytecode("no instruction count".to_string()))?;
        if values.len() % 4 != 0 {
            return Err(BpfError::MalformedBytecode(format!(
                "{} values after the instruction count, expected groups of 4",
                values.len()
            )));
        }
        let insns = values
            .chunks_exact(4)
            .enumerate()
            .map(|(idx, group)| insn_from_values(idx, group))
            .collect::<Result<Vec<_>, _>>()?;
        if *count != insns.len() as u64 {
            return Err(BpfError::MalformedBytecode(format!(
                "instruction count {} does not match the {} instructions given",
                count,
                insns.len()
            )));
        }
        BpfProgram::new(insns)
    }

    /// Compile a filter expression with an external compiler, and parse the result
    pub fn from_expression(
        compiler: &dyn ExpressionCompiler,
        expr: &str,
        linktype: Linktype,
        snaplen: u32,
    ) -> Result<BpfProgram, BpfError> {
        let text = compiler
            .compile(expr, linktype, snaplen)
            .map_err(|e| BpfError::UnsupportedExpression(format!("{:?}: {}", expr, e)))?;
        BpfProgram::from_bytecode(&text)
    }

    /// Assemble a filter program file with an external compiler, and parse the result
    pub fn from_bytecode_file(
        compiler: &dyn BytecodeCompiler,
        path: &Path,
    ) -> Result<BpfProgram, BpfError> {
        let text = compiler
            .compile_file(path)
            .map_err(|e| BpfError::MalformedBytecode(format!("{}: {}", path.display(), e)))?;
        BpfProgram::from_bytecode(&text)
    }

    pub fn instructions(&self) -> &[BpfInsn] {
        &self.insns
    }
}

/// Literal bytecode form, accepted back by [`BpfProgram::from_bytecode`]
impl fmt::Display for BpfProgram {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.insns.len())?;
        for i in &self.insns {
            write!(f, ",{} {} {} {}", i.code, i.jt, i.jf, i.k)?;
        }
        Ok(())
    }
}

#[inline]
fn is_separator(c: char) -> bool {
    c == ',' || c.is_whitespace()
}

fn separator(i: &str) -> IResult<&str, &str> {
    take_while1(is_separator)(i)
}

fn bytecode_values(i: &str) -> IResult<&str, Vec<u64>> {
    delimited(opt(separator), separated_list0(separator, dec_u64), opt(separator))(i)
}

fn insn_from_values(idx: usize, group: &[u64]) -> Result<BpfInsn, BpfError> {
    let out_of_range = |field: &str, value: u64| {
        BpfError::MalformedBytecode(format!(
            "instruction {}: {} value {} out of range",
            idx, field, value
        ))
    };
    let code = u16::try_from(group[0]).map_err(|_| out_of_range("code", group[0]))?;
    let jt = u8::try_from(group[1]).map_err(|_| out_of_range("jt", group[1]))?;
    let jf = u8::try_from(group[2]).map_err(|_| out_of_range("jf", group[2]))?;
    let k = u32::try_from(group[3]).map_err(|_| out_of_range("k", group[3]))?;
    Ok(BpfInsn::new(code, jt, jf, k))
}
