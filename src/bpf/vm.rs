use crate::bpf::insn::*;
use crate::bpf::BpfProgram;
use thiserror::Error;

/// Faults aborting the evaluation of a single packet
///
/// A faulting packet is rejected; faults never affect other packets.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvaluationFault {
    #[error("division by zero at instruction {pc}")]
    DivisionByZero { pc: usize },
    #[error("invalid opcode {code:#06x} at instruction {pc}")]
    InvalidOpcode { pc: usize, code: u16 },
    #[error("jump out of program at instruction {pc}")]
    JumpOutOfRange { pc: usize },
    #[error("scratch memory slot {slot} out of range at instruction {pc}")]
    InvalidMemorySlot { pc: usize, slot: u32 },
    #[error("end of program reached without a return instruction")]
    MissingReturn,
    #[error("step limit of {0} instructions exceeded")]
    StepLimit(usize),
}

impl BpfProgram {
    /// Run the program on a packet, and return the accepted length
    ///
    /// `packet` holds the captured bytes, `wire_len` the length of the packet on the wire.
    /// A result of 0 rejects the packet; otherwise it is the number of bytes to keep, never
    /// more than `wire_len`. Loads beyond the captured bytes reject the packet.
    pub fn run(&self, packet: &[u8], wire_len: u32) -> Result<u32, EvaluationFault> {
        Machine::new(self.instructions(), packet, wire_len).run()
    }

    /// Same as [`BpfProgram::run`], with faults treated as a rejection
    pub fn evaluate(&self, packet: &[u8], wire_len: u32) -> u32 {
        self.run(packet, wire_len).unwrap_or(0)
    }
}

// Registers and scratch memory, zeroed for every packet
struct Machine<'a> {
    insns: &'a [BpfInsn],
    packet: &'a [u8],
    wire_len: u32,
    a: u32,
    x: u32,
    mem: [u32; BPF_MEMWORDS],
}

impl<'a> Machine<'a> {
    fn new(insns: &'a [BpfInsn], packet: &'a [u8], wire_len: u32) -> Self {
        Machine {
            insns,
            packet,
            wire_len,
            a: 0,
            x: 0,
            mem: [0; BPF_MEMWORDS],
        }
    }

    fn run(mut self) -> Result<u32, EvaluationFault> {
        // jumps only go forward: a valid program executes each instruction at most once
        let limit = self.insns.len();
        let mut steps = 0;
        let mut pc = 0;
        loop {
            let insn = *self.insns.get(pc).ok_or(EvaluationFault::MissingReturn)?;
            steps += 1;
            if steps > limit {
                return Err(EvaluationFault::StepLimit(limit));
            }
            let invalid = EvaluationFault::InvalidOpcode {
                pc,
                code: insn.code,
            };
            let mut next = pc + 1;
            match insn.class() {
                BPF_LD => match insn.mode() {
                    BPF_IMM => self.a = insn.k,
                    BPF_LEN => self.a = self.wire_len,
                    BPF_MEM => self.a = self.mem[slot(pc, insn.k)?],
                    BPF_ABS | BPF_IND => {
                        let width = match insn.size() {
                            BPF_W => 4,
                            BPF_H => 2,
                            BPF_B => 1,
                            _ => return Err(invalid),
                        };
                        let offset = if insn.mode() == BPF_IND {
                            self.x.checked_add(insn.k)
                        } else {
                            Some(insn.k)
                        };
                        match self.load(offset, width) {
                            Some(v) => self.a = v,
                            None => return Ok(0),
                        }
                    }
                    _ => return Err(invalid),
                },
                BPF_LDX => match insn.mode() {
                    BPF_IMM => self.x = insn.k,
                    BPF_LEN => self.x = self.wire_len,
                    BPF_MEM => self.x = self.mem[slot(pc, insn.k)?],
                    BPF_MSH if insn.size() == BPF_B => match self.load(Some(insn.k), 1) {
                        Some(v) => self.x = (v & 0xf) << 2,
                        None => return Ok(0),
                    },
                    _ => return Err(invalid),
                },
                BPF_ST => self.mem[slot(pc, insn.k)?] = self.a,
                BPF_STX => self.mem[slot(pc, insn.k)?] = self.x,
                BPF_ALU => self.a = self.alu(pc, insn)?,
                BPF_JMP => next = self.jump(pc, insn)?,
                BPF_RET => {
                    let v = match insn.rval() {
                        BPF_K => insn.k,
                        BPF_A => self.a,
                        _ => return Err(invalid),
                    };
                    return Ok(v.min(self.wire_len));
                }
                BPF_MISC => match insn.miscop() {
                    BPF_TAX => self.x = self.a,
                    BPF_TXA => self.a = self.x,
                    _ => return Err(invalid),
                },
                _ => return Err(invalid),
            }
            pc = next;
        }
    }

    /// Big-endian load of `width` bytes, `None` when out of the captured data
    fn load(&self, offset: Option<u32>, width: usize) -> Option<u32> {
        let start = offset? as usize;
        let bytes = self.packet.get(start..start.checked_add(width)?)?;
        Some(bytes.iter().fold(0, |acc, b| (acc << 8) | u32::from(*b)))
    }

    fn alu(&self, pc: usize, insn: BpfInsn) -> Result<u32, EvaluationFault> {
        let operand = if insn.src() == BPF_X { self.x } else { insn.k };
        let a = self.a;
        let div_zero = EvaluationFault::DivisionByZero { pc };
        let v = match insn.op() {
            BPF_ADD => a.wrapping_add(operand),
            BPF_SUB => a.wrapping_sub(operand),
            BPF_MUL => a.wrapping_mul(operand),
            BPF_DIV => a.checked_div(operand).ok_or(div_zero)?,
            BPF_MOD => a.checked_rem(operand).ok_or(div_zero)?,
            BPF_AND => a & operand,
            BPF_OR => a | operand,
            BPF_XOR => a ^ operand,
            BPF_LSH => a.checked_shl(operand).unwrap_or(0),
            BPF_RSH => a.checked_shr(operand).unwrap_or(0),
            BPF_NEG => a.wrapping_neg(),
            _ => {
                return Err(EvaluationFault::InvalidOpcode {
                    pc,
                    code: insn.code,
                })
            }
        };
        Ok(v)
    }

    /// Index of the next instruction to execute
    fn jump(&self, pc: usize, insn: BpfInsn) -> Result<usize, EvaluationFault> {
        let offset = if insn.op() == BPF_JA {
            insn.k as usize
        } else {
            let operand = if insn.src() == BPF_X { self.x } else { insn.k };
            let taken = match insn.op() {
                BPF_JEQ => self.a == operand,
                BPF_JGT => self.a > operand,
                BPF_JGE => self.a >= operand,
                BPF_JSET => self.a & operand != 0,
                _ => {
                    return Err(EvaluationFault::InvalidOpcode {
                        pc,
                        code: insn.code,
                    })
                }
            };
            usize::from(if taken { insn.jt } else { insn.jf })
        };
        (pc + 1)
            .checked_add(offset)
            .filter(|target| *target < self.insns.len())
            .ok_or(EvaluationFault::JumpOutOfRange { pc })
    }
}

#[inline]
fn slot(pc: usize, k: u32) -> Result<usize, EvaluationFault> {
    let idx = k as usize;
    if idx < BPF_MEMWORDS {
        Ok(idx)
    } else {
        Err(EvaluationFault::InvalidMemorySlot { pc, slot: k })
    }
}
