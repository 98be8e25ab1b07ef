use pcap_filter::bpf::insn::*;
use pcap_filter::*;

// tcpdump -ddd "tcp dst port 80", IPv4 and IPv6 over Ethernet
const TCP_DST_80: &str = "16
40 0 0 12
21 0 4 34525
48 0 0 20
21 0 11 6
40 0 0 56
21 8 9 80
21 0 8 2048
48 0 0 23
21 0 6 6
40 0 0 20
69 4 0 8191
177 0 0 14
72 0 0 16
21 0 1 80
6 0 0 262144
6 0 0 0
";

fn ipv4_tcp(dport: u16) -> Vec<u8> {
    let mut p = vec![0u8; 54];
    p[12..14].copy_from_slice(&[0x08, 0x00]);
    p[14] = 0x45;
    p[23] = 6;
    p[36..38].copy_from_slice(&dport.to_be_bytes());
    p
}

fn ipv6_tcp(dport: u16) -> Vec<u8> {
    let mut p = vec![0u8; 74];
    p[12..14].copy_from_slice(&[0x86, 0xdd]);
    p[14] = 0x60;
    p[20] = 6;
    p[56..58].copy_from_slice(&dport.to_be_bytes());
    p
}

struct FixedCompiler(&'static str);

impl ExpressionCompiler for FixedCompiler {
    fn compile(&self, _: &str, _: Linktype, _: u32) -> Result<String, CompileError> {
        Ok(self.0.to_string())
    }
}

#[test]
fn test_tcp_dst_port() {
    let prog = BpfProgram::from_bytecode(TCP_DST_80).expect("bytecode");
    assert_eq!(prog.instructions().len(), 16);
    assert_eq!(prog.evaluate(&ipv4_tcp(80), 54), 54);
    assert_eq!(prog.evaluate(&ipv4_tcp(22), 54), 0);
    assert_eq!(prog.evaluate(&ipv6_tcp(80), 74), 74);
    assert_eq!(prog.evaluate(&ipv6_tcp(22), 74), 0);
    // the accepted length never exceeds the wire length
    assert_eq!(prog.evaluate(&ipv4_tcp(80), 1500), 1500);
    // out of bounds loads reject
    assert_eq!(prog.evaluate(&ipv6_tcp(80)[..40], 74), 0);
}

#[test]
fn test_deterministic() {
    let prog = BpfProgram::from_bytecode(TCP_DST_80).expect("bytecode");
    let pkt = ipv4_tcp(80);
    let first = prog.run(&pkt, 54);
    for _ in 0..10 {
        assert_eq!(prog.run(&pkt, 54), first);
    }
}

#[test]
fn test_scratch_memory_is_per_packet() {
    // ld M[0]; add #1; st M[0]; ret a
    let prog = BpfProgram::new(vec![
        BpfInsn::stmt(BPF_LD | BPF_MEM, 0),
        BpfInsn::stmt(BPF_ALU | BPF_ADD | BPF_K, 1),
        BpfInsn::stmt(BPF_ST, 0),
        BpfInsn::stmt(BPF_RET | BPF_A, 0),
    ])
    .expect("program");
    assert_eq!(prog.run(&[0; 10], 10), Ok(1));
    assert_eq!(prog.run(&[0; 10], 10), Ok(1));
}

#[test]
fn test_faults() {
    let div = BpfProgram::new(vec![
        BpfInsn::stmt(BPF_ALU | BPF_DIV | BPF_X, 0),
        BpfInsn::stmt(BPF_RET | BPF_K, 1),
    ])
    .expect("program");
    assert_eq!(
        div.run(&[0; 4], 4),
        Err(EvaluationFault::DivisionByZero { pc: 0 })
    );
    assert_eq!(div.evaluate(&[0; 4], 4), 0);

    let no_ret = BpfProgram::new(vec![BpfInsn::stmt(BPF_LD | BPF_IMM, 1)]).expect("program");
    assert_eq!(no_ret.run(&[], 0), Err(EvaluationFault::MissingReturn));
}

#[test]
fn test_from_expression() {
    let compiler = FixedCompiler("4,40 0 0 12,21 0 1 2048,6 0 0 65535,6 0 0 0,");
    let prog = BpfProgram::from_expression(&compiler, "ip", Linktype::ETHERNET, OUTPUT_SNAPLEN)
        .expect("program");
    assert_eq!(prog.evaluate(&ipv4_tcp(80), 54), 54);
    assert_eq!(prog.evaluate(&ipv6_tcp(80), 74), 0);
    // compiler output is validated like literal bytecode
    let bad = FixedCompiler("2,6 0 0 0");
    let res = BpfProgram::from_expression(&bad, "ip", Linktype::ETHERNET, OUTPUT_SNAPLEN);
    assert!(matches!(res, Err(BpfError::MalformedBytecode(_))));
}
