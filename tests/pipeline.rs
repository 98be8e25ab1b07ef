use hex_literal::hex;
use pcap_filter::*;
use std::fs;
use std::path::PathBuf;

// ldh [12]; jeq #0x800, 0, 1; ret #65535; ret #0
const IPV4_ONLY: &str = "4,40 0 0 12,21 0 1 2048,6 0 0 65535,6 0 0 0,";

// big-endian, microsecond, Ethernet, snaplen 65535, one 14-byte IPv6 frame header
const BE_CAPTURE: &[u8] = &hex!(
    "
a1 b2 c3 d4 00 02 00 04 00 00 00 00 00 00 00 00
00 00 ff ff 00 00 00 01
00 00 00 07 00 00 00 08 00 00 00 0e 00 00 00 0e
ff ff ff ff ff ff 00 11 22 33 44 55 86 dd"
);

fn frame(ethertype: u16, len: usize) -> Vec<u8> {
    let mut v = vec![0u8; len.max(14)];
    v[12..14].copy_from_slice(&ethertype.to_be_bytes());
    v
}

fn capture(frames: &[Vec<u8>], ts_base: u32) -> Vec<u8> {
    let mut w = PcapWriter::new(Vec::new(), Linktype::ETHERNET, OUTPUT_SNAPLEN).expect("writer");
    for (idx, f) in frames.iter().enumerate() {
        let record = PcapRecord::new(ts_base + idx as u32, 500, f.clone());
        w.write(&record.as_block()).expect("write");
    }
    w.into_inner().expect("flush")
}

fn new_pipeline(bytecode: Option<&str>) -> FilterPipeline<Vec<u8>> {
    let program = bytecode.map(|b| BpfProgram::from_bytecode(b).expect("bytecode"));
    let writer = PcapWriter::new(Vec::new(), OUTPUT_LINKTYPE, OUTPUT_SNAPLEN).expect("writer");
    FilterPipeline::new(program, writer)
}

fn read_all(output: &[u8]) -> Vec<PcapRecord> {
    PcapReader::new(DEFAULT_CAPACITY, output)
        .expect("reader")
        .collect::<Result<Vec<_>, _>>()
        .expect("records")
}

struct TempFile(PathBuf);

impl TempFile {
    fn new(name: &str, contents: &[u8]) -> TempFile {
        let path = std::env::temp_dir().join(format!(
            "pcap-filter-it-{}-{}",
            std::process::id(),
            name
        ));
        fs::write(&path, contents).expect("write temp file");
        TempFile(path)
    }

    fn input(&self) -> Input {
        Input::File(self.0.clone())
    }
}

impl Drop for TempFile {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.0);
    }
}

#[test]
fn test_concatenate_sources() {
    let a = capture(&[frame(0x0800, 60), frame(0x86dd, 60)], 100);
    let b = capture(&[frame(0x0800, 90), frame(0x0806, 42), frame(0x0800, 70)], 200);
    let mut p = new_pipeline(Some(IPV4_ONLY));
    assert_eq!(p.process_source("a", &a[..]).unwrap(), SourceOutcome::Completed);
    assert_eq!(p.process_source("b", &b[..]).unwrap(), SourceOutcome::Completed);
    let (stats, out) = p.finish().expect("finish");
    // a single global header, then the accepted packets of a, then those of b
    let recs = read_all(&out);
    let ts: Vec<u32> = recs.iter().map(|r| r.ts_sec).collect();
    assert_eq!(ts, vec![100, 200, 202]);
    assert_eq!(recs[1].caplen, 90);
    assert!(recs.iter().all(|r| r.ts_frac == 500));
    assert_eq!(stats.sources_read, 2);
    assert_eq!(stats.packets_read, 5);
    assert_eq!(stats.packets_accepted, 3);
    assert_eq!(stats.packets_rejected, 2);
}

#[test]
fn test_accept_length_from_accumulator() {
    // ld len; ret a
    let input = capture(&[frame(0x0800, 60), frame(0x86dd, 1500)], 0);
    let mut p = new_pipeline(Some("2,128 0 0 0,22 0 0 0"));
    p.process_source("in", &input[..]).expect("process");
    let (stats, out) = p.finish().expect("finish");
    assert_eq!(out, input);
    assert_eq!(stats.packets_truncated, 0);
}

#[test]
fn test_snap_length() {
    let input = capture(&[frame(0x0800, 100), frame(0x0800, 30)], 0);
    let mut p = new_pipeline(Some("1,6 0 0 64"));
    p.process_source("in", &input[..]).expect("process");
    let (_, out) = p.finish().expect("finish");
    let recs = read_all(&out);
    assert_eq!(recs.len(), 2);
    for (rec, wire) in recs.iter().zip([100, 30].iter()) {
        assert_eq!(rec.caplen, 64.min(*wire));
        assert_eq!(rec.data.len(), rec.caplen as usize);
        assert_eq!(rec.origlen, *wire);
        assert!(rec.origlen >= rec.caplen);
    }
}

#[test]
fn test_big_endian_source() {
    let mut p = new_pipeline(None);
    p.process_source("be", BE_CAPTURE).expect("process");
    let (_, out) = p.finish().expect("finish");
    let reader = PcapReader::new(DEFAULT_CAPACITY, &out[..]).expect("reader");
    assert!(!reader.header().is_bigendian());
    let recs = reader.collect::<Result<Vec<_>, _>>().expect("records");
    assert_eq!(recs.len(), 1);
    assert_eq!((recs[0].ts_sec, recs[0].ts_frac), (7, 8));
    assert_eq!(&recs[0].data[12..14], &[0x86, 0xdd]);
}

#[test]
fn test_truncated_source_then_next() {
    let mut a = capture(&[frame(0x0800, 60), frame(0x0800, 60)], 10);
    a.truncate(a.len() - 20);
    let b = capture(&[frame(0x0800, 60)], 20);
    let mut p = new_pipeline(None);
    assert_eq!(p.process_source("a", &a[..]).unwrap(), SourceOutcome::Truncated);
    assert_eq!(p.process_source("b", &b[..]).unwrap(), SourceOutcome::Completed);
    let (stats, out) = p.finish().expect("finish");
    let ts: Vec<u32> = read_all(&out).iter().map(|r| r.ts_sec).collect();
    assert_eq!(ts, vec![10, 20]);
    assert_eq!(stats.sources_truncated, 1);
}

#[test]
fn test_oversized_record_ends_source() {
    // snaplen 16, record claims 32 bytes
    let input = hex!(
        "
d4 c3 b2 a1 02 00 04 00 00 00 00 00 00 00 00 00
10 00 00 00 01 00 00 00
01 00 00 00 00 00 00 00 20 00 00 00 20 00 00 00"
    );
    let mut p = new_pipeline(None);
    let outcome = p.process_source("bad", &input[..]).expect("process");
    assert_eq!(outcome, SourceOutcome::Ended);
    assert_eq!(p.stats().sources_ended, 1);
}

#[test]
fn test_run_over_files() {
    let a = TempFile::new("a.pcap", &capture(&[frame(0x0800, 60)], 1));
    let garbage = TempFile::new("garbage.pcap", b"this is not a pcap file, just text");
    let b = TempFile::new("b.pcap", &capture(&[frame(0x0800, 60), frame(0x0800, 61)], 2));
    let missing = Input::File(PathBuf::from("/nonexistent/missing.pcap"));
    let mut p = new_pipeline(None);
    p.run(&[a.input(), garbage.input(), missing, b.input()])
        .expect("run");
    let (stats, out) = p.finish().expect("finish");
    assert_eq!(read_all(&out).len(), 3);
    assert_eq!(stats.sources_read, 2);
    assert_eq!(stats.sources_failed, 2);
}

#[test]
fn test_run_without_usable_input() {
    let garbage = TempFile::new("only-garbage.pcap", b"");
    let mut p = new_pipeline(None);
    let res = p.run(&[garbage.input()]);
    assert!(matches!(res, Err(PipelineError::NoUsableInput)));
    // the output is still a valid, empty, pcap stream
    let (_, out) = p.finish().expect("finish");
    assert!(read_all(&out).is_empty());
}

#[test]
fn test_malformed_bytecode() {
    for bytecode in &["", "2,6 0 0 0", "1,6 0 0", "1,6 0 zero 0", "1,70000 0 0 0"] {
        assert!(
            matches!(
                BpfProgram::from_bytecode(bytecode),
                Err(BpfError::MalformedBytecode(_))
            ),
            "{:?}",
            bytecode
        );
    }
}
