use clap::{Args, Parser, ValueEnum};
use simplelog::LevelFilter;
use std::path::PathBuf;

const AFTER_HELP: &str = "\
For example, to select only IP packets:

    pcap-filter -e \"ip\" < in.pcap > out.pcap
    pcap-filter -b \"4,40 0 0 12,21 0 1 2048,6 0 0 65535,6 0 0 0,\" in.pcap > out.pcap

where the bytecode might have been generated by tcpdump:

    tcpdump -p -n -ddd -i eth0 \"ip\" | tr \"\\n\" \",\"";

#[derive(Parser, Debug)]
#[command(
    name = "pcap-filter",
    version,
    about = "Read pcap data from stdin or given files, run it through a BPF filter and write \
             matching packets to stdout as pcap.",
    after_help = AFTER_HELP
)]
pub struct Cli {
    #[command(flatten)]
    pub filter: FilterArgs,

    /// BPF assembler used by --compile
    #[arg(long, value_name = "PROGRAM", default_value = "bpf_asm")]
    pub bpf_asm: PathBuf,

    /// Log level
    #[arg(long, value_enum, default_value_t = LogLevel::Warn)]
    pub log_level: LogLevel,

    /// Input pcap files, read in order ("-" for stdin) [default: stdin]
    pub files: Vec<PathBuf>,
}

/// Filter program source. Without any, all packets are accepted.
#[derive(Args, Debug)]
#[group(multiple = false)]
pub struct FilterArgs {
    /// Filter with the given BPF bytecode
    #[arg(short, long, value_name = "BYTECODE")]
    pub bytecode: Option<String>,

    /// Filter with the given BPF expression
    #[arg(short, long, value_name = "EXPR")]
    pub expr: Option<String>,

    /// Compile the given BPF file and use it as filter
    #[arg(short, long, value_name = "FILE")]
    pub compile: Option<PathBuf>,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => LevelFilter::Error,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Trace => LevelFilter::Trace,
        }
    }
}
