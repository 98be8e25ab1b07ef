use crate::linktype::Linktype;
use crate::pcap::serialize::ToVec;
use crate::pcap::{LegacyPcapBlock, PcapHeader};
use cookie_factory::GenError;
use std::io::{self, Write};
use thiserror::Error;

/// Errors raised while writing a pcap stream
#[derive(Error, Debug)]
pub enum WriteError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Serialization error: {0:?}")]
    Serialize(GenError),
    #[error("Record length {caplen} exceeds snapshot length {snaplen}")]
    OversizedRecord { caplen: u32, snaplen: u32 },
    #[error("Record declares {caplen} captured bytes but carries {len}")]
    LengthMismatch { caplen: u32, len: usize },
}

impl From<GenError> for WriteError {
    fn from(e: GenError) -> Self {
        match e {
            GenError::IoError(e) => WriteError::Io(e),
            e => WriteError::Serialize(e),
        }
    }
}

impl WriteError {
    /// Returns true if the sink was closed by its reader (for ex. a pager that exited)
    pub fn is_broken_pipe(&self) -> bool {
        matches!(self, WriteError::Io(e) if e.kind() == io::ErrorKind::BrokenPipe)
    }
}

/// Pcap stream writer
///
/// The global header is written once, when the writer is created. All records written
/// afterwards share its link type and must fit in its snapshot length. Output is always the
/// little-endian, microsecond-resolution variant of the format.
pub struct PcapWriter<W>
where
    W: Write,
{
    header: PcapHeader,
    writer: W,
    written: u64,
}

impl<W> PcapWriter<W>
where
    W: Write,
{
    /// Creates a new `PcapWriter<W>`, and writes the global header.
    pub fn new(
        mut writer: W,
        network: Linktype,
        snaplen: u32,
    ) -> Result<PcapWriter<W>, WriteError> {
        let mut header = PcapHeader::with_params(network, snaplen);
        let v = header.to_vec()?;
        writer.write_all(&v)?;
        Ok(PcapWriter {
            header,
            writer,
            written: 0,
        })
    }

    /// Write one packet record
    pub fn write(&mut self, block: &LegacyPcapBlock) -> Result<(), WriteError> {
        if block.caplen > self.header.snaplen {
            return Err(WriteError::OversizedRecord {
                caplen: block.caplen,
                snaplen: self.header.snaplen,
            });
        }
        if block.data.len() != block.caplen as usize {
            return Err(WriteError::LengthMismatch {
                caplen: block.caplen,
                len: block.data.len(),
            });
        }
        let v = block.to_vec_raw()?;
        self.writer.write_all(&v)?;
        self.written += 1;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<(), WriteError> {
        self.writer.flush()?;
        Ok(())
    }

    /// The global header written at creation
    pub fn header(&self) -> &PcapHeader {
        &self.header
    }

    pub fn snaplen(&self) -> u32 {
        self.header.snaplen
    }

    /// Number of records written so far
    pub fn written(&self) -> u64 {
        self.written
    }

    /// Flush and return the underlying sink
    pub fn into_inner(mut self) -> Result<W, WriteError> {
        self.flush()?;
        Ok(self.writer)
    }
}
