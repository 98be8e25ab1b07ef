use nom::bytes::streaming::take;
use nom::IResult;

use crate::utils::array_ref4;
use crate::PcapError;

/// Container for network data in legacy Pcap files
#[derive(Debug, PartialEq)]
pub struct LegacyPcapBlock<'a> {
    pub ts_sec: u32,
    pub ts_usec: u32,
    pub caplen: u32,
    pub origlen: u32,
    pub data: &'a [u8],
}

impl<'a> LegacyPcapBlock<'a> {
    /// Copy block contents into an owned record
    pub fn to_owned_record(&self) -> PcapRecord {
        PcapRecord {
            ts_sec: self.ts_sec,
            ts_frac: self.ts_usec,
            caplen: self.caplen,
            origlen: self.origlen,
            data: self.data.to_vec(),
        }
    }
}

/// A packet record detached from the reader buffer
///
/// `ts_frac` is expressed in the resolution of the stream it was read from
/// (microseconds or nanoseconds, see
/// [`PcapHeader::is_nanosecond_precision`](crate::PcapHeader::is_nanosecond_precision)).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PcapRecord {
    pub ts_sec: u32,
    pub ts_frac: u32,
    pub caplen: u32,
    pub origlen: u32,
    pub data: Vec<u8>,
}

impl PcapRecord {
    /// Build a record from captured bytes, with `caplen == origlen == data.len()`
    pub fn new(ts_sec: u32, ts_frac: u32, data: Vec<u8>) -> PcapRecord {
        let len = data.len() as u32;
        PcapRecord {
            ts_sec,
            ts_frac,
            caplen: len,
            origlen: len,
            data,
        }
    }

    /// Borrow the record as a block, ready to be serialized
    pub fn as_block(&self) -> LegacyPcapBlock {
        LegacyPcapBlock {
            ts_sec: self.ts_sec,
            ts_usec: self.ts_frac,
            caplen: self.caplen,
            origlen: self.origlen,
            data: &self.data,
        }
    }
}

/// Read the captured length of the record starting at `i`, without consuming it
///
/// Returns `None` if the record header is not complete yet.
pub fn peek_caplen(i: &[u8], big_endian: bool) -> Option<u32> {
    if i.len() < 12 {
        return None;
    }
    let raw = *array_ref4(i, 8);
    Some(if big_endian {
        u32::from_be_bytes(raw)
    } else {
        u32::from_le_bytes(raw)
    })
}

/// Read a PCAP record header and data
///
/// Each PCAP record starts with a small header, and is followed by packet data.
/// The packet data format depends on the LinkType.
pub fn parse_pcap_frame(i: &[u8]) -> IResult<&[u8], LegacyPcapBlock, PcapError<&[u8]>> {
    parse_frame(i, 16, u32::from_le_bytes)
}

/// Read a PCAP record header and data (big-endian)
///
/// Each PCAP record starts with a small header, and is followed by packet data.
/// The packet data format depends on the LinkType.
pub fn parse_pcap_frame_be(i: &[u8]) -> IResult<&[u8], LegacyPcapBlock, PcapError<&[u8]>> {
    parse_frame(i, 16, u32::from_be_bytes)
}

/// Read a PCAP record header and data ("modified" pcap format)
///
/// Records carry 8 more header bytes (interface index, protocol, packet type) which are
/// skipped.
pub fn parse_pcap_frame_modified(i: &[u8]) -> IResult<&[u8], LegacyPcapBlock, PcapError<&[u8]>> {
    parse_frame(i, 24, u32::from_le_bytes)
}

/// Read a PCAP record header and data ("modified" pcap format, big-endian)
pub fn parse_pcap_frame_modified_be(
    i: &[u8],
) -> IResult<&[u8], LegacyPcapBlock, PcapError<&[u8]>> {
    parse_frame(i, 24, u32::from_be_bytes)
}

#[inline]
fn parse_frame(
    i: &[u8],
    header_len: usize,
    read_u32: fn([u8; 4]) -> u32,
) -> IResult<&[u8], LegacyPcapBlock, PcapError<&[u8]>> {
    if i.len() < header_len {
        return Err(nom::Err::Incomplete(nom::Needed::new(header_len - i.len())));
    }
    let ts_sec = read_u32(*array_ref4(i, 0));
    let ts_usec = read_u32(*array_ref4(i, 4));
    let caplen = read_u32(*array_ref4(i, 8));
    let origlen = read_u32(*array_ref4(i, 12));
    let (i, data) = take(caplen as usize)(&i[header_len..])?;
    let block = LegacyPcapBlock {
        ts_sec,
        ts_usec,
        caplen,
        origlen,
        data,
    };
    Ok((i, block))
}
