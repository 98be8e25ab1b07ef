use nom::number::streaming::{be_i32, be_u16, be_u32, le_i32, le_u16, le_u32};
use nom::IResult;

use crate::linktype::Linktype;
use crate::PcapError;

/// Magic number of a microsecond-resolution pcap file, read in file byte order
pub const PCAP_MAGIC: u32 = 0xa1b2_c3d4;
/// Magic number of a nanosecond-resolution pcap file, read in file byte order
pub const PCAP_MAGIC_NSEC: u32 = 0xa1b2_3c4d;
/// Magic number of the "modified" pcap format (extended record headers)
pub const PCAP_MAGIC_MODIFIED: u32 = 0xa1b2_cd34;

/// Size of the global header, in bytes
pub const PCAP_HEADER_LEN: usize = 24;

/// PCAP global header
#[derive(Clone, Debug, PartialEq)]
pub struct PcapHeader {
    /// File format and byte ordering. If equal to `0xa1b2c3d4` or `0xa1b23c4d` then the rest of
    /// the file uses native byte ordering. If `0xd4c3b2a1` or `0x4d3cb2a1` (swapped), then all
    /// following fields will have to be swapped too.
    pub magic_number: u32,
    /// Version major number (currently 2)
    pub version_major: u16,
    /// Version minor number (currently 4)
    pub version_minor: u16,
    /// The correction time in seconds between GMT (UTC) and the local timezone of the following packet header timestamps
    pub thiszone: i32,
    /// In theory, the accuracy of time stamps in the capture; in practice, all tools set it to 0
    pub sigfigs: u32,
    /// max len of captured packets, in octets
    pub snaplen: u32,
    /// Data link type
    pub network: Linktype,
}

impl PcapHeader {
    pub fn new() -> PcapHeader {
        PcapHeader {
            magic_number: PCAP_MAGIC, // native order
            version_major: 2,
            version_minor: 4,
            thiszone: 0,
            sigfigs: 0,
            snaplen: 0,
            network: Linktype::ETHERNET,
        }
    }

    /// Header for an output stream with the given link type and snapshot length
    pub fn with_params(network: Linktype, snaplen: u32) -> PcapHeader {
        PcapHeader {
            snaplen,
            network,
            ..PcapHeader::new()
        }
    }

    pub const fn size(&self) -> usize {
        PCAP_HEADER_LEN
    }

    pub fn is_bigendian(&self) -> bool {
        (self.magic_number & 0xFFFF) == 0xb2a1 // works for both nanosecond and microsecond resolution timestamps
    }

    pub fn is_modified_format(&self) -> bool {
        self.magic_number == PCAP_MAGIC_MODIFIED || self.magic_number == PCAP_MAGIC_MODIFIED.swap_bytes()
    }

    pub fn is_nanosecond_precision(&self) -> bool {
        self.magic_number == PCAP_MAGIC_NSEC || self.magic_number == PCAP_MAGIC_NSEC.swap_bytes()
    }

    /// Size of each record header following this global header
    pub fn record_header_size(&self) -> usize {
        if self.is_modified_format() {
            24
        } else {
            16
        }
    }
}

impl Default for PcapHeader {
    fn default() -> Self {
        PcapHeader::new()
    }
}

/// Read the PCAP global header
///
/// The global header contains the PCAP description and options
pub fn parse_pcap_header(i: &[u8]) -> IResult<&[u8], PcapHeader, PcapError<&[u8]>> {
    let (i, magic_number) = le_u32(i)?;
    match magic_number {
        PCAP_MAGIC | PCAP_MAGIC_NSEC | PCAP_MAGIC_MODIFIED => {
            let (i, version_major) = le_u16(i)?;
            let (i, version_minor) = le_u16(i)?;
            let (i, thiszone) = le_i32(i)?;
            let (i, sigfigs) = le_u32(i)?;
            let (i, snaplen) = le_u32(i)?;
            let (i, network) = le_i32(i)?;
            let header = PcapHeader {
                magic_number,
                version_major,
                version_minor,
                thiszone,
                sigfigs,
                snaplen,
                network: Linktype(network),
            };
            Ok((i, header))
        }
        0xd4c3_b2a1 | 0x4d3c_b2a1 | 0x34cd_b2a1 => {
            let (i, version_major) = be_u16(i)?;
            let (i, version_minor) = be_u16(i)?;
            let (i, thiszone) = be_i32(i)?;
            let (i, sigfigs) = be_u32(i)?;
            let (i, snaplen) = be_u32(i)?;
            let (i, network) = be_i32(i)?;
            let header = PcapHeader {
                magic_number,
                version_major,
                version_minor,
                thiszone,
                sigfigs,
                snaplen,
                network: Linktype(network),
            };
            Ok((i, header))
        }
        _ => Err(nom::Err::Error(PcapError::BadMagic(magic_number))),
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use hex_literal::hex;

    // ntp.pcap header
    pub const PCAP_HDR: &[u8] = &hex!(
        "
D4 C3 B2 A1 02 00 04 00 00 00 00 00 00 00 00 00
00 00 04 00 01 00 00 00"
    );

    // pcap header with nanosecond-precision timestamping
    pub const PCAP_HDR_NSEC: &[u8] = &hex!(
        "
4D 3C B2 A1 02 00 04 00 00 00 00 00 00 00 00 00
00 00 04 00 01 00 00 00"
    );

    // big-endian header, raw IP link type, snaplen 65535
    pub const PCAP_HDR_BE: &[u8] = &hex!(
        "
A1 B2 C3 D4 00 02 00 04 00 00 00 00 00 00 00 00
00 00 FF FF 00 00 00 65"
    );

    #[test]
    fn test_parse_pcap_header() {
        let (rem, hdr) = parse_pcap_header(PCAP_HDR).expect("header parsing failed");
        assert!(rem.is_empty());
        assert_eq!(hdr.magic_number, 0xa1b2_c3d4);
        assert_eq!(hdr.version_major, 2);
        assert_eq!(hdr.version_minor, 4);
        assert_eq!(hdr.snaplen, 262_144);
        assert_eq!(hdr.network, Linktype::ETHERNET);
        assert!(!hdr.is_bigendian());
        assert!(!hdr.is_nanosecond_precision());
    }
    #[test]
    fn test_parse_nanosecond_precision_pcap_header() {
        let (rem, hdr) = parse_pcap_header(PCAP_HDR_NSEC).expect("header parsing failed");
        assert!(rem.is_empty());
        assert_eq!(hdr.magic_number, 0xa1b2_3c4d);
        assert_eq!(hdr.snaplen, 262_144);
        assert!(hdr.is_nanosecond_precision());
    }
    #[test]
    fn test_parse_bigendian_pcap_header() {
        let (rem, hdr) = parse_pcap_header(PCAP_HDR_BE).expect("header parsing failed");
        assert!(rem.is_empty());
        assert!(hdr.is_bigendian());
        assert_eq!(hdr.version_major, 2);
        assert_eq!(hdr.version_minor, 4);
        assert_eq!(hdr.snaplen, 65_535);
        assert_eq!(hdr.network, Linktype::RAW);
        assert_eq!(hdr.record_header_size(), 16);
    }
    #[test]
    fn test_parse_bad_magic() {
        let mut data = PCAP_HDR.to_vec();
        data[..4].copy_from_slice(&[0x0a, 0x0d, 0x0d, 0x0a]);
        match parse_pcap_header(&data) {
            Err(nom::Err::Error(PcapError::BadMagic(m))) => assert_eq!(m, 0x0a0d_0d0a),
            r => panic!("unexpected result {:?}", r),
        }
    }
    #[test]
    fn test_parse_short_header() {
        let res = parse_pcap_header(&PCAP_HDR[..10]);
        assert!(matches!(res, Err(nom::Err::Incomplete(_))));
    }
}
