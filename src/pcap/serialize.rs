use crate::pcap::{LegacyPcapBlock, PcapHeader, PCAP_HEADER_LEN, PCAP_MAGIC};
use cookie_factory::bytes::{le_i32, le_u16, le_u32};
use cookie_factory::combinator::slice;
use cookie_factory::sequence::tuple;
use cookie_factory::{gen, GenError};

/// Common trait for all serialization functions
pub trait ToVec {
    /// Serialize to bytes representation (little-endian).
    /// Check values and fix all fields before serializing.
    fn to_vec(&mut self) -> Result<Vec<u8>, GenError> {
        self.fix();
        self.to_vec_raw()
    }

    /// Check and correct all fields: use magic, fix lengths fields and other values if possible.
    fn fix(&mut self) {}

    /// Serialize to bytes representation (little-endian). Do not check values
    fn to_vec_raw(&self) -> Result<Vec<u8>, GenError>;
}

impl ToVec for PcapHeader {
    /// Force the little-endian microsecond magic: records are always written in that layout
    fn fix(&mut self) {
        self.magic_number = PCAP_MAGIC;
    }

    fn to_vec_raw(&self) -> Result<Vec<u8>, GenError> {
        let mut v = Vec::with_capacity(PCAP_HEADER_LEN);

        gen(
            tuple((
                le_u32(self.magic_number),
                le_u16(self.version_major),
                le_u16(self.version_minor),
                le_i32(self.thiszone),
                le_u32(self.sigfigs),
                le_u32(self.snaplen),
                le_u32(self.network.0 as u32),
            )),
            &mut v,
        )
        .map(|res| res.0.to_vec())
    }
}

impl<'a> ToVec for LegacyPcapBlock<'a> {
    /// Make `caplen` match the data, and `origlen` at least as large
    fn fix(&mut self) {
        self.caplen = self.data.len() as u32;
        self.origlen = self.origlen.max(self.caplen);
    }

    fn to_vec_raw(&self) -> Result<Vec<u8>, GenError> {
        let mut v = Vec::with_capacity(self.data.len() + 16);

        gen(
            tuple((
                le_u32(self.ts_sec),
                le_u32(self.ts_usec),
                le_u32(self.caplen),
                le_u32(self.origlen),
                slice(self.data),
            )),
            &mut v,
        )
        // pcap records have no alignment constraints
        .map(|res| res.0.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pcap::frame::tests::FRAME_PCAP;
    use crate::pcap::header::tests::{PCAP_HDR, PCAP_HDR_BE};
    use crate::pcap::{parse_pcap_frame, parse_pcap_header};

    #[test]
    fn test_serialize_header() {
        let (_, hdr) = parse_pcap_header(PCAP_HDR).expect("header parsing failed");
        let v = hdr.to_vec_raw().expect("serialize");
        assert_eq!(v, PCAP_HDR);
    }
    #[test]
    fn test_serialize_header_fix_bigendian() {
        let (_, mut hdr) = parse_pcap_header(PCAP_HDR_BE).expect("header parsing failed");
        let v = hdr.to_vec().expect("serialize");
        let (rem, hdr2) = parse_pcap_header(&v).expect("header parsing failed");
        assert!(rem.is_empty());
        assert!(!hdr2.is_bigendian());
        assert_eq!(hdr2.snaplen, 65_535);
        assert_eq!(hdr2.network, hdr.network);
    }
    #[test]
    fn test_serialize_frame() {
        let (_, pkt) = parse_pcap_frame(FRAME_PCAP).expect("packet parsing failed");
        let v = pkt.to_vec_raw().expect("serialize");
        assert_eq!(v, FRAME_PCAP);
    }
    #[test]
    fn test_serialize_frame_fix() {
        let (_, mut pkt) = parse_pcap_frame(FRAME_PCAP).expect("packet parsing failed");
        pkt.data = &pkt.data[..20];
        let v = pkt.to_vec().expect("serialize");
        let (rem, pkt2) = parse_pcap_frame(&v).expect("packet parsing failed");
        assert!(rem.is_empty());
        assert_eq!(pkt2.caplen, 20);
        assert_eq!(pkt2.origlen, 74);
    }
}
