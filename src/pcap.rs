//! PCAP file format
//!
//! See <https://wiki.wireshark.org/Development/LibpcapFileFormat> for details.
//!
//! A PCAP stream is made of a global header ([`PcapHeader`]) followed by packet records. The
//! header magic gives the byte order and timestamp resolution of the records that follow.
//!
//! Streams are read with [`PcapReader`], a buffered streaming parser producing owned
//! [`PcapRecord`] values, and written with [`PcapWriter`]. The lower-level parsing functions
//! ([`parse_pcap_header`], [`parse_pcap_frame`] and variants) work on in-memory slices and return
//! `nom::Err::Incomplete` when more data is needed.

mod frame;
mod header;
mod reader;
mod serialize;
mod writer;

pub use frame::*;
pub use header::*;
pub use reader::*;
pub use serialize::*;
pub use writer::*;
