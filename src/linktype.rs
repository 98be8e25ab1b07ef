use rusticata_macros::newtype_enum;

/// Data link type, as stored in the pcap global header
///
/// Filter programs are compiled for a link type: offsets in the program are relative to the
/// start of the link-layer header. Output streams always use [`Linktype::ETHERNET`].
///
/// See <http://www.tcpdump.org/linktypes.html>
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Linktype(pub i32);

newtype_enum! {
impl display Linktype {
    NULL = 0,
    ETHERNET = 1,
    RAW = 101,
    LOOP = 108,
    LINUX_SLL = 113,
    LINUX_SLL2 = 276,
    IPV4 = 228,
    IPV6 = 229,
}
}
