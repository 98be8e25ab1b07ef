use nom::error::{ErrorKind, ParseError};
use std::fmt;

/// Errors raised while reading a pcap stream
#[derive(Debug, PartialEq)]
pub enum PcapError<I: Sized> {
    /// No more data available
    Eof,
    /// Expected more data but got EOF
    UnexpectedEof,
    /// An error happened during a `read()` operation
    ReadError,

    /// The global header magic number does not match any known pcap variant
    BadMagic(u32),
    /// A record declares more captured bytes than the stream snapshot length
    OversizedRecord { caplen: u32, snaplen: u32 },

    /// An error encountered during parsing
    NomError(I, ErrorKind),
    /// An error encountered during parsing (owned version)
    OwnedNomError(Vec<u8>, ErrorKind),
}

impl<I> PcapError<I> {
    /// Creates a `PcapError` from input and error kind.
    pub fn from_data(input: I, errorkind: ErrorKind) -> Self {
        Self::NomError(input, errorkind)
    }
}

impl<I> PcapError<I>
where
    I: AsRef<[u8]> + Sized,
{
    /// Creates an owned `PcapError` object from borrowed data, cloning object.
    /// Owned object has `'static` lifetime.
    pub fn to_owned_vec(&self) -> PcapError<&'static [u8]> {
        match self {
            PcapError::Eof => PcapError::Eof,
            PcapError::UnexpectedEof => PcapError::UnexpectedEof,
            PcapError::ReadError => PcapError::ReadError,
            PcapError::BadMagic(m) => PcapError::BadMagic(*m),
            PcapError::OversizedRecord { caplen, snaplen } => PcapError::OversizedRecord {
                caplen: *caplen,
                snaplen: *snaplen,
            },
            PcapError::NomError(i, e) => PcapError::OwnedNomError(i.as_ref().to_vec(), *e),
            PcapError::OwnedNomError(v, e) => PcapError::OwnedNomError(v.clone(), *e),
        }
    }
}

impl<I> ParseError<I> for PcapError<I> {
    fn from_error_kind(input: I, kind: ErrorKind) -> Self {
        PcapError::NomError(input, kind)
    }
    fn append(input: I, kind: ErrorKind, _other: Self) -> Self {
        PcapError::NomError(input, kind)
    }
}

impl<I> fmt::Display for PcapError<I>
where
    I: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            PcapError::Eof => write!(f, "End of file"),
            PcapError::UnexpectedEof => write!(f, "Unexpected end of file"),
            PcapError::ReadError => write!(f, "Read error"),
            PcapError::BadMagic(m) => write!(f, "Header not recognized (magic {:#010x})", m),
            PcapError::OversizedRecord { caplen, snaplen } => write!(
                f,
                "Record length {} exceeds snapshot length {}",
                caplen, snaplen
            ),
            PcapError::NomError(i, e) => write!(f, "Internal parser error {:?}, input {:?}", e, i),
            PcapError::OwnedNomError(i, e) => {
                write!(f, "Internal parser error {:?}, input {:?}", e, &i)
            }
        }
    }
}

impl<I> std::error::Error for PcapError<I> where I: fmt::Debug {}
