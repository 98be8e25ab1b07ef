use crate::error::PcapError;
use crate::pcap::{
    parse_pcap_frame, parse_pcap_frame_be, parse_pcap_frame_modified,
    parse_pcap_frame_modified_be, parse_pcap_header, peek_caplen, LegacyPcapBlock, PcapHeader,
    PcapRecord, PCAP_HEADER_LEN,
};
use circular::Buffer;
use log::debug;
use nom::{IResult, Needed, Offset};
use std::io::{self, Read};
use std::iter::FusedIterator;

/// Default capacity of the reader buffer
pub const DEFAULT_CAPACITY: usize = 65536;

/// Largest record accepted, whatever the snapshot length declared by the stream
pub const MAXIMUM_SNAPLEN: u32 = 262_144;

/// Streaming reader over legacy pcap data
///
/// This reader is based on a circular buffer, which means memory usage is bounded by the
/// largest record, and that it can be used to parse huge files or infinite streams (for ex.
/// a live capture piped on stdin).
///
/// The global header is parsed by [`PcapReader::new`]; its byte order, timestamp resolution and
/// record layout are then used for all records. Records are produced by the `Iterator`
/// implementation as owned [`PcapRecord`] values:
///
/// - a record whose captured length exceeds the snapshot length yields
///   [`PcapError::OversizedRecord`] and ends the sequence,
/// - a trailing record cut short by the end of the stream ends the sequence without error
///   (see [`PcapReader::truncated`]),
/// - a failing `read()` yields [`PcapError::ReadError`] and ends the sequence.
///
/// ## Example
///
/// ```rust
/// use pcap_filter::*;
///
/// # let input: &[u8] = &[
/// #     0xd4, 0xc3, 0xb2, 0xa1, 2, 0, 4, 0, 0, 0, 0, 0, 0, 0, 0, 0,
/// #     0xff, 0xff, 0, 0, 1, 0, 0, 0,
/// # ];
/// let reader = PcapReader::new(DEFAULT_CAPACITY, input).expect("PcapReader");
/// println!("link type: {}", reader.header().network);
/// let mut num_records = 0;
/// for record in reader {
///     match record {
///         Ok(record) => {
///             println!("got {} bytes", record.caplen);
///             num_records += 1;
///         }
///         Err(e) => panic!("error while reading: {}", e),
///     }
/// }
/// println!("num_records: {}", num_records);
/// ```
pub struct PcapReader<R>
where
    R: Read,
{
    header: PcapHeader,
    reader: R,
    buffer: Buffer,
    consumed: usize,
    reader_exhausted: bool,
    truncated: bool,
    done: bool,
    parse: LegacyParseFn,
}

type LegacyParseFn = fn(&[u8]) -> IResult<&[u8], LegacyPcapBlock, PcapError<&[u8]>>;

impl<R> PcapReader<R>
where
    R: Read,
{
    /// Creates a new `PcapReader<R>` with the provided buffer capacity, and parses the global
    /// header.
    pub fn new(capacity: usize, reader: R) -> Result<PcapReader<R>, PcapError<&'static [u8]>> {
        let buffer = Buffer::with_capacity(capacity.max(PCAP_HEADER_LEN));
        Self::from_buffer(buffer, reader)
    }

    /// Creates a new `PcapReader<R>` using the provided `Buffer`.
    pub fn from_buffer(
        mut buffer: Buffer,
        mut reader: R,
    ) -> Result<PcapReader<R>, PcapError<&'static [u8]>> {
        if buffer.capacity() < PCAP_HEADER_LEN {
            buffer.grow(PCAP_HEADER_LEN);
        }
        let mut reader_exhausted = false;
        while buffer.available_data() < PCAP_HEADER_LEN && !reader_exhausted {
            let sz = read_retry(&mut reader, buffer.space())?;
            reader_exhausted = sz == 0;
            buffer.fill(sz);
        }
        if buffer.available_data() == 0 {
            return Err(PcapError::Eof);
        }
        let header = match parse_pcap_header(buffer.data()) {
            Ok((_, h)) => h,
            Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => return Err(e.to_owned_vec()),
            Err(nom::Err::Incomplete(_)) => return Err(PcapError::UnexpectedEof),
        };
        buffer.consume(header.size());
        let parse: LegacyParseFn = match (header.is_modified_format(), header.is_bigendian()) {
            (false, false) => parse_pcap_frame,
            (false, true) => parse_pcap_frame_be,
            (true, false) => parse_pcap_frame_modified,
            (true, true) => parse_pcap_frame_modified_be,
        };
        debug!(
            "pcap header: version {}.{}, link type {}, snaplen {}, {}-endian, {} timestamps",
            header.version_major,
            header.version_minor,
            header.network,
            header.snaplen,
            if header.is_bigendian() { "big" } else { "little" },
            if header.is_nanosecond_precision() {
                "nanosecond"
            } else {
                "microsecond"
            },
        );
        Ok(PcapReader {
            header,
            reader,
            buffer,
            consumed: PCAP_HEADER_LEN,
            reader_exhausted,
            truncated: false,
            done: false,
            parse,
        })
    }

    /// The global header of the stream
    pub fn header(&self) -> &PcapHeader {
        &self.header
    }

    /// Returns true if the stream ended in the middle of a record
    pub fn truncated(&self) -> bool {
        self.truncated
    }

    /// Get the number of consumed bytes, global header included
    pub fn consumed(&self) -> usize {
        self.consumed
    }

    /// Largest captured length accepted for a record of this stream
    ///
    /// The declared snapshot length is capped to [`MAXIMUM_SNAPLEN`]; 0 means no declared limit.
    pub fn max_record_len(&self) -> u32 {
        match self.header.snaplen {
            0 => MAXIMUM_SNAPLEN,
            n => n.min(MAXIMUM_SNAPLEN),
        }
    }

    /// Unwraps this reader, returning the underlying stream. Buffered data is lost.
    pub fn into_inner(self) -> R {
        self.reader
    }

    fn next_record(&mut self) -> Result<Option<PcapRecord>, PcapError<&'static [u8]>> {
        loop {
            if self.buffer.available_data() == 0 && self.reader_exhausted {
                return Ok(None);
            }
            if let Some(caplen) = peek_caplen(self.buffer.data(), self.header.is_bigendian()) {
                let snaplen = self.max_record_len();
                if caplen > snaplen {
                    return Err(PcapError::OversizedRecord { caplen, snaplen });
                }
            }
            let data = self.buffer.data();
            let parsed = match (self.parse)(data) {
                Ok((rem, block)) => Ok((data.offset(rem), block.to_owned_record())),
                Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => {
                    return Err(e.to_owned_vec())
                }
                Err(nom::Err::Incomplete(n)) => Err(n),
            };
            match parsed {
                Ok((offset, record)) => {
                    self.consumed += offset;
                    self.buffer.consume(offset);
                    return Ok(Some(record));
                }
                Err(n) => {
                    if self.reader_exhausted {
                        // expected more bytes but reader is EOF, truncated pcap
                        debug!(
                            "truncated record at offset {} ({} trailing bytes)",
                            self.consumed,
                            self.buffer.available_data()
                        );
                        self.truncated = true;
                        return Ok(None);
                    }
                    if let Needed::Size(n) = n {
                        let needed = self.buffer.available_data() + usize::from(n);
                        if needed > self.buffer.capacity() {
                            self.buffer.grow(needed);
                        }
                    }
                    self.refill()?;
                }
            }
        }
    }

    /// Refill the internal buffer, shifting it if necessary.
    fn refill(&mut self) -> Result<(), PcapError<&'static [u8]>> {
        self.buffer.shift();
        let space = self.buffer.space();
        // check if available space is empty, so we can distinguish
        // a read() returning 0 because of EOF or because we requested 0
        if space.is_empty() {
            return Ok(());
        }
        let sz = read_retry(&mut self.reader, space)?;
        self.reader_exhausted = sz == 0;
        self.buffer.fill(sz);
        Ok(())
    }
}

impl<R> Iterator for PcapReader<R>
where
    R: Read,
{
    type Item = Result<PcapRecord, PcapError<&'static [u8]>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.next_record() {
            Ok(Some(record)) => Some(Ok(record)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

impl<R> FusedIterator for PcapReader<R> where R: Read {}

fn read_retry<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<usize, PcapError<&'static [u8]>> {
    loop {
        match reader.read(buf) {
            Ok(sz) => return Ok(sz),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                debug!("read error: {}", e);
                return Err(PcapError::ReadError);
            }
        }
    }
}
