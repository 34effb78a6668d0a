use crate::capture::{
    CaptureMetadata, MAGIC_PCAP_MICROSECONDS, MAGIC_PCAP_NANOSECONDS, RawFrame, timestamp,
};
use crate::error::{CaptureError, ReadError};
use crate::frame::FrameHeader;
use crate::reader::{Endian, Reader};
use log::warn;

pub const HEADER_LENGTH: usize = 24;
pub const RECORD_HEADER_LENGTH: usize = 16;

pub fn is_magic(magic: u32) -> bool {
    resolution(magic).is_some()
}

// Byte order and timestamp units per second, from the magic read little-endian.
fn resolution(magic: u32) -> Option<(Endian, u64)> {
    match magic {
        MAGIC_PCAP_MICROSECONDS => Some((Endian::Little, 1_000_000)),
        MAGIC_PCAP_NANOSECONDS => Some((Endian::Little, 1_000_000_000)),
        _ => match magic.swap_bytes() {
            MAGIC_PCAP_MICROSECONDS => Some((Endian::Big, 1_000_000)),
            MAGIC_PCAP_NANOSECONDS => Some((Endian::Big, 1_000_000_000)),
            _ => None,
        },
    }
}

pub fn parse<'a>(
    bytes: &'a [u8], metadata: &mut CaptureMetadata, mut sink: impl FnMut(RawFrame<'a>),
) -> Result<(), CaptureError> {
    let mut reader = Reader::new(bytes);

    let magic = reader.read_u32(Endian::Little)?;
    let (endian, units) = resolution(magic).ok_or(CaptureError::UnknownFormat(magic))?;
    metadata.version_major = reader.read_u16(endian)?;
    metadata.version_minor = reader.read_u16(endian)?;
    // thiszone, sigfigs
    reader.skip(8)?;
    metadata.snap_length = reader.read_u32(endian)?;
    // The upper half carries FCS flags.
    metadata.link_type = (reader.read_u32(endian)? & 0xFFFF) as u16;

    while !reader.is_empty() {
        let offset = reader.position();
        match read_record(&mut reader, endian, units) {
            Ok((header, data)) => sink(RawFrame {
                header,
                link_type: metadata.link_type,
                data,
            }),
            Err(err) => {
                warn!("pcap record at offset {} is truncated, parse stops here. {}", offset, err);
                break;
            },
        }
    }

    Ok(())
}

fn read_record<'a>(
    reader: &mut Reader<'a>, endian: Endian, units: u64,
) -> Result<(FrameHeader, &'a [u8]), ReadError> {
    let seconds = reader.read_u32(endian)? as u64;
    let fraction = reader.read_u32(endian)? as u64;
    let captured_length = reader.read_u32(endian)?;
    let original_length = reader.read_u32(endian)?;
    let data = reader.take(captured_length as usize)?;

    let (timestamp_ms, timestamp_ns) = timestamp(seconds * units + fraction, units);
    let header = FrameHeader {
        timestamp_ms,
        timestamp_ns,
        captured_length,
        original_length,
        interface_id: 0,
    };

    Ok((header, data))
}
