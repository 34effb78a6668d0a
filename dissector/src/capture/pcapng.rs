use crate::capture::{
    BLOCK_CUSTOM, BLOCK_CUSTOM_DO_NOT_COPY, BLOCK_ENHANCED_PACKET, BLOCK_INTERFACE_DESCRIPTION,
    BLOCK_INTERFACE_STATISTICS, BLOCK_NAME_RESOLUTION, BLOCK_SECTION_HEADER, BLOCK_SIMPLE_PACKET,
    BYTE_ORDER_MAGIC, CaptureMetadata, Interface, InterfaceStatistics, RawFrame, SectionInfo,
    timestamp,
};
use crate::error::{CaptureError, ReadError};
use crate::frame::FrameHeader;
use crate::reader::{Endian, Reader};
use log::{debug, warn};

// Type, leading length, trailing length.
pub const BLOCK_FRAMING_LENGTH: usize = 12;

pub mod option_code {
    pub const END_OF_OPTIONS: u16 = 0;

    pub const SHB_HARDWARE: u16 = 2;
    pub const SHB_OS: u16 = 3;
    pub const SHB_USER_APPLICATION: u16 = 4;

    pub const IF_NAME: u16 = 2;
    pub const IF_DESCRIPTION: u16 = 3;
    pub const IF_TSRESOL: u16 = 9;

    pub const ISB_IFRECV: u16 = 4;
    pub const ISB_IFDROP: u16 = 5;
    pub const ISB_OSDROP: u16 = 7;
    pub const ISB_USRDELIV: u16 = 8;
}

/// Per-section state: byte order and where its interfaces start in the
/// capture-wide interface list.
struct Section {
    endian: Endian,
    first_interface: usize,
}

pub fn parse<'a>(
    bytes: &'a [u8], metadata: &mut CaptureMetadata, mut sink: impl FnMut(RawFrame<'a>),
) -> Result<(), CaptureError> {
    let mut reader = Reader::new(bytes);
    let mut section = Section {
        endian: Endian::Little,
        first_interface: 0,
    };

    while !reader.is_empty() {
        let offset = reader.position();

        if reader.left() < BLOCK_FRAMING_LENGTH {
            warn!("pcapng block at offset {} is truncated, parse stops here.", offset);
            break;
        }

        let block_type = reader.read_u32(section.endian)?;
        if block_type == BLOCK_SECTION_HEADER {
            section = Section {
                endian: section_endian(&reader)?,
                first_interface: metadata.interfaces.len(),
            };
        }
        let endian = section.endian;

        let length = reader.read_u32(endian)?;
        let body_length = (length as usize)
            .checked_sub(BLOCK_FRAMING_LENGTH)
            .ok_or(CaptureError::InvalidHeader("block is shorter than its framing"))?;

        let (body, trailing) = match read_body(&mut reader, body_length, endian) {
            Ok(value) => value,
            Err(err) => {
                warn!("pcapng block at offset {} is truncated, parse stops here. {}", offset, err);
                break;
            },
        };
        if trailing != length {
            return Err(CaptureError::BlockLengthMismatch {
                offset,
                leading: length,
                trailing,
            });
        }

        let mut body = Reader::new(body);
        let result = match block_type {
            BLOCK_SECTION_HEADER => read_section_header(&mut body, endian, metadata),
            BLOCK_INTERFACE_DESCRIPTION => read_interface(&mut body, endian, metadata),
            BLOCK_ENHANCED_PACKET => {
                read_enhanced_packet(&mut body, &section, metadata).map(|frame| {
                    if let Some(frame) = frame {
                        sink(frame);
                    }
                })
            },
            BLOCK_SIMPLE_PACKET => read_simple_packet(&mut body, &section, metadata).map(|frame| {
                if let Some(frame) = frame {
                    sink(frame);
                }
            }),
            BLOCK_INTERFACE_STATISTICS => read_statistics(&mut body, &section, metadata),
            BLOCK_NAME_RESOLUTION => {
                debug!("pcapng name resolution block at offset {} skipped.", offset);
                Ok(())
            },
            BLOCK_CUSTOM | BLOCK_CUSTOM_DO_NOT_COPY => {
                debug!("pcapng custom block at offset {} skipped.", offset);
                Ok(())
            },
            _ => {
                debug!(
                    "pcapng block type {:#010x} at offset {} is unknown, skipped.",
                    block_type, offset
                );
                Ok(())
            },
        };

        if let Err(err) = result {
            warn!("pcapng block at offset {} is malformed, skipped. {}", offset, err);
        }
    }

    Ok(())
}

// Byte order magic sits right after the leading length.
fn section_endian(reader: &Reader) -> Result<Endian, CaptureError> {
    let magic = match reader.remaining().get(4..8) {
        Some([a, b, c, d]) => u32::from_le_bytes([*a, *b, *c, *d]),
        _ => return Err(CaptureError::InvalidHeader("section header is truncated")),
    };

    if magic == BYTE_ORDER_MAGIC {
        Ok(Endian::Little)
    } else if magic.swap_bytes() == BYTE_ORDER_MAGIC {
        Ok(Endian::Big)
    } else {
        Err(CaptureError::InvalidHeader("unknown byte order magic"))
    }
}

fn read_body<'a>(
    reader: &mut Reader<'a>, length: usize, endian: Endian,
) -> Result<(&'a [u8], u32), ReadError> {
    let body = reader.take(length)?;
    let trailing = reader.read_u32(endian)?;
    Ok((body, trailing))
}

/// Options as `(code, value)` until the end marker or the end of the body.
fn read_options<'a>(
    reader: &mut Reader<'a>, endian: Endian,
) -> Result<Vec<(u16, &'a [u8])>, ReadError> {
    let mut options = vec![];

    while reader.left() >= 4 {
        let code = reader.read_u16(endian)?;
        let length = reader.read_u16(endian)? as usize;
        if code == option_code::END_OF_OPTIONS {
            break;
        }

        let value = reader.take(length)?;
        let padding = (4 - length % 4) % 4;
        reader.skip(padding.min(reader.left()))?;
        options.push((code, value));
    }

    Ok(options)
}

fn option_string(value: &[u8]) -> String {
    String::from_utf8_lossy(value)
        .trim_end_matches('\0')
        .to_string()
}

fn option_u64(value: &[u8], endian: Endian) -> Option<u64> {
    Reader::new(value).read_u64(endian).ok()
}

fn read_section_header(
    body: &mut Reader, endian: Endian, metadata: &mut CaptureMetadata,
) -> Result<(), ReadError> {
    // Byte order magic, already checked.
    body.skip(4)?;
    let mut info = SectionInfo {
        version_major: body.read_u16(endian)?,
        version_minor: body.read_u16(endian)?,
        ..Default::default()
    };
    // Section length, commonly -1.
    body.skip(8)?;

    for (code, value) in read_options(body, endian)? {
        match code {
            option_code::SHB_HARDWARE => info.hardware = Some(option_string(value)),
            option_code::SHB_OS => info.os = Some(option_string(value)),
            option_code::SHB_USER_APPLICATION => info.application = Some(option_string(value)),
            _ => {},
        }
    }

    if metadata.sections.is_empty() {
        metadata.version_major = info.version_major;
        metadata.version_minor = info.version_minor;
    }
    metadata.sections.push(info);
    Ok(())
}

fn read_interface(
    body: &mut Reader, endian: Endian, metadata: &mut CaptureMetadata,
) -> Result<(), ReadError> {
    let mut interface = Interface {
        link_type: body.read_u16(endian)?,
        ..Default::default()
    };
    // Reserved
    body.skip(2)?;
    interface.snap_length = body.read_u32(endian)?;

    for (code, value) in read_options(body, endian)? {
        match code {
            option_code::IF_NAME => interface.name = Some(option_string(value)),
            option_code::IF_DESCRIPTION => interface.description = Some(option_string(value)),
            option_code::IF_TSRESOL => {
                if let Some(resolution) = value.first() {
                    interface.timestamp_resolution = *resolution;
                }
            },
            _ => {},
        }
    }

    if metadata.interfaces.is_empty() {
        metadata.link_type = interface.link_type;
        metadata.snap_length = interface.snap_length;
    }
    metadata.interfaces.push(interface);
    Ok(())
}

fn interface<'m>(
    metadata: &'m CaptureMetadata, section: &Section, id: u32,
) -> Option<(usize, &'m Interface)> {
    let index = section.first_interface.checked_add(id as usize)?;
    metadata.interfaces.get(index).map(|interface| (index, interface))
}

fn read_timestamp(
    body: &mut Reader, endian: Endian, interface: &Interface,
) -> Result<(u64, u64), ReadError> {
    let high = body.read_u32(endian)? as u64;
    let low = body.read_u32(endian)? as u64;
    let value = (high << 32) | low;
    Ok(timestamp(value, interface.units_per_second().unwrap_or_default()))
}

fn read_enhanced_packet<'a>(
    body: &mut Reader<'a>, section: &Section, metadata: &CaptureMetadata,
) -> Result<Option<RawFrame<'a>>, ReadError> {
    let endian = section.endian;
    let id = body.read_u32(endian)?;
    let (index, interface) = match interface(metadata, section, id) {
        Some(value) => value,
        None => {
            warn!("Enhanced packet refers to unknown interface {}, skipped.", id);
            return Ok(None);
        },
    };

    let (timestamp_ms, timestamp_ns) = read_timestamp(body, endian, interface)?;
    let captured_length = body.read_u32(endian)?;
    let original_length = body.read_u32(endian)?;
    let data = body.take(captured_length as usize)?;

    Ok(Some(RawFrame {
        header: FrameHeader {
            timestamp_ms,
            timestamp_ns,
            captured_length,
            original_length,
            interface_id: index as u32,
        },
        link_type: interface.link_type,
        data,
    }))
}

// No timestamp and no captured length: the packet fills the body up to the
// original length or the snap length, whichever is shorter.
fn read_simple_packet<'a>(
    body: &mut Reader<'a>, section: &Section, metadata: &CaptureMetadata,
) -> Result<Option<RawFrame<'a>>, ReadError> {
    let (index, interface) = match interface(metadata, section, 0) {
        Some(value) => value,
        None => {
            warn!("Simple packet without an interface, skipped.");
            return Ok(None);
        },
    };

    let original_length = body.read_u32(section.endian)?;
    let mut captured = (original_length as usize).min(body.left());
    if interface.snap_length > 0 {
        captured = captured.min(interface.snap_length as usize);
    }
    let data = body.take(captured)?;

    Ok(Some(RawFrame {
        header: FrameHeader {
            captured_length: captured as u32,
            original_length,
            interface_id: index as u32,
            ..Default::default()
        },
        link_type: interface.link_type,
        data,
    }))
}

fn read_statistics(
    body: &mut Reader, section: &Section, metadata: &mut CaptureMetadata,
) -> Result<(), ReadError> {
    let endian = section.endian;
    let id = body.read_u32(endian)?;
    let (index, interface) = match interface(metadata, section, id) {
        Some((index, interface)) => (index, interface.clone()),
        None => (id as usize, Interface::default()),
    };

    let (timestamp_ms, _) = read_timestamp(body, endian, &interface)?;
    let mut statistics = InterfaceStatistics {
        interface_id: index as u32,
        timestamp_ms,
        ..Default::default()
    };

    for (code, value) in read_options(body, endian)? {
        let counter = option_u64(value, endian);
        match code {
            option_code::ISB_IFRECV => statistics.received = counter,
            option_code::ISB_IFDROP => statistics.dropped = counter,
            option_code::ISB_OSDROP => statistics.os_dropped = counter,
            option_code::ISB_USRDELIV => statistics.delivered = counter,
            _ => {},
        }
    }

    metadata.statistics.push(statistics);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::{self, CaptureFormat};
    use crate::test_utils;

    fn collect(bytes: &[u8]) -> Result<(CaptureMetadata, Vec<RawFrame<'_>>), CaptureError> {
        let mut metadata = CaptureMetadata::default();
        let mut frames = vec![];
        capture::parse(bytes, &mut metadata, |frame| frames.push(frame))?;
        Ok((metadata, frames))
    }

    #[test]
    fn test_enhanced_packets() {
        let first = [0x01u8; 42];
        let second = [0x02u8; 7];
        let file = test_utils::pcapng_file(1, &[&first[..], &second[..]]);

        let (metadata, frames) = collect(&file).unwrap();
        assert_eq!(metadata.format, CaptureFormat::PcapNg);
        assert_eq!(metadata.link_type, 1);
        assert_eq!(metadata.sections.len(), 1);
        assert_eq!(metadata.interfaces.len(), 1);

        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].data, &first[..]);
        assert_eq!(frames[1].data, &second[..]);
        assert_eq!(
            frames[1].header,
            FrameHeader {
                timestamp_ms: 2000,
                timestamp_ns: 2_000_000_000,
                captured_length: 7,
                original_length: 7,
                interface_id: 0,
            }
        );
    }

    #[test]
    fn test_interface_options_and_resolution() {
        let mut options = test_utils::pcapng_option(option_code::IF_NAME, b"eth0");
        options.extend(test_utils::pcapng_option(option_code::IF_TSRESOL, &[9]));
        options.extend(test_utils::pcapng_option(option_code::END_OF_OPTIONS, &[]));

        let mut file = test_utils::section_header();
        file.extend(test_utils::interface_description(228, &options));
        file.extend(test_utils::enhanced_packet(0, 1_500_000_000, &[0x45]));

        let (metadata, frames) = collect(&file).unwrap();
        assert_eq!(metadata.interfaces[0].name.as_deref(), Some("eth0"));
        assert_eq!(metadata.interfaces[0].timestamp_resolution, 9);
        assert_eq!(frames[0].header.timestamp_ms, 1500);
        assert_eq!(frames[0].header.timestamp_ns, 1_500_000_000);
        assert_eq!(frames[0].link_type, 228);
    }

    #[test]
    fn test_length_mismatch_is_fatal() {
        let mut file = test_utils::pcapng_file(1, &[&[0x01u8; 8][..], &[0x02u8; 8][..]]);
        let last = file.len() - 4;
        file[last..].copy_from_slice(&100u32.to_le_bytes());

        match collect(&file) {
            Err(CaptureError::BlockLengthMismatch {
                leading, trailing, ..
            }) => {
                assert_eq!(leading, 40);
                assert_eq!(trailing, 100);
            },
            _ => panic!(),
        }
    }

    #[test]
    fn test_unknown_blocks_are_skipped() {
        let mut file = test_utils::section_header();
        file.extend(test_utils::interface_description(1, &[]));
        file.extend(test_utils::pcapng_block(BLOCK_NAME_RESOLUTION, &[0; 4]));
        file.extend(test_utils::pcapng_block(BLOCK_CUSTOM, &[0; 8]));
        file.extend(test_utils::pcapng_block(0x0000_0099, &[0; 12]));
        file.extend(test_utils::enhanced_packet(0, 0, &[0xAB; 3]));

        let (_, frames) = collect(&file).unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].data, &[0xAB; 3][..]);
    }

    #[test]
    fn test_simple_packet_and_statistics() {
        let mut simple = 5u32.to_le_bytes().to_vec();
        simple.extend([0x10, 0x20, 0x30, 0x40, 0x50, 0x00, 0x00, 0x00]);

        let mut statistics = 0u32.to_le_bytes().to_vec();
        statistics.extend(0u32.to_le_bytes());
        statistics.extend(3_000_000u32.to_le_bytes());
        statistics.extend(test_utils::pcapng_option(
            option_code::ISB_IFRECV,
            &12u64.to_le_bytes(),
        ));
        statistics.extend(test_utils::pcapng_option(
            option_code::ISB_IFDROP,
            &1u64.to_le_bytes(),
        ));
        statistics.extend(test_utils::pcapng_option(option_code::END_OF_OPTIONS, &[]));

        let mut file = test_utils::section_header();
        file.extend(test_utils::interface_description(1, &[]));
        file.extend(test_utils::pcapng_block(BLOCK_SIMPLE_PACKET, &simple));
        file.extend(test_utils::pcapng_block(
            BLOCK_INTERFACE_STATISTICS,
            &statistics,
        ));

        let (metadata, frames) = collect(&file).unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].data, &[0x10, 0x20, 0x30, 0x40, 0x50][..]);
        assert_eq!(frames[0].header.timestamp_ms, 0);

        assert_eq!(
            metadata.statistics,
            vec![InterfaceStatistics {
                interface_id: 0,
                timestamp_ms: 3000,
                received: Some(12),
                dropped: Some(1),
                os_dropped: None,
                delivered: None,
            }]
        );
    }

    #[test]
    fn test_big_endian_section() {
        let mut body = BYTE_ORDER_MAGIC.to_be_bytes().to_vec();
        body.extend(1u16.to_be_bytes());
        body.extend(0u16.to_be_bytes());
        body.extend(u64::MAX.to_be_bytes());
        let length = (body.len() + BLOCK_FRAMING_LENGTH) as u32;

        let mut file = BLOCK_SECTION_HEADER.to_be_bytes().to_vec();
        file.extend(length.to_be_bytes());
        file.extend(body);
        file.extend(length.to_be_bytes());

        let mut interface = 101u16.to_be_bytes().to_vec();
        interface.extend([0, 0]);
        interface.extend(1500u32.to_be_bytes());
        file.extend(1u32.to_be_bytes());
        file.extend(20u32.to_be_bytes());
        file.extend(interface);
        file.extend(20u32.to_be_bytes());

        let (metadata, frames) = collect(&file).unwrap();
        assert!(frames.is_empty());
        assert_eq!(metadata.version_major, 1);
        assert_eq!(metadata.link_type, 101);
        assert_eq!(metadata.snap_length, 1500);
    }
}
