use crate::error::CaptureError;
use crate::frame::FrameHeader;
use serde::{Deserialize, Serialize};
use strum_macros::Display;

// pcap: https://datatracker.ietf.org/doc/draft-ietf-opsawg-pcap/
pub const MAGIC_PCAP_MICROSECONDS: u32 = 0xA1B2C3D4;
pub const MAGIC_PCAP_NANOSECONDS: u32 = 0xA1B23C4D;

// pcapng: https://datatracker.ietf.org/doc/draft-ietf-opsawg-pcapng/
pub const BLOCK_SECTION_HEADER: u32 = 0x0A0D0D0A;
pub const BLOCK_INTERFACE_DESCRIPTION: u32 = 0x00000001;
pub const BLOCK_SIMPLE_PACKET: u32 = 0x00000003;
pub const BLOCK_NAME_RESOLUTION: u32 = 0x00000004;
pub const BLOCK_INTERFACE_STATISTICS: u32 = 0x00000005;
pub const BLOCK_ENHANCED_PACKET: u32 = 0x00000006;
pub const BLOCK_CUSTOM: u32 = 0x00000BAD;
pub const BLOCK_CUSTOM_DO_NOT_COPY: u32 = 0x40000BAD;
pub const BYTE_ORDER_MAGIC: u32 = 0x1A2B3C4D;

/// One captured frame as stored in the container, before dissection.
#[derive(Clone, Debug, PartialEq)]
pub struct RawFrame<'a> {
    pub header: FrameHeader,
    pub link_type: u16,
    pub data: &'a [u8],
}

#[derive(Clone, Copy, Debug, Default, Display, PartialEq, Serialize, Deserialize)]
pub enum CaptureFormat {
    #[default]
    Pcap,
    #[strum(to_string = "pcapng")]
    PcapNg,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CaptureMetadata {
    pub format: CaptureFormat,
    pub version_major: u16,
    pub version_minor: u16,
    pub snap_length: u32,
    // Link type of the first interface.
    pub link_type: u16,
    pub sections: Vec<SectionInfo>,
    pub interfaces: Vec<Interface>,
    pub statistics: Vec<InterfaceStatistics>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SectionInfo {
    pub version_major: u16,
    pub version_minor: u16,
    pub hardware: Option<String>,
    pub os: Option<String>,
    pub application: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Interface {
    pub link_type: u16,
    pub snap_length: u32,
    pub name: Option<String>,
    pub description: Option<String>,
    // Raw if_tsresol: high bit set means a power of 2, otherwise of 10.
    pub timestamp_resolution: u8,
}

impl Default for Interface {
    fn default() -> Self {
        Self {
            link_type: 0,
            snap_length: 0,
            name: None,
            description: None,
            timestamp_resolution: 6,
        }
    }
}

impl Interface {
    /// Timestamp units per second. `None` when the resolution overflows `u64`.
    pub fn units_per_second(&self) -> Option<u64> {
        let exponent = (self.timestamp_resolution & 0x7F) as u32;
        if self.timestamp_resolution & 0x80 != 0 {
            2u64.checked_pow(exponent)
        } else {
            10u64.checked_pow(exponent)
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct InterfaceStatistics {
    pub interface_id: u32,
    pub timestamp_ms: u64,
    pub received: Option<u64>,
    pub dropped: Option<u64>,
    pub os_dropped: Option<u64>,
    pub delivered: Option<u64>,
}

/// Walks every frame of a pcap or pcapng buffer in capture order.
///
/// Records cut short by the end of the buffer end the walk with a warning.
/// Only an unknown format, an unreadable header or a pcapng block whose
/// trailing length disagrees with its leading one fail the whole walk.
pub fn parse<'a>(
    bytes: &'a [u8], metadata: &mut CaptureMetadata, sink: impl FnMut(RawFrame<'a>),
) -> Result<(), CaptureError> {
    let magic = match bytes.get(..4) {
        Some([a, b, c, d]) => u32::from_le_bytes([*a, *b, *c, *d]),
        _ => return Err(CaptureError::InvalidHeader("file is shorter than a magic number")),
    };

    match magic {
        BLOCK_SECTION_HEADER => {
            metadata.format = CaptureFormat::PcapNg;
            pcapng::parse(bytes, metadata, sink)
        },
        _ if pcap::is_magic(magic) => {
            metadata.format = CaptureFormat::Pcap;
            pcap::parse(bytes, metadata, sink)
        },
        _ => Err(CaptureError::UnknownFormat(magic)),
    }
}

/// Splits a timestamp counted in `units` per second into milliseconds and
/// nanoseconds.
pub fn timestamp(value: u64, units: u64) -> (u64, u64) {
    if units == 0 {
        return (0, 0);
    }
    let scale = |target: u128| (value as u128 * target / units as u128).min(u64::MAX as u128) as u64;
    (scale(1_000), scale(1_000_000_000))
}

pub mod pcap;
pub mod pcapng;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_magic() {
        let mut metadata = CaptureMetadata::default();
        let result = parse(&[0xDE, 0xAD, 0xBE, 0xEF, 0x00], &mut metadata, |_| {});
        match result {
            Err(CaptureError::UnknownFormat(magic)) => assert_eq!(magic, 0xEFBEADDE),
            _ => panic!(),
        }
    }

    #[test]
    fn test_units_per_second() {
        let mut interface = Interface::default();
        assert_eq!(interface.units_per_second(), Some(1_000_000));
        interface.timestamp_resolution = 9;
        assert_eq!(interface.units_per_second(), Some(1_000_000_000));
        interface.timestamp_resolution = 0x80 | 10;
        assert_eq!(interface.units_per_second(), Some(1024));
        interface.timestamp_resolution = 0x7F;
        assert_eq!(interface.units_per_second(), None);
    }

    #[test]
    fn test_timestamp() {
        assert_eq!(timestamp(1_002_500, 1_000_000), (1002, 1_002_500_000));
        assert_eq!(timestamp(2048, 1024), (2000, 2_000_000_000));
        assert_eq!(timestamp(5, 0), (0, 0));
    }
}
