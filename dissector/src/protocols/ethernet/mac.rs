use crate::protocols::ethernet::EthernetError;
use serde::{Deserialize, Serialize};
use std::fmt::Formatter;

pub const LENGTH_BYTES: usize = 6;

/// Hardware address as read off the wire. Rendered as `AA:BB:CC:DD:EE:FF`.
#[derive(
    Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize, Deserialize,
)]
pub struct MacAddress(pub [u8; LENGTH_BYTES]);

impl MacAddress {
    // ARP requests leave the target hardware address unset.
    pub fn is_zero(&self) -> bool {
        self.0 == [0; LENGTH_BYTES]
    }
}

impl From<[u8; LENGTH_BYTES]> for MacAddress {
    fn from(value: [u8; LENGTH_BYTES]) -> Self {
        Self(value)
    }
}

/// Accepts colon, dash or dot separated groups, or none at all.
impl TryFrom<&str> for MacAddress {
    type Error = EthernetError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let digits: String = value
            .chars()
            .filter(|symbol| !matches!(symbol, ':' | '-' | '.'))
            .collect();
        let mut bytes = [0u8; LENGTH_BYTES];
        hex::decode_to_slice(&digits, &mut bytes).map_err(|err| match err {
            hex::FromHexError::InvalidStringLength | hex::FromHexError::OddLength => {
                EthernetError::MacInvalidStringLength
            },
            _ => EthernetError::MacFailedHexDecode,
        })?;

        Ok(Self(bytes))
    }
}

impl std::fmt::Display for MacAddress {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let groups: Vec<String> = self.0.iter().map(|byte| format!("{:02X}", byte)).collect();
        write!(f, "{}", groups.join(":"))
    }
}
