use num_enum::FromPrimitive;
use serde::{Deserialize, Serialize};
use strum_macros::Display;

#[derive(Clone, Copy, Debug, Display, Eq, FromPrimitive, PartialEq, Serialize, Deserialize)]
#[repr(u16)]
pub enum HardwareType {
    Ethernet = 1,
    Ieee802 = 6,

    #[num_enum(catch_all)]
    Unknown(u16),
}

impl Default for HardwareType {
    fn default() -> Self {
        Self::Unknown(0)
    }
}
