use num_enum::FromPrimitive;
use serde::{Deserialize, Serialize};
use strum_macros::Display;

#[derive(Clone, Copy, Debug, Display, Eq, FromPrimitive, PartialEq, Serialize, Deserialize)]
#[repr(u16)]
pub enum Operation {
    Request = 1,
    Reply = 2,
    ReverseRequest = 3,
    ReverseReply = 4,

    #[num_enum(catch_all)]
    Unknown(u16),
}

impl Default for Operation {
    fn default() -> Self {
        Self::Unknown(0)
    }
}
