use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Options {
    // Frames delivered per progress callback.
    pub batch_size: usize,

    pub track_connections: bool,
    pub decode_tls: bool,
    pub decode_http: bool,
    pub decode_dns: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            batch_size: 1000,
            track_connections: true,
            decode_tls: true,
            decode_http: true,
            decode_dns: true,
        }
    }
}
