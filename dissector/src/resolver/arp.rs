use crate::protocols::ethernet::mac::MacAddress;
use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;

#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct ArpHost {
    pub ip: Ipv4Addr,
    pub mac: MacAddress,
}

impl ArpHost {
    pub fn key(&self) -> String {
        format!("{}/{}", self.ip, self.mac)
    }
}

/// Every reply a host sent, grouped by the hosts it answered.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ArpReply {
    pub sender: ArpHost,
    pub clients: Vec<ArpHost>,
    pub count: usize,
    pub first_frame: usize,
    pub last_frame: usize,
}

impl ArpReply {
    pub fn new(sender: ArpHost, frame: usize) -> Self {
        Self {
            sender,
            clients: vec![],
            count: 0,
            first_frame: frame,
            last_frame: frame,
        }
    }

    pub fn observe(&mut self, target: ArpHost, frame: usize) {
        self.count += 1;
        self.last_frame = frame;
        if !self.clients.contains(&target) {
            self.clients.push(target);
        }
    }
}
