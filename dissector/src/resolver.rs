use crate::resolver::arp::{ArpHost, ArpReply};
use crate::resolver::dns::DnsRecord;
use crate::resolver::tcp::{Segment, TcpConnection, TcpStack, TcpTrack};
use log::debug;
use std::collections::{BTreeMap, HashMap};

/// Cross-frame state of one capture parse: TCP flows, ARP replies and DNS
/// answers. Created by the parse, handed to every visitor by `&mut`.
#[derive(Debug, Default)]
pub struct Resolver {
    pub tcp_cache: HashMap<String, TcpConnection>,
    pub tcp_connections: Vec<TcpConnection>,
    pub arp_map: BTreeMap<String, ArpReply>,
    pub dns_records: Vec<DnsRecord>,
}

impl Resolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one segment into its flow. `None` when the segment is not
    /// tracked: resets, and bare ACKs of flows never seen before.
    pub fn track_tcp(
        &mut self, frame: usize, frame_length: usize, segment: &Segment,
    ) -> Option<TcpTrack> {
        if segment.reset {
            return None;
        }

        let source = segment.source.to_string();
        let destination = segment.destination.to_string();
        let (key, direction) = tcp::connection_key(&source, &destination);

        if segment.is_no_content() && !self.tcp_cache.contains_key(&key) {
            return None;
        }

        let connection = self.tcp_cache.entry(key.clone()).or_insert_with(|| {
            let (lower, higher) = match direction {
                0 => (source, destination),
                _ => (destination, source),
            };
            TcpConnection::new(key.clone(), lower, higher, frame)
        });

        let track = connection.update(frame, frame_length, direction, segment);

        if connection.is_finished() {
            if let Some(closed) = self.tcp_cache.remove(&key) {
                debug!("TCP flow {} closed at frame #{}.", key, frame);
                self.tcp_connections.push(closed);
            }
        }

        Some(track)
    }

    /// Open flow first, then the most recently closed one with that key.
    pub fn connection(&self, key: &str) -> Option<&TcpConnection> {
        self.tcp_cache
            .get(key)
            .or_else(|| self.tcp_connections.iter().rev().find(|conn| conn.key == key))
    }

    pub fn connection_mut(&mut self, key: &str) -> Option<&mut TcpConnection> {
        match self.tcp_cache.get_mut(key) {
            Some(connection) => Some(connection),
            None => self
                .tcp_connections
                .iter_mut()
                .rev()
                .find(|conn| conn.key == key),
        }
    }

    pub fn stack_mut(&mut self, track: &TcpTrack) -> Option<&mut TcpStack> {
        self.connection_mut(&track.key)
            .and_then(|connection| connection.stacks.get_mut(track.direction))
    }

    pub fn register_arp_reply(&mut self, frame: usize, sender: ArpHost, target: ArpHost) {
        self.arp_map
            .entry(sender.key())
            .or_insert_with(|| ArpReply::new(sender, frame))
            .observe(target, frame);
    }

    pub fn register_dns(&mut self, record: DnsRecord) {
        self.dns_records.push(record);
    }

    /// Closes every open flow. Called once the last frame is dissected.
    pub fn flush(&mut self) {
        let mut open: Vec<TcpConnection> =
            self.tcp_cache.drain().map(|(_, connection)| connection).collect();
        open.sort_by_key(|connection| connection.first_frame);
        self.tcp_connections.extend(open);
    }
}

pub mod arp;
pub mod dns;
pub mod tcp;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocols::ethernet::mac::MacAddress;
    use std::net::Ipv4Addr;

    fn segment(source: &str, destination: &str, sequence: u32, payload: usize) -> Segment {
        Segment {
            source: source.parse().unwrap(),
            destination: destination.parse().unwrap(),
            sequence,
            acknowledgement: 0,
            syn: false,
            ack: true,
            push: true,
            reset: false,
            fin: false,
            payload_length: payload,
        }
    }

    #[test]
    fn test_duplicate_segment_is_dump() {
        let mut resolver = Resolver::new();
        let data = segment("10.0.0.1:1234", "10.0.0.2:80", 500, 100);

        let first = resolver.track_tcp(1, 154, &data).unwrap();
        assert!(!first.is_dump);
        let connection = resolver.connection(&first.key).unwrap();
        assert_eq!(connection.stacks[first.direction].next, Some(600));
        let (count_use, tcp_use) = (connection.count_use, connection.tcp_use);

        let second = resolver.track_tcp(2, 154, &data).unwrap();
        assert!(second.is_dump);
        assert!(!second.miss_pre);
        let connection = resolver.connection(&second.key).unwrap();
        assert_eq!(connection.count_use, count_use);
        assert_eq!(connection.tcp_use, tcp_use);
        assert_eq!(connection.count, 2);
        assert_eq!(connection.tcp_size, 200);
        assert_eq!(connection.total, 308);
        assert_eq!(connection.stacks[second.direction].next, Some(600));
    }

    #[test]
    fn test_both_directions_share_connection() {
        let mut resolver = Resolver::new();
        let forward = segment("10.0.0.1:1234", "10.0.0.2:80", 1, 20);
        let backward = segment("10.0.0.2:80", "10.0.0.1:1234", 9000, 40);

        let first = resolver.track_tcp(1, 74, &forward).unwrap();
        let second = resolver.track_tcp(2, 94, &backward).unwrap();
        assert_eq!(first.key, second.key);
        assert_ne!(first.direction, second.direction);
        assert_eq!(resolver.tcp_cache.len(), 1);

        let connection = resolver.connection(&first.key).unwrap();
        assert_eq!(connection.count, 2);
        assert_eq!(connection.stacks[first.direction].ack, Some(0));
        assert_eq!(connection.stacks[second.direction].next, Some(9040));
    }

    #[test]
    fn test_reset_and_keep_alive_are_not_tracked() {
        let mut resolver = Resolver::new();
        let mut reset = segment("10.0.0.1:1234", "10.0.0.2:80", 1, 0);
        reset.reset = true;
        assert_eq!(resolver.track_tcp(1, 54, &reset), None);

        let mut ack = segment("10.0.0.1:1234", "10.0.0.2:80", 1, 1);
        ack.push = false;
        assert_eq!(resolver.track_tcp(2, 55, &ack), None);
        assert!(resolver.tcp_cache.is_empty());
    }

    #[test]
    fn test_syn_then_data_is_in_order() {
        let mut resolver = Resolver::new();
        let mut syn = segment("10.0.0.1:1234", "10.0.0.2:80", 100, 0);
        syn.syn = true;
        syn.ack = false;
        syn.push = false;
        let data = segment("10.0.0.1:1234", "10.0.0.2:80", 101, 50);

        resolver.track_tcp(1, 74, &syn).unwrap();
        let track = resolver.track_tcp(2, 104, &data).unwrap();
        assert!(!track.miss_pre);
        assert!(!track.is_dump);

        let stack = &resolver.connection(&track.key).unwrap().stacks[track.direction];
        assert_eq!(stack.sequence, Some(101));
        assert_eq!(stack.next, Some(151));
    }

    #[test]
    fn test_fin_from_both_sides_closes() {
        let mut resolver = Resolver::new();
        let mut client = segment("10.0.0.1:1234", "10.0.0.2:80", 10, 0);
        client.fin = true;
        let mut server = segment("10.0.0.2:80", "10.0.0.1:1234", 70, 0);
        server.fin = true;

        resolver.track_tcp(1, 54, &client);
        assert_eq!(resolver.tcp_cache.len(), 1);
        resolver.track_tcp(2, 54, &server);
        assert!(resolver.tcp_cache.is_empty());
        assert_eq!(resolver.tcp_connections.len(), 1);
        assert!(resolver.tcp_connections[0].is_finished());
    }

    #[test]
    fn test_flush_keeps_frame_order() {
        let mut resolver = Resolver::new();
        resolver.track_tcp(1, 60, &segment("10.0.0.9:1", "10.0.0.2:80", 1, 10));
        resolver.track_tcp(2, 60, &segment("10.0.0.1:1", "10.0.0.2:80", 1, 10));
        resolver.flush();
        assert!(resolver.tcp_cache.is_empty());
        let firsts: Vec<usize> = resolver
            .tcp_connections
            .iter()
            .map(|connection| connection.first_frame)
            .collect();
        assert_eq!(firsts, vec![1, 2]);
    }

    #[test]
    fn test_arp_replies_group_clients() {
        let mut resolver = Resolver::new();
        let sender = ArpHost {
            ip: Ipv4Addr::new(172, 16, 255, 1),
            mac: MacAddress::try_from("00:1E:68:51:4F:A9").unwrap(),
        };
        let first = ArpHost {
            ip: Ipv4Addr::new(172, 16, 0, 1),
            mac: MacAddress::try_from("00:1A:8C:10:AD:30").unwrap(),
        };
        let second = ArpHost {
            ip: Ipv4Addr::new(172, 16, 0, 2),
            mac: MacAddress::try_from("00:1A:8C:10:AD:31").unwrap(),
        };

        resolver.register_arp_reply(1, sender, first);
        resolver.register_arp_reply(2, sender, second);
        resolver.register_arp_reply(3, sender, first);

        assert_eq!(resolver.arp_map.len(), 1);
        let reply = resolver.arp_map.get(&sender.key()).unwrap();
        assert_eq!(reply.clients, vec![first, second]);
        assert_eq!(reply.count, 3);
        assert_eq!((reply.first_frame, reply.last_frame), (1, 3));
    }
}
