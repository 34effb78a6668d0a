use crate::field::Field;
use crate::protocols::{HasIpAddresses, HasPorts, ProtocolData, ProtocolId};
use serde::{Deserialize, Serialize};

/// Stable handle of a node inside one frame's arena.
#[derive(
    Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize, Deserialize,
)]
pub struct NodeId(pub usize);

impl NodeId {
    pub const ROOT: NodeId = NodeId(0);
}

/// Buffer a node's field offsets point into.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub enum ByteSource {
    #[default]
    Frame,

    // Bytes glued together from several segments of one TCP direction.
    Reassembled(#[serde(with = "hex")] Vec<u8>),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub parent: Option<NodeId>,
    pub id: ProtocolId,
    pub data: ProtocolData,
    pub fields: Vec<Field>,
    #[serde(default)]
    pub source: ByteSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub malformed: Option<String>,
}

impl Node {
    pub fn new(parent: Option<NodeId>, data: ProtocolData, fields: Vec<Field>) -> Self {
        Self {
            parent,
            id: data.id(),
            data,
            fields,
            source: ByteSource::Frame,
            malformed: None,
        }
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find_map(|field| field.find(name))
    }
}

/// Arena of protocol nodes. Parents are always pushed before their children,
/// so every parent chain ends at node 0.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Tree {
    nodes: Vec<Node>,
}

impl Tree {
    pub fn new(root: Node) -> Self {
        Self { nodes: vec![root] }
    }

    /// Appends `node`. A parent that does not exist yet is dropped, so the
    /// node becomes a second root rather than a forward link.
    pub fn push(&mut self, mut node: Node) -> NodeId {
        let id = NodeId(self.nodes.len());
        if node.parent.is_some_and(|parent| parent >= id) {
            node.parent = None;
        }
        self.nodes.push(node);
        id
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id.0)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter()
    }

    pub fn last(&self) -> Option<NodeId> {
        self.nodes.len().checked_sub(1).map(NodeId)
    }

    /// `from` followed by every ancestor up to the root.
    pub fn ancestors(&self, from: NodeId) -> Ancestors<'_> {
        Ancestors {
            tree: self,
            next: Some(from),
        }
    }

    /// Nearest node tagged `tag`, walking upward from `from` (inclusive).
    pub fn protocol(&self, from: NodeId, tag: ProtocolId) -> Option<NodeId> {
        self.ancestors(from)
            .find(|id| self.get(*id).is_some_and(|node| node.id == tag))
    }

    pub fn ip_provider(&self, from: NodeId) -> Option<&dyn HasIpAddresses> {
        self.ancestors(from)
            .find_map(|id| self.get(id).and_then(|node| node.data.ip_provider()))
    }

    pub fn port_provider(&self, from: NodeId) -> Option<&dyn HasPorts> {
        self.ancestors(from)
            .find_map(|id| self.get(id).and_then(|node| node.data.port_provider()))
    }

    pub fn children(&self, parent: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes
            .iter()
            .enumerate()
            .filter(move |(_, node)| node.parent == Some(parent))
            .map(|(index, _)| NodeId(index))
    }
}

pub struct Ancestors<'t> {
    tree: &'t Tree,
    next: Option<NodeId>,
}

impl Iterator for Ancestors<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        let node = self.tree.get(current)?;
        // Parents always have smaller ids, the walk strictly descends.
        self.next = node.parent.filter(|parent| *parent < current);
        Some(current)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FrameHeader {
    pub timestamp_ms: u64,
    pub timestamp_ns: u64,
    pub captured_length: u32,
    pub original_length: u32,
    pub interface_id: u32,
}

/// Data of the root node.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FrameLayer {
    pub link_type: u16,
    pub captured_length: u32,
    pub original_length: u32,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub enum ProcessResult {
    // Every byte was claimed by some protocol.
    #[default]
    Complete,

    // The chain stopped at an unrecognized protocol, some payload is left over.
    Incomplete,

    // A visitor failed, the deepest node is marked malformed.
    Failed,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    pub index: usize,
    pub header: FrameHeader,
    #[serde(with = "hex")]
    pub data: Vec<u8>,
    pub tree: Tree,
    pub status: ProcessResult,
}

impl Frame {
    pub fn root(&self) -> Option<&Node> {
        self.tree.get(NodeId::ROOT)
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.tree.get(id)
    }

    /// Nearest node tagged `tag` above (or at) `from`.
    pub fn protocol(&self, from: NodeId, tag: ProtocolId) -> Option<&Node> {
        self.tree.protocol(from, tag).and_then(|id| self.tree.get(id))
    }

    /// First node tagged `tag` anywhere in the frame.
    pub fn find(&self, tag: ProtocolId) -> Option<&Node> {
        self.tree.iter().find(|node| node.id == tag)
    }

    /// Frame index of the frame `node` belongs to, resolved from the root.
    pub fn index_of(&self, node: NodeId) -> Option<usize> {
        let root = self.tree.ancestors(node).last()?;
        (root == NodeId::ROOT).then_some(self.index)
    }

    pub fn layers(&self) -> impl Iterator<Item = &ProtocolData> {
        self.tree.iter().map(|node| &node.data)
    }

    /// Bytes a field of `node` addresses.
    pub fn field_bytes<'a>(&'a self, node: &'a Node, field: &Field) -> Option<&'a [u8]> {
        let buffer = match &node.source {
            ByteSource::Frame => self.data.as_slice(),
            ByteSource::Reassembled(bytes) => bytes.as_slice(),
        };
        buffer.get(field.start..field.end())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn root() -> Node {
        Node::new(None, ProtocolData::Frame(FrameLayer::default()), vec![])
    }

    #[test]
    fn test_protocol_walks_upward() {
        let mut tree = Tree::new(root());
        let first = tree.push(Node::new(
            Some(NodeId::ROOT),
            ProtocolData::Frame(FrameLayer {
                link_type: 1,
                ..Default::default()
            }),
            vec![],
        ));
        let second = tree.push(Node::new(
            Some(first),
            ProtocolData::Frame(FrameLayer::default()),
            vec![],
        ));

        let ancestors: Vec<NodeId> = tree.ancestors(second).collect();
        assert_eq!(ancestors, vec![second, first, NodeId::ROOT]);
        assert_eq!(tree.protocol(second, ProtocolId::Frame), Some(second));
        assert_eq!(tree.protocol(second, ProtocolId::TCP), None);
        assert_eq!(tree.children(NodeId::ROOT).collect::<Vec<_>>(), vec![first]);
    }

    #[test]
    fn test_forward_parent_is_dropped() {
        let mut tree = Tree::new(root());
        let mut node = root();
        node.parent = Some(NodeId(7));
        let id = tree.push(node);
        assert_eq!(tree.get(id).and_then(|node| node.parent), None);
        assert_eq!(tree.ancestors(id).count(), 1);
    }

    #[test]
    fn test_field_bytes_follow_source() {
        let frame = Frame {
            index: 1,
            header: FrameHeader::default(),
            data: vec![0x01, 0x02, 0x03, 0x04],
            tree: Tree::new(root()),
            status: ProcessResult::Complete,
        };
        let field = Field::new("Value", 1, 2, "Value");

        let mut node = root();
        assert_eq!(frame.field_bytes(&node, &field), Some(&[0x02, 0x03][..]));

        node.source = ByteSource::Reassembled(vec![0xAA, 0xBB, 0xCC]);
        assert_eq!(frame.field_bytes(&node, &field), Some(&[0xBB, 0xCC][..]));

        let outside = Field::new("Value", 2, 5, "Value");
        assert_eq!(frame.field_bytes(&node, &outside), None);
    }
}
