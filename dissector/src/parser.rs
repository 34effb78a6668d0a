use crate::error::DissectError;
use crate::field::Field;
use crate::frame::{
    ByteSource, Frame, FrameHeader, FrameLayer, Node, NodeId, ProcessResult, Tree,
};
use crate::options::Options;
use crate::protocols::{ProtocolData, ProtocolId};
use crate::reader::Reader;
use crate::resolver::Resolver;
use log::{debug, warn};

pub type DissectFn = fn(&mut Dissection, NodeId) -> Result<NodeId, DissectError>;

/// Per-frame state handed to every visitor: the shared cursor over the frame
/// bytes, the node arena built so far and the capture-wide resolver.
pub struct Dissection<'a, 'r> {
    pub index: usize,
    pub reader: Reader<'a>,
    pub tree: Tree,
    pub resolver: &'r mut Resolver,
    pub options: &'r Options,
}

impl Dissection<'_, '_> {
    pub fn data(&self, id: NodeId) -> Option<&ProtocolData> {
        self.tree.get(id).map(|node| &node.data)
    }

    /// Links a node decoded from the frame bytes. The node is linked even when
    /// `result` is an error, it is then marked malformed and the error is
    /// passed on to stop the chain.
    pub fn link(
        &mut self, parent: NodeId, data: ProtocolData, fields: Vec<Field>,
        result: Result<(), DissectError>,
    ) -> Result<NodeId, DissectError> {
        self.link_from(parent, data, fields, ByteSource::Frame, result)
    }

    pub fn link_from(
        &mut self, parent: NodeId, data: ProtocolData, fields: Vec<Field>,
        source: ByteSource, result: Result<(), DissectError>,
    ) -> Result<NodeId, DissectError> {
        let mut node = Node::new(Some(parent), data, fields);
        node.source = source;
        if let Err(err) = &result {
            warn!("Frame #{}: malformed {}. {}", self.index, node.id, err);
            node.malformed = Some(err.to_string());
        }

        let id = self.tree.push(node);
        result.map(|_| id)
    }
}

pub struct ProtocolParser {
    link_type: u16,
}

impl ProtocolParser {
    pub fn new(link_type: u16) -> Self {
        Self { link_type }
    }

    pub fn link_type(&self) -> u16 {
        self.link_type
    }

    pub fn process(
        &self, index: usize, header: FrameHeader, data: Vec<u8>, resolver: &mut Resolver,
        options: &Options,
    ) -> Frame {
        let layer = FrameLayer {
            link_type: self.link_type,
            captured_length: header.captured_length,
            original_length: header.original_length,
        };
        let fields = vec![Field::new(
            "Frame",
            0,
            data.len(),
            format!("Frame {}: {} bytes captured", index, data.len()),
        )];
        let root = Node::new(None, ProtocolData::Frame(layer), fields);

        let (tree, status) = {
            let mut dissection = Dissection {
                index,
                reader: Reader::new(&data),
                tree: Tree::new(root),
                resolver,
                options,
            };

            let status = match ProtocolId::root(self.link_type, data.first().copied()) {
                Some(id) => traversal(id, NodeId::ROOT, &mut dissection, 0),
                None => {
                    debug!(
                        "Frame #{}: link type {} is not supported.",
                        index, self.link_type
                    );
                    ProcessResult::Incomplete
                },
            };

            (dissection.tree, status)
        };

        Frame {
            index,
            header,
            data,
            tree,
            status,
        }
    }
}

fn traversal(
    id: ProtocolId, parent: NodeId, dissection: &mut Dissection, depth: usize,
) -> ProcessResult {
    const MAX_DEPTH: usize = 16;
    if depth > MAX_DEPTH {
        warn!("Frame #{}: protocol nesting too deep.", dissection.index);
        return ProcessResult::Failed;
    }

    let dissect = match id.dissect() {
        Some(value) => value,
        None => return ProcessResult::Incomplete,
    };

    let node = match dissect(dissection, parent) {
        Ok(node) => node,
        Err(_) => return ProcessResult::Failed,
    };

    match id.best_children(dissection, node) {
        Some(best) => match depth.checked_add(1) {
            Some(new_depth) => traversal(best, node, dissection, new_depth),
            None => ProcessResult::Failed,
        },
        None if dissection.reader.is_empty() => ProcessResult::Complete,
        None => ProcessResult::Incomplete,
    }
}
