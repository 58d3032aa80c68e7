use crate::storage::kernel::RelationshipRecord;
use crate::types::NodeId;

/// Direction of a relationship from one node's point of view.
///
/// A relationship is [`Direction::Outgoing`] from its start node and
/// [`Direction::Incoming`] to its end node. [`Direction::Both`] matches either.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Direction {
    /// Relationships starting at the node.
    Outgoing,
    /// Relationships ending at the node.
    Incoming,
    /// Relationships in either direction.
    Both,
}

impl Direction {
    /// Swaps outgoing and incoming; `Both` stays `Both`.
    pub fn reverse(self) -> Self {
        match self {
            Direction::Outgoing => Direction::Incoming,
            Direction::Incoming => Direction::Outgoing,
            Direction::Both => Direction::Both,
        }
    }

    /// Whether relationships starting at the node match.
    pub fn includes_outgoing(self) -> bool {
        matches!(self, Direction::Outgoing | Direction::Both)
    }

    /// Whether relationships ending at the node match.
    pub fn includes_incoming(self) -> bool {
        matches!(self, Direction::Incoming | Direction::Both)
    }

    /// Whether `record`, seen from `node`, points this way.
    pub fn admits(self, node: NodeId, record: &RelationshipRecord) -> bool {
        (self.includes_outgoing() && record.start == node)
            || (self.includes_incoming() && record.end == node)
    }

    /// Short label used in logs.
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Outgoing => "out",
            Direction::Incoming => "in",
            Direction::Both => "both",
        }
    }
}
