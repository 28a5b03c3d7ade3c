use std::fmt;

/// Identifies the node a reading came from.
///
/// Either the sender token of a JSON envelope, or the packet header's node number rendered
/// as `!` followed by eight lower-case hex digits.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NodeId(String);

impl NodeId {
    /// Returns `None` for an empty token, which never identifies a node.
    pub fn new(token: impl Into<String>) -> Option<Self> {
        let token = token.into();
        if token.is_empty() {
            return None;
        }

        Some(Self(token))
    }

    pub fn from_node_num(node_num: u32) -> Self {
        Self(format!("!{node_num:08x}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
