/*!
 * Namespace Node Types
 * Internal representation of groups and their links
 */

use crate::plist::Properties;

/// Key of a group node inside the namespace
pub(super) type NodeKey = u64;

/// Key of the root group
pub(super) const ROOT_NODE: NodeKey = 0;

/// In-memory group
#[derive(Debug, Clone)]
pub(super) struct GroupNode {
    /// Links in creation order
    pub links: Vec<(String, NodeKey)>,
    /// Group-creation properties captured at create time
    pub properties: Properties,
    pub flushes: u64,
}

impl GroupNode {
    pub fn new(properties: Properties) -> Self {
        Self {
            links: Vec::new(),
            properties,
            flushes: 0,
        }
    }

    pub fn child(&self, name: &str) -> Option<NodeKey> {
        self.links
            .iter()
            .find(|(link, _)| link == name)
            .map(|(_, key)| *key)
    }

    pub fn tracks_creation_order(&self) -> bool {
        matches!(
            self.properties
                .get(crate::plist::keys::TRACK_CREATION_ORDER)
                .map(String::as_str),
            Some("true") | Some("1")
        )
    }
}
