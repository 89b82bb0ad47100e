//! Attachment router
//!
//! Turns an attachment entry name into delivery instructions, one per
//! purchase order whose manifest row lists the file. A file referenced by
//! several orders is delivered to each of them.

use crate::manifest::AttachmentRouting;

/// Deliver one archive entry to one destination key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub identifier: String,
    pub key: String,
}

pub struct AttachmentRouter<'a> {
    routing: &'a AttachmentRouting,
    destination_root: &'a str,
}

impl<'a> AttachmentRouter<'a> {
    pub fn new(routing: &'a AttachmentRouting, destination_root: &'a str) -> Self {
        Self {
            routing,
            destination_root,
        }
    }

    /// Deliveries for an attachment; empty when no identifier references it
    pub fn route(&self, entry_name: &str) -> Vec<Delivery> {
        self.routing
            .identifiers_for(entry_name)
            .map(|identifier| Delivery {
                identifier: identifier.to_string(),
                key: destination_key(self.destination_root, identifier, entry_name),
            })
            .collect()
    }
}

/// `<root>/<identifier>/<entry-name>`
pub fn destination_key(root: &str, identifier: &str, entry_name: &str) -> String {
    format!("{}/{}/{}", root.trim_end_matches('/'), identifier, entry_name)
}
