//! Typed back-reference from a DNS record to the object it was derived from

use serde::{Deserialize, Serialize};

use crate::entities::dns_record::OwnerType;

/// Object a desired DNS record belongs to
///
/// Stored as the `owner_type` / `owner_id` column pair. It is a lookup key
/// for cascade deletes and display, never an ownership pointer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum Owner {
    NodeGroup(i32),
    LineGroup(i32),
    WebsiteDomain(i32),
    /// Challenge records are owned by the certificate request that published them
    AcmeChallenge(i32),
}

impl Owner {
    pub fn from_parts(owner_type: OwnerType, id: i32) -> Self {
        match owner_type {
            OwnerType::NodeGroup => Owner::NodeGroup(id),
            OwnerType::LineGroup => Owner::LineGroup(id),
            OwnerType::WebsiteDomain => Owner::WebsiteDomain(id),
            OwnerType::AcmeChallenge => Owner::AcmeChallenge(id),
        }
    }

    pub fn owner_type(&self) -> OwnerType {
        match self {
            Owner::NodeGroup(_) => OwnerType::NodeGroup,
            Owner::LineGroup(_) => OwnerType::LineGroup,
            Owner::WebsiteDomain(_) => OwnerType::WebsiteDomain,
            Owner::AcmeChallenge(_) => OwnerType::AcmeChallenge,
        }
    }

    pub fn id(&self) -> i32 {
        match *self {
            Owner::NodeGroup(id)
            | Owner::LineGroup(id)
            | Owner::WebsiteDomain(id)
            | Owner::AcmeChallenge(id) => id,
        }
    }
}

impl std::fmt::Display for Owner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match self {
            Owner::NodeGroup(_) => "node_group",
            Owner::LineGroup(_) => "line_group",
            Owner::WebsiteDomain(_) => "website_domain",
            Owner::AcmeChallenge(_) => "acme_challenge",
        };
        write!(f, "{}:{}", kind, self.id())
    }
}
