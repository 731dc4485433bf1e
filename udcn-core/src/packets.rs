use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::name::Name;

/// Identifier of a face inside one forwarder.
///
/// Ids `1..=255` are reserved for internal faces; `0` means "no face" and
/// sending to it is always a no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FaceId(pub u32);

impl FaceId {
    pub const INVALID: FaceId = FaceId(0);
    /// Incoming-face annotation of Data served from the content store
    pub const CONTENT_STORE: FaceId = FaceId(254);
    pub const RESERVED_MAX: FaceId = FaceId(255);

    pub fn is_valid(self) -> bool {
        self != Self::INVALID
    }

    pub fn is_reserved(self) -> bool {
        self.is_valid() && self <= Self::RESERVED_MAX
    }
}

impl fmt::Display for FaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Interest packet structure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interest {
    pub name: Name,
    pub nonce: u32,
    pub must_be_fresh: bool,
    pub interest_lifetime: Option<Duration>,
    pub hop_limit: Option<u8>,
    /// Link-layer address of the intended receiver on a shared medium
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_hint: Option<String>,
    /// Set by the forwarder on receipt, never by the sender
    #[serde(skip)]
    pub incoming_face: Option<FaceId>,
}

impl Interest {
    /// Create a new Interest with a random nonce
    pub fn new(name: Name) -> Self {
        Self {
            name,
            nonce: rand::random(),
            must_be_fresh: false,
            interest_lifetime: None,
            hop_limit: None,
            target_hint: None,
            incoming_face: None,
        }
    }

    /// Set the nonce for this Interest
    pub fn with_nonce(mut self, nonce: u32) -> Self {
        self.nonce = nonce;
        self
    }

    /// Set the interest lifetime
    pub fn with_lifetime(mut self, lifetime: Duration) -> Self {
        self.interest_lifetime = Some(lifetime);
        self
    }

    /// Set the hop limit
    pub fn with_hop_limit(mut self, hop_limit: u8) -> Self {
        self.hop_limit = Some(hop_limit);
        self
    }

    /// Address the Interest to one receiver on the link
    pub fn with_target_hint(mut self, target_hint: impl Into<String>) -> Self {
        self.target_hint = Some(target_hint.into());
        self
    }

    /// Set the must_be_fresh flag
    pub fn with_must_be_fresh(mut self, must_be_fresh: bool) -> Self {
        self.must_be_fresh = must_be_fresh;
        self
    }

    /// Replace the nonce with a fresh random value
    pub fn refresh_nonce(&mut self) {
        let previous = self.nonce;
        while self.nonce == previous {
            self.nonce = rand::random();
        }
    }

    /// Check if the Interest can be satisfied by a Data packet with the given name
    pub fn matches_data(&self, data_name: &Name) -> bool {
        self.name.is_prefix_of(data_name)
    }
}

/// Data packet structure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Data {
    pub name: Name,
    /// How long this Data may answer `must_be_fresh` Interests; `None` means never
    pub freshness_period: Option<Duration>,
    pub content: Vec<u8>,
    #[serde(skip)]
    pub incoming_face: Option<FaceId>,
}

impl Data {
    /// Create a new Data packet with the given name and content
    pub fn new(name: Name, content: Vec<u8>) -> Self {
        Self {
            name,
            freshness_period: None,
            content,
            incoming_face: None,
        }
    }

    /// Set the freshness period
    pub fn with_freshness_period(mut self, freshness_period: Duration) -> Self {
        self.freshness_period = Some(freshness_period);
        self
    }

    /// Check if this Data packet matches the given Interest
    pub fn matches_interest(&self, interest: &Interest) -> bool {
        interest.matches_data(&self.name)
    }
}

/// Packet types that can be sent over a face
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Packet {
    Interest(Interest),
    Data(Data),
}

impl Packet {
    /// Get the name of the packet
    pub fn name(&self) -> &Name {
        match self {
            Packet::Interest(interest) => &interest.name,
            Packet::Data(data) => &data.name,
        }
    }

    /// Check if this is an Interest packet
    pub fn is_interest(&self) -> bool {
        matches!(self, Packet::Interest(_))
    }

    /// Check if this is a Data packet
    pub fn is_data(&self) -> bool {
        matches!(self, Packet::Data(_))
    }
}

impl From<Interest> for Packet {
    fn from(interest: Interest) -> Self {
        Packet::Interest(interest)
    }
}

impl From<Data> for Packet {
    fn from(data: Data) -> Self {
        Packet::Data(data)
    }
}
