//! Classification of the free-form `remote` field on security group rules.
//!
//! Operators write a single string; the API expects exactly one of an IP
//! address, a CIDR block, or a security group identifier. [`RemoteRef`]
//! decides which one was meant and [`RemotePrototype`] carries it on the wire.

use std::fmt;
use std::net::IpAddr;

use ipnetwork::IpNetwork;
use serde::{Deserialize, Serialize};

/// A classified `remote` value.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub enum RemoteRef {
    /// A single IPv4 or IPv6 address.
    Address(String),
    /// A CIDR block such as `10.0.0.0/24`.
    Cidr(String),
    /// Anything else, treated as a security group identifier.
    Identifier(String),
}

impl RemoteRef {
    /// Classifies `value`, checking address syntax first, then CIDR syntax,
    /// and falling back to an identifier. Never fails; the remote API rejects
    /// identifiers that do not exist.
    #[must_use]
    pub fn classify(value: &str) -> Self {
        if value.parse::<IpAddr>().is_ok() {
            return Self::Address(value.to_owned());
        }
        if value.contains('/') && value.parse::<IpNetwork>().is_ok() {
            return Self::Cidr(value.to_owned());
        }
        Self::Identifier(value.to_owned())
    }

    /// Returns the original operator-supplied string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Address(value) | Self::Cidr(value) | Self::Identifier(value) => value,
        }
    }

    /// Name of the API field this reference populates.
    #[must_use]
    pub const fn field(&self) -> &'static str {
        match self {
            Self::Address(_) => "address",
            Self::Cidr(_) => "cidr_block",
            Self::Identifier(_) => "id",
        }
    }

    /// Routes the value into the matching prototype field, leaving the other
    /// two empty.
    #[must_use]
    pub fn into_prototype(self) -> RemotePrototype {
        match self {
            Self::Address(address) => RemotePrototype {
                address: Some(address),
                ..RemotePrototype::default()
            },
            Self::Cidr(cidr_block) => RemotePrototype {
                cidr_block: Some(cidr_block),
                ..RemotePrototype::default()
            },
            Self::Identifier(id) => RemotePrototype {
                id: Some(id),
                ..RemotePrototype::default()
            },
        }
    }

    /// Rebuilds a reference from the `remote` object returned by the API.
    ///
    /// Security group references carry an address-free `id`, so it wins over
    /// `address` and `cidr_block` when several are present.
    #[must_use]
    pub fn from_response(remote: &RemotePrototype) -> Option<Self> {
        if let Some(id) = non_empty(remote.id.as_deref()) {
            return Some(Self::Identifier(id.to_owned()));
        }
        if let Some(address) = non_empty(remote.address.as_deref()) {
            return Some(Self::Address(address.to_owned()));
        }
        non_empty(remote.cidr_block.as_deref()).map(|cidr| Self::Cidr(cidr.to_owned()))
    }
}

impl fmt::Display for RemoteRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|inner| !inner.is_empty())
}

/// Wire form of a rule's `remote`: exactly one field is populated when built
/// from a [`RemoteRef`].
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct RemotePrototype {
    /// Single IP address.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    /// CIDR block.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cidr_block: Option<String>,
    /// Security group identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}
