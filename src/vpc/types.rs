//! Shared wire types for the VPC API.

use std::ops::Deref;

use serde::{Deserialize, Serialize};

macro_rules! newtype {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, Eq, PartialEq)]
        pub struct $name(String);

        impl $name {
            /// Wraps a raw value.
            #[must_use]
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// Returns the wrapped value.
            #[must_use]
            pub const fn as_str(&self) -> &str {
                self.0.as_str()
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_owned())
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                self.as_str()
            }
        }

        impl Deref for $name {
            type Target = str;
            fn deref(&self) -> &Self::Target {
                self.as_str()
            }
        }
    };
}

newtype!(
    /// Entity tag returned by the API, echoed back in `If-Match`.
    Etag
);
newtype!(
    /// IAM bearer token.
    BearerToken
);

/// Reference to another resource as embedded in API responses.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct Reference {
    /// Resource identifier.
    pub id: String,
    /// User-assigned name, when the resource has one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Canonical URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub href: Option<String>,
    /// Cloud resource name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crn: Option<String>,
}

/// Zone reference; zones are addressed by name.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct ZoneRef {
    /// Zone name such as `us-south-1`.
    pub name: String,
}

/// Identity by identifier, used in request bodies.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct ById<'a> {
    /// Identifier of the referenced resource.
    pub id: &'a str,
}

/// Identity by name, used in request bodies.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct ByName<'a> {
    /// Name of the referenced resource.
    pub name: &'a str,
}

/// Identity by CRN, used in request bodies.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct ByCrn<'a> {
    /// CRN of the referenced resource.
    pub crn: &'a str,
}

/// Identity by address, used in request bodies.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct ByAddress<'a> {
    /// IP address.
    pub address: &'a str,
}

/// `{ "crn": ... }` as found in responses.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct CrnRef {
    /// Cloud resource name.
    pub crn: String,
}

/// `{ "address": ... }` as found in responses.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct AddressRef {
    /// IP address.
    pub address: String,
}
