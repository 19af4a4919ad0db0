//! Data model shared by sources, stores and the reconciler
//!
//! Every value in this module is created fresh for a single tick and dropped
//! once the pass that produced it is over.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

macro_rules! string_newtype {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wrap a string without any normalization
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// Borrow the underlying string
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume the wrapper and return the underlying string
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

string_newtype!(
    /// An endpoint address as published in DNS (IPv4 or IPv6 literal)
    ///
    /// Equality is exact string equality. `10.0.0.1` and `010.000.000.001` are
    /// two different addresses as far as reconciliation is concerned.
    Address
);

string_newtype!(
    /// Name of a service registered in discovery, also the DNS label prefix
    ServiceName
);

string_newtype!(
    /// Opaque identifier of a managed DNS zone (e.g. a Route53 hosted zone id)
    ZoneId
);

string_newtype!(
    /// Fully-qualified domain suffix of a zone, exactly as the provider reports it
    ZoneName
);

impl ServiceName {
    /// DNS name under which this service's A records live in `zone`
    ///
    /// The name is `<service>.<zone>` verbatim; a trailing dot on the zone
    /// name (as Route53 reports it) is preserved.
    pub fn record_name(&self, zone: &ZoneName) -> String {
        format!("{}.{}", self.0, zone.0)
    }
}

/// Addresses currently reported healthy for a service
pub type DesiredSet = BTreeSet<Address>;

/// Provider-side representation of one published A record
///
/// Carries everything a store needs to delete the exact record it listed.
/// Handles are only meaningful within the tick that produced them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordHandle {
    /// Fully-qualified record name
    pub name: String,
    /// Address this handle is indexed under
    pub address: Address,
    /// All values of the underlying record set
    pub values: Vec<String>,
    /// Time-to-live, if the provider reports one
    pub ttl: Option<u32>,
    /// Routing weight for weighted record sets
    pub weight: Option<u64>,
    /// Discriminator between record sets sharing one name
    pub set_identifier: Option<String>,
}

impl RecordHandle {
    /// Handle for a weighted single-value A record keyed by its address
    pub fn weighted(name: impl Into<String>, address: Address, ttl: u32, weight: u64) -> Self {
        Self {
            name: name.into(),
            values: vec![address.to_string()],
            set_identifier: Some(address.to_string()),
            address,
            ttl: Some(ttl),
            weight: Some(weight),
        }
    }

    /// Whether both handles describe the same provider record set
    ///
    /// A record set is identified by its name and set identifier; the
    /// address a handle is indexed under does not matter.
    pub fn same_record_set(&self, other: &RecordHandle) -> bool {
        self.name == other.name && self.set_identifier == other.set_identifier
    }
}

/// Addresses currently published for a service in one zone, with their handles
///
/// The address set and the address → handle map are a single structure, so the
/// two views cannot disagree. An address published by several record sets
/// keeps one handle per set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObservedSet {
    records: BTreeMap<Address, Vec<RecordHandle>>,
}

impl ObservedSet {
    /// Create an empty observed set
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a handle under its address
    ///
    /// Returns `false` when the same record set is already indexed under
    /// that address.
    pub fn insert(&mut self, handle: RecordHandle) -> bool {
        let handles = self.records.entry(handle.address.clone()).or_default();
        if handles.iter().any(|h| h.same_record_set(&handle)) {
            return false;
        }
        handles.push(handle);
        true
    }

    /// Whether `address` is currently published
    pub fn contains(&self, address: &Address) -> bool {
        self.records.contains_key(address)
    }

    /// First handle publishing `address`
    pub fn handle(&self, address: &Address) -> Option<&RecordHandle> {
        self.handles(address).first()
    }

    /// Every handle publishing `address`, in listing order
    pub fn handles(&self, address: &Address) -> &[RecordHandle] {
        self.records.get(address).map(Vec::as_slice).unwrap_or_default()
    }

    /// Published addresses in ascending order
    pub fn addresses(&self) -> impl Iterator<Item = &Address> {
        self.records.keys()
    }

    /// Published addresses with their handles in ascending address order
    pub fn iter(&self) -> impl Iterator<Item = (&Address, &[RecordHandle])> {
        self.records.iter().map(|(address, handles)| (address, handles.as_slice()))
    }

    /// Number of distinct published addresses
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether nothing is published
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl FromIterator<RecordHandle> for ObservedSet {
    fn from_iter<I: IntoIterator<Item = RecordHandle>>(iter: I) -> Self {
        let mut set = Self::new();
        for handle in iter {
            set.insert(handle);
        }
        set
    }
}
