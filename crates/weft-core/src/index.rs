//! Network and application key indices.
//!
//! Key indices are 12-bit values on the wire; both index spaces share the
//! same `0x0000..=0x0FFF` range. Index 0 of the network space is reserved
//! for the primary subnet.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ManagerError;

/// Highest valid key index in either space.
pub const MAX_KEY_INDEX: u16 = 0x0FFF;

macro_rules! key_index {
    ($(#[$doc:meta])* $name:ident, $err:literal) => {
        $(#[$doc])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        #[serde(try_from = "u16", into = "u16")]
        pub struct $name(u16);

        impl $name {
            /// Create an index, or `None` if out of the 12-bit range.
            #[must_use]
            pub const fn new(raw: u16) -> Option<Self> {
                if raw <= MAX_KEY_INDEX { Some(Self(raw)) } else { None }
            }

            /// Raw index value.
            #[must_use]
            pub const fn value(self) -> u16 {
                self.0
            }
        }

        impl TryFrom<u16> for $name {
            type Error = ManagerError;

            fn try_from(raw: u16) -> Result<Self, Self::Error> {
                Self::new(raw).ok_or(ManagerError::InvalidArguments($err))
            }
        }

        impl From<$name> for u16 {
            fn from(idx: $name) -> Self {
                idx.value()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{:03x}", self.0)
            }
        }
    };
}

key_index!(
    /// Index of a network (subnet) key.
    NetKeyIndex,
    "bad net index"
);

key_index!(
    /// Index of an application key.
    AppKeyIndex,
    "bad app index"
);

impl NetKeyIndex {
    /// The reserved index of the primary subnet.
    pub const PRIMARY: Self = Self(0);

    /// Whether this is the primary subnet's index.
    #[must_use]
    pub const fn is_primary(self) -> bool {
        self.0 == 0
    }
}
