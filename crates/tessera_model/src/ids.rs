//! Opaque ID newtypes for model entities.
//!
//! Each ID is a thin `u32` wrapper that is `Copy`, `Hash`, and
//! `Serialize`/`Deserialize`. IDs are handed out by the [`Context`]
//! (cell-type registration, subnet publication) and used for O(1) lookup.
//!
//! [`Context`]: crate::context::Context

use serde::{Deserialize, Serialize};

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
        pub struct $name(u32);

        impl $name {
            /// Creates an ID from a raw `u32` index.
            pub fn from_raw(index: u32) -> Self {
                Self(index)
            }

            /// Returns the raw `u32` index.
            pub fn as_raw(self) -> u32 {
                self.0
            }
        }
    };
}

define_id!(
    /// Opaque, copyable ID of a frozen subnet in the intern store.
    SubnetId
);

define_id!(
    /// Opaque, copyable ID of a cell type in the registry.
    CellTypeId
);

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn id_roundtrip() {
        let id = SubnetId::from_raw(42);
        assert_eq!(id.as_raw(), 42);
    }

    #[test]
    fn id_hash_in_set() {
        let mut set = HashSet::new();
        set.insert(CellTypeId::from_raw(1));
        set.insert(CellTypeId::from_raw(2));
        set.insert(CellTypeId::from_raw(1));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn id_serde_roundtrip() {
        let id = SubnetId::from_raw(99);
        let json = serde_json::to_string(&id).unwrap();
        let restored: SubnetId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, restored);
    }
}
