//! Stable object handles.
//!
//! Registries that must survive save/load store these instead of live
//! world references (the "weak reference" pattern): relation plus lookup,
//! never ownership of the underlying simulation object. Resolution returns
//! an `Option` and may fail once the object is gone.

use serde::{Deserialize, Serialize};

/// Stable handle for any simulation object: unit, structure or feature.
/// Allocated from a session-wide counter and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectId(pub u32);

/// Handle for a managed group. Allocated from the session's own counter so
/// it can never collide with a host engine's native group ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GroupId(pub u32);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_order_by_allocation() {
        assert!(ObjectId(1) < ObjectId(2));
        assert!(GroupId(7) > GroupId(3));
    }
}
