//! Tagged request/response types shared by every layer.
//!
//! A producer port and a consumer port are valid/ready handshakes in the
//! source model. Here a producer offer is an `Option<T>` consumed exactly
//! when the slot is ready, and a consumer port is a per-step readiness flag
//! paired with an `Option<Response<T>>` delivery.

use serde::{Deserialize, Serialize};

/// Static identity of a slot. Equals the slot's array index and never changes
/// for the lifetime of the pool.
///
/// The tag is the single correctness-critical identifier: the engine must
/// return every completion with the tag it was admitted under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Tag(usize);

impl Tag {
    pub fn new(index: usize) -> Self {
        Self(index)
    }

    pub fn index(self) -> usize {
        self.0
    }
}

impl std::fmt::Display for Tag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A request on its way into the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request<T> {
    pub tag: Tag,
    pub payload: T,
}

/// A completion on its way back out, tag preserved end-to-end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response<T> {
    pub tag: Tag,
    pub payload: T,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_is_its_index() {
        let tag = Tag::new(3);
        assert_eq!(tag.index(), 3);
        assert_eq!(tag.to_string(), "3");
    }

    #[test]
    fn tag_serializes_transparently() {
        assert_eq!(serde_json::to_string(&Tag::new(7)).unwrap(), "7");
        assert_eq!(serde_json::from_str::<Tag>("7").unwrap(), Tag::new(7));
    }

    #[test]
    fn tags_order_by_index() {
        assert!(Tag::new(0) < Tag::new(1));
    }
}
