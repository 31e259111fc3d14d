//! Scalar-or-list JSON shape.
//!
//! `/translate` and `/identify-language` accept either a single value or a
//! list, and the response mirrors the request shape field by field.

use serde::{Deserialize, Serialize};

/// A value that is either a single `T` or a list of `T` on the wire.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    /// A single scalar value.
    One(T),
    /// A list of values.
    Many(Vec<T>),
}

impl<T> OneOrMany<T> {
    /// Whether the wire form was a scalar.
    pub fn is_one(&self) -> bool {
        matches!(self, Self::One(_))
    }

    /// Number of contained items (1 for a scalar).
    pub fn len(&self) -> usize {
        match self {
            Self::One(_) => 1,
            Self::Many(items) => items.len(),
        }
    }

    /// Whether this holds no items (only possible for an empty list).
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Flatten into a vector, losing the scalar/list distinction.
    pub fn into_vec(self) -> Vec<T> {
        match self {
            Self::One(item) => vec![item],
            Self::Many(items) => items,
        }
    }

    /// Rebuild the wire shape: a length-1 vector becomes a scalar when the
    /// request was a scalar.
    ///
    /// # Panics
    /// Panics if `scalar` is true and `items` does not hold exactly one
    /// element; callers guarantee this by construction.
    pub fn from_parts(scalar: bool, mut items: Vec<T>) -> Self {
        if scalar {
            assert_eq!(items.len(), 1, "scalar response requires exactly one item");
            Self::One(items.remove(0))
        } else {
            Self::Many(items)
        }
    }
}
