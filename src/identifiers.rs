// Copyright 2025 Cowboy AI, LLC.

//! Identifier and geometry value types
//!
//! Every graph entity carries a [`Uid`] that is independent of where the
//! entity lives in memory. All cross references in a document (endpoints,
//! parents, functor mappings) are uids, never pointers.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign, Neg, Sub};
use uuid::Uuid;

/// Process-unique, stable identifier of a graph entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Uid(Uuid);

impl Uid {
    /// Create a new random uid
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create from a UUID
    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    /// Get the underlying UUID
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for Uid {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for Uid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uid> for Uuid {
    fn from(id: Uid) -> Self {
        id.0
    }
}

/// Handle of one observer registration on the event bus
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    pub(crate) fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw counter value
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub#{}", self.0)
    }
}

/// A point (or displacement) in scene coordinates
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    /// Horizontal coordinate
    pub x: f64,
    /// Vertical coordinate
    pub y: f64,
}

impl Position {
    /// Create a position
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// The origin
    pub const fn origin() -> Self {
        Self { x: 0.0, y: 0.0 }
    }

    /// True if both coordinates are zero
    pub fn is_zero(&self) -> bool {
        self.x == 0.0 && self.y == 0.0
    }
}

impl Add for Position {
    type Output = Position;

    fn add(self, rhs: Position) -> Position {
        Position::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl AddAssign for Position {
    fn add_assign(&mut self, rhs: Position) {
        self.x += rhs.x;
        self.y += rhs.y;
    }
}

impl Sub for Position {
    type Output = Position;

    fn sub(self, rhs: Position) -> Position {
        Position::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Neg for Position {
    type Output = Position;

    fn neg(self) -> Position {
        Position::new(-self.x, -self.y)
    }
}

/// One of the two endpoints of a morphism
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum End {
    /// The source object
    Domain,
    /// The target object
    Codomain,
}

impl End {
    /// The other endpoint
    pub fn opposite(self) -> End {
        match self {
            End::Domain => End::Codomain,
            End::Codomain => End::Domain,
        }
    }
}

impl fmt::Display for End {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            End::Domain => write!(f, "domain"),
            End::Codomain => write!(f, "codomain"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_uid_uniqueness() {
        let ids: HashSet<Uid> = (0..1000).map(|_| Uid::new()).collect();
        assert_eq!(ids.len(), 1000);
    }

    #[test]
    fn test_uid_serializes_as_plain_string() {
        let uid = Uid::new();
        let json = serde_json::to_string(&uid).unwrap();
        assert_eq!(json, format!("\"{uid}\""));
        let back: Uid = serde_json::from_str(&json).unwrap();
        assert_eq!(back, uid);
    }

    #[test]
    fn test_position_arithmetic() {
        let mut p = Position::new(1.0, 2.0);
        p += Position::new(0.5, -1.0);
        assert_eq!(p, Position::new(1.5, 1.0));
        assert_eq!(p - Position::new(1.5, 1.0), Position::origin());
        assert!((-Position::origin()).is_zero());
    }

    #[test]
    fn test_end_opposite() {
        assert_eq!(End::Domain.opposite(), End::Codomain);
        assert_eq!(End::Codomain.opposite(), End::Domain);
    }
}
