// Copyright 2025 Cowboy AI, LLC.

//! Change notifications and the observer registry
//!
//! Every mutation of a document raises a [`DiagramEvent`]. Two kinds of
//! observers consume them:
//!
//! - external [`DiagramListener`]s (the rendering collaborator), which only
//!   read the event, and
//! - internal subscriptions installed by functors, whose [`Reaction`] is
//!   plain data interpreted by the document. Because reactions are data, a
//!   functor can remove exactly the observers it installed.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::identifiers::{End, Position, SubscriptionId, Uid};

/// Notification tag an observer subscribes to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Signal {
    /// Label text changed
    SymbolChanged,
    /// Node moved to an absolute position
    PositionChanged,
    /// Node moved by a displacement
    PositionChangedDelta,
    /// Entity deleted
    Deleted,
    /// Deleted entity restored
    Undeleted,
    /// Morphism domain set or cleared
    DomainSet,
    /// Morphism codomain set or cleared
    CodomainSet,
    /// Morphism switched between straight and bezier
    BezierToggled,
    /// Morphism control points moved
    ControlPointsChanged,
    /// Diagram gained an object
    ObjectAdded,
    /// Diagram lost an object
    ObjectRemoved,
    /// Diagram gained a morphism
    MorphismAdded,
    /// Diagram lost a morphism
    MorphismRemoved,
}

/// A change notification raised by the document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DiagramEvent {
    /// `entity`'s label is now `symbol`
    SymbolChanged {
        /// Emitting entity
        entity: Uid,
        /// New label
        symbol: String,
    },
    /// `entity` moved to `position`
    PositionChanged {
        /// Emitting entity
        entity: Uid,
        /// New position
        position: Position,
    },
    /// `entity` moved by `delta`
    PositionChangedDelta {
        /// Emitting entity
        entity: Uid,
        /// Displacement
        delta: Position,
    },
    /// `entity` was deleted
    Deleted {
        /// Emitting entity
        entity: Uid,
    },
    /// `entity` was restored after deletion
    Undeleted {
        /// Emitting entity
        entity: Uid,
    },
    /// `morphism`'s domain is now `domain`
    DomainSet {
        /// Emitting morphism
        morphism: Uid,
        /// New domain
        domain: Option<Uid>,
    },
    /// `morphism`'s codomain is now `codomain`
    CodomainSet {
        /// Emitting morphism
        morphism: Uid,
        /// New codomain
        codomain: Option<Uid>,
    },
    /// `morphism` is now drawn straight or curved
    BezierToggled {
        /// Emitting morphism
        morphism: Uid,
        /// True for a bezier curve
        bezier: bool,
    },
    /// `morphism`'s control points moved
    ControlPointsChanged {
        /// Emitting morphism
        morphism: Uid,
        /// New points
        points: Vec<Position>,
    },
    /// `object` joined `diagram`
    ObjectAdded {
        /// Emitting diagram
        diagram: Uid,
        /// New member
        object: Uid,
    },
    /// `object` left `diagram`
    ObjectRemoved {
        /// Emitting diagram
        diagram: Uid,
        /// Former member
        object: Uid,
    },
    /// `morphism` joined `diagram`
    MorphismAdded {
        /// Emitting diagram
        diagram: Uid,
        /// New member
        morphism: Uid,
    },
    /// `morphism` left `diagram`
    MorphismRemoved {
        /// Emitting diagram
        diagram: Uid,
        /// Former member
        morphism: Uid,
    },
}

impl DiagramEvent {
    /// Entity that raised the event
    pub fn source(&self) -> Uid {
        match self {
            DiagramEvent::SymbolChanged { entity, .. }
            | DiagramEvent::PositionChanged { entity, .. }
            | DiagramEvent::PositionChangedDelta { entity, .. }
            | DiagramEvent::Deleted { entity }
            | DiagramEvent::Undeleted { entity } => *entity,
            DiagramEvent::DomainSet { morphism, .. }
            | DiagramEvent::CodomainSet { morphism, .. }
            | DiagramEvent::BezierToggled { morphism, .. }
            | DiagramEvent::ControlPointsChanged { morphism, .. } => *morphism,
            DiagramEvent::ObjectAdded { diagram, .. }
            | DiagramEvent::ObjectRemoved { diagram, .. }
            | DiagramEvent::MorphismAdded { diagram, .. }
            | DiagramEvent::MorphismRemoved { diagram, .. } => *diagram,
        }
    }

    /// Tag of the event
    pub fn signal(&self) -> Signal {
        match self {
            DiagramEvent::SymbolChanged { .. } => Signal::SymbolChanged,
            DiagramEvent::PositionChanged { .. } => Signal::PositionChanged,
            DiagramEvent::PositionChangedDelta { .. } => Signal::PositionChangedDelta,
            DiagramEvent::Deleted { .. } => Signal::Deleted,
            DiagramEvent::Undeleted { .. } => Signal::Undeleted,
            DiagramEvent::DomainSet { .. } => Signal::DomainSet,
            DiagramEvent::CodomainSet { .. } => Signal::CodomainSet,
            DiagramEvent::BezierToggled { .. } => Signal::BezierToggled,
            DiagramEvent::ControlPointsChanged { .. } => Signal::ControlPointsChanged,
            DiagramEvent::ObjectAdded { .. } => Signal::ObjectAdded,
            DiagramEvent::ObjectRemoved { .. } => Signal::ObjectRemoved,
            DiagramEvent::MorphismAdded { .. } => Signal::MorphismAdded,
            DiagramEvent::MorphismRemoved { .. } => Signal::MorphismRemoved,
        }
    }

    /// The endpoint an endpoint event talks about
    pub fn endpoint(&self) -> Option<(End, Option<Uid>)> {
        match self {
            DiagramEvent::DomainSet { domain, .. } => Some((End::Domain, *domain)),
            DiagramEvent::CodomainSet { codomain, .. } => Some((End::Codomain, *codomain)),
            _ => None,
        }
    }
}

/// What an internal subscription does when its signal fires
///
/// Every variant names the functor that installed it; `image` is the
/// entity the reaction writes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Reaction {
    /// Re-derive the image label from the source label
    ReflectSymbol {
        /// Owning functor
        functor: Uid,
        /// Source entity
        source: Uid,
        /// Image entity
        image: Uid,
    },
    /// Delete the image and drop the mapping entry
    DeleteImage {
        /// Owning functor
        functor: Uid,
        /// Source entity
        source: Uid,
        /// Image entity
        image: Uid,
    },
    /// Move the image by the same delta as the source
    ReflectPositionDelta {
        /// Owning functor
        functor: Uid,
        /// Image entity
        image: Uid,
    },
    /// Re-resolve one image endpoint through the mapping
    ReflectEndpoint {
        /// Owning functor
        functor: Uid,
        /// Image arrow
        image: Uid,
        /// Source endpoint the subscription listens to
        end: End,
    },
    /// Mirror a straight/bezier switch
    ReflectBezier {
        /// Owning functor
        functor: Uid,
        /// Image arrow
        image: Uid,
    },
    /// Mirror control point positions
    ReflectControlPoints {
        /// Owning functor
        functor: Uid,
        /// Image arrow
        image: Uid,
    },
    /// Image whatever the domain gained
    UpdateImage {
        /// Owning functor
        functor: Uid,
    },
    /// Retract the image of whatever the domain lost
    RetractImage {
        /// Owning functor
        functor: Uid,
    },
}

impl Reaction {
    /// The functor that owns the subscription
    pub fn functor(&self) -> Uid {
        match self {
            Reaction::ReflectSymbol { functor, .. }
            | Reaction::DeleteImage { functor, .. }
            | Reaction::ReflectPositionDelta { functor, .. }
            | Reaction::ReflectEndpoint { functor, .. }
            | Reaction::ReflectBezier { functor, .. }
            | Reaction::ReflectControlPoints { functor, .. }
            | Reaction::UpdateImage { functor }
            | Reaction::RetractImage { functor } => *functor,
        }
    }
}

/// One registered observer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    /// Entity whose events are observed
    pub source: Uid,
    /// Observed signal
    pub signal: Signal,
    /// What to do
    pub reaction: Reaction,
}

/// External observer of document changes
pub trait DiagramListener {
    /// Called once per event, before internal propagation runs
    fn on_event(&mut self, event: &DiagramEvent);
}

/// Observer registry with exact, handle-based teardown
#[derive(Debug, Default)]
pub struct EventBus {
    next_id: u64,
    subscriptions: IndexMap<SubscriptionId, Subscription>,
    index: HashMap<(Uid, Signal), Vec<SubscriptionId>>,
}

impl EventBus {
    /// Create an empty bus
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `reaction` for `signal` raised by `source`
    pub fn subscribe(&mut self, source: Uid, signal: Signal, reaction: Reaction) -> SubscriptionId {
        self.next_id += 1;
        let id = SubscriptionId::from_raw(self.next_id);
        self.subscriptions.insert(
            id,
            Subscription {
                source,
                signal,
                reaction,
            },
        );
        self.index.entry((source, signal)).or_default().push(id);
        id
    }

    /// Remove one observer; false if it was not registered
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let Some(subscription) = self.subscriptions.shift_remove(&id) else {
            return false;
        };
        let key = (subscription.source, subscription.signal);
        if let Some(ids) = self.index.get_mut(&key) {
            ids.retain(|other| *other != id);
            if ids.is_empty() {
                self.index.remove(&key);
            }
        }
        true
    }

    /// True while the observer is registered
    pub fn is_live(&self, id: SubscriptionId) -> bool {
        self.subscriptions.contains_key(&id)
    }

    /// Look up one observer
    pub fn get(&self, id: SubscriptionId) -> Option<&Subscription> {
        self.subscriptions.get(&id)
    }

    /// Snapshot of the observers for `signal` on `source`, in registration order
    pub fn matching(&self, source: Uid, signal: Signal) -> Vec<(SubscriptionId, Reaction)> {
        self.index
            .get(&(source, signal))
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| self.subscriptions.get(id).map(|s| (*id, s.reaction)))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Every observer watching `source`
    pub fn subscriptions_for(&self, source: Uid) -> Vec<(SubscriptionId, &Subscription)> {
        self.subscriptions
            .iter()
            .filter(|(_, s)| s.source == source)
            .map(|(id, s)| (*id, s))
            .collect()
    }

    /// True if any observer watches `uid` or writes to it
    pub fn references(&self, uid: Uid) -> bool {
        self.subscriptions.values().any(|s| {
            s.source == uid
                || match s.reaction {
                    Reaction::ReflectSymbol { source, image, .. }
                    | Reaction::DeleteImage { source, image, .. } => source == uid || image == uid,
                    Reaction::ReflectPositionDelta { image, .. }
                    | Reaction::ReflectEndpoint { image, .. }
                    | Reaction::ReflectBezier { image, .. }
                    | Reaction::ReflectControlPoints { image, .. } => image == uid,
                    Reaction::UpdateImage { .. } | Reaction::RetractImage { .. } => false,
                }
        })
    }

    /// Number of registered observers
    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    /// True when nothing is registered
    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }
}
