// Copyright 2025 Cowboy AI, LLC.

//! Graph entities: objects, morphisms, diagrams and functors
//!
//! An [`Entity`] is the record the document arena stores for every node and
//! edge of a diagram. The shared part (uid, symbol, parent) lives on the
//! entity itself; the kind-specific part lives in [`EntityData`].
//!
//! Diagrams are object-like (they can sit inside another diagram and be the
//! endpoint of an arrow) and functors are morphism-like (they have a domain
//! and a codomain). The accessors [`Entity::node`] and [`Entity::arrow`]
//! expose that shared shape without the caller matching on the kind.

use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::category::bindings::BindingRegistry;
use crate::identifiers::{End, Position, SubscriptionId, Uid};

/// Closed set of entity kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    /// A plain node
    Object,
    /// A plain arrow between objects
    Morphism,
    /// A container of objects and morphisms, itself usable as an object
    Diagram,
    /// An arrow between diagrams carrying a structural mapping
    Functor,
}

impl EntityKind {
    /// Kinds that can be members of a diagram's object set
    pub fn is_object_like(&self) -> bool {
        matches!(self, EntityKind::Object | EntityKind::Diagram)
    }

    /// Kinds that can be members of a diagram's morphism set
    pub fn is_morphism_like(&self) -> bool {
        matches!(self, EntityKind::Morphism | EntityKind::Functor)
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EntityKind::Object => "object",
            EntityKind::Morphism => "morphism",
            EntityKind::Diagram => "diagram",
            EntityKind::Functor => "functor",
        };
        write!(f, "{name}")
    }
}

/// Structural markers drawn on an arrow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MorphismFlags {
    /// "There exists" (dotted) arrow
    pub exists: bool,
    /// Monomorphism
    pub mono: bool,
    /// Epimorphism
    pub epi: bool,
    /// Isomorphism
    pub iso: bool,
}

/// Name of one [`MorphismFlags`] field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MorphismFlag {
    /// See [`MorphismFlags::exists`]
    Exists,
    /// See [`MorphismFlags::mono`]
    Mono,
    /// See [`MorphismFlags::epi`]
    Epi,
    /// See [`MorphismFlags::iso`]
    Iso,
}

impl MorphismFlags {
    /// Read one flag
    pub fn get(&self, flag: MorphismFlag) -> bool {
        match flag {
            MorphismFlag::Exists => self.exists,
            MorphismFlag::Mono => self.mono,
            MorphismFlag::Epi => self.epi,
            MorphismFlag::Iso => self.iso,
        }
    }

    /// Write one flag
    pub fn set(&mut self, flag: MorphismFlag, value: bool) {
        match flag {
            MorphismFlag::Exists => self.exists = value,
            MorphismFlag::Mono => self.mono = value,
            MorphismFlag::Epi => self.epi = value,
            MorphismFlag::Iso => self.iso = value,
        }
    }
}

/// Node payload shared by objects and diagrams
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GraphObject {
    /// Position in scene coordinates
    pub position: Position,

    /// Arrows that currently use this node as an endpoint (non-owning)
    #[serde(skip)]
    pub arrows: IndexSet<Uid>,
}

/// Edge payload shared by morphisms and functors
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Arrow {
    /// Source object, `None` while unattached
    pub domain: Option<Uid>,
    /// Target object, `None` while unattached
    pub codomain: Option<Uid>,
    /// Structural markers
    pub flags: MorphismFlags,
    /// Two points for a straight arrow, four for a bezier curve
    pub control_points: Vec<Position>,
}

impl Default for Arrow {
    fn default() -> Self {
        Self {
            domain: None,
            codomain: None,
            flags: MorphismFlags::default(),
            control_points: vec![Position::origin(); 2],
        }
    }
}

impl Arrow {
    /// Endpoint at `end`
    pub fn endpoint(&self, end: End) -> Option<Uid> {
        match end {
            End::Domain => self.domain,
            End::Codomain => self.codomain,
        }
    }

    pub(crate) fn endpoint_mut(&mut self, end: End) -> &mut Option<Uid> {
        match end {
            End::Domain => &mut self.domain,
            End::Codomain => &mut self.codomain,
        }
    }

    /// True when drawn as a cubic curve
    pub fn is_bezier(&self) -> bool {
        self.control_points.len() == 4
    }
}

/// Container payload: a diagram owns the membership of its children
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Diagram {
    /// Node part, so a diagram can nest in another one
    pub node: GraphObject,
    /// Member objects (including nested diagrams)
    pub objects: IndexSet<Uid>,
    /// Member morphisms (including functors)
    pub morphisms: IndexSet<Uid>,
}

impl Diagram {
    /// True iff the diagram has at least one object or morphism
    pub fn nonempty(&self) -> bool {
        !self.objects.is_empty() || !self.morphisms.is_empty()
    }
}

/// Naming and variance behaviour of a functor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FunctorFlavor {
    /// `F(x)` naming, user-chosen variance
    #[default]
    Plain,
    /// The opposite-category functor: `x^op` naming, always contravariant
    Opposite,
}

/// Functor payload: an arrow between diagrams plus its image bookkeeping
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Functor {
    /// Endpoint part; domain and codomain are diagrams
    pub arrow: Arrow,
    /// Source uid to image uid, for every currently imaged source entity
    pub mapping: IndexMap<Uid, Uid>,
    /// Image arrows run against their sources
    pub contravariant: bool,
    /// Mirror positions and arrow shapes onto the images
    pub reflect_graphics: bool,
    /// Naming flavour
    pub flavor: FunctorFlavor,
    /// Copy cache: source uid to the image built for it, kept across retractions
    pub memo: IndexMap<Uid, Uid>,
    /// Live observer handles per (source, image) pair
    #[serde(skip)]
    pub bindings: BindingRegistry,
    /// Observers on the domain diagram's membership notifications
    #[serde(skip)]
    pub domain_watch: Vec<SubscriptionId>,
    /// Set while the functor is not a member of any diagram
    pub suspended: bool,
    /// Set while a propagation pass of this functor is running
    #[serde(skip)]
    pub propagating: bool,
}

impl Functor {
    /// A detached functor
    pub fn new(flavor: FunctorFlavor, reflect_graphics: bool) -> Self {
        Self {
            arrow: Arrow::default(),
            mapping: IndexMap::new(),
            contravariant: flavor == FunctorFlavor::Opposite,
            reflect_graphics,
            flavor,
            memo: IndexMap::new(),
            bindings: BindingRegistry::default(),
            domain_watch: Vec::new(),
            suspended: false,
            propagating: false,
        }
    }

    /// Attachment state derived from the endpoints
    pub fn state(&self) -> FunctorState {
        match (self.arrow.domain, self.arrow.codomain) {
            (None, None) => FunctorState::Detached,
            (Some(_), None) => FunctorState::DomainOnly,
            (None, Some(_)) => FunctorState::CodomainOnly,
            (Some(_), Some(_)) => FunctorState::FullyAttached,
        }
    }

    /// Image of `source`, if it has been taken
    pub fn image_of(&self, source: Uid) -> Option<Uid> {
        self.mapping.get(&source).copied()
    }

    /// Source whose image is `image`, if any
    pub fn preimage_of(&self, image: Uid) -> Option<Uid> {
        self.mapping
            .iter()
            .find(|(_, y)| **y == image)
            .map(|(x, _)| *x)
    }

    /// True if `uid` is one of this functor's images
    pub fn is_image(&self, uid: Uid) -> bool {
        self.mapping.values().any(|y| *y == uid)
    }
}

/// Attachment states of a functor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FunctorState {
    /// Neither endpoint attached
    Detached,
    /// Only the domain attached
    DomainOnly,
    /// Only the codomain attached
    CodomainOnly,
    /// Both endpoints attached; the image is live
    FullyAttached,
}

/// Kind-specific payload of an entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EntityData {
    /// See [`EntityKind::Object`]
    Object(GraphObject),
    /// See [`EntityKind::Morphism`]
    Morphism(Arrow),
    /// See [`EntityKind::Diagram`]
    Diagram(Diagram),
    /// See [`EntityKind::Functor`]
    Functor(Functor),
}

/// A graph entity stored in the document arena
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    /// Immutable identifier
    pub uid: Uid,
    /// Label text
    pub symbol: String,
    /// Containing diagram (back reference only)
    pub parent: Option<Uid>,
    /// False for images whose symbol and position are driven by a functor
    pub editable: bool,
    /// Kind-specific payload
    pub data: EntityData,
}

impl Entity {
    fn with_data(symbol: impl Into<String>, data: EntityData) -> Self {
        Self {
            uid: Uid::new(),
            symbol: symbol.into(),
            parent: None,
            editable: true,
            data,
        }
    }

    /// A detached object
    pub fn object(symbol: impl Into<String>) -> Self {
        Self::with_data(symbol, EntityData::Object(GraphObject::default()))
    }

    /// A detached, unattached morphism
    pub fn morphism(symbol: impl Into<String>) -> Self {
        Self::with_data(symbol, EntityData::Morphism(Arrow::default()))
    }

    /// An empty detached diagram
    pub fn diagram(symbol: impl Into<String>) -> Self {
        Self::with_data(symbol, EntityData::Diagram(Diagram::default()))
    }

    /// A detached functor
    pub fn functor(symbol: impl Into<String>, flavor: FunctorFlavor, reflect_graphics: bool) -> Self {
        let mut entity = Self::with_data(
            symbol,
            EntityData::Functor(Functor::new(flavor, reflect_graphics)),
        );
        if flavor == FunctorFlavor::Opposite {
            entity.editable = false;
        }
        entity
    }

    /// Builder-style position
    pub fn at(mut self, position: Position) -> Self {
        if let Some(node) = self.node_mut() {
            node.position = position;
        }
        self
    }

    /// Kind tag
    pub fn kind(&self) -> EntityKind {
        match &self.data {
            EntityData::Object(_) => EntityKind::Object,
            EntityData::Morphism(_) => EntityKind::Morphism,
            EntityData::Diagram(_) => EntityKind::Diagram,
            EntityData::Functor(_) => EntityKind::Functor,
        }
    }

    /// Node part of objects and diagrams
    pub fn node(&self) -> Option<&GraphObject> {
        match &self.data {
            EntityData::Object(node) => Some(node),
            EntityData::Diagram(diagram) => Some(&diagram.node),
            _ => None,
        }
    }

    /// Mutable node part
    pub fn node_mut(&mut self) -> Option<&mut GraphObject> {
        match &mut self.data {
            EntityData::Object(node) => Some(node),
            EntityData::Diagram(diagram) => Some(&mut diagram.node),
            _ => None,
        }
    }

    /// Arrow part of morphisms and functors
    pub fn arrow(&self) -> Option<&Arrow> {
        match &self.data {
            EntityData::Morphism(arrow) => Some(arrow),
            EntityData::Functor(functor) => Some(&functor.arrow),
            _ => None,
        }
    }

    /// Mutable arrow part
    pub fn arrow_mut(&mut self) -> Option<&mut Arrow> {
        match &mut self.data {
            EntityData::Morphism(arrow) => Some(arrow),
            EntityData::Functor(functor) => Some(&mut functor.arrow),
            _ => None,
        }
    }

    /// Diagram payload
    pub fn diagram_data(&self) -> Option<&Diagram> {
        match &self.data {
            EntityData::Diagram(diagram) => Some(diagram),
            _ => None,
        }
    }

    /// Mutable diagram payload
    pub fn diagram_data_mut(&mut self) -> Option<&mut Diagram> {
        match &mut self.data {
            EntityData::Diagram(diagram) => Some(diagram),
            _ => None,
        }
    }

    /// Functor payload
    pub fn functor_data(&self) -> Option<&Functor> {
        match &self.data {
            EntityData::Functor(functor) => Some(functor),
            _ => None,
        }
    }

    /// Mutable functor payload
    pub fn functor_data_mut(&mut self) -> Option<&mut Functor> {
        match &mut self.data {
            EntityData::Functor(functor) => Some(functor),
            _ => None,
        }
    }

    /// Position of a node, `None` for arrows
    pub fn position(&self) -> Option<Position> {
        self.node().map(|node| node.position)
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol)
    }
}
