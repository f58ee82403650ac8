//! # CIM Diagram
//!
//! Editing core for category-theory diagrams: objects, morphisms, nested
//! diagrams, and functors whose images in a codomain diagram stay in sync
//! with their domain.
//!
//! This crate provides:
//! - **Document**: an arena owning every entity, addressed by stable uids
//! - **Diagrams**: containers of objects and morphisms that nest as objects
//! - **Functors**: arrows between diagrams that build and maintain images
//! - **Events**: change notifications for renderers and for functors
//! - **Commands**: serializable, reversible edits and a linear undo stack
//! - **Persistence**: JSON snapshots with a repairing two-pass loader
//!
//! ## Design Principles
//!
//! 1. **Uids, not pointers**: every cross reference is a [`Uid`]
//! 2. **Detach, never drop**: structural edits keep entities in the arena
//! 3. **Exact teardown**: observers are removed by handle, one pair at a time
//! 4. **Synchronous propagation**: an edit and everything it triggers finish
//!    before the call returns
//!
//! ## Example
//!
//! ```
//! use cim_diagram::{Editor, End};
//!
//! let mut editor = Editor::default();
//! let root = editor.root();
//! let c = editor.new_diagram();
//! let d = editor.new_diagram();
//! editor.add_object(root, c).unwrap();
//! editor.add_object(root, d).unwrap();
//!
//! let x = editor.new_object();
//! editor.add_object(c, x).unwrap();
//!
//! let functor = editor.new_functor();
//! editor.add_morphism(root, functor).unwrap();
//! editor.set_domain(functor, Some(c)).unwrap();
//! editor.set_codomain(functor, Some(d)).unwrap();
//!
//! let fx = editor.document().image_of(functor, x).unwrap();
//! assert_eq!(editor.document().symbol(fx), Some("F(x)"));
//! assert_eq!(editor.document().endpoint(functor, End::Codomain), Some(d));
//!
//! editor.undo().unwrap();
//! assert!(editor.document().objects(d).is_empty());
//! ```

#![warn(missing_docs)]

pub mod category;
pub mod commands;
pub mod config;
pub mod document;
pub mod editor;
pub mod entity;
pub mod errors;
pub mod events;
pub mod identifiers;
pub mod persistence;
pub mod undo_stack;

// Re-export core types
pub use category::{DeletionSnapshot, Detachment, ImageDelta};
pub use commands::{Action, Command, Operation};
pub use config::{EditorConfig, ImageNaming};
pub use document::{Document, EntityState};
pub use editor::Editor;
pub use entity::{
    Arrow, Diagram, Entity, EntityData, EntityKind, Functor, FunctorFlavor, FunctorState,
    GraphObject, MorphismFlag, MorphismFlags,
};
pub use errors::{DiagramError, DiagramResult};
pub use events::{DiagramEvent, DiagramListener, EventBus, Reaction, Signal};
pub use identifiers::{End, Position, SubscriptionId, Uid};
pub use persistence::{DocumentSnapshot, load, load_from_str, save, save_to_string};
pub use undo_stack::{UndoEntry, UndoStack};
