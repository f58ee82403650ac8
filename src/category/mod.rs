//! Category structure of a document
//!
//! Each submodule adds one group of operations to
//! [`Document`](crate::document::Document): diagram membership and
//! deletion, arrow endpoints, and functor images. The binding registry is
//! the per-functor table of observer handles.

pub mod bindings;
pub mod diagram;
pub mod functor;
pub mod morphism;

pub use bindings::BindingRegistry;
pub use diagram::{DeletionSnapshot, Detachment};
pub use functor::ImageDelta;
