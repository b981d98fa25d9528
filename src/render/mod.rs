//! Rendering of annotated graphs
//!
//! - `dot`: Graphviz DOT text
//! - `layout`: runs the external layout engine on a DOT file

pub mod dot;
pub mod layout;

pub use dot::to_dot;
pub use layout::LayoutEngine;
