//! Interfaces for defining graph nodes

mod errors;
pub use errors::*;

mod node;
pub use node::*;

mod spec;
pub use spec::*;

mod labels;
pub use labels::*;

mod dispatcher;
pub use dispatcher::*;
