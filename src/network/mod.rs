pub mod behavior;
pub mod node;
pub mod transport;

pub use node::NoteNode;
