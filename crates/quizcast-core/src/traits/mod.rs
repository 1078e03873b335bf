//! Collaborator traits: the seams between the quiz lifecycle and the outside world.

pub mod delivery;
pub mod probe;
pub mod source;
pub mod store;

pub use delivery::{Deliverer, Template};
pub use probe::ImageProbe;
pub use source::ProblemSource;
pub use store::QuizStore;
