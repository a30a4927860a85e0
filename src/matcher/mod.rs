pub mod classifier;
pub mod pattern;

pub use classifier::Classifier;
pub use pattern::{matches, Dialect, Pattern};
