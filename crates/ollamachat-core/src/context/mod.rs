mod builder;

pub use builder::{window, ContextBuilder};
