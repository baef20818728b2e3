//! quill's templating core.
//!
//! A directory of Heist-style templates is loaded once per build into an
//! [`EngineState`]; applying a named template to an [`Item`] produces a new
//! item carrying the rendered text. Field values reach templates through a
//! composable [`Context`], and templates invoke the built-in `hakyll` and
//! `url` splices (or caller-registered ones) for substitution.

pub mod context;
pub mod error;
mod identifier;
mod item;
pub mod rendering;

pub use context::{Context, Contexts};
pub use identifier::Identifier;
pub use item::Item;
pub use rendering::EngineState;
