//! Field resolution for items under render.

use crate::{
    error::{Error, Result},
    item::Item,
};

/// A composable field resolver mapping a field name and an item to rendered
/// text.
///
/// A context that does not supply the queried field reports
/// [`Error::MissingField`]; within a [`Contexts`] chain that failure hands
/// over to the next link, while any other error aborts resolution outright.
pub trait Context<T>: Send + Sync {
    /// Resolve `field` for `item`.
    fn resolve(&self, field: &str, item: &Item<T>) -> Result<String>;
}

fn missing<T>(field: &str, item: &Item<T>) -> Error {
    Error::MissingField {
        field: field.to_owned(),
        item: item.identifier().clone(),
    }
}

struct FieldContext<F> {
    name: String,
    resolve: F,
}

impl<T, F> Context<T> for FieldContext<F>
where
    F: Fn(&Item<T>) -> Result<String> + Send + Sync,
{
    fn resolve(&self, field: &str, item: &Item<T>) -> Result<String> {
        if field == self.name {
            (self.resolve)(item)
        } else {
            Err(missing(field, item))
        }
    }
}

/// Resolve `name` through `resolve`, leaving every other field missing.
pub fn field<T, F>(name: impl Into<String>, resolve: F) -> impl Context<T>
where
    F: Fn(&Item<T>) -> Result<String> + Send + Sync,
{
    FieldContext {
        name: name.into(),
        resolve,
    }
}

/// Resolve `name` to a fixed value.
pub fn const_field<T>(name: impl Into<String>, value: impl Into<String>) -> impl Context<T> {
    let value = value.into();
    field(name, move |_: &Item<T>| Ok(value.clone()))
}

/// Resolve `name` to the item's body.
pub fn body_field<T: AsRef<str>>(name: impl Into<String>) -> impl Context<T> {
    field(name, |item: &Item<T>| Ok(item.body().as_ref().to_owned()))
}

/// An ordered chain of contexts.
///
/// Resolution tries each link in order and the first success wins. A link
/// that reports a missing field falls through to the next one; an exhausted
/// chain reports the field as missing for the queried item, so an unknown
/// field always surfaces as a render failure rather than a silent blank.
pub struct Contexts<T> {
    links: Vec<Box<dyn Context<T>>>,
}

impl<T> Contexts<T> {
    pub fn new() -> Self {
        Self { links: Vec::new() }
    }

    /// Append a fallback link.
    pub fn with(mut self, link: impl Context<T> + 'static) -> Self {
        self.links.push(Box::new(link));
        self
    }
}

impl<T> Default for Contexts<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Context<T> for Contexts<T> {
    fn resolve(&self, field: &str, item: &Item<T>) -> Result<String> {
        for link in &self.links {
            match link.resolve(field, item) {
                Err(Error::MissingField { .. }) => continue,
                resolved => return resolved,
            }
        }
        Err(missing(field, item))
    }
}
