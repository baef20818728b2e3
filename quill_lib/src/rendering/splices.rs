//! Built-in splices.

use crate::{
    error::{Error, Result},
    rendering::driver_heist::{Element, Node, ParseMode, RenderScope, parse_nodes},
};

/// Name the field splice is registered under.
pub(crate) const FIELD_SPLICE: &str = "hakyll";
/// Name the url attribute splice is registered under.
pub(crate) const URL_SPLICE: &str = "url";

/// Attribute produced by a `url` marker written without a value.
const DEFAULT_URL_TARGET: &str = "href";

/// The `hakyll` value-splice: substitute a context field.
///
/// The element's `field` attribute names the field to resolve for the item
/// under render. The optional `as` attribute selects how the resolved value
/// is interpreted: `text` (the default) inserts it as one literal text node,
/// `html` and `xml` parse it as a markup fragment and insert the fragment's
/// nodes.
pub fn hakyll_splice<T>(element: &Element, scope: &RenderScope<'_, T>) -> Result<Vec<Node>> {
    let field = element.attr("field").ok_or(Error::MissingFieldAttribute)?;
    let value = scope.context.resolve(field, scope.item)?;
    match element.attr("as").unwrap_or("text") {
        "text" => Ok(vec![Node::Text(value)]),
        "html" => parse_fragment(ParseMode::Lenient, &value),
        "xml" => parse_fragment(ParseMode::Strict, &value),
        other => Err(Error::UnsupportedInterpretation {
            given: other.to_owned(),
        }),
    }
}

fn parse_fragment(mode: ParseMode, content: &str) -> Result<Vec<Node>> {
    parse_nodes(mode, content).map_err(|raw| Error::MalformedFragment { raw })
}

/// The `url` attribute-splice: rewrite the marker attribute into the item's
/// resolved `url` field.
///
/// The attribute's written value names the attribute to produce; writing the
/// bare marker produces `href`.
pub fn url_attr_splice<T>(
    written: &str,
    scope: &RenderScope<'_, T>,
) -> Result<Vec<(String, String)>> {
    let url = scope.context.resolve(URL_SPLICE, scope.item)?;
    let target = if written.is_empty() {
        DEFAULT_URL_TARGET
    } else {
        written
    };
    Ok(vec![(target.to_owned(), url)])
}
