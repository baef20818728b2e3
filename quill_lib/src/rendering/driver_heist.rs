//! Heist-style template engine driver.
//!
//! Templates are forgiving markup: element nodes whose name matches a
//! registered value-splice are replaced by the splice's output, and
//! attributes whose name matches a registered attribute-splice are rewritten
//! in place. The driver owns the parsed node forest, the template store and
//! the splice tables; tokenizing the markup is quick-xml's job.

use std::{collections::HashMap, fs, path::Path};

use anyhow::{anyhow, bail};
use indexmap::IndexMap;
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use walkdir::{DirEntry, WalkDir};

use crate::{
    context::Context,
    error::{EntityKind, Error, Result},
    item::Item,
    rendering::splices as builtins,
};

/// Filename extension marking a file under the template directory as a
/// template.
const TEMPLATE_EXTENSION: &str = "tpl";

/// How strictly markup is parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ParseMode {
    /// HTML-style recovery: stray end tags are dropped, open elements close
    /// at end of input, unknown entities pass through verbatim and
    /// attributes may be written without a value.
    Lenient,
    /// Well-formedness required.
    Strict,
}

/// A single element node: name, ordered attributes, children.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub name: String,
    pub attrs: Vec<(String, String)>,
    pub children: Vec<Node>,
}

impl Element {
    /// The value of the attribute named `name`, if present.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}

/// One node of a parsed template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    /// Literal text, serialized verbatim.
    Text(String),
    /// A comment, serialized as written.
    Comment(String),
    /// An element.
    Element(Element),
}

/// The ambient pair reachable by every splice during a render: the caller's
/// context and the item currently under render.
pub struct RenderScope<'a, T> {
    pub context: &'a dyn Context<T>,
    pub item: &'a Item<T>,
}

/// A named extension producing replacement nodes for an element.
pub type ValueSplice<T> =
    Box<dyn Fn(&Element, &RenderScope<'_, T>) -> Result<Vec<Node>> + Send + Sync>;

/// A named extension rewriting one attribute into zero or more attributes.
pub type AttrSplice<T> =
    Box<dyn Fn(&str, &RenderScope<'_, T>) -> Result<Vec<(String, String)>> + Send + Sync>;

/// The loaded template store plus the registered splice tables.
///
/// Read-only once constructed; independent renders may run concurrently.
pub(crate) struct HeistEngine<T> {
    templates: HashMap<String, Vec<Node>>,
    splices: IndexMap<String, ValueSplice<T>>,
    attr_splices: IndexMap<String, AttrSplice<T>>,
}

impl<T: 'static> HeistEngine<T> {
    pub(crate) fn try_load(
        template_dir: &Path,
        splices: Vec<(String, ValueSplice<T>)>,
        attr_splices: Vec<(String, AttrSplice<T>)>,
    ) -> Result<Self> {
        // Built-ins first; inserting a caller entry under the same name
        // replaces the built-in.
        let mut splice_table: IndexMap<String, ValueSplice<T>> = IndexMap::new();
        splice_table.insert(
            builtins::FIELD_SPLICE.to_owned(),
            Box::new(builtins::hakyll_splice::<T>),
        );
        for (name, splice) in splices {
            splice_table.insert(name, splice);
        }

        let mut attr_table: IndexMap<String, AttrSplice<T>> = IndexMap::new();
        attr_table.insert(
            builtins::URL_SPLICE.to_owned(),
            Box::new(builtins::url_attr_splice::<T>),
        );
        for (name, splice) in attr_splices {
            attr_table.insert(name, splice);
        }

        if !template_dir.is_dir() {
            return Err(Error::NotFound {
                missing: EntityKind::TemplateDirectory,
                path: template_dir.to_path_buf(),
            });
        }

        let mut templates = HashMap::new();
        let mut failures = Vec::new();
        for entry in WalkDir::new(template_dir) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    failures.push(Error::FileIO {
                        path: e.path().map(|p| p.to_path_buf()),
                        raw: e.into(),
                    });
                    continue;
                }
            };
            if !is_template(&entry) {
                continue;
            }

            let location = entry.path();
            let name = template_name(template_dir, location);
            log::debug!("loading template '{}' from '{}'", name, location.display());
            let source = match fs::read_to_string(location) {
                Ok(source) => source,
                Err(raw) => {
                    failures.push(Error::FileIO {
                        path: Some(location.to_path_buf()),
                        raw,
                    });
                    continue;
                }
            };
            match parse_nodes(ParseMode::Lenient, &source) {
                Ok(nodes) => {
                    templates.insert(name, nodes);
                }
                Err(raw) => failures.push(Error::MalformedTemplate {
                    location: location.to_path_buf(),
                    raw,
                }),
            }
        }

        if !failures.is_empty() {
            return Err(Error::TemplateLoad { failures });
        }

        Ok(Self {
            templates,
            splices: splice_table,
            attr_splices: attr_table,
        })
    }

    pub(crate) fn try_render(&self, template: &str, scope: &RenderScope<'_, T>) -> Result<String> {
        let nodes = self
            .templates
            .get(template)
            .ok_or_else(|| Error::TemplateNotFound {
                name: template.to_owned(),
            })?;
        let rendered = self.eval_nodes(nodes, scope)?;
        let mut out = String::new();
        write_nodes(&mut out, &rendered);
        Ok(out)
    }

    /// Walk the forest, dispatching registered splices.
    ///
    /// Splice output is inserted as-is, not re-dispatched.
    fn eval_nodes(&self, nodes: &[Node], scope: &RenderScope<'_, T>) -> Result<Vec<Node>> {
        let mut out = Vec::with_capacity(nodes.len());
        for node in nodes {
            match node {
                Node::Element(element) => {
                    if let Some(splice) = self.splices.get(element.name.as_str()) {
                        out.extend(splice(element, scope)?);
                        continue;
                    }
                    let mut attrs = Vec::with_capacity(element.attrs.len());
                    for (name, value) in &element.attrs {
                        match self.attr_splices.get(name.as_str()) {
                            Some(splice) => attrs.extend(splice(value, scope)?),
                            None => attrs.push((name.clone(), value.clone())),
                        }
                    }
                    out.push(Node::Element(Element {
                        name: element.name.clone(),
                        attrs,
                        children: self.eval_nodes(&element.children, scope)?,
                    }));
                }
                passthrough => out.push(passthrough.clone()),
            }
        }
        Ok(out)
    }
}

fn is_template(entry: &DirEntry) -> bool {
    entry.file_type().is_file()
        && entry
            .path()
            .extension()
            .map(|ext| ext == TEMPLATE_EXTENSION)
            .unwrap_or(false)
}

/// Template names are extension-stripped paths relative to the template
/// directory, with `/` separators on every platform.
fn template_name(template_dir: &Path, location: &Path) -> String {
    let relative = location.strip_prefix(template_dir).unwrap_or(location);
    relative
        .with_extension("")
        .components()
        .map(|component| component.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

/// Parse markup into a node forest.
pub(crate) fn parse_nodes(mode: ParseMode, input: &str) -> anyhow::Result<Vec<Node>> {
    let mut reader = Reader::from_str(input);
    let config = reader.config_mut();
    // End tags are matched by the builder below, per parse mode.
    config.check_end_names = false;
    config.allow_unmatched_ends = true;

    let mut roots = Vec::new();
    let mut stack: Vec<Element> = Vec::new();

    loop {
        match reader.read_event()? {
            Event::Start(event) => stack.push(element_from(mode, &event)?),
            Event::Empty(event) => {
                let element = element_from(mode, &event)?;
                append(&mut roots, &mut stack, Node::Element(element));
            }
            Event::End(event) => {
                let name = String::from_utf8_lossy(event.name().as_ref()).into_owned();
                close_element(mode, &name, &mut roots, &mut stack)?;
            }
            Event::Text(event) => {
                let raw = event.decode()?;
                let text = unescape_text(mode, &raw)?;
                append(&mut roots, &mut stack, Node::Text(text));
            }
            Event::CData(event) => {
                let text = std::str::from_utf8(event.as_ref())?.to_owned();
                append(&mut roots, &mut stack, Node::Text(text));
            }
            Event::Comment(event) => {
                let comment = std::str::from_utf8(event.as_ref())?.to_owned();
                append(&mut roots, &mut stack, Node::Comment(comment));
            }
            Event::PI(event) => {
                let content = std::str::from_utf8(event.as_ref())?;
                append(&mut roots, &mut stack, Node::Text(format!("<?{}?>", content)));
            }
            Event::DocType(event) => {
                let content = std::str::from_utf8(event.as_ref())?;
                append(
                    &mut roots,
                    &mut stack,
                    Node::Text(format!("<!DOCTYPE {}>", content)),
                );
            }
            Event::GeneralRef(event) => {
                let raw = event.decode()?;
                let text = unescape_text(mode, &format!("&{};", raw))?;
                append(&mut roots, &mut stack, Node::Text(text));
            }
            Event::Decl(_) => {}
            Event::Eof => break,
        }
    }

    if mode == ParseMode::Strict {
        if let Some(open) = stack.last() {
            bail!("missing end tag '</{}>'", open.name);
        }
    }
    // Lenient recovery: close whatever is still open.
    while let Some(element) = stack.pop() {
        append(&mut roots, &mut stack, Node::Element(element));
    }

    Ok(roots)
}

fn append(roots: &mut Vec<Node>, stack: &mut [Element], node: Node) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(node),
        None => roots.push(node),
    }
}

fn close_element(
    mode: ParseMode,
    name: &str,
    roots: &mut Vec<Node>,
    stack: &mut Vec<Element>,
) -> anyhow::Result<()> {
    match mode {
        ParseMode::Strict => {
            let element = stack
                .pop()
                .ok_or_else(|| anyhow!("unexpected end tag '</{}>'", name))?;
            if element.name != name {
                bail!("end tag '</{}>' does not close '<{}>'", name, element.name);
            }
            append(roots, stack, Node::Element(element));
        }
        ParseMode::Lenient => {
            if !stack.iter().any(|element| element.name == name) {
                // Stray end tag, drop it.
                return Ok(());
            }
            while let Some(element) = stack.pop() {
                let closed = element.name == name;
                append(roots, stack, Node::Element(element));
                if closed {
                    break;
                }
            }
        }
    }
    Ok(())
}

fn element_from(mode: ParseMode, event: &BytesStart<'_>) -> anyhow::Result<Element> {
    let raw = std::str::from_utf8(event.as_ref())?;
    let name_len = event.name().as_ref().len();
    Ok(Element {
        name: raw[..name_len].to_owned(),
        attrs: parse_attrs(mode, &raw[name_len..])?,
        children: Vec::new(),
    })
}

/// Scan the attribute section of a start tag.
///
/// The tokenizer leaves this section uninterpreted. A value-less attribute
/// (`<a url/>`) carries the empty value in lenient mode and is an error in
/// strict mode.
fn parse_attrs(mode: ParseMode, raw: &str) -> anyhow::Result<Vec<(String, String)>> {
    let raw = raw.trim_end();
    let raw = raw.strip_suffix('/').unwrap_or(raw);
    let bytes = raw.as_bytes();

    let mut attrs = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i].is_ascii_whitespace() {
            i += 1;
            continue;
        }
        let key_start = i;
        while i < bytes.len() && !bytes[i].is_ascii_whitespace() && bytes[i] != b'=' {
            i += 1;
        }
        let key = raw[key_start..i].to_owned();

        let mut j = i;
        while j < bytes.len() && bytes[j].is_ascii_whitespace() {
            j += 1;
        }
        if j < bytes.len() && bytes[j] == b'=' {
            j += 1;
            while j < bytes.len() && bytes[j].is_ascii_whitespace() {
                j += 1;
            }
            let value = if j < bytes.len() && (bytes[j] == b'"' || bytes[j] == b'\'') {
                let quote = bytes[j];
                j += 1;
                let value_start = j;
                while j < bytes.len() && bytes[j] != quote {
                    j += 1;
                }
                if j == bytes.len() {
                    bail!("unterminated value for attribute '{}'", key);
                }
                let value = &raw[value_start..j];
                j += 1;
                value
            } else {
                let value_start = j;
                while j < bytes.len() && !bytes[j].is_ascii_whitespace() {
                    j += 1;
                }
                &raw[value_start..j]
            };
            attrs.push((key, unescape_text(mode, value)?));
        } else if mode == ParseMode::Strict {
            bail!("attribute '{}' has no value", key);
        } else {
            attrs.push((key, String::new()));
        }
        i = j;
    }
    Ok(attrs)
}

/// Resolve entity and character references.
///
/// Lenient mode lets unresolvable references through verbatim.
fn unescape_text(mode: ParseMode, raw: &str) -> anyhow::Result<String> {
    match quick_xml::escape::unescape(raw) {
        Ok(text) => Ok(text.into_owned()),
        Err(error) => match mode {
            ParseMode::Lenient => Ok(raw.to_owned()),
            ParseMode::Strict => Err(anyhow::Error::new(error)),
        },
    }
}

fn write_nodes(out: &mut String, nodes: &[Node]) {
    for node in nodes {
        match node {
            Node::Text(text) => out.push_str(text),
            Node::Comment(comment) => {
                out.push_str("<!--");
                out.push_str(comment);
                out.push_str("-->");
            }
            Node::Element(element) => write_element(out, element),
        }
    }
}

fn write_element(out: &mut String, element: &Element) {
    out.push('<');
    out.push_str(&element.name);
    for (name, value) in &element.attrs {
        out.push(' ');
        out.push_str(name);
        out.push_str("=\"");
        out.push_str(&escape_attr(value));
        out.push('"');
    }
    if element.children.is_empty() {
        out.push_str("/>");
    } else {
        out.push('>');
        write_nodes(out, &element.children);
        out.push_str("</");
        out.push_str(&element.name);
        out.push('>');
    }
}

// Text nodes are serialized verbatim; only attribute values need quoting to
// keep the output well-formed.
fn escape_attr(value: &str) -> String {
    value.replace('&', "&amp;").replace('"', "&quot;")
}
