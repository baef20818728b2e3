use std::{fs, path::Path};

use proptest::prelude::Strategy;
use quill_lib::{Contexts, Item, context};
use tempfile::TempDir;

// Characters that pass through a render byte-for-byte: no markup delimiters,
// no entity references, nothing the serializer would quote.
const PLAIN_TEXT_STRATEGY: &str = "[a-zA-Z0-9 .,!?]*";

pub fn body() -> impl Strategy<Value = String> {
    PLAIN_TEXT_STRATEGY
}

pub fn item() -> impl Strategy<Value = Item<String>> {
    ("[a-z]{1,12}", body()).prop_map(|(stem, body)| Item::new(format!("posts/{stem}.md"), body))
}

pub fn items(max: usize) -> impl Strategy<Value = Vec<Item<String>>> {
    proptest::collection::vec(item(), 0..max)
}

pub fn delimiter() -> impl Strategy<Value = String> {
    "[-,;| ]{0,3}"
}

/// A template directory under construction.
///
/// The directory lives in the system temp location and is removed on drop.
pub struct TemplateDir {
    root: TempDir,
}

impl TemplateDir {
    pub fn new() -> Self {
        Self {
            root: tempfile::tempdir().unwrap(),
        }
    }

    /// Write `source` as the template named `name`.
    pub fn write(self, name: &str, source: &str) -> Self {
        let path = self.root.path().join(format!("{name}.tpl"));
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, source).unwrap();
        self
    }

    pub fn path(&self) -> &Path {
        self.root.path()
    }
}

impl Default for TemplateDir {
    fn default() -> Self {
        Self::new()
    }
}

/// A context supplying the fields the default fixtures reference: `body`,
/// `title` and `url`.
pub fn item_context() -> Contexts<String> {
    Contexts::new()
        .with(context::body_field("body"))
        .with(context::field("title", |item: &Item<String>| {
            Ok(format!("Title of {}", item.identifier()))
        }))
        .with(context::const_field("url", "/x.png"))
}
