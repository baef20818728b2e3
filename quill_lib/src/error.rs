//! Error handling

use std::{fmt::Debug, io::Error as IoError, path::PathBuf};
use thiserror::Error;

use crate::identifier::Identifier;

/// Entities the template loader touches on disk
#[derive(Debug, Clone, Copy)]
#[non_exhaustive]
pub enum EntityKind {
    /// Toplevel directory containing the template files
    TemplateDirectory,
    /// A single template file
    Template,
    /// Some unspecified entity
    Other,
}

impl EntityKind {
    fn describe(&self) -> &'static str {
        match self {
            EntityKind::TemplateDirectory => "template directory",
            EntityKind::Template => "template file",
            EntityKind::Other => "file or directory",
        }
    }
}

fn build_desc_fileio(path: &Option<PathBuf>) -> String {
    match path {
        None => "".to_string(),
        Some(path) => format!(" for path '{}'", path.display()),
    }
}

fn build_desc_load_failures(failures: &[Error]) -> String {
    let mut desc = String::new();
    for failure in failures {
        desc.push_str(&format!("\n    {}", failure));
        let mut current = std::error::Error::source(failure);
        while let Some(cause) = current {
            desc.push_str(&format!(": {}", cause));
            current = cause.source();
        }
    }
    desc
}

fn fmt_source_chain(
    e: &impl std::error::Error,
    f: &mut std::fmt::Formatter<'_>,
) -> std::fmt::Result {
    writeln!(f, "{}\n", e)?;
    let mut current = e.source();
    while let Some(cause) = current {
        writeln!(f, "Caused by:\n\t{:?}", cause)?;
        current = cause.source();
    }
    Ok(())
}

/// Failure conditions encountered while loading or applying templates
#[derive(Error)]
#[non_exhaustive]
pub enum Error {
    /// File or directory not found
    #[error("failed to find {entity} at '{path}'", entity = missing.describe())]
    NotFound {
        /// The entity that is missing
        missing: EntityKind,
        /// The path that got searched for the missing entity
        path: PathBuf,
    },
    /// Invalid item identifier
    #[error("failed to derive an identifier for path '{path}'")]
    InvalidIdentifier {
        /// The erroneous filesystem path
        path: PathBuf,
    },
    /// Arbitrary file IO error
    #[error("failed to perform file IO{desc}", desc = build_desc_fileio(&path))]
    FileIO {
        /// The path associated with the underlying error
        path: Option<PathBuf>,
        /// The underlying error
        #[source]
        raw: IoError,
    },
    /// Malformed template source
    #[error("failed to parse template at '{location}'")]
    MalformedTemplate {
        /// The erroneous template's filesystem location
        location: PathBuf,
        /// The underlying error
        #[source]
        raw: anyhow::Error,
    },
    /// One or more templates failed to load
    #[error("failed to load templates:{desc}", desc = build_desc_load_failures(&failures))]
    TemplateLoad {
        /// Every failure encountered while reading the template directory
        failures: Vec<Error>,
    },
    /// Unknown template name at render time
    #[error("failed to apply template '{name}': no such template")]
    TemplateNotFound {
        /// The requested template name
        name: String,
    },
    /// A field no composed context could supply
    #[error("missing field '{field}' in context for item '{item}'")]
    MissingField {
        /// The field that went unresolved
        field: String,
        /// The item the field was resolved against
        item: Identifier,
    },
    /// The field splice was invoked without naming a field
    #[error("the hakyll splice needs a 'field' attribute")]
    MissingFieldAttribute,
    /// The field splice was invoked with an unsupported interpretation
    #[error("the 'as' attribute should be text, html, or xml")]
    UnsupportedInterpretation {
        /// The value the template author wrote
        given: String,
    },
    /// Malformed markup behind an html or xml interpretation
    #[error("failed to parse field content as a markup fragment")]
    MalformedFragment {
        /// The underlying error
        #[source]
        raw: anyhow::Error,
    },
}

impl std::fmt::Debug for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        fmt_source_chain(&self, f)
    }
}

/// Default return type for fallible operations
pub type Result<T> = std::result::Result<T, Error>;
