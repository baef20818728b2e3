//! Template rendering: the engine state and the apply operations.

pub mod splices;

mod driver_heist;

pub use driver_heist::{AttrSplice, Element, Node, RenderScope, ValueSplice};

use std::path::Path;

use crate::{context::Context, error::Result, item::Item};
use driver_heist::HeistEngine;

/// The loaded, parsed set of templates plus registered splices.
///
/// Built once per pipeline run and reused, read-only, for every subsequent
/// render call; renders of independent items may run concurrently.
pub struct EngineState<T> {
    engine: HeistEngine<T>,
}

impl<T: 'static> EngineState<T> {
    /// Load every template under `template_dir`, registering the built-in
    /// `hakyll` value-splice and `url` attribute-splice ahead of the
    /// supplied ones.
    ///
    /// A caller-supplied splice under a built-in's name replaces the
    /// built-in.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TemplateLoad`](crate::error::Error::TemplateLoad)
    /// listing every template that failed to load, or the error describing
    /// an inaccessible `template_dir`.
    pub fn try_load(
        template_dir: &Path,
        splices: Vec<(String, ValueSplice<T>)>,
        attr_splices: Vec<(String, AttrSplice<T>)>,
    ) -> Result<Self> {
        Ok(Self {
            engine: HeistEngine::try_load(template_dir, splices, attr_splices)?,
        })
    }

    /// Same as [`EngineState::try_load`] with empty splice lists.
    pub fn try_load_default(template_dir: &Path) -> Result<Self> {
        Self::try_load(template_dir, Vec::new(), Vec::new())
    }

    /// Load every template under `template_dir`, treating any failure as
    /// fatal.
    ///
    /// Templates are a build-time input assumed correct; recovery belongs to
    /// whoever fixes the template sources, not to the running pipeline.
    ///
    /// # Panics
    ///
    /// Panics with the accumulated failure text when the directory is
    /// inaccessible or any template fails to load.
    pub fn load(
        template_dir: &Path,
        splices: Vec<(String, ValueSplice<T>)>,
        attr_splices: Vec<(String, AttrSplice<T>)>,
    ) -> Self {
        match Self::try_load(template_dir, splices, attr_splices) {
            Ok(state) => state,
            Err(e) => panic!(
                "failed to load templates from '{}': {:?}",
                template_dir.display(),
                e
            ),
        }
    }

    /// Same as [`EngineState::load`] with empty splice lists.
    ///
    /// # Panics
    ///
    /// See [`EngineState::load`].
    pub fn load_default(template_dir: &Path) -> Self {
        Self::load(template_dir, Vec::new(), Vec::new())
    }

    /// Apply the named template to `item`.
    ///
    /// `context` and `item` are reachable by every splice for the duration
    /// of the render. On success the rendered text becomes the body of a new
    /// item carrying the input item's identity; `item` itself is left
    /// untouched.
    ///
    /// # Errors
    ///
    /// Fails when no template is loaded under `template`, and propagates any
    /// splice failure (unresolved field, malformed fragment, ...).
    pub fn try_apply(
        &self,
        template: &str,
        context: &dyn Context<T>,
        item: &Item<T>,
    ) -> Result<Item<String>> {
        log::debug!(
            "applying template '{}' to item '{}'",
            template,
            item.identifier()
        );
        let scope = RenderScope { context, item };
        let body = self.engine.try_render(template, &scope)?;
        Ok(item.with_body(body))
    }

    /// Apply the named template to every item in order and concatenate the
    /// rendered bodies.
    ///
    /// The first failure propagates; later items are not rendered.
    pub fn try_apply_all(
        &self,
        template: &str,
        context: &dyn Context<T>,
        items: &[Item<T>],
    ) -> Result<String> {
        self.try_apply_joined("", template, context, items)
    }

    /// Apply the named template to every item in order, placing `delimiter`
    /// between consecutive outputs.
    ///
    /// No leading or trailing delimiter is produced; an empty `items` yields
    /// the empty string. The first failure propagates; later items are not
    /// rendered.
    pub fn try_apply_joined(
        &self,
        delimiter: &str,
        template: &str,
        context: &dyn Context<T>,
        items: &[Item<T>],
    ) -> Result<String> {
        let mut out = String::new();
        for (i, item) in items.iter().enumerate() {
            if i > 0 {
                out.push_str(delimiter);
            }
            out.push_str(self.try_apply(template, context, item)?.body());
        }
        Ok(out)
    }
}
