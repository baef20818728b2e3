use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

use proptest::prelude::*;
use quill_lib::{
    Contexts, EngineState, Item, context,
    error::Error,
    rendering::{Element, Node, RenderScope, ValueSplice},
};
use quill_testsuite::mock::{self, TemplateDir};

#[test]
fn field_splice_inserts_text_verbatim() {
    let dir = TemplateDir::new().write("page", "<h1><hakyll field=\"title\" as=\"text\"/></h1>");
    let state = EngineState::try_load_default(dir.path()).unwrap();
    let ctx = Contexts::new().with(context::const_field("title", "A & B"));
    let item = Item::new("a", String::new());

    let rendered = state.try_apply("page", &ctx, &item).unwrap();
    assert_eq!(rendered.body(), "<h1>A & B</h1>");
    assert_eq!(rendered.identifier(), item.identifier());
}

#[test]
fn interpretation_defaults_to_text() {
    let dir = TemplateDir::new().write("page", "<hakyll field=\"title\"/>");
    let state = EngineState::try_load_default(dir.path()).unwrap();
    let ctx = Contexts::new().with(context::const_field("title", "<b>A</b>"));
    let item = Item::new("a", String::new());

    let rendered = state.try_apply("page", &ctx, &item).unwrap();
    assert_eq!(rendered.body(), "<b>A</b>");
}

#[test]
fn html_interpretation_parses_the_fragment() {
    let dir = TemplateDir::new().write("page", "<p><hakyll field=\"teaser\" as=\"html\"/></p>");
    let state = EngineState::try_load_default(dir.path()).unwrap();
    let ctx = Contexts::new().with(context::const_field("teaser", "<b>A</b>"));
    let item = Item::new("a", String::new());

    let rendered = state.try_apply("page", &ctx, &item).unwrap();
    assert_eq!(rendered.body(), "<p><b>A</b></p>");
}

#[test]
fn html_interpretation_recovers_from_unclosed_markup() {
    let dir = TemplateDir::new().write("page", "<hakyll field=\"teaser\" as=\"html\"/>");
    let state = EngineState::try_load_default(dir.path()).unwrap();
    let ctx = Contexts::new().with(context::const_field("teaser", "<b>A"));
    let item = Item::new("a", String::new());

    let rendered = state.try_apply("page", &ctx, &item).unwrap();
    assert_eq!(rendered.body(), "<b>A</b>");
}

#[test]
fn xml_interpretation_requires_well_formed_content() {
    let dir = TemplateDir::new().write("page", "<hakyll field=\"teaser\" as=\"xml\"/>");
    let state = EngineState::try_load_default(dir.path()).unwrap();
    let item = Item::new("a", String::new());

    let ctx = Contexts::new().with(context::const_field("teaser", "<b>A</b>"));
    let rendered = state.try_apply("page", &ctx, &item).unwrap();
    assert_eq!(rendered.body(), "<b>A</b>");

    let ctx = Contexts::new().with(context::const_field("teaser", "<b>A"));
    let err = state.try_apply("page", &ctx, &item).unwrap_err();
    assert!(matches!(err, Error::MalformedFragment { .. }));
}

#[test]
fn unknown_interpretation_fails_with_the_fixed_message() {
    let dir = TemplateDir::new().write("page", "<hakyll field=\"title\" as=\"xyz\"/>");
    let state = EngineState::try_load_default(dir.path()).unwrap();
    let ctx = Contexts::new().with(context::const_field("title", "anything"));
    let item = Item::new("a", String::new());

    let err = state.try_apply("page", &ctx, &item).unwrap_err();
    assert_eq!(
        err.to_string(),
        "the 'as' attribute should be text, html, or xml"
    );
}

#[test]
fn missing_field_attribute_fails_the_render() {
    let dir = TemplateDir::new().write("page", "<hakyll as=\"text\"/>");
    let state = EngineState::try_load_default(dir.path()).unwrap();
    let item = Item::new("a", String::new());

    let err = state
        .try_apply("page", &mock::item_context(), &item)
        .unwrap_err();
    assert!(matches!(err, Error::MissingFieldAttribute));
    assert_eq!(err.to_string(), "the hakyll splice needs a 'field' attribute");
}

#[test]
fn url_marker_targets_the_written_attribute() {
    let dir = TemplateDir::new()
        .write("image", "<img url=\"src\"/>")
        .write("link", "<a url>x</a>")
        .write("quoted", "<a url=\"\">x</a>");
    let state = EngineState::try_load_default(dir.path()).unwrap();
    let ctx = Contexts::new().with(context::const_field("url", "/x.png"));
    let item = Item::new("a", String::new());

    let image = state.try_apply("image", &ctx, &item).unwrap();
    assert_eq!(image.body(), "<img src=\"/x.png\"/>");

    let link = state.try_apply("link", &ctx, &item).unwrap();
    assert_eq!(link.body(), "<a href=\"/x.png\">x</a>");

    let quoted = state.try_apply("quoted", &ctx, &item).unwrap();
    assert_eq!(quoted.body(), "<a href=\"/x.png\">x</a>");
}

#[test]
fn unresolved_field_fails_the_render() {
    let dir = TemplateDir::new().write("page", "<hakyll field=\"title\"/>");
    let state = EngineState::try_load_default(dir.path()).unwrap();
    let ctx = Contexts::new().with(context::const_field("other", "value"));
    let item = Item::new("posts/a.md", String::new());

    let err = state.try_apply("page", &ctx, &item).unwrap_err();
    assert!(matches!(err, Error::MissingField { .. }));
    assert_eq!(
        err.to_string(),
        "missing field 'title' in context for item 'posts/a.md'"
    );
}

#[test]
fn list_application_stops_at_the_first_failure() {
    let dir = TemplateDir::new().write("entry", "<hakyll field=\"title\"/>");
    let state = EngineState::try_load_default(dir.path()).unwrap();

    let resolved = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&resolved);
    let ctx = Contexts::new().with(context::field("title", move |item: &Item<String>| {
        seen.fetch_add(1, Ordering::SeqCst);
        if item.identifier().as_str() == "bad" {
            Err(Error::MissingField {
                field: "title".to_owned(),
                item: item.identifier().clone(),
            })
        } else {
            Ok("fine".to_owned())
        }
    }));

    let items = [
        Item::new("ok", String::new()),
        Item::new("bad", String::new()),
        Item::new("never", String::new()),
    ];
    let err = state.try_apply_all("entry", &ctx, &items).unwrap_err();
    assert!(matches!(err, Error::MissingField { .. }));
    assert_eq!(resolved.load(Ordering::SeqCst), 2);
}

#[test]
fn joining_no_items_yields_the_empty_string() {
    let dir = TemplateDir::new().write("entry", "<li><hakyll field=\"body\"/></li>");
    let state = EngineState::try_load_default(dir.path()).unwrap();
    let ctx = Contexts::new().with(context::body_field("body"));

    let joined = state.try_apply_joined(",", "entry", &ctx, &[]).unwrap();
    assert_eq!(joined, "");

    let one = [Item::new("a", "solo".to_owned())];
    let joined = state.try_apply_joined(",", "entry", &ctx, &one).unwrap();
    assert_eq!(joined, "<li>solo</li>");
}

#[test]
fn unknown_template_fails_with_its_name() {
    let dir = TemplateDir::new().write("page", "<p/>");
    let state = EngineState::try_load_default(dir.path()).unwrap();
    let item = Item::new("a", String::new());

    let err = state
        .try_apply("missing", &mock::item_context(), &item)
        .unwrap_err();
    assert!(matches!(err, Error::TemplateNotFound { .. }));
    assert!(err.to_string().contains("missing"));
}

#[test]
fn templates_are_named_by_their_relative_path() {
    let dir = TemplateDir::new().write("posts/entry", "<hakyll field=\"body\"/>");
    let state = EngineState::try_load_default(dir.path()).unwrap();
    let ctx = Contexts::new().with(context::body_field("body"));
    let item = Item::new("a", "hello".to_owned());

    let rendered = state.try_apply("posts/entry", &ctx, &item).unwrap();
    assert_eq!(rendered.body(), "hello");
}

#[test]
fn static_markup_passes_through_unchanged() {
    let dir = TemplateDir::new().write("page", "<!-- keep --><p class=\"x\">hi</p>");
    let state = EngineState::try_load_default(dir.path()).unwrap();
    let item = Item::new("a", String::new());

    let rendered = state
        .try_apply("page", &mock::item_context(), &item)
        .unwrap();
    assert_eq!(rendered.body(), "<!-- keep --><p class=\"x\">hi</p>");
}

#[test]
fn invalid_template_fails_the_whole_load() {
    let dir = TemplateDir::new()
        .write("good", "<p>fine</p>")
        .write("bad", "<a href=\"oops><p/>")
        .write("worse", "<b class='nope><p/>");
    let Err(err) = EngineState::<String>::try_load_default(dir.path()) else {
        panic!("expected the load to fail");
    };

    let Error::TemplateLoad { failures } = err else {
        panic!("expected a load failure");
    };
    assert_eq!(failures.len(), 2);
}

#[test]
#[should_panic(expected = "failed to load templates")]
fn fatal_load_aborts_on_a_malformed_template() {
    let dir = TemplateDir::new().write("bad", "<a href=\"oops><p/>");
    let _ = EngineState::<String>::load_default(dir.path());
}

#[test]
fn missing_template_directory_is_reported() {
    let dir = TemplateDir::new();
    let missing = dir.path().join("nowhere");
    let Err(err) = EngineState::<String>::try_load_default(&missing) else {
        panic!("expected the load to fail");
    };
    assert!(matches!(err, Error::NotFound { .. }));
}

fn shout_splice(_: &Element, _: &RenderScope<'_, String>) -> quill_lib::error::Result<Vec<Node>> {
    Ok(vec![Node::Text("OVERRIDDEN".to_owned())])
}

#[test]
fn caller_splices_extend_and_override_the_builtins() {
    let dir = TemplateDir::new()
        .write("page", "<hakyll field=\"title\"/>")
        .write("extra", "<shout/>");
    let splices: Vec<(String, ValueSplice<String>)> = vec![
        ("hakyll".to_owned(), Box::new(shout_splice)),
        ("shout".to_owned(), Box::new(shout_splice)),
    ];
    let state = EngineState::try_load(dir.path(), splices, Vec::new()).unwrap();
    let item = Item::new("a", String::new());

    // The caller's registration replaces the built-in field splice.
    let page = state
        .try_apply("page", &mock::item_context(), &item)
        .unwrap();
    assert_eq!(page.body(), "OVERRIDDEN");

    let extra = state
        .try_apply("extra", &mock::item_context(), &item)
        .unwrap();
    assert_eq!(extra.body(), "OVERRIDDEN");
}

proptest! {
    #[test]
    fn concatenation_equals_empty_join(items in mock::items(6)) {
        let dir = TemplateDir::new().write("entry", "<li><hakyll field=\"body\"/></li>");
        let state = EngineState::try_load_default(dir.path()).unwrap();
        let ctx = Contexts::new().with(context::body_field("body"));

        let all = state.try_apply_all("entry", &ctx, &items).unwrap();
        let joined = state.try_apply_joined("", "entry", &ctx, &items).unwrap();
        prop_assert_eq!(all, joined);
    }

    #[test]
    fn join_places_the_delimiter_between_consecutive_outputs(
        items in mock::items(6),
        delimiter in mock::delimiter(),
    ) {
        let dir = TemplateDir::new().write("entry", "<li><hakyll field=\"body\"/></li>");
        let state = EngineState::try_load_default(dir.path()).unwrap();
        let ctx = Contexts::new().with(context::body_field("body"));

        let joined = state.try_apply_joined(&delimiter, "entry", &ctx, &items).unwrap();
        let expected = items
            .iter()
            .map(|item| format!("<li>{}</li>", item.body()))
            .collect::<Vec<_>>()
            .join(&delimiter);
        prop_assert_eq!(joined, expected);
    }
}
