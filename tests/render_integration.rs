//! Integration tests for rendering and in-place updates

use std::cell::RefCell;
use std::rc::Rc;

use live_template::dom::{self, NodeKind};
use live_template::{html, svg, Node, RenderError, Renderer, TemplateResult, Value};
use pretty_assertions::assert_eq;

fn card(title: &str, tags: Vec<&str>) -> TemplateResult {
    html!(
        "<article class=\"card " {title} "\"><h2>" {title} "</h2><ul>"
        {tags.into_iter().map(|tag| html!("<li>" {tag} "</li>")).collect::<Vec<_>>()}
        "</ul></article>"
    )
}

#[test]
fn test_full_render() {
    let container = Node::element("main");
    let mut renderer = Renderer::new();
    renderer
        .render(&card("news", vec!["a", "b"]), &container)
        .unwrap();
    insta::assert_snapshot!(
        container.inner_markup(),
        @r#"<article class="card news"><h2>news</h2><ul><li>a</li><li>b</li></ul></article>"#
    );
}

#[test]
fn test_identical_rerender_performs_no_mutations() {
    let container = Node::element("main");
    let mut renderer = Renderer::new();
    let result = card("same", vec!["x", "y", "z"]);
    renderer.render(&result, &container).unwrap();

    let before = dom::stats();
    renderer.render(&result, &container).unwrap();
    renderer.render(&result.clone(), &container).unwrap();
    assert_eq!(dom::stats(), before);
}

#[test]
fn test_nested_root_identity_survives_updates() {
    fn view(count: i32) -> TemplateResult {
        html!("<div>" {html!("<span>" {count} "</span>")} "</div>")
    }
    let container = Node::element("main");
    let mut renderer = Renderer::new();
    renderer.render(&view(1), &container).unwrap();

    let div = container.children()[0].children()[0].clone();
    let nested = div.children()[1].clone();
    assert_eq!(nested.kind(), NodeKind::Fragment);

    renderer.render(&view(2), &container).unwrap();
    assert!(div.children()[1].ptr_eq(&nested));
    assert_eq!(container.inner_markup(), "<div><span>2</span></div>");
}

#[test]
fn test_changing_nested_template_replaces_instance() {
    fn view(bold: bool) -> TemplateResult {
        let inner = if bold {
            html!("<b>text</b>")
        } else {
            html!("<i>text</i>")
        };
        html!("<p>" {inner} "</p>")
    }
    let container = Node::element("main");
    let mut renderer = Renderer::new();
    renderer.render(&view(true), &container).unwrap();
    renderer.render(&view(false), &container).unwrap();
    assert_eq!(container.inner_markup(), "<p><i>text</i></p>");
    renderer.render(&view(true), &container).unwrap();
    assert_eq!(container.inner_markup(), "<p><b>text</b></p>");
}

#[test]
fn test_nested_lists_flatten() {
    let container = Node::element("p");
    let value = Value::from(vec![
        Value::from(1),
        Value::from(vec![Value::from(2), Value::from(vec![3, 4])]),
        Value::from(5),
    ]);
    Renderer::new()
        .render(&html!("" {value} ""), &container)
        .unwrap();
    assert_eq!(container.inner_markup(), "12345");
}

#[test]
fn test_attribute_template_interpolation() {
    fn view(middle: Value) -> TemplateResult {
        html!("<div class=\"a-" {middle} "-b\"></div>")
    }
    let container = Node::element("main");
    let mut renderer = Renderer::new();
    renderer.render(&view("X".into()), &container).unwrap();
    assert_eq!(container.inner_markup(), "<div class=\"a-X-b\"></div>");
    renderer.render(&view(Value::Null), &container).unwrap();
    assert_eq!(container.inner_markup(), "<div class=\"a--b\"></div>");
}

#[test]
fn test_unquoted_paths_in_attributes() {
    let container = Node::element("main");
    let mut renderer = Renderer::new();
    renderer
        .render(&html!("<a href=/docs/intro>x</a>"), &container)
        .unwrap();
    assert_eq!(container.inner_markup(), "<a href=\"/docs/intro\">x</a>");

    fn profile(id: i32) -> TemplateResult {
        html!("<a href=/u/" {id} ">x</a>")
    }
    renderer.render(&profile(7), &container).unwrap();
    assert_eq!(container.inner_markup(), "<a href=\"/u/7\">x</a>");
    renderer.render(&profile(8), &container).unwrap();
    assert_eq!(container.inner_markup(), "<a href=\"/u/8\">x</a>");
}

#[test]
fn test_shrinking_list_reuses_first_text_node() {
    fn view(items: Vec<&str>) -> TemplateResult {
        html!("<ul>" {items} "</ul>")
    }
    let container = Node::element("main");
    let mut renderer = Renderer::new();
    renderer.render(&view(vec!["a", "b", "c"]), &container).unwrap();

    let ul = container.children()[0].children()[0].clone();
    // Start anchor, three items, end anchor
    assert_eq!(ul.child_count(), 5);
    let first = ul.children()[1].clone();

    let before = dom::stats();
    renderer.render(&view(vec!["z"]), &container).unwrap();
    let after = dom::stats();

    assert_eq!(ul.child_count(), 3);
    assert!(ul.children()[1].ptr_eq(&first));
    assert_eq!(first.data().as_deref(), Some("z"));
    assert_eq!(after.created, before.created);
    // One character-data write and two removals
    assert_eq!(after.mutations - before.mutations, 3);
}

#[test]
fn test_booleans_render_nothing() {
    fn view(flag: bool) -> TemplateResult {
        html!("<p>" {flag} "</p>")
    }
    let container = Node::element("main");
    let mut renderer = Renderer::new();
    renderer.render(&view(false), &container).unwrap();
    assert_eq!(container.inner_markup(), "<p></p>");
    renderer.render(&view(true), &container).unwrap();
    assert_eq!(container.inner_markup(), "<p></p>");
}

#[test]
fn test_caller_nodes_are_placed_as_is() {
    let mine = Node::element("canvas");
    let container = Node::element("main");
    Renderer::new()
        .render(&html!("<figure>" {&mine} "</figure>"), &container)
        .unwrap();
    assert_eq!(container.inner_markup(), "<figure><canvas></canvas></figure>");
    assert_eq!(mine.parent().and_then(|p| p.tag_name()).as_deref(), Some("figure"));
}

#[test]
fn test_text_is_escaped() {
    let container = Node::element("main");
    Renderer::new()
        .render(&html!("<p>" {"<b>&</b>"} "</p>"), &container)
        .unwrap();
    assert_eq!(container.inner_markup(), "<p>&lt;b&gt;&amp;&lt;/b&gt;</p>");
}

#[test]
fn test_svg_template_keeps_attribute_case() {
    fn shape(x: f64) -> TemplateResult {
        svg!("<rect x=\"" {x} "\" pathLength=\"" {10} "\"/>")
    }
    let container = Node::element("svg");
    let mut renderer = Renderer::new();
    renderer.render(&shape(1.5), &container).unwrap();
    assert_eq!(
        container.inner_markup(),
        "<rect x=\"1.5\" pathLength=\"10\"></rect>"
    );
    renderer.render(&shape(-2.0), &container).unwrap();
    assert_eq!(
        container.inner_markup(),
        "<rect x=\"-2\" pathLength=\"10\"></rect>"
    );
}

#[test]
fn test_sync_errors_are_returned_and_retried() {
    use live_template::Deferred;

    fn view(value: Value) -> TemplateResult {
        html!("<p>" {"ok"} "</p><p>" {value} "</p>")
    }
    let container = Node::element("main");
    let mut renderer = Renderer::new();
    renderer.render(&view("first".into()), &container).unwrap();

    let nested = Value::from(vec![Value::from(Deferred::resolved(1))]);
    let error = renderer.render(&view(nested.clone()), &container).unwrap_err();
    assert!(matches!(error, RenderError::Resolve(_)));
    assert_eq!(container.inner_markup(), "<p>ok</p><p>first</p>");

    // The failed value was forgotten, so the same value fails again
    assert!(renderer.render(&view(nested), &container).is_err());
}

#[test]
fn test_error_hook_receives_async_failures() {
    use live_template::Deferred;

    let reported: Rc<RefCell<Vec<String>>> = Rc::new(RefCell::new(Vec::new()));
    let log = Rc::clone(&reported);
    let mut renderer = Renderer::new();
    renderer.on_error(move |error| log.borrow_mut().push(error.to_string()));

    let (deferred, settle) = Deferred::new();
    let container = Node::element("main");
    renderer
        .render(&html!("<p>" {deferred} "</p>"), &container)
        .unwrap();
    settle.resolve(vec![Value::from(Deferred::resolved("x"))]);

    assert_eq!(container.inner_markup(), "<p></p>");
    assert_eq!(
        *reported.borrow(),
        vec!["value cannot be resolved: a future cannot be nested inside a list or emitted by another source"]
    );
}
