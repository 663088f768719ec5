//! HTML import through `scraper`.
//!
//! Markup is parsed with html5ever (via `scraper`) and copied into the
//! document arena. Comments, doctypes and processing instructions are
//! dropped; form controls get their initial value from markup.

use ego_tree::NodeRef;
use scraper::{Html, Node};

use crate::{Document, NodeId};

pub(crate) fn parse_document(html: &str) -> Document {
    let parsed = Html::parse_document(html);
    let mut doc = Document::new();
    let root = doc.root();
    for child in parsed.tree.root().children() {
        if let Some(id) = import_node(&mut doc, child) {
            doc.attach_silently(root, id);
        }
    }
    doc
}

/// Import the top-level nodes of a fragment as detached subtrees.
pub(crate) fn import_fragment(doc: &mut Document, html: &str) -> Vec<NodeId> {
    let parsed = Html::parse_fragment(html);
    let mut out = Vec::new();
    for child in parsed.tree.root().children() {
        // Fragments are parsed under a synthetic <html> element.
        let is_wrapper = matches!(child.value(), Node::Element(el) if el.name() == "html");
        if is_wrapper {
            out.extend(child.children().filter_map(|c| import_node(doc, c)));
        } else if let Some(id) = import_node(doc, child) {
            out.push(id);
        }
    }
    out
}

fn import_node(doc: &mut Document, node: NodeRef<'_, Node>) -> Option<NodeId> {
    match node.value() {
        Node::Element(el) => {
            let id = doc.create_element(el.name());
            let data = doc.element_data_mut(id)?;
            for (name, value) in el.attrs() {
                data.set_attr(name, value);
            }
            if data.tag() == "input" {
                data.value = Some(el.attr("value").unwrap_or_default().to_string());
            }
            for child in node.children() {
                if let Some(child_id) = import_node(doc, child) {
                    doc.attach_silently(id, child_id);
                }
            }
            if doc.tag_name(id) == Some("textarea") {
                let initial = doc.text_content(id).unwrap_or_default();
                doc.element_data_mut(id)?.value = Some(initial);
            }
            Some(id)
        }
        Node::Text(text) => Some(doc.create_text(&text.text)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use crate::{Document, Selector};

    #[test]
    fn imports_attributes_and_text() {
        let doc = Document::parse_html(
            r#"<div data-testid="card" class="x y">שלום <b>עולם</b></div>"#,
        );
        let card = doc
            .query_selector(doc.root(), &Selector::parse(".y").unwrap())
            .unwrap();
        assert_eq!(doc.attribute(card, "data-testid"), Some("card"));
        assert_eq!(doc.text_content(card).as_deref(), Some("שלום עולם"));
    }

    #[test]
    fn form_controls_take_initial_value() {
        let doc = Document::parse_html(
            r#"<input id="a" value="hello"><textarea id="b">text</textarea><input id="c">"#,
        );
        let value_of = |s: &str| {
            let id = doc
                .query_selector(doc.root(), &Selector::parse(s).unwrap())
                .unwrap();
            doc.value(id).map(str::to_string)
        };
        assert_eq!(value_of("#a").as_deref(), Some("hello"));
        assert_eq!(value_of("#b").as_deref(), Some("text"));
        assert_eq!(value_of("#c").as_deref(), Some(""));
    }

    #[test]
    fn fragment_import_strips_wrapper() {
        let mut doc = Document::new();
        let root = doc.root();
        let added = doc.append_html(root, "<p>a</p><p>b</p>").unwrap();
        assert_eq!(added.len(), 2);
        assert!(added.iter().all(|id| doc.tag_name(*id) == Some("p")));
    }
}
