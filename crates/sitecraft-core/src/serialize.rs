use crate::{Document, NodeId, NodeKind};

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style"];

pub fn is_void_element(tag: &str) -> bool {
    VOID_ELEMENTS.contains(&tag)
}

/// Elements whose text children are emitted without entity escaping.
pub fn is_raw_text_element(tag: &str) -> bool {
    RAW_TEXT_ELEMENTS.contains(&tag)
}

pub fn escape_text(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(ch),
        }
    }
    out
}

pub fn escape_attribute(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Rewrites every `</tag` (any case) inside raw text as `<\/tag` so the
/// content can never close its own element early.
fn neutralize_closing_tag(content: &str, tag: &str) -> String {
    let needle = format!("</{tag}");
    let lower = content.to_ascii_lowercase();
    let mut out = String::with_capacity(content.len());
    let mut cursor = 0usize;

    while let Some(rel) = lower[cursor..].find(&needle) {
        let start = cursor + rel;
        out.push_str(&content[cursor..start]);
        out.push_str("<\\/");
        out.push_str(&content[start + 2..start + needle.len()]);
        cursor = start + needle.len();
    }
    out.push_str(&content[cursor..]);
    out
}

pub fn serialize_node(doc: &Document, id: NodeId) -> String {
    let mut out = String::new();
    write_node(doc, id, None, &mut out);
    out
}

/// Serializes `root` (normally the `<html>` element) behind an HTML5
/// doctype.
pub fn serialize_document(doc: &Document, root: NodeId) -> String {
    let mut out = String::from("<!DOCTYPE html>\n");
    write_node(doc, root, None, &mut out);
    tracing::debug!("[sitecraft:dom] serialized document ({} bytes)", out.len());
    out
}

fn write_node(doc: &Document, id: NodeId, raw_parent: Option<&str>, out: &mut String) {
    let Ok(kind) = doc.kind(id) else {
        return;
    };

    match kind {
        NodeKind::Text(content) => match raw_parent {
            Some(tag) => out.push_str(&neutralize_closing_tag(content, tag)),
            None => out.push_str(&escape_text(content)),
        },
        NodeKind::Element(el) => {
            out.push('<');
            out.push_str(&el.tag);
            for (name, value) in &el.attrs {
                push_attribute(out, name, value);
            }
            if !el.classes.is_empty() {
                push_attribute(out, "class", &el.classes.join(" "));
            }
            if !el.style.is_empty() {
                let inline = el
                    .style
                    .iter()
                    .map(|(prop, value)| format!("{prop}: {value}"))
                    .collect::<Vec<_>>()
                    .join("; ");
                push_attribute(out, "style", &inline);
            }
            out.push('>');

            if is_void_element(&el.tag) {
                return;
            }

            let raw = is_raw_text_element(&el.tag).then_some(el.tag.as_str());
            for child in doc.children(id) {
                write_node(doc, *child, raw, out);
            }

            out.push_str("</");
            out.push_str(&el.tag);
            out.push('>');
        }
    }
}

fn push_attribute(out: &mut String, name: &str, value: &str) {
    out.push(' ');
    out.push_str(name);
    out.push_str("=\"");
    out.push_str(&escape_attribute(value));
    out.push('"');
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_is_escaped() {
        let mut doc = Document::new();
        let p = doc.create_element("p").unwrap();
        doc.set_text_content(p, "<script>alert(1)</script>").unwrap();

        let html = serialize_node(&doc, p);
        assert_eq!(html, "<p>&lt;script&gt;alert(1)&lt;/script&gt;</p>");
    }

    #[test]
    fn test_attributes_then_class_then_style() {
        let mut doc = Document::new();
        let a = doc.create_element("a").unwrap();
        doc.set_attribute(a, "href", "/x?a=1&b=\"2\"").unwrap();
        doc.add_class(a, "link primary").unwrap();
        doc.set_style(a, "color", "red").unwrap();
        doc.set_style(a, "font-weight", "700").unwrap();

        let html = serialize_node(&doc, a);
        assert_eq!(
            html,
            "<a href=\"/x?a=1&amp;b=&quot;2&quot;\" class=\"link primary\" style=\"color: red; font-weight: 700\"></a>"
        );
    }

    #[test]
    fn test_void_elements_have_no_close_tag() {
        let mut doc = Document::new();
        let meta = doc.create_element("meta").unwrap();
        doc.set_attribute(meta, "charset", "utf-8").unwrap();
        assert_eq!(serialize_node(&doc, meta), "<meta charset=\"utf-8\">");
    }

    #[test]
    fn test_script_content_is_raw_but_cannot_close_early() {
        let mut doc = Document::new();
        let script = doc.create_element("script").unwrap();
        doc.set_text_content(script, "if (a < b && c) { s = '</SCRIPT><b>'; }")
            .unwrap();

        let html = serialize_node(&doc, script);
        assert_eq!(
            html,
            "<script>if (a < b && c) { s = '<\\/SCRIPT><b>'; }</script>"
        );
    }

    #[test]
    fn test_document_has_doctype() {
        let mut doc = Document::new();
        let html = doc.create_element("html").unwrap();
        let body = doc.create_element("body").unwrap();
        doc.append_child(html, body).unwrap();

        let out = serialize_document(&doc, html);
        assert_eq!(out, "<!DOCTYPE html>\n<html><body></body></html>");
    }
}
