use std::ops::Range;
use std::sync::OnceLock;

use regex::Regex;

use super::Page;
use crate::format::escape_html;

const VOID_TAGS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

static CLASS_ATTR: OnceLock<Option<Regex>> = OnceLock::new();
static TAG: OnceLock<Option<Regex>> = OnceLock::new();

fn class_attr_re() -> Option<&'static Regex> {
    CLASS_ATTR
        .get_or_init(|| Regex::new(r#"\sclass\s*=\s*(?:"([^"]*)"|'([^']*)')"#).ok())
        .as_ref()
}

// Opening or closing tag, name in group 2.
fn tag_re() -> Option<&'static Regex> {
    TAG.get_or_init(|| Regex::new(r"<(/?)([A-Za-z][A-Za-z0-9-]*)(?:\s[^>]*)?>").ok())
        .as_ref()
}

/// An HTML document edited in place. Elements are found by their `id`
/// attribute; content between the opening tag and its matching close tag is
/// replaced, and `class` is edited on the opening tag.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HtmlPage {
    html: String,
}

struct ElementSpan {
    open: Range<usize>,
    content: Option<Range<usize>>,
}

impl HtmlPage {
    pub fn new(html: impl Into<String>) -> Self {
        Self { html: html.into() }
    }

    pub fn as_str(&self) -> &str {
        &self.html
    }

    pub fn into_html(self) -> String {
        self.html
    }

    /// Inner content of the element, if it has any.
    pub fn content(&self, id: &str) -> Option<&str> {
        let span = self.locate(id)?;
        span.content.map(|r| &self.html[r])
    }

    fn locate(&self, id: &str) -> Option<ElementSpan> {
        let escaped = regex::escape(id);
        let pattern = format!(
            r#"<([A-Za-z][A-Za-z0-9-]*)(?:\s[^>]*?)?\sid\s*=\s*(?:"{escaped}"|'{escaped}')[^>]*>"#
        );
        let re = Regex::new(&pattern).ok()?;
        let caps = re.captures(&self.html)?;
        let whole = caps.get(0)?;
        let tag = caps.get(1)?.as_str().to_ascii_lowercase();
        let open = whole.range();
        if whole.as_str().ends_with("/>") || VOID_TAGS.contains(&tag.as_str()) {
            return Some(ElementSpan {
                open,
                content: None,
            });
        }
        let start = open.end;
        let close = find_matching_close(&self.html[start..], &tag)? + start;
        Some(ElementSpan {
            open,
            content: Some(start..close),
        })
    }

    fn replace_content(&mut self, id: &str, content: &str) -> bool {
        match self.locate(id) {
            Some(ElementSpan {
                content: Some(range),
                ..
            }) => {
                self.html.replace_range(range, content);
                true
            }
            _ => false,
        }
    }

    fn edit_classes(&mut self, id: &str, edit: impl FnOnce(&mut Vec<String>)) -> bool {
        let Some(span) = self.locate(id) else {
            return false;
        };
        let Some(class_re) = class_attr_re() else {
            return false;
        };
        let open_tag = &self.html[span.open.clone()];
        match class_re.captures(open_tag) {
            Some(caps) => {
                let current = caps.get(1).or_else(|| caps.get(2)).map(|m| m.as_str());
                let mut classes: Vec<String> = current
                    .unwrap_or_default()
                    .split_whitespace()
                    .map(str::to_string)
                    .collect();
                edit(&mut classes);
                let Some(attr) = caps.get(0) else {
                    return false;
                };
                let range = span.open.start + attr.start()..span.open.start + attr.end();
                let replacement = format!(" class=\"{}\"", classes.join(" "));
                self.html.replace_range(range, &replacement);
            }
            None => {
                let mut classes = Vec::new();
                edit(&mut classes);
                if classes.is_empty() {
                    return true;
                }
                let tail = if open_tag.ends_with("/>") { 2 } else { 1 };
                let at = span.open.end - tail;
                self.html
                    .insert_str(at, &format!(" class=\"{}\"", classes.join(" ")));
            }
        }
        true
    }

    fn classes(&self, id: &str) -> Option<Vec<String>> {
        let span = self.locate(id)?;
        let class_re = class_attr_re()?;
        let open_tag = &self.html[span.open];
        let classes = class_re
            .captures(open_tag)
            .and_then(|caps| caps.get(1).or_else(|| caps.get(2)))
            .map(|m| m.as_str().split_whitespace().map(str::to_string).collect())
            .unwrap_or_default();
        Some(classes)
    }
}

// Offset of the close tag balancing an already-open `tag`.
fn find_matching_close(rest: &str, tag: &str) -> Option<usize> {
    let mut depth = 1usize;
    for caps in tag_re()?.captures_iter(rest) {
        let whole = caps.get(0)?;
        if !caps.get(2)?.as_str().eq_ignore_ascii_case(tag) {
            continue;
        }
        let closing = caps.get(1).map(|m| !m.as_str().is_empty()).unwrap_or(false);
        if closing {
            depth -= 1;
            if depth == 0 {
                return Some(whole.start());
            }
        } else if !whole.as_str().ends_with("/>") {
            depth += 1;
        }
    }
    None
}

impl Page for HtmlPage {
    fn has_element(&self, id: &str) -> bool {
        self.locate(id).is_some()
    }

    fn set_text(&mut self, id: &str, text: &str) -> bool {
        self.replace_content(id, &escape_html(text))
    }

    fn set_html(&mut self, id: &str, html: &str) -> bool {
        self.replace_content(id, html)
    }

    fn add_class(&mut self, id: &str, class: &str) -> bool {
        self.edit_classes(id, |classes| {
            if !classes.iter().any(|c| c == class) {
                classes.push(class.to_string());
            }
        })
    }

    fn remove_class(&mut self, id: &str, class: &str) -> bool {
        self.edit_classes(id, |classes| classes.retain(|c| c != class))
    }

    fn has_class(&self, id: &str, class: &str) -> bool {
        self.classes(id)
            .map(|classes| classes.iter().any(|c| c == class))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replaces_content_of_nested_element() {
        let mut page = HtmlPage::new(
            r#"<div id="card"><div class="inner"><span id="val-lucro">--</span></div><div>x</div></div>"#,
        );
        assert!(page.set_text("card", "A & B"));
        assert_eq!(page.as_str(), r#"<div id="card">A &amp; B</div>"#);
    }

    #[test]
    fn skips_missing_and_data_attributes() {
        let mut page = HtmlPage::new(r#"<p data-id="val-lucro">0</p>"#);
        assert!(!page.has_element("val-lucro"));
        assert!(!page.set_text("val-lucro", "R$ 1"));
        assert_eq!(page.as_str(), r#"<p data-id="val-lucro">0</p>"#);
    }

    #[test]
    fn edits_class_attribute() {
        let mut page = HtmlPage::new(r#"<h2 class="kpi big" id='val-deducoes'>0</h2><b id="x">1</b>"#);
        assert!(page.add_class("val-deducoes", "text-negative"));
        assert!(page.has_class("val-deducoes", "text-negative"));
        assert!(page.as_str().contains(r#"class="kpi big text-negative""#));
        assert!(page.remove_class("val-deducoes", "kpi"));
        assert!(page.as_str().contains(r#"class="big text-negative""#));

        assert!(page.add_class("x", "text-negative"));
        assert!(page.as_str().contains(r#"<b id="x" class="text-negative">1</b>"#));
        assert!(page.remove_class("x", "missing"));
    }

    #[test]
    fn close_tag_matching_ignores_prefixed_names_and_case() {
        assert!(class_attr_re().is_some());
        assert!(tag_re().is_some());

        let mut page = HtmlPage::new(r#"<B id="x"><br><b>y</b><bdi>z</bdi></B><b>after</b>"#);
        assert_eq!(page.content("x"), Some("<br><b>y</b><bdi>z</bdi>"));
        assert!(page.set_text("x", "1"));
        assert_eq!(page.as_str(), r#"<B id="x">1</B><b>after</b>"#);
    }

    #[test]
    fn void_elements_have_no_content() {
        let mut page = HtmlPage::new(r#"<input id="val-receita" value="0"/><span id="y"></span>"#);
        assert!(page.has_element("val-receita"));
        assert!(!page.set_text("val-receita", "R$ 1"));
        assert!(page.set_text("y", "ok"));
        assert_eq!(page.content("y"), Some("ok"));
    }
}
