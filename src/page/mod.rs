mod html;

use std::collections::HashMap;

pub use html::HtmlPage;

/// The element surface the renderer writes into. Every mutator returns
/// `false` when no element carries `id`, which callers treat as a skip.
pub trait Page {
    fn has_element(&self, id: &str) -> bool;
    fn set_text(&mut self, id: &str, text: &str) -> bool;
    fn set_html(&mut self, id: &str, html: &str) -> bool;
    fn add_class(&mut self, id: &str, class: &str) -> bool;
    fn remove_class(&mut self, id: &str, class: &str) -> bool;
    fn has_class(&self, id: &str, class: &str) -> bool;
}

/// Hook run once after a render pass, for pages that draw icon placeholders.
pub trait IconRenderer {
    fn refresh(&mut self);
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Element {
    pub content: String,
    pub classes: Vec<String>,
}

/// A page made of bare elements keyed by id.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MemoryPage {
    elements: HashMap<String, Element>,
    writes: usize,
}

impl MemoryPage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_elements<'a>(ids: impl IntoIterator<Item = &'a str>) -> Self {
        let mut page = Self::new();
        for id in ids {
            page.insert(id);
        }
        page
    }

    pub fn insert(&mut self, id: &str) -> &mut Element {
        self.elements.entry(id.to_string()).or_default()
    }

    pub fn content(&self, id: &str) -> Option<&str> {
        self.elements.get(id).map(|e| e.content.as_str())
    }

    pub fn element(&self, id: &str) -> Option<&Element> {
        self.elements.get(id)
    }

    /// Number of content writes performed, for asserting skipped renders.
    pub fn writes(&self) -> usize {
        self.writes
    }
}

impl Page for MemoryPage {
    fn has_element(&self, id: &str) -> bool {
        self.elements.contains_key(id)
    }

    fn set_text(&mut self, id: &str, text: &str) -> bool {
        self.set_html(id, &crate::format::escape_html(text))
    }

    fn set_html(&mut self, id: &str, html: &str) -> bool {
        match self.elements.get_mut(id) {
            Some(el) => {
                el.content = html.to_string();
                self.writes += 1;
                true
            }
            None => false,
        }
    }

    fn add_class(&mut self, id: &str, class: &str) -> bool {
        match self.elements.get_mut(id) {
            Some(el) => {
                if !el.classes.iter().any(|c| c == class) {
                    el.classes.push(class.to_string());
                }
                true
            }
            None => false,
        }
    }

    fn remove_class(&mut self, id: &str, class: &str) -> bool {
        match self.elements.get_mut(id) {
            Some(el) => {
                el.classes.retain(|c| c != class);
                true
            }
            None => false,
        }
    }

    fn has_class(&self, id: &str, class: &str) -> bool {
        self.elements
            .get(id)
            .map(|el| el.classes.iter().any(|c| c == class))
            .unwrap_or(false)
    }
}
