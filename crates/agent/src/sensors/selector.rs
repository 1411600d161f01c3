// agent/sensors/selector.rs
// Short CSS selectors for captured elements: id shortcut, else up to
// three levels of tag.class:nth-of-type, anchored at the first ancestor id.

use crate::dom::{AncestorRef, ElementNode};

const MAX_DEPTH: usize = 3;
const MAX_CLASSES: usize = 2;

/// Backslash-escape everything outside `[A-Za-z0-9_-]`.
pub fn css_escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if !(c.is_ascii_alphanumeric() || c == '_' || c == '-') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

struct Segment<'a> {
    tag: &'a str,
    id: Option<&'a str>,
    classes: &'a [String],
    nth_of_type: Option<u32>,
}

impl<'a> Segment<'a> {
    fn of_element(el: &'a ElementNode) -> Self {
        Self {
            tag: &el.tag,
            id: el.id.as_deref(),
            classes: &el.classes,
            nth_of_type: el.nth_of_type,
        }
    }

    fn of_ancestor(a: &'a AncestorRef) -> Self {
        Self {
            tag: &a.tag,
            id: a.id.as_deref(),
            classes: &a.classes,
            nth_of_type: a.nth_of_type,
        }
    }

    fn id(&self) -> Option<&'a str> {
        self.id.filter(|id| !id.is_empty())
    }

    fn render(&self) -> String {
        let mut part = self.tag.to_ascii_lowercase();
        let classes: Vec<String> = self
            .classes
            .iter()
            .filter(|c| !c.is_empty())
            .take(MAX_CLASSES)
            .map(|c| css_escape(c))
            .collect();
        if !classes.is_empty() {
            part.push('.');
            part.push_str(&classes.join("."));
        }
        if let Some(n) = self.nth_of_type {
            part.push_str(&format!(":nth-of-type({})", n));
        }
        part
    }
}

pub fn selector_for(el: &ElementNode) -> String {
    if let Some(id) = el.id.as_deref().filter(|id| !id.is_empty()) {
        return format!("#{}", css_escape(id));
    }

    let chain: Vec<Segment<'_>> = std::iter::once(Segment::of_element(el))
        .chain(el.ancestors.iter().map(Segment::of_ancestor))
        .collect();

    let mut parts: Vec<String> = Vec::new();
    for depth in 0..MAX_DEPTH {
        let Some(current) = chain.get(depth) else {
            break;
        };
        parts.push(current.render());
        if let Some(parent_id) = chain.get(depth + 1).and_then(|s| s.id()) {
            parts.push(format!("#{}", css_escape(parent_id)));
            break;
        }
    }

    parts.reverse();
    parts.join(" > ")
}
