//! Host mutation feed model.
//!
//! The host (a browser bridge, a headless driver, a replay file) delivers
//! batches of change records. Element nodes arrive as self-contained
//! snapshots: enough structure to build a selector and a snippet without
//! reaching back into a live document.

use serde::{Deserialize, Serialize};

/// One batch, delivered as a single callback by the host.
pub type MutationBatch = Vec<MutationRecord>;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum MutationRecord {
    ChildList {
        #[serde(default, rename = "addedNodes")]
        added: Vec<Node>,
        #[serde(default, rename = "removedNodes")]
        removed: Vec<Node>,
    },
    Attributes {
        target: Node,
        #[serde(rename = "attributeName")]
        name: String,
        #[serde(default, rename = "oldValue")]
        old_value: Option<String>,
        /// Current value on the target (None when the attribute was removed)
        #[serde(default, rename = "newValue")]
        new_value: Option<String>,
    },
    CharacterData {
        /// Element owning the text node, if still attached
        #[serde(default)]
        parent: Option<ElementNode>,
        #[serde(default, rename = "oldValue")]
        old_value: Option<String>,
        #[serde(default)]
        data: String,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Node {
    Element(ElementNode),
    Text {
        #[serde(default)]
        data: String,
    },
    Other,
}

impl Node {
    pub fn as_element(&self) -> Option<&ElementNode> {
        match self {
            Node::Element(el) => Some(el),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Attribute {
    pub name: String,
    pub value: String,
}

/// One step up the parent chain.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AncestorRef {
    pub tag: String,
    pub id: Option<String>,
    pub classes: Vec<String>,
    pub nth_of_type: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ElementNode {
    pub tag: String,
    pub id: Option<String>,
    pub classes: Vec<String>,
    /// In document order
    pub attributes: Vec<Attribute>,
    pub outer_html: String,
    pub text_content: String,
    pub content_editable: bool,
    /// 1-based position among same-tag siblings; only set when the parent
    /// has more than one child with this tag
    pub nth_of_type: Option<u32>,
    /// Nearest parent first
    pub ancestors: Vec<AncestorRef>,
    /// Flattened subtree in document order
    pub descendants: Vec<ElementNode>,
}

impl ElementNode {
    pub fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_ascii_lowercase(),
            ..Default::default()
        }
    }

    pub fn tag_name(&self) -> String {
        self.tag.to_ascii_lowercase()
    }

    pub fn is(&self, tag: &str) -> bool {
        self.tag.eq_ignore_ascii_case(tag)
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.name.eq_ignore_ascii_case(name))
            .map(|a| a.value.as_str())
    }

    pub fn has_attr(&self, name: &str) -> bool {
        self.attr(name).is_some()
    }

    /// Attribute value or empty string.
    pub fn attr_or_empty(&self, name: &str) -> String {
        self.attr(name).unwrap_or_default().to_string()
    }

    pub fn attribute_names(&self) -> impl Iterator<Item = String> + '_ {
        self.attributes.iter().map(|a| a.name.to_ascii_lowercase())
    }

    pub fn with_attr(mut self, name: &str, value: &str) -> Self {
        self.attributes.push(Attribute {
            name: name.to_string(),
            value: value.to_string(),
        });
        self
    }

    pub fn with_id(mut self, id: &str) -> Self {
        self.id = Some(id.to_string());
        self
    }

    pub fn with_classes(mut self, classes: &[&str]) -> Self {
        self.classes = classes.iter().map(|c| c.to_string()).collect();
        self
    }

    pub fn with_text(mut self, text: &str) -> Self {
        self.text_content = text.to_string();
        self
    }

    pub fn with_html(mut self, html: &str) -> Self {
        self.outer_html = html.to_string();
        self
    }

    pub fn with_ancestor(mut self, ancestor: AncestorRef) -> Self {
        self.ancestors.push(ancestor);
        self
    }

    pub fn with_descendant(mut self, child: ElementNode) -> Self {
        self.descendants.push(child);
        self
    }

    pub fn into_node(self) -> Node {
        Node::Element(self)
    }
}

impl AncestorRef {
    pub fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_ascii_lowercase(),
            ..Default::default()
        }
    }

    pub fn with_id(mut self, id: &str) -> Self {
        self.id = Some(id.to_string());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_batch_from_host_json() {
        let batch: MutationBatch = serde_json::from_value(json!([
            {
                "type": "childList",
                "addedNodes": [
                    {"kind": "element", "tag": "script", "attributes": [{"name": "src", "value": "x.js"}]},
                    {"kind": "text", "data": "hello"}
                ]
            },
            {
                "type": "attributes",
                "target": {"kind": "element", "tag": "a"},
                "attributeName": "href",
                "oldValue": "/a",
                "newValue": "/b"
            },
            {
                "type": "characterData",
                "parent": {"tag": "style"},
                "oldValue": "a{}",
                "data": "b{}"
            }
        ]))
        .unwrap();

        assert_eq!(batch.len(), 3);
        match &batch[0] {
            MutationRecord::ChildList { added, removed } => {
                assert_eq!(added.len(), 2);
                assert!(removed.is_empty());
                assert_eq!(added[0].as_element().unwrap().attr("SRC"), Some("x.js"));
                assert!(added[1].as_element().is_none());
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_attribute_lookup_is_case_insensitive() {
        let el = ElementNode::new("IMG").with_attr("Data-Src", "a.png");
        assert!(el.is("img"));
        assert_eq!(el.attr("data-src"), Some("a.png"));
        assert_eq!(el.attr_or_empty("src"), "");
    }
}
