//! Navigation tree built from discovered descriptors.
use std::fmt::Write as _;

use tabhost_core::PluginDescriptor;
use tabhost_core::kernel::constants::NAVIGATION_ROOT;

#[derive(Debug, Default, PartialEq, Eq)]
pub struct NavNode {
    pub label: String,
    pub children: Vec<NavNode>,
    /// Plugin names attached directly to this node, in priority order
    pub plugins: Vec<String>,
}

impl NavNode {
    fn new(label: &str) -> Self {
        Self {
            label: label.to_string(),
            ..Self::default()
        }
    }

    fn child_mut(&mut self, label: &str) -> &mut NavNode {
        let index = match self.children.iter().position(|c| c.label == label) {
            Some(index) => index,
            None => {
                self.children.push(NavNode::new(label));
                self.children.len() - 1
            }
        };
        &mut self.children[index]
    }
}

/// Build the tree rooted at `Plugins`. Descriptors are attached in the order
/// given, so pass them sorted. A leading `Plugins` segment collapses into the root.
pub fn build_tree(descriptors: &[PluginDescriptor]) -> NavNode {
    let mut root = NavNode::new(NAVIGATION_ROOT);
    for descriptor in descriptors {
        let mut segments = descriptor.placement.path.split('/').filter(|s| !s.is_empty()).peekable();
        if segments.peek() == Some(&NAVIGATION_ROOT) {
            segments.next();
        }
        let mut node = &mut root;
        for segment in segments {
            node = node.child_mut(segment);
        }
        node.plugins.push(descriptor.name().to_string());
    }
    root
}

pub fn render(node: &NavNode) -> String {
    let mut out = String::new();
    render_into(node, 0, &mut out);
    out
}

fn render_into(node: &NavNode, depth: usize, out: &mut String) {
    let indent = "  ".repeat(depth);
    let _ = writeln!(out, "{}{}/", indent, node.label);
    for child in &node.children {
        render_into(child, depth + 1, out);
    }
    for plugin in &node.plugins {
        let _ = writeln!(out, "{}  - {}", indent, plugin);
    }
}
