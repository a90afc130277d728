//! Text rendering of the task tree for terminal output

use crate::analyzer::TreeNode;

/// Render tree nodes with box-drawing guides
pub fn render(nodes: &[TreeNode]) -> String {
    let mut out = String::new();
    for node in nodes {
        render_node(node, "", true, true, &mut out);
    }
    out
}

fn render_node(node: &TreeNode, prefix: &str, last: bool, root: bool, out: &mut String) {
    if root {
        out.push_str(&node.label);
        out.push('\n');
    } else {
        out.push_str(prefix);
        out.push_str(if last { "└─ " } else { "├─ " });
        out.push_str(&node.label);
        out.push('\n');
    }

    let child_prefix = if root {
        String::new()
    } else {
        format!("{}{}", prefix, if last { "   " } else { "│  " })
    };
    let count = node.children.len();
    for (idx, child) in node.children.iter().enumerate() {
        render_node(child, &child_prefix, idx + 1 == count, false, out);
    }
}
