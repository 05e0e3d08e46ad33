//! Newick tree parsing and the per-node geometry the figures are drawn from.

use crate::error::{Error, Result};
use log::debug;
use std::path::Path;

/// Length given to the branch above the original root by [`Tree::add_root_stub`].
pub const ROOT_STUB_LENGTH: f64 = 0.000015;

/// A node in the tree arena
#[derive(Debug, Clone, Default)]
pub struct Node {
    pub name: Option<String>,
    pub length: f64,
    pub parent: Option<usize>,
    pub children: Vec<usize>,
    /// Distance from the root
    pub height: f64,
    /// Vertical position: leaf index, or the mean of the children for internal nodes
    pub y: f64,
}

impl Node {
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    pub fn name(&self) -> &str {
        self.name.as_deref().unwrap_or("")
    }
}

#[derive(Debug, Clone)]
pub struct Tree {
    nodes: Vec<Node>,
    root: usize,
}

impl Tree {
    pub fn root(&self) -> usize {
        self.root
    }

    pub fn node(&self, id: usize) -> &Node {
        &self.nodes[id]
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Node ids in preorder, children visited in file order.
    pub fn preorder(&self) -> Vec<usize> {
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut stack = vec![self.root];
        while let Some(id) = stack.pop() {
            order.push(id);
            stack.extend(self.nodes[id].children.iter().rev());
        }
        order
    }

    /// Leaf ids, top to bottom as they appear in the file.
    pub fn tips(&self) -> Vec<usize> {
        self.preorder()
            .into_iter()
            .filter(|&id| self.nodes[id].is_leaf())
            .collect()
    }

    pub fn tip_count(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_leaf()).count()
    }

    /// Greatest root-to-tip distance.
    pub fn tree_height(&self) -> f64 {
        self.nodes
            .iter()
            .filter(|n| n.is_leaf())
            .map(|n| n.height)
            .fold(0.0, f64::max)
    }

    /// Put a new root above the current one so the tree is drawn with a short stem.
    pub fn add_root_stub(&mut self, length: f64) {
        let old_root = self.root;
        let new_root = self.nodes.len();
        self.nodes.push(Node {
            children: vec![old_root],
            ..Node::default()
        });
        self.nodes[old_root].parent = Some(new_root);
        self.nodes[old_root].length = length;
        self.root = new_root;
        self.compute_heights();
        self.assign_y();
    }

    fn compute_heights(&mut self) {
        for id in self.preorder() {
            self.nodes[id].height = match self.nodes[id].parent {
                Some(p) => self.nodes[p].height + self.nodes[id].length,
                None => 0.0,
            };
        }
    }

    fn assign_y(&mut self) {
        let order = self.preorder();
        let mut leaf_index = 0.0;
        for &id in &order {
            if self.nodes[id].is_leaf() {
                self.nodes[id].y = leaf_index;
                leaf_index += 1.0;
            }
        }
        for &id in order.iter().rev() {
            let node = &self.nodes[id];
            if !node.is_leaf() {
                let sum: f64 = node.children.iter().map(|&c| self.nodes[c].y).sum();
                self.nodes[id].y = sum / node.children.len() as f64;
            }
        }
    }
}

struct Parser<'a> {
    text: &'a [u8],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn error(&self, message: impl Into<String>) -> Error {
        Error::Newick {
            offset: self.pos,
            message: message.into(),
        }
    }

    fn peek(&self) -> Option<u8> {
        self.text.get(self.pos).copied()
    }

    /// Skip whitespace and `[...]` comments.
    fn skip_blank(&mut self) -> Result<()> {
        while let Some(c) = self.peek() {
            if c.is_ascii_whitespace() {
                self.pos += 1;
            } else if c == b'[' {
                match self.text[self.pos..].iter().position(|&b| b == b']') {
                    Some(end) => self.pos += end + 1,
                    None => return Err(self.error("unterminated comment")),
                }
            } else {
                break;
            }
        }
        Ok(())
    }

    fn label(&mut self) -> Result<Option<String>> {
        self.skip_blank()?;
        match self.peek() {
            Some(b'\'') => {
                self.pos += 1;
                let mut bytes = Vec::new();
                loop {
                    match self.peek() {
                        None => return Err(self.error("unterminated quoted label")),
                        Some(b'\'') if self.text.get(self.pos + 1) == Some(&b'\'') => {
                            bytes.push(b'\'');
                            self.pos += 2;
                        }
                        Some(b'\'') => {
                            self.pos += 1;
                            break;
                        }
                        Some(c) => {
                            bytes.push(c);
                            self.pos += 1;
                        }
                    }
                }
                Ok(Some(String::from_utf8_lossy(&bytes).into_owned()))
            }
            _ => {
                let start = self.pos;
                while let Some(c) = self.peek() {
                    if c.is_ascii_whitespace() || b"()[]',:;".contains(&c) {
                        break;
                    }
                    self.pos += 1;
                }
                if self.pos == start {
                    Ok(None)
                } else {
                    Ok(Some(
                        String::from_utf8_lossy(&self.text[start..self.pos]).into_owned(),
                    ))
                }
            }
        }
    }

    fn length(&mut self) -> Result<f64> {
        self.skip_blank()?;
        if self.peek() != Some(b':') {
            return Ok(0.0);
        }
        self.pos += 1;
        self.skip_blank()?;
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() || b"+-.eE".contains(&c) {
                self.pos += 1;
            } else {
                break;
            }
        }
        let token = std::str::from_utf8(&self.text[start..self.pos]).unwrap_or("");
        token.parse::<f64>().map_err(|_| Error::Newick {
            offset: start,
            message: format!("invalid branch length {:?}", token),
        })
    }
}

/// Parse a single Newick tree.
pub fn parse(text: &str) -> Result<Tree> {
    let mut parser = Parser {
        text: text.as_bytes(),
        pos: 0,
    };
    let mut nodes: Vec<Node> = Vec::new();
    let mut root: Option<usize> = None;
    let mut open: Vec<usize> = Vec::new();
    let mut expect_child = true;

    // Creates a node under the innermost open clade, or as the root
    let mut new_node = |nodes: &mut Vec<Node>, open: &Vec<usize>, at: usize| -> Result<usize> {
        let id = nodes.len();
        match open.last() {
            Some(&parent) => {
                nodes.push(Node {
                    parent: Some(parent),
                    ..Node::default()
                });
                nodes[parent].children.push(id);
            }
            None if root.is_none() => {
                nodes.push(Node::default());
                root = Some(id);
            }
            None => {
                return Err(Error::Newick {
                    offset: at,
                    message: "more than one top-level clade".to_string(),
                })
            }
        }
        Ok(id)
    };

    loop {
        parser.skip_blank()?;
        let at = parser.pos;
        match parser.peek() {
            Some(b'(') => {
                if !expect_child {
                    return Err(parser.error("unexpected '('"));
                }
                parser.pos += 1;
                let id = new_node(&mut nodes, &open, at)?;
                open.push(id);
                expect_child = true;
            }
            Some(b',') => {
                if open.is_empty() {
                    return Err(parser.error("',' outside of a clade"));
                }
                if expect_child {
                    new_node(&mut nodes, &open, at)?;
                }
                parser.pos += 1;
                expect_child = true;
            }
            Some(b')') => {
                if expect_child {
                    new_node(&mut nodes, &open, at)?;
                }
                let id = open.pop().ok_or_else(|| parser.error("unbalanced ')'"))?;
                parser.pos += 1;
                nodes[id].name = parser.label()?;
                nodes[id].length = parser.length()?;
                expect_child = false;
            }
            Some(b';') | None => {
                if !open.is_empty() {
                    return Err(parser.error("unbalanced '('"));
                }
                if parser.peek().is_some() {
                    parser.pos += 1;
                    parser.skip_blank()?;
                    if parser.peek().is_some() {
                        return Err(parser.error("trailing text after ';'"));
                    }
                }
                break;
            }
            Some(_) => {
                if !expect_child {
                    return Err(parser.error("unexpected label"));
                }
                let id = new_node(&mut nodes, &open, at)?;
                nodes[id].name = parser.label()?;
                nodes[id].length = parser.length()?;
                expect_child = false;
            }
        }
    }

    let root = root.ok_or_else(|| Error::Newick {
        offset: 0,
        message: "empty tree".to_string(),
    })?;
    let mut tree = Tree { nodes, root };
    tree.compute_heights();
    tree.assign_y();
    Ok(tree)
}

/// Read and parse a tree file.
pub fn load(path: &Path) -> Result<Tree> {
    let text = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
    let tree = parse(&text).map_err(|e| Error::TreeFile {
        path: path.to_path_buf(),
        source: Box::new(e),
    })?;
    debug!(
        "Loaded {:?}: {} nodes, {} tips, height {:.6}",
        path,
        tree.len(),
        tree.tip_count(),
        tree.tree_height()
    );
    Ok(tree)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tip_names(tree: &Tree) -> Vec<&str> {
        tree.tips().iter().map(|&id| tree.node(id).name()).collect()
    }

    #[test]
    fn parses_lengths_and_labels() {
        let tree = parse("((A:0.1,B:0.2)90:0.05,'C d':0.3);").unwrap();
        assert_eq!(tip_names(&tree), vec!["A", "B", "C d"]);
        assert_eq!(tree.tip_count(), 3);
        let ab = tree.node(tree.root()).children[0];
        assert_eq!(tree.node(ab).name(), "90");
        assert!((tree.tree_height() - 0.3).abs() < 1e-12);
    }

    #[test]
    fn heights_accumulate_from_root() {
        let tree = parse("((A:1,B:2):3,C:1);").unwrap();
        let heights: Vec<f64> = tree.tips().iter().map(|&id| tree.node(id).height).collect();
        assert_eq!(heights, vec![4.0, 5.0, 1.0]);
    }

    #[test]
    fn internal_y_is_mean_of_children() {
        let tree = parse("((A,B),C);").unwrap();
        let root = tree.node(tree.root());
        let ab = tree.node(root.children[0]);
        assert_eq!(ab.y, 0.5);
        assert_eq!(tree.node(root.children[1]).y, 2.0);
        assert_eq!(root.y, 1.25);
    }

    #[test]
    fn root_stub_shifts_heights() {
        let mut tree = parse("(A:1,B:2);").unwrap();
        let before = tree.len();
        tree.add_root_stub(ROOT_STUB_LENGTH);
        assert_eq!(tree.len(), before + 1);
        assert!((tree.tree_height() - (2.0 + ROOT_STUB_LENGTH)).abs() < 1e-12);
        let root = tree.node(tree.root());
        assert_eq!(root.children.len(), 1);
        assert_eq!(root.y, tree.node(root.children[0]).y);
    }

    #[test]
    fn comments_and_whitespace_are_ignored() {
        let tree = parse(" ( A[&region=x] : 1 ,\n B:2 ) [&root];\n").unwrap();
        assert_eq!(tip_names(&tree), vec!["A", "B"]);
    }

    #[test]
    fn quoted_labels_unescape_quotes() {
        let tree = parse("('it''s':1,B:1);").unwrap();
        assert_eq!(tip_names(&tree)[0], "it's");
    }

    #[test]
    fn empty_leaves_are_kept() {
        let tree = parse("(,A,);").unwrap();
        assert_eq!(tree.tip_count(), 3);
    }

    #[test]
    fn missing_semicolon_is_tolerated() {
        assert!(parse("(A,B)").is_ok());
    }

    #[test]
    fn rejects_malformed_input() {
        assert!(matches!(parse("((A,B);"), Err(Error::Newick { .. })));
        assert!(matches!(parse("(A,B));"), Err(Error::Newick { .. })));
        assert!(matches!(parse("(A:x,B);"), Err(Error::Newick { .. })));
        assert!(matches!(parse("(A,B); C"), Err(Error::Newick { .. })));
        assert!(matches!(parse(""), Err(Error::Newick { .. })));
    }
}
