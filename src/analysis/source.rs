//! Parsing of Python source text into a reusable syntax tree.

use tree_sitter::{Node, Parser, Tree};

use crate::{Error, ParseError};

/// Holds a parsed tree-sitter tree together with the source it came from.
///
/// The tree is transient: it is produced for one analysis pass and discarded
/// afterwards. All snapshot, diff and scan operations borrow it read-only,
/// so independent sources can be parsed and analyzed on independent threads.
pub struct SourceTree {
    tree: Tree,
    source: Vec<u8>,
}

impl SourceTree {
    /// Parse Python source text.
    ///
    /// tree-sitter always produces a tree, even for broken input; syntax
    /// errors surface as ERROR/MISSING nodes. Callers that need a valid
    /// tree go through [`SourceTree::require_valid`].
    pub fn parse(source: &str) -> Result<Self, Error> {
        let mut parser = Parser::new();
        parser
            .set_language(&tree_sitter_python::LANGUAGE.into())
            .map_err(|e| Error::Grammar(e.to_string()))?;
        let tree = parser
            .parse(source, None)
            .ok_or_else(|| Error::Grammar("parser produced no tree".to_string()))?;
        Ok(Self {
            tree,
            source: source.as_bytes().to_vec(),
        })
    }

    /// Whether the parse produced any ERROR or MISSING nodes.
    pub fn has_syntax_errors(&self) -> bool {
        self.tree.root_node().has_error()
    }

    /// Line (1-indexed) of the first ERROR or MISSING node, if any.
    pub fn first_error_line(&self) -> Option<usize> {
        fn find(node: Node) -> Option<usize> {
            if node.is_error() || node.is_missing() {
                return Some(node.start_position().row + 1);
            }
            let mut cursor = node.walk();
            for child in node.children(&mut cursor) {
                if let Some(line) = find(child) {
                    return Some(line);
                }
            }
            None
        }
        find(self.tree.root_node())
    }

    /// Fail with a typed [`ParseError`] if the tree contains syntax errors.
    pub fn require_valid(&self) -> Result<(), ParseError> {
        if self.has_syntax_errors() {
            Err(ParseError {
                line: self.first_error_line().unwrap_or(1),
            })
        } else {
            Ok(())
        }
    }

    /// The module root node.
    pub fn root(&self) -> Node<'_> {
        self.tree.root_node()
    }

    /// The raw source bytes.
    pub fn source(&self) -> &[u8] {
        &self.source
    }

    /// Source text of a node. Invalid UTF-8 renders as the empty string.
    pub fn node_text(&self, node: Node) -> &str {
        node.utf8_text(&self.source).unwrap_or("")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_source() {
        let tree = SourceTree::parse("def hello():\n    pass\n").unwrap();
        assert!(!tree.has_syntax_errors());
        assert!(tree.require_valid().is_ok());
        assert_eq!(tree.root().kind(), "module");
    }

    #[test]
    fn test_parse_broken_source() {
        let tree = SourceTree::parse("def broken(\n").unwrap();
        assert!(tree.has_syntax_errors());
        let err = tree.require_valid().unwrap_err();
        assert!(err.line >= 1);
    }

    #[test]
    fn test_empty_source_is_valid() {
        let tree = SourceTree::parse("").unwrap();
        assert!(tree.require_valid().is_ok());
    }
}
