//! Shared grammar builders for the integration tests.
#![allow(dead_code)]

use regex::Regex;
use trellis::{Node, Parser};

/// The canonical brace grammar: `text`, `brace.open` (builds a block),
/// `brace.close`.
pub fn brace_grammar() -> Parser {
    let mut parser = Parser::new();
    parser
        .capture("text", Regex::new(r"^[^{}\[\]]+").unwrap())
        .capture("brace.close", Regex::new(r"^\}").unwrap())
        .capture_with("brace.open", Regex::new(r"^\{").unwrap(), |p, tok| {
            let block = p.block("brace");
            block.append(p.node(tok))?;
            Ok(block)
        });
    parser
}

/// The brace grammar extended with brackets, for mismatch scenarios.
pub fn brace_bracket_grammar() -> Parser {
    let mut parser = brace_grammar();
    parser
        .capture("bracket.close", Regex::new(r"^\]").unwrap())
        .capture_with("bracket.open", Regex::new(r"^\[").unwrap(), |p, tok| {
            let block = p.block("bracket");
            block.append(p.node(tok))?;
            Ok(block)
        });
    parser
}

/// The kinds of a node's children, in order.
pub fn child_kinds(node: &Node) -> Vec<String> {
    node.children().iter().map(Node::kind).collect()
}

/// Walk a tree asserting every child's parent and index are consistent
/// with its position.
pub fn assert_well_formed(node: &Node) {
    for (i, child) in node.children().iter().enumerate() {
        assert_eq!(child.index(), i, "index of child {i} of {}", node.kind());
        assert!(
            child.parent().expect("child has a parent").ptr_eq(node),
            "parent of child {i} of {}",
            node.kind()
        );
        assert_well_formed(child);
    }
}
