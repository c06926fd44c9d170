//! Handler registration, wrapping and fallback behavior.

mod common;

use std::cell::RefCell;
use std::rc::Rc;

use common::child_kinds;
use regex::Regex;
use trellis::{Emit, NodeSpec, Parser};

#[test]
fn registration_is_chainable_and_counted() {
    let mut parser = Parser::new();
    parser
        .register("text", |_p, tok| Ok(Emit::from(tok)))
        .register("slash", |_p, tok| Ok(Emit::from(tok)))
        .register("dot", |_p, tok| Ok(Emit::from(tok)));

    assert_eq!(parser.handlers().len(), 3);
    assert!(parser.handlers().has("slash"));
    assert!(!parser.handlers().has("default"));
}

#[test]
fn re_registering_replaces_the_prior_handler() {
    let mut parser = Parser::new();
    parser.capture("word", Regex::new(r"^\w+").unwrap());
    parser.register("word", |p, tok| {
        let node = p.node(("word", tok.value.to_uppercase().as_str()));
        Ok(node)
    });

    let ast = parser.parse("abc").unwrap();
    assert_eq!(ast.child(1).unwrap().value(), Some("ABC".into()));
    assert_eq!(parser.handlers().len(), 1);
}

#[test]
fn default_handler_catches_unregistered_kinds() {
    let mut parser = Parser::new();
    parser
        .lexer_mut()
        .capture("text", Regex::new(r"^\w+").unwrap())
        .capture("slash", Regex::new(r"^/").unwrap());
    parser.register("default", |_p, tok| Ok(Emit::from(tok)));

    let ast = parser.parse("a/b").unwrap();
    assert_eq!(child_kinds(&ast), ["bos", "text", "slash", "text", "eos"]);
    assert_eq!(parser.consumed(), "a/b");
}

#[test]
fn late_default_registration_does_not_rewrite_finished_parses() {
    let mut parser = Parser::new();
    parser.capture("word", Regex::new(r"^\w+").unwrap());
    let ast = parser.parse("abc").unwrap();
    let before = ast.to_spec();

    parser.register("default", |_p, tok| Ok(Emit::from(tok)));
    assert_eq!(ast.to_spec(), before);
}

#[test]
fn handlers_may_delegate_to_other_handlers() {
    let count = Rc::new(RefCell::new(0));
    let seen = Rc::clone(&count);

    let mut parser = Parser::new();
    parser
        .lexer_mut()
        .capture("slash", Regex::new(r"^/").unwrap())
        .capture("word", Regex::new(r"^[a-z]+").unwrap());
    parser
        .register("default", move |p, tok| {
            *seen.borrow_mut() += 1;
            Ok(p.node(tok))
        })
        .register("slash", |p, tok| {
            assert_eq!(tok.kind, "slash");
            let default = p.handlers().get("default")?;
            (*default)(p, tok)
        });

    let ast = parser.parse("a/b").unwrap();
    assert_eq!(ast.len(), 5);
    // both words and the delegated slash ran through the default handler
    assert_eq!(*count.borrow(), 3);
}

#[test]
fn specs_without_a_kind_are_stamped_with_the_registration_kind() {
    let mut parser = Parser::new();
    parser
        .lexer_mut()
        .capture("word", Regex::new(r"^\w+").unwrap());
    parser.register("word", |_p, tok| {
        Ok(NodeSpec {
            kind: String::new(),
            value: Some(tok.value.clone()),
            children: None,
        })
    });

    let ast = parser.parse("abc").unwrap();
    assert_eq!(ast.child(1).unwrap().kind(), "word");
}

#[test]
fn handler_errors_carry_position_context() {
    let mut parser = Parser::new();
    parser
        .capture("word", Regex::new(r"^[a-z]+").unwrap())
        .capture_with("digit", Regex::new(r"^\d+").unwrap(), |p, tok| {
            if tok.value.len() > 2 {
                return Err::<Emit, _>(p.error("number too long"));
            }
            Ok(Emit::from(tok))
        });

    let err = parser.parse("ab1234").unwrap_err();
    assert_eq!(err.code(), "trellis::parser::handler_error");
    let message = err.to_string();
    assert!(message.contains("number too long"));
    // the snippet shows the consumed input with a caret
    assert!(message.contains('^'));
}

#[test]
fn handlers_can_drive_lookahead_with_expect_and_accept() {
    let mut parser = Parser::new();
    parser
        .capture("word", Regex::new(r"^[a-z]+").unwrap())
        .capture("equals", Regex::new(r"^=").unwrap())
        .capture_with("dollar", Regex::new(r"^\$").unwrap(), |p, tok| {
            let node = p.node(tok);
            // a $ must be followed by a word; an optional = may trail it
            p.expect("word")?;
            p.accept("equals")?;
            Ok(node)
        });

    let ast = parser.parse("$ab=").unwrap();
    assert_eq!(child_kinds(&ast), ["bos", "word", "equals", "dollar", "eos"]);

    let err = parser.parse("$=").unwrap_err();
    assert_eq!(err.code(), "trellis::parser::expected_token");
    assert!(err.to_string().contains("expected \"word\""));
}

#[test]
fn handlers_can_inspect_the_open_scope() {
    let mut parser = Parser::new();
    parser
        .capture("brace.close", Regex::new(r"^\}").unwrap())
        .capture_with("brace.open", Regex::new(r"^\{").unwrap(), |p, tok| {
            let block = p.block("brace");
            block.append(p.node(tok))?;
            Ok(block)
        })
        .capture_with("comma", Regex::new(r"^,").unwrap(), |p, tok| {
            if !p.is_inside("brace") {
                return Err::<Emit, _>(p.error("comma outside braces"));
            }
            Ok(Emit::from(tok))
        })
        .capture("text", Regex::new(r"^[a-z]+").unwrap());

    assert!(parser.parse("{a,b}").is_ok());
    let err = parser.parse("a,b").unwrap_err();
    assert!(err.to_string().contains("comma outside braces"));
}
