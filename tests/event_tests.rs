//! Observer registration and emission order.

mod common;

use std::cell::RefCell;
use std::rc::Rc;

use common::brace_grammar;
use trellis::{Event, Status};

fn recorded(events: &Rc<RefCell<Vec<String>>>, name: &'static str) -> impl FnMut(&Event) + 'static {
    let log = Rc::clone(events);
    move |event| {
        let detail = match event {
            Event::Node(node)
            | Event::Push(node)
            | Event::Pop(node)
            | Event::Handled(node)
            | Event::Kind(node)
            | Event::Parsed(node) => node.kind(),
            Event::Error(err) => err.code(),
        };
        log.borrow_mut().push(format!("{name}:{detail}"));
    }
}

#[test]
fn stack_transitions_are_observable() {
    let log = Rc::new(RefCell::new(Vec::new()));
    let mut parser = brace_grammar();
    parser
        .on("push", recorded(&log, "push"))
        .on("pop", recorded(&log, "pop"))
        .on("parsed", recorded(&log, "parsed"));

    parser.parse("{a}").unwrap();

    let log = log.borrow();
    assert_eq!(*log, ["push:brace", "pop:brace", "parsed:root"]);
}

#[test]
fn handled_and_kind_named_events_fire_after_coercion() {
    let log = Rc::new(RefCell::new(Vec::new()));
    let mut parser = brace_grammar();
    parser
        .on("handled", recorded(&log, "handled"))
        .on("text", recorded(&log, "text"));

    parser.parse("{a}").unwrap();

    let log = log.borrow();
    assert!(log.contains(&"handled:brace".to_string()));
    assert!(log.contains(&"handled:text".to_string()));
    assert!(log.contains(&"handled:brace.close".to_string()));
    // the kind-named companion event fires once, for the text node
    assert_eq!(log.iter().filter(|e| *e == "text:text").count(), 1);
}

#[test]
fn node_events_fire_for_constructed_nodes() {
    let log = Rc::new(RefCell::new(Vec::new()));
    let mut parser = brace_grammar();
    parser.on("node", recorded(&log, "node"));

    parser.parse("{a}").unwrap();

    let log = log.borrow();
    // one per handler-constructed node: brace block, its open child,
    // the text leaf and the closer
    assert_eq!(log.len(), 4);
}

#[test]
fn error_listeners_suppress_propagation() {
    let log = Rc::new(RefCell::new(Vec::new()));
    let mut parser = brace_grammar();
    parser.on("error", recorded(&log, "error"));

    let ast = parser.parse("{a,b").unwrap();
    assert_eq!(parser.status(), Status::Done);
    // the tree is still the partial tree, at the caller's risk
    assert_eq!(ast.child(1).unwrap().kind(), "brace");

    let log = log.borrow();
    assert_eq!(*log, ["error:trellis::parser::unclosed_block"]);
}

#[test]
fn lexer_failures_are_never_suppressed() {
    let log = Rc::new(RefCell::new(Vec::new()));
    let mut parser = brace_grammar();
    parser.on("error", recorded(&log, "error"));

    let err = parser.parse("{[").unwrap_err();
    assert_eq!(err.code(), "trellis::lexer::unmatched_input");
    assert!(log.borrow().is_empty());
}

#[test]
fn listeners_fire_in_registration_order() {
    let log = Rc::new(RefCell::new(Vec::new()));
    let mut parser = brace_grammar();
    parser
        .on("parsed", recorded(&log, "first"))
        .on("parsed", recorded(&log, "second"));

    parser.parse("a").unwrap();
    assert_eq!(*log.borrow(), ["first:root", "second:root"]);
}
