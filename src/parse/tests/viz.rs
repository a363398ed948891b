use bumpalo::Bump;

use crate::parse::Parser;
use crate::types::TypeStore;

use crate::parse::tests::test_print_stop;

#[test]
fn dot_output_shape() {
    let arena = Bump::new();
    let types = TypeStore::new(&arena);
    let mut parser = Parser::new("int a=1; if(arg) a=2; else a=3; return a;", &types);
    let stop = parser.parse().unwrap();

    let dot = parser.generate_dot();
    assert!(dot.starts_with("digraph"));
    assert!(dot.contains("rankdir=BT;"));
    assert!(dot.contains("Return"));
    assert!(dot.contains("Region"));
    // φs render with the phi entity and their variable name.
    assert!(dot.contains("&phi;_a"));
    let _ = stop;
}

#[test]
fn show_graph_directive_parses() {
    test_print_stop("#showGraph; return 1;", "return 1;");
    test_print_stop("int a=2; #showGraph; return a;", "return 2;");
}

#[test]
fn iterate_cleans_up_after_parse() {
    let arena = Bump::new();
    let types = TypeStore::new(&arena);
    let mut parser = Parser::new(
        "int a=1; while(0) a=2; if(arg) {} else {} return a;",
        &types,
    );
    let stop = parser.parse().unwrap();
    parser.iterate();
    assert_eq!(parser.print(stop), "return 1;");
}
