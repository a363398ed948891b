use crate::parse::tests::{test_error, test_print_stop};

#[test]
fn declarations_and_reads() {
    test_print_stop("int x = 1; return x;", "return 1;");
    test_print_stop("int x = arg; int y = x+1; return y;", "return (arg+1);");
    test_print_stop("int x = 2; int y = x; x = 3; return y;", "return 2;");
}

#[test]
fn nested_blocks_shadow_and_restore() {
    test_print_stop("int x = 1; { int x = 2; x = x + 1; } return x;", "return 1;");
    test_print_stop("int x = 1; { int y = x + 1; x = y; } return x;", "return 2;");
    // The inner frame dies with its block; the outer binding survives.
    test_print_stop("int x = 0; { x = 1; { x = x + 2; } } return x;", "return 3;");
}

#[test]
fn empty_statements() {
    test_print_stop("; ; return 1; ;", "return 1;");
    test_print_stop("{} return 1;", "return 1;");
}

#[test]
fn rebinding_rules() {
    test_error("int x = 1; int x = 2; return x;", "Redefining name 'x'");
    test_error("return y;", "Undefined name 'y'");
    test_error("y = 1; return 0;", "Undefined name 'y'");
    // A block-local name is gone once its block closes.
    test_error("{ int y = 1; } return y;", "Undefined name 'y'");
}

#[test]
fn keywords_are_not_identifiers() {
    test_error("int true = 1; return 0;", "Expected an identifier, found 'true'");
    test_error("int while = 1; return 0;", "Expected an identifier, found 'while'");
    test_error("return if;", "Undefined name 'if'");
}

#[test]
fn code_after_return_is_dead_but_parsed() {
    test_print_stop("return 1; return 2;", "Stop[ return 1; return 2; ]");
    // Dead code still type checks names.
    test_error("return 1; return oops;", "Undefined name 'oops'");
}
