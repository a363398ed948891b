use crate::parse::tests::{test_error, test_print_stop};

#[test]
fn merge_inserts_phi() {
    test_print_stop(
        "int a=1; if(arg) a=2; else a=3; return a;",
        "return Phi(Region,2,3);",
    );
    // No else arm: the false side keeps the original binding.
    test_print_stop(
        "int a=1; if(arg) a=2; return a;",
        "return Phi(Region,2,1);",
    );
}

#[test]
fn equal_arms_fold_the_phi() {
    test_print_stop("int a=1; if(arg) a=2; else a=2; return a;", "return 2;");
    test_print_stop("int a=1; if(arg) {} else {} return a;", "return 1;");
}

#[test]
fn constant_predicate_kills_an_arm() {
    test_print_stop("int a=1; if(true) a=2; else a=3; return a;", "return 2;");
    test_print_stop("int a=1; if(false) a=2; else a=3; return a;", "return 3;");
    test_print_stop("int a=1; if(0) a=2; return a;", "return 1;");
}

#[test]
fn nested_merges() {
    test_print_stop(
        "int a=0; if(arg) { if(arg==1) a=1; else a=2; } else a=3; return a;",
        "return Phi(Region,Phi(Region,1,2),3);",
    );
}

#[test]
fn return_inside_an_arm() {
    test_print_stop(
        "int a=1; if(arg) { return 2; } else a=3; return a;",
        "Stop[ return 2; return 3; ]",
    );
}

#[test]
fn untouched_names_merge_silently() {
    test_print_stop(
        "int a=1; int b=2; if(arg) a=3; return a+b;",
        "return (Phi(Region,3,1)+2);",
    );
}

#[test]
fn divergent_definitions_are_fatal() {
    test_error(
        "if (arg) int y = 1; else ; return 0;",
        "Cannot define a new name on one arm of an if",
    );
    test_error(
        "if (arg) ; else int y = 1; return 0;",
        "Cannot define a new name on one arm of an if",
    );
    test_error(
        "if (arg) int y = 1; return 0;",
        "Cannot define a new name on one arm of an if",
    );
}

#[test]
fn predicates_demand_parens() {
    test_error("if arg a=1; return 0;", "Syntax error, expected (: arg");
    test_error("if (arg a=1; return 0;", "Syntax error, expected ): a");
}
