use crate::parse::tests::{test_error, test_print_stop, test_print_stop_arg};

#[test]
fn constant_folding() {
    test_print_stop("return 1;", "return 1;");
    test_print_stop("return 1+2*3;", "return 7;");
    test_print_stop("return (1+2)*3;", "return 9;");
    test_print_stop("return 1+2*3+-5;", "return 2;");
    test_print_stop("return -5--3;", "return -2;");
    test_print_stop("return 6/2;", "return 3;");
    test_print_stop("return 1<2<3;", "return 1;");
}

#[test]
fn comparisons_fold() {
    test_print_stop("return 3>2;", "return 1;");
    test_print_stop("return 3>=2;", "return 1;");
    test_print_stop("return 2<=1;", "return 0;");
    test_print_stop("return 1==1;", "return 1;");
    test_print_stop("return 1!=2;", "return 1;");
    test_print_stop("return true;", "return 1;");
    test_print_stop("return false;", "return 0;");
}

#[test]
fn arg_stays_symbolic() {
    test_print_stop("return arg+1;", "return (arg+1);");
    test_print_stop("return arg==arg;", "return 1;");
    test_print_stop("return arg<arg;", "return 0;");
    test_print_stop("return arg<=arg;", "return 1;");
}

#[test]
fn peephole_identities() {
    test_print_stop("return arg+0;", "return arg;");
    test_print_stop("return arg*1;", "return arg;");
    test_print_stop("return arg/1;", "return arg;");
    test_print_stop("return arg-arg;", "return 0;");
    // Constants canonicalize to the right operand.
    test_print_stop("return 1+arg;", "return (arg+1);");
    // Constant chains re-associate and fold.
    test_print_stop("return (arg+1)+2;", "return (arg+3);");
    // Add of the same value strength-reduces.
    test_print_stop("return arg+arg;", "return (arg*2);");
    // Double negation cancels.
    test_print_stop("return --arg;", "return arg;");
}

#[test]
fn bound_argument_folds_through() {
    test_print_stop_arg(2, "return arg+1;", "return 3;");
    test_print_stop_arg(7, "return arg*arg;", "return 49;");
    test_print_stop_arg(0, "return arg;", "return 0;");
}

#[test]
fn bad_literals_and_syntax() {
    test_error("return 07;", "Syntax error: integer values cannot start with '0'");
    test_error("return;", "Syntax error, expected an identifier or expression: ;");
    test_error("return 1", "Syntax error, expected ;: ");
    test_error("return 1;}", "Syntax error, unexpected }");
    test_error("return (1+2;", "Syntax error, expected ): ;");
}
