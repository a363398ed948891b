use crate::parse::tests::{test_error, test_print_stop};

#[test]
fn store_then_load_folds() {
    test_print_stop(
        "struct P {int x; int y;} P p = new P; p.x=7; return p.x;",
        "return 7;",
    );
    // The later store wins.
    test_print_stop(
        "struct B {int a;} B b = new B; b.a=1; b.a=2; return b.a;",
        "return 2;",
    );
    // Zero initialization is visible before any store.
    test_print_stop(
        "struct B {int a;} B b = new B; return b.a;",
        "return 0;",
    );
}

#[test]
fn aliases_do_not_interfere() {
    test_print_stop(
        "struct A {int z;} struct B {int z;} A a = new A; B b = new B; a.z=5; b.z=7; return a.z;",
        "return 5;",
    );
    test_print_stop(
        "struct P {int x; int y;} P p = new P; p.x=1; p.y=2; return p.x;",
        "return 1;",
    );
}

#[test]
fn memory_phis_at_merges() {
    test_print_stop(
        "struct V {int x; int y;} V v = new V; if(arg) v.x=1; else v.y=2; return v.x;",
        "return new V.x;",
    );
}

#[test]
fn memory_phis_at_loops() {
    test_print_stop(
        "struct B {int a;} B b = new B; while(arg) { b.a = b.a+2; arg=arg+1; } return b.a;",
        "return new B.a;",
    );
}

#[test]
fn null_initialized_struct_variables() {
    // Declaring without an initializer binds a typed null; loading through
    // it still resolves the field.
    test_print_stop("struct A {int z;} A a; return a.z;", "return null.z;");
    test_print_stop("struct P {int x;} P p = null; return 0;", "return 0;");
    // Storing through a known null is fatal.
    test_error(
        "struct A {int x;} A a; a.x=1; return 0;",
        "Attempt to access 'x' from null reference",
    );
    test_error(
        "struct A {int x;} return null.x;",
        "Attempt to access 'x' from null reference",
    );
}

#[test]
fn declaration_type_checks() {
    test_print_stop("struct P {int x;} P p = new P; P q = p; return q.x;", "return 0;");
    test_error(
        "struct P {int x;} P p = 1; return 0;",
        "expression cannot be assigned to variable 'p'",
    );
    test_error(
        "struct P {int x;} struct Q {int x;} P p = new Q; return 0;",
        "new expression is not compatible with variable 'p'",
    );
}

#[test]
fn struct_declaration_rules() {
    test_error(
        "struct A {int x;} struct A {int y;} return 0;",
        "struct 'A' cannot be redefined",
    );
    test_error("struct A {} return 0;", "struct 'A' must contain 1 or more fields");
    test_error(
        "if (arg) struct A {int x;} return 0;",
        "struct declarations can only appear in top level scope",
    );
    test_error(
        "{ struct A {int x;} } return 0;",
        "struct declarations can only appear in top level scope",
    );
    test_error(
        "struct A {flt x;} return 0;",
        "A field declaration is expected, only fields of type 'int' are supported at present",
    );
}

#[test]
fn field_and_type_resolution() {
    test_error("B b = new B; return 0;", "No struct type definition found for 'B'");
    test_error("struct A {int x;} return new B;", "Unknown struct type 'B'");
    test_error(
        "struct A {int x;} A a = new A; return a.y;",
        "Unknown field 'y' in struct 'A'",
    );
    test_error(
        "int x = 1; x.f = 2; return 0;",
        "Expected 'x' to be a reference to a struct",
    );
    test_error(
        "struct A {int x;} A a = new A; return a.x.x;",
        "Expected reference to a struct but got new A.x",
    );
}
