use crate::parse::tests::{test_error, test_print_stop};

#[test]
fn counted_loop_gets_one_phi() {
    test_print_stop(
        "int x=1; while(x<10) x=x+1; return x;",
        "return Phi(Loop,1,(Phi_x+1));",
    );
}

#[test]
fn untouched_names_fold_their_phi() {
    // `a` is never written in the body, so its φ folds away at end_loop.
    test_print_stop(
        "int a=7; int x=0; while(x<3) x=x+a; return a;",
        "return 7;",
    );
}

#[test]
fn dead_loop_folds_to_entry_values() {
    test_print_stop("int a=1; while(0) a=2; return a;", "return 1;");
}

#[test]
fn break_merges_into_the_exit() {
    test_print_stop(
        "int i=0; while(i<3) { if(i==1) break; i=i+1; } return i;",
        "return Phi(Loop,0,(Phi_i+1));",
    );
    test_print_stop("while(arg) break; return 0;", "return 0;");
}

#[test]
fn continue_joins_the_back_edge() {
    // The φ for `i` is created by the body write, after the exit scope was
    // cloned; end_loop re-syncs the exit binding onto it.
    test_print_stop(
        "int i=0; while(arg) { i=1; continue; } return i;",
        "return Phi(Loop,0,1);",
    );
}

#[test]
fn nested_loops_nest_their_phis() {
    test_print_stop(
        "int sum=0; int i=0; while(i<3) { int j=0; while(j<3) { sum=sum+1; j=j+1; } i=i+1; } return sum;",
        "return Phi(Loop,0,Phi(Loop,Phi_sum,(Phi_sum+1)));",
    );
}

#[test]
fn loop_locals_need_no_phi() {
    // `t` is defined inside the body; only `x` flows around the back edge.
    test_print_stop(
        "int x=0; while(x<5) { int t = x + 1; x = t; } return x;",
        "return Phi(Loop,0,(Phi_x+1));",
    );
}

#[test]
fn jumps_require_a_loop() {
    test_error("break;", "No active loop for a break or continue");
    test_error("continue;", "No active loop for a break or continue");
    test_error("if(arg) break; return 0;", "No active loop for a break or continue");
}
