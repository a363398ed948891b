use bumpalo::Bump;

use crate::parse::{Parser, SynError};
use crate::types::TypeStore;

mod binding;
mod expressions;
mod if_else;
mod loops;
mod round_trip;
mod structs;
mod viz;

fn test_print_stop(source: &str, expected: &str) {
    let arena = Bump::new();
    let types = TypeStore::new(&arena);
    let mut parser = Parser::new(source, &types);
    let stop = parser.parse().unwrap();
    assert_eq!(parser.print(stop), expected);
}

fn test_print_stop_arg(arg: i64, source: &str, expected: &str) {
    let arena = Bump::new();
    let types = TypeStore::new(&arena);
    let mut parser = Parser::new_with_arg(source, &types, types.int(arg));
    let stop = parser.parse().unwrap();
    assert_eq!(parser.print(stop), expected);
}

fn test_error(source: &str, error: &str) {
    let arena = Bump::new();
    let types = TypeStore::new(&arena);
    let mut parser = Parser::new(source, &types);
    assert_eq!(parser.parse(), Err(SynError(error.to_string())));
}
