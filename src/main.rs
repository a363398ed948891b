use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use bumpalo::Bump;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use simple_son::parse;
use simple_son::types::TypeStore;

/// Compile a Simple source file to a sea-of-nodes graph.
#[derive(Parser)]
#[command(version, about)]
struct Args {
    /// Source file to compile.
    file: PathBuf,

    /// Bound the program argument `arg` to a constant.
    #[arg(long)]
    arg: Option<i64>,

    /// Dump the final graph as GraphViz to stdout.
    #[arg(long)]
    show: bool,

    /// Run the post-parse peephole worklist to a fixed point.
    #[arg(long)]
    opt: bool,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let source = match fs::read_to_string(&args.file) {
        Ok(source) => source,
        Err(e) => {
            eprintln!("cannot read {}: {e}", args.file.display());
            return ExitCode::FAILURE;
        }
    };

    let arena = Bump::new();
    let types = TypeStore::new(&arena);
    let mut parser = match args.arg {
        Some(v) => parse::Parser::new_with_arg(&source, &types, types.int(v)),
        None => parse::Parser::new(&source, &types),
    };

    match parser.parse() {
        Ok(stop) => {
            if args.opt {
                parser.iterate();
            }
            if args.show {
                println!("{}", parser.generate_dot());
            }
            println!("{}", parser.print(stop));
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{}: {e}", args.file.display());
            ExitCode::FAILURE
        }
    }
}
