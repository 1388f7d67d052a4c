use clap::{Parser, Subcommand};
use lang_lexer::Scanner;
use lang_parser::LoadOptions;
use std::path::Path;

#[derive(Parser)]
#[command(name = "lang")]
#[command(about = "Inspect and validate .lang localization files")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print every token of a .lang file
    Tokens {
        /// Input .lang file
        path: String,

        /// Print tokens as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check a .lang file for errors
    Check {
        /// Input .lang file
        path: String,

        /// Encoding the file is expected to declare
        #[arg(long, default_value = "utf-8")]
        encoding: String,
    },

    /// Print the loaded tree as JSON
    Dump {
        /// Input .lang file
        path: String,

        /// Keep references unresolved
        #[arg(long)]
        raw: bool,

        /// Encoding the file is expected to declare
        #[arg(long, default_value = "utf-8")]
        encoding: String,
    },

    /// Print the text stored at a dotted key, or the key itself
    Get {
        /// Input .lang file
        path: String,

        /// Dotted key, e.g. `menu.title`
        key: String,

        /// Encoding the file is expected to declare
        #[arg(long, default_value = "utf-8")]
        encoding: String,
    },
}

fn main() {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Command::Tokens { path, json } => cmd_tokens(&path, json),
        Command::Check { path, encoding } => cmd_check(&path, &encoding),
        Command::Dump {
            path,
            raw,
            encoding,
        } => cmd_dump(&path, raw, &encoding),
        Command::Get {
            path,
            key,
            encoding,
        } => cmd_get(&path, &key, &encoding),
    }
}

/// Enable with `RUST_LOG=lang_parser=debug` or `RUST_LOG=lang_lexer=trace`.
fn init_tracing() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    if std::env::var("RUST_LOG").is_ok() {
        tracing_subscriber::registry()
            .with(fmt::layer().with_writer(std::io::stderr).with_target(true))
            .with(EnvFilter::from_default_env())
            .init();
    }
}

fn read_source(path: &str) -> String {
    let p = Path::new(path);
    if !p.exists() {
        eprintln!("Error: file not found: {path}");
        std::process::exit(1);
    }
    match std::fs::read_to_string(p) {
        Ok(source) => source,
        Err(e) => {
            eprintln!("Error reading {path}: {e}");
            std::process::exit(1);
        }
    }
}

/// The file name is filled in by the loader.
fn options(encoding: &str) -> LoadOptions {
    LoadOptions::default().with_encoding(encoding)
}

fn print_json<T: serde::Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{json}"),
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}

fn cmd_tokens(path: &str, json: bool) {
    let source = read_source(path);
    let tokens = Scanner::tokenize(&source);

    if json {
        print_json(&tokens);
        return;
    }

    for token in tokens.iter().filter(|t| !t.kind.is_trivia()) {
        println!(
            "{}:{}\t{:?}\t{:?}",
            token.span.line, token.span.column, token.kind, token.text
        );
    }
}

fn cmd_check(path: &str, encoding: &str) {
    match lang_parser::load_file(path, &options(encoding)) {
        Ok(doc) => {
            tracing::debug!(entries = doc.root.len(), "loaded");
            eprintln!("OK: {path}");
        }
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    }
}

fn cmd_dump(path: &str, raw: bool, encoding: &str) {
    let options = options(encoding);
    let result = if raw {
        lang_parser::load_raw_file(path, &options).map(|tree| print_json(&tree))
    } else {
        lang_parser::load_file(path, &options).map(|doc| print_json(&doc))
    };

    if let Err(e) = result {
        eprintln!("{e}");
        std::process::exit(1);
    }
}

fn cmd_get(path: &str, key: &str, encoding: &str) {
    match lang_parser::load_file(path, &options(encoding)) {
        Ok(doc) => println!("{}", doc.text_or_key(key)),
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    }
}
