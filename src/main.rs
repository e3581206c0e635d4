//! # aggflow CLI
//!
//! A small REPL over the aggregation command surface: type an `FT.AGGREGATE`
//! / `FT.SEARCH` / `FT.CURSOR` / `FT.PROFILE` / `_FT.DEBUG` line and it is
//! parsed, compiled into a pipeline, run against a tiny seeded in-memory
//! catalog, and printed.
//!
//! ## Usage
//!
//! ```bash
//! cargo run --bin aggflow
//! ```
//!
//! Then enter commands:
//! - `FT.AGGREGATE catalog * GROUPBY 1 @category REDUCE COUNT 0 AS n`
//! - `FT.SEARCH catalog *`
//! - `_FT.DEBUG FT.AGGREGATE catalog * DEBUG_PARAMS_COUNT 0`
//! - `.help`
//! - `.quit`

use std::collections::HashMap;
use std::io::{self, Write};

use aggflow::iterators::QueryIterator;
use aggflow::pipeline::loader::DocStore;
use aggflow::pipeline::scorer::PassThroughScore;
use aggflow::pipeline::RpStatus;
use aggflow::plan::{compile, CompileInputs};
use aggflow::value::RSValue;
use aggflow::{commands, Config};

/// Seeded catalog: five documents with `category`/`price` fields, enough to
/// exercise GROUPBY/SORTBY/LIMIT/APPLY/FILTER without a real index.
struct DemoCatalog {
    fields: HashMap<u64, HashMap<&'static str, RSValue>>,
}

impl DemoCatalog {
    fn new() -> Self {
        let mut fields = HashMap::new();
        let rows: [(u64, &str, f64); 5] = [
            (1, "electronics", 199.0),
            (2, "electronics", 49.0),
            (3, "books", 15.0),
            (4, "books", 22.0),
            (5, "garden", 60.0),
        ];
        for (id, category, price) in rows {
            let mut row = HashMap::new();
            row.insert("category", RSValue::string(category.to_string()));
            row.insert("price", RSValue::Number(price));
            fields.insert(id, row);
        }
        DemoCatalog { fields }
    }

    fn ids(&self) -> Vec<u64> {
        let mut ids: Vec<u64> = self.fields.keys().copied().collect();
        ids.sort_unstable();
        ids
    }
}

impl DocStore for DemoCatalog {
    fn load(&self, doc_id: u64, field: &str) -> Option<RSValue> {
        self.fields.get(&doc_id).and_then(|row| row.get(field)).cloned()
    }
}

fn run_aggregate(tokens: &[String]) {
    let request = match commands::parse_aggregate(tokens) {
        Ok(r) => r,
        Err(e) => {
            println!("-{} {e}", commands::error_name(&e));
            return;
        }
    };
    let catalog = DemoCatalog::new();
    let inputs = CompileInputs {
        index: QueryIterator::IdList { ids: catalog.ids(), pos: 0 },
        scorer: Box::new(PassThroughScore),
        doc_store: Box::new(catalog),
    };
    let mut pipeline = match compile(&request.plan, inputs) {
        Ok(p) => p,
        Err(e) => {
            println!("-{} {e}", commands::error_name(&e));
            return;
        }
    };
    let mut printed = 0usize;
    loop {
        match pipeline.next() {
            Ok((RpStatus::Ok, Some(result))) => {
                printed += 1;
                println!("  doc_id={} score={}", result.doc_id, result.score);
            }
            Ok((RpStatus::Ok, None)) => continue,
            Ok((RpStatus::Eof, _)) => break,
            Ok((status, _)) => {
                println!("  (stopped: {status:?})");
                break;
            }
            Err(e) => {
                println!("-{} {e}", commands::error_name(&e));
                break;
            }
        }
    }
    println!("{printed} results");
}

fn run_search(tokens: &[String]) {
    match commands::parse_search(tokens) {
        Ok(req) => println!("parsed: index={:?} query={:?}", req.index, req.query),
        Err(e) => println!("-{} {e}", commands::error_name(&e)),
    }
}

fn run_debug(tokens: &[String]) {
    match commands::parse_debug(tokens) {
        Ok(req) => println!(
            "inner command: {:?}, timeout_after_n: {:?}",
            req.inner, req.timeout_after_n
        ),
        Err(e) => println!("-{} {e}", commands::error_name(&e)),
    }
}

fn dispatch(line: &str) {
    let tokens: Vec<String> = line.split_whitespace().map(str::to_string).collect();
    let Some(head) = tokens.first() else { return };
    match head.to_ascii_uppercase().as_str() {
        "FT.AGGREGATE" => run_aggregate(&tokens[1..]),
        "FT.SEARCH" => run_search(&tokens[1..]),
        "_FT.DEBUG" => run_debug(&tokens[1..]),
        "FT.CURSOR" => match commands::parse_cursor(&tokens[1..]) {
            Ok(cmd) => println!("{cmd:?}"),
            Err(e) => println!("-{} {e}", commands::error_name(&e)),
        },
        other => println!("unrecognized command: {other}"),
    }
}

fn main() {
    println!("aggflow REPL");
    println!("============\n");

    let config = Config::load().unwrap_or_else(|_| {
        println!("(no config.toml found, using defaults)");
        Config::default()
    });
    println!(
        "default timeout: {}ms, cursor idle: {}ms\n",
        config.execution.default_timeout_ms, config.cursors.max_idle_ms
    );

    println!("Seeded catalog \"catalog\": 5 docs across electronics/books/garden.");
    println!("Try: FT.AGGREGATE catalog * GROUPBY 1 @category REDUCE COUNT 0 AS n");
    println!("Type .help for more, .quit to exit.\n");

    loop {
        print!("aggflow> ");
        io::stdout().flush().ok();

        let mut input = String::new();
        if io::stdin().read_line(&mut input).unwrap_or(0) == 0 {
            break;
        }
        let input = input.trim();
        if input.is_empty() {
            continue;
        }
        if input == ".quit" || input == ".exit" {
            println!("Goodbye!");
            break;
        }
        if input == ".help" {
            println!("Commands:");
            println!("  FT.AGGREGATE <index> <query> [clauses...]");
            println!("  FT.SEARCH <index> <query> [options...]");
            println!("  FT.CURSOR READ|DEL|GC <index> [<cursor-id>] ...");
            println!("  _FT.DEBUG <inner command...> DEBUG_PARAMS_COUNT <k>");
            println!("  .help, .quit");
            continue;
        }
        dispatch(input);
    }
}
