use std::io::{self, BufRead, Write};
use std::process::ExitCode;
use std::{env, fs};

use rossa::{Interpreter, Value};

fn main() -> ExitCode {
    let args: Vec<String> = env::args().collect();
    let skip_stdlib = args.iter().any(|a| a == "--skip-stdlib");
    let file_path = args.iter().skip(1).find(|a| !a.starts_with("--"));

    let mut interp = if skip_stdlib { Interpreter::without_stdlib() } else { Interpreter::new() };

    match file_path {
        Some(path) => run_file(&mut interp, path),
        None => repl(&mut interp),
    }
}

fn run_file(interp: &mut Interpreter, path: &str) -> ExitCode {
    let source = match fs::read_to_string(path) {
        Ok(s) => s,
        Err(err) => {
            eprintln!("error: cannot read {path}: {err}");
            return ExitCode::FAILURE;
        }
    };
    match interp.run(path, &source) {
        Ok(value) => {
            print_result(&value);
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("error: {err}");
            for frame in &err.trace {
                eprintln!("  at {frame}");
            }
            ExitCode::FAILURE
        }
    }
}

/// Reads a line, parses, folds, evaluates, and prints the result of
/// Array-shaped expressions element by element (§6.3).
fn repl(interp: &mut Interpreter) -> ExitCode {
    let stdin = io::stdin();
    let mut had_error = false;
    loop {
        print!("> ");
        io::stdout().flush().ok();
        let mut line = String::new();
        match stdin.lock().read_line(&mut line) {
            Ok(0) => break,
            Ok(_) => {}
            Err(err) => {
                eprintln!("error: {err}");
                had_error = true;
                break;
            }
        }
        let line = line.trim_end();
        if line.is_empty() {
            continue;
        }
        match interp.run("<repl>", line) {
            Ok(value) => print_result(&value),
            Err(err) => {
                eprintln!("error: {err}");
                had_error = true;
            }
        }
    }
    if had_error { ExitCode::FAILURE } else { ExitCode::SUCCESS }
}

fn print_result(value: &Value) {
    match value {
        Value::Array(items) => {
            for item in items.borrow().iter() {
                println!("{}", rossa::stringify(item));
            }
        }
        other => println!("{}", rossa::stringify(other)),
    }
}
