use golftalk::evaluator::{self, create_global_env};
use golftalk::parser::parse_line;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use std::panic;
use std::process;

fn main() {
    let result = panic::catch_unwind(run_repl);

    if let Err(panic_info) = result {
        eprintln!("The interpreter encountered an unexpected error and must exit.");

        if let Some(msg) = panic_info.downcast_ref::<&str>() {
            eprintln!("Error: {msg}");
        } else if let Some(msg) = panic_info.downcast_ref::<String>() {
            eprintln!("Error: {msg}");
        } else {
            eprintln!("Error: Unknown panic occurred");
        }

        process::exit(1);
    }
}

fn run_repl() {
    let mut rl = DefaultEditor::new().expect("Could not initialize line editor");
    let env = create_global_env();

    loop {
        match rl.readline("golftalk~$ ") {
            Ok(line) => {
                if line.trim().is_empty() {
                    continue;
                }

                let _ = rl.add_history_entry(&line);

                let exprs = match parse_line(&line) {
                    Ok(exprs) => exprs,
                    Err(err) => {
                        println!("No.\n\t{err}");
                        continue;
                    }
                };

                // Each top-level expression evaluates independently; an error
                // in one does not stop the rest of the line.
                for expr in exprs {
                    match evaluator::eval(&expr, &env) {
                        Ok(result) => {
                            let printed = format!("{result}");
                            if printed.is_empty() {
                                continue;
                            }
                            if result.is_literal_list() {
                                println!("'{printed}");
                            } else {
                                println!("{printed}");
                            }
                        }
                        Err(err) => println!("No.\n\t{err}"),
                    }
                }
            }

            Err(ReadlineError::Eof) | Err(ReadlineError::Interrupted) => {
                println!("\n\nhave a nice day ;)");
                break;
            }
            Err(err) => {
                println!("Error: {err:?}");
                break;
            }
        }
    }
}
