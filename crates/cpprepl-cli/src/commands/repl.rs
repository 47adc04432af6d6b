//! `cpprepl repl` — interactive prompt.
//!
//! Line editing and history live here; everything typed is handed to the
//! session, which owns the command vocabulary. Per-entry failures are
//! reported and the loop continues.

use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

use crate::commands::create_session;
use crate::output;
use crate::BuildArgs;

const PROMPT: &str = ">>> ";

pub fn execute(args: &BuildArgs) -> anyhow::Result<()> {
    let mut session = create_session(args)?;
    let mut editor = DefaultEditor::new()?;

    // Load history if it exists
    let history_path = dirs::home_dir().map(|h| h.join(".cpprepl").join("history"));
    if let Some(ref path) = history_path {
        let _ = editor.load_history(path);
    }

    println!("cpprepl v{} C/C++ REPL", env!("CARGO_PKG_VERSION"));
    println!("Type help for help, exit to quit\n");

    loop {
        match editor.readline(PROMPT) {
            Ok(line) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                let _ = editor.add_history_entry(&line);

                if trimmed == "help" || trimmed == "#help" {
                    print_help();
                    continue;
                }

                match session.execute(trimmed) {
                    Ok(true) => {}
                    Ok(false) => break,
                    Err(e) => output::print_error(&format!("{e}")),
                }
            }
            Err(ReadlineError::Interrupted) => {
                // Ctrl-C aborts only the prompt read.
                println!("(To exit, press Ctrl+D or type exit)");
                continue;
            }
            Err(ReadlineError::Eof) => {
                break;
            }
            Err(e) => {
                output::print_error(&format!("{e}"));
                break;
            }
        }
    }

    // Save history
    if let Some(ref path) = history_path {
        if let Some(parent) = path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        let _ = editor.save_history(path);
    }

    Ok(())
}

fn print_help() {
    println!("Commands:");
    println!("  <code>                    Compile and run C++ at the prompt");
    println!("  <name>                    Print a declared variable");
    println!("  #include <header>         Add a header to the session");
    println!("  #includedir <dir>         Add an include-search directory");
    println!("  #compilerdefine <macro>   Add a preprocessor definition");
    println!("  #lib <name>               Link a library into fragments");
    println!("  #eval <file>              Compile, load, and run a file");
    println!("  #lazyeval <file>          Like #eval, deferred until evalall");
    println!("  #batch_eval <files…>      Build several files as one object");
    println!("  #return <expr>            Evaluate and pretty-print");
    println!("  #loadprebuilt <path>      Load an existing shared object");
    println!("  printall                  Print every declared variable");
    println!("  evalall                   Run all deferred evaluations");
    println!("  exit                      Leave the REPL (also Ctrl-D)");
}
