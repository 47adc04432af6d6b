//! cpprepl command-line interface
//!
//! Interactive REPL for C and C++: each prompt entry is compiled by the
//! platform compiler into a shared object, loaded into this process, and
//! executed, with declarations persisting across entries.

mod commands;
mod output;

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "cpprepl")]
#[command(about = "Interactive REPL for C and C++")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    #[command(flatten)]
    build: BuildArgs,
}

/// Toolchain and build configuration shared by every subcommand.
#[derive(Args, Clone)]
struct BuildArgs {
    /// C++ compiler executable
    #[arg(long, default_value = "clang++")]
    compiler: String,

    /// C compiler executable
    #[arg(long, default_value = "clang")]
    cc: String,

    /// C++ language standard
    #[arg(long = "std", default_value = "gnu++20")]
    cxx_std: String,

    /// Add an include-search directory
    #[arg(short = 'I', long = "includedir", value_name = "DIR")]
    include_dirs: Vec<PathBuf>,

    /// Add a preprocessor definition (NAME or NAME=VALUE)
    #[arg(short = 'D', long = "define", value_name = "MACRO")]
    defines: Vec<String>,

    /// Link a library into every fragment (without the lib prefix)
    #[arg(short = 'l', long = "lib", value_name = "NAME")]
    libs: Vec<String>,

    /// Artifact directory (defaults to the current directory)
    #[arg(long, value_name = "DIR")]
    work_dir: Option<PathBuf>,

    /// When to color output (auto, always, never)
    #[arg(long, default_value = "auto")]
    color: String,

    /// Echo binding and scheduling detail
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the interactive prompt (default)
    Repl,

    /// Compile, load, and execute source files, then exit
    Eval {
        /// Source files to evaluate, in order
        files: Vec<PathBuf>,

        /// Compile all files into a single shared object
        #[arg(long)]
        batch: bool,
    },
}

fn main() {
    let Cli { command, build } = Cli::parse();

    let result = match command {
        None | Some(Commands::Repl) => commands::repl::execute(&build),
        Some(Commands::Eval { files, batch }) => commands::eval::execute(&build, &files, batch),
    };

    if let Err(e) = result {
        output::print_error(&format!("{e:#}"));
        std::process::exit(1);
    }
}
