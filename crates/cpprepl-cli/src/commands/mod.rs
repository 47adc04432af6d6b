//! CLI subcommands.

pub mod eval;
pub mod repl;

use std::path::PathBuf;

use cpprepl_runtime::{RuntimeOptions, Session};

use crate::output::resolve_color_choice;
use crate::BuildArgs;

/// Construct a session from the shared CLI build arguments.
pub fn create_session(args: &BuildArgs) -> anyhow::Result<Session> {
    let options = RuntimeOptions {
        cxx_compiler: args.compiler.clone(),
        c_compiler: args.cc.clone(),
        cxx_std: args.cxx_std.clone(),
        work_dir: args
            .work_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(".")),
        color: resolve_color_choice(&args.color),
        verbose: args.verbose,
        ..Default::default()
    };

    let mut session = Session::new(options)?;
    for dir in &args.include_dirs {
        session.add_include_dir(dir.clone());
    }
    for def in &args.defines {
        session.add_definition(def.clone());
    }
    for lib in &args.libs {
        session.add_link_library(lib.clone());
    }
    Ok(session)
}
