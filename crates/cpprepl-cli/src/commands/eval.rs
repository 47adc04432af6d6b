//! `cpprepl eval` — one-shot file evaluation.

use std::path::PathBuf;

use crate::commands::create_session;
use crate::output;
use crate::BuildArgs;

pub fn execute(args: &BuildArgs, files: &[PathBuf], batch: bool) -> anyhow::Result<()> {
    if files.is_empty() {
        anyhow::bail!("no input files");
    }

    let mut session = create_session(args)?;

    if batch && files.len() > 1 {
        let mut line = String::from("#batch_eval");
        for file in files {
            line.push(' ');
            line.push_str(&file.display().to_string());
        }
        session.execute(&line)?;
    } else {
        for file in files {
            output::print_hint(&format!("eval: {}", file.display()));
            session.execute(&format!("#eval {}", file.display()))?;
        }
    }

    Ok(())
}
