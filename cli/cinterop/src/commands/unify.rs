//! `cinterop unify`: merge AST documents into a bundle.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use cinterop_ast::persist::load_tree;
use cinterop_unify::{save_bundle, unify};

use super::summarize;

pub fn run(inputs: &[PathBuf], output: &Path, required: &[String]) -> Result<()> {
    let trees = inputs
        .iter()
        .map(|path| load_tree(path).with_context(|| format!("loading {}", path.display())))
        .collect::<Result<Vec<_>>>()?;
    let required: BTreeSet<String> = required.iter().cloned().collect();

    let unification = unify(&trees, &required);
    save_bundle(output, &unification.bundle).with_context(|| format!("writing {}", output.display()))?;

    let bundle = &unification.bundle;
    println!(
        "{}: {} agnostic, {} platform-specific declaration(s)",
        output.display(),
        bundle.agnostic.len(),
        bundle.specific_count()
    );
    println!("{}", summarize("unify", &unification.diagnostics));
    Ok(())
}
