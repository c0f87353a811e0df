//! The `expand` command: print a module with its sugar expanded.

use crate::pipeline::{expand_module, read_module};

use super::{read_file, report};

pub fn expand_file(path: &str) {
    let content = read_file(path);
    match read_module(&content).and_then(|form| expand_module(&form)) {
        Ok(expanded) => println!("{expanded}"),
        Err(diag) => {
            report(path, &content, &[diag]);
            std::process::exit(1);
        }
    }
}
