use std::{env, error::Error, fs, path::Path, process};

use funwap::{parser::parse_program, util::fmt::tree};

fn main() {
    if let Err(error) = run() {
        eprintln!("{error}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn Error>> {
    let Some(arg) = env::args().nth(1) else {
        return Err("usage: funwap <file.funwap>".into());
    };
    let path = Path::new(&arg);
    if path.extension().and_then(|ext| ext.to_str()) != Some("funwap") {
        return Err(format!("{}: expected a \".funwap\" source file", path.display()).into());
    }
    let src = fs::read_to_string(path)?;
    let program = parse_program(&src)?;
    print!("{}", tree::print_program_string(&program));
    Ok(())
}
