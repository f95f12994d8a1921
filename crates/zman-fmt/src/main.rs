use std::env;
use std::fs;
use std::path::PathBuf;
use std::process;

use zman_syntax::error::ErrorList;

fn main() {
    let mut args = env::args().skip(1).collect::<Vec<_>>();
    if args.is_empty() || args.iter().any(|a| a == "-h" || a == "--help") {
        eprintln!("Usage: zman-fmt [--check|--write] <formula-file>");
        process::exit(2);
    }
    let mut check = false;
    let mut write = false;
    let mut file = None;
    while let Some(a) = args.first().cloned() {
        args.remove(0);
        match a.as_str() {
            "--check" => check = true,
            "--write" => write = true,
            _ => {
                file = Some(PathBuf::from(a));
                break;
            }
        }
    }
    let Some(file) = file else {
        eprintln!("zman-fmt: no input file");
        process::exit(2);
    };
    let src = fs::read_to_string(&file).unwrap_or_else(|e| {
        eprintln!("{}: {}", file.display(), e);
        process::exit(1)
    });

    let formatted = format_formula(&src).unwrap_or_else(|errors| {
        eprintln!("{}", errors.render());
        process::exit(1)
    });

    if check {
        if normalize_newlines(&formatted) != normalize_newlines(&src) {
            eprintln!("{}: not formatted", file.display());
            process::exit(1);
        }
        println!("{}: ok", file.display());
    } else if write {
        if let Err(e) = fs::write(&file, formatted) {
            eprintln!("{}: {}", file.display(), e);
            process::exit(1);
        }
    } else {
        print!("{}", formatted);
    }
}

fn normalize_newlines(s: &str) -> String {
    s.replace("\r\n", "\n")
}

/// Canonical text of a formula: single spaces around operators, minimal
/// parentheses, one line, trailing newline. Comments are not kept.
fn format_formula(src: &str) -> Result<String, ErrorList> {
    let ast = zman_parser::parse(src).map_err(|e| e.with_source(src))?;
    Ok(format!("{}\n", ast))
}
