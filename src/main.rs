use std::process::exit;

use colored::Colorize;

fn main() {
    if let Err(e) = kpibind::app::run_cli() {
        eprintln!("{} {e}", "[ERR]".red().bold());
        exit(1);
    }
}
