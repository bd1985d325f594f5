fn main() {
    if let Err(e) = termpal::cli::main() {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
