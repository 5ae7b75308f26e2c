fn main() {
    if let Err(e) = dr_duck::run() {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
