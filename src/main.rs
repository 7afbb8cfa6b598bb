fn main() {
    if let Err(err) = region_summary::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
