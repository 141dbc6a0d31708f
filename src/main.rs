fn main() {
    if let Err(err) = social_insight::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
