fn main() {
    #[cfg(feature = "cli")]
    oxibsdiff::cli::run();

    #[cfg(not(feature = "cli"))]
    {
        eprintln!("oxibsdiff: CLI not enabled. Rebuild with `--features cli`.");
        std::process::exit(1);
    }
}
