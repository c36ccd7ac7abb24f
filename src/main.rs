fn main() {
    #[cfg(feature = "cli")]
    twopfx::cli::run();

    #[cfg(not(feature = "cli"))]
    {
        eprintln!("twopfx: CLI not enabled. Rebuild with `--features cli`.");
        std::process::exit(1);
    }
}
