use std::io::Write;

fn main() {
    // Route diagnostics to stderr; stdout belongs to the UCI protocol.
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
        .format(|buf, record| writeln!(buf, "info string [{}] {}", record.level(), record.args()))
        .init();

    riptide::uci::run_loop();
}
