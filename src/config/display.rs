use super::types::Config;

/// Prints a colored startup dashboard summarizing the loaded configuration,
/// the way an admin would want to eyeball it before traffic starts flowing.
pub fn display_config(config: &Config) {
    println!("\x1b[36m=== webserv configuration ===\x1b[0m");
    println!(
        "error_log: {} ({})",
        config.main.error_log, config.main.error_log_level
    );
    println!("worker_connections: {}", config.main.worker_connections);

    for server in &config.servers {
        let listens: Vec<String> = server
            .listen
            .iter()
            .map(|l| format!("{}:{}", l.ip, l.port))
            .collect();
        println!(
            "\x1b[32mserver\x1b[0m {} [{}]{}",
            server.server_name,
            listens.join(", "),
            if server.default_server { " (default)" } else { "" }
        );
        for route in &server.routes {
            println!(
                "  location {} -> root={} methods={:?}",
                route.path, route.root, route.methods
            );
        }
    }
    println!("\x1b[36m=============================\x1b[0m");
}
