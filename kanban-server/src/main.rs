use std::process::ExitCode;

use kanban_server::config::ServerConfig;
use kanban_server::logging;

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(e) = logging::init() {
        logging::write_fallback_line(&format!("failed to initialize logger: {}", e));
    }

    let config = ServerConfig::load();
    match kanban_server::run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!(target: "kanban.server", "{}", e);
            ExitCode::FAILURE
        }
    }
}
