pub mod advisor;
pub mod cli;
pub mod config;
pub mod llm;
pub mod models;
pub mod sanitize;
pub mod server;

use advisor::Advisor;
use cli::{ Args, Command };
use log::info;
use server::Server;
use std::error::Error;
use std::sync::Arc;

pub async fn run(args: Args) -> Result<(), Box<dyn Error + Send + Sync>> {
    info!("--- Core Configuration ---");
    info!("Server Address: {}", args.server_addr);
    info!("Chat LLM Type: {}", args.chat_llm_type);
    info!("Chat Base URL: {}", args.chat_base_url.as_deref().unwrap_or("adapter default"));
    info!("Chat Model: {}", args.chat_model);
    info!("Prompts Path: {}", args.prompts_path.as_deref().unwrap_or("built-in"));
    info!("TLS Enabled: {}", args.enable_tls);
    info!("-------------------------");

    let advisor = Arc::new(Advisor::from_args(&args)?);

    match args.command.clone().unwrap_or(Command::Serve) {
        Command::Serve => {
            let addr = args.server_addr.clone();
            info!("Starting server on: {}", addr);
            let server = Server::new(addr, advisor, args);
            server.run().await?;
        }
        Command::Probe { interactive, stream } => {
            cli::probe::run(&advisor, interactive, stream).await?;
        }
    }

    Ok(())
}
