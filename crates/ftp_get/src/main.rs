mod cli;

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use ftp_client::{ClientConfig, CnesPeriod, FtpClient, TransferRequest, cnes_request};
use tokio_util::sync::CancellationToken;

use crate::cli::{Cli, Commands};

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    match run(cli).await {
        Ok(bytes) => {
            println!("{}", bytes);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("\nERROR:");
            eprintln!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<u64> {
    let mut config = ClientConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;
    if let Some(port) = cli.port {
        config.port = port;
    }
    if cli.no_progress {
        config.progress_enabled = false;
    }

    let mut client = FtpClient::new(config);

    let token = CancellationToken::new();
    let ctrl_c = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrl_c.cancel();
        }
    });

    let outcome = execute(&mut client, cli.command, &token).await;

    if let Err(e) = client.close().await {
        log::warn!("Failed to properly close FTP connection: {}", e);
    }

    outcome
}

async fn execute(client: &mut FtpClient, command: Commands, token: &CancellationToken) -> Result<u64> {
    match command {
        Commands::Get { file, dir, output, server } => {
            let request = build_request(file, dir, output, server);
            let bytes = client
                .get_with_cancel(&request, token)
                .await
                .with_context(|| format!("Failed to download {}", request.remote_path()))?;
            Ok(bytes)
        }
        Commands::Size { file, dir, server } => {
            let request = build_request(file, dir, None, server);
            let bytes = client
                .size(&request)
                .await
                .with_context(|| format!("Failed to query size of {}", request.remote_path()))?;
            Ok(bytes)
        }
        Commands::Cnes { period, output } => {
            let period = match period {
                Some(period) => period.parse::<CnesPeriod>()?,
                None => CnesPeriod::current(),
            };
            let mut request = cnes_request(period);
            if let Some(output) = output {
                request = request.save_to(output);
            }
            log::info!("Fetching CNES dump for {}", period);
            let bytes = client
                .get_with_cancel(&request, token)
                .await
                .with_context(|| format!("Failed to download CNES dump {}", period))?;
            Ok(bytes)
        }
    }
}

fn build_request(
    file: String,
    dir: String,
    output: Option<std::path::PathBuf>,
    server: Option<String>,
) -> TransferRequest {
    let mut request = TransferRequest::new(file).in_dir(dir);
    if let Some(output) = output {
        request = request.save_to(output);
    }
    if let Some(server) = server {
        request = request.on_server(server);
    }
    request
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_build_request_defaults() {
        let request = build_request("BASE.ZIP".to_string(), String::new(), None, None);
        assert_eq!(request.remote_path(), "BASE.ZIP");
        assert_eq!(request.destination(), PathBuf::from("BASE.ZIP"));
        assert_eq!(request.server, None);
    }

    #[test]
    fn test_build_request_overrides() {
        let request = build_request(
            "BASE.ZIP".to_string(),
            "/cnes/".to_string(),
            Some(PathBuf::from("x.ftp")),
            Some("ftp.example.com".to_string()),
        );
        assert_eq!(request.remote_path(), "/cnes/BASE.ZIP");
        assert_eq!(request.destination(), PathBuf::from("x.ftp"));
        assert_eq!(request.server.as_deref(), Some("ftp.example.com"));
    }
}
