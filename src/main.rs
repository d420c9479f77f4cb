//! RAX FTP Client - Entry Point
//!
//! Usage: `rax-ftp-client [user:password@host[:port]]`

use log::info;
use tokio::io::BufReader;

use rax_ftp_client::client::run_shell;
use rax_ftp_client::error::report_error;
use rax_ftp_client::utils::logging::setup_logging;
use rax_ftp_client::{ClientConfig, FtpClientError, FtpSession};

#[tokio::main]
async fn main() {
    setup_logging();

    if let Err(e) = run().await {
        report_error(&e);
        std::process::exit(1);
    }
}

async fn run() -> Result<(), FtpClientError> {
    let mut config = ClientConfig::load()?;
    if let Some(target) = std::env::args().nth(1) {
        config.connection.apply_target(&target)?;
    }

    info!("Launching FTP client...");
    let mut session = FtpSession::connect(&config).await?;
    println!("{}", session.control().greeting());

    run_shell(&mut session, BufReader::new(tokio::io::stdin())).await
}
