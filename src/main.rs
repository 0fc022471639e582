use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::net::TcpListener;
use tracing::info;

use kitchenhub_lib::{
    config::Config,
    logging, migrate,
    outbound::{EmailTransport, SmsProvider, SmtpMailer, TwilioSms},
    server::{router, ServerState},
};

#[derive(Debug, Parser)]
#[command(name = "kitchenhub", about = "Household meal coordination service", version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run the outbound-notification endpoints.
    Serve {
        /// Override the configured bind port.
        #[arg(long)]
        port: Option<u16>,
    },
    /// Apply pending database migrations and exit.
    Migrate,
}

#[tokio::main]
async fn main() -> Result<()> {
    logging::init();
    let cli = Cli::parse();
    let config = Config::load();

    match cli.command.unwrap_or(Commands::Serve { port: None }) {
        Commands::Migrate => {
            let pool = migrate::init_db(&config.db_path)
                .await
                .context("initialize database")?;
            pool.close().await;
            info!(target: "kitchenhub", "migrations up to date");
            Ok(())
        }
        Commands::Serve { port } => serve(config, port).await,
    }
}

async fn serve(config: Config, port_override: Option<u16>) -> Result<()> {
    let pool = migrate::init_db(&config.db_path)
        .await
        .context("initialize database")?;

    let mailer: Option<Arc<dyn EmailTransport>> = match &config.smtp {
        Some(smtp) => Some(Arc::new(
            SmtpMailer::new(smtp).context("configure SMTP transport")?,
        )),
        None => None,
    };
    let sms: Option<Arc<dyn SmsProvider>> = config
        .twilio
        .clone()
        .map(|twilio| Arc::new(TwilioSms::new(twilio)) as Arc<dyn SmsProvider>);

    let state = ServerState {
        pool,
        mailer,
        sms,
        require_email_auth: config.require_email_auth,
    };
    let app = router(state);

    let port = port_override.unwrap_or(config.port);
    let listener = TcpListener::bind(("0.0.0.0", port))
        .await
        .with_context(|| format!("bind port {port}"))?;
    info!(target: "kitchenhub", port, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serve")?;
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!(target: "kitchenhub", "shutting down");
    }
}
