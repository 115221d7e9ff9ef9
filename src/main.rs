use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use log::{debug, info};

use memberd::config::{CommonConfig, PathSet};
use memberd::server::config::ServerConfig;
use memberd::server::factory::ServerFactory;

/// Membership and events API server. Serves every configured resource under
/// `/api/{resource}`, with token sessions and ownership-aware authorization.
#[derive(Parser)]
#[command(author, version, about)]
struct ServerArgs {
    /// Directory holding `server.toml` and the `pki` directory.
    /// Default: $MEMBERD_CONFIG, or the user config directory.
    #[arg(long)]
    config_path: Option<PathBuf>,

    /// Directory holding the sqlite database.
    /// Default: $MEMBERD_DATA, or the user data directory.
    #[arg(long)]
    data_path: Option<PathBuf>,

    /// Print the completed configuration as JSON and exit.
    #[arg(long)]
    print_config: bool,
}

impl ServerArgs {
    async fn run(&self) -> Result<()> {
        let ps = PathSet::new(self.config_path.clone(), self.data_path.clone())?;
        let cfg: ServerConfig = ps.load_config("server", ServerConfig::default)?;

        if self.print_config {
            let json = serde_json::to_string_pretty(&cfg).context("encode config")?;
            println!("{json}");
            return Ok(());
        }

        cfg.logs.init()?;
        debug!("Use config: {cfg:?}");

        let factory = ServerFactory::new(cfg)?;
        if let Some(recycler) = factory.build_recycler() {
            recycler.start();
        }

        let srv = factory.build_server()?;
        info!("Starting memberd {}", env!("CARGO_PKG_VERSION"));
        srv.run().await
    }
}

#[actix_web::main]
async fn main() -> ExitCode {
    let args = ServerArgs::parse();
    match args.run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            _ = writeln!(io::stderr(), "Fatal: {err:#}");
            ExitCode::FAILURE
        }
    }
}
