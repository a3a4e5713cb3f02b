use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio::sync::Mutex;
use tracing::info;
use tracing_subscriber::EnvFilter;

use leasepool::{Config, DhcpServer, LeaseTable, Result, admin, snapshot};

#[derive(Parser)]
#[command(name = "leasepool")]
#[command(author, version, about = "A fixed-pool broadcast DHCP server", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "config.json")]
    config: PathBuf,

    #[arg(short, long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve DHCP until interrupted
    Run,
    /// Print the pool and server identity
    ShowConfig,
    /// Print the lease table
    ShowLeases,
    /// Swap two leases, addressed by final host octet
    MoveLease { from_octet: u8, to_octet: u8 },
    /// Clear one lease by final host octet, or "all"
    RemoveLease {
        #[arg(value_name = "OCTET|all")]
        octet: String,
    },
    /// Refuse or serve a client again, addressed by final host octet
    Ignore { octet: u8, ignore: bool },
    /// Change the lease duration handed to clients
    SetLeaseTime { seconds: u32 },
    /// Change the first host octet of the pool
    SetStart { octet: u8 },
    /// Change the number of pool addresses
    SetCount { count: u8 },
    /// Change the third-octet offset of pool addresses
    SetIncrement { increment: u8 },
    /// Write the lease table as JSON
    Export { path: PathBuf },
    /// Load the lease table from JSON
    Import { path: PathBuf },
}

async fn load_table(config: &Config) -> Result<LeaseTable> {
    snapshot::load_or_new(&config.snapshot_file, config.pool.clone()).await
}

async fn save_if_dirty(table: &mut LeaseTable, config: &Config) -> Result<()> {
    if table.dirty() {
        snapshot::save(table, &config.snapshot_file).await?;
        table.clear_dirty();
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level)),
        )
        .init();

    let config = Config::load_or_create(&cli.config)?;

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => {
            info!("Starting DHCP server with config: {:?}", cli.config);
            let leases = Arc::new(Mutex::new(load_table(&config).await?));
            let server = DhcpServer::new(&config, Arc::clone(&leases)).await?;

            tokio::select! {
                result = server.run() => result,
                _ = tokio::signal::ctrl_c() => {
                    info!("Received shutdown signal, stopping server...");
                    if let Err(error) = server.save_leases().await {
                        tracing::error!("Failed to save leases on shutdown: {}", error);
                    }
                    Ok(())
                }
            }
        }
        Commands::ShowConfig => {
            print!(
                "{}",
                admin::format_pool_summary(&config.pool, config.domain_name.as_deref())
            );
            Ok(())
        }
        Commands::ShowLeases => {
            let table = load_table(&config).await?;
            print!("{}", admin::format_lease_table(&table, 0));
            Ok(())
        }
        Commands::MoveLease {
            from_octet,
            to_octet,
        } => {
            let mut table = load_table(&config).await?;
            if admin::move_lease_by_octet(&mut table, from_octet, to_octet) {
                println!("Moved lease {} to {}.", from_octet, to_octet);
            } else {
                println!("No lease slots at those addresses.");
            }
            save_if_dirty(&mut table, &config).await
        }
        Commands::RemoveLease { octet } => {
            let mut table = load_table(&config).await?;
            if octet == "all" {
                table.clear();
                println!("Removed all leases.");
            } else {
                match octet.parse::<u8>() {
                    Ok(value) => {
                        if admin::remove_lease_by_octet(&mut table, value) {
                            println!("Removed lease at {}.", value);
                        } else {
                            println!("No lease slot at that address.");
                        }
                    }
                    Err(_) => println!("No lease slot at that address."),
                }
            }
            save_if_dirty(&mut table, &config).await
        }
        Commands::Ignore { octet, ignore } => {
            let mut table = load_table(&config).await?;
            if admin::set_ignore_by_octet(&mut table, octet, ignore) {
                println!("Ignore for {} set to {}.", octet, ignore);
            } else {
                println!("No lease slot at that address.");
            }
            save_if_dirty(&mut table, &config).await
        }
        Commands::SetLeaseTime { seconds } => {
            let mut table = load_table(&config).await?;
            if table.set_lease_duration(seconds) {
                println!("Lease time set to {} seconds.", seconds);
            } else {
                println!("Rejected lease time {}.", seconds);
            }
            save_if_dirty(&mut table, &config).await
        }
        Commands::SetStart { octet } => {
            let mut table = load_table(&config).await?;
            if table.set_start_octet(octet) {
                println!("Pool now starts at host octet {}.", octet);
            } else {
                println!("Rejected start octet {}.", octet);
            }
            save_if_dirty(&mut table, &config).await
        }
        Commands::SetCount { count } => {
            let mut table = load_table(&config).await?;
            if table.set_pool_size(count) {
                println!("Pool resized to {} addresses.", count);
            } else {
                println!("Rejected pool size {}.", count);
            }
            save_if_dirty(&mut table, &config).await
        }
        Commands::SetIncrement { increment } => {
            let mut table = load_table(&config).await?;
            if table.set_address_increment(increment) {
                println!("Address increment set to {}.", increment);
            } else {
                println!("Rejected address increment {}.", increment);
            }
            save_if_dirty(&mut table, &config).await
        }
        Commands::Export { path } => {
            let table = load_table(&config).await?;
            let json = admin::export_json(&table, 0)?;
            tokio::fs::write(&path, json).await?;
            println!("Exported lease table to {}.", path.display());
            Ok(())
        }
        Commands::Import { path } => {
            let mut table = load_table(&config).await?;
            let json = tokio::fs::read_to_string(&path).await?;
            admin::import_json(&mut table, &json)?;
            println!("Imported lease table from {}.", path.display());
            save_if_dirty(&mut table, &config).await
        }
    }
}
