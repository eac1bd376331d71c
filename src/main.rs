use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use tokio::sync::broadcast;
use tracing::info;
use tracing_subscriber::EnvFilter;

use flight_surety::config::{load_networks, Config};
use flight_surety::dapp::{self, FlightBook, Row, Section};
use flight_surety::node::{self, RelayNode};
use flight_surety::oracle::{RegistrationPolicy, StartBlock, StatusStrategy};
use flight_surety::types::{Address, Flight, U256};
use flight_surety::ApiServer;

#[derive(Parser)]
#[command(name = "flight-surety")]
#[command(about = "Oracle relay and passenger client for FlightSurety", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (TOML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Deployment file in the dapp's config.json format
    #[arg(long, global = true)]
    networks: Option<PathBuf>,

    /// Network to use
    #[arg(short, long, global = true)]
    network: Option<String>,

    /// Log level, overridden by RUST_LOG
    #[arg(short, long, global = true)]
    log_level: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Register oracles and answer flight status requests
    Relay {
        /// Number of accounts to register as oracles
        #[arg(long)]
        pool_size: Option<usize>,

        /// "earliest", "latest" or a block number
        #[arg(long)]
        start_block: Option<StartBlock>,

        /// Ignore the stored checkpoint
        #[arg(long)]
        no_resume: bool,

        /// Skip accounts that fail to register instead of aborting
        #[arg(long)]
        skip_failed: bool,

        /// Reuse accounts registered by an earlier run
        #[arg(long)]
        adopt_existing: bool,

        /// Draw a separate status code for every oracle
        #[arg(long)]
        per_oracle_status: bool,

        /// Do not serve the HTTP API
        #[arg(long)]
        no_api: bool,
    },

    /// Serve only the HTTP API
    Api {
        #[arg(long)]
        port: Option<u16>,
    },

    /// Passenger and airline operations
    Dapp {
        #[command(subcommand)]
        command: DappCommands,
    },

    /// Configuration utilities
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(clap::Args, Clone)]
struct FlightArgs {
    /// Flight name
    #[arg(long)]
    flight: String,

    /// Departure timestamp used at registration
    #[arg(long)]
    timestamp: u64,

    /// Airline address, defaults to the first airline account
    #[arg(long)]
    airline: Option<Address>,
}

#[derive(Subcommand)]
enum DappCommands {
    /// Operational status of both contracts
    Status,
    /// Register a flight for the first airline
    RegisterFlight {
        #[arg(long)]
        name: String,
    },
    /// Flights registered from this machine
    Flights,
    /// Buy insurance for a flight as the first passenger
    Buy {
        /// Flight name
        #[arg(long)]
        flight: String,
        /// Premium in wei
        #[arg(long)]
        amount: u128,
    },
    /// Show the passenger's credit
    Credit,
    /// Withdraw the passenger's credit
    Withdraw,
    /// Ask the oracles for a flight's status
    FetchStatus {
        #[command(flatten)]
        flight: FlightArgs,
    },
    /// Read a flight's recorded status
    FlightStatus {
        #[command(flatten)]
        flight: FlightArgs,
    },
    /// Operational status, then register F1 to F4
    Demo,
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Write a default configuration file
    Init {
        #[arg(short, long, default_value = "flight-surety.toml")]
        path: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Print the effective configuration
    Show,
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = Config::load(cli.config.as_deref())?;

    if let Some(path) = &cli.networks {
        config.networks.extend(load_networks(path)?);
    }
    if let Some(network) = &cli.network {
        config.network = network.clone();
    }

    config.validate()?;
    Ok(config)
}

fn init_logging(cli: &Cli, config: Option<&Config>) {
    let level = cli
        .log_level
        .clone()
        .or_else(|| config.map(|c| c.log.level.clone()))
        .unwrap_or_else(|| "info".to_string());

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&level));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Commands::Config {
        command: ConfigCommands::Init { path, force },
    } = &cli.command
    {
        init_logging(&cli, None);
        return init_config(path, *force);
    }

    let mut config = load_config(&cli)?;
    init_logging(&cli, Some(&config));

    match &cli.command {
        Commands::Relay {
            pool_size,
            start_block,
            no_resume,
            skip_failed,
            adopt_existing,
            per_oracle_status,
            no_api,
        } => {
            if let Some(pool_size) = pool_size {
                config.relay.pool_size = *pool_size;
            }
            if let Some(start_block) = start_block {
                config.relay.start_block = *start_block;
            }
            if *no_resume {
                config.relay.resume = false;
            }
            if *skip_failed {
                config.relay.registration_policy = RegistrationPolicy::Skip;
            }
            if *adopt_existing {
                config.relay.adopt_existing = true;
            }
            if *per_oracle_status {
                config.relay.status_strategy = StatusStrategy::PerOracle;
            }
            if *no_api {
                config.api.enabled = false;
            }
            config.validate()?;

            let node = RelayNode::new(config)?;
            let summary = node.run_until_ctrl_c().await?;
            info!(
                requests = summary.requests,
                submissions = summary.submissions,
                failed = summary.failed_submissions,
                "Relay finished"
            );
        }

        Commands::Api { port } => {
            if let Some(port) = port {
                config.api.port = *port;
            }
            run_api(&config).await?;
        }

        Commands::Dapp { command } => run_dapp(&config, command).await?,

        Commands::Config { command } => match command {
            ConfigCommands::Show => print!("{}", config.to_toml()?),
            ConfigCommands::Init { .. } => unreachable!("handled before configuration is loaded"),
        },
    }

    Ok(())
}

fn init_config(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        anyhow::bail!("{} already exists, pass --force to overwrite", path.display());
    }
    Config::default().to_file(path)?;
    info!("Wrote default configuration to {}", path.display());
    Ok(())
}

async fn run_api(config: &Config) -> Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.api.host, config.api.port)
        .parse()
        .context("Invalid API listen address")?;
    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = shutdown_tx.send(());
        }
    });

    ApiServer::new(addr, prometheus::Registry::new())
        .run(shutdown_rx)
        .await
        .context("HTTP API failed")
}

async fn run_dapp(config: &Config, command: &DappCommands) -> Result<()> {
    let book = FlightBook::new(config.flights_path());
    let client = node::dapp_client(config).await?.with_flights(book.load()?);
    let flight = |args: &FlightArgs| {
        Flight::new(
            args.airline.unwrap_or_else(|| client.roles().airline()),
            args.flight.clone(),
            U256::from(args.timestamp),
        )
    };

    let sections = match command {
        DappCommands::Status => vec![Section::new(
            "Operational Status",
            vec![
                Row::new("App operational", client.is_operational().await),
                Row::new("Data operational", client.data_operational().await),
            ],
        )],
        DappCommands::RegisterFlight { name } => {
            let failures = match client.register_flight(name).await {
                Ok(_) => Vec::new(),
                Err(e) => vec![Row::new::<String, _>(format!("Flight {}", name), Err(e))],
            };
            vec![Section::new(
                "Available flights",
                dapp::flight_rows(&client.flights(), failures),
            )]
        }
        DappCommands::Flights => vec![Section::new(
            "Available flights",
            dapp::flight_rows(&client.flights(), Vec::new()),
        )],
        DappCommands::Buy { flight: name, amount } => {
            let result = client.buy_insurance(name, U256::from(*amount)).await;
            vec![Section::new(
                "Bought insurance",
                vec![Row::new(
                    format!("Flight {} payment", name),
                    result.map(|_| amount.to_string()),
                )],
            )]
        }
        DappCommands::Credit => vec![Section::new(
            "Credit",
            vec![Row::new("current credit", client.get_credit().await)],
        )],
        DappCommands::Withdraw => vec![Section::new(
            "Withdraw credit",
            vec![Row::new(
                "status",
                client.withdraw_credit().await.map(|_| "success"),
            )],
        )],
        DappCommands::FetchStatus { flight: args } => {
            let result = client.fetch_flight_status(&flight(args)).await;
            vec![Section::new(
                "Oracles",
                vec![Row::new(
                    "Fetch Flight Status",
                    result.map(|_| format!("{} {}", args.flight, args.timestamp)),
                )],
            )]
        }
        DappCommands::FlightStatus { flight: args } => {
            let result = client.flight_status(&flight(args)).await;
            vec![Section::new(
                "Flight status",
                vec![Row::new(
                    format!("Flight {}", args.flight),
                    result.map(|status| status.label()),
                )],
            )]
        }
        DappCommands::Demo => dapp::demo(&client).await,
    };

    if matches!(command, DappCommands::RegisterFlight { .. } | DappCommands::Demo) {
        book.save(&client.flights())?;
    }

    for section in sections {
        println!("{}", section);
    }
    Ok(())
}
