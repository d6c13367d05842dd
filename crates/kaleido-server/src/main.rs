use anyhow::Context;
use clap::{Arg, ArgAction, Command};
use kaleido_engine::{GenerationOptions, StrategyKind};
use kaleido_server::{routes, AppConfig, AppState};
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn cli() -> Command {
    Command::new("kaleido")
        .version(kaleido_server::VERSION)
        .about("Generates a fresh single-page website on every visit")
        .subcommand_required(true)
        .arg(
            Arg::new("config")
                .long("config")
                .global(true)
                .value_parser(clap::value_parser!(PathBuf))
                .help("TOML configuration file"),
        )
        .arg(
            Arg::new("log-json")
                .long("log-json")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Emit logs as JSON lines"),
        )
        .subcommand(
            Command::new("serve").about("Run the HTTP server").arg(
                Arg::new("bind")
                    .long("bind")
                    .value_parser(clap::value_parser!(SocketAddr))
                    .help("Listen address, overrides the configuration"),
            ),
        )
        .subcommand(
            Command::new("generate")
                .about("Generate one site and print or write it")
                .arg(
                    Arg::new("seed")
                        .long("seed")
                        .help("Seed for the site; a random id when omitted"),
                )
                .arg(Arg::new("hint").long("hint").help("Theme hint for the planner"))
                .arg(
                    Arg::new("strategy")
                        .long("strategy")
                        .value_parser(StrategyKind::ALL.map(StrategyKind::as_str))
                        .help("Pipeline to use instead of the configured one"),
                )
                .arg(
                    Arg::new("out")
                        .long("out")
                        .value_parser(clap::value_parser!(PathBuf))
                        .help("Write the document here instead of stdout"),
                ),
        )
        .subcommand(Command::new("strategies").about("List the available generation strategies"))
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let matches = cli().get_matches();
    init_tracing(matches.get_flag("log-json"));

    let config = AppConfig::load(matches.get_one::<PathBuf>("config").map(PathBuf::as_path))
        .context("loading configuration")?;

    match matches.subcommand() {
        Some(("serve", args)) => {
            let addr = match args.get_one::<SocketAddr>("bind") {
                Some(addr) => *addr,
                None => config
                    .bind
                    .parse()
                    .with_context(|| format!("invalid bind address {}", config.bind))?,
            };
            let state = AppState::from_config(&config)?;
            tracing::info!(%addr, version = kaleido_server::VERSION, "kaleido listening");
            warp::serve(routes(state)).run(addr).await;
        }
        Some(("generate", args)) => {
            let state = AppState::from_config(&config)?;
            let router = state.publisher.router();
            let kind = match args.get_one::<String>("strategy") {
                Some(name) => name.parse::<StrategyKind>()?,
                None => router.resolve().await,
            };
            let seed = args
                .get_one::<String>("seed")
                .cloned()
                .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
            let model = state.settings().model().await?.unwrap_or_else(|| config.openai.model.clone());
            let options = GenerationOptions::new()
                .with_render_model(model)
                .with_site_id(seed.clone())
                .with_controls(false);

            let hint = args.get_one::<String>("hint").map(String::as_str);
            let site = router.generate_with(kind, &seed, hint, &options).await?;
            tracing::info!(
                strategy = %site.strategy,
                input_tokens = site.usage.input_tokens,
                output_tokens = site.usage.output_tokens,
                "site generated"
            );
            match args.get_one::<PathBuf>("out") {
                Some(path) => std::fs::write(path, &site.html)
                    .with_context(|| format!("writing {}", path.display()))?,
                None => println!("{}", site.html),
            }
        }
        Some(("strategies", _)) => {
            for kind in StrategyKind::ALL {
                println!("{:<20} {}", kind.as_str(), kind.description());
            }
        }
        _ => unreachable!("a subcommand is required"),
    }
    Ok(())
}
