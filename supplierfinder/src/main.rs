use anyhow::{anyhow, Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

use supplierfinder::cli::{Cli, Commands};
use supplierfinder::config::{self, AppConfig};
use supplierfinder::export;
use supplierfinder::extractor;
use supplierfinder::inn;
use supplierfinder::logger::{self, VerbosityLevel};
use supplierfinder::registry::{self, RegistryClient};
use supplierfinder::result_set;
use supplierfinder::SearchOrchestrator;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    logger::init_tracing(VerbosityLevel::from_verbose_count(cli.verbose));

    if let Err(e) = cli.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(2);
    }

    let config_path = cli
        .config
        .as_deref()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(config::CONFIG_PATH));

    // Handle --init flag first (before any other processing)
    if cli.init {
        let path = AppConfig::create_default_config(&config_path)
            .with_context(|| format!("Failed to create configuration file at {}", config_path.display()))?;
        println!("Created default configuration file at: {}", path.display());
        println!("Edit this file to set API keys and limits, then run supplierfinder again.");
        if cli.command.is_none() {
            return Ok(());
        }
    }

    let Some(command) = cli.command else {
        return Ok(());
    };

    match command {
        Commands::Validate { inns } => run_validate(&inns),
        Commands::Extract { file } => run_extract(Path::new(&file)),
        Commands::Decode { file } => run_decode(Path::new(&file)),
        Commands::Lookup { inn, check } => {
            let app_config = load_config(&config_path)?;
            run_lookup(&app_config, &inn, check).await
        }
        Commands::Search {
            category,
            location,
            format,
            output,
            max_pages,
            cap,
            timeout,
            enrich,
            vet,
        } => {
            let app_config = load_config(&config_path)?;
            let lookup_client = if enrich || vet {
                Some(registry_client(&app_config)?)
            } else {
                None
            };
            let orchestrator = SearchOrchestrator::new(&app_config)?.with_limits(max_pages, cap);
            let query = orchestrator.build_query(&category, &location);

            let search = orchestrator.search_session(&category, &location);
            let session = match timeout {
                Some(secs) => tokio::time::timeout(Duration::from_secs(secs), search)
                    .await
                    .map_err(|_| anyhow!("Search timed out after {} seconds", secs))??,
                None => search.await?,
            };

            let stats = session.stats();
            let mut companies = session.into_companies();

            if let Some(client) = lookup_client {
                let profiles = client.lookup_all(&companies).await;
                if enrich {
                    let filled = registry::enrich_company_data(&mut companies, &profiles);
                    info!("Filled contacts of {} companies from the registry", filled);
                }
                if vet {
                    let before = companies.len();
                    companies = registry::validate_companies(companies, &profiles, &app_config.registry.criteria);
                    info!("{} of {} companies meet the registry criteria", companies.len(), before);
                }
            }

            write_results(&companies, &query, &format, output.as_deref())?;
            export::print_search_summary(&query, &companies, &stats);
            Ok(())
        }
    }
}

fn load_config(path: &Path) -> Result<AppConfig> {
    match AppConfig::load_from_path(path) {
        Ok(cfg) => Ok(cfg),
        Err(config::ConfigError::FileNotFound(path)) => {
            eprintln!("Configuration file not found at: {}", path.display());
            eprintln!("Run with --init to create a default configuration file.");
            std::process::exit(1);
        }
        Err(e) => Err(e).context("Failed to load configuration"),
    }
}

fn write_results(
    companies: &export::Companies,
    query: &str,
    format: &str,
    output: Option<&str>,
) -> Result<()> {
    match (format, output) {
        ("json", Some(path)) => export::export_json(companies, query, path),
        ("json", None) => export::write_json(companies, query, std::io::stdout().lock()),
        ("csv", Some(path)) => export::export_csv(companies, path),
        ("csv", None) => export::write_csv(companies, std::io::stdout().lock()),
        (_, Some(path)) => {
            std::fs::write(path, export::render_table(companies))?;
            Ok(())
        }
        (_, None) => {
            print!("{}", export::render_table(companies));
            Ok(())
        }
    }
}

fn run_validate(inns: &[String]) -> Result<()> {
    let mut all_valid = true;
    for value in inns {
        let value = value.trim();
        match inn::classify_inn(value) {
            Some(kind) => println!("{}\tvalid\t{}", value, kind),
            None => {
                all_valid = false;
                println!("{}\tinvalid", value);
            }
        }
    }

    if !all_valid {
        std::process::exit(1);
    }
    Ok(())
}

fn run_extract(path: &Path) -> Result<()> {
    let html = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let text = extractor::html_to_text(&html);
    debug!("Extracting from {} characters of page text", text.chars().count());

    let partial = extractor::extract(&text);
    println!("{}", serde_json::to_string_pretty(&partial)?);
    if !partial.is_admissible() {
        eprintln!("Page would not be admitted: a legal name and a valid INN are both required.");
    }
    Ok(())
}

fn run_decode(path: &Path) -> Result<()> {
    let payload = std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let urls = result_set::decode_result_set(&payload);
    for url in &urls {
        println!("{}", url);
    }
    if urls.is_empty() {
        eprintln!("No result URLs in {}", path.display());
    }
    Ok(())
}

fn registry_client(app_config: &AppConfig) -> Result<RegistryClient> {
    if !app_config.registry.enabled {
        return Err(anyhow!(
            "Registry lookups are disabled; set [registry] enabled = true in the configuration"
        ));
    }
    Ok(RegistryClient::new(&app_config.registry)?)
}

async fn run_lookup(app_config: &AppConfig, inn_value: &str, check: bool) -> Result<()> {
    let client = registry_client(app_config)?;
    if !inn::validate_inn(inn_value) {
        return Err(anyhow!("{} is not a valid INN", inn_value));
    }

    let profile = client
        .fetch_profile(inn_value)
        .await
        .with_context(|| format!("Registry lookup for {} failed", inn_value))?;
    println!("{}", serde_json::to_string_pretty(&profile)?);

    if check {
        let mismatches = profile.check_criteria(&app_config.registry.criteria);
        if mismatches.is_empty() {
            eprintln!("Meets all registry criteria.");
        } else {
            for mismatch in &mismatches {
                eprintln!("Fails {}", mismatch);
            }
            std::process::exit(1);
        }
    }
    Ok(())
}
