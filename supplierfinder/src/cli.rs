use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "supplierfinder")]
#[command(about = "Find suppliers by category and location and extract their legal name, INN and contacts")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Create default configuration file at ./config/supplierfinder.toml
    #[arg(long, global = true)]
    pub init: bool,

    /// Verbose logging (-v INFO, -vv DEBUG, -vvv TRACE); RUST_LOG overrides
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Configuration file (defaults to ./config/supplierfinder.toml)
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Search for companies in a category and location
    Search {
        /// What the companies make or sell, e.g. "мебель"
        category: String,

        /// City or region, e.g. "Казань"
        #[arg(default_value = "")]
        location: String,

        /// Output format: 'table' (default), 'json' or 'csv'
        #[arg(short, long, default_value = "table")]
        format: String,

        /// Write results to this file instead of stdout
        #[arg(short, long, value_name = "FILE")]
        output: Option<String>,

        /// Result pages to request (overrides config)
        #[arg(long, value_name = "N")]
        max_pages: Option<u32>,

        /// Stop after this many companies (overrides config)
        #[arg(long, value_name = "N")]
        cap: Option<usize>,

        /// Abort the whole search after this many seconds
        #[arg(long, value_name = "SECS")]
        timeout: Option<u64>,

        /// Fill missing phones from the company registry
        #[arg(long)]
        enrich: bool,

        /// Keep only companies meeting [registry.criteria]
        #[arg(long)]
        vet: bool,
    },

    /// Check INN checksums
    Validate {
        /// One or more INNs
        #[arg(required = true)]
        inns: Vec<String>,
    },

    /// Look up a company in the registry by INN
    Lookup {
        inn: String,

        /// Also report which [registry.criteria] the company fails
        #[arg(long)]
        check: bool,
    },

    /// Run extraction over a local HTML file
    Extract {
        file: String,
    },

    /// List the result URLs in a saved search backend response
    Decode {
        file: String,
    },
}

impl Cli {
    pub fn validate(&self) -> Result<(), String> {
        let Some(command) = &self.command else {
            if self.init {
                return Ok(());
            }
            return Err("A command is required (search, validate, lookup, extract or decode), or use --init".to_string());
        };

        match command {
            Commands::Search {
                category,
                format,
                max_pages,
                cap,
                timeout,
                ..
            } => {
                if category.trim().is_empty() {
                    return Err("Category cannot be empty".to_string());
                }
                if !["table", "json", "csv"].contains(&format.as_str()) {
                    return Err("Output format must be 'table', 'json' or 'csv'".to_string());
                }
                if *max_pages == Some(0) {
                    return Err("Max pages must be greater than 0".to_string());
                }
                if *cap == Some(0) {
                    return Err("Cap must be greater than 0".to_string());
                }
                if *timeout == Some(0) {
                    return Err("Timeout must be greater than 0".to_string());
                }
            }
            Commands::Validate { inns } => {
                if inns.iter().any(|inn| inn.trim().is_empty()) {
                    return Err("INN cannot be empty".to_string());
                }
            }
            Commands::Lookup { inn, .. } => {
                if inn.trim().is_empty() {
                    return Err("INN cannot be empty".to_string());
                }
            }
            Commands::Extract { file } | Commands::Decode { file } => {
                if file.is_empty() {
                    return Err("File path cannot be empty".to_string());
                }
            }
        }

        Ok(())
    }
}
