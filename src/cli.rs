use std::error::Error;

use clap::{Parser, Subcommand};
use serde_json::json;

use plantarium::{BackendConfig, HttpBackend, Plant, TRAVERSAL_DEPTH, TaxonomyBackend};

#[derive(Parser, Debug)]
#[command(name = "plantarium", about = "Search and explore the plant thesaurus", version)]
pub struct Cli {
    /// Emit JSON instead of human-readable tables.
    #[arg(long, global = true)]
    json: bool,

    /// Base URL of the search/graph service.
    #[arg(
        long,
        global = true,
        env = "PLANTARIUM_BACKEND",
        default_value = "http://localhost:1234"
    )]
    backend: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Search entries by term.
    Search {
        /// Term to search for.
        term: String,
    },
    /// List the entries related to a descriptor.
    Related {
        /// Descriptor of the entry to expand.
        descriptor: String,
    },
    /// Walk the broader/narrower hierarchy for a descriptor.
    Hierarchy {
        /// Descriptor of the synonym to walk from.
        descriptor: String,
    },
    /// Serve the web explorer.
    #[cfg(feature = "web")]
    Serve {
        /// Address to bind.
        #[arg(long, default_value = "127.0.0.1:8080")]
        addr: std::net::SocketAddr,
        /// Visual theme for the explorer pages.
        #[arg(long, value_enum, default_value = "tailwind")]
        theme: ThemeArg,
    },
}

#[cfg(feature = "web")]
#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum ThemeArg {
    Tailwind,
    Bootstrap,
}

#[cfg(feature = "web")]
impl From<ThemeArg> for plantarium::web::WebTheme {
    fn from(value: ThemeArg) -> Self {
        match value {
            ThemeArg::Tailwind => plantarium::web::WebTheme::Tailwind,
            ThemeArg::Bootstrap => plantarium::web::WebTheme::Bootstrap,
        }
    }
}

pub async fn run() -> Result<(), Box<dyn Error>> {
    init_tracing();
    let cli = Cli::parse();
    let backend = HttpBackend::new(BackendConfig {
        base_url: cli.backend.clone(),
    });
    match cli.command {
        Command::Search { term } => handle_search(&backend, &term, cli.json).await,
        Command::Related { descriptor } => handle_related(&backend, &descriptor, cli.json).await,
        Command::Hierarchy { descriptor } => {
            handle_hierarchy(&backend, &descriptor, cli.json).await
        }
        #[cfg(feature = "web")]
        Command::Serve { addr, theme } => {
            plantarium::web::serve(plantarium::web::WebConfig {
                addr,
                theme: theme.into(),
                backend: BackendConfig {
                    base_url: cli.backend,
                },
            })
            .await?;
            Ok(())
        }
    }
}

fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn handle_search(backend: &HttpBackend, term: &str, as_json: bool) -> Result<(), Box<dyn Error>> {
    if term.trim().is_empty() {
        return Err("Search term cannot be empty".into());
    }
    let entries = backend.search(term).await?;
    let plants = plantarium::normalize(&entries)?;

    if as_json {
        let payload = json!({ "term": term, "results": plants });
        println!("{}", serde_json::to_string_pretty(&payload)?);
    } else {
        print_result_table(term, &plants);
    }
    Ok(())
}

async fn handle_related(
    backend: &HttpBackend,
    descriptor: &str,
    as_json: bool,
) -> Result<(), Box<dyn Error>> {
    let entries = backend.related(descriptor, TRAVERSAL_DEPTH).await?;

    if as_json {
        let payload = json!({
            "descriptor": descriptor,
            "depth": TRAVERSAL_DEPTH,
            "result": entries,
        });
        println!("{}", serde_json::to_string_pretty(&payload)?);
    } else {
        let rows: Vec<Plant> = entries.iter().map(|entry| entry.display_fields()).collect();
        print_synonym_table(descriptor, &rows);
    }
    Ok(())
}

async fn handle_hierarchy(
    backend: &HttpBackend,
    descriptor: &str,
    as_json: bool,
) -> Result<(), Box<dyn Error>> {
    let entries = backend.hierarchy(descriptor, TRAVERSAL_DEPTH).await?;
    let chain = plantarium::display_order(plantarium::normalize(&entries)?);

    if as_json {
        let payload = json!({
            "descriptor": descriptor,
            "depth": TRAVERSAL_DEPTH,
            "hierarchy": chain,
        });
        println!("{}", serde_json::to_string_pretty(&payload)?);
    } else {
        print_hierarchy(descriptor, &chain);
    }
    Ok(())
}

fn print_result_table(term: &str, rows: &[Plant]) {
    if rows.is_empty() {
        println!("No results for \"{term}\".");
        return;
    }
    let id_width = rows
        .iter()
        .map(|plant| plant.descriptor.len())
        .max()
        .unwrap_or(4)
        .max("DESCRIPTOR".len());
    let label_width = rows
        .iter()
        .map(|plant| plant.result_caption().len())
        .max()
        .unwrap_or(5)
        .max("ENTRY".len());
    println!("Matches for \"{term}\":");
    println!(
        "{:<id_width$}  {:<label_width$}  {}",
        "DESCRIPTOR", "ENTRY", "DETAIL"
    );
    println!("{:-<id_width$}  {:-<label_width$}  ------", "", "");
    for plant in rows {
        println!(
            "{:<id_width$}  {:<label_width$}  {}",
            plant.descriptor,
            plant.result_caption(),
            plant.result_detail()
        );
    }
}

fn print_synonym_table(descriptor: &str, rows: &[Plant]) {
    if rows.is_empty() {
        println!("No synonyms found for \"{descriptor}\".");
        return;
    }
    let id_width = rows
        .iter()
        .map(|plant| plant.descriptor.len())
        .max()
        .unwrap_or(4)
        .max("DESCRIPTOR".len());
    let label_width = rows
        .iter()
        .map(|plant| plant.pref_label.len())
        .max()
        .unwrap_or(7)
        .max("SYNONYM".len());
    println!("Synonyms of \"{descriptor}\":");
    println!(
        "{:<id_width$}  {:<label_width$}  {}",
        "DESCRIPTOR", "SYNONYM", "DETAIL"
    );
    println!("{:-<id_width$}  {:-<label_width$}  ------", "", "");
    for plant in rows {
        println!(
            "{:<id_width$}  {:<label_width$}  {}",
            plant.descriptor,
            plant.pref_label,
            plant.synonym_detail()
        );
    }
}

fn print_hierarchy(descriptor: &str, chain: &[Plant]) {
    if chain.is_empty() {
        println!("No hierarchy entries for \"{descriptor}\".");
        return;
    }
    println!("Hierarchy for \"{descriptor}\":");
    for (level, plant) in chain.iter().enumerate() {
        println!("{}{} ({})", "  ".repeat(level), plant.pref_label, plant.in_scheme);
    }
}
