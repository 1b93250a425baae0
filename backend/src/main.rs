//! Cadastro CLI - person registry server and import tools
//!
//! # Commands
//!
//! ```bash
//! cadastro serve                        # Start HTTP server (port 3000)
//! cadastro import pessoas.csv           # Dry-run an import and print the report
//! cadastro import pessoas.xlsx --strict # Same, all-or-nothing
//! cadastro template -o modelo.csv       # Write the import template
//! cadastro check-cpf 111.444.777-35     # Check a CPF
//! ```

use clap::{Parser, Subcommand};
use cadastro::{
    export_error_rows, format_cpf, generate_template, import_file, is_valid_cpf,
    normalize_cpf, Config, ImportOptions, PersonService,
};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "cadastro")]
#[command(about = "Person registry with bulk CSV/Excel import", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start HTTP server
    Serve {
        /// Port to listen on (overrides CADASTRO_PORT)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Validate and import a file into an empty in-memory registry
    Import {
        /// Input .csv, .xlsx or .xls file
        input: PathBuf,

        /// Reject the whole file if any row is invalid
        #[arg(long)]
        strict: bool,

        /// Write rejected rows (with reasons) to this CSV file
        #[arg(short, long)]
        errors: Option<PathBuf>,

        /// Print the full result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Write the import template
    Template {
        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Check a CPF's check digits
    CheckCpf {
        /// CPF, with or without punctuation
        value: String,
    },
}

#[tokio::main]
async fn main() {
    // Load .env file (if present)
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Serve { port } => cmd_serve(port).await,

        Commands::Import {
            input,
            strict,
            errors,
            json,
        } => cmd_import(&input, strict, errors.as_deref(), json).await,

        Commands::Template { output } => cmd_template(output.as_deref()),

        Commands::CheckCpf { value } => cmd_check_cpf(&value),
    };

    if let Err(e) = result {
        eprintln!("❌ Error: {}", e);
        std::process::exit(1);
    }
}

async fn cmd_serve(port: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = Config::from_env()?;
    if let Some(port) = port {
        config.port = port;
    }
    cadastro::server::start_server(config).await
}

async fn cmd_import(
    input: &Path,
    strict: bool,
    errors_out: Option<&Path>,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("📄 Importing: {}", input.display());

    let config = Config::from_env()?;
    let people = PersonService::in_memory(config.cache_ttl);
    let options = if strict {
        ImportOptions::strict()
    } else {
        ImportOptions::default()
    };

    let result = import_file(input, options, &people).await?;

    eprintln!("\n📊 Results:");
    eprintln!("   Total:    {}", result.total);
    eprintln!("   Imported: {}", result.success);
    eprintln!("   Rejected: {}", result.errors);
    for detail in result.details.iter().take(10) {
        eprintln!("   - line {}: {}", detail.line, detail.message);
    }
    if result.details.len() > 10 {
        eprintln!("   ... +{} more", result.details.len() - 10);
    }

    if let Some(path) = errors_out {
        fs::write(path, export_error_rows(&result)?)?;
        eprintln!("💾 Rejected rows written to: {}", path.display());
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    }

    if result.errors > 0 {
        std::process::exit(2);
    }
    Ok(())
}

fn cmd_template(output: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let bytes = generate_template()?;
    match output {
        Some(path) => {
            fs::write(path, &bytes)?;
            eprintln!("💾 Template written to: {}", path.display());
        }
        None => print!("{}", String::from_utf8_lossy(&bytes)),
    }
    Ok(())
}

fn cmd_check_cpf(value: &str) -> Result<(), Box<dyn std::error::Error>> {
    if is_valid_cpf(value) {
        let digits = normalize_cpf(value).unwrap_or_default();
        println!("✅ {} is valid", format_cpf(&digits));
        Ok(())
    } else {
        Err(format!("'{}' is not a valid CPF", value).into())
    }
}
