//! Gradebook CLI - trimester filtering and workbook export for gradebook CSV files
//!
//! # Main Commands
//!
//! ```bash
//! gradebook serve                                   # Start the upload form (port 3000)
//! gradebook filter grades.csv --term Term1          # Drop Term1 grades, CSV to stdout
//! gradebook export grades.csv --term Term2 -o t2.xlsx --averages
//! ```
//!
//! # Debug Commands
//!
//! ```bash
//! gradebook inspect grades.csv      # Show columns, derived tags and trimester markers
//! gradebook config                  # Print the default configuration as JSON
//! ```

use clap::{Parser, Subcommand};
use gradebook::{
    detect_terms, parse_code, parse_csv_file_auto, transform_file, GradebookConfig, OutputKind,
    RecodeOptions, ReportMetadata, SelectionMode, Term, TransformRequest,
};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "gradebook")]
#[command(about = "Filter and export Schoology gradebooks by trimester", long_about = None)]
struct Cli {
    /// JSON config file (default: $GRADEBOOK_CONFIG or built-in)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Select one trimester's columns and write CSV
    Filter {
        /// Input CSV file
        input: PathBuf,

        /// Trimester (Term1, Term2, Term3)
        #[arg(short, long)]
        term: Term,

        /// Selection mode: exclude, range or coded
        #[arg(short, long, default_value = "exclude")]
        mode: SelectionMode,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Select, recode and write a formatted Excel workbook
    Export {
        /// Input CSV file
        input: PathBuf,

        /// Trimester (Term1, Term2, Term3)
        #[arg(short, long)]
        term: Term,

        /// Selection mode: exclude, range or coded
        #[arg(short, long, default_value = "coded")]
        mode: SelectionMode,

        #[arg(long, default_value = "")]
        teacher: String,

        #[arg(long, default_value = "")]
        subject: String,

        #[arg(long, default_value = "")]
        course: String,

        #[arg(long, default_value = "")]
        level: String,

        /// Append a category average after each group
        #[arg(long)]
        averages: bool,

        /// Append a blank column after each group
        #[arg(long)]
        spacers: bool,

        /// Output workbook (default: gradebook_<Term>.xlsx)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show columns, derived tags and detected trimester markers
    Inspect {
        /// Input CSV file
        input: PathBuf,
    },

    /// Print the default configuration as JSON
    Config,

    /// Start HTTP server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "3000")]
        port: u16,
    },
}

#[tokio::main]
async fn main() {
    // Load .env file (if present)
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ Error: {}", e);
            std::process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Filter {
            input,
            term,
            mode,
            output,
        } => cmd_filter(&input, term, mode, output.as_deref(), &config),

        Commands::Export {
            input,
            term,
            mode,
            teacher,
            subject,
            course,
            level,
            averages,
            spacers,
            output,
        } => {
            let request = TransformRequest {
                term,
                mode,
                output: OutputKind::Workbook {
                    metadata: ReportMetadata::new(teacher, subject, course, level),
                    options: RecodeOptions { averages, spacers },
                },
            };
            cmd_export(&input, &request, output.as_deref(), &config)
        }

        Commands::Inspect { input } => cmd_inspect(&input, &config),

        Commands::Config => cmd_config(),

        Commands::Serve { port } => cmd_serve(port, config).await,
    };

    if let Err(e) = result {
        eprintln!("❌ Error: {}", e);
        std::process::exit(1);
    }
}

fn load_config(path: Option<&Path>) -> Result<GradebookConfig, gradebook::ConfigError> {
    match path {
        Some(p) => GradebookConfig::load(p),
        None => GradebookConfig::from_env(),
    }
}

fn cmd_filter(
    input: &Path,
    term: Term,
    mode: SelectionMode,
    output: Option<&Path>,
    config: &GradebookConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("📄 Processing: {}", input.display());

    let request = TransformRequest {
        term,
        mode,
        output: OutputKind::Csv,
    };
    let result = transform_file(input, &request, config).map_err(|e| e.user_message())?;

    eprintln!(
        "   Columns: {} → {}",
        result.csv_info.headers.len(),
        result.columns.len()
    );

    match output {
        Some(p) => {
            fs::write(p, &result.bytes)?;
            eprintln!("💾 Output written to: {}", p.display());
        }
        None => write_stdout(&result.bytes, &mut io::stdout().lock())?,
    }

    Ok(())
}

/// Raw CSV bytes only; status lines go to stderr.
fn write_stdout<W: Write>(bytes: &[u8], out: &mut W) -> io::Result<()> {
    out.write_all(bytes)?;
    out.flush()
}

fn cmd_export(
    input: &Path,
    request: &TransformRequest,
    output: Option<&Path>,
    config: &GradebookConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("📄 Processing: {}", input.display());

    let result = transform_file(input, request, config).map_err(|e| e.user_message())?;

    for group in &result.groups {
        eprintln!(
            "   {}: {} columns{}",
            group.category,
            group.columns.len(),
            if group.average.is_some() { " + average" } else { "" }
        );
    }

    let path = output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(&result.file_name));
    fs::write(&path, &result.bytes)?;
    eprintln!("💾 Workbook written to: {}", path.display());

    Ok(())
}

fn cmd_inspect(input: &Path, config: &GradebookConfig) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("📄 Inspecting: {}", input.display());

    let parsed = parse_csv_file_auto(input)?;
    println!("Encoding:  {}", parsed.encoding);
    println!(
        "Delimiter: {}",
        gradebook::transform::pipeline::format_delimiter(parsed.delimiter)
    );
    println!("Rows:      {}", parsed.table.row_count());
    println!("Columns:   {}\n", parsed.table.len());

    for (i, name) in parsed.headers.iter().enumerate() {
        let tag = if config.is_general(name) {
            "general".to_string()
        } else if let Some(code) = parse_code(name) {
            match config.category_for(&code.prefix) {
                Some(label) => format!("{} #{}", label, code.sequence),
                None => format!("unknown code {}", code.prefix),
            }
        } else {
            String::new()
        };
        println!("  [{:3}] {:<60} {}", i + 1, name, tag);
    }

    for mode in [SelectionMode::RangeKeep, SelectionMode::CodedRange] {
        let found = detect_terms(&parsed.table, mode, config);
        let listed: Vec<String> = found
            .iter()
            .map(|(term, index)| format!("{} at column {}", term, index + 1))
            .collect();
        println!(
            "\nMarkers ({}): {}",
            mode,
            if listed.is_empty() {
                "none".to_string()
            } else {
                listed.join(", ")
            }
        );
    }

    Ok(())
}

fn cmd_config() -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", GradebookConfig::default().to_json()?);
    Ok(())
}

async fn cmd_serve(port: u16, config: GradebookConfig) -> Result<(), Box<dyn std::error::Error>> {
    gradebook::server::start_server(port, config).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use gradebook::transform_bytes;

    #[test]
    fn test_filter_stdout_is_only_csv() {
        let input = "First Name,Overall,Term1 - 2025 - Quiz,Term2 - 2025 - Quiz\nAna,90,8,9\n";
        let request = TransformRequest {
            term: Term::Term1,
            mode: SelectionMode::ExcludePrefix,
            output: OutputKind::Csv,
        };
        let result = transform_bytes(input.as_bytes(), &request, &GradebookConfig::default()).unwrap();

        let mut stdout = Vec::new();
        write_stdout(&result.bytes, &mut stdout).unwrap();

        assert_eq!(
            String::from_utf8(stdout).unwrap(),
            "First Name,Overall,Term2 - 2025 - Quiz\nAna,90,9\n"
        );
    }
}
