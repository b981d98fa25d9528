//! Querymap CLI - query graph probabilities and rendering

use std::fs;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use querymap::config::{CliOverrides, EnvOverrides, ImageFormat, RankDir, Settings};
use querymap::error::{FixSuggestion, QuerymapError, Result};
use querymap::output::{format_analysis, format_paths, OutputFormat, DEFAULT_REPORT_PRECISION};
use querymap::probability::simple_paths_with_options;
use querymap::{analyze, annotate, samples, to_dot, LayoutEngine};

#[derive(Parser)]
#[command(name = "querymap")]
#[command(about = "Querymap - cumulative path probabilities over weighted query graphs")]
#[command(version)]
struct Cli {
    /// Verbose logging (debug)
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Only log warnings and errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a graph document
    Validate {
        /// Path to a graph document or builtin:<name>
        file: String,

        /// Treat lint warnings as errors
        #[arg(long)]
        strict: bool,
    },

    /// Print cumulative probabilities
    Probs {
        /// Path to a graph document or builtin:<name>
        file: String,

        /// Query node or service to report (repeatable; default: leaves and services)
        #[arg(short, long = "target")]
        targets: Vec<String>,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,

        /// Decimal places in text output
        #[arg(short, long, default_value_t = DEFAULT_REPORT_PRECISION)]
        precision: usize,
    },

    /// List the simple paths from the root to a node
    Paths {
        /// Path to a graph document or builtin:<name>
        file: String,

        /// Target query node
        target: String,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Render the graph as Graphviz DOT (and optionally an image)
    Render {
        /// Path to a graph document or builtin:<name>
        file: String,

        /// DOT output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Also lay out an image with the layout engine
        #[arg(long)]
        image: Option<PathBuf>,

        /// Image format (default: from the image extension, else png)
        #[arg(long, value_enum)]
        image_format: Option<ImageFormat>,

        /// Layout direction
        #[arg(long, value_enum)]
        rankdir: Option<RankDir>,

        /// Omit the legend
        #[arg(long)]
        no_legend: bool,

        /// Decimal places in service labels
        #[arg(short, long)]
        precision: Option<usize>,

        /// Layout engine binary
        #[arg(long)]
        engine: Option<String>,
    },

    /// List built-in samples, or print one
    Sample {
        /// Sample name
        name: Option<String>,
    },
}

fn main() {
    let cli = Cli::parse();

    // Initialize tracing (RUST_LOG wins over -v/-q)
    let level = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "warn"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Commands::Validate { file, strict } => validate_graph(&file, strict),
        Commands::Probs {
            file,
            targets,
            format,
            precision,
        } => print_probabilities(&file, &targets, format, precision),
        Commands::Paths {
            file,
            target,
            format,
        } => print_paths(&file, &target, format),
        Commands::Render {
            file,
            output,
            image,
            image_format,
            rankdir,
            no_legend,
            precision,
            engine,
        } => render_graph(
            &file,
            output.as_deref(),
            image.as_deref(),
            image_format,
            CliOverrides {
                rankdir,
                engine,
                label_precision: precision,
                no_legend,
            },
        ),
        Commands::Sample { name } => print_sample(name.as_deref()),
    };

    if let Err(e) = result {
        eprintln!("{} {}", "Error:".red().bold(), e);
        if let Some(suggestion) = e.fix_suggestion() {
            eprintln!("  {} {}", "Fix:".yellow(), suggestion);
        }
        std::process::exit(1);
    }
}

fn validate_graph(file: &str, strict: bool) -> Result<()> {
    let document = samples::load(file)?;
    let graph = document.to_graph()?;

    let overweight = graph.overweight_nodes();
    if strict {
        if let Some((node, sum)) = overweight.first() {
            return Err(QuerymapError::WeightSumExceeded {
                node: node.to_string(),
                sum: *sum,
            });
        }
    }

    let unreachable: Vec<&str> = graph
        .node_ids()
        .iter()
        .filter(|id| !graph.has_path(&document.root, id))
        .map(|id| id.as_ref())
        .collect();

    println!("{} Graph '{}' is valid", "✓".green(), file);
    println!("  Title: {}", document.display_title());
    println!("  Root: {}", document.root);
    println!("  Nodes: {}", graph.node_count());
    println!("  Edges: {}", graph.edge_count());
    println!(
        "  Services: {} ({} attachments)",
        document.services().len(),
        document.attachment_edge_count()
    );
    println!(
        "  Weighted: {}",
        if graph.is_fully_weighted() { "yes" } else { "no" }
    );

    for (node, sum) in &overweight {
        println!(
            "  {} outgoing weights of '{}' sum to {:.3} (> 1)",
            "⚠".yellow(),
            node,
            sum
        );
    }
    for node in &unreachable {
        println!("  {} '{}' is not reachable from the root", "⚠".yellow(), node);
    }

    Ok(())
}

fn print_probabilities(
    file: &str,
    targets: &[String],
    format: OutputFormat,
    precision: usize,
) -> Result<()> {
    let document = samples::load(file)?;
    let graph = document.to_graph()?;
    let settings = Settings::resolve(
        &document.style,
        &EnvOverrides::from_env(),
        &CliOverrides::default(),
    );

    let analysis = analyze(&document, &graph, targets, settings.aggregate_options())?;
    print!("{}", format_analysis(&analysis, &settings, precision, format)?);
    if format == OutputFormat::Json {
        println!();
    }
    Ok(())
}

fn print_paths(file: &str, target: &str, format: OutputFormat) -> Result<()> {
    let document = samples::load(file)?;
    let graph = document.to_graph()?;
    let settings = Settings::resolve(
        &document.style,
        &EnvOverrides::from_env(),
        &CliOverrides::default(),
    );

    let paths =
        simple_paths_with_options(&graph, &document.root, target, settings.aggregate_options())?;
    print!(
        "{}",
        format_paths(
            &document.root,
            target,
            &paths,
            DEFAULT_REPORT_PRECISION,
            format
        )?
    );
    if format == OutputFormat::Json {
        println!();
    }
    Ok(())
}

fn render_graph(
    file: &str,
    output: Option<&Path>,
    image: Option<&Path>,
    image_format: Option<ImageFormat>,
    overrides: CliOverrides,
) -> Result<()> {
    let document = samples::load(file)?;
    let graph = document.to_graph()?;
    let settings = Settings::resolve(&document.style, &EnvOverrides::from_env(), &overrides);

    // Drawing-only documents (unweighted edges) render without probabilities
    let analysis = if graph.is_fully_weighted() {
        Some(analyze(&document, &graph, &[], settings.aggregate_options())?)
    } else {
        debug!("graph has unweighted edges, rendering without probabilities");
        None
    };

    let annotated = annotate(&document, &graph, analysis.as_ref(), &settings);
    let dot = to_dot(&annotated, &settings);

    // An image needs the DOT on disk
    let dot_path = match (output, image) {
        (Some(path), _) => Some(path.to_path_buf()),
        (None, Some(image)) => Some(image.with_extension("dot")),
        (None, None) => None,
    };

    match dot_path {
        Some(ref path) => {
            fs::write(path, &dot)?;
            println!("{} DOT written to {}", "✓".green(), path.display());
        }
        None => print!("{}", dot),
    }

    if let (Some(image), Some(dot_path)) = (image, dot_path) {
        let format = image_format
            .or_else(|| ImageFormat::from_extension(image))
            .unwrap_or_default();
        let engine = LayoutEngine::from_settings(&settings);
        println!(
            "{} Laying out with {} ({})",
            "→".cyan(),
            engine.program().cyan().bold(),
            format.as_str()
        );
        engine.ensure_available()?;
        engine.render_file(&dot_path, image, format)?;
        println!("{} Image written to {}", "✓".green(), image.display());
    }

    Ok(())
}

fn print_sample(name: Option<&str>) -> Result<()> {
    match name {
        Some(name) => {
            let sample = samples::find(name.strip_prefix(samples::BUILTIN_PREFIX).unwrap_or(name))?;
            print!("{}", sample.yaml);
        }
        None => {
            println!("{}", "Built-in samples:".cyan().bold());
            for sample in samples::SAMPLES {
                println!(
                    "  {}{:<20} {}",
                    samples::BUILTIN_PREFIX,
                    sample.name,
                    sample.description
                );
            }
        }
    }
    Ok(())
}
