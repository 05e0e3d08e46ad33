mod collapsed;
mod colour;
mod error;
mod figures;
mod labels;
mod layout;
mod metadata;
mod newick;
mod output;
mod pipeline;
mod scene;
mod svg;

use clap::Parser;
use log::{info, warn};
use std::path::PathBuf;

use crate::colour::ColourScheme;
use crate::metadata::{Columns, TaxonTable};
use crate::output::Format;
use crate::pipeline::Options;

#[derive(Parser)]
#[command(name = "treelook")]
#[command(about = "Draw annotated figures of phylogenetic subtrees.", long_about = None)]
struct Args {
    // MANDATORY OPTIONS
    /// Read `<STEM>_<N>.tree` files and their collapsed node tables from this DIR.
    #[arg(short = 'i', long = "input-dir", value_name = "DIR")]
    input_dir: PathBuf,

    /// Write figures and tables to this DIR.
    #[arg(short = 'o', long = "out-dir", value_name = "DIR")]
    out_dir: PathBuf,

    /// Load taxon metadata from this FILE (CSV, or TSV for .tsv/.txt).
    #[arg(short = 'm', long = "metadata", value_name = "FILE")]
    metadata: PathBuf,

    // Input Options
    /// Highlight the taxa listed in this FILE.
    #[arg(short = 'q', long = "query", value_name = "FILE")]
    query: Option<PathBuf>,

    /// Tree file name stem.
    #[arg(short = 's', long = "stem", value_name = "STRING", default_value = "local")]
    stem: String,

    /// Metadata column holding the taxon name.
    #[arg(long = "id-column", value_name = "NAME", default_value = "sequence_name")]
    id_column: String,

    /// Query column holding the taxon name.
    #[arg(long = "query-id-column", value_name = "NAME", default_value = "name")]
    query_id_column: String,

    /// Metadata column holding the collection date (YYYY-MM-DD).
    #[arg(long = "date-column", value_name = "NAME", default_value = "sample_date")]
    date_column: String,

    /// Metadata column holding the lineage.
    #[arg(long = "lineage-column", value_name = "NAME", default_value = "lineage")]
    lineage_column: String,

    /// Metadata column holding the country.
    #[arg(long = "country-column", value_name = "NAME", default_value = "country")]
    country_column: String,

    /// Metadata field summarised for collapsed nodes and the trait charts.
    #[arg(short = 'n', long = "node-summary", value_name = "NAME", default_value = "country")]
    node_summary: String,

    // Visualization Options
    /// Colour query tips by these fields; the first colours the tips, the rest get columns.
    #[arg(short = 'c', long = "colour-by", value_name = "FIELD", value_delimiter = ',')]
    colour_fields: Vec<String>,

    /// Append these query fields to query tip labels.
    #[arg(short = 'l', long = "label-fields", value_name = "FIELD", value_delimiter = ',')]
    label_fields: Vec<String>,

    /// How trait values are coloured.
    #[arg(short = 'C', long = "colour-scheme", value_enum, default_value_t = ColourScheme::Paired)]
    colour_scheme: ColourScheme,

    /// Output image format.
    #[arg(short = 'f', long = "format", value_enum, default_value_t = Format::Svg)]
    format: Format,

    /// Length of the scale bar in substitutions per site.
    #[arg(long = "scale-length", value_name = "FLOAT", default_value_t = 0.00003)]
    scale_length: f64,

    /// Scale bar label.
    #[arg(long = "scale-label", value_name = "STRING", default_value = "1 SNP")]
    scale_label: String,

    // Threading
    /// Number of threads to use for parallel operations.
    #[arg(short = 't', long = "threads", value_name = "N")]
    threads: Option<usize>,

    // Logging
    /// Verbosity level (0 = error, 1 = info, 2 = debug).
    #[arg(short = 'v', long = "verbose", value_name = "N", default_value_t = 1)]
    verbose: u8,
}

impl Args {
    fn columns(&self) -> Columns {
        Columns {
            id: self.id_column.clone(),
            date: self.date_column.clone(),
            lineage: self.lineage_column.clone(),
            country: self.country_column.clone(),
            node_summary: self.node_summary.clone(),
        }
    }

    fn options(&self) -> Options {
        Options {
            input_dir: self.input_dir.clone(),
            out_dir: self.out_dir.clone(),
            stem: self.stem.clone(),
            colour_fields: self.colour_fields.clone(),
            label_fields: self.label_fields.clone(),
            node_summary_field: self.node_summary.clone(),
            scheme: self.colour_scheme,
            format: self.format,
            scale_length: self.scale_length,
            scale_label: self.scale_label.clone(),
        }
    }
}

fn run(args: &Args) -> error::Result<()> {
    let columns = args.columns();
    let metadata = metadata::load_metadata(&args.metadata, &columns)?;
    let queries = match &args.query {
        Some(path) => metadata::load_queries(path, &args.query_id_column, &columns, &metadata)?,
        None => TaxonTable::default(),
    };
    if queries.is_empty() && !args.colour_fields.is_empty() {
        warn!("No query taxa loaded; colour fields will have no effect.");
    }

    let report = pipeline::make_all_trees(&args.options(), &metadata, &queries)?;

    let too_tall = report.too_tall();
    if !too_tall.is_empty() {
        warn!(
            "Skipped {} trees with {} or more tips: {:?}",
            too_tall.len(),
            pipeline::MAX_TIPS,
            too_tall
        );
    }
    let collapsed: usize = report.trees.iter().map(|t| t.collapsed.len()).sum();
    info!(
        "Drew {} trees ({} collapsed nodes), {} trait charts, {} legends",
        report.rendered(),
        collapsed,
        report.trait_figures.len(),
        report.colour_maps.len()
    );
    Ok(())
}

fn main() {
    let args = Args::parse();

    // Initialize logger based on verbosity
    env_logger::Builder::new()
        .filter_level(match args.verbose {
            0 => log::LevelFilter::Error,
            1 => log::LevelFilter::Info,
            _ => log::LevelFilter::Debug,
        })
        .init();

    if let Some(threads) = args.threads {
        if let Err(e) = rayon::ThreadPoolBuilder::new().num_threads(threads).build_global() {
            eprintln!("Error configuring thread pool: {}", e);
            std::process::exit(1);
        }
    }

    info!("Starting visualization...");

    if let Err(e) = run(&args) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    info!("Done.");
}
