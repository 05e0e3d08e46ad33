//! Taxon metadata and query tables.

use crate::error::{Error, Result};
use log::{info, warn};
use rustc_hash::FxHashMap;
use std::path::Path;

pub const MISSING: &str = "NA";

/// Which metadata columns carry the fields used in labels and summaries.
#[derive(Debug, Clone)]
pub struct Columns {
    pub id: String,
    pub date: String,
    pub lineage: String,
    pub country: String,
    /// Field whose values summarise collapsed nodes and feed the trait bar charts.
    pub node_summary: String,
}

impl Default for Columns {
    fn default() -> Self {
        Columns {
            id: "sequence_name".to_string(),
            date: "sample_date".to_string(),
            lineage: "lineage".to_string(),
            country: "country".to_string(),
            node_summary: "country".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Taxon {
    pub name: String,
    pub sample_date: String,
    pub lineage: String,
    pub country: String,
    pub node_summary: String,
    pub attributes: FxHashMap<String, String>,
}

impl Taxon {
    pub fn attribute(&self, field: &str) -> &str {
        self.attributes
            .get(field)
            .map(String::as_str)
            .unwrap_or(MISSING)
    }
}

pub type TaxonTable = FxHashMap<String, Taxon>;

/// Tab for `.tsv`/`.txt`, comma otherwise.
fn delimiter_for(path: &Path) -> u8 {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("tsv") | Some("txt") => b'\t',
        _ => b',',
    }
}

fn clean(field: &str) -> String {
    let field = field.trim();
    if field.is_empty() {
        MISSING.to_string()
    } else {
        field.to_string()
    }
}

/// Read a delimited table into header-keyed rows.
fn read_rows(path: &Path) -> Result<(Vec<String>, Vec<FxHashMap<String, String>>)> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter_for(path))
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| Error::csv(path, e))?;

    let header: Vec<String> = reader
        .headers()
        .map_err(|e| Error::csv(path, e))?
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').to_string())
        .collect();
    if header.iter().all(|h| h.is_empty()) {
        return Err(Error::Metadata {
            path: path.to_path_buf(),
            message: "file is empty".to_string(),
        });
    }

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| Error::csv(path, e))?;
        if record.iter().all(|f| f.trim().is_empty()) {
            continue;
        }
        let row: FxHashMap<String, String> = header
            .iter()
            .enumerate()
            .map(|(i, column)| {
                let value = record.get(i).map(clean).unwrap_or_else(|| MISSING.to_string());
                (column.clone(), value)
            })
            .collect();
        rows.push(row);
    }
    Ok((header, rows))
}

fn require_column(path: &Path, header: &[String], column: &str) -> Result<()> {
    if header.iter().any(|h| h == column) {
        Ok(())
    } else {
        Err(Error::Metadata {
            path: path.to_path_buf(),
            message: format!("missing column {:?} (found: {})", column, header.join(", ")),
        })
    }
}

fn taxon_from_row(name: String, attributes: FxHashMap<String, String>, columns: &Columns) -> Taxon {
    let field = |c: &str| attributes.get(c).cloned().unwrap_or_else(|| MISSING.to_string());
    Taxon {
        sample_date: field(&columns.date),
        lineage: field(&columns.lineage),
        country: field(&columns.country),
        node_summary: field(&columns.node_summary),
        name,
        attributes,
    }
}

/// Load the full metadata table, keyed by the id column.
pub fn load_metadata(path: &Path, columns: &Columns) -> Result<TaxonTable> {
    let (header, rows) = read_rows(path)?;
    require_column(path, &header, &columns.id)?;

    let mut table = TaxonTable::default();
    for (line_no, row) in rows.into_iter().enumerate() {
        let name = row.get(&columns.id).cloned().unwrap_or_default();
        if name == MISSING {
            warn!("{:?}: row {} has no {}, skipping", path, line_no + 2, columns.id);
            continue;
        }
        table.insert(name.clone(), taxon_from_row(name, row, columns));
    }

    info!("Loaded {} metadata records from {:?}", table.len(), path);
    Ok(table)
}

/// Load the query table. Each query's attributes are its metadata record's, overlaid
/// with the query row's own columns.
pub fn load_queries(
    path: &Path,
    id_column: &str,
    columns: &Columns,
    metadata: &TaxonTable,
) -> Result<TaxonTable> {
    let (header, rows) = read_rows(path)?;
    require_column(path, &header, id_column)?;

    let mut queries = TaxonTable::default();
    for (line_no, row) in rows.into_iter().enumerate() {
        let name = row.get(id_column).cloned().unwrap_or_default();
        if name == MISSING {
            warn!("{:?}: row {} has no {}, skipping", path, line_no + 2, id_column);
            continue;
        }
        let mut attributes = metadata
            .get(&name)
            .map(|t| t.attributes.clone())
            .unwrap_or_default();
        for (column, value) in row {
            if value != MISSING || !attributes.contains_key(&column) {
                attributes.insert(column, value);
            }
        }
        queries.insert(name.clone(), taxon_from_row(name, attributes, columns));
    }

    info!("Loaded {} query records from {:?}", queries.len(), path);
    Ok(queries)
}
