//! Summaries of collapsed nodes: the synthetic `inserted_node` tips standing in for
//! clades of near-identical sequences.

use crate::error::{Error, Result};
use crate::metadata::{TaxonTable, MISSING};
use chrono::NaiveDate;
use log::warn;
use rustc_hash::FxHashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

const COLLAPSED_PREFIX: &str = "inserted_node";
const MAX_LISTED: usize = 5;

#[derive(Debug, Clone, PartialEq)]
pub struct CollapsedNode {
    pub name: String,
    pub members: Vec<String>,
}

/// One row of the collapsed-node table written next to each figure.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeSummary {
    pub node_number: String,
    pub size: usize,
    pub date_range: String,
    pub countries: String,
}

/// Load `<tree>.txt`: a header line, then `node<TAB>member,member,...` rows.
pub fn load_node_table(path: &Path) -> Result<Vec<CollapsedNode>> {
    let file = File::open(path).map_err(|e| Error::io(path, e))?;
    let reader = BufReader::new(file);
    let mut nodes = Vec::new();

    for (line_no, line) in reader.lines().enumerate().skip(1) {
        let line = line.map_err(|e| Error::io(path, e))?;
        if line.trim().is_empty() {
            continue;
        }
        let parts: Vec<&str> = line.split('\t').collect();
        if parts.len() < 2 {
            warn!("{:?}: line {} has no member column, skipping", path, line_no + 1);
            continue;
        }
        nodes.push(CollapsedNode {
            name: parts[0].trim().to_string(),
            members: parts[1]
                .split(',')
                .map(|m| m.trim().to_string())
                .filter(|m| !m.is_empty())
                .collect(),
        });
    }
    Ok(nodes)
}

pub fn is_collapsed(name: &str) -> bool {
    name.contains("inserted")
}

/// `inserted_node12` -> `12`. Leading characters drawn from `inserted_node` are stripped.
pub fn node_number(name: &str) -> &str {
    name.trim_start_matches(|c: char| COLLAPSED_PREFIX.contains(c))
}

/// Count values, ranked by descending count with ties kept in first-seen order.
pub fn ranked_counts<'a, I>(values: I) -> Vec<(&'a str, usize)>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut index: FxHashMap<&str, usize> = FxHashMap::default();
    let mut counts: Vec<(&str, usize)> = Vec::new();
    for value in values {
        match index.get(value) {
            Some(&i) => counts[i].1 += 1,
            None => {
                index.insert(value, counts.len());
                counts.push((value, 1));
            }
        }
    }
    counts.sort_by(|a, b| b.1.cmp(&a.1));
    counts
}

/// Distinct values in first-seen order.
fn first_seen<'a>(values: &[&'a str]) -> Vec<&'a str> {
    let mut seen = Vec::new();
    for v in values {
        if !seen.contains(v) {
            seen.push(*v);
        }
    }
    seen
}

/// Tip label for a collapsed node, e.g.
/// `Collapsed node 3: 12 nodes in UK, Spain and 2 others`.
/// Members absent from the metadata are reported through `warnings`.
pub fn label(node: &CollapsedNode, metadata: &TaxonTable, warnings: &mut Vec<String>) -> String {
    let mut summary_values: Vec<&str> = Vec::new();
    for member in &node.members {
        match metadata.get(member) {
            Some(taxon) => summary_values.push(&taxon.node_summary),
            None => warnings.push(format!("{} missing from full metadata", member)),
        }
    }

    let ranked = ranked_counts(summary_values.iter().copied());
    let listed = if ranked.len() > MAX_LISTED {
        let remaining = ranked.len() - MAX_LISTED;
        let top: Vec<&str> = ranked.iter().take(MAX_LISTED).map(|(v, _)| *v).collect();
        let noun = if remaining == 1 { "other" } else { "others" };
        format!("{} and {} {}", top.join(", "), remaining, noun)
    } else {
        first_seen(&summary_values).join(", ")
    };

    format!(
        "Collapsed node {}: {} nodes in {}",
        node_number(&node.name),
        node.members.len(),
        listed
    )
}

/// Label for a collapsed tip looked up by name in the tree's node table.
pub fn label_for_tip(
    tip: &str,
    nodes: &[CollapsedNode],
    metadata: &TaxonTable,
    warnings: &mut Vec<String>,
) -> String {
    match nodes.iter().find(|n| n.name == tip) {
        Some(node) => label(node, metadata, warnings),
        None => {
            warnings.push(format!("{} not found in collapsed node table", tip));
            format!("Collapsed node {}", node_number(tip))
        }
    }
}

/// Per-node table: size, collection date range and the most common countries.
pub fn summarise_table(
    nodes: &[CollapsedNode],
    metadata: &TaxonTable,
    warnings: &mut Vec<String>,
) -> Vec<NodeSummary> {
    nodes
        .iter()
        .map(|node| {
            let mut dates: Vec<NaiveDate> = Vec::new();
            let mut countries: Vec<&str> = Vec::new();

            for taxon in node.members.iter().filter_map(|m| metadata.get(m)) {
                if taxon.sample_date != MISSING {
                    match NaiveDate::parse_from_str(&taxon.sample_date, "%Y-%m-%d") {
                        Ok(date) => dates.push(date),
                        Err(_) => warnings.push(format!(
                            "{} has unparseable sample date {}",
                            taxon.name, taxon.sample_date
                        )),
                    }
                }
                countries.push(&taxon.country);
            }

            let countries = ranked_counts(countries)
                .into_iter()
                .take(MAX_LISTED)
                .map(|(country, count)| format!("{} ({})", country, count))
                .collect::<Vec<_>>()
                .join(", ");

            let date_range = match (dates.iter().min(), dates.iter().max()) {
                (Some(min), Some(max)) => format!("{} to {}", min, max),
                _ => format!("{} to {}", MISSING, MISSING),
            };

            NodeSummary {
                node_number: node_number(&node.name).to_string(),
                size: node.members.len(),
                date_range,
                countries,
            }
        })
        .collect()
}

pub fn write_summary_tsv(path: &Path, rows: &[NodeSummary]) -> Result<()> {
    let mut content = String::from("Node number\tNumber of sequences\tDate range\tCountries\n");
    for row in rows {
        content.push_str(&format!(
            "{}\t{}\t{}\t{}\n",
            row.node_number, row.size, row.date_range, row.countries
        ));
    }
    std::fs::write(path, content).map_err(|e| Error::io(path, e))
}
