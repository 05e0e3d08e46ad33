use crate::collapsed::{self, CollapsedNode};
use crate::metadata::TaxonTable;

/// Text printed beside one tip.
pub fn display_name(
    name: &str,
    metadata: &TaxonTable,
    queries: &TaxonTable,
    label_fields: &[String],
    collapsed_nodes: &[CollapsedNode],
    warnings: &mut Vec<String>,
) -> String {
    if collapsed::is_collapsed(name) {
        return collapsed::label_for_tip(name, collapsed_nodes, metadata, warnings);
    }

    if let Some(taxon) = metadata.get(name) {
        let mut display = format!("{}|{}|{}", name, taxon.sample_date, taxon.lineage);
        if let Some(query) = queries.get(name) {
            for field in label_fields {
                display.push('|');
                display.push_str(query.attribute(field));
            }
        }
        return display;
    }

    if name.starts_with("subtree") {
        let number = name.rsplit('_').next().unwrap_or(name);
        format!("Tree {}", number)
    } else {
        format!("{}|not in dict", name)
    }
}
