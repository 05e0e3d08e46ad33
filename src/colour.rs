//! Colours for traits and the fixed figure palette.

use crate::metadata::TaxonTable;
use rustc_hash::FxHashMap;
use sha2::{Digest, Sha256};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    pub const fn hex(v: u32) -> Rgb {
        Rgb((v >> 16) as u8, (v >> 8) as u8, v as u8)
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.0, self.1, self.2)
    }
}

pub const DIMGREY: Rgb = Rgb::hex(0x696969);
pub const LIGHTGREY: Rgb = Rgb::hex(0xd3d3d3);
pub const BLACK: Rgb = Rgb::hex(0x000000);
pub const HIGHLIGHT: Rgb = Rgb::hex(0x924242);
pub const SECOND: Rgb = Rgb::hex(0xabbca3);

/// matplotlib's "Paired" qualitative map
const PAIRED: [Rgb; 12] = [
    Rgb::hex(0xa6cee3),
    Rgb::hex(0x1f78b4),
    Rgb::hex(0xb2df8a),
    Rgb::hex(0x33a02c),
    Rgb::hex(0xfb9a99),
    Rgb::hex(0xe31a1c),
    Rgb::hex(0xfdbf6f),
    Rgb::hex(0xff7f00),
    Rgb::hex(0xcab2d6),
    Rgb::hex(0x6a3d9a),
    Rgb::hex(0xffff99),
    Rgb::hex(0xb15928),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum ColourScheme {
    /// Two fixed colours for binary traits, otherwise evenly spaced "Paired" colours.
    #[default]
    Paired,
    /// Colour derived from a hash of the value; stable across runs and datasets.
    Hash,
}

/// Sample the Paired map at `linspace(0, 1, n)`.
fn paired_colours(n: usize) -> Vec<Rgb> {
    (0..n)
        .map(|i| {
            let t = if n > 1 { i as f64 / (n - 1) as f64 } else { 0.0 };
            let idx = ((t * PAIRED.len() as f64).floor() as usize).min(PAIRED.len() - 1);
            PAIRED[idx]
        })
        .collect()
}

/// SHA-256 based colour, brightened so no channel dominates.
pub fn hashed_colour(value: &str) -> Rgb {
    let mut hasher = Sha256::new();
    hasher.update(value.as_bytes());
    let result = hasher.finalize();

    let mut r = result[24] as f32 / 255.0;
    let mut g = result[8] as f32 / 255.0;
    let mut b = result[16] as f32 / 255.0;

    let sum = r + g + b;
    if sum > 0.0 {
        r /= sum;
        g /= sum;
        b /= sum;
    }

    let max_component = r.max(g).max(b);
    let f = if max_component > 0.0 {
        1.5f32.min(1.0 / max_component)
    } else {
        1.0
    };

    Rgb(
        (255.0 * (r * f).min(1.0)).round() as u8,
        (255.0 * (g * f).min(1.0)).round() as u8,
        (255.0 * (b * f).min(1.0)).round() as u8,
    )
}

/// Value -> colour for one trait, in legend order.
#[derive(Debug, Clone, Default)]
pub struct ColourMap {
    entries: Vec<(String, Rgb)>,
    index: FxHashMap<String, usize>,
}

impl ColourMap {
    pub fn from_entries(entries: Vec<(String, Rgb)>) -> Self {
        let index = entries
            .iter()
            .enumerate()
            .map(|(i, (value, _))| (value.clone(), i))
            .collect();
        ColourMap { entries, index }
    }

    pub fn get(&self, value: &str) -> Option<Rgb> {
        self.index.get(value).map(|&i| self.entries[i].1)
    }

    pub fn entries(&self) -> &[(String, Rgb)] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Colour every distinct value the query taxa take for `trait_name`.
pub fn colour_map(queries: &TaxonTable, trait_name: &str, scheme: ColourScheme) -> ColourMap {
    let mut options: Vec<String> = queries
        .values()
        .map(|q| q.attribute(trait_name).to_string())
        .collect();
    options.sort();
    options.dedup();

    let colours = match scheme {
        ColourScheme::Hash => options.iter().map(|o| hashed_colour(o)).collect(),
        ColourScheme::Paired if options.len() == 2 => vec![HIGHLIGHT, SECOND],
        ColourScheme::Paired => paired_colours(options.len()),
    };

    ColourMap::from_entries(options.into_iter().zip(colours).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::Taxon;

    fn queries(values: &[&str]) -> TaxonTable {
        values
            .iter()
            .enumerate()
            .map(|(i, v)| {
                let name = format!("q{}", i);
                let mut attributes = FxHashMap::default();
                attributes.insert("region".to_string(), v.to_string());
                let taxon = Taxon {
                    name: name.clone(),
                    sample_date: "NA".to_string(),
                    lineage: "NA".to_string(),
                    country: "NA".to_string(),
                    node_summary: "NA".to_string(),
                    attributes,
                };
                (name, taxon)
            })
            .collect()
    }

    #[test]
    fn hex_formatting() {
        assert_eq!(HIGHLIGHT.to_string(), "#924242");
        assert_eq!(DIMGREY.to_string(), "#696969");
    }

    #[test]
    fn binary_traits_use_fixed_pair() {
        let map = colour_map(
            &queries(&["north", "south", "north"]),
            "region",
            ColourScheme::Paired,
        );
        assert_eq!(map.len(), 2);
        assert_eq!(map.get("north"), Some(HIGHLIGHT));
        assert_eq!(map.get("south"), Some(SECOND));
    }

    #[test]
    fn paired_spans_the_palette() {
        let map = colour_map(&queries(&["a", "b", "c"]), "region", ColourScheme::Paired);
        assert_eq!(map.get("a"), Some(PAIRED[0]));
        assert_eq!(map.get("b"), Some(PAIRED[6]));
        assert_eq!(map.get("c"), Some(PAIRED[11]));

        let single = colour_map(&queries(&["a"]), "region", ColourScheme::Paired);
        assert_eq!(single.get("a"), Some(PAIRED[0]));
    }

    #[test]
    fn missing_trait_values_become_na() {
        let map = colour_map(&queries(&["a"]), "not_a_column", ColourScheme::Paired);
        assert_eq!(map.entries().len(), 1);
        assert!(map.get("NA").is_some());
    }

    #[test]
    fn hashed_colours_are_stable() {
        let a = colour_map(&queries(&["a", "b"]), "region", ColourScheme::Hash);
        let b = colour_map(&queries(&["b", "x", "a"]), "region", ColourScheme::Hash);
        assert_eq!(a.get("a"), b.get("a"));
        assert_eq!(a.get("a"), Some(hashed_colour("a")));
        assert_ne!(hashed_colour("a"), hashed_colour("b"));
    }
}
