//! Drives a whole run: every tree in the input directory, plus legends and trait charts.

use crate::collapsed::{self, CollapsedNode, NodeSummary};
use crate::colour::{colour_map, ColourMap, ColourScheme};
use crate::error::{Error, Result};
use crate::figures;
use crate::labels::display_name;
use crate::layout::{tree_scene, TreeStyle};
use crate::metadata::TaxonTable;
use crate::newick::{self, ROOT_STUB_LENGTH};
use crate::output::{write_figure, Format};
use log::{debug, info, warn};
use rayon::prelude::*;
use rustc_hash::{FxHashMap, FxHashSet};
use std::fs;
use std::path::{Path, PathBuf};

/// Trees with this many tips or more are too tall to draw.
pub const MAX_TIPS: usize = 1000;

pub const WARNINGS_FILE: &str = "tree_build_warnings.txt";
pub const SUMMARY_FILE: &str = "tree_summary.tsv";

/// Everything a run needs besides the metadata tables.
#[derive(Debug, Clone)]
pub struct Options {
    pub input_dir: PathBuf,
    pub out_dir: PathBuf,
    pub stem: String,
    pub colour_fields: Vec<String>,
    pub label_fields: Vec<String>,
    pub node_summary_field: String,
    pub scheme: ColourScheme,
    pub format: Format,
    pub scale_length: f64,
    pub scale_label: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TreeStatus {
    Rendered,
    TooTall,
}

#[derive(Debug, Clone)]
pub struct TreeOutcome {
    pub number: usize,
    pub tips: usize,
    pub status: TreeStatus,
    pub collapsed: Vec<NodeSummary>,
    /// Taxa placed in this tree: tips and collapsed-node members
    pub members: Vec<String>,
    pub warnings: Vec<String>,
}

#[derive(Debug)]
pub struct RunReport {
    pub trees: Vec<TreeOutcome>,
    pub colour_maps: FxHashMap<String, ColourMap>,
    /// Tree number -> trait chart, for trees with enough variety to chart
    pub trait_figures: Vec<(usize, PathBuf)>,
}

impl RunReport {
    pub fn rendered(&self) -> usize {
        self.trees.iter().filter(|t| t.status == TreeStatus::Rendered).count()
    }

    pub fn too_tall(&self) -> Vec<usize> {
        self.trees
            .iter()
            .filter(|t| t.status == TreeStatus::TooTall)
            .map(|t| t.number)
            .collect()
    }
}

/// `<stem>_<N>.tree` -> `N`
fn tree_number(file_name: &str, stem: &str) -> Option<usize> {
    let base = file_name.strip_suffix(".tree")?;
    let number = base.strip_prefix(stem)?.strip_prefix('_')?;
    number.parse().ok()
}

fn tree_path(dir: &Path, stem: &str, number: usize) -> PathBuf {
    dir.join(format!("{}_{}.tree", stem, number))
}

fn node_table_path(dir: &Path, stem: &str, number: usize) -> PathBuf {
    dir.join(format!("{}_{}.txt", stem, number))
}

/// Every regular `*.tree` file in `dir`, by file name.
fn tree_files(dir: &Path) -> Result<Vec<(String, PathBuf)>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir).map_err(|e| Error::io(dir, e))? {
        let entry = entry.map_err(|e| Error::io(dir, e))?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if !name.ends_with(".tree") {
            continue;
        }
        let file_type = entry.file_type().map_err(|e| Error::io(entry.path(), e))?;
        if file_type.is_file() {
            files.push((name, entry.path()));
        }
    }
    files.sort();
    Ok(files)
}

/// Tree numbers found in `dir`, ascending.
pub fn discover(dir: &Path, stem: &str) -> Result<Vec<usize>> {
    let mut numbers = Vec::new();
    for (name, _) in tree_files(dir)? {
        match tree_number(&name, stem) {
            Some(n) => numbers.push(n),
            None => warn!("Not drawing {:?}: not named {}_<N>.tree", name, stem),
        }
    }
    numbers.sort_unstable();
    if numbers.is_empty() {
        return Err(Error::NoTrees {
            dir: dir.to_path_buf(),
            stem: stem.to_string(),
        });
    }
    Ok(numbers)
}

/// Height of the tallest `*.tree` file in `dir`, measured with the root stub in place.
/// Every tree file counts, drawn or not.
pub fn tallest_tree(dir: &Path) -> Result<f64> {
    let heights = tree_files(dir)?
        .par_iter()
        .map(|(_, path)| {
            let mut tree = newick::load(path)?;
            tree.add_root_stub(ROOT_STUB_LENGTH);
            Ok(tree.tree_height())
        })
        .collect::<Result<Vec<f64>>>()?;
    Ok(heights.into_iter().fold(0.0, f64::max))
}

struct RunContext<'a> {
    options: &'a Options,
    metadata: &'a TaxonTable,
    queries: &'a TaxonTable,
    colour_maps: &'a FxHashMap<String, ColourMap>,
    tallest: f64,
}

fn process_tree(ctx: &RunContext, number: usize) -> Result<TreeOutcome> {
    let options = ctx.options;
    let mut tree = newick::load(&tree_path(&options.input_dir, &options.stem, number))?;
    tree.add_root_stub(ROOT_STUB_LENGTH);
    let tips = tree.tip_count();

    if tips >= MAX_TIPS {
        warn!("Tree {} has {} tips, not drawing it", number, tips);
        return Ok(TreeOutcome {
            number,
            tips,
            status: TreeStatus::TooTall,
            collapsed: Vec::new(),
            members: Vec::new(),
            warnings: Vec::new(),
        });
    }

    let table_path = node_table_path(&options.input_dir, &options.stem, number);
    let nodes: Vec<CollapsedNode> = if table_path.exists() {
        collapsed::load_node_table(&table_path)?
    } else {
        debug!("Tree {} has no collapsed node table", number);
        Vec::new()
    };

    let mut warnings = Vec::new();
    let mut labels: Vec<Option<String>> = vec![None; tree.len()];
    let mut members: Vec<String> = Vec::new();
    let mut seen: FxHashSet<String> = FxHashSet::default();

    for id in tree.tips() {
        let name = tree.node(id).name();
        labels[id] = Some(display_name(
            name,
            ctx.metadata,
            ctx.queries,
            &options.label_fields,
            &nodes,
            &mut warnings,
        ));
        if !collapsed::is_collapsed(name) && seen.insert(name.to_string()) {
            members.push(name.to_string());
        }
    }
    for node in &nodes {
        for member in &node.members {
            if seen.insert(member.clone()) {
                members.push(member.clone());
            }
        }
    }

    let style = TreeStyle {
        tallest: ctx.tallest,
        colour_fields: &options.colour_fields,
        colour_maps: ctx.colour_maps,
        scale_length: options.scale_length,
        scale_label: &options.scale_label,
    };
    let scene = tree_scene(&tree, &labels, ctx.queries, &style);
    write_figure(&scene, &options.out_dir, &format!("tree_{}", number), options.format)?;

    let summaries = collapsed::summarise_table(&nodes, ctx.metadata, &mut warnings);
    if !nodes.is_empty() {
        let path = options.out_dir.join(format!("tree_{}_collapsed_nodes.tsv", number));
        collapsed::write_summary_tsv(&path, &summaries)?;
    }

    info!("Tree {}: {} tips, {} collapsed nodes", number, tips, nodes.len());
    Ok(TreeOutcome {
        number,
        tips,
        status: TreeStatus::Rendered,
        collapsed: summaries,
        members,
        warnings,
    })
}

fn write_summary(path: &Path, trees: &[TreeOutcome]) -> Result<()> {
    let mut content = String::from("tree\ttips\tstatus\n");
    for t in trees {
        let status = match t.status {
            TreeStatus::Rendered => "rendered",
            TreeStatus::TooTall => "too_tall",
        };
        content.push_str(&format!("tree_{}\t{}\t{}\n", t.number, t.tips, status));
    }
    fs::write(path, content).map_err(|e| Error::io(path, e))
}

/// Draw every tree, write the per-tree tables, legends and trait charts.
pub fn make_all_trees(
    options: &Options,
    metadata: &TaxonTable,
    queries: &TaxonTable,
) -> Result<RunReport> {
    fs::create_dir_all(&options.out_dir).map_err(|e| Error::io(&options.out_dir, e))?;

    let numbers = discover(&options.input_dir, &options.stem)?;
    info!("Found {} trees in {:?}", numbers.len(), options.input_dir);

    let tallest = tallest_tree(&options.input_dir)?;
    debug!("Tallest tree height: {:.6}", tallest);

    let colour_maps: FxHashMap<String, ColourMap> = options
        .colour_fields
        .iter()
        .map(|field| (field.clone(), colour_map(queries, field, options.scheme)))
        .collect();

    let ctx = RunContext {
        options,
        metadata,
        queries,
        colour_maps: &colour_maps,
        tallest,
    };

    let trees = numbers
        .par_iter()
        .map(|&n| process_tree(&ctx, n))
        .collect::<Result<Vec<TreeOutcome>>>()?;

    let warnings: Vec<&str> = trees
        .iter()
        .flat_map(|t| t.warnings.iter().map(String::as_str))
        .collect();
    for w in &warnings {
        warn!("{}", w);
    }
    let mut warning_text = warnings.join("\n");
    if !warning_text.is_empty() {
        warning_text.push('\n');
    }
    let warnings_path = options.out_dir.join(WARNINGS_FILE);
    fs::write(&warnings_path, warning_text).map_err(|e| Error::io(&warnings_path, e))?;

    for field in &options.colour_fields {
        if colour_maps[field].is_empty() {
            continue;
        }
        let scene = figures::legend(&colour_maps[field]);
        write_figure(&scene, &options.out_dir, &format!("legend_{}", field), options.format)?;
    }

    let members: Vec<(usize, Vec<String>)> = trees
        .iter()
        .filter(|t| t.status == TreeStatus::Rendered)
        .map(|t| (t.number, t.members.clone()))
        .collect();
    let mut trait_figures = Vec::new();
    for counts in figures::describe_traits(metadata, queries, &members) {
        let tsv = options.out_dir.join(format!("tree_{}_traits.tsv", counts.tree));
        figures::write_counts_tsv(&tsv, &counts, &options.node_summary_field)?;
        if counts.worth_plotting() {
            let scene = figures::trait_bar_chart(&counts, &options.node_summary_field);
            let path = write_figure(
                &scene,
                &options.out_dir,
                &format!("tree_{}_traits", counts.tree),
                options.format,
            )?;
            trait_figures.push((counts.tree, path));
        }
    }

    write_summary(&options.out_dir.join(SUMMARY_FILE), &trees)?;

    Ok(RunReport {
        trees,
        colour_maps,
        trait_figures,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{load_metadata, load_queries, Columns};

    fn write(dir: &Path, name: &str, content: &str) {
        fs::write(dir.join(name), content).unwrap();
    }

    fn options(input: &Path, out: &Path) -> Options {
        Options {
            input_dir: input.to_path_buf(),
            out_dir: out.to_path_buf(),
            stem: "local".to_string(),
            colour_fields: vec!["region".to_string(), "care".to_string()],
            label_fields: vec!["care".to_string()],
            node_summary_field: "country".to_string(),
            scheme: ColourScheme::Paired,
            format: Format::Svg,
            scale_length: 0.00003,
            scale_label: "1 SNP".to_string(),
        }
    }

    #[test]
    fn tree_numbers_from_file_names() {
        assert_eq!(tree_number("local_12.tree", "local"), Some(12));
        assert_eq!(tree_number("local_x.tree", "local"), None);
        assert_eq!(tree_number("other_3.tree", "local"), None);
        assert_eq!(tree_number("local_3.txt", "local"), None);
    }

    #[test]
    fn discover_sorts_numerically() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["local_10.tree", "local_2.tree", "local_1.tree", "local_1.txt", "notes.tree"] {
            write(dir.path(), name, "(A,B);");
        }
        fs::create_dir(dir.path().join("local_3.tree")).unwrap();
        assert_eq!(discover(dir.path(), "local").unwrap(), vec![1, 2, 10]);

        let empty = tempfile::tempdir().unwrap();
        assert!(matches!(discover(empty.path(), "local"), Err(Error::NoTrees { .. })));
    }

    #[test]
    fn tallest_counts_every_tree_file() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "local_1.tree", "(A:1,B:0.5);");
        write(dir.path(), "other_1.tree", "(C:5,D:2);");
        write(dir.path(), "local_1.txt", "node\tmembers\n");
        fs::create_dir(dir.path().join("nested.tree")).unwrap();

        let tallest = tallest_tree(dir.path()).unwrap();
        assert!((tallest - (5.0 + ROOT_STUB_LENGTH)).abs() < 1e-12);
        assert_eq!(discover(dir.path(), "local").unwrap(), vec![1]);
    }

    #[test]
    fn full_run_writes_every_output() {
        let input = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();

        write(
            input.path(),
            "local_1.tree",
            "((s1:0.0001,s2:0.0002):0.0001,inserted_node1:0.0001,subtree_2:0.0003);",
        );
        write(input.path(), "local_1.txt", "node\tmembers\ninserted_node1\tm1,m2,m3,m4,ghost\n");
        write(input.path(), "local_2.tree", "(s3:0.00005,s4:0.00001);");
        write(
            input.path(),
            "meta.csv",
            "sequence_name,sample_date,lineage,country\n\
             s1,2020-03-01,B.1,UK\n\
             s2,2020-03-02,B.1,UK\n\
             s3,2020-03-03,B.1.1,UK\n\
             s4,2020-03-04,B.1.1,UK\n\
             m1,2020-02-01,B.1,Spain\n\
             m2,2020-02-10,B.1,Italy\n\
             m3,NA,B.1,France\n\
             m4,2020-02-05,B.1,Spain\n",
        );
        write(input.path(), "query.csv", "name,region,care\ns1,north,yes\ns3,south,no\n");

        let columns = Columns::default();
        let metadata = load_metadata(&input.path().join("meta.csv"), &columns).unwrap();
        let query_path = input.path().join("query.csv");
        let queries = load_queries(&query_path, "name", &columns, &metadata).unwrap();

        let opts = options(input.path(), out.path());
        let report = make_all_trees(&opts, &metadata, &queries).unwrap();
        assert_eq!(report.rendered(), 2);
        assert!(report.too_tall().is_empty());
        assert_eq!(report.trees[0].number, 1);
        assert_eq!(report.trees[0].collapsed[0].size, 5);
        assert_eq!(report.trees[0].collapsed[0].date_range, "2020-02-01 to 2020-02-10");

        let tree_svg = fs::read_to_string(out.path().join("tree_1.svg")).unwrap();
        assert!(tree_svg.contains("s1|2020-03-01|B.1|yes"));
        assert!(tree_svg.contains("s2|2020-03-02|B.1</text>"));
        assert!(tree_svg.contains("Collapsed node 1: 5 nodes in Spain, Italy, France"));
        assert!(tree_svg.contains("Tree 2"));

        assert!(out.path().join("tree_2.svg").exists());
        assert!(out.path().join("legend_region.svg").exists());
        assert!(out.path().join("legend_care.svg").exists());
        assert!(out.path().join("tree_1_collapsed_nodes.tsv").exists());
        assert!(!out.path().join("tree_2_collapsed_nodes.tsv").exists());

        // tree 1 has UK, Spain, Italy, France among its non-query taxa
        assert_eq!(report.trait_figures.len(), 1);
        assert_eq!(report.trait_figures[0].0, 1);
        assert!(out.path().join("tree_1_traits.svg").exists());
        assert!(out.path().join("tree_2_traits.tsv").exists());

        let warnings = fs::read_to_string(out.path().join(WARNINGS_FILE)).unwrap();
        assert!(warnings.contains("ghost missing from full metadata"));

        let summary = fs::read_to_string(out.path().join(SUMMARY_FILE)).unwrap();
        assert_eq!(summary, "tree\ttips\tstatus\ntree_1\t4\trendered\ntree_2\t2\trendered\n");
    }

    #[test]
    fn oversized_trees_are_skipped() {
        let input = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let tips: Vec<String> = (0..MAX_TIPS).map(|i| format!("t{}:0.0001", i)).collect();
        write(input.path(), "local_1.tree", &format!("({});", tips.join(",")));
        write(input.path(), "local_2.tree", "(a:0.0001,b:0.0001);");

        let mut opts = options(input.path(), out.path());
        opts.colour_fields.clear();
        let report = make_all_trees(&opts, &TaxonTable::default(), &TaxonTable::default()).unwrap();
        assert_eq!(report.too_tall(), vec![1]);
        assert_eq!(report.rendered(), 1);
        assert!(!out.path().join("tree_1.svg").exists());
        assert!(out.path().join("tree_2.svg").exists());
    }
}
