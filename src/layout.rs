//! Geometry of a tree figure: branches, tip markers, trait columns, labels and the
//! scale bar, laid out in tree units and mapped onto the page.

use crate::colour::{ColourMap, Rgb, BLACK, DIMGREY, HIGHLIGHT, LIGHTGREY};
use crate::metadata::TaxonTable;
use crate::newick::Tree;
use crate::scene::{pt, Anchor, Baseline, Frame, Scene, Shape, DPI};
use log::debug;
use rustc_hash::FxHashMap;

const PAGE_WIDTH_IN: f64 = 20.0;
const MARGIN: f64 = 20.0;
const VERTICAL_SPACER: f64 = 0.5;

const TIP_AREA: f64 = 40.0;
const QUERY_TIP_AREA: f64 = TIP_AREA * 5.0;
const BRANCH_WIDTH: f64 = 2.0;
const LEADER_WIDTH: f64 = 1.0;
const SEPARATOR_WIDTH: f64 = 3.0;
const DASH: f64 = 3.7;

const LABEL_SIZE: f64 = 15.0;
const QUERY_LABEL_SIZE: f64 = 25.0;
const HEADER_SIZE: f64 = 15.0;
const SCALE_LABEL_SIZE: f64 = 20.0;

/// Figure-wide settings shared by every tree of a run.
#[derive(Debug, Clone)]
pub struct TreeStyle<'a> {
    /// Height of the tallest tree in the run; all trees are right-aligned on it.
    pub tallest: f64,
    pub colour_fields: &'a [String],
    pub colour_maps: &'a FxHashMap<String, ColourMap>,
    pub scale_length: f64,
    pub scale_label: &'a str,
}

/// Page height in inches for a tree with `tips` tips.
pub fn page_height(tips: usize) -> f64 {
    if tips < 10 {
        tips as f64
    } else {
        tips as f64 / 2.0
    }
}

/// Height in inches of the scale bar strip under the tree.
pub fn scale_strip_height(tips: usize) -> f64 {
    if tips < 10 {
        page_height(tips) / 5.0
    } else {
        page_height(tips) / 10.0
    }
}

/// Approximate rendered width of `text` at `size` points.
fn text_width(text: &str, size: f64) -> f64 {
    text.chars().count() as f64 * pt(size) * 0.6
}

fn trait_colour(map: Option<&ColourMap>, value: &str) -> Rgb {
    map.and_then(|m| m.get(value)).unwrap_or(DIMGREY)
}

/// Lay out one tree. `labels` is indexed by node id; tips without a label get no text.
pub fn tree_scene(
    tree: &Tree,
    labels: &[Option<String>],
    queries: &TaxonTable,
    style: &TreeStyle,
) -> Scene {
    let tips = tree.tip_count();
    let tallest = style.tallest.max(tree.tree_height());
    let offset = tallest - tree.tree_height();
    let space = if tallest > 0.0 { tallest / 10.0 } else { 0.1 };
    let text_start = tallest + space + space;
    let x_extent = text_start + tallest.max(space);

    let x_of = |id: usize| tree.node(id).height + offset;
    let max_x = tree.nodes().iter().map(|n| n.height + offset).fold(f64::MIN, f64::max);
    let (min_y, max_y) = tree
        .nodes()
        .iter()
        .fold((f64::MAX, f64::MIN), |(lo, hi), n| (lo.min(n.y), hi.max(n.y)));
    let (min_y, max_y) = (min_y - VERTICAL_SPACER, max_y + VERTICAL_SPACER);

    let fields = style.colour_fields;
    let is_query = |id: usize| queries.contains_key(tree.node(id).name());
    let has_query_tip = tree.tips().into_iter().any(is_query);

    // Room above the tree for rotated column headers
    let header_room = if fields.len() > 1 {
        fields.iter().map(|f| text_width(f, HEADER_SIZE)).fold(0.0, f64::max) + 5.0
    } else {
        0.0
    };

    let width = PAGE_WIDTH_IN * DPI;
    let tree_height_px = page_height(tips) * DPI;
    let strip_height_px = scale_strip_height(tips) * DPI;
    let mut scene = Scene::new(width, header_room + tree_height_px + strip_height_px);

    let frame = Frame {
        x_min: -space,
        x_max: x_extent,
        y_min: min_y,
        y_max: max_y,
        left: MARGIN,
        top: header_room + MARGIN.min(tree_height_px / 4.0),
        width: width - 2.0 * MARGIN,
        height: tree_height_px - 2.0 * MARGIN.min(tree_height_px / 4.0),
    };
    debug!(
        "Layout: {} tips, tallest {:.6}, offset {:.6}, y {:.1}..{:.1}",
        tips, tallest, offset, min_y, max_y
    );

    // Branches
    for (id, node) in tree.nodes().iter().enumerate() {
        let x = x_of(id);
        if let Some(parent) = node.parent {
            let start = (x_of(parent), node.y);
            scene.push(frame.line(start, (x, node.y), DIMGREY, BRANCH_WIDTH, None));
        }
        if !node.is_leaf() {
            let (lo, hi) = node
                .children
                .iter()
                .map(|&c| tree.node(c).y)
                .fold((f64::MAX, f64::MIN), |(lo, hi), y| (lo.min(y), hi.max(y)));
            if hi > lo {
                scene.push(frame.line((x, lo), (x, hi), DIMGREY, BRANCH_WIDTH, None));
            }
        }
    }

    let first_map = fields.first().and_then(|f| style.colour_maps.get(f));

    // Tip markers
    for id in tree.tips() {
        let node = tree.node(id);
        let shape = match queries.get(node.name()) {
            Some(query) => {
                let fill = match fields.first() {
                    Some(field) => trait_colour(first_map, query.attribute(field)),
                    None => HIGHLIGHT,
                };
                frame.marker(x_of(id), node.y, QUERY_TIP_AREA, fill)
            }
            None => frame.marker(x_of(id), node.y, TIP_AREA, DIMGREY),
        };
        scene.push(shape);
    }

    // Trait columns and labels
    let division = if fields.len() > 1 {
        (text_start - tallest) / fields.len() as f64
    } else {
        0.0
    };
    let tip_point = tallest + space;
    let columns: Vec<(&String, f64)> = fields
        .iter()
        .skip(1)
        .enumerate()
        .map(|(i, f)| (f, tip_point + i as f64 * division))
        .collect();

    for (id, label) in labels.iter().enumerate().take(tree.len()) {
        let Some(label) = label else { continue };
        let node = tree.node(id);
        let (x, y) = (x_of(id), node.y);
        let query = queries.get(node.name());
        let size = if query.is_some() { QUERY_LABEL_SIZE } else { LABEL_SIZE };

        let (text_x, leader_end) = if fields.len() > 1 {
            if let Some(query) = query {
                for (field, column_x) in &columns {
                    let fill = trait_colour(style.colour_maps.get(*field), query.attribute(field));
                    scene.push(frame.marker(*column_x, y, QUERY_TIP_AREA, fill));
                }
            }
            (text_start + division, (x < max_x).then_some(tallest))
        } else {
            (text_start, Some(tallest + space))
        };

        if let Some(end) = leader_end.filter(|&end| end > x) {
            scene.push(frame.line((x, y), (end, y), LIGHTGREY, LEADER_WIDTH, Some(DASH)));
        }
        scene.push(Shape::Text {
            x: frame.px(text_x),
            y: frame.py(y),
            text: label.clone(),
            size: pt(size),
            colour: BLACK,
            anchor: Anchor::Start,
            baseline: Baseline::Middle,
            rotation: 0.0,
            weight: 300,
        });
    }

    if fields.len() > 1 {
        let mut headers: Vec<(&String, f64)> = vec![(&fields[0], tallest)];
        if has_query_tip {
            for &(field, column_x) in &columns {
                let line_x = column_x - division / 2.0;
                scene.push(frame.line(
                    (line_x, min_y),
                    (line_x, max_y),
                    LIGHTGREY,
                    SEPARATOR_WIDTH,
                    Some(DASH),
                ));
                headers.push((field, column_x));
            }
        }
        for (field, x) in headers {
            scene.push(Shape::Text {
                x: frame.px(x),
                y: frame.py(max_y),
                text: field.clone(),
                size: pt(HEADER_SIZE),
                colour: BLACK,
                anchor: Anchor::Start,
                baseline: Baseline::Middle,
                rotation: 90.0,
                weight: 400,
            });
        }
    }

    // Scale bar strip
    let strip = Frame {
        y_min: 0.0,
        y_max: 1.0,
        top: header_room + tree_height_px,
        height: strip_height_px,
        ..frame
    };
    scene.push(strip.line((0.0, 0.5), (style.scale_length, 0.5), DIMGREY, 1.0, None));
    scene.push(Shape::Text {
        x: strip.px(style.scale_length / 2.0),
        y: strip.py(0.15),
        text: style.scale_label.to_string(),
        size: pt(SCALE_LABEL_SIZE),
        colour: BLACK,
        anchor: Anchor::Middle,
        baseline: Baseline::Middle,
        rotation: 0.0,
        weight: 400,
    });

    scene
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::colour::{colour_map, ColourScheme};
    use crate::metadata::Taxon;
    use crate::newick::{parse, ROOT_STUB_LENGTH};
    use crate::scene::marker_radius;

    fn query(name: &str, region: &str, care: &str) -> (String, Taxon) {
        let attributes = [("region", region), ("care", care)]
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        (
            name.to_string(),
            Taxon {
                name: name.to_string(),
                sample_date: "NA".to_string(),
                lineage: "NA".to_string(),
                country: "NA".to_string(),
                node_summary: "NA".to_string(),
                attributes,
            },
        )
    }

    fn labels_for(tree: &Tree) -> Vec<Option<String>> {
        (0..tree.len())
            .map(|id| tree.node(id).is_leaf().then(|| tree.node(id).name().to_string()))
            .collect()
    }

    fn circles(scene: &Scene) -> Vec<(f64, f64, Rgb)> {
        scene
            .shapes
            .iter()
            .filter_map(|s| match s {
                Shape::Circle { cx, r, fill, .. } => Some((*cx, *r, *fill)),
                _ => None,
            })
            .collect()
    }

    fn text_at(scene: &Scene, wanted: &str) -> (f64, f64, f64) {
        scene
            .shapes
            .iter()
            .find_map(|s| match s {
                Shape::Text { x, y, text, size, .. } if text == wanted => Some((*x, *y, *size)),
                _ => None,
            })
            .unwrap()
    }

    /// Pixel x of tree coordinate `x` on a page laid out for `tallest`.
    fn page_x(tallest: f64, x: f64) -> f64 {
        let space = tallest / 10.0;
        MARGIN + (x + space) / (2.0 * tallest + 3.0 * space) * (2000.0 - 2.0 * MARGIN)
    }

    fn dashed_lines(scene: &Scene, width_pt: f64) -> usize {
        scene
            .shapes
            .iter()
            .filter(|s| match s {
                Shape::Line { dash: Some(_), width, .. } => (*width - pt(width_pt)).abs() < 1e-9,
                _ => false,
            })
            .count()
    }

    #[test]
    fn page_sizes() {
        assert_eq!(page_height(4), 4.0);
        assert_eq!(page_height(30), 15.0);
        assert_eq!(scale_strip_height(5), 1.0);
        assert_eq!(scale_strip_height(40), 2.0);
    }

    #[test]
    fn single_field_tree() {
        let mut tree = parse("((A:0.0001,B:0.0002):0.0001,C:0.0003);").unwrap();
        tree.add_root_stub(ROOT_STUB_LENGTH);
        let queries: TaxonTable = [query("A", "north", "yes")].into_iter().collect();
        let fields = vec!["region".to_string()];
        let mut maps = FxHashMap::default();
        maps.insert("region".to_string(), colour_map(&queries, "region", ColourScheme::Paired));
        let style = TreeStyle {
            tallest: tree.tree_height(),
            colour_fields: &fields,
            colour_maps: &maps,
            scale_length: 0.00003,
            scale_label: "1 SNP",
        };

        let scene = tree_scene(&tree, &labels_for(&tree), &queries, &style);
        assert_eq!(scene.width, 2000.0);
        assert_eq!(scene.height, 300.0 + 60.0);

        let texts: Vec<&str> = scene.texts().collect();
        assert!(texts.contains(&"A"));
        assert!(texts.contains(&"1 SNP"));

        let markers = circles(&scene);
        assert_eq!(markers.len(), 3);
        let big: Vec<_> = markers.iter().filter(|m| m.1 == marker_radius(QUERY_TIP_AREA)).collect();
        assert_eq!(big.len(), 1);
        assert_eq!(big[0].2, maps["region"].get("north").unwrap());

        // one leader per labelled tip, no separators with a single field
        assert_eq!(dashed_lines(&scene, LEADER_WIDTH), 3);
        assert_eq!(dashed_lines(&scene, SEPARATOR_WIDTH), 0);

        // labels start at text_start, queries in the larger size
        let tallest = style.tallest;
        let text_start = page_x(tallest, tallest * 1.2);
        let (a_x, _, a_size) = text_at(&scene, "A");
        let (c_x, _, c_size) = text_at(&scene, "C");
        assert!((a_x - text_start).abs() < 1e-6);
        assert!((c_x - text_start).abs() < 1e-6);
        assert_eq!(a_size, pt(QUERY_LABEL_SIZE));
        assert_eq!(c_size, pt(LABEL_SIZE));
    }

    #[test]
    fn extra_fields_become_columns() {
        let tree = parse("(A:1,B:2,C:2);").unwrap();
        let queries: TaxonTable = [query("A", "north", "yes"), query("B", "south", "no")]
            .into_iter()
            .collect();
        let fields = vec!["region".to_string(), "care".to_string()];
        let maps: FxHashMap<String, ColourMap> = fields
            .iter()
            .map(|f| (f.clone(), colour_map(&queries, f, ColourScheme::Paired)))
            .collect();
        let style = TreeStyle {
            tallest: 2.0,
            colour_fields: &fields,
            colour_maps: &maps,
            scale_length: 0.1,
            scale_label: "1 SNP",
        };

        let scene = tree_scene(&tree, &labels_for(&tree), &queries, &style);
        // three tip markers plus one column marker per query tip
        assert_eq!(circles(&scene).len(), 5);
        assert_eq!(dashed_lines(&scene, SEPARATOR_WIDTH), 1);
        // only A sits short of the tallest tip
        assert_eq!(dashed_lines(&scene, LEADER_WIDTH), 1);
        let texts: Vec<&str> = scene.texts().collect();
        assert!(texts.contains(&"region"));
        assert!(texts.contains(&"care"));

        // tallest 2: space 0.2, text_start 2.4, division 0.2, tip_point 2.2
        let (a_x, _, a_size) = text_at(&scene, "A");
        let (c_x, _, c_size) = text_at(&scene, "C");
        assert!((a_x - page_x(2.0, 2.6)).abs() < 1e-6);
        assert!((c_x - page_x(2.0, 2.6)).abs() < 1e-6);
        assert_eq!(a_size, pt(QUERY_LABEL_SIZE));
        assert_eq!(c_size, pt(LABEL_SIZE));

        let column_x = page_x(2.0, 2.2);
        let in_column = circles(&scene)
            .iter()
            .filter(|(cx, _, _)| (cx - column_x).abs() < 1e-6)
            .count();
        assert_eq!(in_column, 2);

        // headers over the tip column and the extra column, level with max_y
        let header_room = text_width("region", HEADER_SIZE) + 5.0;
        let (region_x, region_y, _) = text_at(&scene, "region");
        let (care_x, care_y, _) = text_at(&scene, "care");
        assert!((region_x - page_x(2.0, 2.0)).abs() < 1e-6);
        assert!((care_x - column_x).abs() < 1e-6);
        assert!((region_y - (header_room + MARGIN)).abs() < 1e-6);
        assert_eq!(region_y, care_y);
    }

    #[test]
    fn shorter_trees_are_right_aligned() {
        let tree = parse("(A:1,B:1);").unwrap();
        let fields: Vec<String> = Vec::new();
        let maps = FxHashMap::default();
        let style = TreeStyle {
            tallest: 2.0,
            colour_fields: &fields,
            colour_maps: &maps,
            scale_length: 0.1,
            scale_label: "1 SNP",
        };
        let scene = tree_scene(&tree, &labels_for(&tree), &TaxonTable::default(), &style);
        for (cx, _, fill) in circles(&scene) {
            assert!((cx - page_x(2.0, 2.0)).abs() < 1e-6);
            assert_eq!(fill, DIMGREY);
        }
    }
}
