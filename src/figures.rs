//! Auxiliary figures: colour legends and per-tree trait bar charts.

use crate::collapsed::ranked_counts;
use crate::colour::{ColourMap, BLACK, DIMGREY, HIGHLIGHT};
use crate::error::{Error, Result};
use crate::metadata::TaxonTable;
use crate::scene::{pt, Anchor, Baseline, Frame, Scene, Shape, DPI};
use std::path::Path;

const LEGEND_RADIUS: f64 = 0.05;
const LEGEND_FONT: f64 = 8.0;

const CHART_WIDTH_IN: f64 = 5.0;
const CHART_HEIGHT_IN: f64 = 2.5;
const CHART_FONT: f64 = 9.0;
const MAX_BARS: usize = 10;

/// One row of coloured dots with the option name under each.
pub fn legend(colours: &ColourMap) -> Scene {
    let n = colours.len();
    let mut scene = Scene::new((n + 1) as f64 * DPI, DPI);
    let frame = Frame {
        x_min: -1.0,
        x_max: n as f64,
        y_min: 0.0,
        y_max: 1.0,
        left: 0.0,
        top: 0.0,
        width: scene.width,
        height: scene.height,
    };

    for (i, (option, colour)) in colours.entries().iter().enumerate() {
        let x = i as f64;
        scene.push(Shape::Circle {
            cx: frame.px(x),
            cy: frame.py(0.5),
            r: LEGEND_RADIUS * DPI,
            fill: *colour,
        });
        scene.push(Shape::Text {
            x: frame.px(x - 0.1),
            y: frame.py(0.3),
            text: option.clone(),
            size: pt(LEGEND_FONT),
            colour: BLACK,
            anchor: Anchor::Start,
            baseline: Baseline::Bottom,
            rotation: 0.0,
            weight: 400,
        });
    }
    scene
}

/// Node-summary value counts for the non-query taxa of one tree.
#[derive(Debug, Clone, PartialEq)]
pub struct TraitCounts {
    pub tree: usize,
    pub counts: Vec<(String, usize)>,
}

impl TraitCounts {
    /// Only trees with a real mix of values get a chart.
    pub fn worth_plotting(&self) -> bool {
        self.counts.len() > 2
    }
}

/// Count node-summary values per tree. `members` pairs a tree number with the taxa
/// placed in it (tips and collapsed-node members).
pub fn describe_traits(
    metadata: &TaxonTable,
    queries: &TaxonTable,
    members: &[(usize, Vec<String>)],
) -> Vec<TraitCounts> {
    members
        .iter()
        .map(|(tree, taxa)| {
            let values = taxa
                .iter()
                .filter(|t| !queries.contains_key(t.as_str()))
                .filter_map(|t| metadata.get(t))
                .map(|t| t.node_summary.as_str());
            TraitCounts {
                tree: *tree,
                counts: ranked_counts(values)
                    .into_iter()
                    .map(|(v, c)| (v.to_string(), c))
                    .collect(),
            }
        })
        .filter(|tc| !tc.counts.is_empty())
        .collect()
}

/// Tick spacing giving at most about five integer ticks.
fn tick_step(max: usize) -> usize {
    let raw = (max as f64 / 5.0).max(1.0);
    let magnitude = 10f64.powf(raw.log10().floor());
    let step = [1.0, 2.0, 5.0, 10.0]
        .iter()
        .map(|m| m * magnitude)
        .find(|&s| s >= raw)
        .unwrap_or(10.0 * magnitude);
    step.max(1.0) as usize
}

fn text(x: f64, y: f64, text: String, anchor: Anchor, baseline: Baseline, rotation: f64) -> Shape {
    Shape::Text {
        x,
        y,
        text,
        size: pt(CHART_FONT),
        colour: BLACK,
        anchor,
        baseline,
        rotation,
        weight: 400,
    }
}

/// Bar chart of the most common values, tallest first.
pub fn trait_bar_chart(counts: &TraitCounts, x_label: &str) -> Scene {
    let bars: Vec<&(String, usize)> = counts.counts.iter().take(MAX_BARS).collect();
    let max = bars.iter().map(|(_, c)| *c).max().unwrap_or(1).max(1);
    let step = tick_step(max);
    let y_top = max.div_ceil(step) * step;

    let font_px = pt(CHART_FONT);
    let longest = bars.iter().map(|(v, _)| v.chars().count()).max().unwrap_or(1) as f64;
    let label_room = longest * font_px * 0.6 + 8.0;

    let left = 3.5 * font_px + 20.0;
    let bottom = label_room + 2.0 * font_px;
    let width = CHART_WIDTH_IN * DPI;
    let plot_height = CHART_HEIGHT_IN * DPI - 20.0;
    let mut scene = Scene::new(width, 10.0 + plot_height + bottom);

    let frame = Frame {
        x_min: -0.5,
        x_max: bars.len() as f64 - 0.5,
        y_min: 0.0,
        y_max: y_top as f64,
        left,
        top: 10.0,
        width: width - left - 10.0,
        height: plot_height,
    };
    let baseline_y = frame.py(0.0);

    for (i, (value, count)) in bars.iter().enumerate() {
        let x = i as f64;
        let top = frame.py(*count as f64);
        scene.push(Shape::Rect {
            x: frame.px(x - 0.4),
            y: top,
            width: frame.px(x + 0.4) - frame.px(x - 0.4),
            height: baseline_y - top,
            fill: HIGHLIGHT,
        });
        scene.push(text(
            frame.px(x),
            baseline_y + 4.0,
            value.clone(),
            Anchor::End,
            Baseline::Middle,
            90.0,
        ));
    }

    // Left and bottom spines only
    scene.push(Shape::Line {
        x1: left,
        y1: frame.top,
        x2: left,
        y2: baseline_y,
        colour: BLACK,
        width: 1.0,
        dash: None,
    });
    scene.push(Shape::Line {
        x1: left,
        y1: baseline_y,
        x2: left + frame.width,
        y2: baseline_y,
        colour: BLACK,
        width: 1.0,
        dash: None,
    });

    for tick in (0..=y_top).step_by(step) {
        let y = frame.py(tick as f64);
        scene.push(Shape::Line {
            x1: left - 4.0,
            y1: y,
            x2: left,
            y2: y,
            colour: BLACK,
            width: 1.0,
            dash: None,
        });
        scene.push(text(left - 6.0, y, tick.to_string(), Anchor::End, Baseline::Middle, 0.0));
    }

    scene.push(text(
        font_px,
        frame.top + frame.height / 2.0,
        "Number of sequences".to_string(),
        Anchor::Middle,
        Baseline::Top,
        90.0,
    ));
    scene.push(Shape::Text {
        x: left + frame.width / 2.0,
        y: scene.height - 4.0,
        text: x_label.to_string(),
        size: pt(CHART_FONT),
        colour: DIMGREY,
        anchor: Anchor::Middle,
        baseline: Baseline::Bottom,
        rotation: 0.0,
        weight: 400,
    });
    scene
}

pub fn write_counts_tsv(path: &Path, counts: &TraitCounts, field: &str) -> Result<()> {
    let mut content = format!("{}\tNumber of sequences\n", field);
    for (value, count) in &counts.counts {
        content.push_str(&format!("{}\t{}\n", value, count));
    }
    std::fs::write(path, content).map_err(|e| Error::io(path, e))
}
