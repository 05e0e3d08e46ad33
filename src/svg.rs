use crate::scene::{Anchor, Baseline, Scene, Shape};

const FONT_FAMILY: &str = "'DejaVu Sans', 'Helvetica', 'Arial', sans-serif";

pub fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

/// Serialize a scene as a standalone SVG document.
pub fn render_svg(scene: &Scene) -> String {
    let mut svg = String::new();

    svg.push_str(&format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}">
<style>
  text {{ font-family: {font}; }}
</style>
<rect width="100%" height="100%" fill="white"/>
"#,
        w = scene.width,
        h = scene.height,
        font = FONT_FAMILY
    ));

    for shape in &scene.shapes {
        match shape {
            Shape::Line { x1, y1, x2, y2, colour, width, dash } => {
                let dash_attr = match dash {
                    Some(d) => format!(r#" stroke-dasharray="{:.2},{:.2}""#, d, d * 0.6),
                    None => String::new(),
                };
                svg.push_str(&format!(
                    r#"<line x1="{:.2}" y1="{:.2}" x2="{:.2}" y2="{:.2}" stroke="{}" stroke-width="{:.2}"{}/>"#,
                    x1, y1, x2, y2, colour, width, dash_attr
                ));
            }
            Shape::Circle { cx, cy, r, fill } => {
                svg.push_str(&format!(
                    r#"<circle cx="{:.2}" cy="{:.2}" r="{:.2}" fill="{}"/>"#,
                    cx, cy, r, fill
                ));
            }
            Shape::Rect { x, y, width, height, fill } => {
                svg.push_str(&format!(
                    r#"<rect x="{:.2}" y="{:.2}" width="{:.2}" height="{:.2}" fill="{}"/>"#,
                    x, y, width, height, fill
                ));
            }
            Shape::Text { x, y, text, size, colour, anchor, baseline, rotation, weight } => {
                let anchor = match anchor {
                    Anchor::Start => "start",
                    Anchor::Middle => "middle",
                    Anchor::End => "end",
                };
                let baseline = match baseline {
                    Baseline::Middle => "central",
                    Baseline::Bottom => "auto",
                    Baseline::Top => "hanging",
                };
                // SVG rotates clockwise
                let transform = if *rotation != 0.0 {
                    format!(r#" transform="rotate({:.1} {:.2} {:.2})""#, -rotation, x, y)
                } else {
                    String::new()
                };
                svg.push_str(&format!(
                    r#"<text x="{:.2}" y="{:.2}" font-size="{:.2}" font-weight="{}" fill="{}" text-anchor="{}" dominant-baseline="{}"{}>{}</text>"#,
                    x, y, size, weight, colour, anchor, baseline, transform, escape_xml(text)
                ));
            }
        }
        svg.push('\n');
    }

    svg.push_str("</svg>\n");
    svg
}
