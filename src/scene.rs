//! Backend-neutral drawing primitives in pixel space (y grows downwards).

use crate::colour::Rgb;

/// Pixels per inch of every figure.
pub const DPI: f64 = 100.0;

/// Points to pixels.
pub fn pt(points: f64) -> f64 {
    points * DPI / 72.0
}

/// Radius in pixels of a marker whose area is `area` square points.
pub fn marker_radius(area: f64) -> f64 {
    pt(area.sqrt() / 2.0)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Anchor {
    Start,
    Middle,
    End,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Baseline {
    /// Text centred on `y`
    Middle,
    /// Text sitting on `y`
    Bottom,
    /// Text hanging from `y`
    Top,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    Line {
        x1: f64,
        y1: f64,
        x2: f64,
        y2: f64,
        colour: Rgb,
        width: f64,
        dash: Option<f64>,
    },
    Circle {
        cx: f64,
        cy: f64,
        r: f64,
        fill: Rgb,
    },
    Rect {
        x: f64,
        y: f64,
        width: f64,
        height: f64,
        fill: Rgb,
    },
    Text {
        x: f64,
        y: f64,
        text: String,
        size: f64,
        colour: Rgb,
        anchor: Anchor,
        baseline: Baseline,
        /// Degrees, counter-clockwise
        rotation: f64,
        weight: u16,
    },
}

#[derive(Debug, Clone)]
pub struct Scene {
    pub width: f64,
    pub height: f64,
    pub shapes: Vec<Shape>,
}

impl Scene {
    pub fn new(width: f64, height: f64) -> Self {
        Scene {
            width,
            height,
            shapes: Vec::new(),
        }
    }

    pub fn push(&mut self, shape: Shape) {
        self.shapes.push(shape);
    }

    #[cfg(test)]
    pub fn texts(&self) -> impl Iterator<Item = &str> {
        self.shapes.iter().filter_map(|s| match s {
            Shape::Text { text, .. } => Some(text.as_str()),
            _ => None,
        })
    }
}

/// Maps a data rectangle (y up) onto a pixel rectangle (y down).
#[derive(Debug, Clone, Copy)]
pub struct Frame {
    pub x_min: f64,
    pub x_max: f64,
    pub y_min: f64,
    pub y_max: f64,
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl Frame {
    pub fn px(&self, x: f64) -> f64 {
        let span = self.x_max - self.x_min;
        if span == 0.0 {
            return self.left;
        }
        self.left + (x - self.x_min) / span * self.width
    }

    pub fn py(&self, y: f64) -> f64 {
        let span = self.y_max - self.y_min;
        if span == 0.0 {
            return self.top + self.height / 2.0;
        }
        self.top + (self.y_max - y) / span * self.height
    }

    pub fn line(
        &self,
        (x1, y1): (f64, f64),
        (x2, y2): (f64, f64),
        colour: Rgb,
        width_pt: f64,
        dash: Option<f64>,
    ) -> Shape {
        Shape::Line {
            x1: self.px(x1),
            y1: self.py(y1),
            x2: self.px(x2),
            y2: self.py(y2),
            colour,
            width: pt(width_pt),
            dash: dash.map(pt),
        }
    }

    pub fn marker(&self, x: f64, y: f64, area: f64, fill: Rgb) -> Shape {
        Shape::Circle {
            cx: self.px(x),
            cy: self.py(y),
            r: marker_radius(area),
            fill,
        }
    }
}
