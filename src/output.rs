//! Writing scenes to disk as SVG or PNG.

use crate::error::{Error, Result};
use crate::scene::Scene;
use crate::svg::render_svg;
use log::debug;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum Format {
    #[default]
    Svg,
    Png,
}

impl Format {
    pub fn extension(self) -> &'static str {
        match self {
            Format::Svg => "svg",
            Format::Png => "png",
        }
    }
}

/// System fonts are scanned once per process.
fn fonts() -> Arc<usvg::fontdb::Database> {
    static FONTS: OnceLock<Arc<usvg::fontdb::Database>> = OnceLock::new();
    FONTS
        .get_or_init(|| {
            let mut db = usvg::fontdb::Database::new();
            db.load_system_fonts();
            debug!("Loaded {} font faces", db.len());
            Arc::new(db)
        })
        .clone()
}

/// Rasterize an SVG document into an RGBA image.
pub fn rasterize(svg: &str) -> Result<image::RgbaImage> {
    let mut opt = usvg::Options::default();
    opt.fontdb = fonts();
    opt.font_family = "DejaVu Sans".to_string();
    let tree = usvg::Tree::from_str(svg, &opt)
        .map_err(|e| Error::Render(format!("failed to parse SVG: {}", e)))?;

    let size = tree.size().to_int_size();
    let mut pixmap = tiny_skia::Pixmap::new(size.width(), size.height())
        .ok_or_else(|| {
            Error::Render(format!(
                "cannot allocate {}x{} pixmap",
                size.width(),
                size.height()
            ))
        })?;
    pixmap.fill(tiny_skia::Color::WHITE);
    resvg::render(&tree, tiny_skia::Transform::identity(), &mut pixmap.as_mut());

    // The pixmap is premultiplied; the background is opaque so every pixel is too.
    image::RgbaImage::from_raw(size.width(), size.height(), pixmap.take())
        .ok_or_else(|| Error::Render("pixmap size mismatch".to_string()))
}

/// Write `scene` to `<dir>/<stem>.<ext>` and return the path.
pub fn write_figure(scene: &Scene, dir: &Path, stem: &str, format: Format) -> Result<PathBuf> {
    let path = dir.join(format!("{}.{}", stem, format.extension()));
    let svg = render_svg(scene);
    match format {
        Format::Svg => std::fs::write(&path, svg).map_err(|e| Error::io(&path, e))?,
        Format::Png => {
            let img = rasterize(&svg)?;
            img.save(&path)
                .map_err(|e| Error::Render(format!("{:?}: {}", path, e)))?;
        }
    }
    debug!("Wrote {:?}", path);
    Ok(path)
}
