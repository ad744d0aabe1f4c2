use std::path::Path;

use ab_glyph::{Font, FontArc, GlyphId, ScaleFont, point};
use image::Rgba;

use crate::canvas::{PixelRect, Surface, blend_over};

/// Families offered by the text tool.
pub const FONT_FAMILIES: &[&str] = &[
    "Arial",
    "Times New Roman",
    "Courier New",
    "Verdana",
    "Georgia",
    "Comic Sans MS",
    "Impact",
];

pub const DEFAULT_FONT_FAMILY: &str = "Arial";
pub const DEFAULT_FONT_SIZE: f32 = 16.0;
pub const MIN_FONT_SIZE: f32 = 8.0;
pub const MAX_FONT_SIZE: f32 = 120.0;

pub fn clamp_font_size(size: f32) -> f32 {
    if size.is_nan() {
        return DEFAULT_FONT_SIZE;
    }
    size.clamp(MIN_FONT_SIZE, MAX_FONT_SIZE)
}

/// Lay out one line with kerning.  Positions are relative to the line's
/// baseline start.  Returns `(glyphs, advance_width)`.
pub fn layout_line(font: &FontArc, text: &str, font_size: f32) -> (Vec<(GlyphId, f32)>, f32) {
    let scaled = font.as_scaled(font_size);
    let mut glyphs = Vec::with_capacity(text.len());
    let mut cursor_x = 0.0f32;
    let mut last: Option<GlyphId> = None;

    for ch in text.chars() {
        let id = font.glyph_id(ch);
        if let Some(prev) = last {
            cursor_x += scaled.kern(prev, id);
        }
        glyphs.push((id, cursor_x));
        cursor_x += scaled.h_advance(id);
        last = Some(id);
    }
    (glyphs, cursor_x)
}

/// Coverage-tinted RGBA stamp of some text.
pub struct RasterizedText {
    pub buf: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub x: i32,
    pub y: i32,
}

/// Rasterize `text` with its first baseline starting at (`origin_x`,
/// `origin_y`).  Lines split on `'\n'`.  Clipped to the canvas; `None` when
/// nothing visible remains.
#[allow(clippy::too_many_arguments)]
pub fn rasterize_text(
    font: &FontArc,
    text: &str,
    font_size: f32,
    origin_x: f32,
    origin_y: f32,
    color: Rgba<u8>,
    anti_alias: bool,
    canvas_w: u32,
    canvas_h: u32,
) -> Option<RasterizedText> {
    let line_height = font.as_scaled(font_size).height();

    let mut placed: Vec<(GlyphId, f32, f32)> = Vec::new();
    for (line_idx, line) in text.split('\n').enumerate() {
        let baseline = line_idx as f32 * line_height;
        let (glyphs, _) = layout_line(font, line, font_size);
        placed.extend(glyphs.into_iter().map(|(id, gx)| (id, gx, baseline)));
    }

    let mut min_x = f32::MAX;
    let mut min_y = f32::MAX;
    let mut max_x = f32::MIN;
    let mut max_y = f32::MIN;
    for &(id, gx, gy) in &placed {
        let bounds = font.glyph_bounds(&id.with_scale_and_position(font_size, point(gx, gy)));
        min_x = min_x.min(bounds.min.x);
        min_y = min_y.min(bounds.min.y);
        max_x = max_x.max(bounds.max.x);
        max_y = max_y.max(bounds.max.y);
    }
    if min_x >= max_x || min_y >= max_y {
        return None;
    }

    let pad = 2.0;
    let x0 = ((origin_x + min_x - pad).floor() as i32).max(0);
    let y0 = ((origin_y + min_y - pad).floor() as i32).max(0);
    let x1 = ((origin_x + max_x + pad).ceil() as i32).min(canvas_w as i32);
    let y1 = ((origin_y + max_y + pad).ceil() as i32).min(canvas_h as i32);
    if x1 <= x0 || y1 <= y0 {
        return None;
    }
    let buf_w = (x1 - x0) as u32;
    let buf_h = (y1 - y0) as u32;

    let mut coverage = vec![0.0f32; buf_w as usize * buf_h as usize];
    for &(id, gx, gy) in &placed {
        let glyph = id.with_scale_and_position(font_size, point(origin_x + gx, origin_y + gy));
        let Some(outlined) = font.outline_glyph(glyph) else {
            continue;
        };
        let b = outlined.px_bounds();
        outlined.draw(|px, py, cov| {
            let ix = (b.min.x as i32 + px as i32) - x0;
            let iy = (b.min.y as i32 + py as i32) - y0;
            if ix < 0 || iy < 0 || ix as u32 >= buf_w || iy as u32 >= buf_h {
                return;
            }
            let idx = iy as usize * buf_w as usize + ix as usize;
            let v = if anti_alias {
                cov
            } else if cov > 0.5 {
                1.0
            } else {
                0.0
            };
            coverage[idx] = coverage[idx].max(v);
        });
    }

    let mut buf = vec![0u8; coverage.len() * 4];
    let mut any = false;
    for (i, &cov) in coverage.iter().enumerate() {
        if cov > 0.001 {
            any = true;
            let idx = i * 4;
            buf[idx] = color[0];
            buf[idx + 1] = color[1];
            buf[idx + 2] = color[2];
            buf[idx + 3] = (color[3] as f32 * cov).round().min(255.0) as u8;
        }
    }
    if !any {
        return None;
    }

    Some(RasterizedText {
        buf,
        width: buf_w,
        height: buf_h,
        x: x0,
        y: y0,
    })
}

/// Draw `text` onto the surface at `opacity`.  Returns the touched region.
#[allow(clippy::too_many_arguments)]
pub fn stamp_text(
    surface: &mut Surface,
    font: &FontArc,
    text: &str,
    font_size: f32,
    origin: (f32, f32),
    color: Rgba<u8>,
    opacity: f32,
    anti_alias: bool,
) -> Option<PixelRect> {
    if surface.is_empty() || text.trim().is_empty() {
        return None;
    }
    let raster = rasterize_text(
        font,
        text,
        clamp_font_size(font_size),
        origin.0,
        origin.1,
        color,
        anti_alias,
        surface.width(),
        surface.height(),
    )?;

    let img = surface.image_mut();
    let row_bytes = raster.width as usize * 4;
    for (row, src) in raster.buf.chunks_exact(row_bytes).enumerate() {
        let ty = raster.y as u32 + row as u32;
        for (col, px) in src.chunks_exact(4).enumerate() {
            if px[3] == 0 {
                continue;
            }
            let tx = raster.x as u32 + col as u32;
            let dst = img.get_pixel_mut(tx, ty);
            *dst = blend_over(*dst, Rgba([px[0], px[1], px[2], px[3]]), opacity);
        }
    }
    let rect = PixelRect::new(raster.x as u32, raster.y as u32, raster.width, raster.height);
    surface.mark_dirty(Some(rect));
    Some(rect)
}

/// Sorted, deduplicated system font family names.
pub fn enumerate_system_fonts() -> Vec<String> {
    match font_kit::source::SystemSource::new().all_families() {
        Ok(mut families) => {
            families.sort();
            families.dedup();
            families
        }
        Err(_) => FONT_FAMILIES.iter().map(|s| s.to_string()).collect(),
    }
}

/// Load a font by family name, CSS weight and style from the system.
pub fn load_system_font(family: &str, weight: u16, italic: bool) -> Option<FontArc> {
    use font_kit::family_name::FamilyName;
    use font_kit::properties::{Properties, Style, Weight};
    use font_kit::source::SystemSource;

    let mut props = Properties::new();
    props.weight = Weight(weight as f32);
    if italic {
        props.style = Style::Italic;
    }

    let source = SystemSource::new();
    let handle = source
        .select_best_match(&[FamilyName::Title(family.to_string()), FamilyName::SansSerif], &props)
        .ok()?;

    let font = handle.load().ok()?;
    let data = font.copy_font_data()?;
    FontArc::try_from_vec((*data).clone()).ok()
}

/// Load a TTF/OTF file directly.
pub fn load_font_file(path: &Path) -> Option<FontArc> {
    let bytes = std::fs::read(path).ok()?;
    FontArc::try_from_vec(bytes).ok()
}

/// Font resolution used by the text tool: explicit file, then the named
/// family, then any sans-serif the system has.
pub fn resolve_font(family: &str, font_path: Option<&Path>) -> Option<FontArc> {
    if let Some(path) = font_path {
        match load_font_file(path) {
            Some(f) => return Some(f),
            None => crate::log_warn!("text: cannot load font file {}", path.display()),
        }
    }
    let font = load_system_font(family, 400, false);
    if font.is_none() {
        crate::log_warn!("text: no system font found for '{}'", family);
    }
    font
}
