//! Page rasterizer.
//!
//! Walks a page's content stream and paints it onto a white tiny-skia
//! canvas: filled and stroked paths with clipping, images with soft and
//! stencil masks, and text drawn from font outlines or Type 3 glyph
//! procedures. Shadings, pattern fills and inline images are reported as
//! `UnsupportedContent` so the caller can skip the trial instead of
//! silently dropping page content.

use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use image::{DynamicImage, GrayImage, RgbImage, RgbaImage};
use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use tiny_skia::{
    Color, FillRule, FilterQuality, LineCap, LineJoin, Mask, Paint, Path, PathBuilder, Pixmap,
    PixmapPaint, Stroke, StrokeDash, Transform,
};
use ttf_parser::{Face, OutlineBuilder};

use super::fonts::{FontProgram, PdfFont};
use super::RenderedPage;
use crate::codec;
use crate::error::DocumentError;

/// US Letter, used when no MediaBox is found up the page tree
const DEFAULT_PAGE_SIZE: (f32, f32) = (612.0, 792.0);

/// Largest canvas or placed image we are willing to allocate
const MAX_RENDER_PIXELS: u64 = 50_000_000;

/// Image codecs lopdf cannot unfilter
const OPAQUE_FILTERS: [&[u8]; 3] = [b"CCITTFaxDecode", b"JBIG2Decode", b"JPXDecode"];

#[derive(Clone)]
struct TextState<'a> {
    font: Option<Rc<PdfFont<'a>>>,
    size: f32,
    char_spacing: f32,
    word_spacing: f32,
    h_scale: f32,
    leading: f32,
    rise: f32,
    mode: i64,
}

#[derive(Clone)]
struct GraphicsState<'a> {
    /// User space to device pixels
    ctm: Transform,
    fill: Color,
    stroke: Color,
    fill_alpha: f32,
    stroke_alpha: f32,
    line_width: f32,
    line_cap: LineCap,
    line_join: LineJoin,
    miter_limit: f32,
    dash: Option<(Vec<f32>, f32)>,
    clip: Option<Rc<Mask>>,
    text: TextState<'a>,
}

impl<'a> GraphicsState<'a> {
    fn new(ctm: Transform) -> Self {
        Self {
            ctm,
            fill: Color::BLACK,
            stroke: Color::BLACK,
            fill_alpha: 1.0,
            stroke_alpha: 1.0,
            line_width: 1.0,
            line_cap: LineCap::Butt,
            line_join: LineJoin::Miter,
            miter_limit: 10.0,
            dash: None,
            clip: None,
            text: TextState {
                font: None,
                size: 0.0,
                char_spacing: 0.0,
                word_spacing: 0.0,
                h_scale: 1.0,
                leading: 0.0,
                rise: 0.0,
                mode: 0,
            },
        }
    }

    fn clip_mask(&self) -> Option<&Mask> {
        self.clip.as_deref()
    }
}

struct PageRenderer<'a> {
    doc: &'a Document,
    pixmap: Pixmap,
    /// Current path in user space
    path: PathBuilder,
    current: (f32, f32),
    subpath_start: (f32, f32),
    pending_clip: Option<FillRule>,
    text_matrix: Transform,
    line_matrix: Transform,
    fonts: HashMap<ObjectId, Rc<PdfFont<'a>>>,
    /// Forms and glyph procedures being drawn, to stop self-reference
    visited: HashSet<ObjectId>,
}

/// Render one page at `dpi` onto a white RGB canvas
pub fn render_page(
    doc: &Document,
    page_id: ObjectId,
    dpi: u32,
) -> Result<RenderedPage, DocumentError> {
    let page_dict = doc.get_object(page_id)?.as_dict()?;
    let (origin_x, origin_y, width_pt, height_pt) = media_box(doc, page_id)?;

    let scale = dpi as f32 / 72.0;
    let width = (width_pt * scale).ceil().max(1.0) as u32;
    let height = (height_pt * scale).ceil().max(1.0) as u32;
    if u64::from(width) * u64::from(height) > MAX_RENDER_PIXELS {
        return Err(DocumentError::RenderTooLarge { width, height });
    }
    let mut pixmap =
        Pixmap::new(width, height).ok_or(DocumentError::RenderTooLarge { width, height })?;
    pixmap.fill(Color::WHITE);

    let content_bytes = doc.get_page_content(page_id)?;
    let content = Content::decode(&content_bytes)?;
    let resources = inherited_resources(doc, page_dict, page_id)?;

    // PDF y grows upward from the MediaBox origin; pixel rows grow downward
    let base = Transform::from_row(
        scale,
        0.0,
        0.0,
        -scale,
        -origin_x * scale,
        (origin_y + height_pt) * scale,
    );
    let mut renderer = PageRenderer {
        doc,
        pixmap,
        path: PathBuilder::new(),
        current: (0.0, 0.0),
        subpath_start: (0.0, 0.0),
        pending_clip: None,
        text_matrix: Transform::identity(),
        line_matrix: Transform::identity(),
        fonts: HashMap::new(),
        visited: HashSet::new(),
    };
    let mut state = GraphicsState::new(base);
    renderer.run(&content.operations, resources, &mut state)?;

    // The canvas is opaque, so premultiplied and straight channels agree
    let rgb: Vec<u8> = renderer
        .pixmap
        .data()
        .chunks_exact(4)
        .flat_map(|px| [px[0], px[1], px[2]])
        .collect();
    let pixels = RgbImage::from_raw(width, height, rgb)
        .ok_or(DocumentError::RenderTooLarge { width, height })?;

    Ok(RenderedPage {
        pixels: DynamicImage::ImageRgb8(pixels),
        width_pt,
        height_pt,
    })
}

impl<'a> PageRenderer<'a> {
    fn run(
        &mut self,
        operations: &[Operation],
        resources: Option<&'a Dictionary>,
        state: &mut GraphicsState<'a>,
    ) -> Result<(), DocumentError> {
        let mut stack: Vec<GraphicsState<'a>> = Vec::new();

        for op in operations {
            match op.operator.as_str() {
                "q" => stack.push(state.clone()),
                "Q" => {
                    if let Some(prev) = stack.pop() {
                        *state = prev;
                    }
                }
                "cm" => {
                    if let Some(m) = op_transform(op) {
                        state.ctm = state.ctm.pre_concat(m);
                    }
                }
                "w" => {
                    if let Some(width) = op_f32(op, 0) {
                        state.line_width = width.max(0.0);
                    }
                }
                "J" => {
                    if let Some(cap) = op_i64(op, 0) {
                        state.line_cap = match cap {
                            1 => LineCap::Round,
                            2 => LineCap::Square,
                            _ => LineCap::Butt,
                        };
                    }
                }
                "j" => {
                    if let Some(join) = op_i64(op, 0) {
                        state.line_join = match join {
                            1 => LineJoin::Round,
                            2 => LineJoin::Bevel,
                            _ => LineJoin::Miter,
                        };
                    }
                }
                "M" => {
                    if let Some(limit) = op_f32(op, 0) {
                        state.miter_limit = limit.max(1.0);
                    }
                }
                "d" => state.dash = dash_operands(op),
                "gs" => {
                    if let Some(name) = op_name(op, 0) {
                        self.apply_ext_gstate(resources, name, state)?;
                    }
                }
                "g" => {
                    if let Some(gray) = op_f32(op, 0) {
                        state.fill = rgb_color(gray, gray, gray);
                    }
                }
                "G" => {
                    if let Some(gray) = op_f32(op, 0) {
                        state.stroke = rgb_color(gray, gray, gray);
                    }
                }
                "rg" => {
                    if let Some([r, g, b]) = op_f32_3(op) {
                        state.fill = rgb_color(r, g, b);
                    }
                }
                "RG" => {
                    if let Some([r, g, b]) = op_f32_3(op) {
                        state.stroke = rgb_color(r, g, b);
                    }
                }
                "k" => {
                    if let Some(color) = cmyk_operands(op) {
                        state.fill = color;
                    }
                }
                "K" => {
                    if let Some(color) = cmyk_operands(op) {
                        state.stroke = color;
                    }
                }
                "sc" | "scn" => state.fill = component_color(op)?,
                "SC" | "SCN" => state.stroke = component_color(op)?,

                "m" => {
                    if let Some([x, y]) = op_f32_2(op) {
                        self.path.move_to(x, y);
                        self.current = (x, y);
                        self.subpath_start = (x, y);
                    }
                }
                "l" => {
                    if let Some([x, y]) = op_f32_2(op) {
                        self.path.line_to(x, y);
                        self.current = (x, y);
                    }
                }
                "c" => {
                    if let Some([x1, y1, x2, y2, x, y]) = op_f32_6(op) {
                        self.path.cubic_to(x1, y1, x2, y2, x, y);
                        self.current = (x, y);
                    }
                }
                "v" => {
                    if let Some([x2, y2, x, y]) = op_f32_4(op) {
                        let (x1, y1) = self.current;
                        self.path.cubic_to(x1, y1, x2, y2, x, y);
                        self.current = (x, y);
                    }
                }
                "y" => {
                    if let Some([x1, y1, x, y]) = op_f32_4(op) {
                        self.path.cubic_to(x1, y1, x, y, x, y);
                        self.current = (x, y);
                    }
                }
                "h" => self.close_subpath(),
                "re" => {
                    if let Some([x, y, w, h]) = op_f32_4(op) {
                        self.path.move_to(x, y);
                        self.path.line_to(x + w, y);
                        self.path.line_to(x + w, y + h);
                        self.path.line_to(x, y + h);
                        self.path.close();
                        self.current = (x, y);
                        self.subpath_start = (x, y);
                    }
                }
                "f" | "F" => self.paint_path(state, Some(FillRule::Winding), false),
                "f*" => self.paint_path(state, Some(FillRule::EvenOdd), false),
                "S" => self.paint_path(state, None, true),
                "s" => {
                    self.close_subpath();
                    self.paint_path(state, None, true);
                }
                "B" => self.paint_path(state, Some(FillRule::Winding), true),
                "B*" => self.paint_path(state, Some(FillRule::EvenOdd), true),
                "b" => {
                    self.close_subpath();
                    self.paint_path(state, Some(FillRule::Winding), true);
                }
                "b*" => {
                    self.close_subpath();
                    self.paint_path(state, Some(FillRule::EvenOdd), true);
                }
                "n" => self.paint_path(state, None, false),
                "W" => self.pending_clip = Some(FillRule::Winding),
                "W*" => self.pending_clip = Some(FillRule::EvenOdd),

                "BT" => {
                    self.text_matrix = Transform::identity();
                    self.line_matrix = Transform::identity();
                }
                "Tf" => {
                    if let Some(name) = op_name(op, 0) {
                        state.text.font = self.font_resource(resources, name)?;
                    }
                    if let Some(size) = op_f32(op, 1) {
                        state.text.size = size;
                    }
                }
                "Tc" => {
                    if let Some(spacing) = op_f32(op, 0) {
                        state.text.char_spacing = spacing;
                    }
                }
                "Tw" => {
                    if let Some(spacing) = op_f32(op, 0) {
                        state.text.word_spacing = spacing;
                    }
                }
                "Tz" => {
                    if let Some(percent) = op_f32(op, 0) {
                        state.text.h_scale = percent / 100.0;
                    }
                }
                "TL" => {
                    if let Some(leading) = op_f32(op, 0) {
                        state.text.leading = leading;
                    }
                }
                "Ts" => {
                    if let Some(rise) = op_f32(op, 0) {
                        state.text.rise = rise;
                    }
                }
                "Tr" => {
                    if let Some(mode) = op_i64(op, 0) {
                        state.text.mode = mode;
                    }
                }
                "Td" | "TD" => {
                    if let Some([tx, ty]) = op_f32_2(op) {
                        if op.operator == "TD" {
                            state.text.leading = -ty;
                        }
                        self.move_text_line(tx, ty);
                    }
                }
                "Tm" => {
                    if let Some(m) = op_transform(op) {
                        self.text_matrix = m;
                        self.line_matrix = m;
                    }
                }
                "T*" => self.move_text_line(0.0, -state.text.leading),
                "Tj" => {
                    if let Some(bytes) = op_string(op, 0) {
                        self.show_text(bytes, state)?;
                    }
                }
                "'" => {
                    self.move_text_line(0.0, -state.text.leading);
                    if let Some(bytes) = op_string(op, 0) {
                        self.show_text(bytes, state)?;
                    }
                }
                "\"" => {
                    if let (Some(aw), Some(ac)) = (op_f32(op, 0), op_f32(op, 1)) {
                        state.text.word_spacing = aw;
                        state.text.char_spacing = ac;
                    }
                    self.move_text_line(0.0, -state.text.leading);
                    if let Some(bytes) = op_string(op, 2) {
                        self.show_text(bytes, state)?;
                    }
                }
                "TJ" => {
                    let Some(items) = op.operands.first().and_then(|o| o.as_array().ok()) else {
                        continue;
                    };
                    for item in items {
                        match item {
                            Object::String(bytes, _) => self.show_text(bytes, state)?,
                            other => {
                                if let Some(adjust) = obj_to_f32(other) {
                                    let text = &state.text;
                                    let tx = -adjust / 1000.0 * text.size * text.h_scale;
                                    self.advance_text(tx);
                                }
                            }
                        }
                    }
                }

                "Do" => {
                    if let Some(name) = op_name(op, 0) {
                        self.draw_xobject(resources, name, state)?;
                    }
                }
                "sh" => {
                    return Err(DocumentError::UnsupportedContent("shading".to_string()));
                }
                "BI" | "ID" | "EI" => {
                    return Err(DocumentError::UnsupportedContent("inline image".to_string()));
                }
                // Colour space selection, marked content, compatibility sections
                _ => {}
            }
        }

        Ok(())
    }

    fn close_subpath(&mut self) {
        self.path.close();
        self.current = self.subpath_start;
    }

    /// End the current path: paint it, then intersect the clip if `W` was seen
    fn paint_path(&mut self, state: &mut GraphicsState<'a>, fill: Option<FillRule>, stroke: bool) {
        let builder = std::mem::replace(&mut self.path, PathBuilder::new());
        let clip = self.pending_clip.take();
        let Some(path) = builder.finish() else {
            if clip.is_some() {
                // Clipping to an empty path hides everything after it
                state.clip = Mask::new(self.pixmap.width(), self.pixmap.height()).map(Rc::new);
            }
            return;
        };

        if let Some(rule) = fill {
            let paint = solid_paint(state.fill, state.fill_alpha);
            self.pixmap
                .fill_path(&path, &paint, rule, state.ctm, state.clip_mask());
        }
        if stroke {
            let paint = solid_paint(state.stroke, state.stroke_alpha);
            self.pixmap
                .stroke_path(&path, &paint, &build_stroke(state), state.ctm, state.clip_mask());
        }
        if let Some(rule) = clip {
            self.intersect_clip(state, &path, rule);
        }
    }

    fn intersect_clip(&self, state: &mut GraphicsState<'a>, path: &Path, rule: FillRule) {
        match state.clip.as_mut() {
            Some(mask) => Rc::make_mut(mask).intersect_path(path, rule, true, state.ctm),
            None => {
                let Some(mut mask) = Mask::new(self.pixmap.width(), self.pixmap.height()) else {
                    return;
                };
                mask.fill_path(path, rule, true, state.ctm);
                state.clip = Some(Rc::new(mask));
            }
        }
    }

    fn apply_ext_gstate(
        &self,
        resources: Option<&'a Dictionary>,
        name: &[u8],
        state: &mut GraphicsState<'a>,
    ) -> Result<(), DocumentError> {
        let doc = self.doc;
        let Some(states) = resources.and_then(|r| r.get(b"ExtGState").ok()) else {
            return Ok(());
        };
        let Ok(entry) = resolve(doc, states)?.as_dict()?.get(name) else {
            log::debug!("Missing ExtGState /{}", String::from_utf8_lossy(name));
            return Ok(());
        };
        let gs = resolve(doc, entry)?.as_dict()?;

        if let Some(alpha) = gs.get(b"ca").ok().and_then(obj_to_f32) {
            state.fill_alpha = alpha.clamp(0.0, 1.0);
        }
        if let Some(alpha) = gs.get(b"CA").ok().and_then(obj_to_f32) {
            state.stroke_alpha = alpha.clamp(0.0, 1.0);
        }
        if let Some(width) = gs.get(b"LW").ok().and_then(obj_to_f32) {
            state.line_width = width.max(0.0);
        }
        Ok(())
    }

    fn font_resource(
        &mut self,
        resources: Option<&'a Dictionary>,
        name: &[u8],
    ) -> Result<Option<Rc<PdfFont<'a>>>, DocumentError> {
        let doc = self.doc;
        let Some(fonts) = resources.and_then(|r| r.get(b"Font").ok()) else {
            log::debug!("No font resources for /{}", String::from_utf8_lossy(name));
            return Ok(None);
        };
        let Ok(entry) = resolve(doc, fonts)?.as_dict()?.get(name) else {
            log::debug!("Missing font /{}", String::from_utf8_lossy(name));
            return Ok(None);
        };

        let id = entry.as_reference().ok();
        if let Some(font) = id.and_then(|id| self.fonts.get(&id)) {
            return Ok(Some(font.clone()));
        }
        let font = Rc::new(PdfFont::load(doc, resolve(doc, entry)?.as_dict()?));
        if let Some(id) = id {
            self.fonts.insert(id, font.clone());
        }
        Ok(Some(font))
    }

    fn move_text_line(&mut self, tx: f32, ty: f32) {
        self.line_matrix = self.line_matrix.pre_concat(Transform::from_translate(tx, ty));
        self.text_matrix = self.line_matrix;
    }

    fn advance_text(&mut self, tx: f32) {
        self.text_matrix = self.text_matrix.pre_concat(Transform::from_translate(tx, 0.0));
    }

    fn show_text(&mut self, bytes: &[u8], state: &GraphicsState<'a>) -> Result<(), DocumentError> {
        let text = &state.text;
        let Some(font) = text.font.clone() else {
            // No font to measure with; keep later glyphs roughly in place
            self.advance_text(bytes.len() as f32 * 0.5 * text.size * text.h_scale);
            return Ok(());
        };
        let face = match &font.program {
            FontProgram::Outline(data) => Face::parse(data, 0).ok(),
            _ => None,
        };
        let font_space = Transform::from_row(
            text.size * text.h_scale,
            0.0,
            0.0,
            text.size,
            0.0,
            text.rise,
        );
        // 3 is invisible, 7 is clip-only
        let visible = !matches!(text.mode, 3 | 7);

        for code in font.codes(bytes) {
            if visible {
                let glyph_space = self.text_matrix.pre_concat(font_space);
                match (&font.program, face.as_ref()) {
                    (FontProgram::Type3 { .. }, _) => {
                        self.draw_type3_glyph(&font, code, glyph_space, state)?
                    }
                    (FontProgram::Outline(_), Some(face)) => {
                        self.draw_outline_glyph(&font, face, code, glyph_space, state)
                    }
                    _ => {}
                }
            }
            let mut tx = font.advance(code, face.as_ref()) / 1000.0 * text.size + text.char_spacing;
            if font.is_word_space(code) {
                tx += text.word_spacing;
            }
            self.advance_text(tx * text.h_scale);
        }
        Ok(())
    }

    fn draw_outline_glyph(
        &mut self,
        font: &PdfFont<'a>,
        face: &Face,
        code: u16,
        glyph_space: Transform,
        state: &GraphicsState<'a>,
    ) {
        let Some(gid) = font.glyph_id(face, code) else {
            return;
        };
        let mut builder = GlyphPathBuilder::new(1.0 / f32::from(face.units_per_em().max(1)));
        if face.outline_glyph(gid, &mut builder).is_none() {
            return;
        }
        // Into user space, so strokes keep the user-space line width
        let Some(path) = builder.finish().and_then(|p| p.transform(glyph_space)) else {
            return;
        };

        let mode = state.text.mode;
        if matches!(mode, 0 | 2 | 4 | 6) {
            let paint = solid_paint(state.fill, state.fill_alpha);
            self.pixmap
                .fill_path(&path, &paint, FillRule::Winding, state.ctm, state.clip_mask());
        }
        if matches!(mode, 1 | 2 | 5 | 6) {
            let paint = solid_paint(state.stroke, state.stroke_alpha);
            self.pixmap
                .stroke_path(&path, &paint, &build_stroke(state), state.ctm, state.clip_mask());
        }
    }

    fn draw_type3_glyph(
        &mut self,
        font: &PdfFont<'a>,
        code: u16,
        glyph_space: Transform,
        state: &GraphicsState<'a>,
    ) -> Result<(), DocumentError> {
        let FontProgram::Type3 {
            matrix, resources, ..
        } = &font.program
        else {
            return Ok(());
        };
        let Some(proc_id) = font.char_proc(code) else {
            return Ok(());
        };
        if !self.visited.insert(proc_id) {
            return Ok(());
        }
        let stream = self.doc.get_object(proc_id)?.as_stream()?;
        let content = Content::decode(&stream.get_plain_content()?)?;

        let mut nested = state.clone();
        nested.ctm = state.ctm.pre_concat(glyph_space).pre_concat(*matrix);
        let saved_path = std::mem::replace(&mut self.path, PathBuilder::new());
        let saved_text = (self.text_matrix, self.line_matrix);

        let result = self.run(&content.operations, *resources, &mut nested);

        self.path = saved_path;
        (self.text_matrix, self.line_matrix) = saved_text;
        self.visited.remove(&proc_id);
        result
    }

    fn draw_xobject(
        &mut self,
        resources: Option<&'a Dictionary>,
        name: &[u8],
        state: &GraphicsState<'a>,
    ) -> Result<(), DocumentError> {
        let doc = self.doc;
        let Some(xobjects) = resources.and_then(|r| r.get(b"XObject").ok()) else {
            log::debug!("No XObject resources for /{}", String::from_utf8_lossy(name));
            return Ok(());
        };
        let xobjects = resolve(doc, xobjects)?.as_dict()?;
        let Ok(Object::Reference(obj_id)) = xobjects.get(name) else {
            log::debug!("Missing XObject /{}", String::from_utf8_lossy(name));
            return Ok(());
        };
        let obj_id = *obj_id;
        let stream = doc.get_object(obj_id)?.as_stream()?;

        match stream.dict.get(b"Subtype").and_then(Object::as_name) {
            Ok(b"Image") => self.draw_image(stream, state),
            Ok(b"Form") => {
                if !self.visited.insert(obj_id) {
                    return Ok(());
                }
                let form_content = Content::decode(&stream.get_plain_content()?)?;
                let form_resources = match stream.dict.get(b"Resources") {
                    Ok(obj) => Some(resolve(doc, obj)?.as_dict()?),
                    Err(_) => resources,
                };
                let form_matrix = stream
                    .dict
                    .get(b"Matrix")
                    .ok()
                    .and_then(|obj| obj.as_array().ok())
                    .and_then(|arr| transform_from_objects(arr))
                    .unwrap_or_else(Transform::identity);

                let mut nested = state.clone();
                nested.ctm = state.ctm.pre_concat(form_matrix);
                let result = self.run(&form_content.operations, form_resources, &mut nested);
                self.visited.remove(&obj_id);
                result
            }
            _ => Ok(()),
        }
    }

    /// Images occupy the unit square of user space, first row at the top
    fn draw_image(
        &mut self,
        stream: &Stream,
        state: &GraphicsState<'a>,
    ) -> Result<(), DocumentError> {
        let image = image_pixmap(self.doc, stream, state.fill)?;
        let unit = Transform::from_row(
            1.0 / image.width() as f32,
            0.0,
            0.0,
            -1.0 / image.height() as f32,
            0.0,
            1.0,
        );
        let mut paint = PixmapPaint::default();
        paint.quality = FilterQuality::Bilinear;
        paint.opacity = state.fill_alpha;
        self.pixmap.draw_pixmap(
            0,
            0,
            image.as_ref(),
            &paint,
            state.ctm.pre_concat(unit),
            state.clip_mask(),
        );
        Ok(())
    }
}

/// Scales font units into glyph space while handing outlines to tiny-skia
struct GlyphPathBuilder {
    builder: PathBuilder,
    scale: f32,
}

impl GlyphPathBuilder {
    fn new(scale: f32) -> Self {
        Self {
            builder: PathBuilder::new(),
            scale,
        }
    }

    fn finish(self) -> Option<Path> {
        self.builder.finish()
    }
}

impl OutlineBuilder for GlyphPathBuilder {
    fn move_to(&mut self, x: f32, y: f32) {
        self.builder.move_to(x * self.scale, y * self.scale);
    }

    fn line_to(&mut self, x: f32, y: f32) {
        self.builder.line_to(x * self.scale, y * self.scale);
    }

    fn quad_to(&mut self, x1: f32, y1: f32, x: f32, y: f32) {
        let s = self.scale;
        self.builder.quad_to(x1 * s, y1 * s, x * s, y * s);
    }

    fn curve_to(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, x: f32, y: f32) {
        let s = self.scale;
        self.builder
            .cubic_to(x1 * s, y1 * s, x2 * s, y2 * s, x * s, y * s);
    }

    fn close(&mut self) {
        self.builder.close();
    }
}

fn build_stroke(state: &GraphicsState<'_>) -> Stroke {
    let mut stroke = Stroke {
        width: state.line_width,
        miter_limit: state.miter_limit,
        line_cap: state.line_cap,
        line_join: state.line_join,
        ..Stroke::default()
    };
    if let Some((pattern, phase)) = &state.dash {
        let mut pattern = pattern.clone();
        if pattern.len() % 2 == 1 {
            pattern.extend_from_within(..);
        }
        stroke.dash = StrokeDash::new(pattern, *phase);
    }
    stroke
}

/// `[on off ...] phase d`; an empty array turns dashing off
fn dash_operands(op: &Operation) -> Option<(Vec<f32>, f32)> {
    let pattern: Vec<f32> = op
        .operands
        .first()?
        .as_array()
        .ok()?
        .iter()
        .filter_map(obj_to_f32)
        .map(f32::abs)
        .collect();
    if pattern.is_empty() || pattern.iter().all(|&v| v == 0.0) {
        return None;
    }
    Some((pattern, op_f32(op, 1).unwrap_or(0.0)))
}

fn solid_paint(color: Color, alpha: f32) -> Paint<'static> {
    let mut paint = Paint::default();
    paint.set_color(
        Color::from_rgba(color.red(), color.green(), color.blue(), alpha.clamp(0.0, 1.0))
            .unwrap_or(Color::BLACK),
    );
    paint.anti_alias = true;
    paint
}

/// Pixels of an image XObject, with its soft mask or stencil applied as alpha
fn image_pixmap(doc: &Document, stream: &Stream, fill: Color) -> Result<Pixmap, DocumentError> {
    let dict = &stream.dict;
    if dict
        .get(b"ImageMask")
        .and_then(Object::as_bool)
        .unwrap_or(false)
    {
        return stencil_pixmap(stream, fill);
    }

    let image = decode_image_xobject(doc, stream)?;
    let alpha = match dict.get(b"SMask").map(|obj| resolve(doc, obj)) {
        Ok(Ok(Object::Stream(smask))) => {
            Some(soft_mask(doc, smask, image.width(), image.height())?)
        }
        _ => None,
    };
    rgba_pixmap(&image.to_rgba8(), alpha.as_ref())
}

/// Gray soft mask, resampled to the image it belongs to
fn soft_mask(
    doc: &Document,
    smask: &Stream,
    width: u32,
    height: u32,
) -> Result<GrayImage, DocumentError> {
    let mask = decode_image_xobject(doc, smask)?;
    if (mask.width(), mask.height()) == (width, height) {
        return Ok(mask.to_luma8());
    }
    Ok(codec::resample(&mask, width, height)?.to_luma8())
}

/// 1-bit stencil painted in the current fill colour
fn stencil_pixmap(stream: &Stream, fill: Color) -> Result<Pixmap, DocumentError> {
    let dict = &stream.dict;
    reject_opaque_filters(dict)?;
    let width = dict_u32(dict, b"Width")?;
    let height = dict_u32(dict, b"Height")?;
    check_image_size(width, height)?;

    let data = stream.get_plain_content()?;
    // Samples of 0 are painted unless Decode is [1 0]; either way they come back black
    let coverage = unpack_bilevel(&data, width, height, decode_inverted(dict))?.to_luma8();
    let [r, g, b] = [fill.red(), fill.green(), fill.blue()].map(channel);
    let rgba = RgbaImage::from_fn(width, height, |x, y| {
        image::Rgba([r, g, b, 255 - coverage.get_pixel(x, y).0[0]])
    });
    rgba_pixmap(&rgba, None)
}

fn rgba_pixmap(rgba: &RgbaImage, alpha: Option<&GrayImage>) -> Result<Pixmap, DocumentError> {
    let (width, height) = rgba.dimensions();
    let mut pixmap =
        Pixmap::new(width, height).ok_or(DocumentError::RenderTooLarge { width, height })?;
    let alpha_values = alpha.map(|mask| mask.as_raw().as_slice());

    for (i, (src, dst)) in rgba
        .as_raw()
        .chunks_exact(4)
        .zip(pixmap.data_mut().chunks_exact_mut(4))
        .enumerate()
    {
        let a = match alpha_values {
            Some(values) => values.get(i).copied().unwrap_or(255),
            None => src[3],
        };
        dst[0] = premul_u8(src[0], a);
        dst[1] = premul_u8(src[1], a);
        dst[2] = premul_u8(src[2], a);
        dst[3] = a;
    }
    Ok(pixmap)
}

fn premul_u8(channel: u8, alpha: u8) -> u8 {
    let prod = u16::from(channel) * u16::from(alpha) + 127;
    ((prod + (prod >> 8)) >> 8) as u8
}

fn reject_opaque_filters(dict: &Dictionary) -> Result<(), DocumentError> {
    match filter_names(dict)
        .into_iter()
        .find(|name| OPAQUE_FILTERS.contains(&name.as_slice()))
    {
        Some(name) => Err(DocumentError::UnsupportedContent(format!(
            "{} image",
            String::from_utf8_lossy(&name)
        ))),
        None => Ok(()),
    }
}

fn check_image_size(width: u32, height: u32) -> Result<(), DocumentError> {
    if u64::from(width) * u64::from(height) > MAX_RENDER_PIXELS {
        return Err(DocumentError::RenderTooLarge { width, height });
    }
    Ok(())
}

fn decode_inverted(dict: &Dictionary) -> bool {
    dict.get(b"Decode")
        .and_then(Object::as_array)
        .ok()
        .and_then(|arr| arr.first())
        .and_then(obj_to_f32)
        .is_some_and(|first| first > 0.5)
}

/// Decode an image XObject into pixels.
///
/// JPEG data goes straight to the codec; everything else is unfiltered by
/// lopdf and interpreted according to its colour space.
fn decode_image_xobject(doc: &Document, stream: &Stream) -> Result<DynamicImage, DocumentError> {
    let dict = &stream.dict;
    reject_opaque_filters(dict)?;

    let filters = filter_names(dict);
    if filters.last().map(Vec::as_slice) == Some(b"DCTDecode".as_slice()) {
        if filters.len() > 1 {
            return Err(DocumentError::UnsupportedContent(
                "chained JPEG filter".to_string(),
            ));
        }
        return Ok(codec::decode(&stream.content)?);
    }

    let width = dict_u32(dict, b"Width")?;
    let height = dict_u32(dict, b"Height")?;
    check_image_size(width, height)?;
    let bits = dict.get(b"BitsPerComponent").and_then(Object::as_i64).unwrap_or(8);
    let data = stream.get_plain_content()?;
    let color_space = match dict.get(b"ColorSpace") {
        Ok(obj) => ColorSpace::parse(doc, obj)?,
        Err(_) => ColorSpace::Gray,
    };

    match (color_space, bits) {
        (ColorSpace::Gray, 1) => unpack_bilevel(&data, width, height, decode_inverted(dict)),
        (color_space, 8) => raw_to_image(&data, width, height, color_space),
        (_, bits) => Err(DocumentError::UnsupportedContent(format!(
            "{} bits per component",
            bits
        ))),
    }
}

#[derive(Clone, Debug)]
enum ColorSpace {
    Gray,
    Rgb,
    Cmyk,
    /// Palette of packed RGB triples
    Indexed(Vec<u8>),
}

impl ColorSpace {
    fn parse(doc: &Document, obj: &Object) -> Result<Self, DocumentError> {
        match resolve(doc, obj)? {
            Object::Name(name) => Self::from_name(name),
            Object::Array(arr) => {
                let family = arr.first().and_then(|o| o.as_name().ok()).unwrap_or(b"");
                match family {
                    b"ICCBased" => {
                        let profile = arr
                            .get(1)
                            .ok_or_else(|| unsupported_space("ICCBased without profile"))?;
                        let components = resolve(doc, profile)?
                            .as_stream()?
                            .dict
                            .get(b"N")
                            .and_then(Object::as_i64)
                            .unwrap_or(3);
                        match components {
                            1 => Ok(ColorSpace::Gray),
                            3 => Ok(ColorSpace::Rgb),
                            4 => Ok(ColorSpace::Cmyk),
                            n => Err(unsupported_space(&format!("ICCBased with {} components", n))),
                        }
                    }
                    b"Indexed" => Self::parse_indexed(doc, arr),
                    b"CalRGB" => Ok(ColorSpace::Rgb),
                    b"CalGray" => Ok(ColorSpace::Gray),
                    other => Err(unsupported_space(&String::from_utf8_lossy(other))),
                }
            }
            _ => Err(unsupported_space("malformed colour space")),
        }
    }

    fn from_name(name: &[u8]) -> Result<Self, DocumentError> {
        match name {
            b"DeviceGray" | b"CalGray" | b"G" => Ok(ColorSpace::Gray),
            b"DeviceRGB" | b"CalRGB" | b"RGB" => Ok(ColorSpace::Rgb),
            b"DeviceCMYK" | b"CMYK" => Ok(ColorSpace::Cmyk),
            other => Err(unsupported_space(&String::from_utf8_lossy(other))),
        }
    }

    /// `[/Indexed base hival lookup]` with an RGB base
    fn parse_indexed(doc: &Document, arr: &[Object]) -> Result<Self, DocumentError> {
        let (Some(base), Some(lookup)) = (arr.get(1), arr.get(3)) else {
            return Err(unsupported_space("truncated Indexed"));
        };
        match Self::parse(doc, base)? {
            ColorSpace::Rgb => {}
            _ => return Err(unsupported_space("Indexed over a non-RGB base")),
        }
        let palette = match resolve(doc, lookup)? {
            Object::String(bytes, _) => bytes.clone(),
            Object::Stream(stream) => stream.get_plain_content()?,
            _ => return Err(unsupported_space("Indexed lookup")),
        };
        Ok(ColorSpace::Indexed(palette))
    }
}

fn unsupported_space(what: &str) -> DocumentError {
    DocumentError::UnsupportedContent(format!("colour space {}", what))
}

fn raw_to_image(
    data: &[u8],
    width: u32,
    height: u32,
    color_space: ColorSpace,
) -> Result<DynamicImage, DocumentError> {
    let pixels = width as usize * height as usize;
    let short = |needed: usize| {
        DocumentError::UnsupportedContent(format!(
            "image data holds {} bytes, expected {}",
            data.len(),
            needed
        ))
    };

    let image = match color_space {
        ColorSpace::Gray => {
            let raw = data.get(..pixels).ok_or_else(|| short(pixels))?;
            GrayImage::from_raw(width, height, raw.to_vec()).map(DynamicImage::ImageLuma8)
        }
        ColorSpace::Rgb => {
            let raw = data.get(..pixels * 3).ok_or_else(|| short(pixels * 3))?;
            RgbImage::from_raw(width, height, raw.to_vec()).map(DynamicImage::ImageRgb8)
        }
        ColorSpace::Cmyk => {
            let raw = data.get(..pixels * 4).ok_or_else(|| short(pixels * 4))?;
            let rgb = raw
                .chunks_exact(4)
                .flat_map(|cmyk| {
                    cmyk_to_rgb(
                        f32::from(cmyk[0]) / 255.0,
                        f32::from(cmyk[1]) / 255.0,
                        f32::from(cmyk[2]) / 255.0,
                        f32::from(cmyk[3]) / 255.0,
                    )
                    .map(channel)
                })
                .collect();
            RgbImage::from_raw(width, height, rgb).map(DynamicImage::ImageRgb8)
        }
        ColorSpace::Indexed(palette) => {
            let raw = data.get(..pixels).ok_or_else(|| short(pixels))?;
            let rgb = raw
                .iter()
                .flat_map(|&index| {
                    let at = usize::from(index) * 3;
                    match palette.get(at..at + 3) {
                        Some(entry) => [entry[0], entry[1], entry[2]],
                        None => [0, 0, 0],
                    }
                })
                .collect();
            RgbImage::from_raw(width, height, rgb).map(DynamicImage::ImageRgb8)
        }
    };

    image.ok_or_else(|| DocumentError::UnsupportedContent("image buffer size mismatch".to_string()))
}

/// 1-bit gray rows, each padded to a whole byte; 1 is white unless inverted
fn unpack_bilevel(
    data: &[u8],
    width: u32,
    height: u32,
    inverted: bool,
) -> Result<DynamicImage, DocumentError> {
    let row_bytes = (width as usize).div_ceil(8);
    if data.len() < row_bytes * height as usize {
        return Err(DocumentError::UnsupportedContent(
            "truncated 1-bit image".to_string(),
        ));
    }

    let mut gray = GrayImage::new(width, height);
    for (y, row) in data.chunks(row_bytes).take(height as usize).enumerate() {
        for x in 0..width as usize {
            let bit = (row[x / 8] >> (7 - (x % 8))) & 1;
            let white = (bit == 1) != inverted;
            gray.put_pixel(x as u32, y as u32, image::Luma([if white { 255 } else { 0 }]));
        }
    }
    Ok(DynamicImage::ImageLuma8(gray))
}

/// MediaBox as (x0, y0, width, height), inherited through the page tree
fn media_box(doc: &Document, mut id: ObjectId) -> Result<(f32, f32, f32, f32), DocumentError> {
    let mut seen = HashSet::new();
    while seen.insert(id) {
        let dict = doc.get_object(id)?.as_dict()?;
        if let Ok(obj) = dict.get(b"MediaBox") {
            if let Some(rect) = resolve(doc, obj)
                .ok()
                .and_then(|o| o.as_array().ok())
                .and_then(|arr| parse_rect(arr))
            {
                return Ok(rect);
            }
        }
        match dict.get(b"Parent").and_then(Object::as_reference) {
            Ok(parent) => id = parent,
            Err(_) => break,
        }
    }
    Ok((0.0, 0.0, DEFAULT_PAGE_SIZE.0, DEFAULT_PAGE_SIZE.1))
}

fn parse_rect(arr: &[Object]) -> Option<(f32, f32, f32, f32)> {
    if arr.len() < 4 {
        return None;
    }
    let x0 = obj_to_f32(&arr[0])?;
    let y0 = obj_to_f32(&arr[1])?;
    let x1 = obj_to_f32(&arr[2])?;
    let y1 = obj_to_f32(&arr[3])?;
    let width = (x1 - x0).abs().max(1.0);
    let height = (y1 - y0).abs().max(1.0);
    Some((x0.min(x1), y0.min(y1), width, height))
}

/// Resources dictionary of a page, inherited through the page tree
fn inherited_resources<'a>(
    doc: &'a Document,
    page_dict: &'a Dictionary,
    page_id: ObjectId,
) -> Result<Option<&'a Dictionary>, DocumentError> {
    let mut dict = page_dict;
    let mut seen = HashSet::from([page_id]);
    loop {
        if let Ok(obj) = dict.get(b"Resources") {
            return Ok(Some(resolve(doc, obj)?.as_dict()?));
        }
        match dict.get(b"Parent").and_then(Object::as_reference) {
            Ok(parent) if seen.insert(parent) => dict = doc.get_object(parent)?.as_dict()?,
            _ => return Ok(None),
        }
    }
}

pub(super) fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> Result<&'a Object, DocumentError> {
    match obj {
        Object::Reference(id) => Ok(doc.get_object(*id)?),
        _ => Ok(obj),
    }
}

fn filter_names(dict: &Dictionary) -> Vec<Vec<u8>> {
    match dict.get(b"Filter") {
        Ok(Object::Name(name)) => vec![name.clone()],
        Ok(Object::Array(arr)) => arr
            .iter()
            .filter_map(|o| o.as_name().ok().map(<[u8]>::to_vec))
            .collect(),
        _ => Vec::new(),
    }
}

fn dict_u32(dict: &Dictionary, key: &[u8]) -> Result<u32, DocumentError> {
    let value = dict.get(key).and_then(Object::as_i64)?;
    u32::try_from(value)
        .ok()
        .filter(|&v| v > 0)
        .ok_or_else(|| {
            DocumentError::UnsupportedContent(format!(
                "{} of {}",
                String::from_utf8_lossy(key),
                value
            ))
        })
}

fn transform_from_objects(arr: &[Object]) -> Option<Transform> {
    match arr {
        [a, b, c, d, e, f, ..] => Some(Transform::from_row(
            obj_to_f32(a)?,
            obj_to_f32(b)?,
            obj_to_f32(c)?,
            obj_to_f32(d)?,
            obj_to_f32(e)?,
            obj_to_f32(f)?,
        )),
        _ => None,
    }
}

fn op_transform(op: &Operation) -> Option<Transform> {
    transform_from_objects(&op.operands)
}

fn op_f32(op: &Operation, idx: usize) -> Option<f32> {
    obj_to_f32(op.operands.get(idx)?)
}

fn op_i64(op: &Operation, idx: usize) -> Option<i64> {
    let obj = op.operands.get(idx)?;
    obj.as_i64().ok().or_else(|| obj_to_f32(obj).map(|v| v as i64))
}

fn op_name<'o>(op: &'o Operation, idx: usize) -> Option<&'o [u8]> {
    op.operands.get(idx)?.as_name().ok()
}

fn op_string<'o>(op: &'o Operation, idx: usize) -> Option<&'o [u8]> {
    match op.operands.get(idx)? {
        Object::String(bytes, _) => Some(bytes),
        _ => None,
    }
}

fn op_f32_2(op: &Operation) -> Option<[f32; 2]> {
    Some([op_f32(op, 0)?, op_f32(op, 1)?])
}

fn op_f32_3(op: &Operation) -> Option<[f32; 3]> {
    Some([op_f32(op, 0)?, op_f32(op, 1)?, op_f32(op, 2)?])
}

fn op_f32_4(op: &Operation) -> Option<[f32; 4]> {
    Some([op_f32(op, 0)?, op_f32(op, 1)?, op_f32(op, 2)?, op_f32(op, 3)?])
}

fn op_f32_6(op: &Operation) -> Option<[f32; 6]> {
    Some([
        op_f32(op, 0)?,
        op_f32(op, 1)?,
        op_f32(op, 2)?,
        op_f32(op, 3)?,
        op_f32(op, 4)?,
        op_f32(op, 5)?,
    ])
}

pub(super) fn obj_to_f32(obj: &Object) -> Option<f32> {
    if let Ok(v) = obj.as_float() {
        return Some(v);
    }
    obj.as_i64().ok().map(|v| v as f32)
}

fn channel(v: f32) -> u8 {
    (v.clamp(0.0, 1.0) * 255.0).round() as u8
}

fn rgb_color(r: f32, g: f32, b: f32) -> Color {
    Color::from_rgba(r.clamp(0.0, 1.0), g.clamp(0.0, 1.0), b.clamp(0.0, 1.0), 1.0)
        .unwrap_or(Color::BLACK)
}

fn cmyk_to_rgb(c: f32, m: f32, y: f32, k: f32) -> [f32; 3] {
    [(1.0 - c) * (1.0 - k), (1.0 - m) * (1.0 - k), (1.0 - y) * (1.0 - k)]
}

fn cmyk_operands(op: &Operation) -> Option<Color> {
    let [c, m, y, k] = op_f32_4(op)?;
    let [r, g, b] = cmyk_to_rgb(c, m, y, k);
    Some(rgb_color(r, g, b))
}

/// `sc`/`scn` operands, interpreted by component count
fn component_color(op: &Operation) -> Result<Color, DocumentError> {
    let values: Option<Vec<f32>> = op.operands.iter().map(obj_to_f32).collect();
    match values.as_deref() {
        Some([gray]) => Ok(rgb_color(*gray, *gray, *gray)),
        Some([r, g, b]) => Ok(rgb_color(*r, *g, *b)),
        Some([c, m, y, k]) => {
            let [r, g, b] = cmyk_to_rgb(*c, *m, *y, *k);
            Ok(rgb_color(r, g, b))
        }
        _ => Err(DocumentError::UnsupportedContent("pattern fill".to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::GenericImageView;
    use lopdf::dictionary;

    /// 144x72pt single-page document; `resources` builds the page resources
    fn page_doc(
        content: &str,
        resources: impl FnOnce(&mut Document) -> Dictionary,
    ) -> (Document, ObjectId) {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let resources = resources(&mut doc);
        let content_id = doc.add_object(Stream::new(
            Dictionary::new(),
            content.as_bytes().to_vec(),
        ));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => resources,
        });
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![page_id.into()],
                "Count" => 1,
                "MediaBox" => vec![0.into(), 0.into(), 144.into(), 72.into()],
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        (doc, page_id)
    }

    fn no_resources(_: &mut Document) -> Dictionary {
        Dictionary::new()
    }

    fn image_resources(image: Stream) -> impl FnOnce(&mut Document) -> Dictionary {
        move |doc| {
            let image_id = doc.add_object(image);
            dictionary! { "XObject" => dictionary! { "Im0" => image_id } }
        }
    }

    /// Type 3 font whose `a` glyph fills its whole 1x1 em box
    fn box_font_resources(doc: &mut Document) -> Dictionary {
        let glyph = doc.add_object(Stream::new(
            Dictionary::new(),
            b"1000 0 0 0 1000 1000 d1 0 0 1000 1000 re f".to_vec(),
        ));
        let font = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type3",
            "FontBBox" => vec![0.into(), 0.into(), 1000.into(), 1000.into()],
            "FontMatrix" => vec![
                Object::Real(0.001),
                0.into(),
                0.into(),
                Object::Real(0.001),
                0.into(),
                0.into(),
            ],
            "CharProcs" => dictionary! { "a" => glyph },
            "Encoding" => dictionary! {
                "Type" => "Encoding",
                "Differences" => vec![97.into(), Object::Name(b"a".to_vec())],
            },
            "FirstChar" => 97,
            "LastChar" => 97,
            "Widths" => vec![1000.into()],
        });
        dictionary! { "Font" => dictionary! { "T3" => font } }
    }

    fn raw_rgb_image(width: i64, height: i64, rgb: [u8; 3]) -> Stream {
        let data: Vec<u8> = (0..width * height).flat_map(|_| rgb).collect();
        Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => width,
                "Height" => height,
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => 8,
            },
            data,
        )
    }

    fn render(content: &str, resources: impl FnOnce(&mut Document) -> Dictionary) -> RgbImage {
        let (doc, page_id) = page_doc(content, resources);
        render_page(&doc, page_id, 72).unwrap().pixels.to_rgb8()
    }

    fn assert_near(actual: [u8; 3], expected: [u8; 3]) {
        let close = actual
            .iter()
            .zip(expected)
            .all(|(a, e)| (i16::from(*a) - i16::from(e)).abs() <= 8);
        assert!(close, "pixel {:?} is not close to {:?}", actual, expected);
    }

    const WHITE: [u8; 3] = [255, 255, 255];
    const BLACK: [u8; 3] = [0, 0, 0];

    #[test]
    fn test_page_size_inherited_from_tree() {
        let (doc, page_id) = page_doc("", no_resources);
        let page = render_page(&doc, page_id, 72).unwrap();
        assert_eq!(page.width_pt, 144.0);
        assert_eq!(page.height_pt, 72.0);
        assert_eq!(page.pixels.dimensions(), (144, 72));

        let page = render_page(&doc, page_id, 144).unwrap();
        assert_eq!(page.pixels.dimensions(), (288, 144));
    }

    #[test]
    fn test_filled_rect() {
        // Red square in the bottom-left corner of a 144x72 page
        let rgb = render("1 0 0 rg 0 0 36 36 re f", no_resources);
        assert_eq!(rgb.get_pixel(10, 60).0, [255, 0, 0]);
        assert_eq!(rgb.get_pixel(10, 10).0, WHITE);
        assert_eq!(rgb.get_pixel(100, 60).0, WHITE);
    }

    #[test]
    fn test_cm_applies_before_current_transform() {
        // The shift is scaled by the earlier cm: the square lands at x 72..108
        let rgb = render("2 0 0 2 0 0 cm 1 0 0 1 36 0 cm 0 0 18 18 re f", no_resources);
        assert_eq!(rgb.get_pixel(90, 60).0, BLACK);
        assert_eq!(rgb.get_pixel(50, 60).0, WHITE);
    }

    #[test]
    fn test_triangle_path_fill() {
        let rgb = render("0 g 0 0 m 72 0 l 0 72 l h f", no_resources);
        assert_eq!(rgb.get_pixel(10, 62).0, BLACK);
        assert_eq!(rgb.get_pixel(60, 10).0, WHITE);
    }

    #[test]
    fn test_stroked_line() {
        // 4pt blue rule across the middle of the page
        let rgb = render("0 0 1 RG 4 w 0 36 m 144 36 l S", no_resources);
        assert_eq!(rgb.get_pixel(70, 35).0, [0, 0, 255]);
        assert_eq!(rgb.get_pixel(70, 36).0, [0, 0, 255]);
        assert_eq!(rgb.get_pixel(70, 10).0, WHITE);
        assert_eq!(rgb.get_pixel(70, 60).0, WHITE);
    }

    #[test]
    fn test_clip_limits_later_fills() {
        let rgb = render("0 0 72 72 re W n 1 0 0 rg 0 0 144 72 re f", no_resources);
        assert_eq!(rgb.get_pixel(30, 36).0, [255, 0, 0]);
        assert_eq!(rgb.get_pixel(110, 36).0, WHITE);
    }

    #[test]
    fn test_clip_is_restored_by_grestore() {
        let rgb = render("q 0 0 72 72 re W n Q 0 g 0 0 144 72 re f", no_resources);
        assert_eq!(rgb.get_pixel(110, 36).0, BLACK);
    }

    #[test]
    fn test_image_placed_by_ctm() {
        let image = raw_rgb_image(4, 4, [0, 0, 255]);
        let rgb = render("q 72 0 0 72 72 0 cm /Im0 Do Q", image_resources(image));
        // Right half of the page is covered by the image
        assert_near(rgb.get_pixel(100, 36).0, [0, 0, 255]);
        assert_eq!(rgb.get_pixel(30, 36).0, WHITE);
    }

    #[test]
    fn test_rotated_image() {
        // Quarter turn: the unit square still lands on the right half
        let image = raw_rgb_image(4, 4, [0, 0, 255]);
        let rgb = render("q 0 72 -72 0 144 0 cm /Im0 Do Q", image_resources(image));
        assert_near(rgb.get_pixel(100, 36).0, [0, 0, 255]);
        assert_eq!(rgb.get_pixel(30, 36).0, WHITE);
    }

    #[test]
    fn test_soft_mask_becomes_alpha() {
        // Left half of the mask is transparent, right half opaque
        let mask_data: Vec<u8> = (0..4 * 4)
            .map(|i| if i % 4 < 2 { 0 } else { 255 })
            .collect();
        let resources = |doc: &mut Document| {
            let smask = doc.add_object(Stream::new(
                dictionary! {
                    "Type" => "XObject",
                    "Subtype" => "Image",
                    "Width" => 4,
                    "Height" => 4,
                    "ColorSpace" => "DeviceGray",
                    "BitsPerComponent" => 8,
                },
                mask_data,
            ));
            let mut image = raw_rgb_image(4, 4, [255, 0, 0]);
            image.dict.set("SMask", smask);
            let image_id = doc.add_object(image);
            dictionary! { "XObject" => dictionary! { "Im0" => image_id } }
        };
        let rgb = render("q 144 0 0 72 0 0 cm /Im0 Do Q", resources);
        assert_near(rgb.get_pixel(15, 36).0, WHITE);
        assert_near(rgb.get_pixel(130, 36).0, [255, 0, 0]);
    }

    #[test]
    fn test_stencil_mask_uses_fill_colour() {
        // 8x1 stencil: first four samples painted
        let stencil = Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => 8,
                "Height" => 1,
                "ImageMask" => true,
                "BitsPerComponent" => 1,
            },
            vec![0b0000_1111],
        );
        let rgb = render("0 1 0 rg q 144 0 0 72 0 0 cm /Im0 Do Q", image_resources(stencil));
        assert_near(rgb.get_pixel(20, 36).0, [0, 255, 0]);
        assert_near(rgb.get_pixel(125, 36).0, WHITE);
    }

    #[test]
    fn test_type3_text_is_drawn_and_advances() {
        // Two 20pt glyph boxes from x=10: 10..30 and 30..50, rows 32..52
        let rgb = render("BT /T3 20 Tf 10 20 Td (aa) Tj ET", box_font_resources);
        assert_eq!(rgb.get_pixel(20, 42).0, BLACK);
        assert_eq!(rgb.get_pixel(40, 42).0, BLACK);
        assert_eq!(rgb.get_pixel(60, 42).0, WHITE);
        assert_eq!(rgb.get_pixel(20, 25).0, WHITE);
    }

    #[test]
    fn test_tj_adjustment_moves_next_glyph() {
        // -1000 pushes the second box a full em right: 50..70
        let rgb = render("BT /T3 20 Tf 10 20 Td [(a) -1000 (a)] TJ ET", box_font_resources);
        assert_eq!(rgb.get_pixel(20, 42).0, BLACK);
        assert_eq!(rgb.get_pixel(40, 42).0, WHITE);
        assert_eq!(rgb.get_pixel(60, 42).0, BLACK);
    }

    #[test]
    fn test_invisible_text_draws_nothing() {
        let rgb = render("BT 3 Tr /T3 20 Tf 10 20 Td (aa) Tj ET", box_font_resources);
        assert!(rgb.pixels().all(|p| p.0 == WHITE));
    }

    #[test]
    fn test_text_with_unknown_font_still_renders() {
        let (doc, page_id) = page_doc("BT /F1 10 Tf 10 10 Td (Applicant name) Tj ET", no_resources);
        assert!(render_page(&doc, page_id, 72).is_ok());
    }

    #[test]
    fn test_shading_is_unsupported() {
        let (doc, page_id) = page_doc("/Sh0 sh", no_resources);
        assert!(matches!(
            render_page(&doc, page_id, 72),
            Err(DocumentError::UnsupportedContent(_))
        ));
    }

    #[test]
    fn test_fax_image_is_unsupported() {
        let mut fax = raw_rgb_image(4, 4, [0, 0, 0]);
        fax.dict.set("Filter", "CCITTFaxDecode");
        let (doc, page_id) = page_doc("q 72 0 0 72 0 0 cm /Im0 Do Q", image_resources(fax));
        assert!(matches!(
            render_page(&doc, page_id, 72),
            Err(DocumentError::UnsupportedContent(_))
        ));
    }

    #[test]
    fn test_unpack_bilevel() {
        // 10 pixels wide: two bytes per row
        let data = [0b1010_0000, 0b0100_0000];
        let image = unpack_bilevel(&data, 10, 1, false).unwrap().to_luma8();
        assert_eq!(image.get_pixel(0, 0).0, [255]);
        assert_eq!(image.get_pixel(1, 0).0, [0]);
        assert_eq!(image.get_pixel(2, 0).0, [255]);
        assert_eq!(image.get_pixel(9, 0).0, [255]);
        assert_eq!(image.get_pixel(8, 0).0, [0]);

        let inverted = unpack_bilevel(&data, 10, 1, true).unwrap().to_luma8();
        assert_eq!(inverted.get_pixel(0, 0).0, [0]);
    }
}
