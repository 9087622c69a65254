// Copyright 2025 the Vello Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! A draw context that resolves glyphs through the atlases.

use std::sync::Arc;

use bytemuck::{Pod, Zeroable};
use log::debug;
use smallvec::SmallVec;
use vello_picture::clip::Clip;
use vello_picture::geometry::Path;
use vello_picture::glyph::{GlyphId, GlyphRasterParams, GlyphRun, GlyphRunList};
use vello_picture::image::Image;
use vello_picture::kurbo::{Affine, Point, Rect, RoundedRect, Stroke};
use vello_picture::mc_state::McState;
use vello_picture::paint::{Brush, ImageFilter, SamplingOptions, SrcRectConstraint};
use vello_picture::picture::Picture;
use vello_picture::shape::Shape;
use vello_picture::{DrawContext, DrawResult};

use crate::manager::AtlasManager;
use crate::proxy::{TextureBackend, TextureFormat};
use crate::strike::CachedGlyph;

/// One corner of a textured glyph quad.
///
/// Quads are emitted as two triangles. Positions are in device pixels and texture coordinates
/// are normalized to the page texture.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Zeroable, Pod)]
pub struct QuadVertex {
    /// Device space position.
    pub position: [f32; 2],
    /// Position in the atlas page, in `[0, 1]`.
    pub tex_coord: [f32; 2],
}

/// A draw resolved for the rasterizer.
#[derive(Clone, Debug)]
pub enum RenderOp {
    /// Fill a device space path.
    Fill {
        /// The area to fill, strokes already expanded.
        path: Path,
        /// How to paint it.
        brush: Brush,
        /// Device space clip.
        clip: Clip,
    },
    /// Draw the `src` part of an image into `dst`, transformed by `transform`.
    Image {
        /// The image.
        image: Image,
        /// Source rectangle in image pixels.
        src: Rect,
        /// Destination rectangle in local space.
        dst: Rect,
        /// Local to device transform.
        transform: Affine,
        /// Sampling of the image.
        sampling: SamplingOptions,
        /// Whether sampling may read outside `src`.
        constraint: SrcRectConstraint,
        /// How to paint it.
        brush: Brush,
        /// Device space clip.
        clip: Clip,
    },
    /// Textured quads sampling one atlas page, drawn with the page texture as coverage or
    /// color source.
    Glyphs {
        /// The atlas the page belongs to.
        format: TextureFormat,
        /// The page index.
        page: usize,
        /// Six vertices per glyph.
        vertices: Vec<QuadVertex>,
        /// How to paint the coverage.
        brush: Brush,
        /// Device space clip.
        clip: Clip,
    },
    /// Content rendered offscreen and composited.
    Layer {
        /// The resolved layer content.
        ops: Vec<RenderOp>,
        /// Device space bounds of the content.
        bounds: Rect,
        /// Filter applied to the content.
        filter: Option<ImageFilter>,
        /// How the layer is composited.
        brush: Brush,
        /// Device space clip.
        clip: Clip,
    },
}

#[derive(Debug)]
struct GlyphBatch {
    format: TextureFormat,
    page: usize,
    vertices: Vec<QuadVertex>,
}

/// The scale of a matrix made of a translation and a uniform positive scale.
fn glyph_scale(matrix: &Affine) -> Option<f64> {
    let [a, b, c, d, _, _] = matrix.as_coeffs();
    (b == 0.0 && c == 0.0 && a == d && a > 0.0).then_some(a)
}

/// Turns draws into [`RenderOp`]s, caching glyphs in the atlases of an [`AtlasManager`].
///
/// Every glyph draw takes a draw token and marks the glyphs it uses with it, so the cells stay
/// resident until the flush that submits the ops. Glyphs that can not be cached are drawn from
/// their outlines.
pub struct AtlasRenderContext<'a> {
    manager: &'a mut AtlasManager,
    backend: &'a mut dyn TextureBackend,
    ops: Vec<RenderOp>,
}

impl<'a> AtlasRenderContext<'a> {
    /// Render through `manager`, creating pages with `backend`.
    pub fn new(manager: &'a mut AtlasManager, backend: &'a mut dyn TextureBackend) -> Self {
        Self {
            manager,
            backend,
            ops: Vec::new(),
        }
    }

    /// The ops recorded so far.
    pub fn ops(&self) -> &[RenderOp] {
        &self.ops
    }

    /// The recorded ops.
    pub fn finish(self) -> Vec<RenderOp> {
        self.ops
    }

    fn fill(&mut self, path: Path, state: &McState, brush: &Brush, stroke: Option<&Stroke>) {
        let path = match stroke {
            Some(stroke) => path.stroked(stroke),
            None => path,
        };
        self.ops.push(RenderOp::Fill {
            path: path.transformed(&state.matrix),
            brush: brush.clone(),
            clip: state.clip.clone(),
        });
    }

    fn image(
        &mut self,
        image: &Image,
        src: Rect,
        dst: Rect,
        sampling: &SamplingOptions,
        state: &McState,
        brush: &Brush,
        constraint: SrcRectConstraint,
    ) {
        self.ops.push(RenderOp::Image {
            image: image.clone(),
            src,
            dst,
            transform: state.matrix,
            sampling: *sampling,
            constraint,
            brush: brush.clone(),
            clip: state.clip.clone(),
        });
    }

    fn fill_glyph_outline(
        &mut self,
        run: &GlyphRun,
        glyph: GlyphId,
        position: Point,
        state: &McState,
        brush: &Brush,
        stroke: Option<&Stroke>,
    ) {
        let Some(outline) = run.font.typeface.glyph_path(glyph, run.font.size) else {
            return;
        };
        let placed = outline.transformed(&Affine::translate(position.to_vec2()));
        self.fill(placed, state, brush, stroke);
    }

    fn push_quad(
        &self,
        batches: &mut SmallVec<[GlyphBatch; 2]>,
        glyph: &CachedGlyph,
        origin: Point,
    ) {
        let config = self.manager.config().atlas(glyph.format);
        let page = glyph.locator.page_index();
        let index = match batches
            .iter()
            .position(|batch| batch.format == glyph.format && batch.page == page)
        {
            Some(index) => index,
            None => {
                batches.push(GlyphBatch {
                    format: glyph.format,
                    page,
                    vertices: Vec::new(),
                });
                batches.len() - 1
            }
        };
        let device = glyph.device_rect(origin);
        let uv = glyph.locator.rect.to_rect();
        let (width, height) = (f64::from(config.page_width), f64::from(config.page_height));
        let corner = |x: f64, y: f64, u: f64, v: f64| QuadVertex {
            position: [x as f32, y as f32],
            tex_coord: [(u / width) as f32, (v / height) as f32],
        };
        let top_left = corner(device.x0, device.y0, uv.x0, uv.y0);
        let top_right = corner(device.x1, device.y0, uv.x1, uv.y0);
        let bottom_left = corner(device.x0, device.y1, uv.x0, uv.y1);
        let bottom_right = corner(device.x1, device.y1, uv.x1, uv.y1);
        batches[index].vertices.extend_from_slice(&[
            top_left,
            top_right,
            bottom_left,
            bottom_left,
            top_right,
            bottom_right,
        ]);
    }
}

impl core::fmt::Debug for AtlasRenderContext<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AtlasRenderContext")
            .field("manager", &self.manager)
            .field("ops", &self.ops.len())
            .finish_non_exhaustive()
    }
}

impl DrawContext for AtlasRenderContext<'_> {
    fn draw_fill(&mut self, state: &McState, brush: &Brush) -> DrawResult {
        let mut everything = Path::new();
        everything.set_inverse_fill(true);
        self.ops.push(RenderOp::Fill {
            path: everything,
            brush: brush.clone(),
            clip: state.clip.clone(),
        });
        Ok(())
    }

    fn draw_rect(
        &mut self,
        rect: &Rect,
        state: &McState,
        brush: &Brush,
        stroke: Option<&Stroke>,
    ) -> DrawResult {
        self.fill(Path::from_rect(rect), state, brush, stroke);
        Ok(())
    }

    fn draw_rrect(
        &mut self,
        rrect: &RoundedRect,
        state: &McState,
        brush: &Brush,
        stroke: Option<&Stroke>,
    ) -> DrawResult {
        self.fill(Path::from_rrect(rrect), state, brush, stroke);
        Ok(())
    }

    fn draw_path(&mut self, path: &Path, state: &McState, brush: &Brush) -> DrawResult {
        self.fill(path.clone(), state, brush, None);
        Ok(())
    }

    fn draw_shape(
        &mut self,
        shape: &Shape,
        state: &McState,
        brush: &Brush,
        stroke: Option<&Stroke>,
    ) -> DrawResult {
        self.fill(shape.path(), state, brush, stroke);
        Ok(())
    }

    fn draw_image(
        &mut self,
        image: &Image,
        sampling: &SamplingOptions,
        state: &McState,
        brush: &Brush,
    ) -> DrawResult {
        let bounds = image.bounds();
        self.image(
            image,
            bounds,
            bounds,
            sampling,
            state,
            brush,
            SrcRectConstraint::default(),
        );
        Ok(())
    }

    fn draw_image_rect(
        &mut self,
        image: &Image,
        rect: &Rect,
        sampling: &SamplingOptions,
        state: &McState,
        brush: &Brush,
        constraint: SrcRectConstraint,
    ) -> DrawResult {
        self.image(image, *rect, *rect, sampling, state, brush, constraint);
        Ok(())
    }

    fn draw_image_rect_to_rect(
        &mut self,
        image: &Image,
        src: &Rect,
        dst: &Rect,
        sampling: &SamplingOptions,
        state: &McState,
        brush: &Brush,
        constraint: SrcRectConstraint,
    ) -> DrawResult {
        self.image(image, *src, *dst, sampling, state, brush, constraint);
        Ok(())
    }

    fn draw_glyph_run_list(
        &mut self,
        list: &GlyphRunList,
        state: &McState,
        brush: &Brush,
        stroke: Option<&Stroke>,
    ) -> DrawResult {
        let token = self.manager.tokens_mut().issue_draw_token();
        let mut batches = SmallVec::<[GlyphBatch; 2]>::new();
        for run in &list.runs {
            let Some(scale) = glyph_scale(&state.matrix) else {
                // Rotated and skewed glyphs are drawn from their outlines.
                for (glyph, position) in run.glyphs.iter().zip(&run.positions) {
                    self.fill_glyph_outline(run, *glyph, *position, state, brush, stroke);
                }
                continue;
            };
            let params = GlyphRasterParams {
                size: run.font.size * scale as f32,
                faux_bold: run.font.faux_bold,
                faux_italic: run.font.faux_italic,
                stroke_width: stroke.map(|stroke| (stroke.width * scale) as f32),
            };
            for (glyph, position) in run.glyphs.iter().zip(&run.positions) {
                let origin = state.matrix * *position;
                let origin = Point::new(origin.x.round(), origin.y.round());
                match self
                    .manager
                    .add_glyph(&mut *self.backend, &run.font, *glyph, &params)
                {
                    Ok(Some(cached)) => {
                        self.manager.set_last_use_token(&cached, token);
                        self.push_quad(&mut batches, &cached, origin);
                    }
                    Ok(None) => {}
                    Err(err) => {
                        debug!("drawing glyph {glyph} from its outline: {err}");
                        self.fill_glyph_outline(run, *glyph, *position, state, brush, stroke);
                    }
                }
            }
        }
        for batch in batches {
            self.ops.push(RenderOp::Glyphs {
                format: batch.format,
                page: batch.page,
                vertices: batch.vertices,
                brush: brush.clone(),
                clip: state.clip.clone(),
            });
        }
        Ok(())
    }

    fn draw_picture(&mut self, picture: &Arc<Picture>, state: &McState) -> DrawResult {
        picture.playback_into(self, state, None)
    }

    fn draw_layer(
        &mut self,
        picture: &Arc<Picture>,
        filter: Option<&ImageFilter>,
        state: &McState,
        brush: &Brush,
    ) -> DrawResult {
        let mut content = AtlasRenderContext::new(&mut *self.manager, &mut *self.backend);
        picture.playback_into(&mut content, &McState::new(), None)?;
        let ops = content.finish();
        self.ops.push(RenderOp::Layer {
            ops,
            bounds: picture.bounds(),
            filter: filter.cloned(),
            brush: brush.clone(),
            clip: state.clip.clone(),
        });
        Ok(())
    }
}
