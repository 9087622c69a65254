// Copyright 2025 the Vello Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Types for brushes, shaders and filters.

use std::sync::Arc;

use crate::image::Image;
use crate::kurbo::{Affine, Rect, Stroke, Vec2};
use crate::peniko::{BlendMode, Color, Compose, Extend, Gradient, Mix};

/// How pixels are filtered when an image is sampled.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum FilterMode {
    /// Take the nearest texel.
    #[default]
    Nearest,
    /// Interpolate between neighbouring texels.
    Linear,
}

/// How mipmap levels are chosen when an image is sampled.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum MipmapMode {
    /// Always sample the base level.
    #[default]
    None,
    /// Sample the nearest level.
    Nearest,
    /// Interpolate between the two nearest levels.
    Linear,
}

/// Sampling parameters for image draws.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct SamplingOptions {
    /// Filter used within a level.
    pub filter: FilterMode,
    /// Filter used across levels.
    pub mipmap: MipmapMode,
}

impl SamplingOptions {
    /// Linear filtering without mipmaps.
    pub const LINEAR: Self = Self {
        filter: FilterMode::Linear,
        mipmap: MipmapMode::None,
    };
}

/// Whether sampling of a source rectangle may read texels outside of it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum SrcRectConstraint {
    /// Sampling must stay inside the source rectangle.
    #[default]
    Strict,
    /// Sampling may bleed outside the source rectangle.
    Fast,
}

/// An image used as a paint source.
#[derive(Clone, Debug, PartialEq)]
pub struct ImageShader {
    /// The sampled image.
    pub image: Image,
    /// Extend mode in the horizontal direction.
    pub extend_x: Extend,
    /// Extend mode in the vertical direction.
    pub extend_y: Extend,
    /// Sampling parameters.
    pub sampling: SamplingOptions,
    /// Local transform from image space to draw space.
    pub transform: Affine,
}

impl ImageShader {
    /// Create a non-repeating shader for `image` with the identity transform.
    pub fn new(image: Image) -> Self {
        Self {
            image,
            extend_x: Extend::Pad,
            extend_y: Extend::Pad,
            sampling: SamplingOptions::default(),
            transform: Affine::IDENTITY,
        }
    }
}

/// The source of color for a draw.
#[derive(Clone, Debug, PartialEq)]
pub enum Shader {
    /// A solid color.
    Color(Color),
    /// An image.
    Image(ImageShader),
    /// A linear, radial or sweep gradient.
    Gradient(Gradient),
}

impl Shader {
    /// Returns `true` if every pixel produced by the shader is opaque.
    pub fn is_opaque(&self) -> bool {
        match self {
            Self::Color(color) => color.components[3] >= 1.0,
            Self::Image(shader) => shader.image.is_opaque(),
            Self::Gradient(gradient) => gradient
                .stops
                .iter()
                .all(|stop| stop.color.components[3] >= 1.0),
        }
    }

    /// Returns the image shader, if this is one.
    pub fn as_image(&self) -> Option<&ImageShader> {
        match self {
            Self::Image(shader) => Some(shader),
            _ => None,
        }
    }
}

/// A per-pixel color transformation applied after shading.
#[derive(Clone, Debug, PartialEq)]
pub enum ColorFilter {
    /// Blend a constant color onto the source.
    Blend {
        /// The constant color.
        color: Color,
        /// How the color is combined with the source.
        mode: BlendMode,
    },
    /// A 4x5 row-major matrix applied to unpremultiplied RGBA.
    Matrix([f32; 20]),
    /// Alpha at or above `threshold` becomes fully opaque and everything below is cleared.
    AlphaThreshold {
        /// The cutoff in `0.0..=1.0`.
        threshold: f32,
    },
    /// Apply `inner` first, then `outer`.
    Compose {
        /// The filter applied last.
        outer: Arc<ColorFilter>,
        /// The filter applied first.
        inner: Arc<ColorFilter>,
    },
}

impl ColorFilter {
    /// The threshold used to make arbitrary content opaque.
    pub const OPAQUE_THRESHOLD: Self = Self::AlphaThreshold { threshold: 0.5 };

    /// Compose `self` after `inner`.
    pub fn compose(self, inner: Self) -> Self {
        Self::Compose {
            outer: Arc::new(self),
            inner: Arc::new(inner),
        }
    }

    /// Compose two optional filters, `outer` after `inner`.
    pub fn compose_optional(outer: Option<Self>, inner: Option<Self>) -> Option<Self> {
        match (outer, inner) {
            (Some(outer), Some(inner)) => Some(outer.compose(inner)),
            (outer, None) => outer,
            (None, inner) => inner,
        }
    }

    /// Returns `true` if the filter never changes the alpha channel.
    pub fn is_alpha_unchanged(&self) -> bool {
        match self {
            Self::Blend { mode, .. } => *mode == BlendMode::new(Mix::Normal, Compose::SrcAtop),
            Self::Matrix(m) => m[15..20] == [0.0, 0.0, 0.0, 1.0, 0.0],
            Self::AlphaThreshold { .. } => false,
            Self::Compose { outer, inner } => {
                outer.is_alpha_unchanged() && inner.is_alpha_unchanged()
            }
        }
    }
}

/// A coverage mask derived from a shader.
#[derive(Clone, Debug, PartialEq)]
pub struct MaskFilter {
    /// The shader whose alpha modulates coverage.
    pub shader: Shader,
    /// Use one minus the shader alpha.
    pub inverted: bool,
}

/// A filter applied to the rendered content of a layer.
#[derive(Clone, Debug, PartialEq)]
pub enum ImageFilter {
    /// Gaussian blur.
    Blur {
        /// Standard deviation in the horizontal direction.
        sigma_x: f64,
        /// Standard deviation in the vertical direction.
        sigma_y: f64,
    },
    /// A blurred, offset, tinted copy of the content.
    DropShadow {
        /// Offset of the shadow.
        offset: Vec2,
        /// Standard deviation in the horizontal direction.
        sigma_x: f64,
        /// Standard deviation in the vertical direction.
        sigma_y: f64,
        /// Shadow color.
        color: Color,
        /// Draw only the shadow.
        shadow_only: bool,
    },
    /// A color filter applied to every pixel.
    Color(ColorFilter),
    /// Apply `inner` first, then `outer`.
    Compose {
        /// The filter applied last.
        outer: Arc<ImageFilter>,
        /// The filter applied first.
        inner: Arc<ImageFilter>,
    },
}

impl ImageFilter {
    /// The device area touched by the filter when applied to content covering `rect`.
    pub fn filter_bounds(&self, rect: Rect) -> Rect {
        match self {
            Self::Blur { sigma_x, sigma_y } => {
                rect.inflate(3.0 * sigma_x.abs(), 3.0 * sigma_y.abs())
            }
            Self::DropShadow {
                offset,
                sigma_x,
                sigma_y,
                shadow_only,
                ..
            } => {
                let shadow = (rect + *offset).inflate(3.0 * sigma_x.abs(), 3.0 * sigma_y.abs());
                if *shadow_only {
                    shadow
                } else {
                    shadow.union(rect)
                }
            }
            Self::Color(_) => rect,
            Self::Compose { outer, inner } => outer.filter_bounds(inner.filter_bounds(rect)),
        }
    }
}

/// Per-draw paint state reconstructed during playback.
#[derive(Clone, Debug, PartialEq)]
pub struct Brush {
    /// The paint color, also used as the alpha for shaders.
    pub color: Color,
    /// An optional shader replacing the solid color.
    pub shader: Option<Shader>,
    /// How the draw is composited.
    pub blend_mode: BlendMode,
    /// Whether edges are anti-aliased.
    pub anti_alias: bool,
    /// A color filter applied after shading.
    pub color_filter: Option<ColorFilter>,
    /// A coverage mask.
    pub mask_filter: Option<MaskFilter>,
}

impl Default for Brush {
    fn default() -> Self {
        Self {
            color: Color::BLACK,
            shader: None,
            blend_mode: BlendMode::default(),
            anti_alias: true,
            color_filter: None,
            mask_filter: None,
        }
    }
}

impl Brush {
    /// A solid color brush.
    pub fn from_color(color: Color) -> Self {
        Self {
            color,
            ..Self::default()
        }
    }

    /// The alpha of the brush color.
    pub fn alpha(&self) -> f32 {
        self.color.components[3]
    }

    /// Returns `true` if the blend mode is plain source-over.
    pub fn is_src_over(&self) -> bool {
        self.blend_mode == BlendMode::default()
    }

    /// Returns `true` if the brush paints only opaque pixels with source-over.
    pub fn is_opaque(&self) -> bool {
        self.alpha() >= 1.0
            && self.shader.as_ref().is_none_or(Shader::is_opaque)
            && self.is_src_over()
            && self.mask_filter.is_none()
            && self
                .color_filter
                .as_ref()
                .is_none_or(ColorFilter::is_alpha_unchanged)
    }

    /// Returns `true` if the brushes only differ in color.
    pub fn same_except_color(&self, other: &Self) -> bool {
        self.shader == other.shader
            && self.blend_mode == other.blend_mode
            && self.anti_alias == other.anti_alias
            && self.color_filter == other.color_filter
            && self.mask_filter == other.mask_filter
    }

    /// Returns a copy with the color alpha multiplied by `alpha`.
    pub fn with_alpha_multiplied(&self, alpha: f32) -> Self {
        Self {
            color: self.color.multiply_alpha(alpha),
            ..self.clone()
        }
    }
}

/// Whether a paint fills or strokes geometry.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Style {
    /// Fill the interior.
    #[default]
    Fill,
    /// Stroke the outline.
    Stroke,
}

/// The paint passed to canvas draw calls.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Paint {
    /// Color and compositing state.
    pub brush: Brush,
    /// Fill or stroke.
    pub style: Style,
    /// Stroke parameters, used when `style` is [`Style::Stroke`].
    pub stroke: Stroke,
    /// A filter applied to the draw as if it were drawn into its own layer.
    pub image_filter: Option<ImageFilter>,
}

impl Paint {
    /// A fill paint with a solid color.
    pub fn from_color(color: Color) -> Self {
        Self {
            brush: Brush::from_color(color),
            ..Self::default()
        }
    }

    /// A stroke paint with a solid color.
    pub fn stroke(color: Color, width: f64) -> Self {
        Self {
            brush: Brush::from_color(color),
            style: Style::Stroke,
            stroke: Stroke::new(width),
            image_filter: None,
        }
    }

    /// Returns the stroke if the paint strokes.
    pub fn stroke_style(&self) -> Option<&Stroke> {
        (self.style == Style::Stroke).then_some(&self.stroke)
    }

    /// Set the shader.
    pub fn with_shader(mut self, shader: Shader) -> Self {
        self.brush.shader = Some(shader);
        self
    }

    /// Set the blend mode.
    pub fn with_blend_mode(mut self, blend_mode: impl Into<BlendMode>) -> Self {
        self.brush.blend_mode = blend_mode.into();
        self
    }

    /// Set the image filter.
    pub fn with_image_filter(mut self, filter: ImageFilter) -> Self {
        self.image_filter = Some(filter);
        self
    }
}
