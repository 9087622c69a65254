// Copyright 2025 the Vello Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Page textures and the backend that creates and fills them.

use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use vello_picture::glyph::GlyphFormat;

use crate::error::AtlasError;
use crate::plot::AtlasRect;

static NEXT_TEXTURE_ID: AtomicU64 = AtomicU64::new(1);

/// Pixel format of a page texture.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TextureFormat {
    /// One coverage byte per pixel.
    A8,
    /// Four bytes per pixel, red first.
    Rgba8,
    /// Four bytes per pixel, blue first.
    Bgra8,
}

impl TextureFormat {
    /// Bytes per pixel.
    pub fn bytes_per_pixel(self) -> u32 {
        match self {
            Self::A8 => 1,
            Self::Rgba8 | Self::Bgra8 => 4,
        }
    }
}

impl From<GlyphFormat> for TextureFormat {
    fn from(format: GlyphFormat) -> Self {
        match format {
            GlyphFormat::Alpha8 => Self::A8,
            GlyphFormat::Rgba8 => Self::Rgba8,
            GlyphFormat::Bgra8 => Self::Bgra8,
        }
    }
}

/// A backend texture backing one atlas page.
///
/// The backend object is shared; the texture is released once the page and every clone of its
/// proxy are gone.
#[derive(Clone)]
pub struct TextureProxy {
    id: u64,
    width: u32,
    height: u32,
    format: TextureFormat,
    handle: Arc<dyn Any + Send + Sync>,
}

impl TextureProxy {
    /// Wrap a backend texture object.
    pub fn new(
        width: u32,
        height: u32,
        format: TextureFormat,
        handle: Arc<dyn Any + Send + Sync>,
    ) -> Self {
        Self {
            id: NEXT_TEXTURE_ID.fetch_add(1, Ordering::Relaxed),
            width,
            height,
            format,
            handle,
        }
    }

    /// A process-unique identifier.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Pixel format.
    pub fn format(&self) -> TextureFormat {
        self.format
    }

    /// The backend texture object, if it has type `T`.
    pub fn handle<T: Any>(&self) -> Option<&T> {
        self.handle.downcast_ref()
    }

    /// Returns `true` if `rect` lies inside the texture.
    pub fn contains(&self, rect: &AtlasRect) -> bool {
        AtlasRect::new(0, 0, self.width, self.height).contains(rect)
    }
}

impl fmt::Debug for TextureProxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TextureProxy")
            .field("id", &self.id)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("format", &self.format)
            .finish_non_exhaustive()
    }
}

/// The GPU operations atlases need.
pub trait TextureBackend {
    /// Create a texture for a page. `None` if the backend is out of resources.
    fn create_texture_proxy(
        &mut self,
        width: u32,
        height: u32,
        format: TextureFormat,
    ) -> Option<TextureProxy>;

    /// Write tightly or loosely packed rows of pixels into `rect` of `target`.
    fn write_pixels(
        &mut self,
        target: &TextureProxy,
        rect: AtlasRect,
        pixels: &[u8],
        row_bytes: u32,
    ) -> Result<(), AtlasError>;
}

/// Check that `pixels` holds `rect` worth of rows for `target`.
pub fn validate_upload(
    target: &TextureProxy,
    rect: &AtlasRect,
    pixels: &[u8],
    row_bytes: u32,
) -> Result<(), AtlasError> {
    if !target.contains(rect) {
        return Err(AtlasError::UploadFailed("rectangle outside of the texture"));
    }
    let line = u64::from(rect.width) * u64::from(target.format.bytes_per_pixel());
    if u64::from(row_bytes) < line {
        return Err(AtlasError::UploadFailed("row bytes shorter than a row"));
    }
    let needed = match rect.height {
        0 => 0,
        rows => u64::from(row_bytes) * u64::from(rows - 1) + line,
    };
    if (pixels.len() as u64) < needed {
        return Err(AtlasError::UploadFailed("not enough pixel data"));
    }
    Ok(())
}

#[cfg(feature = "wgpu")]
mod wgpu_backend {
    use std::sync::Arc;

    use super::{validate_upload, TextureBackend, TextureFormat, TextureProxy};
    use crate::error::AtlasError;
    use crate::plot::AtlasRect;

    /// Creates page textures on a `wgpu` device and writes them through its queue.
    #[derive(Debug)]
    pub struct WgpuTextureBackend<'a> {
        device: &'a wgpu::Device,
        queue: &'a wgpu::Queue,
    }

    impl<'a> WgpuTextureBackend<'a> {
        /// Use `device` for textures and `queue` for uploads.
        pub fn new(device: &'a wgpu::Device, queue: &'a wgpu::Queue) -> Self {
            Self { device, queue }
        }
    }

    fn texture_format(format: TextureFormat) -> wgpu::TextureFormat {
        match format {
            TextureFormat::A8 => wgpu::TextureFormat::R8Unorm,
            TextureFormat::Rgba8 => wgpu::TextureFormat::Rgba8Unorm,
            TextureFormat::Bgra8 => wgpu::TextureFormat::Bgra8Unorm,
        }
    }

    impl TextureBackend for WgpuTextureBackend<'_> {
        fn create_texture_proxy(
            &mut self,
            width: u32,
            height: u32,
            format: TextureFormat,
        ) -> Option<TextureProxy> {
            let max = self.device.limits().max_texture_dimension_2d;
            if width == 0 || height == 0 || width > max || height > max {
                return None;
            }
            let texture = self.device.create_texture(&wgpu::TextureDescriptor {
                label: Some("vello_atlas page"),
                size: wgpu::Extent3d {
                    width,
                    height,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: texture_format(format),
                usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
                view_formats: &[],
            });
            Some(TextureProxy::new(width, height, format, Arc::new(texture)))
        }

        fn write_pixels(
            &mut self,
            target: &TextureProxy,
            rect: AtlasRect,
            pixels: &[u8],
            row_bytes: u32,
        ) -> Result<(), AtlasError> {
            validate_upload(target, &rect, pixels, row_bytes)?;
            let texture = target
                .handle::<wgpu::Texture>()
                .ok_or(AtlasError::UploadFailed("proxy was not created by this backend"))?;
            self.queue.write_texture(
                wgpu::ImageCopyTexture {
                    texture,
                    mip_level: 0,
                    origin: wgpu::Origin3d {
                        x: rect.x,
                        y: rect.y,
                        z: 0,
                    },
                    aspect: wgpu::TextureAspect::All,
                },
                pixels,
                wgpu::ImageDataLayout {
                    offset: 0,
                    bytes_per_row: Some(row_bytes),
                    rows_per_image: None,
                },
                wgpu::Extent3d {
                    width: rect.width,
                    height: rect.height,
                    depth_or_array_layers: 1,
                },
            );
            Ok(())
        }
    }
}

#[cfg(feature = "wgpu")]
pub use wgpu_backend::WgpuTextureBackend;
