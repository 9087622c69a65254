// Copyright 2025 the Vello Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Shared images.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::data_source::DataSource;
use crate::geometry::{rect_contains_rect, rect_is_empty, rect_is_integral};
use crate::kurbo::Rect;
use crate::peniko::Blob;

static NEXT_IMAGE_ID: AtomicU64 = AtomicU64::new(1);

/// Where the pixels of an image come from.
#[derive(Clone)]
pub enum ImageKind {
    /// Tightly packed pixel rows.
    Pixels(Blob<u8>),
    /// A rectangle of another image.
    Subset {
        /// The image the subset is taken from. Never itself a subset.
        source: Image,
        /// The subset in the pixel space of `source`.
        rect: Rect,
    },
    /// Pixels produced on demand.
    Deferred(Arc<dyn DataSource<Blob<u8>>>),
}

impl fmt::Debug for ImageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pixels(blob) => f.debug_tuple("Pixels").field(&blob.data().len()).finish(),
            Self::Subset { source, rect } => f
                .debug_struct("Subset")
                .field("source", &source.id())
                .field("rect", rect)
                .finish(),
            Self::Deferred(_) => f.write_str("Deferred"),
        }
    }
}

#[derive(Debug)]
struct ImageInner {
    id: u64,
    width: u32,
    height: u32,
    alpha_only: bool,
    opaque: bool,
    kind: ImageKind,
}

/// A reference counted image handle.
///
/// Equality is identity: two handles are equal if they refer to the same image.
#[derive(Clone, Debug)]
pub struct Image(Arc<ImageInner>);

impl Image {
    fn new(width: u32, height: u32, alpha_only: bool, opaque: bool, kind: ImageKind) -> Self {
        Self(Arc::new(ImageInner {
            id: NEXT_IMAGE_ID.fetch_add(1, Ordering::Relaxed),
            width,
            height,
            alpha_only,
            opaque,
            kind,
        }))
    }

    /// An RGBA image from tightly packed pixels.
    pub fn from_pixels(width: u32, height: u32, pixels: Blob<u8>, opaque: bool) -> Self {
        Self::new(width, height, false, opaque, ImageKind::Pixels(pixels))
    }

    /// A single channel coverage image.
    pub fn from_alpha(width: u32, height: u32, pixels: Blob<u8>) -> Self {
        Self::new(width, height, true, false, ImageKind::Pixels(pixels))
    }

    /// An RGBA image whose pixels are produced by `source` when first needed.
    pub fn deferred(
        width: u32,
        height: u32,
        source: Arc<dyn DataSource<Blob<u8>>>,
        opaque: bool,
    ) -> Self {
        Self::new(width, height, false, opaque, ImageKind::Deferred(source))
    }

    /// A process-unique identifier.
    pub fn id(&self) -> u64 {
        self.0.id
    }

    /// Width in pixels.
    pub fn width(&self) -> u32 {
        self.0.width
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        self.0.height
    }

    /// The rectangle `(0, 0, width, height)`.
    pub fn bounds(&self) -> Rect {
        Rect::new(0.0, 0.0, f64::from(self.width()), f64::from(self.height()))
    }

    /// Returns `true` if the image only carries coverage.
    pub fn is_alpha_only(&self) -> bool {
        self.0.alpha_only
    }

    /// Returns `true` if every pixel is known to be opaque.
    pub fn is_opaque(&self) -> bool {
        self.0.opaque && !self.0.alpha_only
    }

    /// The pixel source.
    pub fn kind(&self) -> &ImageKind {
        &self.0.kind
    }

    /// Returns `true` if both handles refer to the same image.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Returns the source image and rectangle for subsets, or `self` and its bounds.
    pub fn root(&self) -> (&Self, Rect) {
        match &self.0.kind {
            ImageKind::Subset { source, rect } => (source, *rect),
            _ => (self, self.bounds()),
        }
    }

    /// Returns an image showing `rect` of this image.
    ///
    /// The rectangle must be integral, non-empty and inside the image. Subsets of subsets refer
    /// straight to the root image, and the full bounds return the image itself.
    pub fn make_subset(&self, rect: Rect) -> Option<Self> {
        if rect_is_empty(&rect)
            || !rect_is_integral(&rect)
            || !rect_contains_rect(&self.bounds(), &rect)
        {
            return None;
        }
        if rect == self.bounds() {
            return Some(self.clone());
        }
        let (root, root_rect) = self.root();
        let rect = rect + root_rect.origin().to_vec2();
        #[allow(
            clippy::cast_possible_truncation,
            clippy::cast_sign_loss,
            reason = "The rectangle is integral and inside a u32 sized image."
        )]
        let (width, height) = (rect.width() as u32, rect.height() as u32);
        Some(Self::new(
            width,
            height,
            self.0.alpha_only,
            self.0.opaque,
            ImageKind::Subset {
                source: root.clone(),
                rect,
            },
        ))
    }

    /// The pixels of the image, or of the root image for subsets. Blocks on deferred sources.
    pub fn pixels(&self) -> Option<Blob<u8>> {
        match &self.0.kind {
            ImageKind::Pixels(blob) => Some(blob.clone()),
            ImageKind::Subset { source, .. } => source.pixels(),
            ImageKind::Deferred(source) => source.get_data().map(|blob| (*blob).clone()),
        }
    }
}

impl PartialEq for Image {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_source::SyncDataSource;

    fn checker(width: u32, height: u32) -> Image {
        let len = (width * height * 4) as usize;
        Image::from_pixels(width, height, Blob::from(vec![255_u8; len]), true)
    }

    #[test]
    fn nested_subsets_collapse_to_root() {
        let image = checker(16, 16);
        let first = image.make_subset(Rect::new(4.0, 4.0, 12.0, 12.0)).unwrap();
        let second = first.make_subset(Rect::new(1.0, 2.0, 3.0, 4.0)).unwrap();
        let (root, rect) = second.root();
        assert!(root.ptr_eq(&image));
        assert_eq!(rect, Rect::new(5.0, 6.0, 7.0, 8.0));
        assert_eq!((second.width(), second.height()), (2, 2));
    }

    #[test]
    fn subsets_must_be_integral_and_inside() {
        let image = checker(8, 8);
        assert!(image.make_subset(Rect::new(0.5, 0.0, 4.0, 4.0)).is_none());
        assert!(image.make_subset(Rect::new(4.0, 4.0, 9.0, 8.0)).is_none());
        assert!(image.make_subset(Rect::new(2.0, 2.0, 2.0, 4.0)).is_none());
        assert!(image.make_subset(image.bounds()).unwrap().ptr_eq(&image));
    }

    #[test]
    fn deferred_images_produce_pixels_on_demand() {
        let source = Arc::new(SyncDataSource::new(|| Some(Blob::from(vec![9_u8; 4]))));
        let image = Image::deferred(1, 1, source, false);
        assert_eq!(image.pixels().unwrap().data(), &[9, 9, 9, 9]);
    }

    #[test]
    fn ids_are_unique() {
        assert_ne!(checker(1, 1).id(), checker(1, 1).id());
    }
}
