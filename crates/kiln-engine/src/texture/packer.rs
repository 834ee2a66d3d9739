use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AtlasError {
    #[error("cannot pack an empty image")]
    EmptyImage,

    #[error(
        "{width}x{height} image with {padding}px padding can never fit a {page_width}x{page_height} atlas page"
    )]
    TooLarge {
        width: u32,
        height: u32,
        padding: u32,
        page_width: u32,
        page_height: u32,
    },

    #[error("atlas page is full")]
    Full,
}

/// Shelf (row) packer for one atlas page.
///
/// Images are placed left to right along the current shelf. Every image
/// occupies its size plus `padding` on each side. When a shelf runs out of
/// width, the next one starts below the tallest image placed so far.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShelfPacker {
    width: u32,
    height: u32,
    padding: u32,
    cursor_x: u32,
    cursor_y: u32,
    next_row_y: u32,
}

impl ShelfPacker {
    pub fn new(width: u32, height: u32, padding: u32) -> Self {
        Self {
            width,
            height,
            padding,
            cursor_x: 0,
            cursor_y: 0,
            next_row_y: 0,
        }
    }

    #[inline]
    pub fn padding(&self) -> u32 {
        self.padding
    }

    #[inline]
    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Reserves room for a `width`×`height` image and returns the top-left
    /// corner of its padded footprint.
    pub fn try_add(&mut self, width: u32, height: u32) -> Result<(u32, u32), AtlasError> {
        if width == 0 || height == 0 {
            return Err(AtlasError::EmptyImage);
        }

        let footprint_w = width.saturating_add(2 * self.padding);
        let footprint_h = height.saturating_add(2 * self.padding);
        if footprint_w > self.width || footprint_h > self.height {
            return Err(AtlasError::TooLarge {
                width,
                height,
                padding: self.padding,
                page_width: self.width,
                page_height: self.height,
            });
        }

        if self.cursor_x + footprint_w > self.width {
            if self.next_row_y + footprint_h > self.height {
                return Err(AtlasError::Full);
            }
            self.cursor_x = 0;
            self.cursor_y = self.next_row_y;
        }

        if self.cursor_y + footprint_h > self.height {
            return Err(AtlasError::Full);
        }

        let placed = (self.cursor_x, self.cursor_y);
        self.cursor_x += footprint_w;
        self.next_row_y = self.next_row_y.max(self.cursor_y + footprint_h);
        Ok(placed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── placement ───────────────────────────────────────────────────────────

    #[test]
    fn equal_squares_tile_in_rows() {
        let (page, side, pad) = (64, 10, 2);
        let mut packer = ShelfPacker::new(page, page, pad);
        let step = side + 2 * pad;
        let per_row = page / step;

        for i in 0..per_row * 2 {
            let placed = packer.try_add(side, side).unwrap();
            assert_eq!(placed, ((i % per_row) * step, (i / per_row) * step), "image {i}");
        }
    }

    #[test]
    fn next_shelf_starts_below_tallest_image() {
        let mut packer = ShelfPacker::new(32, 64, 1);
        assert_eq!(packer.try_add(10, 4), Ok((0, 0)));
        assert_eq!(packer.try_add(10, 12), Ok((12, 0)));
        assert_eq!(packer.try_add(10, 2), Ok((0, 14)));
    }

    // ── failures ────────────────────────────────────────────────────────────

    #[test]
    fn oversized_images_are_rejected_permanently() {
        let mut packer = ShelfPacker::new(64, 64, 4);
        assert!(matches!(packer.try_add(57, 8), Err(AtlasError::TooLarge { .. })));
        assert!(matches!(packer.try_add(8, 57), Err(AtlasError::TooLarge { .. })));
        assert_eq!(packer.try_add(56, 56), Ok((0, 0)));
    }

    #[test]
    fn full_page_reports_full() {
        let mut packer = ShelfPacker::new(16, 16, 0);
        assert_eq!(packer.try_add(16, 10), Ok((0, 0)));
        assert_eq!(packer.try_add(8, 6), Ok((0, 10)));
        assert_eq!(packer.try_add(8, 6), Ok((8, 10)));
        assert_eq!(packer.try_add(1, 1), Err(AtlasError::Full));
    }

    #[test]
    fn full_does_not_move_the_cursor() {
        let mut packer = ShelfPacker::new(16, 16, 0);
        packer.try_add(10, 10).unwrap();
        let before = packer.clone();
        assert_eq!(packer.try_add(10, 8), Err(AtlasError::Full));
        assert_eq!(packer, before);
        assert_eq!(packer.try_add(6, 6), Ok((10, 0)));
    }

    #[test]
    fn empty_images_are_rejected() {
        let mut packer = ShelfPacker::new(16, 16, 0);
        assert_eq!(packer.try_add(0, 4), Err(AtlasError::EmptyImage));
    }
}
