pub trait HasSize {
    fn size(&self) -> Size;
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Default)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

impl From<winit::dpi::PhysicalSize<u32>> for Size {
    fn from(size: winit::dpi::PhysicalSize<u32>) -> Self {
        Self {
            width: size.width,
            height: size.height,
        }
    }
}

impl HasSize for winit::window::Window {
    fn size(&self) -> Size {
        self.inner_size().into()
    }
}

pub trait Window: HasSize + raw_window_handle::HasRawWindowHandle {}

impl Window for winit::window::Window {}

/// Normalized region of the window, origin at the top left.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub const FULL: Rect = Rect {
        x: 0.,
        y: 0.,
        width: 1.,
        height: 1.,
    };

    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn to_pixels(&self, size: Size) -> PixelRect {
        let span = |start: f32, extent: f32, total: u32| {
            let total = total as f32;
            let from = (start * total).round().clamp(0., total);
            let to = ((start + extent) * total).round().clamp(from, total);
            (from as u32, (to - from) as u32)
        };
        let (x, width) = span(self.x, self.width, size.width);
        let (y, height) = span(self.y, self.height, size.height);
        PixelRect {
            x,
            y,
            width,
            height,
        }
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Default)]
pub struct PixelRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl PixelRect {
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn aspect_ratio(&self) -> f32 {
        if self.height == 0 {
            1.
        } else {
            self.width as f32 / self.height as f32
        }
    }

    /// Half open on the right and bottom edges, so neighbours never share a
    /// pixel.
    pub fn contains(&self, x: f64, y: f64) -> bool {
        let (left, top) = (self.x as f64, self.y as f64);
        x >= left && x < left + self.width as f64 && y >= top && y < top + self.height as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SIZE: Size = Size {
        width: 1280,
        height: 720,
    };

    #[test]
    fn full_rect_covers_the_window() {
        assert_eq!(
            Rect::FULL.to_pixels(SIZE),
            PixelRect {
                x: 0,
                y: 0,
                width: 1280,
                height: 720
            }
        );
    }

    #[test]
    fn rects_are_clamped_to_the_window() {
        let rect = Rect::new(0.75, -0.5, 0.5, 1.0).to_pixels(SIZE);
        assert_eq!(rect.x, 960);
        assert_eq!(rect.width, 320);
        assert_eq!(rect.y, 0);
        assert_eq!(rect.height, 360);
    }

    #[test]
    fn empty_window_gives_empty_rects() {
        let rect = Rect::FULL.to_pixels(Size::default());
        assert!(rect.is_empty());
        assert_eq!(rect.aspect_ratio(), 1.);
    }

    #[test]
    fn pixel_rect_contains_its_top_left_but_not_its_far_edges() {
        let rect = Rect::new(0.5, 0.5, 0.25, 0.25).to_pixels(SIZE);
        assert!(rect.contains(640., 360.));
        assert!(rect.contains(959.5, 539.5));
        assert!(!rect.contains(960., 400.));
        assert!(!rect.contains(700., 540.));
        assert!(!rect.contains(639.9, 400.));
    }
}
