use serde::{Deserialize, Serialize};

/// Pixel layout of a [`FrameBuffer`]. The canvas and every encoder work in
/// straight-alpha RGBA8.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PixelFormat {
    Rgba8,
}

impl PixelFormat {
    pub fn bytes_per_pixel(&self) -> usize {
        match self {
            PixelFormat::Rgba8 => 4,
        }
    }
}

/// A raw pixel buffer: the drawing surface's backing store and the unit
/// handed to the encoder. Rows are tightly packed, top to bottom.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameBuffer {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
}

impl FrameBuffer {
    /// Transparent black.
    pub fn new(width: u32, height: u32, format: PixelFormat) -> Self {
        let len = width as usize * height as usize * format.bytes_per_pixel();
        Self {
            data: vec![0; len],
            width,
            height,
            format,
        }
    }

    pub fn solid(width: u32, height: u32, color: &crate::Color) -> Self {
        let mut frame = Self::new(width, height, PixelFormat::Rgba8);
        frame.fill(color);
        frame
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Overwrite every pixel with `color` (no blending).
    pub fn fill(&mut self, color: &crate::Color) {
        let rgba = color.to_rgba8();
        self.data
            .chunks_exact_mut(4)
            .for_each(|px| px.copy_from_slice(&rgba));
    }

    fn index(&self, x: u32, y: u32) -> Option<usize> {
        (x < self.width && y < self.height).then(|| (y as usize * self.width as usize + x as usize) * 4)
    }

    pub fn get_pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        let i = self.index(x, y)?;
        let mut px = [0; 4];
        px.copy_from_slice(&self.data[i..i + 4]);
        Some(px)
    }

    /// No-op outside the buffer.
    pub fn set_pixel(&mut self, x: u32, y: u32, rgba: [u8; 4]) {
        if let Some(i) = self.index(x, y) {
            self.data[i..i + 4].copy_from_slice(&rgba);
        }
    }

    /// Source-over blend one pixel. No-op outside the buffer.
    pub fn blend_pixel(&mut self, x: u32, y: u32, src: [u8; 4]) {
        if src[3] == 0 {
            return;
        }
        if let Some(i) = self.index(x, y) {
            blend_over(&src, &mut self.data[i..i + 4]);
        }
    }

    /// Source-over `src` with its top-left corner at (`dx`, `dy`), clipped
    /// to this buffer.
    pub fn composite_over(&mut self, src: &FrameBuffer, dx: i32, dy: i32) {
        let x0 = dx.max(0);
        let y0 = dy.max(0);
        let x1 = (dx + src.width as i32).min(self.width as i32);
        let y1 = (dy + src.height as i32).min(self.height as i32);
        if x0 >= x1 || y0 >= y1 {
            return;
        }

        let len = (x1 - x0) as usize * 4;
        for y in y0..y1 {
            let s = ((y - dy) as usize * src.width as usize + (x0 - dx) as usize) * 4;
            let d = (y as usize * self.width as usize + x0 as usize) * 4;
            let src_row = &src.data[s..s + len];
            let dst_row = &mut self.data[d..d + len];
            for (sp, dp) in src_row.chunks_exact(4).zip(dst_row.chunks_exact_mut(4)) {
                blend_over(sp, dp);
            }
        }
    }
}

/// Integer Porter-Duff "over" for one RGBA8 pixel.
#[inline]
fn blend_over(s: &[u8], d: &mut [u8]) {
    let sa = s[3] as u32;
    match sa {
        0 => return,
        255 => {
            d.copy_from_slice(&s[..4]);
            return;
        }
        _ => {}
    }

    let da = d[3] as u32;
    let inv = 255 - sa;
    let out_a = sa + da * inv / 255;
    if out_a == 0 {
        return;
    }
    for c in 0..3 {
        let v = (s[c] as u32 * sa * 255 + d[c] as u32 * da * inv) / (out_a * 255);
        d[c] = v.min(255) as u8;
    }
    d[3] = out_a as u8;
}
