//! Shared look of every figure, passed explicitly to the renderers.

use plotters::style::RGBColor;

#[derive(Debug, Clone)]
pub struct PlotStyle {
    pub size: (u32, u32),
    pub font: &'static str,
    pub font_size: u32,
    /// Margin around the plotting area, pixels.
    pub margin: u32,
    pub label_area: u32,
    pub colors: Vec<RGBColor>,
    pub strip_box: RGBColor,
    pub line_width: u32,
    pub marker_size: u32,
}

impl Default for PlotStyle {
    fn default() -> Self {
        PlotStyle {
            size: (1000, 800),
            font: "sans-serif",
            font_size: 28,
            margin: 20,
            label_area: 90,
            colors: vec![
                RGBColor(0x00, 0x35, 0x9e),
                RGBColor(0xe6, 0x55, 0x18),
                RGBColor(0xc9, 0x1f, 0x16),
                RGBColor(0x3f, 0x90, 0xda),
                RGBColor(0x2c, 0xa0, 0x2c),
                RGBColor(0x83, 0x2d, 0xb6),
            ],
            strip_box: RGBColor(0xd9, 0xd9, 0xd9),
            line_width: 2,
            marker_size: 7,
        }
    }
}

impl PlotStyle {
    /// Palette entry `idx`, wrapping around.
    pub fn color(&self, idx: usize) -> RGBColor {
        if self.colors.is_empty() {
            return RGBColor(0, 0, 0);
        }
        self.colors[idx % self.colors.len()]
    }
}
