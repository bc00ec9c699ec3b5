use crate::render::primitives::Color;

fn hex(value: &str) -> Color {
    Color::from_hex(value).unwrap_or(Color::WHITE)
}

/// Chart geometry and theme. Radii are in canvas units.
#[derive(Debug, Clone)]
pub struct ChartStyle {
    pub size: f64,
    pub outer_radius: f64,
    pub inner_radius: f64,
    pub center_radius: f64,
    /// Inset of the planet ring from the outer ring
    pub planet_inset: f64,
    /// Inset of the zodiac glyph ring from the outer ring
    pub zodiac_inset: f64,
    /// Distance of ASC/MC labels beyond the outer ring
    pub angle_label_offset: f64,
    pub planet_marker_radius: f64,

    pub background_color: Color,
    pub ring_color: Color,
    pub outer_ring_width: f64,
    pub inner_ring_width: f64,
    pub inner_ring_opacity: f32,
    pub center_color: Color,
    pub cusp_color: Color,
    pub cusp_width: f64,
    pub cusp_opacity: f32,
    pub ascendant_color: Color,
    pub midheaven_color: Color,
    pub angle_width: f64,
    pub angle_dash: Vec<f64>,
    pub angle_label_size: f64,
    pub sign_color: Color,
    pub sign_glyph_size: f64,
    pub planet_fill: Color,
    pub planet_stroke: Color,
    pub planet_stroke_width: f64,
    pub planet_glyph_color: Color,
    pub planet_glyph_size: f64,
    pub placeholder_color: Color,
}

impl ChartStyle {
    pub fn center(&self) -> f64 {
        self.size / 2.0
    }

    pub fn planet_radius(&self) -> f64 {
        self.outer_radius - self.planet_inset
    }

    pub fn zodiac_radius(&self) -> f64 {
        self.outer_radius - self.zodiac_inset
    }

    pub fn angle_label_radius(&self) -> f64 {
        self.outer_radius + self.angle_label_offset
    }
}

impl Default for ChartStyle {
    fn default() -> Self {
        // Dark slate theme
        Self {
            size: 840.0,
            outer_radius: 350.0,
            inner_radius: 280.0,
            center_radius: 7.0,
            planet_inset: 56.0,
            zodiac_inset: 21.0,
            angle_label_offset: 28.0,
            planet_marker_radius: 17.0,

            background_color: hex("#0F172A"),
            ring_color: hex("#2D3748"),
            outer_ring_width: 3.0,
            inner_ring_width: 1.5,
            inner_ring_opacity: 0.5,
            center_color: hex("#4A5568"),
            cusp_color: hex("#4A5568"),
            cusp_width: 1.0,
            cusp_opacity: 0.6,
            ascendant_color: hex("#60A5FA"),
            midheaven_color: hex("#A78BFA"),
            angle_width: 3.0,
            angle_dash: vec![7.0, 7.0],
            angle_label_size: 16.0,
            sign_color: Color::WHITE,
            sign_glyph_size: 30.0,
            planet_fill: hex("#1A202C"),
            planet_stroke: hex("#4A5568"),
            planet_stroke_width: 1.5,
            planet_glyph_color: hex("#FDE047"),
            planet_glyph_size: 20.0,
            placeholder_color: hex("#9CA3AF"),
        }
    }
}
