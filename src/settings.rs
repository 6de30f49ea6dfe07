//! Render-wide tunables and debug visualization modes. No on-disk
//! persistence: a fresh process always starts from [`RenderSettings::default`].

/// Debug/heat-map visualizations that short-circuit accumulation and
/// post-processing in favor of a direct encode.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum RenderViewMode {
    #[default]
    None,
    HitAlbedo,
    HitNormal,
    HitBarycentrics,
    HitSpecRefract,
    HitAbsorption,
    HitEmissive,
    Depth,
    AccelerationStructureDepth,
    RayRecursionDepth,
    RussianRouletteKillDepth,
}

impl RenderViewMode {
    /// Modes whose output is already a 0..1 encode-friendly color rather
    /// than a linear radiance value — these still go through
    /// `linear_to_srgb` in `apply_post_processing` but skip exposure,
    /// contrast/brightness, saturation and tone mapping entirely.
    pub fn encodes_as_srgb(self) -> bool {
        matches!(
            self,
            Self::HitAlbedo | Self::HitEmissive | Self::HitAbsorption
        )
    }
}

/// Render-wide settings, covering post-process tunables and integrator
/// toggles.
#[derive(Clone, Copy, Debug)]
pub struct RenderSettings {
    pub exposure: f32,
    pub contrast: f32,
    pub brightness: f32,
    pub saturation: f32,
    pub max_white: f32,
    pub linear_to_srgb: bool,

    pub hdr_env_intensity: f32,
    pub ray_max_recursion: u32,
    pub russian_roulette: bool,
    pub cosine_weighted_diffuse: bool,

    pub render_view_mode: RenderViewMode,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            exposure: 1.0,
            contrast: 1.0,
            brightness: 0.0,
            saturation: 1.0,
            max_white: 1.0,
            linear_to_srgb: true,

            hdr_env_intensity: 1.0,
            ray_max_recursion: 8,
            russian_roulette: true,
            cosine_weighted_diffuse: true,

            render_view_mode: RenderViewMode::None,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn default_settings_have_no_active_view_mode() {
        assert_eq!(RenderSettings::default().render_view_mode, RenderViewMode::None);
    }

    #[test]
    fn hit_albedo_encodes_as_srgb_but_depth_does_not() {
        assert!(RenderViewMode::HitAlbedo.encodes_as_srgb());
        assert!(!RenderViewMode::Depth.encodes_as_srgb());
    }
}
