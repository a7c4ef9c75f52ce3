// Mirror session configuration.
//
// Immutable after startup, matching the "Configuration" data model: built once by the
// external CLI collaborator and handed to `MirrorEngine::new` by value.

/// Default SDR-white reference luminance in nits, used by the HDR-Reinhard pixel shader.
pub const DEFAULT_SDR_WHITE_NITS: f32 = 240.0;

/// Default fixed spin-delay interval for the pacing controller, in microseconds.
pub const DEFAULT_FRAME_DELAY_MICROS: u32 = 1000;

/// Capture wait / duplication reacquire timeout, matching the 100 ms figure used
/// throughout the pacing and error-handling design.
pub const DUPLICATION_TIMEOUT_MS: u32 = 100;

/// First-frame wait timeout before the engine reports startup failure.
pub const FIRST_FRAME_TIMEOUT_SECS: u64 = 5;

#[derive(Debug, Clone)]
pub struct MirrorConfig {
    pub source_index: usize,
    pub target_index: usize,
    pub preserve_aspect: bool,
    pub tonemap_enabled: bool,
    pub sdr_white_nits: f32,
    pub show_cursor: bool,
    pub use_waitable_swapchain: bool,
    pub use_smart_frame_selection: bool,
    pub use_frame_delay: bool,
    pub frame_delay_micros: u32,
    pub debug: bool,
}

impl Default for MirrorConfig {
    fn default() -> Self {
        Self {
            source_index: 0,
            target_index: 1,
            preserve_aspect: true,
            tonemap_enabled: true,
            sdr_white_nits: DEFAULT_SDR_WHITE_NITS,
            show_cursor: true,
            use_waitable_swapchain: true,
            use_smart_frame_selection: true,
            use_frame_delay: true,
            frame_delay_micros: DEFAULT_FRAME_DELAY_MICROS,
            debug: false,
        }
    }
}

impl MirrorConfig {
    /// Validate cross-field constraints the CLI collaborator cannot check in isolation.
    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            self.source_index != self.target_index,
            "source and target monitor index must differ (both are {})",
            self.source_index
        );
        anyhow::ensure!(
            self.sdr_white_nits > 0.0,
            "sdr-white-nits must be > 0, got {}",
            self.sdr_white_nits
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_matches_cli_defaults() {
        let cfg = MirrorConfig::default();
        assert_eq!(cfg.source_index, 0);
        assert_eq!(cfg.target_index, 1);
        assert!(cfg.preserve_aspect);
        assert!(cfg.tonemap_enabled);
        assert_eq!(cfg.sdr_white_nits, 240.0);
        assert!(cfg.show_cursor);
        assert!(cfg.use_waitable_swapchain);
        assert!(cfg.use_smart_frame_selection);
        assert!(cfg.use_frame_delay);
        assert_eq!(cfg.frame_delay_micros, 1000);
    }

    #[test]
    fn rejects_equal_source_and_target() {
        let mut cfg = MirrorConfig::default();
        cfg.target_index = cfg.source_index;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_non_positive_sdr_white() {
        let mut cfg = MirrorConfig::default();
        cfg.sdr_white_nits = 0.0;
        assert!(cfg.validate().is_err());
    }
}
