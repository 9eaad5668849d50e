//! Engine configuration.

use testeng_seq::{VectorDirs, VectorSet};

/// Run-wide settings of a [`TestEngine`](crate::TestEngine).
///
/// # Example
///
/// ```
/// use testeng::EngineConfig;
/// use testeng_seq::{VectorDirs, VectorSet};
///
/// let config = EngineConfig {
///     vector_set: VectorSet::from_is_full(1),
///     dirs: VectorDirs::under("/data/vectors").with_package_suffix("_hifi5"),
///     verbose: true,
///     ..Default::default()
/// };
/// assert_eq!(config.vector_set, VectorSet::Full);
/// ```
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Which vector set SEQ files are read from.
    pub vector_set: VectorSet,
    /// Roots of the three vector sets.
    pub dirs: VectorDirs,
    /// Print a line per case and keep running after a failed case.
    pub verbose: bool,
    /// Stop a suite after the first failing file.
    pub break_on_error: bool,
    /// Seed for the random flag words of extended error-state tests.
    pub errh_seed: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            vector_set: VectorSet::default(),
            dirs: VectorDirs::default(),
            verbose: false,
            break_on_error: false,
            errh_seed: 0x5eed,
        }
    }
}
