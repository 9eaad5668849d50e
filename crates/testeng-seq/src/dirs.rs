//! Brief / full / sanity vector-set selection.

use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};

/// Which vector set a run draws its SEQ files from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VectorSet {
    Brief,
    Full,
    #[default]
    Sanity,
}

impl VectorSet {
    /// Maps the legacy `is_full` mode: 0 brief, 1 full, anything else
    /// sanity.
    pub fn from_is_full(is_full: i32) -> Self {
        match is_full {
            0 => Self::Brief,
            1 => Self::Full,
            _ => Self::Sanity,
        }
    }
}

impl fmt::Display for VectorSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Brief => "brief",
            Self::Full => "full",
            Self::Sanity => "sanity",
        })
    }
}

/// Root directories of the three vector sets.
///
/// `package_suffix`, when set, is appended to the brief and full root
/// names (not to sanity), e.g. `vec_brief` + `_hifi5` -> `vec_brief_hifi5`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VectorDirs {
    pub brief: PathBuf,
    pub full: PathBuf,
    pub sanity: PathBuf,
    pub package_suffix: Option<String>,
}

impl Default for VectorDirs {
    fn default() -> Self {
        Self::under(".")
    }
}

impl VectorDirs {
    /// The conventional `vec_brief`, `vec_full` and `vec_sanity` roots
    /// below `base`.
    pub fn under(base: impl AsRef<Path>) -> Self {
        let base = base.as_ref();
        Self {
            brief: base.join("vec_brief"),
            full: base.join("vec_full"),
            sanity: base.join("vec_sanity"),
            package_suffix: None,
        }
    }

    pub fn with_package_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.package_suffix = Some(suffix.into());
        self
    }

    /// Root directory of `set`, suffix applied.
    pub fn root(&self, set: VectorSet) -> PathBuf {
        let (root, suffixed) = match set {
            VectorSet::Brief => (&self.brief, true),
            VectorSet::Full => (&self.full, true),
            VectorSet::Sanity => (&self.sanity, false),
        };
        match (&self.package_suffix, suffixed) {
            (Some(suffix), true) => {
                let mut name = OsString::from(root.as_os_str());
                name.push(suffix);
                PathBuf::from(name)
            }
            _ => root.clone(),
        }
    }

    /// Full path of SEQ file `file` in `set`.
    pub fn resolve(&self, set: VectorSet, file: impl AsRef<Path>) -> PathBuf {
        self.root(set).join(file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn is_full_mapping_defaults_to_sanity() {
        assert_eq!(VectorSet::from_is_full(0), VectorSet::Brief);
        assert_eq!(VectorSet::from_is_full(1), VectorSet::Full);
        assert_eq!(VectorSet::from_is_full(2), VectorSet::Sanity);
        assert_eq!(VectorSet::from_is_full(-7), VectorSet::Sanity);
        assert_eq!(VectorSet::default(), VectorSet::Sanity);
    }

    #[test]
    fn suffix_applies_to_brief_and_full_only() {
        let dirs = VectorDirs::under("/data").with_package_suffix("_hifi5");
        assert_eq!(
            dirs.resolve(VectorSet::Brief, "vec_add.seq"),
            PathBuf::from("/data/vec_brief_hifi5/vec_add.seq")
        );
        assert_eq!(
            dirs.resolve(VectorSet::Full, "vec_add.seq"),
            PathBuf::from("/data/vec_full_hifi5/vec_add.seq")
        );
        assert_eq!(
            dirs.resolve(VectorSet::Sanity, "vec_add.seq"),
            PathBuf::from("/data/vec_sanity/vec_add.seq")
        );
    }

    #[test]
    fn injected_roots_are_used_verbatim() {
        let dirs = VectorDirs {
            brief: "b".into(),
            full: "f".into(),
            sanity: "s".into(),
            package_suffix: None,
        };
        assert_eq!(dirs.resolve(VectorSet::Full, "x.seq"), Path::new("f/x.seq"));
    }
}
