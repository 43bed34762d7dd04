/// what [read](super::FileSystem::read) does with parts of a file
/// that were never written
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub enum HoleMode {
    /// holes read back as zeroes and count towards the bytes read
    #[default]
    ZeroFill,
    /// holes leave the caller's buffer as it was and are not counted
    Preserve,
}

/// per-session settings
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct FsOptions {
    pub hole_mode: HoleMode,
}
