use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct GlobalArgs {
    pub profile_dir: PathBuf,
}

impl GlobalArgs {
    #[must_use]
    pub fn new(profile_dir: impl Into<PathBuf>) -> Self {
        Self {
            profile_dir: profile_dir.into(),
        }
    }
}
