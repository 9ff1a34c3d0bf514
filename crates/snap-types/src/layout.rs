use std::path::{Path, PathBuf};

/// On-disk layout of a site root.
///
/// ```text
/// <root>/data/site-content.json        live document
/// <root>/content-backup/<stamp>.json   backups
/// <root>/data/menu/json/<category>.json
/// <root>/uploads/images/<file>
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SiteLayout {
    root: PathBuf,
}

impl SiteLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn content_file(&self) -> PathBuf {
        self.root.join("data").join("site-content.json")
    }

    pub fn backup_dir(&self) -> PathBuf {
        self.root.join("content-backup")
    }

    pub fn menu_dir(&self) -> PathBuf {
        self.root.join("data").join("menu").join("json")
    }

    pub fn uploads_dir(&self) -> PathBuf {
        self.root.join("uploads").join("images")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_under_root() {
        let layout = SiteLayout::new("/srv/site");
        assert_eq!(layout.root(), Path::new("/srv/site"));
        assert_eq!(layout.content_file(), PathBuf::from("/srv/site/data/site-content.json"));
        assert_eq!(layout.backup_dir(), PathBuf::from("/srv/site/content-backup"));
        assert_eq!(layout.menu_dir(), PathBuf::from("/srv/site/data/menu/json"));
        assert_eq!(layout.uploads_dir(), PathBuf::from("/srv/site/uploads/images"));
    }
}
