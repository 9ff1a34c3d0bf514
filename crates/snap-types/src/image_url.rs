use std::path::{Component, Path};

use crate::error::TypeError;

/// URL prefix under which uploaded images are served.
pub const UPLOAD_URL_PREFIX: &str = "/uploads/images/";

/// Classification of a string found where an image URL may appear.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ImageUrl<'a> {
    /// A file in the local uploads directory.
    Local(&'a str),
    /// An `http://` or `https://` URL; never checked against the filesystem.
    External(&'a str),
    /// Anything else.
    Other,
}

impl<'a> ImageUrl<'a> {
    pub fn classify(value: &'a str) -> Self {
        if value.starts_with("http://") || value.starts_with("https://") {
            Self::External(value)
        } else if value.starts_with(UPLOAD_URL_PREFIX) {
            Self::Local(value)
        } else {
            Self::Other
        }
    }

    pub fn is_local(&self) -> bool {
        matches!(self, Self::Local(_))
    }
}

/// Build the public URL for an uploaded file name.
pub fn local_image_url(filename: &str) -> String {
    format!("{UPLOAD_URL_PREFIX}{filename}")
}

/// Extract the file name a local image URL refers to.
///
/// Only canonical URLs are accepted: exactly one plain file name after the
/// prefix. Nested paths, `.`/`..` segments and backslashes are refused, so
/// every accepted URL equals `local_image_url` of its file name.
pub fn filename_from_url(url: &str) -> Result<&str, TypeError> {
    let name = url
        .strip_prefix(UPLOAD_URL_PREFIX)
        .ok_or_else(|| TypeError::NotLocalImage(url.to_string()))?;

    if name.contains(['/', '\\']) {
        return Err(TypeError::UnsafeFileName(url.to_string()));
    }
    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(name),
        _ => Err(TypeError::UnsafeFileName(url.to_string())),
    }
}
