//! Accepted profile picture content types.

use serde::{Deserialize, Serialize};

/// Image formats accepted for profile pictures.
///
/// `image/jpg` is not a registered MIME type but browsers and HTTP clients
/// still send it, so it is accepted and kept distinct from `image/jpeg` so
/// the stored content type matches what the client declared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ImageType {
    #[serde(rename = "image/jpeg")]
    Jpeg,
    #[serde(rename = "image/jpg")]
    Jpg,
    #[serde(rename = "image/png")]
    Png,
}

impl ImageType {
    /// Every accepted type, in the order they are listed to clients.
    pub const ALL: [Self; 3] = [Self::Jpeg, Self::Jpg, Self::Png];

    /// The MIME string for this type.
    #[must_use]
    pub const fn as_mime(&self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Jpg => "image/jpg",
            Self::Png => "image/png",
        }
    }

    /// Match a declared content type, ignoring case and any parameters
    /// (`image/png; charset=binary` is treated as `image/png`).
    #[must_use]
    pub fn from_mime(mime: &str) -> Option<Self> {
        let essence = mime.split(';').next().unwrap_or("").trim();
        Self::ALL
            .into_iter()
            .find(|t| t.as_mime().eq_ignore_ascii_case(essence))
    }
}

impl std::fmt::Display for ImageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_mime())
    }
}

impl std::str::FromStr for ImageType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_mime(s).ok_or_else(|| format!("unsupported image type: {s}"))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_from_mime_accepts_allowed_types() {
        assert_eq!(ImageType::from_mime("image/jpeg"), Some(ImageType::Jpeg));
        assert_eq!(ImageType::from_mime("image/jpg"), Some(ImageType::Jpg));
        assert_eq!(ImageType::from_mime("image/png"), Some(ImageType::Png));
    }

    #[test]
    fn test_from_mime_ignores_case_and_parameters() {
        assert_eq!(ImageType::from_mime("IMAGE/PNG"), Some(ImageType::Png));
        assert_eq!(
            ImageType::from_mime("image/jpeg; q=0.9"),
            Some(ImageType::Jpeg)
        );
    }

    #[test]
    fn test_from_mime_rejects_others() {
        assert_eq!(ImageType::from_mime("image/gif"), None);
        assert_eq!(ImageType::from_mime("text/plain"), None);
        assert_eq!(ImageType::from_mime(""), None);
    }

    #[test]
    fn test_display_and_from_str() {
        for t in ImageType::ALL {
            assert_eq!(t.to_string().parse::<ImageType>().unwrap(), t);
        }
        assert!("image/webp".parse::<ImageType>().is_err());
    }
}
