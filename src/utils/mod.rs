use url::Url;

use crate::domain::{AppError, IdentifierKind, VideoIdentifier};

const SUPPORTED_HOSTS: [&str; 2] = ["panopto.com", "panopto.eu"];
const VIEWER_PATHS: [&str; 2] = ["/Panopto/Pages/Viewer.aspx", "/Panopto/Pages/Embed.aspx"];

/// What the control surface learned about the active page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageInfo {
    pub url: Url,
    pub video: VideoIdentifier,
}

/// Extract the video identifier from a page address.
///
/// `id` is checked before `tid`; empty values count as absent.
pub fn extract_video_id(page_url: &Url) -> Result<VideoIdentifier, AppError> {
    let lookup = |key: &str| {
        page_url
            .query_pairs()
            .find(|(k, v)| k == key && !v.is_empty())
            .map(|(_, v)| v.into_owned())
    };

    if let Some(id) = lookup("id") {
        return Ok(VideoIdentifier {
            id,
            kind: IdentifierKind::Delivery,
        });
    }

    lookup("tid")
        .map(|id| VideoIdentifier {
            id,
            kind: IdentifierKind::Tid,
        })
        .ok_or(AppError::MissingIdentifier)
}

/// Check that `raw` is a Panopto viewer page and pull out its video id.
pub fn inspect_page(raw: &str) -> Result<PageInfo, AppError> {
    let url = Url::parse(raw).map_err(|_| AppError::UnsupportedHost)?;

    let host = url.host_str().unwrap_or_default();
    if !SUPPORTED_HOSTS.iter().any(|supported| host.contains(supported)) {
        return Err(AppError::UnsupportedHost);
    }

    if !VIEWER_PATHS.iter().any(|path| url.path() == *path) {
        return Err(AppError::NotViewerPage);
    }

    let video = extract_video_id(&url)?;
    Ok(PageInfo { url, video })
}

/// Human-readable size with 1024-based units and one decimal place.
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];

    if bytes < 1024 {
        return format!("{} B", bytes);
    }

    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    format!("{:.1} {}", value, UNITS[unit])
}

/// Sanitize filename to remove invalid characters
pub fn sanitize_filename(filename: &str) -> String {
    filename
        .chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' => '_',
            _ => c,
        })
        .collect::<String>()
        .trim()
        .to_string()
}
