//! Request classification.
//!
//! Classification is a pure function of the request shape. It never looks at
//! store contents, so the same request always runs the same strategy.

use harbor_core::{Destination, Request, RequestMode};
use serde::{Deserialize, Serialize};

/// File extensions served as static assets.
const STATIC_EXTENSIONS: &[&str] = &[
    "css", "js", "mjs", "png", "jpg", "jpeg", "gif", "svg", "webp", "ico", "woff", "woff2", "ttf", "otf",
];

/// Request class that selects the fetch strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Classification {
    /// Top-level document load.
    Navigation,
    /// Image, stylesheet, script or font.
    StaticAsset,
    /// API-like or uncategorized.
    Other,
}

/// Classify a request by navigation flag, destination and file extension.
pub fn classify(request: &Request) -> Classification {
    if request.mode == RequestMode::Navigate {
        return Classification::Navigation;
    }

    let asset_destination = matches!(
        request.destination,
        Destination::Image | Destination::Style | Destination::Script | Destination::Font
    );
    if asset_destination || has_static_extension(request.url().path()) {
        return Classification::StaticAsset;
    }

    Classification::Other
}

fn has_static_extension(path: &str) -> bool {
    let file = path.rsplit('/').next().unwrap_or_default();
    match file.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => {
            let ext = ext.to_ascii_lowercase();
            STATIC_EXTENSIONS.contains(&ext.as_str())
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    fn get(url: &str) -> Request {
        Request::get(Url::parse(url).unwrap())
    }

    #[test]
    fn test_navigation() {
        let req = Request::navigate(Url::parse("https://scanner.example/").unwrap());
        assert_eq!(classify(&req), Classification::Navigation);
    }

    #[test]
    fn test_navigation_wins_over_extension() {
        let req = Request::navigate(Url::parse("https://scanner.example/sw.js").unwrap());
        assert_eq!(classify(&req), Classification::Navigation);
    }

    #[test]
    fn test_static_by_destination() {
        let req = get("https://scanner.example/avatar").with_destination(Destination::Image);
        assert_eq!(classify(&req), Classification::StaticAsset);
        let req = get("https://cdnjs.cloudflare.com/lib").with_destination(Destination::Script);
        assert_eq!(classify(&req), Classification::StaticAsset);
    }

    #[test]
    fn test_static_by_extension() {
        assert_eq!(classify(&get("https://scanner.example/app.CSS")), Classification::StaticAsset);
        assert_eq!(classify(&get("https://scanner.example/icons/icon-192.png?v=3")), Classification::StaticAsset);
        assert_eq!(classify(&get("https://scanner.example/jsQR.min.js")), Classification::StaticAsset);
    }

    #[test]
    fn test_other() {
        assert_eq!(classify(&get("https://scanner.example/api/scans")), Classification::Other);
        assert_eq!(classify(&get("https://scanner.example/manifest.json")), Classification::Other);
        assert_eq!(classify(&get("https://scanner.example/.css")), Classification::Other);
    }

    #[test]
    fn test_stable_for_same_shape() {
        let a = get("https://scanner.example/style.css");
        let b = a.clone();
        assert_eq!(classify(&a), classify(&b));
    }
}
