use axum::body::Body;
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use crate::error::{Result, TrellisError};
use dashmap::DashMap;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

/// Marks a response as never cacheable.
pub fn no_cache_headers(headers: &mut HeaderMap) {
    headers.insert(header::PRAGMA, HeaderValue::from_static("no-cache"));
    headers.insert(header::EXPIRES, HeaderValue::from_static("Mon, 1 Jan 2007 08:00:00 GMT"));
    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static("no-cache, must-revalidate"),
    );
}

/// Lets clients cache a response for as long as possible.
///
/// Only meant for URLs that change whenever their content does.
pub fn cache_forever_headers(headers: &mut HeaderMap) {
    headers.insert(header::PRAGMA, HeaderValue::from_static("cache"));
    headers.insert(header::EXPIRES, HeaderValue::from_static("Tue, 31 Dec 2030 00:00:00 GMT"));
    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static("max-age=946080000, public, cache"),
    );
}

/// Files served as-is, chosen by extension: `/logo.png` is read from `<root>/images/logo.png`.
///
/// Since responses are cached forever, pages should link to them through
/// [`StaticResources::cached_link`] (the `cached` template function), which
/// changes the URL whenever the file content changes.
#[derive(Debug, Clone)]
pub struct StaticResources {
    root: PathBuf,
    mapping: HashMap<String, String>,
    boot: HeaderValue,
    fingerprints: Option<Arc<DashMap<PathBuf, String>>>,
}

impl StaticResources {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let boot = chrono::Utc::now()
            .format("%a, %d %b %Y %H:%M:%S GMT")
            .to_string();
        let mut resources = Self {
            root: root.into(),
            mapping: HashMap::new(),
            boot: HeaderValue::from_str(&boot).unwrap_or(HeaderValue::from_static("")),
            fingerprints: Some(Arc::new(DashMap::new())),
        };
        resources
            .map_extensions("images", &["gif", "jpg", "png"])
            .map_extensions("css", &["css"])
            .map_extensions("js", &["js"]);
        resources
    }

    /// Serves files with the given extensions from the `dir` subdirectory.
    pub fn map_extensions(&mut self, dir: &str, extensions: &[&str]) -> &mut Self {
        for ext in extensions {
            if let Some(old) = self.mapping.insert(ext.to_string(), dir.to_string()) {
                tracing::warn!("Extension {} moved from {} to {}", ext, old, dir);
            }
        }
        self
    }

    /// Keeps content hashes between renders. Turned off, every link hashes the file again.
    pub fn caching(mut self, enabled: bool) -> Self {
        self.fingerprints = enabled.then(|| Arc::new(DashMap::new()));
        self
    }

    /// The file `path` maps to, or `None` if its extension is not served statically.
    pub fn resolve<'a>(&self, path: &'a str) -> Option<(PathBuf, &'a str)> {
        let dot = path.rfind('.').filter(|k| *k > 0)?;
        let slash = path.rfind('/')?;
        let ext = &path[dot + 1..];
        let dir = self.mapping.get(ext)?;
        let name = &path[slash + 1..];
        if name.is_empty() || name == ".." {
            return None;
        }
        Some((self.root.join(dir).join(name), ext))
    }

    /// `name?<md5 of the file>`: a link to resource `name` that changes with its content.
    pub fn cached_link(&self, name: &str) -> Result<String> {
        let not_found = || TrellisError::ResourceNotFound {
            name: name.to_string(),
        };
        let (file, _) = self
            .resolve(&format!("/{}", name.trim_start_matches('/')))
            .ok_or_else(not_found)?;
        if let Some(hash) = self.fingerprints.as_ref().and_then(|f| f.get(&file).map(|h| h.clone())) {
            return Ok(format!("{}?{}", name, hash));
        }

        let bytes = std::fs::read(&file).map_err(|e| {
            tracing::warn!("Resource not found: {} ({})", file.display(), e);
            not_found()
        })?;
        let hash = format!("{:x}", md5::compute(&bytes));
        if let Some(fingerprints) = &self.fingerprints {
            fingerprints.insert(file, hash.clone());
        }
        Ok(format!("{}?{}", name, hash))
    }

    /// Serves `path` if its extension is mapped; a mapped but missing file is a 404.
    pub async fn serve(&self, path: &str) -> Option<Response> {
        let (file, ext) = self.resolve(path)?;
        let bytes = match tokio::fs::read(&file).await {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!("Resource not found: {} ({})", file.display(), e);
                return Some(StatusCode::NOT_FOUND.into_response());
            }
        };

        let mut response = Body::from(bytes).into_response();
        let headers = response.headers_mut();
        if let Some(mime) = mime_guess::from_ext(ext).first() {
            if let Ok(value) = HeaderValue::from_str(mime.as_ref()) {
                headers.insert(header::CONTENT_TYPE, value);
            }
        }
        headers.insert(header::DATE, self.boot.clone());
        cache_forever_headers(headers);
        Some(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_by_extension() {
        let resources = StaticResources::new("/srv/static");
        let (file, ext) = resources.resolve("/app/logo.png").unwrap();
        assert_eq!(file, PathBuf::from("/srv/static/images/logo.png"));
        assert_eq!(ext, "png");
        assert!(resources.resolve("/app/greeting").is_none());
        assert!(resources.resolve("/app/data.json").is_none());
    }

    #[tokio::test]
    async fn test_serve_sets_cache_headers() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("css")).unwrap();
        std::fs::write(dir.path().join("css/site.css"), "body {}").unwrap();
        let resources = StaticResources::new(dir.path());

        let response = resources.serve("/site.css").await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "text/css");
        assert_eq!(response.headers()[header::PRAGMA], "cache");
        assert!(response.headers().contains_key(header::DATE));

        let missing = resources.serve("/other.css").await.unwrap();
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_cached_link_follows_content() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("js")).unwrap();
        let file = dir.path().join("js/app.js");
        std::fs::write(&file, "hello").unwrap();

        let resources = StaticResources::new(dir.path()).caching(false);
        assert_eq!(
            resources.cached_link("app.js").unwrap(),
            "app.js?5d41402abc4b2a76b9719d911017c592"
        );
        std::fs::write(&file, "hello again").unwrap();
        assert_ne!(
            resources.cached_link("app.js").unwrap(),
            "app.js?5d41402abc4b2a76b9719d911017c592"
        );

        assert!(matches!(
            resources.cached_link("missing.js"),
            Err(TrellisError::ResourceNotFound { .. })
        ));
        assert!(matches!(
            resources.cached_link("notes.txt"),
            Err(TrellisError::ResourceNotFound { .. })
        ));
    }

    #[test]
    fn test_cached_link_is_kept_when_caching() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("css")).unwrap();
        let file = dir.path().join("css/site.css");
        std::fs::write(&file, "body {}").unwrap();

        let resources = StaticResources::new(dir.path());
        let first = resources.cached_link("site.css").unwrap();
        std::fs::write(&file, "body { margin: 0 }").unwrap();
        assert_eq!(resources.cached_link("site.css").unwrap(), first);
    }
}
