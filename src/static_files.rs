use axum::{
    body::Body,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use std::path::{Component, Path, PathBuf};
use std::time::UNIX_EPOCH;
use tokio::fs::File;
use tokio_util::io::ReaderStream;
use tracing::{debug, error, warn};

/// Serves the browser front end from a single directory.
#[derive(Clone)]
pub struct StaticFileHandler {
    pub static_dir: PathBuf,
}

/// Joins a request path onto `root`, refusing anything that climbs out of it.
fn resolve_under(root: &Path, request_path: &str) -> Option<PathBuf> {
    let mut resolved = root.to_path_buf();
    for component in Path::new(request_path.trim_start_matches('/')).components() {
        match component {
            Component::Normal(part) => resolved.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    Some(resolved)
}

fn cache_control_for(content_type: &str) -> &'static str {
    if content_type.starts_with("text/html") {
        "no-cache"
    } else if content_type.starts_with("image/") || content_type.starts_with("font/") {
        "public, max-age=31536000"
    } else if content_type.starts_with("text/css")
        || content_type.starts_with("application/javascript")
        || content_type.starts_with("text/javascript")
    {
        "public, max-age=300, must-revalidate"
    } else {
        "public, max-age=3600"
    }
}

impl StaticFileHandler {
    pub fn new(static_dir: PathBuf) -> Self {
        Self { static_dir }
    }

    pub async fn serve(&self, path: &str) -> Response {
        let Some(mut file_path) = resolve_under(&self.static_dir, path) else {
            warn!("Path traversal attempt: {:?}", path);
            return (StatusCode::FORBIDDEN, "Forbidden").into_response();
        };

        debug!("Attempting to serve static file: {:?}", file_path);

        let mut metadata = match tokio::fs::metadata(&file_path).await {
            Ok(m) => m,
            Err(e) => {
                debug!("Failed to get metadata for {:?}: {}", file_path, e);
                return (StatusCode::NOT_FOUND, "File not found").into_response();
            }
        };

        if metadata.is_dir() {
            file_path.push("index.html");
            metadata = match tokio::fs::metadata(&file_path).await {
                Ok(m) => m,
                Err(_) => return (StatusCode::NOT_FOUND, "File not found").into_response(),
            };
        }

        let file = match File::open(&file_path).await {
            Ok(file) => file,
            Err(e) => {
                debug!("Failed to open file {:?}: {}", file_path, e);
                return (StatusCode::NOT_FOUND, "File not found").into_response();
            }
        };

        let content_type = mime_guess::from_path(&file_path)
            .first_or_octet_stream()
            .to_string();
        let cache_control = cache_control_for(&content_type);

        let mut response = Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, content_type)
            .header(header::CONTENT_LENGTH, metadata.len())
            .header(header::CACHE_CONTROL, cache_control);

        if let Ok(modified) = metadata.modified()
            && let Ok(duration) = modified.duration_since(UNIX_EPOCH)
        {
            response = response
                .header(header::LAST_MODIFIED, httpdate::fmt_http_date(modified))
                .header(
                    header::ETAG,
                    format!("\"{}-{}\"", duration.as_secs(), metadata.len()),
                );
        }

        let body = Body::from_stream(ReaderStream::new(file));
        response.body(body).unwrap_or_else(|e| {
            error!("Failed to build static response for {:?}: {}", file_path, e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_under_rejects_escape() {
        let root = Path::new("/srv/static");
        assert_eq!(
            resolve_under(root, "/css/app.css"),
            Some(PathBuf::from("/srv/static/css/app.css"))
        );
        assert_eq!(
            resolve_under(root, "./script.js"),
            Some(PathBuf::from("/srv/static/script.js"))
        );
        assert_eq!(resolve_under(root, "../secret.txt"), None);
        assert_eq!(resolve_under(root, "img/../../secret.txt"), None);
    }

    #[test]
    fn test_cache_control_by_type() {
        assert_eq!(cache_control_for("text/html"), "no-cache");
        assert_eq!(cache_control_for("image/png"), "public, max-age=31536000");
        assert_eq!(
            cache_control_for("text/css"),
            "public, max-age=300, must-revalidate"
        );
        assert_eq!(cache_control_for("application/json"), "public, max-age=3600");
    }
}
