use http::Uri;

use importer_core::OciDigest;

use crate::errors::Result;

/// Resolve a `Location` response header against the request that returned it.
///
/// Registries may answer with an absolute url, an absolute path, or a path relative to the
/// request path.
pub fn resolve_location(origin: &str, request_path: &str, location: &str) -> Result<Uri> {
    let resolved = if location.contains("://") {
        location.to_string()
    } else if let Some(rest) = location.strip_prefix("//") {
        format!("http://{rest}")
    } else if location.starts_with('/') {
        format!("{origin}{location}")
    } else {
        let dir = match request_path.rfind('/') {
            Some(i) => &request_path[..=i],
            None => "/",
        };
        format!("{origin}{dir}{location}")
    };
    Ok(resolved.parse()?)
}

/// Append the `digest` query parameter that completes a monolithic upload.
pub fn with_digest_query(location: &Uri, digest: &OciDigest) -> Result<Uri> {
    let location = location.to_string();
    let separator = match location.find('?') {
        None => "?",
        Some(_) if location.ends_with('?') || location.ends_with('&') => "",
        Some(_) => "&",
    };
    Ok(format!("{location}{separator}digest={}", encode_query_value(&digest.to_string())).parse()?)
}

/// Percent-encode the characters of a digest or repository name that are not safe in a query
/// value.
pub fn encode_query_value(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '+' => out.push_str("%2B"),
            '=' => out.push_str("%3D"),
            '&' => out.push_str("%26"),
            '#' => out.push_str("%23"),
            ' ' => out.push_str("%20"),
            c => out.push(c),
        }
    }
    out
}
