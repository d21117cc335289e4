use url::Url;

/// Origin plus path. Query and fragment are dropped so every visit to the
/// same page shares one key. Unparsable input comes back unchanged.
pub fn normalize_url(raw: &str) -> String {
    match Url::parse(raw) {
        Ok(url) => format!("{}{}", url.origin().ascii_serialization(), url.path()),
        Err(_) => raw.to_string(),
    }
}

pub fn host_of(raw: &str) -> String {
    Url::parse(raw)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_else(|| raw.to_string())
}
