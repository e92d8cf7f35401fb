use url::Url;

pub fn normalize_url(input: &str) -> String {
    let trimmed = input.trim().trim_end_matches('/');
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("https://{}", trimmed)
    }
}

/// socket.io websocket endpoint for a server base such as
/// `http://localhost:5000`.
pub fn socket_io_url(base: &str) -> Result<Url, url::ParseError> {
    let mut url = Url::parse(&normalize_url(base))?;
    let scheme = if url.scheme() == "https" { "wss" } else { "ws" };
    // http(s) -> ws(s) is always an allowed scheme change.
    let _ = url.set_scheme(scheme);
    let path = format!("{}/socket.io/", url.path().trim_end_matches('/'));
    url.set_path(&path);
    url.set_query(Some("EIO=4&transport=websocket"));
    Ok(url)
}
