//! URL joining for route probes.

/// Join a website root URL and a relative route path with exactly one `/`.
///
/// ```
/// use probe::join_url;
///
/// assert_eq!(join_url("https://a.com/", "/b"), "https://a.com/b");
/// assert_eq!(join_url("https://a.com", "b"), "https://a.com/b");
/// ```
pub fn join_url(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    format!("{}/{}", base, path)
}
