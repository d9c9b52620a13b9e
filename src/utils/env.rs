/// Get environment variable with TIDEGATE_ prefix, falling back to unprefixed version
///
/// `TIDEGATE_{key}` wins over `{key}` so the proxy can be configured without
/// colliding with variables meant for the upstream application.
///
/// # Examples
///
/// ```rust,ignore
/// // Checks TIDEGATE_COOKIE_SECRET first, then COOKIE_SECRET
/// let secret = get_env_with_prefix("COOKIE_SECRET");
/// ```
pub fn get_env_with_prefix(key: &str) -> Option<String> {
    std::env::var(format!("TIDEGATE_{}", key))
        .or_else(|_| std::env::var(key))
        .ok()
}

/// Parse an environment variable, ignoring values that fail to parse
pub fn parse_env_with_prefix<T: std::str::FromStr>(key: &str) -> Option<T> {
    get_env_with_prefix(key).and_then(|value| value.parse().ok())
}
