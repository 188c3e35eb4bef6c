use crate::models::error::GatewayError;

/// Final upstream URL: node base + rewritten path + whatever trailed the
/// matched prefix (query string included).
pub fn build_upstream_url(node_base: &str, wrapped_path: &str, trailing_path: &str) -> String {
    format!("{node_base}{wrapped_path}{trailing_path}")
}

/// A proxyable path has at least two non-empty segments; anything shorter
/// can never carry a route prefix plus a trailing path.
pub fn validate_path(path: &str) -> Result<(), GatewayError> {
    let segments = path.split('/').filter(|s| !s.is_empty()).count();
    if segments < 2 {
        return Err(GatewayError::RouteNotFound {
            path: path.to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_upstream_url() {
        assert_eq!(
            build_upstream_url("http://node-a", "/v1/users", "/1?full=1"),
            "http://node-a/v1/users/1?full=1"
        );
        assert_eq!(
            build_upstream_url("https://users.internal:8000", "/y", "/z"),
            "https://users.internal:8000/y/z"
        );
    }

    #[test]
    fn test_validate_path() {
        assert!(validate_path("/users/1").is_ok());
        assert!(validate_path("/a/b/c").is_ok());
        assert!(validate_path("/users").is_err());
        assert!(validate_path("/").is_err());
        assert!(validate_path("").is_err());
    }
}
