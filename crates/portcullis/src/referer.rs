//! Safe return-destination computation.

use http::request::Parts;

/// Compute where to send the user after login or logout.
///
/// Candidates, in order: the `redirect` query parameter, the `Referer`
/// header, `root_path`. The candidate is replaced by `root_path` when it is not
/// a local absolute path (so absolute and protocol-relative URLs never leave
/// the site) or when it contains `current_path` (so the auth flow cannot loop
/// back into itself).
pub fn format_referer(parts: &Parts, current_path: &str, root_path: &str) -> String {
    let candidate = query_param(parts.uri.query(), "redirect").or_else(|| {
        parts
            .headers
            .get(http::header::REFERER)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    });

    match candidate {
        Some(target) if is_safe_target(&target, current_path) => target,
        Some(target) => {
            log::debug!("Rejecting unsafe return target '{target}', using '{root_path}'");
            root_path.to_string()
        }
        None => root_path.to_string(),
    }
}

fn is_safe_target(target: &str, current_path: &str) -> bool {
    target.starts_with('/')
        && !target.starts_with("//")
        && !target.starts_with("/\\")
        && !target.contains(current_path)
}

/// First non-empty value of `name` in a URL query string, percent-decoded.
pub(crate) fn query_param(query: Option<&str>, name: &str) -> Option<String> {
    url::form_urlencoded::parse(query?.as_bytes())
        .find(|(key, value)| key == name && !value.is_empty())
        .map(|(_, value)| value.into_owned())
}
