//! Redirect responses with a JSON fallback for API clients.
//!
//! Browsers get a real redirect. Clients whose `Accept` header prefers JSON
//! over HTML get a `401` with the destination in `Location` and a small JSON
//! body instead.

use axum::body::Body;
use axum::response::{IntoResponse, Response};
use http::{HeaderMap, HeaderValue, StatusCode};

/// JSON body sent to API clients in place of a redirect.
pub const UNAUTHORIZED_BODY: &str = r#"{"error":"401 Unauthorized"}"#;

/// Redirect to `location` with `302 Found`, or answer API clients with a JSON 401.
pub fn redirect(headers: &HeaderMap, location: &str) -> Response {
    redirect_with_status(headers, location, StatusCode::FOUND)
}

/// Like [`redirect`], with an explicit redirect status.
pub fn redirect_with_status(headers: &HeaderMap, location: &str, status: StatusCode) -> Response {
    let location_value = HeaderValue::from_str(location).unwrap_or_else(|_| {
        log::warn!("Redirect target '{location}' is not a valid header value, using '/'");
        HeaderValue::from_static("/")
    });

    let mut response = if prefers_json(headers) {
        (
            StatusCode::UNAUTHORIZED,
            [(http::header::CONTENT_TYPE, "application/json")],
            UNAUTHORIZED_BODY,
        )
            .into_response()
    } else {
        let mut response = Response::new(Body::empty());
        *response.status_mut() = status;
        response
    };

    response
        .headers_mut()
        .insert(http::header::LOCATION, location_value);
    response
}

/// Whether the client's `Accept` header prefers JSON over HTML.
///
/// HTML wins ties and requests without an `Accept` header.
pub fn prefers_json(headers: &HeaderMap) -> bool {
    let accept = headers
        .get_all(http::header::ACCEPT)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .collect::<Vec<_>>()
        .join(",");

    if accept.trim().is_empty() {
        return false;
    }

    let ranges = parse_accept(&accept);
    let html = best_match(&ranges, "text", "html");
    let json = best_match(&ranges, "application", "json");

    match (html, json) {
        (_, None) => false,
        (None, Some(_)) => true,
        (Some(h), Some(j)) => j.outranks(&h),
    }
}

#[derive(Debug)]
struct MediaRange<'a> {
    kind: &'a str,
    subtype: &'a str,
    quality: f32,
    index: usize,
}

/// How well one media range matched a candidate type.
#[derive(Debug, Clone, Copy)]
struct Match {
    quality: f32,
    specificity: u8,
    index: usize,
}

impl Match {
    fn outranks(&self, other: &Match) -> bool {
        if self.quality != other.quality {
            return self.quality > other.quality;
        }
        if self.specificity != other.specificity {
            return self.specificity > other.specificity;
        }
        self.index < other.index
    }
}

fn parse_accept(accept: &str) -> Vec<MediaRange<'_>> {
    accept
        .split(',')
        .enumerate()
        .filter_map(|(index, entry)| {
            let mut params = entry.split(';');
            let (kind, subtype) = params.next()?.trim().split_once('/')?;
            let quality = params
                .filter_map(|p| p.trim().strip_prefix("q="))
                .find_map(|q| q.trim().parse::<f32>().ok())
                .unwrap_or(1.0);
            Some(MediaRange {
                kind: kind.trim(),
                subtype: subtype.trim(),
                quality,
                index,
            })
        })
        .collect()
}

fn best_match(ranges: &[MediaRange<'_>], kind: &str, subtype: &str) -> Option<Match> {
    ranges
        .iter()
        .filter_map(|r| {
            let specificity = if r.kind.eq_ignore_ascii_case(kind)
                && r.subtype.eq_ignore_ascii_case(subtype)
            {
                2
            } else if r.kind.eq_ignore_ascii_case(kind) && r.subtype == "*" {
                1
            } else if r.kind == "*" && r.subtype == "*" {
                0
            } else {
                return None;
            };
            Some(Match {
                quality: r.quality,
                specificity,
                index: r.index,
            })
        })
        // The most specific range decides the quality for a type.
        .max_by(|a, b| {
            a.specificity
                .cmp(&b.specificity)
                .then_with(|| b.index.cmp(&a.index))
        })
        .filter(|m| m.quality > 0.0)
}
