//! Pagination Support
//!
//! GitHub paginates list endpoints and advertises further pages through the
//! `Link` response header, e.g.
//! `<https://api.github.com/user/repos?page=2>; rel="next", <...>; rel="last"`.

use reqwest::header::{HeaderMap, LINK};

/// Number of items requested per page on every list endpoint
pub const PER_PAGE: u32 = 100;

/// Extract the URL of the `next` relation from a `Link` header value
///
/// # Returns
/// The next page URL, or `None` when the header has no `next` relation
pub fn next_link(header: &str) -> Option<String> {
    header.split(',').find_map(|entry| {
        let mut parts = entry.split(';');
        let target = parts.next()?.trim();
        let url = target.strip_prefix('<')?.strip_suffix('>')?;

        let is_next = parts.any(|param| {
            let param = param.trim();
            match param.strip_prefix("rel=") {
                Some(rel) => rel
                    .trim_matches('"')
                    .split_whitespace()
                    .any(|value| value == "next"),
                None => false,
            }
        });

        is_next.then(|| url.to_string())
    })
}

/// Extract the `next` page URL from response headers
pub fn next_page_url(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(LINK)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .find_map(next_link)
}
