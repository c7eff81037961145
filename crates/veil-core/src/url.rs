//! Href parsing utilities
//!
//! These functions work directly on string slices and avoid allocations.
//! Only absolute (`scheme://host/...`), protocol-relative (`//host/...`) and
//! root-relative (`/path`) hrefs resolve to a path; anything else is left
//! alone by the callers.

// =============================================================================
// Scheme / Host
// =============================================================================

/// Get the position after "://" (or after a leading "//").
#[inline]
pub fn get_authority_start(href: &str) -> Option<usize> {
    let bytes = href.as_bytes();

    if bytes.starts_with(b"//") {
        return Some(2);
    }

    // Find ':' before any path, query or fragment delimiter
    let colon_pos = bytes
        .iter()
        .position(|&b| matches!(b, b':' | b'/' | b'?' | b'#'))
        .filter(|&pos| bytes[pos] == b':')?;

    if bytes.len() > colon_pos + 2 && bytes[colon_pos + 1] == b'/' && bytes[colon_pos + 2] == b'/' {
        return Some(colon_pos + 3);
    }

    None
}

/// Host of an absolute or protocol-relative href, without port or userinfo.
#[inline]
pub fn extract_host(href: &str) -> Option<&str> {
    let start = get_authority_start(href)?;
    let bytes = href.as_bytes();

    let mut end = bytes.len();
    for (i, &b) in bytes[start..].iter().enumerate() {
        if b == b'/' || b == b'?' || b == b'#' {
            end = start + i;
            break;
        }
    }

    let mut authority = &href[start..end];
    if let Some(at_pos) = authority.rfind('@') {
        authority = &authority[at_pos + 1..];
    }
    if let Some(colon_pos) = authority.rfind(':') {
        authority = &authority[..colon_pos];
    }
    Some(authority)
}

// =============================================================================
// Path / Fragment
// =============================================================================

/// Path of an href, or `None` for relative hrefs that need a base to resolve.
#[inline]
pub fn extract_path(href: &str) -> Option<&str> {
    let bytes = href.as_bytes();

    let path_start = match get_authority_start(href) {
        Some(start) => {
            let mut found = None;
            for (i, &b) in bytes[start..].iter().enumerate() {
                if b == b'/' {
                    found = Some(start + i);
                    break;
                }
                if b == b'?' || b == b'#' {
                    return Some("/");
                }
            }
            match found {
                Some(pos) => pos,
                None => return Some("/"),
            }
        }
        None if bytes.first() == Some(&b'/') => 0,
        None => return None,
    };

    let mut path_end = bytes.len();
    for (i, &b) in bytes[path_start..].iter().enumerate() {
        if b == b'?' || b == b'#' {
            path_end = path_start + i;
            break;
        }
    }

    Some(&href[path_start..path_end])
}

/// Fragment of an href (without '#'), if any.
#[inline]
pub fn extract_fragment(href: &str) -> Option<&str> {
    href.find('#').map(|pos| &href[pos + 1..])
}
