//! Which host names a certificate may serve
//!
//! A wildcard matches exactly one label: `*.example.com` covers
//! `a.example.com` but neither `example.com` nor `b.a.example.com`.

fn normalize(name: &str) -> String {
    name.trim().trim_end_matches('.').to_ascii_lowercase()
}

/// Whether certificate name `pattern` covers `host`
pub fn covers(pattern: &str, host: &str) -> bool {
    let pattern = normalize(pattern);
    let host = normalize(host);

    if pattern == host {
        return true;
    }

    match (pattern.strip_prefix("*."), host.split_once('.')) {
        (Some(suffix), Some((label, rest))) => !label.is_empty() && label != "*" && rest == suffix,
        _ => false,
    }
}

/// First host none of `certificate_domains` covers
pub fn first_uncovered<'a>(certificate_domains: &[String], hosts: &'a [String]) -> Option<&'a str> {
    hosts
        .iter()
        .find(|host| !certificate_domains.iter().any(|name| covers(name, host)))
        .map(String::as_str)
}
