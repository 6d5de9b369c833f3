//! URL normalization for grounding
//!
//! Two URLs that point at the same product page must compare equal: scheme,
//! host and path are lower-cased, the fragment, default port and trailing
//! slash are dropped, and tracking parameters are stripped.

use reqwest::Url;

const TRACKING_PARAMS: &[&str] = &[
    "ref", "ref_src", "fbclid", "gclid", "dclid", "msclkid", "mc_cid", "mc_eid", "igshid", "spm",
    "_ga",
];

fn is_tracking_param(key: &str) -> bool {
    let key = key.to_lowercase();
    key.starts_with("utm_") || TRACKING_PARAMS.contains(&key.as_str())
}

/// Normalize a URL. Idempotent.
pub fn normalize_url(raw: &str) -> String {
    let trimmed = raw.trim();

    let url = match Url::parse(trimmed) {
        Ok(url) if url.host_str().is_some() => url,
        _ => return trimmed.trim_end_matches('/').to_lowercase(),
    };

    let mut out = format!("{}://", url.scheme());
    if let Some(host) = url.host_str() {
        out.push_str(&host.to_lowercase());
    }
    // port() is None for the scheme's default port
    if let Some(port) = url.port() {
        out.push(':');
        out.push_str(&port.to_string());
    }

    let path = url.path().to_lowercase();
    out.push_str(path.trim_end_matches('/'));

    if let Some(query) = url.query() {
        let kept: Vec<&str> = query
            .split('&')
            .filter(|pair| !pair.is_empty())
            .filter(|pair| {
                let key = pair.split('=').next().unwrap_or_default();
                !is_tracking_param(key)
            })
            .collect();
        if !kept.is_empty() {
            out.push('?');
            out.push_str(&kept.join("&"));
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lowercases_and_strips_trailing_slash() {
        assert_eq!(
            normalize_url("HTTPS://WWW.Digitec.CH/en/Product/Laptop-123/"),
            "https://www.digitec.ch/en/product/laptop-123"
        );
    }

    #[test]
    fn test_root_path() {
        assert_eq!(normalize_url("https://example.com/"), "https://example.com");
        assert_eq!(normalize_url("https://example.com"), "https://example.com");
    }

    #[test]
    fn test_strips_tracking_params_keeps_order() {
        assert_eq!(
            normalize_url("https://shop.ch/p?utm_source=news&id=7&gclid=abc&color=red&UTM_Medium=x"),
            "https://shop.ch/p?id=7&color=red"
        );
        assert_eq!(normalize_url("https://shop.ch/p?ref=home"), "https://shop.ch/p");
    }

    #[test]
    fn test_drops_fragment_and_default_port() {
        assert_eq!(
            normalize_url("https://shop.ch:443/p#reviews"),
            "https://shop.ch/p"
        );
        assert_eq!(
            normalize_url("http://localhost:8080/p/"),
            "http://localhost:8080/p"
        );
    }

    #[test]
    fn test_unparseable_input_falls_back() {
        assert_eq!(normalize_url("  Shop.CH/Item/ "), "shop.ch/item");
    }

    #[test]
    fn test_idempotent_on_examples() {
        for raw in [
            "https://Shop.ch/A/?utm_campaign=x&q=1",
            "http://example.com:8080/x/y/#z",
            "not a url/",
        ] {
            let once = normalize_url(raw);
            assert_eq!(normalize_url(&once), once);
        }
    }
}
