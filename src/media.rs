use reqwest::Url;

/// Whether an image URL may be displayed: http(s) and a host equal to, or a
/// subdomain of, one of the allowed media domains.
pub fn is_allowed_image_url(url: &str, allowed_domains: &[String]) -> bool {
    let Ok(parsed) = Url::parse(url) else {
        return false;
    };
    if !matches!(parsed.scheme(), "http" | "https") {
        return false;
    }
    let Some(host) = parsed.host_str() else {
        return false;
    };
    let host = host.trim_end_matches('.').to_ascii_lowercase();

    allowed_domains.iter().any(|domain| {
        let domain = domain.trim().trim_start_matches("*.").trim_end_matches('.').to_ascii_lowercase();
        !domain.is_empty()
            && (host == domain
                || host
                    .strip_suffix(&domain)
                    .is_some_and(|prefix| prefix.ends_with('.')))
    })
}

/// Image URLs of a listing that pass the allowlist.
pub fn displayable_images<'a>(
    urls: impl IntoIterator<Item = &'a str>,
    allowed_domains: &[String],
) -> Vec<&'a str> {
    urls.into_iter()
        .filter(|url| {
            let allowed = is_allowed_image_url(url, allowed_domains);
            if !allowed {
                tracing::debug!("Skipping image outside media allowlist: {}", url);
            }
            allowed
        })
        .collect()
}
