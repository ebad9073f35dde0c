//! Reachability check for user-submitted links.

use reqwest::header::{ACCEPT, CONTENT_TYPE, RANGE, USER_AGENT};
use reqwest::Url;
use serde::Serialize;

use crate::error::{HubError, HubResult};

const CHECK_UA: &str = "Mozilla/5.0 (compatible; OneOriginHub/1.0)";
const CHECK_ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";
const SNIPPET_BYTES: usize = 4096;

const PLACEHOLDER_DOMAINS: [&str; 3] = ["example.com", "example.org", "example.net"];

const SOFT_404_PATTERNS: [&str; 10] = [
    "page not found",
    "error 404",
    "404 not found",
    "the page you are looking for",
    "does not exist",
    "this blog post does not exist",
    "we can't find the page",
    "we can\u{2019}t find the page",
    ">404<",
    "status code 404",
];

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UrlCheck {
    pub ok: bool,
    pub status: u16,
    pub content_type: String,
    pub final_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub head_status: Option<u16>,
}

pub fn is_private_hostname(host: &str) -> bool {
    let h = host.trim().to_lowercase();
    if h.is_empty() || h == "localhost" || h.ends_with(".localhost") {
        return true;
    }
    if h == "0.0.0.0" || h == "127.0.0.1" || h == "[::1]" {
        return true;
    }
    if h.starts_with("10.") || h.starts_with("192.168.") {
        return true;
    }
    h.strip_prefix("172.")
        .and_then(|rest| rest.split('.').next())
        .and_then(|octet| octet.parse::<u8>().ok())
        .is_some_and(|octet| (16..=31).contains(&octet))
}

pub fn looks_like_soft_404(snippet: &str) -> bool {
    let s = snippet.to_lowercase();
    SOFT_404_PATTERNS.iter().any(|p| s.contains(p))
}

fn is_html(content_type: &str) -> bool {
    let ct = content_type.to_lowercase();
    ct.contains("text/html") || ct.contains("application/xhtml+xml")
}

/// Validates the raw parameter, or returns the placeholder verdict that needs no fetch.
fn prepare(raw: &str) -> HubResult<Result<Url, UrlCheck>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(HubError::bad_request("Missing url"));
    }
    let url = Url::parse(raw).map_err(|_| HubError::bad_request("Invalid url"))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(HubError::bad_request("Unsupported protocol"));
    }

    let host = url.host_str().unwrap_or_default().to_lowercase();
    if PLACEHOLDER_DOMAINS.contains(&host.as_str()) {
        return Ok(Err(UrlCheck {
            ok: false,
            status: 200,
            content_type: "text/html".to_string(),
            final_url: url.to_string(),
            reason: Some("Blocked placeholder domain".to_string()),
            head_status: None,
        }));
    }
    if is_private_hostname(&host) {
        return Err(HubError::bad_request("Blocked hostname"));
    }
    Ok(Ok(url))
}

/// HEAD then a ranged GET of the first 4 KiB; a page is ok when it answers 2xx/3xx with HTML
/// that does not read like a "not found" page.
pub async fn check_url(http: &reqwest::Client, raw: &str) -> HubResult<UrlCheck> {
    let url = match prepare(raw)? {
        Ok(url) => url,
        Err(verdict) => return Ok(verdict),
    };

    let head_status = http
        .head(url.clone())
        .header(USER_AGENT, CHECK_UA)
        .header(ACCEPT, CHECK_ACCEPT)
        .send()
        .await
        .ok()
        .map(|resp| resp.status().as_u16());

    let mut resp = http
        .get(url)
        .header(USER_AGENT, CHECK_UA)
        .header(ACCEPT, CHECK_ACCEPT)
        .header(RANGE, format!("bytes=0-{}", SNIPPET_BYTES - 1))
        .send()
        .await?;

    let status = resp.status().as_u16();
    let final_url = resp.url().to_string();
    let content_type = resp
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    let status_ok = (200..400).contains(&status);
    let html = is_html(&content_type);

    let mut snippet = Vec::new();
    if status_ok && html {
        while snippet.len() < SNIPPET_BYTES {
            match resp.chunk().await {
                Ok(Some(chunk)) => snippet.extend_from_slice(&chunk),
                _ => break,
            }
        }
        snippet.truncate(SNIPPET_BYTES);
    }

    let soft_404 = looks_like_soft_404(&String::from_utf8_lossy(&snippet));
    let ok = status_ok && html && !soft_404;
    let reason = if ok {
        None
    } else if !status_ok {
        Some("http_status")
    } else if !html {
        Some("non_html")
    } else {
        Some("soft_404")
    };

    Ok(UrlCheck {
        ok,
        status,
        content_type,
        final_url,
        reason: reason.map(str::to_string),
        head_status,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn private_hosts() {
        for host in ["localhost", "api.localhost", "127.0.0.1", "0.0.0.0", "10.1.2.3", "192.168.0.9", "172.16.0.1", "172.31.255.1"] {
            assert!(is_private_hostname(host), "{host}");
        }
        for host in ["172.32.0.1", "172.15.0.1", "github.com", "11.0.0.1"] {
            assert!(!is_private_hostname(host), "{host}");
        }
    }

    #[test]
    fn soft_404_detection() {
        assert!(looks_like_soft_404("<h1>Oops! Page Not Found</h1>"));
        assert!(looks_like_soft_404("<b>404</b>"));
        assert!(looks_like_soft_404("We can\u{2019}t find the page you wanted"));
        assert!(!looks_like_soft_404("<h1>Welcome</h1>"));
    }

    #[test]
    fn html_content_types() {
        assert!(is_html("text/html; charset=utf-8"));
        assert!(is_html("application/xhtml+xml"));
        assert!(!is_html("application/pdf"));
    }

    #[test]
    fn input_validation() {
        assert!(matches!(prepare(""), Err(HubError::BadRequest(_))));
        assert!(matches!(prepare("not a url"), Err(HubError::BadRequest(_))));
        assert!(matches!(prepare("ftp://files.test/a"), Err(HubError::BadRequest(_))));
        assert!(matches!(prepare("http://localhost:3000/"), Err(HubError::BadRequest(_))));
        assert!(matches!(prepare("https://github.com/acme"), Ok(Ok(_))));
    }

    #[tokio::test]
    async fn placeholder_domains_need_no_fetch() {
        let check = check_url(&reqwest::Client::new(), "https://Example.com/demo")
            .await
            .unwrap();
        assert!(!check.ok);
        assert_eq!(check.status, 200);
        assert_eq!(check.reason.as_deref(), Some("Blocked placeholder domain"));
    }
}
