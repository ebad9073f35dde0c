use lambda_http::{Request, RequestExt};

use crate::config::HubConfig;
use crate::error::{HubError, HubResult};

/// Verified identity of the caller. The OAuth flow happens upstream; the identity arrives
/// either as `X-User-Email`/`X-User-Name` headers or as claims of the API Gateway JWT authorizer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub email: String,
    pub name: String,
}

impl Caller {
    pub fn new(email: &str, name: &str) -> Self {
        Self {
            email: email.trim().to_lowercase(),
            name: name.trim().to_string(),
        }
    }

    /// Identity of the request. Behind the JWT authorizer only the verified claims count and
    /// an `X-User-Email` header naming someone else is rejected. Without an authorizer the
    /// identity headers set by the upstream proxy are used.
    pub fn from_request(event: &Request) -> HubResult<Option<Self>> {
        let header = |key: &str| {
            event
                .headers()
                .get(key)
                .and_then(|v| v.to_str().ok())
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
        };

        let jwt = event
            .request_context_ref()
            .and_then(|ctx| ctx.authorizer())
            .and_then(|auth| auth.jwt.as_ref());
        let Some(jwt) = jwt else {
            return Ok(header("X-User-Email")
                .map(|email| Self::new(&email, &header("X-User-Name").unwrap_or_default())));
        };

        let claim = |key: &str| {
            jwt.claims
                .get(key)
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
        };
        let Some(email) = claim("email") else {
            return Ok(None);
        };
        if let Some(claimed) = header("X-User-Email") {
            if !claimed.eq_ignore_ascii_case(&email) {
                tracing::warn!("Identity header {} disagrees with token email {}", claimed, email);
                return Err(HubError::forbidden(
                    "Caller identity does not match the signed-in account",
                ));
            }
        }
        let name = claim("name").or_else(|| header("X-User-Name")).unwrap_or_default();
        Ok(Some(Self::new(&email, &name)))
    }

    /// Stable id used for maker/author fields and upvote markers.
    pub fn id(&self) -> &str {
        &self.email
    }

    /// Display name, falling back to the email local part.
    pub fn display_name(&self) -> String {
        if !self.name.is_empty() {
            return self.name.clone();
        }
        self.email
            .split('@')
            .next()
            .filter(|s| !s.is_empty())
            .unwrap_or("Anonymous")
            .to_string()
    }
}

/// A signed-in member of the organisation's domain.
pub fn require_caller(event: &Request, config: &HubConfig) -> HubResult<Caller> {
    let caller = Caller::from_request(event)?
        .ok_or_else(|| HubError::Unauthorized("Missing caller identity".to_string()))?;
    check_domain(&caller.email, &config.allowed_email_domain)?;
    Ok(caller)
}

/// Only addresses of the organisation's domain may sign in.
pub fn check_domain(email: &str, allowed_domain: &str) -> HubResult<()> {
    let suffix = format!("@{}", allowed_domain.trim().to_lowercase());
    if email.trim().to_lowercase().ends_with(&suffix) {
        Ok(())
    } else {
        Err(HubError::forbidden(format!(
            "Access is restricted to {} accounts",
            suffix
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lambda_http::Body;

    #[test]
    fn caller_from_headers() {
        let request = lambda_http::http::Request::builder()
            .uri("/api/users/me")
            .header("X-User-Email", " Dev@OneOrigin.us ")
            .header("X-User-Name", "Dev Person")
            .body(Body::Empty)
            .unwrap();
        let caller = Caller::from_request(&request).unwrap().unwrap();
        assert_eq!(caller.email, "dev@oneorigin.us");
        assert_eq!(caller.display_name(), "Dev Person");
    }

    #[test]
    fn missing_identity_is_unauthorized() {
        let request = lambda_http::http::Request::builder()
            .uri("/api/users/me")
            .body(Body::Empty)
            .unwrap();
        let err = require_caller(&request, &HubConfig::default()).unwrap_err();
        assert!(matches!(err, HubError::Unauthorized(_)));
    }

    #[test]
    fn foreign_domain_is_forbidden() {
        let request = lambda_http::http::Request::builder()
            .uri("/api/showcase/projects")
            .header("X-User-Email", "outsider@gmail.com")
            .body(Body::Empty)
            .unwrap();
        let err = require_caller(&request, &HubConfig::default()).unwrap_err();
        assert!(matches!(err, HubError::Forbidden(_)));
    }

    /// HTTP API (payload v2) event carrying a JWT authorizer with the given email claim.
    fn authorized_request(claim_email: &str, header_email: Option<&str>) -> Request {
        let mut headers = serde_json::Map::new();
        headers.insert("content-type".into(), "application/json".into());
        if let Some(email) = header_email {
            headers.insert("x-user-email".into(), email.into());
        }
        let event = serde_json::json!({
            "version": "2.0",
            "routeKey": "$default",
            "rawPath": "/api/users",
            "rawQueryString": "",
            "headers": headers,
            "requestContext": {
                "accountId": "123456789012",
                "apiId": "api-id",
                "authorizer": {
                    "jwt": {
                        "claims": {"email": claim_email, "name": "Token Name"},
                        "scopes": null
                    }
                },
                "domainName": "id.execute-api.us-east-1.amazonaws.com",
                "domainPrefix": "id",
                "http": {
                    "method": "GET",
                    "path": "/api/users",
                    "protocol": "HTTP/1.1",
                    "sourceIp": "192.0.2.1",
                    "userAgent": "agent"
                },
                "requestId": "id",
                "routeKey": "$default",
                "stage": "$default",
                "time": "12/Mar/2020:19:03:58 +0000",
                "timeEpoch": 1583348638390u64
            },
            "isBase64Encoded": false
        });
        lambda_http::request::from_str(&event.to_string()).unwrap()
    }

    #[test]
    fn token_claim_wins_over_headers() {
        let request = authorized_request("Dev@OneOrigin.us", None);
        let caller = Caller::from_request(&request).unwrap().unwrap();
        assert_eq!(caller.email, "dev@oneorigin.us");
        assert_eq!(caller.name, "Token Name");

        let matching = authorized_request("dev@oneorigin.us", Some("DEV@oneorigin.us"));
        assert_eq!(
            Caller::from_request(&matching).unwrap().unwrap().email,
            "dev@oneorigin.us"
        );
    }

    #[test]
    fn header_disagreeing_with_token_is_rejected() {
        let request = authorized_request("dev@oneorigin.us", Some("boss@oneorigin.us"));
        let err = Caller::from_request(&request).unwrap_err();
        assert!(matches!(err, HubError::Forbidden(_)));
        assert!(require_caller(&request, &HubConfig::default()).is_err());
    }

    #[test]
    fn display_name_falls_back_to_local_part() {
        assert_eq!(Caller::new("sam.lee@oneorigin.us", "").display_name(), "sam.lee");
    }

    #[test]
    fn domain_check() {
        assert!(check_domain("a@oneorigin.us", "oneorigin.us").is_ok());
        assert!(check_domain("A@OneOrigin.US", "oneorigin.us").is_ok());
        assert!(check_domain("a@gmail.com", "oneorigin.us").is_err());
        assert!(check_domain("a@evil-oneorigin.us", "oneorigin.us").is_err());
    }
}
