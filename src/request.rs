//! Inbound request data the adapters read from.

use std::collections::HashMap;

/// Form field carrying the base64 SAML Response.
pub const SAML_RESPONSE_PARAM: &str = "SAMLResponse";
/// Form/query field echoing the post-login redirect target.
pub const RELAY_STATE_PARAM: &str = "RelayState";

/// Server variables (proxy-injected headers or environment) and POST form
/// fields of the current request.
#[derive(Debug, Clone, Default)]
pub struct AuthRequest {
    vars: HashMap<String, Vec<String>>,
    form: HashMap<String, String>,
}

impl AuthRequest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from request headers as a multi-valued map.
    pub fn from_headers(headers: HashMap<String, Vec<String>>) -> Self {
        Self {
            vars: headers,
            form: HashMap::new(),
        }
    }

    pub fn with_var(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.entry(name.into()).or_default().push(value.into());
        self
    }

    pub fn with_form_field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.form.insert(name.into(), value.into());
        self
    }

    /// Parse an `application/x-www-form-urlencoded` body into the form fields.
    pub fn with_form_body(mut self, body: &str) -> Self {
        for pair in body.split('&') {
            if let Some((key, value)) = pair.split_once('=') {
                let value = value.replace('+', " ");
                let decoded_value = urlencoding::decode(&value)
                    .map(|s| s.into_owned())
                    .unwrap_or_else(|_| value.clone());
                let key = urlencoding::decode(key)
                    .map(|s| s.into_owned())
                    .unwrap_or_else(|_| key.to_string());
                self.form.insert(key, decoded_value);
            }
        }
        self
    }

    /// First value of a server variable (case-insensitive name).
    pub fn var(&self, name: &str) -> Option<&str> {
        self.vars
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .and_then(|(_, v)| v.first())
            .map(|s| s.as_str())
    }

    pub fn form_value(&self, name: &str) -> Option<&str> {
        self.form.get(name).map(|s| s.as_str())
    }

    pub fn saml_response(&self) -> Option<&str> {
        self.form_value(SAML_RESPONSE_PARAM)
    }

    pub fn relay_state(&self) -> Option<&str> {
        self.form_value(RELAY_STATE_PARAM)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_var_lookup_is_case_insensitive() {
        let request = AuthRequest::new().with_var("Remote_User", "netid");
        assert_eq!(request.var("REMOTE_USER"), Some("netid"));
        assert_eq!(request.var("REDIRECT_REMOTE_USER"), None);
    }

    #[test]
    fn test_from_headers_uses_first_value() {
        let mut headers = HashMap::new();
        headers.insert(
            "X-Remote-User".to_string(),
            vec!["first".to_string(), "second".to_string()],
        );
        let request = AuthRequest::from_headers(headers);
        assert_eq!(request.var("x-remote-user"), Some("first"));
    }

    #[test]
    fn test_form_body_parsing() {
        let request = AuthRequest::new()
            .with_form_body("SAMLResponse=PHNhbWw%2BdGVzdA%3D%3D&RelayState=%2Fdashboard%3Ftab%3D1&other=a+b");
        assert_eq!(request.saml_response(), Some("PHNhbWw+dGVzdA=="));
        assert_eq!(request.relay_state(), Some("/dashboard?tab=1"));
        assert_eq!(request.form_value("other"), Some("a b"));
    }

    #[test]
    fn test_form_body_without_fields() {
        let request = AuthRequest::new().with_form_body("");
        assert_eq!(request.saml_response(), None);
        assert_eq!(request.relay_state(), None);
    }
}
