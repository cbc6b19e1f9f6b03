//! Network intercept rules and URL glob matching

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{E2eError, E2eResult};

pub const DEFAULT_STATUS: u16 = 200;
pub const DEFAULT_CONTENT_TYPE: &str = "application/json";

/// Abort reason Playwright reports for a forced network failure
pub const NETWORK_FAILURE: &str = "failed";

/// A rule substituting a controlled response (or a network failure) for
/// every request whose URL matches `url`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterceptRule {
    /// Playwright URL glob
    pub url: String,

    /// Response body. Serialized as JSON, except that a string is sent
    /// verbatim when the content type is not JSON
    #[serde(default)]
    pub response: serde_json::Value,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<BTreeMap<String, String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,

    #[serde(default)]
    pub force_network_error: bool,
}

/// What a matched request receives
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InterceptOutcome {
    Abort {
        reason: String,
    },
    Fulfill {
        status: u16,
        headers: BTreeMap<String, String>,
        content_type: String,
        body: String,
    },
}

impl InterceptRule {
    pub fn new(url: impl Into<String>, response: serde_json::Value) -> Self {
        Self {
            url: url.into(),
            response,
            status: None,
            headers: None,
            content_type: None,
            force_network_error: false,
        }
    }

    /// A rule that fails every matching request at the network level
    pub fn network_error(url: impl Into<String>) -> Self {
        Self {
            force_network_error: true,
            ..Self::new(url, serde_json::Value::Null)
        }
    }

    #[must_use]
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    #[must_use]
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers
            .get_or_insert_with(BTreeMap::new)
            .insert(name.into(), value.into());
        self
    }

    /// Resolve the response every matching request gets, applying defaults
    pub fn outcome(&self) -> E2eResult<InterceptOutcome> {
        if self.force_network_error {
            return Ok(InterceptOutcome::Abort {
                reason: NETWORK_FAILURE.to_string(),
            });
        }

        let content_type = self
            .content_type
            .clone()
            .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string());
        let body = match &self.response {
            serde_json::Value::String(text) if !content_type.contains("json") => text.clone(),
            other => serde_json::to_string(other)?,
        };

        Ok(InterceptOutcome::Fulfill {
            status: self.status.unwrap_or(DEFAULT_STATUS),
            headers: self.headers.clone().unwrap_or_default(),
            content_type,
            body,
        })
    }
}

/// A compiled Playwright-style URL glob
///
/// `**` matches any characters, `*` any characters except `/`, `?` a single
/// character and `{a,b}` either alternative. Everything else is literal.
#[derive(Debug, Clone)]
pub struct UrlGlob {
    source: String,
    regex: Regex,
}

impl UrlGlob {
    pub fn new(glob: &str) -> E2eResult<Self> {
        let regex = Regex::new(&glob_to_regex(glob))
            .map_err(|e| E2eError::Config(format!("invalid URL glob '{}': {}", glob, e)))?;
        Ok(Self {
            source: glob.to_string(),
            regex,
        })
    }

    pub fn matches(&self, url: &str) -> bool {
        self.regex.is_match(url)
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }
}

fn glob_to_regex(glob: &str) -> String {
    let mut out = String::from("^");
    let mut in_group = false;
    let mut chars = glob.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '*' => {
                if chars.peek() == Some(&'*') {
                    chars.next();
                    out.push_str(".*");
                } else {
                    out.push_str("[^/]*");
                }
            }
            '?' => out.push('.'),
            '{' => {
                in_group = true;
                out.push('(');
            }
            '}' if in_group => {
                in_group = false;
                out.push(')');
            }
            ',' if in_group => out.push('|'),
            '\\' => {
                if let Some(next) = chars.next() {
                    out.push_str(&regex::escape(&next.to_string()));
                }
            }
            other => out.push_str(&regex::escape(&other.to_string())),
        }
    }

    out.push('$');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("**/rest/ai/chat", "http://localhost:5678/rest/ai/chat", true ; "double star spans host")]
    #[test_case("**/rest/ai/chat", "http://localhost:5678/rest/ai/chat/extra", false ; "anchored at end")]
    #[test_case("**/rest/*/chat", "http://h/rest/ai/chat", true ; "single star segment")]
    #[test_case("**/rest/*/chat", "http://h/rest/a/b/chat", false ; "single star stops at slash")]
    #[test_case("**/rest/{ai,cta}/**", "http://h/rest/cta/become-creator", true ; "alternatives")]
    #[test_case("https://n8n.io/self-install?instanceId=x", "https://n8n.io/self-installXinstanceId=x", true ; "question mark is one char")]
    #[test_case("**/api.json", "http://h/apixjson", false ; "dot is literal")]
    fn test_glob_matching(glob: &str, url: &str, expected: bool) {
        assert_eq!(UrlGlob::new(glob).unwrap().matches(url), expected);
    }

    #[test]
    fn test_outcome_defaults_to_json_200() {
        let rule = InterceptRule::new("**/rest/cta/become-creator", serde_json::json!(true));
        assert_eq!(
            rule.outcome().unwrap(),
            InterceptOutcome::Fulfill {
                status: 200,
                headers: BTreeMap::new(),
                content_type: "application/json".to_string(),
                body: "true".to_string(),
            }
        );
    }

    #[test]
    fn test_text_body_is_sent_verbatim() {
        let html = InterceptRule::new("https://n8n.io/self-install", serde_json::json!(""))
            .with_content_type("text/html");
        let json = InterceptRule::new("**/rest/ai/chat", serde_json::json!("plain"));

        match html.outcome().unwrap() {
            InterceptOutcome::Fulfill { body, .. } => assert_eq!(body, ""),
            other => panic!("unexpected outcome {:?}", other),
        }
        match json.outcome().unwrap() {
            InterceptOutcome::Fulfill { body, .. } => assert_eq!(body, "\"plain\""),
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    #[test]
    fn test_network_error_ignores_response() {
        let rule = InterceptRule::new("**/rest/ai/chat", serde_json::json!({"ok": true})).with_status(500);
        let rule = InterceptRule {
            force_network_error: true,
            ..rule
        };
        assert_eq!(
            rule.outcome().unwrap(),
            InterceptOutcome::Abort {
                reason: "failed".to_string()
            }
        );
    }

    #[test]
    fn test_parse_camel_case_rule() {
        let yaml = r#"
url: "**/rest/settings"
status: 503
contentType: text/plain
forceNetworkError: false
headers:
  x-test: "1"
response:
  message: down
"#;
        let rule: InterceptRule = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(rule.status, Some(503));
        assert_eq!(rule.content_type.as_deref(), Some("text/plain"));
        assert_eq!(rule.headers.unwrap()["x-test"], "1");
    }
}
