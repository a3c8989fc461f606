//! Signature rule engine.
//!
//! A minimal CRS-dialect engine: `SecRule` directives are loaded once at
//! construction from an embedded, read-only ruleset and compiled to
//! regexes. A request is blocked when any interrupting rule matches one of
//! its targets. All state is immutable after construction, so a single
//! engine is shared freely across concurrent requests.

use axum::http::{HeaderMap, Method, Uri};
use include_dir::{Dir, include_dir};
use percent_encoding::percent_decode_str;
use regex::Regex;
use thiserror::Error;
use tracing::{debug, info};

static RULES_DIR: Dir<'_> = include_dir!("$CARGO_MANIFEST_DIR/rules");

/// Load order mirrors the upstream CRS layering: engine config, setup,
/// then the request rule files.
const RULE_FILES: &[&str] = &[
    "coraza.conf",
    "crs-setup.conf",
    "REQUEST-901-INITIALIZATION.conf",
    "REQUEST-941-APPLICATION-ATTACK-XSS.conf",
    "REQUEST-942-APPLICATION-ATTACK-SQLI.conf",
    "REQUEST-949-BLOCKING-EVALUATION.conf",
];

/// Directives that configure the engine rather than match requests.
const CONFIG_DIRECTIVES: &[&str] = &[
    "SecRuleEngine",
    "SecRequestBodyAccess",
    "SecRequestBodyLimit",
    "SecDefaultAction",
    "SecAction",
    "SecMarker",
];

#[derive(Debug, Error)]
pub enum WafError {
    #[error("failed to parse rule file {file}: {message}")]
    Parse { file: String, message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Target {
    RequestUri,
    Args,
    RequestBody,
    RequestHeaders,
}

impl Target {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "REQUEST_URI" => Some(Target::RequestUri),
            "ARGS" => Some(Target::Args),
            "REQUEST_BODY" => Some(Target::RequestBody),
            "REQUEST_HEADERS" => Some(Target::RequestHeaders),
            _ => None,
        }
    }
}

#[derive(Debug)]
struct Rule {
    id: u32,
    targets: Vec<Target>,
    pattern: Regex,
    msg: String,
    interrupts: bool,
}

/// The fields of a request the engine inspects. `body` is the captured
/// (possibly capped) byte slice; the caller retains the original.
pub struct RequestSnapshot<'a> {
    pub method: &'a Method,
    pub uri: &'a Uri,
    pub headers: &'a HeaderMap,
    pub body: &'a [u8],
}

pub struct RuleEngine {
    rules: Vec<Rule>,
}

impl RuleEngine {
    /// Compile the embedded ruleset. Any malformed directive is fatal.
    pub fn new() -> Result<Self, WafError> {
        let mut rules = Vec::new();

        for file in RULE_FILES {
            let contents = RULES_DIR
                .get_file(file)
                .and_then(|f| f.contents_utf8())
                .ok_or_else(|| WafError::Parse {
                    file: file.to_string(),
                    message: "missing from embedded ruleset".to_string(),
                })?;
            rules.extend(parse_directives(file, contents)?);
        }

        info!(rule_count = rules.len(), "signature ruleset compiled");
        Ok(Self { rules })
    }

    /// Evaluate a request snapshot. `Ok(true)` means an interrupting rule
    /// matched and the request should be denied.
    pub fn check(&self, request: &RequestSnapshot) -> Result<bool, WafError> {
        let uri_text = decoded_uri(request.uri);
        let args = collect_args(request.uri, request.headers, request.body);
        let body_text = String::from_utf8_lossy(request.body);
        let headers_text = headers_as_text(request.headers);

        for rule in &self.rules {
            let matched = rule.targets.iter().any(|target| match target {
                Target::RequestUri => rule.pattern.is_match(&uri_text),
                Target::Args => args.iter().any(|arg| rule.pattern.is_match(arg)),
                Target::RequestBody => rule.pattern.is_match(&body_text),
                Target::RequestHeaders => rule.pattern.is_match(&headers_text),
            });

            if matched && rule.interrupts {
                debug!(
                    rule_id = rule.id,
                    msg = %rule.msg,
                    method = %request.method,
                    uri = %request.uri,
                    "rule interrupted request"
                );
                return Ok(true);
            }
        }

        Ok(false)
    }
}

/// Percent-decoded path and query.
fn decoded_uri(uri: &Uri) -> String {
    let raw = uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or_else(|| uri.path());
    percent_decode_str(raw).decode_utf8_lossy().into_owned()
}

/// Decoded argument names and values from the query string, plus the body
/// when it is form-urlencoded.
fn collect_args(uri: &Uri, headers: &HeaderMap, body: &[u8]) -> Vec<String> {
    let mut args = Vec::new();

    if let Some(query) = uri.query() {
        collect_pairs(query, &mut args);
    }

    let is_form = headers
        .get(axum::http::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("application/x-www-form-urlencoded"));
    if is_form {
        collect_pairs(&String::from_utf8_lossy(body), &mut args);
    }

    args
}

fn collect_pairs(encoded: &str, out: &mut Vec<String>) {
    for pair in encoded.split('&') {
        for part in pair.splitn(2, '=') {
            let decoded = percent_decode_str(&part.replace('+', " "))
                .decode_utf8_lossy()
                .into_owned();
            if !decoded.is_empty() {
                out.push(decoded);
            }
        }
    }
}

fn headers_as_text(headers: &HeaderMap) -> String {
    let mut text = String::new();
    for (name, value) in headers {
        text.push_str(name.as_str());
        text.push_str(": ");
        text.push_str(&String::from_utf8_lossy(value.as_bytes()));
        text.push('\n');
    }
    text
}

// ── Directive parsing ──────────────────────────────────────────────────

fn parse_directives(file: &str, contents: &str) -> Result<Vec<Rule>, WafError> {
    let parse_err = |message: String| WafError::Parse {
        file: file.to_string(),
        message,
    };

    let mut rules = Vec::new();
    let mut pending = String::new();

    for line in contents.lines() {
        let trimmed = line.trim();
        if let Some(continued) = trimmed.strip_suffix('\\') {
            pending.push_str(continued);
            pending.push(' ');
            continue;
        }
        pending.push_str(trimmed);
        let directive = std::mem::take(&mut pending);
        let directive = directive.trim();

        if directive.is_empty() || directive.starts_with('#') {
            continue;
        }

        let keyword = directive.split_whitespace().next().unwrap_or_default();
        if keyword == "SecRule" {
            rules.push(parse_rule(directive).map_err(parse_err)?);
        } else if !CONFIG_DIRECTIVES.contains(&keyword) {
            return Err(parse_err(format!("unknown directive: {keyword}")));
        }
    }

    if !pending.trim().is_empty() {
        return Err(parse_err("dangling line continuation".to_string()));
    }

    Ok(rules)
}

fn parse_rule(directive: &str) -> Result<Rule, String> {
    let tokens = tokenize(directive);
    let [_, variables, operator, actions] = tokens.as_slice() else {
        return Err(format!(
            "expected 'SecRule VARIABLES OPERATOR ACTIONS', got {} token(s)",
            tokens.len()
        ));
    };

    let targets = variables
        .split('|')
        .map(|v| Target::parse(v).ok_or_else(|| format!("unsupported target: {v}")))
        .collect::<Result<Vec<_>, _>>()?;

    let pattern = operator
        .strip_prefix("@rx ")
        .ok_or_else(|| format!("unsupported operator: {operator}"))?;
    let pattern = Regex::new(pattern).map_err(|e| format!("invalid regex: {e}"))?;

    let mut id = None;
    let mut msg = String::new();
    let mut interrupts = false;
    for action in split_actions(actions) {
        if let Some(value) = action.strip_prefix("id:") {
            id = Some(
                value
                    .parse::<u32>()
                    .map_err(|_| format!("invalid rule id: {value}"))?,
            );
        } else if let Some(value) = action.strip_prefix("msg:") {
            msg = value.trim_matches('\'').to_string();
        } else if action == "deny" || action == "block" {
            interrupts = true;
        }
    }

    Ok(Rule {
        id: id.ok_or("rule is missing an id")?,
        targets,
        pattern,
        msg,
        interrupts,
    })
}

/// Split a directive into whitespace-separated tokens, treating
/// double-quoted spans as single tokens. `\"` inside a quoted span is kept
/// verbatim (the regex layer reads it as a literal quote).
fn tokenize(directive: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = directive.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\\' if in_quotes && chars.peek() == Some(&'"') => {
                current.push('\\');
                current.push(chars.next().unwrap());
            }
            '"' => in_quotes = !in_quotes,
            c if c.is_whitespace() && !in_quotes => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            c => current.push(c),
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

/// Split an action list on commas, ignoring commas inside single quotes
/// (e.g. `msg:'a, b'`).
fn split_actions(actions: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;

    for c in actions.chars() {
        match c {
            '\'' => {
                in_quotes = !in_quotes;
                current.push(c);
            }
            ',' if !in_quotes => {
                parts.push(std::mem::take(&mut current));
            }
            c => current.push(c),
        }
    }
    parts.push(current);
    parts
        .into_iter()
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn engine() -> RuleEngine {
        RuleEngine::new().expect("embedded ruleset must compile")
    }

    fn snapshot<'a>(
        method: &'a Method,
        uri: &'a Uri,
        headers: &'a HeaderMap,
        body: &'a [u8],
    ) -> RequestSnapshot<'a> {
        RequestSnapshot {
            method,
            uri,
            headers,
            body,
        }
    }

    #[test]
    fn embedded_ruleset_compiles() {
        assert!(!engine().rules.is_empty());
    }

    #[test]
    fn benign_request_passes() {
        let method = Method::GET;
        let uri: Uri = "/".parse().unwrap();
        let headers = HeaderMap::new();
        assert!(!engine().check(&snapshot(&method, &uri, &headers, b"")).unwrap());
    }

    #[test]
    fn percent_encoded_sqli_in_query_is_blocked() {
        let method = Method::GET;
        let uri: Uri = "/search?q=%27%20OR%201=1%20--".parse().unwrap();
        let headers = HeaderMap::new();
        assert!(engine().check(&snapshot(&method, &uri, &headers, b"")).unwrap());
    }

    #[test]
    fn union_select_in_form_body_is_blocked() {
        let method = Method::POST;
        let uri: Uri = "/login".parse().unwrap();
        let mut headers = HeaderMap::new();
        headers.insert(
            axum::http::header::CONTENT_TYPE,
            HeaderValue::from_static("application/x-www-form-urlencoded"),
        );
        let body = b"user=admin&pass=x%27+UNION+SELECT+password+FROM+users--";
        assert!(engine().check(&snapshot(&method, &uri, &headers, body)).unwrap());
    }

    #[test]
    fn script_tag_in_body_is_blocked() {
        let method = Method::POST;
        let uri: Uri = "/comment".parse().unwrap();
        let headers = HeaderMap::new();
        let body = br#"{"text": "<script>alert(1)</script>"}"#;
        assert!(engine().check(&snapshot(&method, &uri, &headers, body)).unwrap());
    }

    #[test]
    fn script_tag_in_header_is_blocked() {
        let method = Method::GET;
        let uri: Uri = "/".parse().unwrap();
        let mut headers = HeaderMap::new();
        headers.insert("user-agent", HeaderValue::from_static("<script>alert(1)</script>"));
        assert!(engine().check(&snapshot(&method, &uri, &headers, b"")).unwrap());
    }

    #[test]
    fn sql_tutorial_prose_is_not_blocked_by_keyword_alone() {
        // Prose about SQL without an attack shape should pass the
        // signature layer (the AI layer decides the grey zone).
        let method = Method::POST;
        let uri: Uri = "/blog".parse().unwrap();
        let headers = HeaderMap::new();
        let body = b"{\"body\": \"This tutorial explains what a SELECT statement does.\"}";
        assert!(!engine().check(&snapshot(&method, &uri, &headers, body)).unwrap());
    }

    // ── Parser ─────────────────────────────────────────────────────────

    #[test]
    fn parses_rule_with_quoted_msg_comma() {
        let rules = parse_directives(
            "test.conf",
            r#"SecRule ARGS "@rx foo" "id:1,deny,msg:'a, b'""#,
        )
        .unwrap();
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].id, 1);
        assert_eq!(rules[0].msg, "a, b");
        assert!(rules[0].interrupts);
    }

    #[test]
    fn escaped_quote_stays_inside_the_pattern() {
        let rules = parse_directives(
            "test.conf",
            r#"SecRule ARGS "@rx ['\"]admin" "id:3,deny""#,
        )
        .unwrap();
        assert_eq!(rules.len(), 1);
        assert!(rules[0].pattern.is_match("\"admin"));
        assert!(rules[0].pattern.is_match("'admin"));
    }

    #[test]
    fn joins_continuation_lines() {
        let rules = parse_directives(
            "test.conf",
            "SecRule ARGS \\\n    \"@rx foo\" \\\n    \"id:7,deny\"",
        )
        .unwrap();
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].id, 7);
    }

    #[test]
    fn unknown_directive_is_fatal() {
        let err = parse_directives("test.conf", "SecBogus On").unwrap_err();
        assert!(err.to_string().contains("SecBogus"));
    }

    #[test]
    fn invalid_regex_is_fatal() {
        let err =
            parse_directives("test.conf", r#"SecRule ARGS "@rx [" "id:1,deny""#).unwrap_err();
        assert!(err.to_string().contains("invalid regex"));
    }

    #[test]
    fn non_interrupting_rule_does_not_block() {
        let rules = parse_directives(
            "test.conf",
            r#"SecRule ARGS "@rx audit-only" "id:9,pass""#,
        )
        .unwrap();
        let engine = RuleEngine { rules };
        let method = Method::GET;
        let uri: Uri = "/x?q=audit-only".parse().unwrap();
        let headers = HeaderMap::new();
        assert!(!engine.check(&snapshot(&method, &uri, &headers, b"")).unwrap());
    }
}
