//! `intake bind` command implementation
//!
//! Builds a request snapshot from the command line, dispatches it through the
//! compiled registry and prints either the bound parameters or the failure
//! body as JSON.

use anyhow::{anyhow, Context, Result};
use clap::Args;
use intake_api::{ApiResult, BoundRequest, HttpMethod, RawBody, RawRequest};
use std::io::Read;
use std::path::PathBuf;
use tracing::{debug, warn};

/// Arguments for `intake bind`
#[derive(Debug, Args)]
pub struct BindArgs {
    /// Definition file (.yaml, .yml or .json)
    pub definitions: PathBuf,

    /// HTTP method (GET, POST, PUT, PATCH, DELETE, ...)
    pub method: String,

    /// Concrete request path; may carry a query string (`/items/?limit=5`)
    pub path: String,

    /// Query parameter as key=value (can be used multiple times)
    #[arg(short, long = "query", value_name = "KEY=VALUE", value_parser = parse_key_value)]
    pub query: Vec<(String, String)>,

    /// Body file, or '-' for stdin
    #[arg(short, long)]
    pub body: Option<String>,

    /// Treat the body as application/x-www-form-urlencoded instead of JSON
    #[arg(long)]
    pub form: bool,
}

/// Execute the bind command, returning the process exit code
pub fn execute(args: BindArgs) -> Result<i32> {
    let registry = super::load_registry(&args.definitions)?;
    let request = build_request(&args)?;
    debug!(method = %request.method, path = %request.path, "dispatching");

    let result = registry.dispatch(&request);
    if let Err(err) = &result {
        warn!(status = err.status_code(), path = %request.path, "request rejected");
    }
    let (output, code) = render(result);
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(code)
}

/// Success: `{"endpoint", "params"}` and exit 0.
/// Failure: `{"status", "detail"}` and exit 1.
fn render(result: ApiResult<BoundRequest>) -> (serde_json::Value, i32) {
    match result {
        Ok(bound) => (
            serde_json::json!({
                "endpoint": bound.endpoint(),
                "params": serde_json::Value::from(bound.to_value()),
            }),
            0,
        ),
        Err(err) => {
            let mut body = err.to_json();
            body["status"] = serde_json::Value::from(err.status_code());
            (body, 1)
        }
    }
}

/// Assemble the raw request from command-line arguments
pub fn build_request(args: &BindArgs) -> Result<RawRequest> {
    let method: HttpMethod = args.method.parse().map_err(|e: String| anyhow!(e))?;

    let (path, query_string) = match args.path.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (args.path.as_str(), None),
    };

    let mut request = RawRequest::new(method, path);
    if let Some(query) = query_string {
        request = request
            .with_query_string(query)
            .map_err(|e| anyhow!("Invalid query string: {}", e))?;
    }
    for (key, value) in &args.query {
        request = request.with_query_param(key, value);
    }

    if let Some(source) = &args.body {
        let content = read_body(source)?;
        let body = if args.form {
            RawBody::form(content.trim_end())
        } else {
            RawBody::json(&content)
        };
        request = request.with_body(body.map_err(|e| anyhow!("{}", e))?);
    }
    Ok(request)
}

fn read_body(source: &str) -> Result<String> {
    if source == "-" {
        let mut content = String::new();
        std::io::stdin()
            .read_to_string(&mut content)
            .context("Failed to read body from stdin")?;
        Ok(content)
    } else {
        std::fs::read_to_string(source).with_context(|| format!("Failed to read body from {}", source))
    }
}

/// Parse a `key=value` argument; the value may be empty or contain '='
pub fn parse_key_value(input: &str) -> Result<(String, String), String> {
    match input.split_once('=') {
        Some((key, _)) if key.is_empty() => Err(format!("empty key in '{}'", input)),
        Some((key, value)) => Ok((key.to_string(), value.to_string())),
        None => Err(format!("expected KEY=VALUE, got '{}'", input)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use intake_api::Definitions;

    fn args(method: &str, path: &str) -> BindArgs {
        BindArgs {
            definitions: PathBuf::from("unused.yaml"),
            method: method.to_string(),
            path: path.to_string(),
            query: Vec::new(),
            body: None,
            form: false,
        }
    }

    #[test]
    fn test_parse_key_value() {
        assert_eq!(parse_key_value("q=foo"), Ok(("q".to_string(), "foo".to_string())));
        assert_eq!(parse_key_value("q="), Ok(("q".to_string(), String::new())));
        assert_eq!(parse_key_value("a=b=c"), Ok(("a".to_string(), "b=c".to_string())));
        assert!(parse_key_value("=foo").is_err());
        assert!(parse_key_value("foo").is_err());
    }

    #[test]
    fn test_build_request_merges_query() {
        let mut a = args("get", "/items/?skip=2&q=one");
        a.query.push(("q".to_string(), "two".to_string()));
        let request = build_request(&a).unwrap();
        assert_eq!(request.method, HttpMethod::Get);
        assert_eq!(request.path, "/items/");
        assert_eq!(request.query.get_last("skip"), Some("2"));
        assert_eq!(request.query.get_all("q").collect::<Vec<_>>(), vec!["one", "two"]);
    }

    #[test]
    fn test_build_request_rejects_method() {
        assert!(build_request(&args("FETCH", "/")).is_err());
    }

    #[test]
    fn test_render_success_and_failure() {
        let registry = Definitions::from_yaml_str(
            r#"
endpoints:
  - method: GET
    path: /items/{item_id}
    params:
      - { name: item_id, type: int }
"#,
        )
        .unwrap()
        .build()
        .unwrap();

        let ok = build_request(&args("GET", "/items/7")).unwrap();
        let (output, code) = render(registry.dispatch(&ok));
        assert_eq!(code, 0);
        assert_eq!(output["endpoint"], "GET /items/{item_id}");
        assert_eq!(output["params"]["item_id"], 7);

        let bad = build_request(&args("GET", "/items/seven")).unwrap();
        let (output, code) = render(registry.dispatch(&bad));
        assert_eq!(code, 1);
        assert_eq!(output["status"], 422);
        assert_eq!(output["detail"][0]["loc"], serde_json::json!(["path", "item_id"]));

        let missing = build_request(&args("GET", "/nothing")).unwrap();
        let (output, _) = render(registry.dispatch(&missing));
        assert_eq!(output["status"], 404);
    }
}
