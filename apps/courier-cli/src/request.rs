use crate::settings::Overrides;
use anyhow::{Context, Result, bail};
use clap::Args;
use courier_http::{ClientSettings, Data, Headers, HttpClient, HttpResponse, RequestConfig};
use http::Method;
use serde_json::{Map, Value};

#[derive(Args)]
pub struct RequestArgs {
    /// HTTP method, e.g. GET or POST
    method: String,

    /// Absolute URL, or a path relative to the configured base URL
    url: String,

    /// Request body; sent as JSON when it parses as JSON
    #[arg(short, long)]
    data: Option<String>,

    /// Extra header as `Name: value` (repeatable)
    #[arg(short = 'H', long = "header")]
    headers: Vec<String>,

    /// Query parameter as `key=value` (repeatable)
    #[arg(short = 'p', long = "param")]
    params: Vec<String>,

    /// Request timeout in milliseconds (0 for none)
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Allow plain `http://` URLs (debug builds or the `allow-insecure-http` feature)
    #[arg(long)]
    insecure: bool,
}

impl RequestArgs {
    pub fn overrides(&self) -> Overrides {
        Overrides {
            timeout_ms: self.timeout_ms,
            allow_insecure_http: self.insecure,
        }
    }

    pub async fn run(&self, settings: &ClientSettings) -> Result<()> {
        let client = HttpClient::builder()
            .with_settings(settings)
            .build()
            .context("failed to build HTTP client")?;

        let config = self.to_config()?;
        tracing::info!(uri = %client.get_uri(Some(&config)), "sending request");

        match client.request(config).await {
            Ok(resp) => {
                print_response(&resp)?;
                Ok(())
            }
            Err(err) => {
                if let Some(resp) = err.response() {
                    print_response(resp)?;
                }
                Err(err).context("request failed")
            }
        }
    }

    fn to_config(&self) -> Result<RequestConfig> {
        let method = Method::from_bytes(self.method.to_ascii_uppercase().as_bytes())
            .with_context(|| format!("invalid method '{}'", self.method))?;

        let mut config = RequestConfig::new()
            .with_url(self.url.clone())
            .with_method(method)
            .with_headers(parse_header_args(&self.headers)?);

        if !self.params.is_empty() {
            config = config.with_params(parse_param_args(&self.params)?);
        }
        if let Some(data) = &self.data {
            config = config.with_data(match serde_json::from_str::<Value>(data) {
                Ok(json) => Data::Json(json),
                Err(_) => Data::Text(data.clone()),
            });
        }
        Ok(config)
    }
}

fn parse_header_args(raw: &[String]) -> Result<Headers> {
    let mut headers = Headers::new();
    for header in raw {
        let Some((name, value)) = header.split_once(':') else {
            bail!("header '{header}' must look like 'Name: value'");
        };
        headers.insert(name.trim(), value.trim());
    }
    Ok(headers)
}

fn parse_param_args(raw: &[String]) -> Result<Value> {
    let mut params = Map::new();
    for param in raw {
        let Some((key, value)) = param.split_once('=') else {
            bail!("param '{param}' must look like 'key=value'");
        };
        params.insert(key.to_owned(), Value::String(value.to_owned()));
    }
    Ok(Value::Object(params))
}

fn print_response(resp: &HttpResponse) -> Result<()> {
    eprintln!("{} {}", resp.status().as_u16(), resp.status_text());
    for (name, value) in resp.headers().string_pairs() {
        eprintln!("{name}: {value}");
    }
    match resp.data() {
        Some(Data::Json(json)) => println!("{}", serde_json::to_string_pretty(json)?),
        Some(Data::Text(text)) => println!("{text}"),
        Some(Data::Bytes(bytes)) => println!("<{} bytes>", bytes.len()),
        _ => {}
    }
    Ok(())
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use clap::Parser;
    use serde_json::json;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        args: RequestArgs,
    }

    fn parse(argv: &[&str]) -> RequestArgs {
        TestCli::try_parse_from(std::iter::once("courier").chain(argv.iter().copied()))
            .unwrap()
            .args
    }

    #[test]
    fn test_to_config_collects_flags() {
        let args = parse(&[
            "post",
            "/items",
            "-d",
            r#"{"a":1}"#,
            "-H",
            "X-Trace: 7",
            "-p",
            "page=2",
        ]);

        let config = args.to_config().unwrap();

        assert_eq!(config.method, Some(Method::POST));
        assert_eq!(config.url.as_deref(), Some("/items"));
        assert_eq!(config.data, Some(Data::Json(json!({"a": 1}))));
        assert_eq!(config.params, Some(json!({"page": "2"})));
        assert_eq!(config.headers.unwrap().get("X-Trace"), Some("7"));
    }

    #[test]
    fn test_non_json_data_is_text() {
        let args = parse(&["put", "/notes", "--data", "plain words"]);
        assert_eq!(
            args.to_config().unwrap().data,
            Some(Data::Text("plain words".to_owned()))
        );
    }

    #[test]
    fn test_malformed_header_rejected() {
        let args = parse(&["get", "/x", "-H", "no-colon"]);
        assert!(args.to_config().is_err());
    }

    #[test]
    fn test_overrides_from_flags() {
        let args = parse(&["get", "/x", "--timeout-ms", "500", "--insecure"]);
        let overrides = args.overrides();
        assert_eq!(overrides.timeout_ms, Some(500));
        assert!(overrides.allow_insecure_http);
    }
}
