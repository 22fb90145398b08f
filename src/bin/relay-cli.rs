use clap::{Parser, Subcommand};
use serde_json::{json, Map, Value};

#[derive(Parser)]
#[command(name = "relay-cli")]
#[command(about = "Send requests through a running api-relay", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8080")]
    relay: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check relay status
    Status,
    /// Forward one request through the relay
    Send {
        #[arg(short = 'X', long, default_value = "GET")]
        method: String,
        #[arg(short, long)]
        url: String,
        /// Request header as `Name: value`, repeatable
        #[arg(short = 'H', long = "header")]
        headers: Vec<String>,
        /// Body: JSON objects and arrays are sent as JSON, anything else as text
        #[arg(short, long)]
        data: Option<String>,
        /// Query parameter as `key=value`, repeatable
        #[arg(short, long = "param")]
        params: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    match cli.command {
        Commands::Status => {
            let res = client.get(format!("{}/api/status", cli.relay)).send().await?;
            print_response(res, false).await?;
        }
        Commands::Send {
            method,
            url,
            headers,
            data,
            params,
        } => {
            let descriptor = build_descriptor(&method, &url, &headers, data.as_deref(), &params)?;
            let res = client
                .post(format!("{}/api/proxy", cli.relay))
                .json(&json!({ "request": descriptor }))
                .send()
                .await?;
            print_response(res, true).await?;
        }
    }

    Ok(())
}

fn build_descriptor(
    method: &str,
    url: &str,
    headers: &[String],
    data: Option<&str>,
    params: &[String],
) -> Result<Value, String> {
    let mut header_map = Map::new();
    for raw in headers {
        let (name, value) = raw
            .split_once(':')
            .ok_or_else(|| format!("header '{raw}' is not 'Name: value'"))?;
        header_map.insert(name.trim().to_string(), Value::String(value.trim().to_string()));
    }

    let mut param_map = Map::new();
    for raw in params {
        let (key, value) = raw
            .split_once('=')
            .ok_or_else(|| format!("param '{raw}' is not 'key=value'"))?;
        param_map.insert(key.to_string(), Value::String(value.to_string()));
    }

    let body = data.map(|d| match serde_json::from_str::<Value>(d) {
        Ok(v @ (Value::Object(_) | Value::Array(_))) => v,
        _ => Value::String(d.to_string()),
    });

    let mut descriptor = json!({ "method": method, "url": url, "headers": header_map });
    if let Some(body) = body {
        descriptor["body"] = body;
    }
    if !param_map.is_empty() {
        descriptor["params"] = Value::Object(param_map);
    }
    Ok(descriptor)
}

/// Body bytes of an envelope as text, when they are valid UTF-8.
fn decode_body(envelope: &Value) -> Option<String> {
    let bytes: Vec<u8> = envelope["response"]["body"]["content"]
        .as_array()?
        .iter()
        .map(|b| b.as_u64().and_then(|b| u8::try_from(b).ok()))
        .collect::<Option<_>>()?;
    String::from_utf8(bytes).ok()
}

async fn print_response(res: reqwest::Response, envelope: bool) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    let body: Value = res.json().await?;

    if !status.is_success() {
        eprintln!("Error: relay returned status {}", status);
        eprintln!("{}", serde_json::to_string_pretty(&body)?);
        return Ok(());
    }

    if envelope {
        let mut summary = body.clone();
        let text = decode_body(&body);
        if text.is_some() {
            summary["response"]["body"]["content"] = Value::String("<decoded below>".into());
        }
        println!("{}", serde_json::to_string_pretty(&summary)?);
        if let Some(text) = text {
            println!("\n{text}");
        }
    } else {
        println!("{}", serde_json::to_string_pretty(&body)?);
    }
    Ok(())
}
