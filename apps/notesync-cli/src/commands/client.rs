use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Args;
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::StatusCode;
use serde_json::{json, Value as JsonValue};

#[derive(Args, Clone)]
pub struct PingArgs {
    /// Base URL of the service (e.g., http://127.0.0.1:8091)
    #[arg(long, default_value = "http://127.0.0.1:8091")]
    pub base: String,
    /// Timeout seconds
    #[arg(long, default_value_t = 5)]
    pub timeout: u64,
}

#[derive(Args, Clone)]
pub struct ClientArgs {
    /// Base URL of the service
    #[arg(long, default_value = "http://127.0.0.1:8091")]
    pub base: String,
    #[arg(long, env = "NOTESYNC_USERNAME")]
    pub username: String,
    #[arg(long, env = "NOTESYNC_PASSWORD", hide_env_values = true)]
    pub password: String,
    /// Timeout seconds
    #[arg(long, default_value_t = 30)]
    pub timeout: u64,
}

#[derive(Args, Clone)]
pub struct PushArgs {
    /// JSON batch: {"notes": [...], "note_contents": [...]}
    #[arg(long)]
    pub file: PathBuf,
}

#[derive(Args, Clone)]
pub struct PullArgs {
    /// Only rows newer than this epoch second
    #[arg(long)]
    pub after: Option<i64>,
    /// Pretty-print JSON
    #[arg(long)]
    pub pretty: bool,
}

fn client(timeout: u64) -> Result<Client> {
    Ok(Client::builder()
        .timeout(Duration::from_secs(timeout))
        .build()?)
}

impl ClientArgs {
    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base.trim_end_matches('/'), path)
    }

    fn authed(&self, req: RequestBuilder) -> RequestBuilder {
        req.basic_auth(&self.username, Some(&self.password))
    }
}

fn body_json(resp: Response) -> JsonValue {
    resp.json().unwrap_or_else(|_| json!({}))
}

pub fn run_ping(args: &PingArgs) -> Result<()> {
    let base = args.base.trim_end_matches('/');
    let resp = client(args.timeout)?
        .get(format!("{}/healthz", base))
        .send()
        .with_context(|| format!("connect to {base}"))?;
    let status = resp.status();
    let out = json!({
        "base": base,
        "healthz": {"status": status.as_u16()},
        "ok": status.is_success(),
    });
    println!("{}", serde_json::to_string_pretty(&out)?);
    if !status.is_success() {
        bail!("{base} is unhealthy ({status})");
    }
    Ok(())
}

pub fn run_push(c: &ClientArgs, args: &PushArgs) -> Result<()> {
    let text = std::fs::read_to_string(&args.file)
        .with_context(|| format!("read {}", args.file.display()))?;
    let batch: JsonValue = serde_json::from_str(&text)
        .with_context(|| format!("parse {}", args.file.display()))?;
    let resp = c
        .authed(client(c.timeout)?.post(c.url("/notes")))
        .json(&batch)
        .send()
        .context("send batch")?;
    let status = resp.status();
    let body = body_json(resp);
    match status {
        StatusCode::OK => {
            println!("Synced");
            Ok(())
        }
        StatusCode::ACCEPTED => {
            println!("{}", serde_json::to_string_pretty(&body)?);
            let rejected = ["notes", "note_contents"]
                .iter()
                .filter_map(|k| body.get(*k).and_then(JsonValue::as_array))
                .map(Vec::len)
                .sum::<usize>();
            bail!("{rejected} record(s) rejected");
        }
        _ => bail!("push failed ({status}): {body}"),
    }
}

pub fn run_pull(c: &ClientArgs, args: &PullArgs) -> Result<()> {
    let mut req = c.authed(client(c.timeout)?.get(c.url("/notes")));
    if let Some(after) = args.after {
        req = req.query(&[("after", after)]);
    }
    let resp = req.send().context("fetch notes")?;
    let status = resp.status();
    let body = body_json(resp);
    if !status.is_success() {
        bail!("pull failed ({status}): {body}");
    }
    if args.pretty {
        println!("{}", serde_json::to_string_pretty(&body)?);
    } else {
        println!("{body}");
    }
    Ok(())
}
