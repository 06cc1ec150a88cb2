use std::collections::HashMap;
use std::env;

use serde_json::{json, Value};

use insights_core::config::Settings;
use insights_core::error::{Error, Result};
use insights_core::logging;
use insights_core::types::{Requester, SearchParams, SyncOption};
use insights_service::{read_records, AppContext};

const USAGE: &str = "Usage: insights-cli <command> [args...]

  search <index> <query> --user ID --name NAME [--page N] [--size N] [--sort MODE]
         [--region R]... [--category C]... [--author A]... [--cache-id KEY]
  react  <index> <key> <like|dislike|reload> --user ID --name NAME
  sync   <index> <records.jsonl> [--option insert|upsert|bulk_insert] [--key KEY]
  delete <index> [--key KEY]
  embed  <sentence> [--task TYPE]";

/// Positional arguments plus repeatable `--flag value` pairs.
struct Args {
    positional: Vec<String>,
    flags: HashMap<String, Vec<String>>,
}

impl Args {
    fn parse(raw: Vec<String>) -> Result<Self> {
        let mut positional = Vec::new();
        let mut flags: HashMap<String, Vec<String>> = HashMap::new();
        let mut it = raw.into_iter();
        while let Some(arg) = it.next() {
            match arg.strip_prefix("--") {
                Some(name) => {
                    let value = it.next().ok_or_else(|| Error::BadRequest(format!("--{name} requires a value")))?;
                    flags.entry(name.to_string()).or_default().push(value);
                }
                None => positional.push(arg),
            }
        }
        Ok(Self { positional, flags })
    }

    fn arg(&self, i: usize, name: &str) -> Result<&str> {
        self.positional
            .get(i)
            .map(String::as_str)
            .ok_or_else(|| Error::BadRequest(format!("missing <{name}>\n\n{USAGE}")))
    }

    fn flag(&self, name: &str) -> Option<&str> {
        self.flags.get(name).and_then(|v| v.last()).map(String::as_str)
    }

    fn all(&self, name: &str) -> Vec<String> {
        self.flags.get(name).cloned().unwrap_or_default()
    }

    fn number(&self, name: &str, default: usize) -> Result<usize> {
        self.flag(name).map_or(Ok(default), |v| {
            v.parse().map_err(|_| Error::BadRequest(format!("--{name} expects a number, got {v}")))
        })
    }

    fn requester(&self) -> Result<Requester> {
        let id = self.flag("user").ok_or_else(|| Error::BadRequest("--user is required".into()))?;
        let name = self.flag("name").ok_or_else(|| Error::BadRequest("--name is required".into()))?;
        Ok(Requester::new(id, name))
    }
}

async fn run(ctx: &AppContext, cmd: &str, args: &Args) -> Result<Value> {
    match cmd {
        "search" => {
            let params = SearchParams {
                query: args.arg(1, "query")?.to_string(),
                regions: args.all("region"),
                categories: args.all("category"),
                authors: args.all("author"),
                sorted_by: args.flag("sort").map_or(Ok(Default::default()), str::parse)?,
                page_no: args.number("page", 1)?,
                page_size: args.number("size", ctx.settings.search.min_page_size)?,
                ai_summary_cache_id: args.flag("cache-id").map(str::to_string),
            };
            let outcome = ctx.search(args.arg(0, "index")?, args.requester()?, params).await?;
            Ok(serde_json::to_value(outcome)?)
        }
        "react" => {
            let requester = args.requester()?;
            let outcome = ctx.react(args.arg(0, "index")?, args.arg(1, "key")?, args.arg(2, "reaction")?, &requester).await?;
            Ok(serde_json::to_value(outcome)?)
        }
        "sync" => {
            let index = args.arg(0, "index")?;
            let option: SyncOption = args.flag("option").map_or(Ok(SyncOption::BulkInsert), str::parse)?;
            let records = read_records(args.arg(1, "records.jsonl")?)?;
            let job_id = u64::try_from(chrono::Utc::now().timestamp_millis()).unwrap_or_default();
            let job = ctx.sync_records(job_id, args.flag("key"), index, records, option).await?;
            Ok(serde_json::to_value(job)?)
        }
        "delete" => {
            let index = args.arg(0, "index")?;
            let key = args.flag("key");
            ctx.delete(index, key).await?;
            Ok(json!({"deleted": index, "key": key}))
        }
        "embed" => {
            let vector = ctx.embed(args.arg(0, "sentence")?, args.flag("task").unwrap_or("RETRIEVAL_QUERY")).await?;
            Ok(json!({"model": ctx.embedder.embedder_id(), "embedding": vector}))
        }
        other => Err(Error::BadRequest(format!("Unknown command: {other}\n\n{USAGE}"))),
    }
}

fn main() -> anyhow::Result<()> {
    let mut raw: Vec<String> = env::args().skip(1).collect();
    if raw.is_empty() || raw[0] == "--help" {
        eprintln!("{USAGE}");
        std::process::exit(1);
    }
    let cmd = raw.remove(0);

    let settings = Settings::load().map_err(|e| {
        eprintln!("Error loading config: {e}");
        e
    })?;
    logging::init(&settings.log.level);

    let outcome = Args::parse(raw).and_then(|args| {
        let ctx = AppContext::from_settings(settings).inspect_err(|e| {
            tracing::error!(error = %e, status = e.status_code(), "failed to build services");
        })?;
        let rt = tokio::runtime::Runtime::new().map_err(|e| Error::Internal(format!("runtime: {e}")))?;
        rt.block_on(run(&ctx, &cmd, &args))
    });
    match outcome {
        Ok(value) => {
            println!("{}", serde_json::to_string_pretty(&value)?);
            Ok(())
        }
        Err(e) => {
            eprintln!("{}", e.public_message());
            std::process::exit(1);
        }
    }
}
