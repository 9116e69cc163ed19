//! # Request pipeline
//!
//! Serves one fake request through four stages:
//! - parse the request parameters
//! - query mysql and the search index in parallel
//! - compute a result from both lookups
//! - format the response body into the request context
//!
//! Run with: `cargo run --example request_pipeline --features logging`
//! (set `SEARCH_MS=2000` to see the search lookup aborted by the global timeout).

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;
use tracing_subscriber::EnvFilter;

use stagevisor::{
    AbortSignal, LogWriter, Runner, RunnerConfig, Subscribe, SyncTaskFn, TaskError, TaskFn,
    TaskRef, TaskSpec,
};

/// Per-request state shared by every task.
#[derive(Default)]
struct RequestCtx {
    url: String,
    params: Mutex<Vec<(String, String)>>,
    body: Mutex<Option<String>>,
    status: Mutex<u16>,
}

type Prev = Arc<[Option<String>]>;

fn parse_params() -> TaskRef<RequestCtx, String> {
    SyncTaskFn::arc(|ctx: Arc<RequestCtx>, _prev: Prev, _signal: AbortSignal| {
        let query = ctx
            .url
            .split_once('?')
            .map(|(_, q)| q)
            .ok_or_else(|| TaskError::fail(format!("no query string in {}", ctx.url)))?;

        let params: Vec<(String, String)> = query
            .split('&')
            .filter_map(|kv| kv.split_once('='))
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let user = params
            .iter()
            .find(|(k, _)| k == "user")
            .map(|(_, v)| v.clone())
            .unwrap_or_default();

        *ctx.params.lock() = params;
        Ok(user)
    })
}

fn query_mysql(work: Duration) -> TaskRef<RequestCtx, String> {
    TaskFn::arc(move |_ctx: Arc<RequestCtx>, prev: Prev, _signal: AbortSignal| async move {
        tokio::time::sleep(work).await;
        Ok(format!("mysql row for {}", prev[0].as_deref().unwrap_or("anonymous")))
    })
}

fn query_search(work: Duration) -> TaskRef<RequestCtx, String> {
    TaskFn::arc(move |_ctx: Arc<RequestCtx>, prev: Prev, signal: AbortSignal| async move {
        signal.on_abort(|| println!("search: request cancelled"));
        tokio::time::sleep(work).await;
        Ok(format!("search hits for {}", prev[0].as_deref().unwrap_or("anonymous")))
    })
}

fn compute() -> TaskRef<RequestCtx, String> {
    TaskFn::arc(|_ctx: Arc<RequestCtx>, prev: Prev, _signal: AbortSignal| async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        let parts: Vec<&str> = prev.iter().flatten().map(String::as_str).collect();
        Ok(parts.join(" + "))
    })
}

fn format_body() -> TaskRef<RequestCtx, String> {
    SyncTaskFn::arc(|ctx: Arc<RequestCtx>, prev: Prev, _signal: AbortSignal| {
        let body = format!("{{\"data\":\"{}\"}}", prev[0].as_deref().unwrap_or_default());
        *ctx.body.lock() = Some(body.clone());
        Ok(body)
    })
}

fn env_ms(name: &str, default: u64) -> Duration {
    let ms = std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default);
    Duration::from_millis(ms)
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "debug".into()))
        .init();

    let received_at = Instant::now();
    let ctx = Arc::new(RequestCtx {
        url: "/profile?user=alice&lang=en".to_string(),
        ..RequestCtx::default()
    });

    let cfg = RunnerConfig {
        global_timeout: Duration::from_millis(1000),
        task_timeout: Duration::from_millis(800),
        start_time: Some(received_at),
        ..RunnerConfig::default()
    };
    let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(LogWriter::new())];
    let mut runner: Runner<RequestCtx, String> =
        stagevisor::RunnerBuilder::from_shared(cfg, Arc::clone(&ctx))
            .with_subscribers(subs)
            .build();

    runner
        .add(parse_params())
        .add(vec![
            TaskSpec::new(query_mysql(env_ms("MYSQL_MS", 50))),
            TaskSpec::new(query_search(env_ms("SEARCH_MS", 80)))
                .with_timeout(Duration::from_millis(2500)),
        ])
        .add(compute())
        .add(format_body());

    match runner.run().await {
        Ok(()) => *ctx.status.lock() = 200,
        Err(err) => {
            *ctx.status.lock() = 504;
            println!("request failed: {err}");
        }
    }

    for (i, stage) in runner.stats().iter().enumerate() {
        for task in stage {
            println!(
                "stage {} task {}: {} cost={:?} err={}",
                i + 1,
                task.id,
                task.state,
                task.cost,
                task.error_message.as_deref().unwrap_or("-")
            );
        }
    }
    println!(
        "status={} body={} elapsed={:?}",
        ctx.status.lock(),
        ctx.body.lock().as_deref().unwrap_or("<none>"),
        runner.elapsed()
    );

    runner.close().await;
    Ok(())
}
