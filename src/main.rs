//! Main application entry point (CLI binary).
//!
//! This is a thin wrapper around the `request_service` library that handles:
//! - Command-line argument parsing
//! - Logger initialization
//! - Ctrl-C cancellation
//! - User-facing output formatting
//!
//! All core functionality is implemented in the library crate.

use std::process;

use anyhow::{Context, Result};
use clap::Parser;
use log::warn;
use tokio_util::sync::CancellationToken;

use request_service::config::Opt;
use request_service::initialization::init_logger_with;
use request_service::{RequestContext, RequestOptions, RequestService};

/// Exit status used when the request is interrupted (128 + SIGINT).
const EXIT_CANCELLED: i32 = 130;

#[tokio::main]
async fn main() -> Result<()> {
    let opt = Opt::parse();

    let log_level = opt.log_level.clone();
    let log_format = opt.log_format.clone();
    init_logger_with(log_level.into(), log_format).context("Failed to initialize logger")?;

    let service = RequestService::new(opt.configuration());
    let options = request_options(&opt);

    let cancel = CancellationToken::new();
    let cancel_on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling request");
            cancel_on_interrupt.cancel();
        }
    });

    match service.request(&options, &cancel).await {
        Ok(context) => print_response(&opt, &context),
        Err(e) if e.is_cancelled() => {
            eprintln!("request_service: request cancelled");
            process::exit(EXIT_CANCELLED);
        }
        Err(e) => {
            eprintln!(
                "request_service error: {:#}",
                anyhow::Error::from(e).context(format!("Request to {} failed", opt.url))
            );
            process::exit(1);
        }
    }
}

fn request_options(opt: &Opt) -> RequestOptions {
    let mut options = RequestOptions::new(opt.url.clone())
        .method(opt.method.clone())
        .follow_redirects(opt.follow_redirects);

    for (name, value) in &opt.headers {
        options = options.header(name.clone(), value.clone());
    }
    if let Some(data) = &opt.data {
        options = options.data(data.clone());
    }
    if let Some(timeout) = opt.timeout_ms {
        options = options.timeout(timeout);
    }
    options.user = opt.user.clone();
    options.password = opt.password.clone();
    options
}

fn print_response(opt: &Opt, context: &RequestContext) -> Result<()> {
    if opt.include {
        println!("HTTP {}", context.status());
        let mut headers: Vec<_> = context.headers().iter().collect();
        headers.sort();
        for (name, value) in headers {
            println!("{}: {}", name, value);
        }
        println!();
    }

    if opt.json {
        let value: serde_json::Value = context
            .as_json()
            .context("Response body is not valid JSON")?;
        println!(
            "{}",
            serde_json::to_string_pretty(&value).context("Failed to format JSON")?
        );
    } else {
        print!("{}", context.as_text());
    }
    Ok(())
}
