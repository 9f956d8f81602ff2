use std::process;

use env_logger::Env;
use log::{error, info};

use comment_sync::config::Config;
use comment_sync::sync::{sync_comments, Policy};

#[tokio::main(flavor = "current_thread")]
async fn main() {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let outcome = match Config::from_env() {
        Ok(config) => sync_comments(&config, Policy::default()).await,
        Err(e) => Err(e),
    };

    match outcome {
        Ok(summary) => info!(
            "Done: {} comments in {} batches over {} pages",
            summary.records, summary.batches, summary.pages
        ),
        Err(e) => {
            error!("{}", e.report());
            process::exit(1);
        }
    }
}
