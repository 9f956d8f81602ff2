//! The fetch, load, advance loop.
use std::num::NonZeroU64;
use std::time::Duration;

use async_trait::async_trait;
use log::{info, warn};
use sqlx::PgPool;

use crate::comment::Comment;
use crate::config::Config;
use crate::db::init_pool;
use crate::error::Result;
use crate::fetch::Fetcher;
use crate::load::Loader;

/// Where pages of comments come from.
#[async_trait]
pub trait PageSource {
    /// Fetch and decode the page starting at `offset`.
    async fn fetch(&mut self, offset: u64, limit: u64) -> Result<Vec<Comment>>;
}

/// Where batches of comments end up. A batch is all or nothing.
#[async_trait]
pub trait BatchSink {
    /// Persist one batch, returning the number of rows written. An empty
    /// batch writes nothing and returns 0.
    async fn load(&mut self, offset: u64, batch: &[Comment]) -> Result<u64>;
}

const DEFAULT_PAGE_SIZE: NonZeroU64 = match NonZeroU64::new(50) {
    Some(size) => size,
    None => unreachable!(),
};

/// How the cursor moves and when the run stops.
///
/// The two policies are not interchangeable: `OpenEnded` stops on the first
/// empty page and waits between pages, `FixedCount` does neither.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Policy {
    /// Keep going until a page comes back empty.
    OpenEnded {
        page_size: NonZeroU64,
        pause: Duration,
    },
    /// Always run `pages` fetch/load cycles, whatever they return.
    FixedCount { pages: u64, page_size: NonZeroU64 },
}

impl Policy {
    /// `None` for a zero page size.
    pub fn open_ended(page_size: u64, pause: Duration) -> Option<Self> {
        NonZeroU64::new(page_size).map(|page_size| Policy::OpenEnded { page_size, pause })
    }

    /// `None` for a zero page size.
    pub fn fixed_count(pages: u64, page_size: u64) -> Option<Self> {
        NonZeroU64::new(page_size).map(|page_size| Policy::FixedCount { pages, page_size })
    }
}

impl Default for Policy {
    fn default() -> Self {
        Policy::OpenEnded {
            page_size: DEFAULT_PAGE_SIZE,
            pause: Duration::from_secs(1),
        }
    }
}

/// What a completed run did. `batches` only counts committed transactions.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Summary {
    pub pages: u64,
    pub batches: u64,
    pub records: u64,
}

/// Connect, copy every page from the upstream api, and close the pool again.
pub async fn sync_comments(config: &Config, policy: Policy) -> Result<Summary> {
    let pool = init_pool(config).await?;
    run_with_pool(&pool, &mut Fetcher::default(), policy).await
}

/// Run against `pool`, which is closed before returning on every path.
pub async fn run_with_pool<S>(pool: &PgPool, source: &mut S, policy: Policy) -> Result<Summary>
where
    S: PageSource + Send,
{
    let mut loader = Loader::new(pool.clone());
    let outcome = run(source, &mut loader, policy).await;
    pool.close().await;
    outcome
}

/// Run the sync until the policy says stop. The first error ends the run;
/// batches committed before it stay committed.
pub async fn run<S, K>(source: &mut S, sink: &mut K, policy: Policy) -> Result<Summary>
where
    S: PageSource + Send,
    K: BatchSink + Send,
{
    let mut summary = Summary::default();

    match policy {
        Policy::OpenEnded { page_size, pause } => {
            let page_size = page_size.get();
            let mut offset = 0;
            loop {
                let page = source.fetch(offset, page_size).await?;
                summary.pages += 1;

                if page.is_empty() {
                    info!("No more comments to process at offset {}, stopping", offset);
                    break;
                }

                load(sink, offset, &page, &mut summary).await?;

                offset += page_size;
                if !pause.is_zero() {
                    tokio::time::sleep(pause).await;
                }
            }
        }
        Policy::FixedCount { pages, page_size } => {
            let page_size = page_size.get();
            for i in 0..pages {
                let offset = i * page_size;
                let page = source.fetch(offset, page_size).await?;
                summary.pages += 1;
                load(sink, offset, &page, &mut summary).await?;
            }
        }
    }

    Ok(summary)
}

async fn load<K>(sink: &mut K, offset: u64, page: &[Comment], summary: &mut Summary) -> Result<()>
where
    K: BatchSink + Send,
{
    let rows = sink.load(offset, page).await?;
    if page.is_empty() {
        warn!("page at offset {} is empty, nothing inserted", offset);
        return Ok(());
    }

    summary.batches += 1;
    summary.records += page.len() as u64;
    info!(
        "Successfully inserted batch starting at {} with {} comments ({} rows)",
        offset,
        page.len(),
        rows
    );
    Ok(())
}
