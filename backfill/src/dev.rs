use std::{net::SocketAddr, sync::Arc, time::Duration};

use axum::Router;
use backfill_control_plane::{
    event_store::InMemoryEventStore,
    gate::ConcurrencyGate,
    import_metadata::InMemoryImportMetadata,
    quota::{QuotaCache, QuotaCacheOptions, WindowQuotaOptions, WindowQuotaTrackerFactory},
    sites::{InMemorySiteDirectory, SiteDirectory},
};
use backfill_ingestor_core::{
    AllowAllAuthorizer, ImportOptions, ImportService, Sweeper, SweeperOptions,
    run_background_sweeper,
};
use backfill_ingestor_http::{CALLER_HEADER, HttpIngestor};
use backfill_resources::{OrganizationName, SiteName};
use clap::Args;
use snafu::{ResultExt, ensure};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::error::{
    InvalidArgumentSnafu, InvalidServerUrlSnafu, IoSnafu, Result, SeedSiteDirectorySnafu,
};

#[derive(Debug, Args)]
pub struct DevArgs {
    /// The address of the HTTP ingestor server.
    #[arg(long, default_value = "127.0.0.1:7780")]
    http_address: String,
    /// Maximum number of imports an organization may run at once.
    #[arg(long, default_value_t = 1)]
    max_concurrent_imports: usize,
    /// Seconds after which an unfinished import gives up its slot.
    #[arg(long, default_value_t = 7200)]
    import_timeout_secs: u64,
    /// Disable the per-organization concurrency limit.
    #[arg(long, default_value_t = false)]
    no_concurrency_limit: bool,
    /// Maximum number of events in one batch.
    #[arg(long, default_value_t = 10_000)]
    max_batch_size: usize,
    /// Maximum request body size in bytes. Defaults to 4 KiB per event of the
    /// largest batch.
    #[arg(long)]
    max_body_bytes: Option<usize>,
    /// Seconds a cached quota tracker stays valid.
    #[arg(long, default_value_t = 1800)]
    quota_ttl_secs: u64,
    /// Calendar months, including the current one, imported events may fall in.
    #[arg(long, default_value_t = 12)]
    max_history_months: u32,
    /// Seconds between sweeps of abandoned imports.
    #[arg(long, default_value_t = 900)]
    sweep_interval_secs: u64,
}

impl DevArgs {
    pub async fn run(self, ct: CancellationToken) -> Result<()> {
        ensure!(
            self.max_concurrent_imports > 0,
            InvalidArgumentSnafu {
                name: "max-concurrent-imports",
                message: "must be at least 1",
            }
        );
        ensure!(
            self.max_body_bytes != Some(0),
            InvalidArgumentSnafu {
                name: "max-body-bytes",
                message: "must be at least 1",
            }
        );
        ensure!(
            self.sweep_interval_secs > 0,
            InvalidArgumentSnafu {
                name: "sweep-interval-secs",
                message: "must be at least 1",
            }
        );
        ensure!(
            self.max_history_months > 0,
            InvalidArgumentSnafu {
                name: "max-history-months",
                message: "must be at least 1",
            }
        );

        let http_address = self
            .http_address
            .parse::<SocketAddr>()
            .context(InvalidServerUrlSnafu {})?;

        let (sites, default_site) = new_dev_site_directory().await?;

        let options = ImportOptions::default()
            .with_max_concurrent_imports(self.max_concurrent_imports)
            .with_import_timeout(Duration::from_secs(self.import_timeout_secs))
            .with_limit_concurrency(!self.no_concurrency_limit)
            .with_max_batch_size(self.max_batch_size);

        let quota_factory = WindowQuotaTrackerFactory::new(WindowQuotaOptions {
            max_history_months: self.max_history_months,
        });
        let quota_cache = QuotaCache::with_options(
            Arc::new(quota_factory),
            QuotaCacheOptions::new().with_time_to_live(Duration::from_secs(self.quota_ttl_secs)),
        );
        let gate = ConcurrencyGate::new(options.gate_options());

        let service = ImportService::new(
            sites,
            Arc::new(InMemoryImportMetadata::new()),
            Arc::new(InMemoryEventStore::new()),
            Arc::new(AllowAllAuthorizer),
            quota_cache.clone(),
            gate.clone(),
        )
        .with_max_batch_size(options.max_batch_size);

        let sweeper = Sweeper::new(
            gate,
            quota_cache,
            SweeperOptions::new().with_interval(Duration::from_secs(self.sweep_interval_secs)),
        );

        println!("Starting Backfill in development mode");
        println!("Default site: {}", default_site);
        println!("HTTP ingestor listening on {}", http_address);
        println!("Identify callers with the {} header", CALLER_HEADER);

        info!(
            max_concurrent_imports = options.max_concurrent_imports,
            limit_concurrency = options.limit_concurrency,
            import_timeout_secs = self.import_timeout_secs,
            max_batch_size = options.max_batch_size,
            "Import admission configured"
        );

        let _ct_guard = ct.child_token().drop_guard();

        let mut ingestor = HttpIngestor::new(service);
        if let Some(max_body_bytes) = self.max_body_bytes {
            ingestor = ingestor.with_max_body_size(max_body_bytes);
        }
        info!(max_body_bytes = ingestor.max_body_size(), "HTTP body limit configured");

        let http_ingestor_fut = run_http_server(ingestor, http_address, ct.clone());
        let sweeper_fut = run_background_sweeper(sweeper, ct);

        tokio::select! {
            res = http_ingestor_fut => {
                println!("HTTP ingestor server exited with {:?}", res);
            },
            _ = sweeper_fut => {
                println!("Background sweeper exited");
            },
        }

        Ok(())
    }
}

async fn new_dev_site_directory() -> Result<(Arc<InMemorySiteDirectory>, SiteName)> {
    let sites = Arc::new(InMemorySiteDirectory::new());

    let default_organization = OrganizationName::new_unchecked("default");
    sites
        .create_organization(default_organization.clone())
        .await
        .context(SeedSiteDirectorySnafu {
            resource: "organization",
        })?;

    let default_site = SiteName::new_unchecked("default");
    sites
        .create_site(default_site.clone(), default_organization)
        .await
        .context(SeedSiteDirectorySnafu { resource: "site" })?;

    Ok((sites, default_site))
}

async fn run_http_server(
    ingestor: HttpIngestor,
    address: SocketAddr,
    ct: CancellationToken,
) -> Result<()> {
    let app = Router::new().merge(ingestor.into_router());

    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .context(IoSnafu {})?;

    let server = axum::serve(listener, app).with_graceful_shutdown(async move {
        ct.cancelled().await;
    });

    server.await.context(IoSnafu {})
}
