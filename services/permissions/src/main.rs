// Permission check: evaluates one browse decision against the live service.
use anyhow::{Context, Result};
use clap::Parser;
use permissions::{
    AuthorizationDecisionEngine, BrowseRequest, HttpSnapshotFetcher, PermissionSnapshotCache,
    PermissionsConfig, observability,
};
use rendering_authz::{CollectionName, RenderingId, UserId};
use std::process::ExitCode;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "permissions-check")]
#[command(about = "Check whether a user may browse a collection within a rendering")]
struct Args {
    /// Rendering identifier
    #[arg(value_parser = RenderingId::parse)]
    rendering: RenderingId,

    /// User identifier
    user: String,

    /// Collection name
    collection: String,

    /// Optional segment query; combined segment queries are accepted
    segment_query: Option<String>,

    /// Print collected metrics to stderr before exiting
    #[arg(long)]
    metrics: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    match run(args).await {
        Ok(true) => {
            println!("allow");
            ExitCode::SUCCESS
        }
        Ok(false) => {
            println!("deny");
            ExitCode::from(1)
        }
        Err(err) => {
            eprintln!("permissions-check: {err:#}");
            ExitCode::from(2)
        }
    }
}

async fn run(args: Args) -> Result<bool> {
    let metrics_handle = observability::init_observability("permissions-check")?;
    let config = PermissionsConfig::from_env_or_yaml().context("load permissions config")?;
    tracing::debug!(?config, "permissions config loaded");

    let fetcher = HttpSnapshotFetcher::new(&config)?;
    let cache = PermissionSnapshotCache::new(Arc::new(fetcher), &config);
    let engine = AuthorizationDecisionEngine::from_cache(cache);

    let request = BrowseRequest {
        user: UserId::new(args.user),
        collection: CollectionName::new(args.collection),
        rendering: args.rendering,
        segment_query: args.segment_query,
    };
    let allowed = engine.can_browse(&request).await;
    tracing::info!(
        rendering = %request.rendering,
        user = %request.user,
        collection = %request.collection,
        allowed,
        "browse decision"
    );

    if args.metrics {
        eprintln!("{}", metrics_handle.render());
    }
    Ok(allowed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_positional_arguments() {
        let args = Args::try_parse_from([
            "permissions-check",
            " 42 ",
            "7",
            "books",
            "SELECT * FROM books",
            "--metrics",
        ])
        .expect("args");
        assert_eq!(args.rendering, RenderingId::new(42));
        assert_eq!(args.collection, "books");
        assert_eq!(args.segment_query.as_deref(), Some("SELECT * FROM books"));
        assert!(args.metrics);
    }

    #[test]
    fn rejects_non_numeric_rendering() {
        let err = Args::try_parse_from(["permissions-check", "abc", "7", "books"])
            .expect_err("invalid rendering");
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn segment_query_is_optional() {
        let args = Args::try_parse_from(["permissions-check", "1", "7", "books"]).expect("args");
        assert!(args.segment_query.is_none());
        assert!(!args.metrics);
    }
}
