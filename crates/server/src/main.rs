//! Poly-Spec - compile discovered strategies into bot specifications
//!
//! Usage:
//!   poly-spec render --input record.json --mode document
//!   poly-spec render --id 42                - Render a knowledge base row
//!   poly-spec top --limit 10                - List best strategies and their ids
//!   poly-spec variants                      - List known strategy types
//!   poly-spec serve --port 3002             - Launch the HTTP API

use std::io::Read;
use std::sync::Arc;

use anyhow::Context;
use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use clap::{Parser, Subcommand};
use compiler::{
    all_variants, format_table, RenderConfig, RenderMode, Rendered, SpecRenderer, StrategyRecord,
};
use persistence::repository::DiscoveryRepository;
use persistence::Database;
use serde::Deserialize;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info, warn};

const APP_VERSION: &str = env!("CARGO_PKG_VERSION");
const DEFAULT_DB_PATH: &str = "data/discovery.db";

#[derive(Parser)]
#[command(name = "poly-spec")]
#[command(about = "Compile discovered strategies into bot implementation specs", long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render the bot specification of one strategy record
    Render {
        /// JSON record file, or `-` for stdin
        #[arg(long, conflicts_with = "id", required_unless_present = "id")]
        input: Option<String>,
        /// Knowledge base row id
        #[arg(long)]
        id: Option<i64>,
        /// Output mode: table or document
        #[arg(long, default_value = "table")]
        mode: RenderMode,
        /// Candle interval the strategy trades on
        #[arg(long, default_value = "15m")]
        interval: String,
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// List the best strategy per name from the knowledge base
    Top {
        /// Number of strategies to list
        #[arg(long, default_value_t = 10)]
        limit: i64,
        /// Sort column: composite_score, net_pnl, win_rate
        #[arg(long)]
        sort_by: Option<String>,
    },
    /// List every known strategy type with its canonical parameters
    Variants,
    /// Launch the HTTP API
    Serve {
        /// Host to bind to
        #[arg(long, default_value = "0.0.0.0")]
        host: String,
        /// Port to listen on
        #[arg(short, long, default_value_t = 3002)]
        port: u16,
    },
}

#[derive(Clone)]
struct AppState {
    db: Option<Arc<Database>>,
    renderer: Arc<SpecRenderer>,
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = if verbose {
        EnvFilter::new("debug,compiler=debug,persistence=debug,poly_spec=debug")
    } else {
        EnvFilter::new("info,compiler=info,persistence=info,poly_spec=info")
    };

    // stderr keeps rendered output on stdout pipeable
    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr)
                .compact(),
        )
        .with(filter)
        .init();
}

fn db_path() -> String {
    std::env::var("POLY_SPEC_DB_PATH").unwrap_or_else(|_| DEFAULT_DB_PATH.to_string())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    dotenvy::dotenv().ok();

    match cli.command {
        Commands::Render {
            input,
            id,
            mode,
            interval,
            json,
        } => {
            cmd_render(input, id, mode, interval, json).await?;
        }
        Commands::Top { limit, sort_by } => {
            cmd_top(limit, sort_by).await?;
        }
        Commands::Variants => cmd_variants(),
        Commands::Serve { host, port } => {
            cmd_serve(&host, port).await?;
        }
    }

    Ok(())
}

// ============================================================================
// CLI commands
// ============================================================================

async fn cmd_render(
    input: Option<String>,
    id: Option<i64>,
    mode: RenderMode,
    interval: String,
    json: bool,
) -> anyhow::Result<()> {
    let record = match (input, id) {
        (Some(path), _) => {
            let text = read_input(&path)?;
            StrategyRecord::from_json(&text).with_context(|| format!("parsing {path}"))?
        }
        (None, Some(id)) => load_record(id).await?,
        (None, None) => anyhow::bail!("either --input or --id is required"),
    };

    let renderer = SpecRenderer::new(RenderConfig {
        interval,
        ..Default::default()
    });
    let rendered = renderer.render(&record, mode);

    if json {
        println!("{}", serde_json::to_string_pretty(&rendered)?);
        return Ok(());
    }
    match rendered {
        Rendered::Table(table) => print!("{}", format_table(&table)),
        Rendered::Document { text } => print!("{text}"),
    }
    Ok(())
}

fn read_input(path: &str) -> anyhow::Result<String> {
    if path == "-" {
        let mut text = String::new();
        std::io::stdin()
            .read_to_string(&mut text)
            .context("reading stdin")?;
        Ok(text)
    } else {
        std::fs::read_to_string(path).with_context(|| format!("reading {path}"))
    }
}

async fn load_record(id: i64) -> anyhow::Result<StrategyRecord> {
    let path = db_path();
    let db = Database::open_read_only(&path).await?;
    let row = DiscoveryRepository::new(db.pool())
        .get_by_id(id)
        .await?
        .with_context(|| format!("no strategy with id {id} in {path}"))?;
    Ok(StrategyRecord::from(row))
}

async fn cmd_top(limit: i64, sort_by: Option<String>) -> anyhow::Result<()> {
    let db = Database::open_read_only(db_path()).await?;
    let rows = DiscoveryRepository::new(db.pool())
        .get_top_unique_strategies(limit, sort_by.as_deref())
        .await?;

    println!(
        "{:>6}  {:<28} {:<22} {:<10} {:>8} {:>10}",
        "Id", "Strategy", "Type", "Symbol", "Score", "Net PnL"
    );
    println!("{}", "-".repeat(90));
    for row in &rows {
        println!(
            "{:>6}  {:<28} {:<22} {:<10} {:>8} {:>10}",
            row.id.map(|id| id.to_string()).unwrap_or_default(),
            row.strategy_name,
            row.strategy_type,
            row.symbol,
            row.composite_score,
            row.net_pnl,
        );
    }
    Ok(())
}

fn cmd_variants() {
    for variant in all_variants() {
        let kind = variant.mode().map_or("atomic", |m| m.display_name());
        let params: Vec<&str> = variant.schema().map(|spec| spec.name).collect();
        println!(
            "{:<24} {:<36} {:<18} {}",
            variant.tag.as_str(),
            variant.name,
            kind,
            params.join(", ")
        );
    }
}

// ============================================================================
// Serve command - Axum web server
// ============================================================================

async fn cmd_serve(host: &str, port: u16) -> anyhow::Result<()> {
    info!("Poly-Spec v{} starting...", APP_VERSION);

    let db_path = db_path();
    let db = match Database::open_read_only(&db_path).await {
        Ok(db) => {
            info!("Knowledge base opened read-only: {}", db_path);
            Some(Arc::new(db))
        }
        Err(e) => {
            warn!("Knowledge base unavailable, /api/spec/:id disabled: {}", e);
            None
        }
    };

    let state = AppState {
        db,
        renderer: Arc::new(SpecRenderer::default()),
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new()
        .route("/health", get(api_health))
        .route("/variants", get(api_variants))
        .route("/strategies/top", get(api_top_strategies))
        .route("/spec/render", post(api_render_spec))
        .route("/spec/:id", get(api_spec_by_id))
        .with_state(state);

    let app = Router::new().nest("/api", api_routes).layer(cors);

    let addr: std::net::SocketAddr = format!("{}:{}", host, port).parse()?;
    println!("\n=== Poly-Spec v{} ===", APP_VERSION);
    println!("Listening on http://{}", addr);
    println!("\nEndpoints:");
    println!("  GET  /api/health              - Health check");
    println!("  GET  /api/variants            - Known strategy types");
    println!("  GET  /api/strategies/top      - Best strategy per name");
    println!("  POST /api/spec/render         - Render a posted record (?mode=table|document)");
    println!("  GET  /api/spec/:id            - Render a knowledge base row");
    println!("\n  Database: {}", db_path);
    println!("\nPress Ctrl+C to stop\n");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ============================================================================
// API Handlers
// ============================================================================

#[derive(Debug, Deserialize)]
struct SpecQuery {
    mode: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TopQuery {
    limit: Option<i64>,
    sort_by: Option<String>,
}

fn failure(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(serde_json::json!({
            "success": false,
            "error": message.into(),
        })),
    )
        .into_response()
}

fn parse_mode(query: &SpecQuery) -> Result<RenderMode, Response> {
    query
        .mode
        .as_deref()
        .map_or(Ok(RenderMode::default()), str::parse)
        .map_err(|e| failure(StatusCode::BAD_REQUEST, e))
}

/// Quoted SHA-256 of the rendered document
fn etag_for(text: &str) -> String {
    format!("\"{}\"", SpecRenderer::fingerprint(text))
}

fn etag_matches(headers: &HeaderMap, etag: &str) -> bool {
    headers
        .get(header::IF_NONE_MATCH)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.split(',').any(|tag| tag.trim() == etag || tag.trim() == "*"))
}

fn spec_response(
    renderer: &SpecRenderer,
    record: &StrategyRecord,
    mode: RenderMode,
    headers: &HeaderMap,
) -> Response {
    let diagnostics = renderer.diagnostics(record);
    let rendered = renderer.render(record, mode);

    let etag = match &rendered {
        Rendered::Document { text } => Some(etag_for(text)),
        Rendered::Table(_) => None,
    };
    if let Some(tag) = &etag {
        if etag_matches(headers, tag) {
            return StatusCode::NOT_MODIFIED.into_response();
        }
    }

    let mut response = Json(serde_json::json!({
        "success": true,
        "strategy_name": record.strategy_name,
        "data": rendered,
        "diagnostics": diagnostics,
    }))
    .into_response();

    if let Some(value) = etag.and_then(|tag| HeaderValue::from_str(&tag).ok()) {
        response.headers_mut().insert(header::ETAG, value);
    }
    response
}

/// GET /api/health
async fn api_health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "service": "poly-spec",
        "version": APP_VERSION,
        "knowledge_base": state.db.is_some(),
    }))
}

/// GET /api/variants - registry listing
async fn api_variants() -> Json<serde_json::Value> {
    let variants = all_variants();
    Json(serde_json::json!({
        "success": true,
        "total": variants.len(),
        "data": variants,
    }))
}

/// GET /api/strategies/top - best row per strategy name, with ids to render
async fn api_top_strategies(
    State(state): State<AppState>,
    Query(query): Query<TopQuery>,
) -> Response {
    let Some(db) = state.db else {
        return failure(StatusCode::SERVICE_UNAVAILABLE, "knowledge base unavailable");
    };

    let limit = query.limit.unwrap_or(20).clamp(1, 500);
    let repo = DiscoveryRepository::new(db.pool());
    match repo
        .get_top_unique_strategies(limit, query.sort_by.as_deref())
        .await
    {
        Ok(records) => Json(serde_json::json!({
            "success": true,
            "total": records.len(),
            "data": records,
        }))
        .into_response(),
        Err(e) => {
            error!("Failed to query top strategies: {}", e);
            failure(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to query top strategies: {e}"),
            )
        }
    }
}

/// POST /api/spec/render - body is a strategy record
async fn api_render_spec(
    State(state): State<AppState>,
    Query(query): Query<SpecQuery>,
    headers: HeaderMap,
    Json(body): Json<serde_json::Value>,
) -> Response {
    let mode = match parse_mode(&query) {
        Ok(mode) => mode,
        Err(response) => return response,
    };
    let record = match StrategyRecord::from_value(body) {
        Ok(record) => record,
        Err(e) => return failure(StatusCode::BAD_REQUEST, e.to_string()),
    };
    spec_response(&state.renderer, &record, mode, &headers)
}

/// GET /api/spec/:id - render a knowledge base row
async fn api_spec_by_id(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(query): Query<SpecQuery>,
    headers: HeaderMap,
) -> Response {
    let mode = match parse_mode(&query) {
        Ok(mode) => mode,
        Err(response) => return response,
    };
    let Some(db) = state.db else {
        return failure(StatusCode::SERVICE_UNAVAILABLE, "knowledge base unavailable");
    };

    match DiscoveryRepository::new(db.pool()).get_by_id(id).await {
        Ok(Some(row)) => {
            let record = StrategyRecord::from(row);
            spec_response(&state.renderer, &record, mode, &headers)
        }
        Ok(None) => failure(StatusCode::NOT_FOUND, format!("no strategy with id {id}")),
        Err(e) => {
            error!("Failed to load strategy {}: {}", id, e);
            failure(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to load strategy: {e}"),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_etag_matches_quoted_list() {
        let tag = etag_for("## 1. Strategy identity");
        assert!(tag.starts_with('"') && tag.ends_with('"'));
        assert_eq!(tag.len(), 66);

        let mut headers = HeaderMap::new();
        assert!(!etag_matches(&headers, &tag));
        let list = format!("\"other\", {tag}");
        headers.insert(header::IF_NONE_MATCH, HeaderValue::from_str(&list).unwrap());
        assert!(etag_matches(&headers, &tag));
    }

    #[test]
    fn test_parse_mode_defaults_to_table() {
        assert_eq!(parse_mode(&SpecQuery { mode: None }).ok(), Some(RenderMode::Table));
        let doc = SpecQuery {
            mode: Some("document".into()),
        };
        assert_eq!(parse_mode(&doc).ok(), Some(RenderMode::Document));
        assert!(parse_mode(&SpecQuery { mode: Some("pdf".into()) }).is_err());
    }

    #[test]
    fn test_cli_render_requires_source() {
        assert!(Cli::try_parse_from(["poly-spec", "render"]).is_err());
        assert!(Cli::try_parse_from(["poly-spec", "render", "--id", "3", "--mode", "document"]).is_ok());
        assert!(Cli::try_parse_from(["poly-spec", "render", "--input", "-", "--id", "3"]).is_err());
    }
}
