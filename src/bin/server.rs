use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::{get, post},
};
use pipe_optimizer::parse::parse_order;
use pipe_optimizer::pattern::Pattern;
use pipe_optimizer::render::render_solution;
use pipe_optimizer::solver::Solver;
use pipe_optimizer::types::{Catalog, Customer, Length, Order, Solution};
use serde::{Deserialize, Serialize};
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

#[derive(Deserialize, Serialize)]
struct OptimizeRequest {
    #[serde(default)]
    customer: Customer,
    items: Vec<ItemRequest>,
}

#[derive(Deserialize, Serialize)]
struct ItemRequest {
    length: Length,
    quantity: u32,
}

#[derive(Serialize)]
struct OptimizeResponse {
    customer: Customer,
    patterns: Vec<Pattern>,
    total_offcut: f64,
    total_pieces: usize,
}

type ApiError = (StatusCode, String);

fn unsatisfiable() -> ApiError {
    (
        StatusCode::UNPROCESSABLE_ENTITY,
        "order cannot be cut from the available stock lengths".to_string(),
    )
}

async fn solve_blocking(solver: Arc<Solver>, order: Order) -> Result<Solution, ApiError> {
    tokio::task::spawn_blocking(move || solver.solve(&order))
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?
        .ok_or_else(unsatisfiable)
}

async fn optimize(
    State(solver): State<Arc<Solver>>,
    Json(req): Json<OptimizeRequest>,
) -> Result<Json<OptimizeResponse>, ApiError> {
    tracing::info!(
        body = serde_json::to_string(&req).unwrap_or_default(),
        "POST /optimize"
    );

    if req.items.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "no order items given".to_string()));
    }
    let mut order = Order::new(req.customer);
    for item in req.items {
        order
            .try_add_item(item.length, item.quantity)
            .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;
    }

    let solution = solve_blocking(solver, order).await?;
    Ok(Json(OptimizeResponse {
        customer: solution.order().customer().clone(),
        patterns: solution.patterns().to_vec(),
        total_offcut: solution.total_offcut(),
        total_pieces: solution.total_pieces(),
    }))
}

async fn optimize_text(State(solver): State<Arc<Solver>>, body: String) -> Result<String, ApiError> {
    tracing::info!(bytes = body.len(), "POST /optimize/text");
    let order = parse_order(&body).map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;
    let solution = solve_blocking(solver, order).await?;
    Ok(render_solution(&solution))
}

fn catalog_from_env() -> Catalog {
    match std::env::var("STOCK_LENGTHS") {
        Ok(spec) => spec.parse().unwrap_or_else(|e| {
            eprintln!("Error: invalid STOCK_LENGTHS '{spec}': {e}");
            std::process::exit(1);
        }),
        Err(_) => Catalog::default(),
    }
}

fn main() {
    let _sentry = std::env::var("SENTRY_DSN").ok().map(|dsn| {
        sentry::init((
            dsn,
            sentry::ClientOptions {
                release: sentry::release_name!(),
                ..Default::default()
            },
        ))
    });

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("failed to build tokio runtime")
        .block_on(serve());
}

async fn serve() {
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open("development.log")
        .expect("failed to open development.log");

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_target(false)
        .with_ansi(false)
        .with_max_level(Level::INFO)
        .init();

    let solver = Arc::new(Solver::new(catalog_from_env()));
    let port = std::env::var("PORT").unwrap_or_else(|_| "3001".to_string());
    let addr = format!("0.0.0.0:{port}");

    let app = Router::new()
        .route("/up", get(|| async { "ok" }))
        .route("/optimize", post(optimize))
        .route("/optimize/text", post(optimize_text))
        .with_state(solver)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        );

    let listener = tokio::net::TcpListener::bind(&addr).await.unwrap();
    eprintln!("Listening on {addr}");
    axum::serve(listener, app).await.unwrap();
}
