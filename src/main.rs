//! AI Teacher - multi-agent tutoring backend
//!
//! A swarm of agents turns a web page into a chapter-by-chapter course:
//! scrape, clean, outline, explain and quiz, with control handed between
//! agents and the learner through an explicit state machine.

mod api;
mod db;
mod llm;
mod runtime;
mod scraper;
mod session;
mod state_machine;
mod swarm;
mod title_generator;

use api::{create_router, AppState};
use axum::http::HeaderValue;
use db::Database;
use llm::{LlmConfig, ModelRegistry};
use runtime::{DatabaseStore, LlmTurnExecutor, RegistryLlmClient, SessionManager};
use scraper::{BrowserContentSource, ScraperConfig};
use state_machine::{
    SwarmContext, TerminationCondition, DEFAULT_MAX_AUTO_TURNS, DEFAULT_TERMINATION_MARKER,
};
use std::net::SocketAddr;
use std::sync::Arc;
use title_generator::TitleGenerator;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ai_teacher=info,tower_http=debug".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(true)
                .with_span_list(false),
        )
        .init();

    // Configuration
    let db_path = std::env::var("TUTOR_DB_PATH").unwrap_or_else(|_| {
        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
        format!("{home}/.ai-teacher/sessions.db")
    });

    let port: u16 = std::env::var("TUTOR_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8000);

    let cors_origin = std::env::var("TUTOR_CORS_ORIGIN")
        .unwrap_or_else(|_| "http://localhost:5173".to_string());

    let max_auto_turns: u32 = std::env::var("TUTOR_MAX_AUTO_TURNS")
        .ok()
        .and_then(|n| n.parse().ok())
        .unwrap_or(DEFAULT_MAX_AUTO_TURNS);

    let marker = std::env::var("TUTOR_TERMINATION_MARKER")
        .ok()
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_TERMINATION_MARKER.to_string());

    // Initialize database
    tracing::info!(path = %db_path, "Opening database");
    let db = Database::open(&db_path)?;

    // Initialize LLM registry
    let llm_registry = Arc::new(ModelRegistry::new(&LlmConfig::from_env()));

    // Assemble the swarm
    let registry = Arc::new(swarm::teaching_swarm()?);
    tracing::info!(
        entry = %registry.entry(),
        agents = registry.agents().count(),
        max_auto_turns,
        %marker,
        "Agent registry built"
    );
    let context = SwarmContext::new(Arc::clone(&registry))
        .with_termination(TerminationCondition::new(marker))
        .with_max_auto_turns(max_auto_turns);

    let executor = LlmTurnExecutor::new(
        RegistryLlmClient::new(Arc::clone(&llm_registry)),
        BrowserContentSource::new(ScraperConfig::from_env()),
    )
    .with_descriptions_from(&registry);
    let sessions = SessionManager::new(
        Arc::new(DatabaseStore::new(db)),
        context,
        Arc::new(executor),
        TitleGenerator::new(llm_registry.default()),
    );

    // Create application state
    let state = AppState::new(Arc::new(sessions));

    let cors = CorsLayer::new()
        .allow_origin(cors_origin.parse::<HeaderValue>()?)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = create_router(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("AI Teacher server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
