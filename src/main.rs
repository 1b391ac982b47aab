use std::sync::Arc;

use tokio::io::AsyncBufReadExt;
use travel_assist::behavior::ActivityEvent;
use travel_assist::bus::EngineEvent;
use travel_assist::config::EngineConfig;
use travel_assist::engine::{AssistantEngine, spawn_tick_task};
use travel_assist::store::{DocumentStore, InMemoryStore, LibSqlStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let user_id =
        std::env::var("TRAVEL_ASSIST_USER").unwrap_or_else(|_| "local-user".to_string());

    let tick_secs: u64 = std::env::var("TRAVEL_ASSIST_TICK_SECS")
        .unwrap_or_else(|_| "300".to_string())
        .parse()
        .unwrap_or(300);

    let db_path = std::env::var("TRAVEL_ASSIST_DB_PATH")
        .unwrap_or_else(|_| "./data/travel-assist.db".to_string());

    eprintln!("🧳 Travel Assist v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   User: {}", user_id);
    eprintln!("   Tick: every {}s", tick_secs);

    let store: Arc<dyn DocumentStore> = if db_path == ":memory:" {
        eprintln!("   Database: in-memory (state lost on exit)");
        Arc::new(InMemoryStore::new())
    } else {
        let backend = LibSqlStore::new_local(std::path::Path::new(&db_path))
            .await
            .unwrap_or_else(|e| {
                eprintln!("Error: Failed to open database at {}: {}", db_path, e);
                std::process::exit(1);
            });
        eprintln!("   Database: {}", db_path);
        Arc::new(backend)
    };

    let config = EngineConfig {
        tick_interval: std::time::Duration::from_secs(tick_secs),
        ..EngineConfig::default()
    };
    let engine = AssistantEngine::new(config, store);

    // Print proactive events as they arrive
    let mut events = engine.bus().subscribe();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(EngineEvent::NewSuggestion { suggestion, .. }) => {
                    eprintln!("💡 [{:?}] {}", suggestion.priority, suggestion.message);
                }
                Ok(EngineEvent::NewInsight { insight }) => {
                    eprintln!("🔎 [{:?}] {}: {}", insight.severity, insight.title, insight.description);
                }
                Ok(EngineEvent::StatusChanged { status }) => {
                    eprintln!("⚙️  Engine status: {:?}", status);
                }
                Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => {}
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    let _tick_handle = spawn_tick_task(Arc::clone(&engine));

    eprintln!("   Contexts: dashboard, itinerary, budget, language, explore");
    eprintln!("   Commands: /context <tag>, /track <term>, /suggestions, /dismiss <id>, /quit");
    eprintln!("   Type a message and press Enter.\n");

    let mut context = "dashboard".to_string();
    let stdin = tokio::io::stdin();
    let mut lines = tokio::io::BufReader::new(stdin).lines();

    while let Some(line) = lines.next_line().await? {
        let line = line.trim().to_string();
        if line.is_empty() {
            continue;
        }

        if let Some(rest) = line.strip_prefix("/context ") {
            context = rest.trim().to_string();
            engine
                .track_activity(&user_id, &context, ActivityEvent::default())
                .await;
            eprintln!("(switched to {context})");
            continue;
        }
        if let Some(term) = line.strip_prefix("/track ") {
            engine
                .track_activity(
                    &user_id,
                    &context,
                    ActivityEvent::default().with_search_term(term.trim()),
                )
                .await;
            eprintln!("(tracked)");
            continue;
        }
        if line == "/suggestions" {
            let suggestions = engine.active_suggestions(&user_id).await;
            if suggestions.is_empty() {
                eprintln!("(no active suggestions)");
            }
            for s in suggestions {
                eprintln!("  {} [{:?}] {}", s.id, s.priority, s.message);
            }
            continue;
        }
        if let Some(id) = line.strip_prefix("/dismiss ") {
            match id.trim().parse() {
                Ok(id) => {
                    engine.dismiss_suggestion(&user_id, id).await;
                }
                Err(_) => eprintln!("(not a suggestion id)"),
            }
            continue;
        }
        if line == "/quit" || line == "/exit" {
            break;
        }

        let reply = engine.process_message(&user_id, &context, &line).await;
        println!("{}", reply.reply);
        if let Some(action) = reply.action {
            eprintln!("(action: {:?})", action);
        }
    }

    engine.stop().await;
    Ok(())
}
