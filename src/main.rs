//! Demo binary for tokio-query-router
//!
//! Builds a router over two in-memory engines, routes a handful of cooking
//! questions, and prints the routing explanations and statistics.
//!
//! ## Usage
//!
//! ```text
//! query-router-demo [--config router.toml]
//! query-router-demo --print-schema
//! ```
//!
//! ## Environment Variables
//!
//! - `LOG_FORMAT=json` — structured JSON output (production)
//! - `RUST_LOG=info` — log level filter (default: info)
//! - `OPENAI_API_KEY` — classification service key; without it the demo
//!   uses the keyword classifier only

use std::path::PathBuf;
use std::sync::Arc;

use tokio_query_router::config::{export_schema, loader, RouterConfig};
use tokio_query_router::{
    init_tracing, metrics, IntelligentQueryRouter, QueryClassifier, RetrievalEngine, RouterError,
    StaticEngine,
};
use tracing::{info, warn};

fn config_path() -> Option<PathBuf> {
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--config" {
            return args.next().map(PathBuf::from);
        }
    }
    None
}

fn wants_schema() -> bool {
    std::env::args().skip(1).any(|arg| arg == "--print-schema")
}

fn demo_engines() -> (Arc<dyn RetrievalEngine>, Arc<dyn RetrievalEngine>) {
    let traditional = StaticEngine::new(
        "traditional",
        &[
            "红烧肉：五花肉切块焯水，炒糖色后加酱油、料酒小火慢炖一小时。",
            "番茄炒蛋：鸡蛋炒至凝固盛出，番茄炒软后回锅翻炒调味。",
            "宫保鸡丁：鸡丁腌制上浆，与花生米、干辣椒、花椒同炒。",
        ],
    )
    .with_delay(5);

    let graph = StaticEngine::new(
        "graph_rag",
        &[
            "川菜 -[常用调料]-> 花椒；花椒 -[产地]-> 四川汉源。",
            "鸡肉 -[搭配]-> 青椒、蘑菇、土豆。",
            "川菜 -[形成原因]-> 盆地潮湿气候、移民饮食融合。",
        ],
    )
    .with_delay(15);

    (Arc::new(traditional), Arc::new(graph))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    if wants_schema() {
        println!("{}", export_schema()?);
        return Ok(());
    }

    let config = match config_path() {
        Some(path) => loader::load_from_file(&path)?,
        None => RouterConfig::default(),
    };

    // LOG_FORMAT from the environment wins over the config file.
    if std::env::var_os("LOG_FORMAT").is_none() {
        std::env::set_var("LOG_FORMAT", config.observability.log_format.as_env_value());
    }
    let _ = init_tracing();

    if config.observability.metrics_enabled {
        metrics::init_metrics()?;
    }

    info!("Starting tokio-query-router demo");

    let (traditional, graph) = demo_engines();
    let router = match IntelligentQueryRouter::from_config(
        Arc::clone(&traditional),
        Arc::clone(&graph),
        &config,
    ) {
        Ok(router) => router,
        Err(RouterError::ConfigError(reason)) => {
            warn!(%reason, "classification service unavailable, using keyword rules only");
            let classifier = QueryClassifier::rule_based_only(config.rules.clone());
            IntelligentQueryRouter::new(traditional, graph, classifier, &config)
        }
        Err(e) => return Err(e.into()),
    };

    let queries = [
        "红烧肉怎么做？",
        "鸡肉搭配什么蔬菜比较好？",
        "为什么川菜用花椒，和地理气候有什么关系，有哪些影响？",
        "番茄炒蛋",
    ];

    for query in queries {
        println!("{}", router.explain_routing(query).await);

        match router.route(query).await {
            Ok((passages, analysis)) => {
                println!("→ {} result(s) via {}", passages.len(), analysis.recommended_strategy());
                for p in &passages {
                    println!("  - {}", p.content);
                }
            }
            Err(e) => warn!(error = %e, "routing failed"),
        }
        println!();
    }

    println!("{}", serde_json::to_string_pretty(&router.statistics())?);

    if config.observability.metrics_enabled {
        let mut counts: Vec<_> = metrics::route_counts().into_iter().collect();
        counts.sort();
        for (strategy, count) in counts {
            info!(%strategy, count, "routed queries (prometheus)");
        }
        println!("{}", metrics::gather_metrics());
    }

    info!("Demo complete");
    Ok(())
}
