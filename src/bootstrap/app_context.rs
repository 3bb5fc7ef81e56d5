use std::sync::Arc;

use crate::application::ports::graph::Graph;
use crate::application::ports::indexer::Indexer;
use crate::bootstrap::config::{Config, GraphBackend, IndexBackend};
use crate::infrastructure::db;
use crate::infrastructure::db::repositories::graph_repository_sqlx::SqlxGraph;
use crate::infrastructure::memory::InMemoryGraph;
use crate::infrastructure::search::{ElasticsearchIndexer, TantivyIndexer};

/// The two stores the crawl and ranking pipeline talks to.
#[derive(Clone)]
pub struct Stores {
    pub graph: Arc<dyn Graph>,
    pub indexer: Arc<dyn Indexer>,
}

impl Stores {
    pub async fn from_config(cfg: &Config) -> anyhow::Result<Self> {
        let graph: Arc<dyn Graph> = match cfg.graph_backend {
            GraphBackend::Postgres => {
                let pool = db::connect_pool(&cfg.database_url, cfg.db_max_connections).await?;
                if cfg.run_migrations {
                    db::migrate(&pool).await?;
                }
                tracing::info!("graph_backend_postgres");
                Arc::new(SqlxGraph::new(pool))
            }
            GraphBackend::Memory => {
                tracing::info!("graph_backend_memory");
                Arc::new(InMemoryGraph::new())
            }
        };

        let indexer: Arc<dyn Indexer> = match cfg.index_backend {
            IndexBackend::Elasticsearch => {
                let es = ElasticsearchIndexer::builder(cfg.es_nodes.clone())
                    .index(cfg.es_index.clone())
                    .sync_updates(cfg.es_sync_updates)
                    .page_size(cfg.search_page_size)
                    .build()
                    .await?;
                tracing::info!(nodes = ?cfg.es_nodes, index = %cfg.es_index, "index_backend_elasticsearch");
                Arc::new(es)
            }
            IndexBackend::Memory => {
                tracing::info!("index_backend_memory");
                Arc::new(TantivyIndexer::with_page_size(cfg.search_page_size)?)
            }
        };

        Ok(Self { graph, indexer })
    }
}
