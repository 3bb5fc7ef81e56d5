pub mod graph_repository_sqlx;
