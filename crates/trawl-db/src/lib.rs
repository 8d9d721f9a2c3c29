pub mod config;
pub mod database;
pub mod movie_repository;
pub mod stock_repository;

pub use config::DatabaseConfig;
pub use database::Database;
pub use movie_repository::MovieRepository;
pub use stock_repository::StockRepository;
