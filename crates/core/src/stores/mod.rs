pub mod meilisearch;

pub use meilisearch::MeilisearchStore;
