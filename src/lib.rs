pub mod aggregator_core;
pub mod api_core;
pub mod config;
pub mod crawler_core;
pub mod key_core;
pub mod pipeline;
pub mod record;
pub mod storage_core;
pub mod sync_core;
