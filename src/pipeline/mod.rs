//! Pipeline components: queues and shutdown, fetch loop, parse stage, ship pool.

pub mod context;
pub mod fetch;
pub mod orchestrator;
pub mod parse;
pub mod ship;

pub use context::{
    FetchSummary, PipelineChannels, PipelineHandles, PipelineTuning, Shutdown,
    create_pipeline_channels, recv_or_shutdown, send_or_shutdown,
};
pub use fetch::{FetchLoop, FetchLoopParams};
pub use orchestrator::{join_pipeline, run_pipeline, shutdown_pipeline};
pub use parse::{ParseStage, parse_work_item};
pub use ship::{ship_batch, spawn_ship_workers};
