use chrono::{DateTime, Utc};
use signal_engine::engine::EngineHandle;
use signal_engine::risk::PositionSizer;

/// Shared by every handler; cheap to clone
#[derive(Debug, Clone)]
pub struct AppState {
    pub engine: EngineHandle,
    pub sizer: PositionSizer,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(engine: EngineHandle, sizer: PositionSizer) -> Self {
        Self {
            engine,
            sizer,
            started_at: Utc::now(),
        }
    }
}
