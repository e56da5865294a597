//! Current date and time from the injected clock

use std::sync::Arc;

use async_trait::async_trait;
use chrono::SecondsFormat;
use serde_json::Value;

use crate::dependencies::Clock;
use crate::error::ProviderResult;
use crate::provider::{Provider, ProviderContext};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeKind {
    /// RFC 3339 UTC timestamp
    DateTime,
    /// `YYYY-MM-DD`
    Date,
    /// `HH:MM:SS`
    Time,
}

pub struct CurrentTime {
    clock: Arc<dyn Clock>,
    kind: TimeKind,
}

impl CurrentTime {
    pub fn new(clock: Arc<dyn Clock>, kind: TimeKind) -> Self {
        Self { clock, kind }
    }
}

impl std::fmt::Debug for CurrentTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CurrentTime").field("kind", &self.kind).finish()
    }
}

#[async_trait]
impl Provider for CurrentTime {
    async fn resolve(&self, _ctx: &mut ProviderContext<'_>) -> ProviderResult<Value> {
        let now = self.clock.now();
        let text = match self.kind {
            TimeKind::DateTime => now.to_rfc3339_opts(SecondsFormat::AutoSi, true),
            TimeKind::Date => now.format("%Y-%m-%d").to_string(),
            TimeKind::Time => now.format("%H:%M:%S").to_string(),
        };
        Ok(Value::String(text))
    }
}
