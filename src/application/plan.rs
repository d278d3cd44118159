//! Dry-run invalidation planning for the CLI.
//!
//! Reads change envelopes as JSON lines and reports, per change, the tags the
//! router would evict. Nothing is evicted.

use std::sync::Arc;

use serde::Serialize;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{info, instrument};

use crate::application::error::AppError;
use crate::cache::{
    CacheConfig, CacheTag, ChangeEnvelope, ChangeOperation, InvalidationPlan, InvalidationRouter,
    QueuedChange, TagParseError,
};
use crate::domain::entities::EntityId;

/// One output line of `corpsite plan`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedChange {
    pub line: usize,
    pub entity_kind: String,
    pub entity_id: EntityId,
    pub operation: ChangeOperation,
    pub recognized: bool,
    pub tags: Vec<String>,
}

pub struct PlanService {
    config: CacheConfig,
    router: Arc<InvalidationRouter>,
}

impl PlanService {
    pub fn new(config: CacheConfig, router: Arc<InvalidationRouter>) -> Self {
        Self { config, router }
    }

    pub async fn plan_envelope(&self, line: usize, envelope: &ChangeEnvelope) -> PlannedChange {
        let event = envelope.to_event();
        let tags = match (&event, self.config.is_enabled()) {
            (Some(event), true) => self
                .router
                .tags_for(event)
                .await
                .iter()
                .map(ToString::to_string)
                .collect(),
            _ => Vec::new(),
        };

        PlannedChange {
            line,
            entity_kind: envelope.entity_kind.clone(),
            entity_id: envelope.entity_id,
            operation: envelope.operation,
            recognized: event.is_some(),
            tags,
        }
    }

    /// Plan every envelope in `reader`. Blank lines are skipped; a malformed
    /// line fails the whole run with its line number.
    #[instrument(skip_all)]
    pub async fn plan_lines<R>(&self, reader: R) -> Result<Vec<PlannedChange>, AppError>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut lines = reader.lines();
        let mut planned = Vec::new();
        let mut queued = Vec::new();
        let mut line_no = 0;

        while let Some(line) = lines
            .next_line()
            .await
            .map_err(|err| AppError::Infra(err.into()))?
        {
            line_no += 1;
            if line.trim().is_empty() {
                continue;
            }
            let envelope: ChangeEnvelope = serde_json::from_str(&line)
                .map_err(|err| AppError::validation(format!("line {line_no}: {err}")))?;

            if let Some(event) = envelope.to_event() {
                queued.push(QueuedChange::new(event, line_no as u64));
            }
            planned.push(self.plan_envelope(line_no, &envelope).await);
        }

        if self.config.is_enabled() {
            let plan = InvalidationPlan::build(&self.router, queued).await;
            info!(plan = %plan, "Invalidation plan computed");
        } else {
            info!("Cache disabled; no tags would be evicted");
        }

        Ok(planned)
    }
}

/// Collection-wide tags, in rendering order.
pub fn tag_catalogue() -> Vec<String> {
    CacheTag::collections()
        .iter()
        .map(ToString::to_string)
        .collect()
}

/// Parse a tag name and return its canonical form.
pub fn check_tag(name: &str) -> Result<String, TagParseError> {
    name.trim().parse::<CacheTag>().map(|tag| tag.to_string())
}
