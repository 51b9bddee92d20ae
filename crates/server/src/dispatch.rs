use std::sync::Arc;

use callbrief_core::{
    DispatchContext, DispatchReport, SinkError, SinkOutcome, SinkStatus, StructuredSummary,
    SummarySink,
};
use tokio::task::JoinSet;
use tracing::{info, warn};

/// Fans a summary out to every configured sink.
///
/// Sinks run concurrently and in isolation: an error or a panic in one sink
/// becomes a `Failed` outcome for that sink only.
#[derive(Clone, Default)]
pub struct Dispatcher {
    sinks: Vec<Arc<dyn SummarySink>>,
}

impl Dispatcher {
    pub fn new(sinks: Vec<Arc<dyn SummarySink>>) -> Self {
        Self { sinks }
    }

    pub fn sink_names(&self) -> Vec<&'static str> {
        self.sinks.iter().map(|sink| sink.name()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }

    pub async fn dispatch(
        &self,
        context: &DispatchContext,
        summary: &StructuredSummary,
    ) -> DispatchReport {
        let context = Arc::new(context.clone());
        let summary = Arc::new(summary.clone());
        let mut tasks = JoinSet::new();

        for (index, sink) in self.sinks.iter().enumerate() {
            let sink = Arc::clone(sink);
            let context = Arc::clone(&context);
            let summary = Arc::clone(&summary);
            tasks.spawn(async move {
                let result = sink.deliver(&context, &summary).await;
                (index, SinkOutcome::from_result(sink.name(), result))
            });
        }

        let mut outcomes: Vec<Option<SinkOutcome>> = vec![None; self.sinks.len()];
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, outcome)) => outcomes[index] = Some(outcome),
                Err(error) => warn!(
                    event_name = "dispatch.sink_panicked",
                    correlation_id = %context.invocation_id,
                    call_id = %context.call_id,
                    error = %error,
                    "sink task did not complete"
                ),
            }
        }

        let outcomes: Vec<SinkOutcome> = outcomes
            .into_iter()
            .zip(&self.sinks)
            .map(|(outcome, sink)| {
                outcome.unwrap_or_else(|| {
                    let error = SinkError::Aborted("sink task panicked".to_string());
                    SinkOutcome::from_result(sink.name(), Err(error))
                })
            })
            .collect();

        for outcome in &outcomes {
            match outcome.status {
                SinkStatus::Failed => warn!(
                    event_name = "dispatch.sink_failed",
                    correlation_id = %context.invocation_id,
                    call_id = %context.call_id,
                    sink = %outcome.sink,
                    detail = outcome.detail.as_deref().unwrap_or_default(),
                    "summary sink failed"
                ),
                SinkStatus::Skipped => info!(
                    event_name = "dispatch.sink_skipped",
                    correlation_id = %context.invocation_id,
                    call_id = %context.call_id,
                    sink = %outcome.sink,
                    detail = outcome.detail.as_deref().unwrap_or_default(),
                    "summary sink skipped"
                ),
                SinkStatus::Delivered => info!(
                    event_name = "dispatch.sink_delivered",
                    correlation_id = %context.invocation_id,
                    call_id = %context.call_id,
                    sink = %outcome.sink,
                    "summary sink delivered"
                ),
            }
        }

        DispatchReport { outcomes }
    }
}
