use crate::{
    collector::{RawFrame, SnapshotCollector, StopNotification},
    config::{FramesWithLocals, ObserverConfig},
    errors::{EngineError, SessionError},
    identity::{compute_identities, FrameIdentity, FrameOrder},
    presentation::{PresentationHandle, SnapshotPublisher},
    serialize::{serialize, SerializedSnapshot},
    store::{FrameState, VariableDiffStore},
};
use tracing::{error, info, warn};

/// One observed debug session.
///
/// The session owns the diff engine from [`start`](Self::start) until [`end`](Self::end), and
/// processes one stop at a time: the next stop is only awaited once the previous one has been
/// collected, recorded and published.
pub struct DiffSession<C> {
    engine: VariableDiffStore,
    collector: C,
    publisher: SnapshotPublisher,
    config: ObserverConfig,
}

impl<C: SnapshotCollector> DiffSession<C> {
    pub fn start(collector: C, config: ObserverConfig) -> Self {
        info!("Observer attached.");
        Self {
            engine: VariableDiffStore::new(),
            collector,
            publisher: SnapshotPublisher::new(),
            config,
        }
    }

    pub fn attach_presentation(&self) -> PresentationHandle {
        self.publisher.attach()
    }

    pub fn engine(&self) -> &VariableDiffStore {
        &self.engine
    }

    pub fn collector_mut(&mut self) -> &mut C {
        &mut self.collector
    }

    /// Processes stops until the collector reports the end of the session, then tears down.
    ///
    /// A stop that can't be read or collected completely is logged and the session continues
    /// with the next one. Returns the state as it was before teardown.
    pub async fn run(mut self) -> SerializedSnapshot {
        loop {
            match self.collector.next_stop().await {
                Ok(Some(stop)) => {
                    if let Err(err) = self.handle_stop(stop).await {
                        error!("Failed to collect the stopped state: {err:?}");
                    }
                }
                Ok(None) => break,
                Err(err) if err.is_fatal() => {
                    error!("Lost the connection to the debugger: {err:?}");
                    break;
                }
                Err(err) => warn!("Skipping a stop that couldn't be read: {err}"),
            }
        }
        self.end()
    }

    /// Collects and diffs the state of one stop, then publishes it.
    ///
    /// If collecting fails halfway, whatever was recorded so far stays and is published.
    pub async fn handle_stop(&mut self, stop: StopNotification) -> Result<(), SessionError> {
        let result = self.collect(stop).await;
        self.publish();
        result
    }

    async fn collect(&mut self, stop: StopNotification) -> Result<(), SessionError> {
        info!(
            "STOPPED: reason={}",
            stop.reason.as_deref().unwrap_or("unknown")
        );
        self.engine.set_stop_reason(stop.reason);

        let raw_frames = self.collector.stack_frames().await?;
        let names: Vec<&str> = raw_frames.iter().map(|it| it.name.as_str()).collect();
        let order = self.collector.frame_order();
        let identities = compute_identities(&names, order);
        let frames = raw_frames
            .iter()
            .zip(identities)
            .map(|(raw, identity)| FrameState {
                identity,
                source_file: raw.source_file.clone(),
                line: raw.line,
                raw_handle: raw.handle,
            })
            .collect();
        self.engine.replace_frames(frames);

        let innermost = match order {
            FrameOrder::InnermostFirst => (!raw_frames.is_empty()).then_some(0),
            FrameOrder::OutermostFirst => raw_frames.len().checked_sub(1),
        };
        let inspected: Vec<usize> = match self.config.frames_with_locals {
            FramesWithLocals::All => (0..raw_frames.len()).collect(),
            FramesWithLocals::Innermost => innermost.into_iter().collect(),
        };
        for index in inspected {
            let identity = self.engine.snapshot().frames()[index].identity.clone();
            let locals = self.collector.locals(&raw_frames[index]).await?;
            for variable in locals {
                self.record(&identity, &variable.name, &variable.value)?;
            }
        }

        if let Some(index) = innermost {
            let identity = self.engine.snapshot().frames()[index].identity.clone();
            self.evaluate_watches(&raw_frames[index], &identity).await?;
        }
        Ok(())
    }

    async fn evaluate_watches(
        &mut self,
        frame: &RawFrame,
        identity: &FrameIdentity,
    ) -> Result<(), EngineError> {
        for expression in self.config.watch_expressions.clone() {
            match self.collector.evaluate(frame, &expression).await {
                Ok(value) => self.record(identity, &expression, &value)?,
                Err(err) => warn!("Failed to evaluate watch expression `{expression}`: {err}"),
            }
        }
        Ok(())
    }

    fn record(
        &mut self,
        identity: &FrameIdentity,
        name: &str,
        value: &str,
    ) -> Result<(), EngineError> {
        let record = self.engine.record_variable(identity, name, value)?;
        if record.is_initial() {
            info!("  {} = {}", record.name, record.current);
        } else if record.changed {
            let previous = record.previous.as_deref().unwrap_or_default();
            info!("  {}: {} -> {}", record.name, previous, record.current);
        }
        Ok(())
    }

    fn publish(&self) {
        self.publisher.publish(serialize(self.engine.snapshot()));
    }

    /// Tears the session down: forgets all frames and histories and tells presentation.
    pub fn end(mut self) -> SerializedSnapshot {
        let last = serialize(self.engine.snapshot());
        self.engine.reset(None);
        self.engine.clear_variables();
        self.publish();
        info!("Observer detached.");
        last
    }
}
