//! Node runtime.
//!
//! Owns the transport, the correlator and the responder worker, and hands the
//! HTTP facade the state it needs.

use crate::config::{ConfigError, NodeConfig};
use crate::facade::FacadeState;
use relay_bus::{InMemoryPubSub, PubSubTransport};
use relay_rpc::{
    ReplyChannelNamer, ReplyCorrelator, ResponderSnapshot, ResponderStats, ResponderWorker,
    RpcError, WorkerState,
};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Runtime lifecycle errors.
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Responder failed: {0}")]
    Responder(#[from] RpcError),

    #[error("Responder task panicked or was aborted: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("Runtime already started")]
    AlreadyStarted,

    #[error("Responder stopped before it was listening")]
    NotListening,
}

/// Wired node components.
pub struct NodeRuntime {
    config: NodeConfig,
    transport: Arc<InMemoryPubSub>,
    correlator: Arc<ReplyCorrelator>,
    namer: Arc<ReplyChannelNamer>,
    responder_stats: Arc<ResponderStats>,
    worker_state: watch::Receiver<WorkerState>,
    worker: Option<ResponderWorker>,
    worker_handle: Option<JoinHandle<Result<ResponderSnapshot, RpcError>>>,
    shutdown_tx: watch::Sender<bool>,
}

impl NodeRuntime {
    /// Validate `config` and wire the components. Nothing runs yet.
    pub fn new(config: NodeConfig) -> Result<Self, RuntimeError> {
        config.validate()?;

        let transport = Arc::new(InMemoryPubSub::with_capacity(config.bus.channel_capacity));
        let shared: Arc<dyn PubSubTransport> = transport.clone();

        let correlator = Arc::new(ReplyCorrelator::new(
            Arc::clone(&shared),
            config.rpc.reply_timeout(),
        ));
        let namer = Arc::new(ReplyChannelNamer::new(config.rpc.reply_prefix.clone()));
        let worker = ResponderWorker::new(shared, config.responder_config());
        let (shutdown_tx, _) = watch::channel(false);

        Ok(Self {
            responder_stats: worker.stats(),
            worker_state: worker.state(),
            worker: Some(worker),
            worker_handle: None,
            config,
            transport,
            correlator,
            namer,
            shutdown_tx,
        })
    }

    /// Spawn the responder and wait until it is listening.
    ///
    /// Requests published before this returns could be missed by the worker.
    pub async fn start(&mut self) -> Result<(), RuntimeError> {
        let worker = self.worker.take().ok_or(RuntimeError::AlreadyStarted)?;
        let mut state = worker.state();

        info!(
            request_channel = %self.config.rpc.request_channel,
            processing_delay_ms = self.config.rpc.processing_delay_ms,
            "Starting responder"
        );
        let handle = tokio::spawn(worker.run(self.shutdown_tx.subscribe()));

        let ready = state
            .wait_for(|s| matches!(s, WorkerState::Listening | WorkerState::Terminated))
            .await
            .map(|s| *s)
            .unwrap_or(WorkerState::Terminated);

        if ready == WorkerState::Terminated {
            // The worker gave up before listening; surface why.
            handle.await??;
            return Err(RuntimeError::NotListening);
        }

        self.worker_handle = Some(handle);
        info!("Relay node started");
        Ok(())
    }

    /// Signal the responder to stop and wait for it.
    ///
    /// Returns the responder's final counters, or `None` if it never started.
    pub async fn shutdown(&mut self) -> Result<Option<ResponderSnapshot>, RuntimeError> {
        info!("Shutting down relay node");
        self.shutdown_tx.send_replace(true);

        let Some(handle) = self.worker_handle.take() else {
            return Ok(None);
        };

        match handle.await? {
            Ok(snapshot) => {
                info!(
                    received = snapshot.received,
                    replied = snapshot.replied,
                    malformed = snapshot.malformed,
                    "Responder stopped"
                );
                Ok(Some(snapshot))
            }
            Err(e) => {
                error!(error = %e, "Responder stopped with an error");
                Err(e.into())
            }
        }
    }

    /// State for the HTTP facade.
    pub fn facade_state(&self) -> FacadeState {
        FacadeState {
            correlator: Arc::clone(&self.correlator),
            namer: Arc::clone(&self.namer),
            request_channel: Arc::from(self.config.rpc.request_channel.as_str()),
            transport: Arc::clone(&self.transport),
            worker_state: self.worker_state.clone(),
            responder_stats: Arc::clone(&self.responder_stats),
        }
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    pub fn transport(&self) -> &Arc<InMemoryPubSub> {
        &self.transport
    }

    pub fn correlator(&self) -> &Arc<ReplyCorrelator> {
        &self.correlator
    }

    pub fn worker_state(&self) -> WorkerState {
        *self.worker_state.borrow()
    }
}
