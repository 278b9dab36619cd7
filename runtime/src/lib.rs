//! # Record Relay Runtime
//!
//! Runs the pure pipeline from `record-relay-core` against real sources and sinks.
//!
//! ## Core Components
//!
//! - **[`records`]**: the orchestrator, routing actions to wire requests and
//!   responses to success/failure actions
//! - **[`RecordsRuntime`]**: drives the orchestrator output, sending requests on
//!   a [`Transport`] and broadcasting actions
//! - **[`config`]**: TOML/env configuration for the API and the cycle drivers
//! - **[`http`]**: `reqwest` transport
//! - **[`metrics`]** and **[`telemetry`]**: Prometheus counters and tracing setup
//!
//! ## Example
//!
//! ```rust,no_run
//! use futures::stream::{self, StreamExt};
//! use record_relay_runtime::config::RecordsConfig;
//! use record_relay_runtime::http::HttpTransport;
//! use record_relay_runtime::RecordsRuntime;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = RecordsConfig::from_env()?;
//! let runtime = RecordsRuntime::new(Arc::new(HttpTransport::new()));
//! let mut actions = runtime.subscribe();
//!
//! tokio::spawn(async move {
//!     while let Ok(action) = actions.recv().await {
//!         println!("{}", action.action_type);
//!     }
//! });
//!
//! runtime.start(config, stream::empty().boxed()).await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod http;
pub mod metrics;
pub mod records;
pub mod telemetry;
pub mod transport;

pub use driver::RecordsRuntime;
pub use error::RecordsError;
pub use records::{RecordsSources, Sink, SourceConfig, cycle_records, merge_sources};
pub use transport::{Transport, TransportError};

/// Error types for the records runtime
pub mod error {
    use crate::config::SettingsError;
    use crate::transport::TransportError;
    use record_relay_core::correlate::CorrelationError;
    use record_relay_core::interpret::InterpretError;
    use thiserror::Error;

    /// Errors that stop the records pipeline.
    #[derive(Error, Debug)]
    pub enum RecordsError {
        /// A request was routed while the configured API driver is not `HTTP`
        #[error("Unsupported driver key {0}")]
        UnsupportedDriver(String),

        /// An intent could not be interpreted into a wire request
        #[error(transparent)]
        Interpret(#[from] InterpretError),

        /// A response could not be correlated to an action
        #[error(transparent)]
        Correlation(#[from] CorrelationError),

        /// Configuration failed to load or validate
        #[error(transparent)]
        Settings(#[from] SettingsError),

        /// The transport refused a request
        #[error(transparent)]
        Transport(#[from] TransportError),

        /// Shutdown timed out waiting for requests in flight
        #[error("Shutdown timed out with {0} requests still in flight")]
        ShutdownTimeout(usize),
    }
}

/// Runtime driver for the orchestrator output.
pub mod driver {
    use crate::config::RecordsConfig;
    use crate::error::RecordsError;
    use crate::metrics::TransportMetrics;
    use crate::records::{RecordsSources, Sink, cycle_records};
    use crate::transport::Transport;
    use futures::stream::{self, BoxStream, StreamExt};
    use record_relay_core::action::Action;
    use record_relay_core::config::ActionConfigLookup;
    use record_relay_core::correlate::Response;
    use record_relay_core::interpret::Category;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::sync::broadcast;

    /// Guard that decrements the in-flight counter on drop
    struct InFlightGuard(Arc<AtomicUsize>);

    impl Drop for InFlightGuard {
        fn drop(&mut self) {
            self.0.fetch_sub(1, Ordering::SeqCst);
        }
    }

    /// Drives [`cycle_records`]: `Http` sinks are sent on the transport in
    /// spawned tasks, `Action` sinks are broadcast to subscribers.
    pub struct RecordsRuntime {
        transport: Arc<dyn Transport>,
        action_broadcast: broadcast::Sender<Action>,
        in_flight: Arc<AtomicUsize>,
    }

    impl RecordsRuntime {
        /// Default broadcast buffer for success/failure actions.
        pub const DEFAULT_BROADCAST_CAPACITY: usize = 64;

        /// Create a runtime sending on `transport`.
        #[must_use]
        pub fn new(transport: Arc<dyn Transport>) -> Self {
            Self::with_broadcast_capacity(transport, Self::DEFAULT_BROADCAST_CAPACITY)
        }

        /// Create a runtime whose action broadcast buffers up to `capacity` actions.
        ///
        /// Slow subscribers that fall further behind miss actions.
        #[must_use]
        pub fn with_broadcast_capacity(transport: Arc<dyn Transport>, capacity: usize) -> Self {
            let (action_broadcast, _) = broadcast::channel(capacity.max(1));
            Self {
                transport,
                action_broadcast,
                in_flight: Arc::new(AtomicUsize::new(0)),
            }
        }

        /// Subscribe to success/failure actions emitted from now on.
        #[must_use]
        pub fn subscribe(&self) -> broadcast::Receiver<Action> {
            self.action_broadcast.subscribe()
        }

        /// Subscribe to emitted actions as a stream, e.g. to feed them back in
        /// as application actions.
        #[must_use]
        pub fn action_stream(&self) -> BoxStream<'static, Action> {
            let mut rx = self.subscribe();
            async_stream::stream! {
                loop {
                    match rx.recv().await {
                        Ok(action) => yield action,
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            tracing::warn!(skipped, "Action subscriber lagged");
                        },
                        Err(broadcast::error::RecvError::Closed) => break,
                    }
                }
            }
            .boxed()
        }

        /// Requests sent but not yet answered by the transport.
        #[must_use]
        pub fn in_flight(&self) -> usize {
            self.in_flight.load(Ordering::SeqCst)
        }

        /// Responses for every category `lookup` uses, merged.
        ///
        /// Subscriptions are taken immediately, so responses to requests sent
        /// after this call are not missed.
        #[must_use]
        pub fn responses(&self, lookup: &ActionConfigLookup) -> BoxStream<'static, Response> {
            let mut categories = lookup.categories();
            if categories.is_empty() {
                categories.insert(Category::all());
            }
            stream::select_all(categories.iter().map(|category| self.transport.select(category)))
                .boxed()
        }

        /// Build fixed sources from `config`: its lookup, `actions`, and the
        /// transport's responses.
        ///
        /// # Errors
        ///
        /// [`RecordsError::Settings`] if the configuration is invalid.
        pub fn sources(
            &self,
            config: RecordsConfig,
            actions: BoxStream<'static, Action>,
        ) -> Result<RecordsSources, RecordsError> {
            config.validate()?;
            let lookup = config.lookup()?;
            let responses = self.responses(&lookup);
            Ok(RecordsSources {
                gate: config.gate,
                config: stream::iter([Arc::new(config)]).boxed(),
                action_config: stream::iter([Arc::new(lookup)]).boxed(),
                actions,
                responses,
            })
        }

        /// Validate `config`, wire the orchestrator and run it.
        ///
        /// # Errors
        ///
        /// Any error from [`Self::sources`] or [`Self::run`].
        pub async fn start(
            &self,
            config: RecordsConfig,
            actions: BoxStream<'static, Action>,
        ) -> Result<(), RecordsError> {
            let sources = self.sources(config, actions)?;
            self.run(cycle_records(sources)).await
        }

        /// Drain `sinks` until it ends or yields an error.
        ///
        /// Requests are sent concurrently; a send that fails is logged and counted
        /// but does not stop the loop.
        ///
        /// # Errors
        ///
        /// The first error yielded by `sinks`.
        #[tracing::instrument(skip_all, name = "records_run")]
        pub async fn run(
            &self,
            mut sinks: BoxStream<'static, Result<Sink, RecordsError>>,
        ) -> Result<(), RecordsError> {
            tracing::info!("Records pipeline started");

            while let Some(sink) = sinks.next().await {
                match sink {
                    Ok(Sink::Http(request)) => {
                        let transport = Arc::clone(&self.transport);
                        self.in_flight.fetch_add(1, Ordering::SeqCst);
                        let guard = InFlightGuard(Arc::clone(&self.in_flight));
                        tokio::spawn(async move {
                            let _guard = guard;
                            if let Err(e) = transport.send(&request).await {
                                TransportMetrics::record_error();
                                tracing::error!(
                                    action_type = %request.action_type,
                                    url = %request.url,
                                    error = %e,
                                    "Failed to send request"
                                );
                            }
                        });
                    },
                    Ok(Sink::Action(action)) => {
                        tracing::debug!(action_type = %action.action_type, "Emitting action");
                        if self.action_broadcast.send(action).is_err() {
                            tracing::debug!("Action emitted with no subscribers");
                        }
                    },
                    Err(e) => {
                        tracing::error!(error = %e, "Records pipeline failed");
                        return Err(e);
                    },
                }
            }

            tracing::info!("Records pipeline finished");
            Ok(())
        }

        /// Wait until no request is in flight, for at most `timeout`.
        ///
        /// # Errors
        ///
        /// [`RecordsError::ShutdownTimeout`] with the number still in flight.
        pub async fn shutdown(&self, timeout: Duration) -> Result<(), RecordsError> {
            let start = std::time::Instant::now();
            let poll_interval = Duration::from_millis(10);

            loop {
                let pending = self.in_flight();
                if pending == 0 {
                    tracing::info!("All requests completed, shutdown successful");
                    return Ok(());
                }
                if start.elapsed() >= timeout {
                    tracing::error!(in_flight = pending, "Shutdown timeout");
                    return Err(RecordsError::ShutdownTimeout(pending));
                }
                tokio::time::sleep(poll_interval).await;
            }
        }
    }

}
