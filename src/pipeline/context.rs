//! Per-session ownership of the actuator stack.
//!
//! Everything that used to be process-wide state lives here: the session,
//! its connection task, the generation counter, the pattern engine and the
//! command scheduler. Dropping or closing the context tears all of it down.

use super::error::Notifier;
use super::generation::Generation;
use super::orchestrator::MessagePipeline;
use super::pattern::PatternEngine;
use super::scheduler::CommandScheduler;
use super::synchronizer::PlaybackSynchronizer;
use crate::actuator::{ActuatorSession, ConnectionHandle, spawn_connection};
use crate::config::Config;
use crate::directive::DirectiveParser;
use crate::speech::SpeechSynthesizer;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

pub struct SessionContext {
    config: Config,
    session: Arc<ActuatorSession>,
    connection: Option<ConnectionHandle>,
    scheduler: Arc<CommandScheduler>,
    synchronizer: Arc<PlaybackSynchronizer>,
    notifier: Arc<dyn Notifier>,
}

impl SessionContext {
    /// Build the stack and start connecting to the actuator server.
    pub fn open(config: Config, notifier: Arc<dyn Notifier>) -> Self {
        let mut context = Self::detached(config, notifier);
        let connection = spawn_connection(
            Arc::clone(&context.session),
            context.config.actuator.server_address.clone(),
            Duration::from_millis(context.config.actuator.reconnect_delay_ms),
        );
        context.connection = Some(connection);
        context
    }

    /// Build the stack without a server connection.
    ///
    /// Commands still run through the scheduler; without a device they are
    /// reported and ignored.
    pub fn detached(config: Config, notifier: Arc<dyn Notifier>) -> Self {
        let session = Arc::new(ActuatorSession::new(
            config.actuator.client_name.clone(),
            Arc::clone(&notifier),
        ));
        let patterns = Arc::new(PatternEngine::new(Arc::clone(&session)));
        let scheduler = Arc::new(CommandScheduler::new(
            Arc::clone(&session),
            patterns,
            Generation::new(),
            Arc::clone(&notifier),
        ));
        let synchronizer = Arc::new(PlaybackSynchronizer::new(
            Arc::clone(&scheduler),
            config.speech.words_per_minute,
        ));

        Self {
            config,
            session,
            connection: None,
            scheduler,
            synchronizer,
            notifier,
        }
    }

    /// A message pipeline speaking through `synthesizer`.
    pub fn pipeline(&self, synthesizer: Arc<dyn SpeechSynthesizer>) -> MessagePipeline {
        MessagePipeline::new(
            self.config.speech.clone(),
            DirectiveParser::new(self.config.random.clone()),
            synthesizer,
            Arc::clone(&self.synchronizer),
            Arc::clone(&self.notifier),
        )
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn session(&self) -> &Arc<ActuatorSession> {
        &self.session
    }

    pub fn scheduler(&self) -> &Arc<CommandScheduler> {
        &self.scheduler
    }

    pub fn synchronizer(&self) -> &Arc<PlaybackSynchronizer> {
        &self.synchronizer
    }

    pub fn generation(&self) -> &Generation {
        self.scheduler.generation()
    }

    pub fn is_connected(&self) -> bool {
        self.session.connection_state().is_connected()
    }

    /// Full stop, then end the scheduler worker and the connection.
    pub async fn close(mut self) {
        self.scheduler.close();
        if let Some(connection) = self.connection.take() {
            connection.close().await;
        }
        info!("Session closed");
    }
}
