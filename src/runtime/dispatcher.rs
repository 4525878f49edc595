use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error};

use super::{ClientCache, CommandKind, CommandResult, RuntimeCommand, RuntimeConnector, RuntimeTarget};
use crate::config::AgentConfig;
use crate::error::CommandError;

const KILL_SIGNAL: &str = "SIGKILL";

/// Maps container commands onto runtime client calls.
///
/// Stateless apart from the client cache. Stop and kill are bounded: a stop may take the
/// full grace period, so its bound is `stop_grace + command_timeout`; a kill is bounded by
/// `command_timeout` alone. Pause and unpause are not bounded.
pub struct CommandDispatcher {
    clients: ClientCache,
    cfg: AgentConfig,
    stop_grace: Duration,
    command_timeout: Duration,
}

impl CommandDispatcher {
    pub fn new(cfg: &AgentConfig, connector: Arc<dyn RuntimeConnector>) -> Self {
        Self {
            clients: ClientCache::new(connector),
            cfg: cfg.clone(),
            stop_grace: cfg.stop_grace,
            command_timeout: cfg.command_timeout,
        }
    }

    /// Performs one command and reports the outcome in the response body.
    pub async fn perform(&self, command: &RuntimeCommand) -> CommandResult {
        debug!(?command, "received runtime command");
        let res = self.execute(command).await;
        if let Err(e) = &res {
            error!(
                runtime = command.target.as_str(),
                code = command.code,
                container = %command.container_id,
                error = %e,
                label = e.as_label(),
                "runtime command failed"
            );
        }
        let result = CommandResult::from(res);
        debug!(?result, "sending runtime command response");
        result
    }

    async fn execute(&self, command: &RuntimeCommand) -> Result<(), CommandError> {
        let kind = CommandKind::from_code(command.code).ok_or(CommandError::UnknownCommand {
            runtime: command.target.as_str(),
            code: command.code,
        })?;

        let endpoint = self.endpoint(&command.target);
        let client = self
            .clients
            .get(&endpoint, self.api_version(&command.target))
            .await?;
        let id = command.container_id.as_str();

        match (kind, &command.target) {
            (CommandKind::Stop, _) => {
                bounded(
                    self.stop_grace + self.command_timeout,
                    client.stop(id, self.stop_grace),
                )
                .await
            }
            (CommandKind::Pause, _) => client.pause(id).await,
            (CommandKind::Unpause, _) => client.unpause(id).await,
            // CRI has no signal API; a zero-grace stop kills immediately.
            (CommandKind::Kill, RuntimeTarget::Cri { .. }) => {
                bounded(self.command_timeout, client.stop(id, Duration::ZERO)).await
            }
            (CommandKind::Kill, RuntimeTarget::Docker) => {
                bounded(self.command_timeout, client.kill(id, KILL_SIGNAL)).await
            }
        }
    }

    fn api_version(&self, target: &RuntimeTarget) -> Option<&str> {
        match target {
            RuntimeTarget::Docker => Some(self.cfg.docker_api_version.as_str()),
            RuntimeTarget::Cri { .. } => None,
        }
    }

    fn endpoint(&self, target: &RuntimeTarget) -> String {
        match target {
            RuntimeTarget::Docker => self.cfg.docker_endpoint(),
            RuntimeTarget::Cri { socket_path } => self.cfg.cri_endpoint(socket_path),
        }
    }
}

async fn bounded<F>(timeout: Duration, call: F) -> Result<(), CommandError>
where
    F: Future<Output = Result<(), CommandError>>,
{
    tokio::time::timeout(timeout, call)
        .await
        .map_err(|_| CommandError::Timeout { timeout })?
}
