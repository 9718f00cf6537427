//! Agent entry point: follow the server's lock state until cancelled

use tokio_util::sync::CancellationToken;

use rl_core::config::AgentConfig;
use rl_core::types::Transport;

use crate::dispatch::Dispatcher;
use crate::platform::{select_platform_action, DEFAULT_ACTION_TIMEOUT};
use crate::poll::PollClient;
use crate::push::{ConnectionError, PushConnector, ReconnectScheduler};
use crate::ui::UiHandle;

/// Run the configured transport, driving `ui` and the host lock.
///
/// Returns `Ok` once `cancel` fires. Push mode returns
/// `Err(ConnectionError::AuthRejected)` if the server refuses the
/// credential. The UI handle is dropped on return, which stops the pump.
pub async fn run_agent(
    config: AgentConfig,
    ui: UiHandle,
    cancel: CancellationToken,
) -> Result<(), ConnectionError> {
    config.validate()?;
    let platform = select_platform_action(config.dry_run, DEFAULT_ACTION_TIMEOUT);
    let dispatcher = Dispatcher::new(platform, ui);

    tracing::info!(
        "Device {} following {} over {}",
        config.device_id,
        config.base_url(),
        config.transport
    );

    match config.transport {
        Transport::Push => {
            let mut scheduler = ReconnectScheduler::from_config(&config.backoff, cancel);
            let connector = PushConnector::new(config, dispatcher)?;
            connector.run(&mut scheduler).await
        }
        Transport::Poll => {
            let client = PollClient::new(&config, dispatcher)?;
            client.run(cancel).await;
            Ok(())
        }
    }
}
