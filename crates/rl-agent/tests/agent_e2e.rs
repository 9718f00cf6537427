//! Agent against a real server on an ephemeral port

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use rl_agent::platform::LogOnlyAction;
use rl_agent::poll::PollClient;
use rl_agent::ui::{self, LockSurface, UiCommand, UiPump};
use rl_agent::{run_agent, ConnectionError, Dispatcher};
use rl_core::config::{AgentConfig, ServerConfig};
use rl_core::types::Transport;
use rl_server::{server, ServerState};

const ADMIN: &str = "change-me-secret-123";
const WAIT: Duration = Duration::from_secs(5);

#[derive(Default)]
struct Recorder {
    commands: Vec<UiCommand>,
    raised: bool,
}

impl LockSurface for Recorder {
    fn raise(&mut self, message: &str) {
        self.commands.push(UiCommand::Raise {
            message: message.to_string(),
        });
        self.raised = true;
    }

    fn lower(&mut self) {
        self.commands.push(UiCommand::Lower);
        self.raised = false;
    }

    fn is_raised(&self) -> bool {
        self.raised
    }
}

async fn start_server() -> (Arc<ServerState>, SocketAddr) {
    let mut config = ServerConfig::default();
    config
        .devices
        .insert("laptop".to_string(), "device-secret".to_string());

    let state = Arc::new(ServerState::new(config, ADMIN));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server_state = Arc::clone(&state);
    tokio::spawn(async move {
        server::serve_on(listener, server_state).await.unwrap();
    });

    (state, addr)
}

fn agent_config(addr: SocketAddr, transport: Transport, secret: &str) -> AgentConfig {
    let mut config = AgentConfig::default();
    config.server_url = format!("http://{}", addr);
    config.device_id = "laptop".to_string();
    config.secret = secret.to_string();
    config.transport = transport;
    config.dry_run = true;
    config.poll_interval = Duration::from_millis(100);
    config
}

/// Drain the pump until `done` holds for the recorder
async fn pump_until(pump: &mut UiPump, recorder: &mut Recorder, done: impl Fn(&Recorder) -> bool) {
    tokio::time::timeout(WAIT, async {
        loop {
            pump.drain(recorder);
            if done(recorder) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("Timed out waiting for the lock surface");
}

async fn wait_authenticated(state: &ServerState) {
    tokio::time::timeout(WAIT, async {
        while state.sessions.authenticated_count() == 0 {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("Agent never authenticated");
}

#[tokio::test]
async fn test_push_lock_reaches_surface() {
    let (state, addr) = start_server().await;
    let (handle, mut pump) = ui::channel();
    let cancel = CancellationToken::new();

    let agent = tokio::spawn(run_agent(
        agent_config(addr, Transport::Push, "device-secret"),
        handle,
        cancel.clone(),
    ));
    wait_authenticated(&state).await;

    state
        .coordinator
        .set_locked(Some(ADMIN), true, Some("Back at 3".to_string()), "test")
        .await
        .unwrap();

    let mut recorder = Recorder::default();
    pump_until(&mut pump, &mut recorder, |r| r.is_raised()).await;
    assert!(recorder.commands.contains(&UiCommand::Raise {
        message: "Back at 3".to_string()
    }));

    state
        .coordinator
        .set_locked(Some(ADMIN), false, None, "test")
        .await
        .unwrap();
    pump_until(&mut pump, &mut recorder, |r| !r.is_raised()).await;

    cancel.cancel();
    let result = tokio::time::timeout(WAIT, agent).await.unwrap().unwrap();
    assert!(result.is_ok());
}

#[tokio::test]
async fn test_wrong_secret_is_rejected() {
    let (_state, addr) = start_server().await;
    let (handle, _pump) = ui::channel();

    let result = tokio::time::timeout(
        WAIT,
        run_agent(
            agent_config(addr, Transport::Push, "not-the-secret"),
            handle,
            CancellationToken::new(),
        ),
    )
    .await
    .expect("Agent kept retrying a rejected credential");

    assert!(matches!(result, Err(ConnectionError::AuthRejected(_))));
}

#[tokio::test]
async fn test_poll_follows_lock_state() {
    let (state, addr) = start_server().await;
    let (handle, mut pump) = ui::channel();
    let cancel = CancellationToken::new();

    state
        .coordinator
        .set_locked(Some(ADMIN), true, Some("polled".to_string()), "test")
        .await
        .unwrap();

    let agent = tokio::spawn(run_agent(
        agent_config(addr, Transport::Poll, "device-secret"),
        handle,
        cancel.clone(),
    ));

    let mut recorder = Recorder::default();
    pump_until(&mut pump, &mut recorder, |r| r.is_raised()).await;
    assert_eq!(
        recorder.commands,
        vec![UiCommand::Raise {
            message: "polled".to_string()
        }]
    );

    state
        .coordinator
        .set_locked(Some(ADMIN), false, None, "test")
        .await
        .unwrap();
    pump_until(&mut pump, &mut recorder, |r| !r.is_raised()).await;

    cancel.cancel();
    tokio::time::timeout(WAIT, agent).await.unwrap().unwrap().unwrap();
}

#[tokio::test]
async fn test_poll_fetch_with_bad_secret_fails() {
    let (_state, addr) = start_server().await;
    let (handle, _pump) = ui::channel();
    let dispatcher = Dispatcher::new(Arc::new(LogOnlyAction), handle);

    let good = PollClient::new(
        &agent_config(addr, Transport::Poll, "device-secret"),
        dispatcher.clone(),
    )
    .unwrap();
    let state = good.fetch().await.unwrap();
    assert!(!state.locked);

    let bad = PollClient::new(
        &agent_config(addr, Transport::Poll, "not-the-secret"),
        dispatcher,
    )
    .unwrap();
    assert!(bad.fetch().await.is_err());
}
