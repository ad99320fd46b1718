//! Proactive bearer-token refresh.
//!
//! One background task per guarded session:
//! `Idle -> Scheduled -> Refreshing -> Scheduled ...`, ending in `LoggedOut`
//! when a refresh fails, or back in `Idle` when stopped or signed out.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{broadcast, oneshot, watch};
use tokio::task::JoinHandle;

use crate::{
    client::ApiClient,
    error::ClientError,
    session::{AuthSession, SessionEvent},
};

/// Refresh this long before the token's encoded expiry.
pub const DEFAULT_REFRESH_LEAD: Duration = Duration::from_millis(5000);

#[async_trait]
pub trait TokenRefresher: Send + Sync {
    /// Request a new bearer token with the side-channel credential.
    async fn refresh(&self) -> Result<String, ClientError>;
}

#[async_trait]
impl TokenRefresher for ApiClient {
    async fn refresh(&self) -> Result<String, ClientError> {
        self.refresh_token().await
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Scheduled { delay: Duration },
    Refreshing,
    LoggedOut,
}

/// Time to wait before refreshing, or `None` when the refresh is due now.
pub fn refresh_delay(expires_at: DateTime<Utc>, now: DateTime<Utc>, lead: Duration) -> Option<Duration> {
    let lead = chrono::Duration::from_std(lead).unwrap_or(chrono::Duration::zero());
    let delay = expires_at - now - lead;
    if delay <= chrono::Duration::zero() {
        None
    } else {
        delay.to_std().ok()
    }
}

pub struct RefreshScheduler {
    state: watch::Receiver<SchedulerState>,
    cancel: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl RefreshScheduler {
    /// Arm the timer for the session's current token.
    pub fn start(session: AuthSession, refresher: Arc<dyn TokenRefresher>, lead: Duration) -> Self {
        let (state_tx, state_rx) = watch::channel(SchedulerState::Idle);
        let (cancel_tx, cancel_rx) = oneshot::channel();
        let events = session.subscribe();

        let handle = tokio::spawn(run(session, refresher, lead, state_tx, cancel_rx, events));

        Self {
            state: state_rx,
            cancel: Some(cancel_tx),
            handle: Some(handle),
        }
    }

    pub fn state(&self) -> SchedulerState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SchedulerState> {
        self.state.clone()
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Cancel any armed timer and wait for the task to wind down.
    pub async fn stop(mut self) {
        if let Some(cancel) = self.cancel.take() {
            let _ = cancel.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for RefreshScheduler {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

async fn run(
    session: AuthSession,
    refresher: Arc<dyn TokenRefresher>,
    lead: Duration,
    state: watch::Sender<SchedulerState>,
    mut cancel: oneshot::Receiver<()>,
    mut events: broadcast::Receiver<SessionEvent>,
) {
    loop {
        let Some((generation, claims)) = session.current() else {
            state.send_replace(SchedulerState::Idle);
            return;
        };
        let Some(expires_at) = claims.expires_at() else {
            tracing::warn!(sub = %claims.sub, "token carries no expiry, not scheduling refresh");
            state.send_replace(SchedulerState::Idle);
            return;
        };

        if let Some(delay) = refresh_delay(expires_at, Utc::now(), lead) {
            tracing::debug!(delay_ms = delay.as_millis() as u64, "refresh scheduled");
            state.send_replace(SchedulerState::Scheduled { delay });
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = &mut cancel => {
                    state.send_replace(SchedulerState::Idle);
                    return;
                }
                ev = signed_out(&mut events) => {
                    state.send_replace(ended_by(ev));
                    return;
                }
            }
        }

        state.send_replace(SchedulerState::Refreshing);
        let result = tokio::select! {
            r = refresher.refresh() => r,
            _ = &mut cancel => {
                state.send_replace(SchedulerState::Idle);
                return;
            }
            ev = signed_out(&mut events) => {
                state.send_replace(ended_by(ev));
                return;
            }
        };

        let token = match result {
            Ok(token) => token,
            Err(e) => {
                tracing::warn!("scheduled refresh failed: {e}");
                session.expire_generation(generation);
                state.send_replace(SchedulerState::LoggedOut);
                return;
            }
        };

        match session.set_credentials(generation, &token) {
            Ok(_) => continue,
            Err(_) if session.generation() != generation => {
                tracing::debug!("session closed during scheduled refresh");
                state.send_replace(SchedulerState::Idle);
                return;
            }
            Err(e) => {
                tracing::warn!("refreshed token rejected: {e}");
                session.expire_generation(generation);
                state.send_replace(SchedulerState::LoggedOut);
                return;
            }
        }
    }
}

fn ended_by(event: SessionEvent) -> SchedulerState {
    match event {
        SessionEvent::Expired => SchedulerState::LoggedOut,
        _ => SchedulerState::Idle,
    }
}

/// Resolves with the first `LoggedOut` or `Expired` event.
async fn signed_out(events: &mut broadcast::Receiver<SessionEvent>) -> SessionEvent {
    loop {
        match events.recv().await {
            Ok(ev @ (SessionEvent::LoggedOut | SessionEvent::Expired)) => return ev,
            Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => continue,
            Err(broadcast::error::RecvError::Closed) => std::future::pending::<()>().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{auth::test_tokens, session::MemoryTokenStore};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FakeRefresher {
        calls: AtomicUsize,
        succeed: bool,
        ttl: chrono::Duration,
    }

    impl FakeRefresher {
        fn new(succeed: bool, ttl: chrono::Duration) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                succeed,
                ttl,
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl TokenRefresher for FakeRefresher {
        async fn refresh(&self) -> Result<String, ClientError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if self.succeed {
                Ok(test_tokens::expiring_at(&format!("r{n}"), Utc::now() + self.ttl))
            } else {
                Err(ClientError::SessionExpired)
            }
        }
    }

    fn session_expiring_in(ms: i64) -> (AuthSession, Arc<MemoryTokenStore>) {
        let store = Arc::new(MemoryTokenStore::default());
        let session = AuthSession::new(store.clone());
        let token = test_tokens::expiring_at("u", Utc::now() + chrono::Duration::milliseconds(ms));
        session.login(&token).unwrap();
        (session, store)
    }

    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    #[test]
    fn delay_subtracts_lead() {
        let now = Utc::now();
        let lead = DEFAULT_REFRESH_LEAD;
        assert_eq!(
            refresh_delay(now + chrono::Duration::seconds(60), now, lead),
            Some(Duration::from_secs(55))
        );
        assert_eq!(refresh_delay(now + chrono::Duration::seconds(2), now, lead), None);
        assert_eq!(refresh_delay(now + chrono::Duration::seconds(5), now, lead), None);
        assert_eq!(refresh_delay(now - chrono::Duration::seconds(5), now, lead), None);
    }

    #[tokio::test(start_paused = true)]
    async fn near_expiry_refreshes_immediately() {
        let (session, _) = session_expiring_in(2_000);
        let refresher = FakeRefresher::new(true, chrono::Duration::minutes(10));
        let scheduler = RefreshScheduler::start(session.clone(), refresher.clone(), DEFAULT_REFRESH_LEAD);

        settle().await;
        assert_eq!(refresher.calls(), 1);
        assert!(matches!(scheduler.state(), SchedulerState::Scheduled { .. }));
        assert_eq!(session.claims().unwrap().sub, "r0");
        scheduler.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn waits_until_lead_before_expiry() {
        let (session, _) = session_expiring_in(60_000);
        let refresher = FakeRefresher::new(true, chrono::Duration::minutes(10));
        let scheduler = RefreshScheduler::start(session.clone(), refresher.clone(), DEFAULT_REFRESH_LEAD);
        settle().await;

        match scheduler.state() {
            SchedulerState::Scheduled { delay } => {
                assert!(delay <= Duration::from_secs(55));
                assert!(delay > Duration::from_secs(54));
            }
            other => panic!("unexpected state {other:?}"),
        }

        tokio::time::advance(Duration::from_secs(54)).await;
        settle().await;
        assert_eq!(refresher.calls(), 0);

        tokio::time::advance(Duration::from_secs(2)).await;
        settle().await;
        assert_eq!(refresher.calls(), 1);
        assert!(matches!(scheduler.state(), SchedulerState::Scheduled { .. }));
        scheduler.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn logout_cancels_armed_timer() {
        let (session, _) = session_expiring_in(60_000);
        let refresher = FakeRefresher::new(true, chrono::Duration::minutes(10));
        let scheduler = RefreshScheduler::start(session.clone(), refresher.clone(), DEFAULT_REFRESH_LEAD);
        settle().await;

        session.logout();
        settle().await;
        assert_eq!(scheduler.state(), SchedulerState::Idle);

        tokio::time::advance(Duration::from_secs(120)).await;
        settle().await;
        assert_eq!(refresher.calls(), 0);
        assert!(!scheduler.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn stop_cancels_armed_timer() {
        let (session, _) = session_expiring_in(60_000);
        let refresher = FakeRefresher::new(true, chrono::Duration::minutes(10));
        let scheduler = RefreshScheduler::start(session.clone(), refresher.clone(), DEFAULT_REFRESH_LEAD);
        settle().await;

        scheduler.stop().await;
        tokio::time::advance(Duration::from_secs(120)).await;
        settle().await;
        assert_eq!(refresher.calls(), 0);
        assert!(session.is_authenticated());
    }

    #[tokio::test(start_paused = true)]
    async fn failed_refresh_expires_session_once() {
        let (session, store) = session_expiring_in(1_000);
        let mut events = session.subscribe();
        let refresher = FakeRefresher::new(false, chrono::Duration::zero());
        let scheduler = RefreshScheduler::start(session.clone(), refresher.clone(), DEFAULT_REFRESH_LEAD);
        settle().await;

        assert_eq!(refresher.calls(), 1);
        assert_eq!(scheduler.state(), SchedulerState::LoggedOut);
        assert!(!session.is_authenticated());
        assert_eq!(store.peek(), None);
        assert_eq!(events.try_recv().unwrap(), SessionEvent::Expired);
        assert!(events.try_recv().is_err());
    }

    struct SlowRefresher {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl TokenRefresher for SlowRefresher {
        async fn refresh(&self) -> Result<String, ClientError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_secs(1)).await;
            Ok(test_tokens::expiring_at("late", Utc::now() + chrono::Duration::minutes(10)))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn logout_during_refresh_keeps_session_closed() {
        let (session, store) = session_expiring_in(1_000);
        let refresher = Arc::new(SlowRefresher { calls: AtomicUsize::new(0) });
        let scheduler = RefreshScheduler::start(session.clone(), refresher.clone(), DEFAULT_REFRESH_LEAD);
        settle().await;
        assert_eq!(scheduler.state(), SchedulerState::Refreshing);

        session.logout();
        tokio::time::advance(Duration::from_secs(2)).await;
        settle().await;

        assert!(!session.is_authenticated());
        assert_eq!(store.peek(), None);
        assert_eq!(scheduler.state(), SchedulerState::Idle);
        assert_eq!(refresher.calls.load(Ordering::SeqCst), 1);
        assert!(!scheduler.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn no_session_stays_idle() {
        let session = AuthSession::new(Arc::new(MemoryTokenStore::default()));
        let refresher = FakeRefresher::new(true, chrono::Duration::minutes(1));
        let scheduler = RefreshScheduler::start(session, refresher.clone(), DEFAULT_REFRESH_LEAD);
        settle().await;
        assert_eq!(scheduler.state(), SchedulerState::Idle);
        assert_eq!(refresher.calls(), 0);
    }
}
