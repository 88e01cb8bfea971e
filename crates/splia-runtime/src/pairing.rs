//! Pairing flow driver: runs [`PairingMachine`] against real timers and the
//! remote services.
//!
//! Two independent intervals drive the machine: a 1 s countdown and the
//! poll cadence. Each poll runs as its own task and reports back over a
//! channel tagged with its ticket; starting a new poll aborts the previous
//! one, and the machine discards any answer that is not for the latest
//! ticket. Reaching a terminal phase drops both intervals and aborts the
//! in-flight poll.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior, interval_at};
use tokio_util::sync::CancellationToken;

use splia_core::pairing::{DEFAULT_EXPIRY_SECS, DEFAULT_POLL_INTERVAL_SECS};
use splia_core::{
    Effect, Failure, PairingImage, PairingMachine, PairingView, Phase, PollSignal, PollTicket,
    Route, SessionHandle,
};

use crate::backend::RecordStore;
use crate::error::ClientError;
use crate::gateway::StatusGateway;
use crate::storage::PairingImageSource;

/// User actions available on the pairing screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserCommand {
    /// Poll once right now, outside the cadence.
    CheckNow,
    /// Reload the screen after an error.
    Refresh,
    /// Return to the onboarding step.
    Back,
    /// Leave without navigating.
    Quit,
}

/// How the flow ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairingOutcome {
    Connected,
    Expired,
    MissingImage,
    Back,
    Cancelled,
}

/// Presentation layer hook.
pub trait PairingObserver: Send {
    fn on_view(&mut self, view: &PairingView);

    /// Called once per mount when an image was found.
    fn on_image(&mut self, _image: &PairingImage) {}
}

pub trait Navigator: Send {
    fn navigate(&mut self, route: Route);
}

#[derive(Debug, Clone, Copy)]
pub struct PairingTimings {
    pub poll_interval: Duration,
    pub expiry_secs: u32,
}

impl Default for PairingTimings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
            expiry_secs: DEFAULT_EXPIRY_SECS,
        }
    }
}

pub struct PairingFlow<S, G, I> {
    store: Arc<S>,
    gateway: Arc<G>,
    images: I,
    account: String,
    timings: PairingTimings,
}

async fn next_tick(interval: &mut Option<Interval>) {
    match interval {
        Some(i) => {
            i.tick().await;
        }
        None => std::future::pending().await,
    }
}

type PollResult = (PollTicket, PollSignal);

/// Timers and the in-flight poll of one mounted screen. Both intervals are
/// alive only while `Waiting`.
struct Screen {
    countdown: Option<Interval>,
    poll: Option<Interval>,
    in_flight: Option<JoinHandle<()>>,
}

impl Screen {
    fn idle() -> Self {
        Self {
            countdown: None,
            poll: None,
            in_flight: None,
        }
    }

    fn start_timers(&mut self, poll_interval: Duration) {
        if self.countdown.is_some() {
            return;
        }
        let now = Instant::now();
        let second = Duration::from_secs(1);
        self.countdown = Some(interval_at(now + second, second));
        let mut poll = interval_at(now + poll_interval, poll_interval);
        // A stalled runtime should not fire a burst of polls afterwards.
        poll.set_missed_tick_behavior(MissedTickBehavior::Skip);
        self.poll = Some(poll);
    }

    fn cancel_timers(&mut self) {
        self.countdown = None;
        self.poll = None;
        if let Some(task) = self.in_flight.take() {
            task.abort();
        }
    }
}

impl Drop for Screen {
    fn drop(&mut self) {
        self.cancel_timers();
    }
}

impl<S, G, I> PairingFlow<S, G, I>
where
    S: RecordStore + 'static,
    G: StatusGateway + 'static,
    I: PairingImageSource,
{
    pub fn new(
        store: Arc<S>,
        gateway: Arc<G>,
        images: I,
        account: impl Into<String>,
        mut timings: PairingTimings,
    ) -> Self {
        // tokio intervals panic on a zero period.
        timings.poll_interval = timings.poll_interval.max(Duration::from_millis(100));
        Self {
            store,
            gateway,
            images,
            account: account.into(),
            timings,
        }
    }

    /// Run the screen until it reaches an exit. Never returns an error:
    /// every failure degrades to a phase or a logged warning.
    ///
    /// When `commands` closes the flow keeps running, but an error phase
    /// ends it instead of waiting for a refresh.
    pub async fn run(
        &self,
        mut commands: mpsc::Receiver<UserCommand>,
        cancel: CancellationToken,
        observer: &mut dyn PairingObserver,
        navigator: &mut dyn Navigator,
    ) -> PairingOutcome {
        let mut machine = PairingMachine::new(self.timings.expiry_secs);
        let mut commands_open = true;

        loop {
            let image = self.images.load_pairing_image();
            if let Some(ref img) = image {
                observer.on_image(img);
            }
            let effects = machine.mount(image.is_some());
            tracing::info!(
                account = %self.account,
                image = image.is_some(),
                "pairing screen mounted"
            );
            observer.on_view(&machine.view());

            if machine.phase() == Phase::Waiting {
                let exit = self
                    .run_waiting(
                        &mut machine,
                        effects,
                        &mut commands,
                        &mut commands_open,
                        &cancel,
                        observer,
                        navigator,
                    )
                    .await;
                if let Some(outcome) = exit {
                    return outcome;
                }
            }

            // Error phase: timers are gone, wait for the user.
            let terminal = match machine.failure() {
                Some(Failure::MissingImage) => PairingOutcome::MissingImage,
                _ => PairingOutcome::Expired,
            };
            loop {
                if !commands_open {
                    return terminal;
                }
                let cmd = tokio::select! {
                    () = cancel.cancelled() => return PairingOutcome::Cancelled,
                    cmd = commands.recv() => cmd,
                };
                match cmd {
                    Some(UserCommand::Refresh) => {
                        machine.reload();
                        tracing::info!("pairing screen reloading");
                        break;
                    }
                    Some(UserCommand::Back) => {
                        let mut screen = Screen::idle();
                        return self
                            .apply(machine.back(), &mut screen, &cancel, navigator)
                            .await
                            .unwrap_or(PairingOutcome::Back);
                    }
                    Some(UserCommand::Quit) => return terminal,
                    Some(UserCommand::CheckNow) => {
                        tracing::debug!("check ignored outside waiting phase");
                    }
                    None => commands_open = false,
                }
            }
        }
    }

    /// Drive the `Waiting` phase. `None` means the machine fell into `Error`.
    #[allow(clippy::too_many_arguments)]
    async fn run_waiting(
        &self,
        machine: &mut PairingMachine,
        mount_effects: Vec<Effect>,
        commands: &mut mpsc::Receiver<UserCommand>,
        commands_open: &mut bool,
        cancel: &CancellationToken,
        observer: &mut dyn PairingObserver,
        navigator: &mut dyn Navigator,
    ) -> Option<PairingOutcome> {
        let (result_tx, mut result_rx) = mpsc::channel::<PollResult>(4);
        let mut screen = Screen::idle();
        if let Some(outcome) = self.apply(mount_effects, &mut screen, cancel, navigator).await {
            return Some(outcome);
        }

        loop {
            // Countdown before poll results: an expiry in the same instant wins.
            tokio::select! {
                biased;

                () = cancel.cancelled() => {
                    tracing::info!("pairing flow cancelled");
                    return Some(PairingOutcome::Cancelled);
                }

                () = next_tick(&mut screen.countdown) => {
                    let effects = machine.tick();
                    observer.on_view(&machine.view());
                    if machine.phase() == Phase::Error {
                        tracing::info!("pairing image expired");
                    }
                    if let Some(outcome) = self.apply(effects, &mut screen, cancel, navigator).await {
                        return Some(outcome);
                    }
                }

                Some((ticket, signal)) = result_rx.recv() => {
                    if !machine.is_current(ticket) {
                        tracing::debug!(seq = ticket.seq, "discarding stale poll result");
                        continue;
                    }
                    match &signal {
                        PollSignal::Open => tracing::info!(seq = ticket.seq, "gateway reports open"),
                        PollSignal::NotOpen(state) => tracing::debug!(seq = ticket.seq, state = %state, "not connected yet"),
                        PollSignal::Unavailable(reason) => tracing::warn!(seq = ticket.seq, "connection check failed: {reason}"),
                    }
                    let effects = machine.resolve_poll(ticket, signal);
                    observer.on_view(&machine.view());
                    if let Some(outcome) = self.apply(effects, &mut screen, cancel, navigator).await {
                        return Some(outcome);
                    }
                }

                () = next_tick(&mut screen.poll) => {
                    if let Some(ticket) = machine.begin_poll() {
                        self.start_poll(ticket, &mut screen, &result_tx);
                    }
                }

                cmd = commands.recv(), if *commands_open => match cmd {
                    Some(UserCommand::CheckNow) => {
                        if let Some(ticket) = machine.begin_manual_check() {
                            tracing::info!(seq = ticket.seq, "manual connection check");
                            self.start_poll(ticket, &mut screen, &result_tx);
                        }
                    }
                    Some(UserCommand::Back) => {
                        let effects = machine.back();
                        return Some(
                            self.apply(effects, &mut screen, cancel, navigator)
                                .await
                                .unwrap_or(PairingOutcome::Back),
                        );
                    }
                    Some(UserCommand::Quit) => return Some(PairingOutcome::Cancelled),
                    Some(UserCommand::Refresh) => {
                        tracing::debug!("refresh ignored while waiting");
                    }
                    None => *commands_open = false,
                },
            }

            if machine.phase() == Phase::Error {
                return None;
            }
        }
    }

    fn start_poll(
        &self,
        ticket: PollTicket,
        screen: &mut Screen,
        results: &mpsc::Sender<PollResult>,
    ) {
        if let Some(previous) = screen.in_flight.take() {
            previous.abort();
        }
        tracing::debug!(seq = ticket.seq, "polling connection state");
        let store = Arc::clone(&self.store);
        let gateway = Arc::clone(&self.gateway);
        let account = self.account.clone();
        let stored = self.images.load_session_handle();
        let tx = results.clone();
        screen.in_flight = Some(tokio::spawn(async move {
            let signal = poll_once(&*store, &*gateway, &account, stored).await;
            // Receiver gone means the screen was torn down.
            let _ = tx.send((ticket, signal)).await;
        }));
    }

    /// Execute effects in order. Returns an outcome once navigation happened.
    async fn apply(
        &self,
        effects: Vec<Effect>,
        screen: &mut Screen,
        cancel: &CancellationToken,
        navigator: &mut dyn Navigator,
    ) -> Option<PairingOutcome> {
        for effect in effects {
            match effect {
                Effect::StartTimers => screen.start_timers(self.timings.poll_interval),
                Effect::CancelTimers => screen.cancel_timers(),
                Effect::PersistConnected => match self.store.mark_connected(&self.account).await {
                    Ok(()) => tracing::info!(account = %self.account, "account marked connected"),
                    Err(e) => tracing::warn!(account = %self.account, "cannot record connection: {e}"),
                },
                Effect::Navigate { route, after } => {
                    if !after.is_zero() {
                        tokio::select! {
                            () = cancel.cancelled() => return Some(PairingOutcome::Cancelled),
                            () = tokio::time::sleep(after) => {}
                        }
                    }
                    tracing::info!(route = %route, "navigating");
                    navigator.navigate(route);
                    return Some(match route {
                        Route::Dashboard => PairingOutcome::Connected,
                        _ => PairingOutcome::Back,
                    });
                }
            }
        }
        None
    }
}

/// One connection check: session handle from the record store, then the
/// live state from the gateway. Failures become [`PollSignal::Unavailable`].
///
/// `stored` is the instance name kept by onboarding; it is used only while
/// the record has no handle of its own.
pub(crate) async fn poll_once<S, G>(
    store: &S,
    gateway: &G,
    account: &str,
    stored: Option<SessionHandle>,
) -> PollSignal
where
    S: RecordStore + ?Sized,
    G: StatusGateway + ?Sized,
{
    let record = match store.fetch_account(account).await {
        Ok(Some(record)) => record,
        Ok(None) => {
            return PollSignal::Unavailable(ClientError::MissingRecord(account.to_string()).to_string());
        }
        Err(e) => return PollSignal::Unavailable(e.to_string()),
    };
    let handle = match (record.session_handle, stored) {
        (Some(handle), _) => handle,
        (None, Some(handle)) => {
            tracing::debug!(instance = %handle, "record has no handle, using stored instance");
            handle
        }
        (None, None) => return PollSignal::Unavailable(ClientError::MissingHandle.to_string()),
    };
    match gateway.connection_state(&handle).await {
        Ok(state) => PollSignal::from_state(&state),
        Err(e) => PollSignal::Unavailable(e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use splia_core::{AccountRecord, SessionHandle};

    // -- Mocks --

    struct MockStore {
        handle: Option<&'static str>,
        fetches: AtomicUsize,
        writes: AtomicUsize,
    }

    impl MockStore {
        fn with_handle(handle: Option<&'static str>) -> Arc<Self> {
            Arc::new(Self {
                handle,
                fetches: AtomicUsize::new(0),
                writes: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl RecordStore for MockStore {
        async fn fetch_account(&self, email: &str) -> Result<Option<AccountRecord>, ClientError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            Ok(Some(AccountRecord {
                id: "acc-1".into(),
                owner_email: email.into(),
                display_name: Some("Lava Bem".into()),
                session_handle: self.handle.and_then(SessionHandle::new),
                connection: Default::default(),
                subscription: Default::default(),
                created_at: None,
            }))
        }

        async fn mark_connected(&self, _email: &str) -> Result<(), ClientError> {
            self.writes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[derive(Clone)]
    enum Reply {
        State(&'static str),
        Fail,
        Slow(Duration, &'static str),
    }

    struct MockGateway {
        script: Mutex<VecDeque<Reply>>,
        fallback: Reply,
        calls: AtomicUsize,
        handles: Mutex<Vec<String>>,
    }

    impl MockGateway {
        fn scripted(script: Vec<Reply>, fallback: Reply) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script.into()),
                fallback,
                calls: AtomicUsize::new(0),
                handles: Mutex::new(Vec::new()),
            })
        }

        fn always(reply: Reply) -> Arc<Self> {
            Self::scripted(Vec::new(), reply)
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        fn handles(&self) -> Vec<String> {
            self.handles.lock().expect("handles lock").clone()
        }
    }

    #[async_trait]
    impl StatusGateway for MockGateway {
        async fn connection_state(&self, handle: &SessionHandle) -> Result<String, ClientError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.handles
                .lock()
                .expect("handles lock")
                .push(handle.to_string());
            let reply = {
                let mut script = self.script.lock().expect("script lock");
                script.pop_front().unwrap_or_else(|| self.fallback.clone())
            };
            match reply {
                Reply::State(s) => Ok(s.to_string()),
                Reply::Fail => Err(ClientError::Status {
                    url: "gw".into(),
                    status: 502,
                    body: "bad gateway".into(),
                }),
                Reply::Slow(delay, s) => {
                    tokio::time::sleep(delay).await;
                    Ok(s.to_string())
                }
            }
        }
    }

    #[derive(Default)]
    struct SpyObserver {
        views: Vec<PairingView>,
        images: usize,
    }

    impl PairingObserver for SpyObserver {
        fn on_view(&mut self, view: &PairingView) {
            self.views.push(view.clone());
        }

        fn on_image(&mut self, _image: &PairingImage) {
            self.images += 1;
        }
    }

    /// Observer whose record outlives a spawned driver.
    #[derive(Clone, Default)]
    struct SharedObserver {
        views: Arc<Mutex<Vec<(PairingView, Instant)>>>,
    }

    impl SharedObserver {
        fn count(&self) -> usize {
            self.views.lock().expect("views lock").len()
        }

        fn last(&self) -> (PairingView, Instant) {
            self.views
                .lock()
                .expect("views lock")
                .last()
                .cloned()
                .expect("view")
        }
    }

    impl PairingObserver for SharedObserver {
        fn on_view(&mut self, view: &PairingView) {
            self.views
                .lock()
                .expect("views lock")
                .push((view.clone(), Instant::now()));
        }
    }

    /// Local storage after onboarding: QR image plus instance name.
    struct Onboarded {
        instance: Option<SessionHandle>,
    }

    impl PairingImageSource for Onboarded {
        fn load_pairing_image(&self) -> Option<PairingImage> {
            image()
        }

        fn load_session_handle(&self) -> Option<SessionHandle> {
            self.instance.clone()
        }
    }

    #[derive(Default)]
    struct SpyNavigator {
        routes: Vec<(Route, Instant)>,
    }

    impl Navigator for SpyNavigator {
        fn navigate(&mut self, route: Route) {
            self.routes.push((route, Instant::now()));
        }
    }

    fn image() -> Option<PairingImage> {
        PairingImage::new("data:image/png;base64,iVBORw0KGgo=").ok()
    }

    fn flow(
        store: &Arc<MockStore>,
        gateway: &Arc<MockGateway>,
        images: Option<PairingImage>,
    ) -> PairingFlow<MockStore, MockGateway, Option<PairingImage>> {
        PairingFlow::new(
            Arc::clone(store),
            Arc::clone(gateway),
            images,
            "dona@lava.com",
            PairingTimings::default(),
        )
    }

    /// Command channel whose sender is already gone.
    fn closed_commands() -> mpsc::Receiver<UserCommand> {
        let (_tx, rx) = mpsc::channel(1);
        rx
    }

    // -- Scenarios --

    #[tokio::test(start_paused = true)]
    async fn missing_image_fails_without_polling() {
        let store = MockStore::with_handle(Some("lava-01"));
        let gateway = MockGateway::always(Reply::State("open"));
        let mut observer = SpyObserver::default();
        let mut nav = SpyNavigator::default();
        let start = Instant::now();

        let outcome = flow(&store, &gateway, None)
            .run(closed_commands(), CancellationToken::new(), &mut observer, &mut nav)
            .await;

        assert_eq!(outcome, PairingOutcome::MissingImage);
        assert_eq!(start.elapsed(), Duration::ZERO, "fails on mount");
        assert_eq!(gateway.calls(), 0);
        assert_eq!(store.fetches.load(Ordering::SeqCst), 0);
        let last = observer.views.last().expect("view");
        assert_eq!(last.phase, Phase::Error);
        assert_eq!(last.failure, Some(Failure::MissingImage));
        assert_eq!(observer.images, 0);
        assert!(nav.routes.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn never_open_expires_after_sixty_seconds() {
        let store = MockStore::with_handle(Some("lava-01"));
        let gateway = MockGateway::always(Reply::State("connecting"));
        let observer = SharedObserver::default();
        let pairing = flow(&store, &gateway, image());
        let (tx, rx) = mpsc::channel(4);
        let start = Instant::now();
        let mut spy = observer.clone();
        let driver = tokio::spawn(async move {
            let mut nav = SpyNavigator::default();
            let outcome = pairing
                .run(rx, CancellationToken::new(), &mut spy, &mut nav)
                .await;
            (outcome, nav)
        });

        tokio::time::sleep(Duration::from_secs(61)).await;
        assert!(!driver.is_finished(), "expired screen waits for a refresh");
        assert_eq!(gateway.calls(), 11, "polled at 5s..55s");
        let (last, at) = observer.last();
        assert_eq!(last.phase, Phase::Error);
        assert_eq!(last.failure, Some(Failure::Expired));
        assert_eq!(last.remaining_secs, 0);
        assert_eq!(at - start, Duration::from_secs(60));

        // Timers are gone: another minute in the error phase changes nothing.
        let views = observer.count();
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(gateway.calls(), 11, "no polls after expiry");
        assert_eq!(observer.count(), views, "no countdown ticks after expiry");

        drop(tx);
        let (outcome, nav) = driver.await.expect("driver");
        assert_eq!(outcome, PairingOutcome::Expired);
        assert_eq!(store.writes.load(Ordering::SeqCst), 0);
        assert!(nav.routes.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn fourth_poll_open_connects_and_navigates_once() {
        let store = MockStore::with_handle(Some("lava-01"));
        let gateway = MockGateway::scripted(
            vec![
                Reply::State("connecting"),
                Reply::Fail,
                Reply::State("close"),
                Reply::State("open"),
            ],
            Reply::State("open"),
        );
        let mut observer = SpyObserver::default();
        let mut nav = SpyNavigator::default();
        let start = Instant::now();

        let outcome = flow(&store, &gateway, image())
            .run(closed_commands(), CancellationToken::new(), &mut observer, &mut nav)
            .await;

        assert_eq!(outcome, PairingOutcome::Connected);
        assert_eq!(gateway.calls(), 4);
        assert_eq!(store.writes.load(Ordering::SeqCst), 1);
        assert_eq!(nav.routes.len(), 1);
        let (route, at) = nav.routes[0];
        assert_eq!(route, Route::Dashboard);
        assert_eq!(at - start, Duration::from_secs(22), "open at 20s + 2s delay");

        let connected = observer
            .views
            .iter()
            .find(|v| v.phase == Phase::Connected)
            .expect("connected view");
        assert_eq!(connected.remaining_secs, 40);
        assert_eq!(observer.images, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_polls_do_not_touch_countdown() {
        let store = MockStore::with_handle(Some("lava-01"));
        let gateway = MockGateway::scripted(vec![Reply::Fail, Reply::Fail], Reply::State("open"));
        let mut observer = SpyObserver::default();
        let mut nav = SpyNavigator::default();

        let outcome = flow(&store, &gateway, image())
            .run(closed_commands(), CancellationToken::new(), &mut observer, &mut nav)
            .await;

        assert_eq!(outcome, PairingOutcome::Connected);
        // Countdown only ever moves down by one per view while waiting.
        let waiting: Vec<u32> = observer
            .views
            .iter()
            .filter(|v| v.phase == Phase::Waiting)
            .map(|v| v.remaining_secs)
            .collect();
        assert!(waiting.windows(2).all(|w| w[0] == w[1] || w[0] == w[1] + 1));
        assert!(observer.views.iter().all(|v| v.notice.is_none()));
    }

    #[tokio::test(start_paused = true)]
    async fn no_timer_activity_after_terminal_phase() {
        let store = MockStore::with_handle(Some("lava-01"));
        let gateway = MockGateway::always(Reply::State("open"));
        let mut observer = SpyObserver::default();
        let mut nav = SpyNavigator::default();

        let outcome = flow(&store, &gateway, image())
            .run(closed_commands(), CancellationToken::new(), &mut observer, &mut nav)
            .await;
        assert_eq!(outcome, PairingOutcome::Connected);

        let calls = gateway.calls();
        let views = observer.views.len();
        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(gateway.calls(), calls, "no polls after connected");
        assert_eq!(observer.views.len(), views, "no ticks after connected");
        assert_eq!(store.writes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn overlapping_poll_is_aborted_and_ignored() {
        let store = MockStore::with_handle(Some("lava-01"));
        // Poll 1 (t=5) would answer "open" at t=12, but poll 2 starts at t=10.
        let gateway = MockGateway::scripted(
            vec![
                Reply::Slow(Duration::from_secs(7), "open"),
                Reply::State("connecting"),
                Reply::State("open"),
            ],
            Reply::State("connecting"),
        );
        let mut observer = SpyObserver::default();
        let mut nav = SpyNavigator::default();
        let start = Instant::now();

        let outcome = flow(&store, &gateway, image())
            .run(closed_commands(), CancellationToken::new(), &mut observer, &mut nav)
            .await;

        assert_eq!(outcome, PairingOutcome::Connected);
        assert_eq!(nav.routes[0].1 - start, Duration::from_secs(17), "open at 15s + 2s");
        assert_eq!(store.writes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn manual_check_failure_sets_notice_then_connects() {
        let store = MockStore::with_handle(Some("lava-01"));
        let gateway = MockGateway::scripted(vec![Reply::Fail], Reply::State("open"));
        let mut observer = SpyObserver::default();
        let mut nav = SpyNavigator::default();
        let (tx, rx) = mpsc::channel(4);
        tx.send(UserCommand::CheckNow).await.expect("send");

        let outcome = flow(&store, &gateway, image())
            .run(rx, CancellationToken::new(), &mut observer, &mut nav)
            .await;

        assert_eq!(outcome, PairingOutcome::Connected);
        let notice = observer
            .views
            .iter()
            .find_map(|v| v.notice.clone())
            .expect("manual failure surfaced");
        assert!(notice.contains("502"), "{notice}");
        assert!(
            observer
                .views
                .iter()
                .take_while(|v| v.phase != Phase::Connected)
                .all(|v| v.phase == Phase::Waiting),
            "manual failure does not leave waiting"
        );
        drop(tx);
    }

    #[tokio::test(start_paused = true)]
    async fn back_returns_to_onboarding_without_writes() {
        let store = MockStore::with_handle(Some("lava-01"));
        let gateway = MockGateway::always(Reply::State("connecting"));
        let mut observer = SpyObserver::default();
        let mut nav = SpyNavigator::default();
        let (tx, rx) = mpsc::channel(4);
        tx.send(UserCommand::Back).await.expect("send");

        let outcome = flow(&store, &gateway, image())
            .run(rx, CancellationToken::new(), &mut observer, &mut nav)
            .await;

        assert_eq!(outcome, PairingOutcome::Back);
        assert_eq!(nav.routes.len(), 1);
        assert_eq!(nav.routes[0].0, Route::Onboarding);
        assert_eq!(store.writes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_tears_down() {
        let store = MockStore::with_handle(Some("lava-01"));
        let gateway = MockGateway::always(Reply::State("connecting"));
        let mut observer = SpyObserver::default();
        let mut nav = SpyNavigator::default();
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(12)).await;
            trigger.cancel();
        });
        let (tx, rx) = mpsc::channel(1);

        let outcome = flow(&store, &gateway, image())
            .run(rx, cancel, &mut observer, &mut nav)
            .await;

        assert_eq!(outcome, PairingOutcome::Cancelled);
        let calls = gateway.calls();
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(gateway.calls(), calls);
        drop(tx);
    }

    #[tokio::test(start_paused = true)]
    async fn refresh_after_expiry_restarts_countdown() {
        let store = MockStore::with_handle(Some("lava-01"));
        let gateway = MockGateway::always(Reply::State("connecting"));
        let timings = PairingTimings {
            poll_interval: Duration::from_secs(5),
            expiry_secs: 3,
        };
        let pairing = PairingFlow::new(
            Arc::clone(&store),
            Arc::clone(&gateway),
            image(),
            "dona@lava.com",
            timings,
        );
        let (tx, rx) = mpsc::channel(4);
        let driver = tokio::spawn(async move {
            let mut observer = SpyObserver::default();
            let mut nav = SpyNavigator::default();
            let outcome = pairing
                .run(rx, CancellationToken::new(), &mut observer, &mut nav)
                .await;
            (outcome, observer)
        });

        // Expired at t=3; refresh at t=4 remounts; closing commands lets the
        // second expiry at t=7 end the run.
        tokio::time::sleep(Duration::from_secs(4)).await;
        tx.send(UserCommand::Refresh).await.expect("send");
        tokio::time::sleep(Duration::from_secs(1)).await;
        drop(tx);

        let (outcome, observer) = driver.await.expect("driver");
        assert_eq!(outcome, PairingOutcome::Expired);
        let mounts = observer
            .views
            .iter()
            .filter(|v| v.phase == Phase::Waiting && v.remaining_secs == 3)
            .count();
        assert_eq!(mounts, 2, "mounted twice with a fresh countdown");
        assert_eq!(observer.images, 2);
        assert_eq!(gateway.calls(), 0, "expiry shorter than the poll cadence");
    }

    #[tokio::test(start_paused = true)]
    async fn quit_while_waiting_skips_navigation() {
        let store = MockStore::with_handle(Some("lava-01"));
        let gateway = MockGateway::always(Reply::State("connecting"));
        let mut observer = SpyObserver::default();
        let mut nav = SpyNavigator::default();
        let (tx, rx) = mpsc::channel(4);
        tx.send(UserCommand::Refresh).await.expect("send");
        tx.send(UserCommand::Quit).await.expect("send");
        drop(tx);

        let outcome = flow(&store, &gateway, image())
            .run(rx, CancellationToken::new(), &mut observer, &mut nav)
            .await;

        assert_eq!(outcome, PairingOutcome::Cancelled);
        assert!(nav.routes.is_empty());
    }

    #[tokio::test]
    async fn poll_once_without_handle_is_unavailable() {
        let store = MockStore::with_handle(None);
        let gateway = MockGateway::always(Reply::State("open"));
        let signal = poll_once(&*store, &*gateway, "dona@lava.com", None).await;
        assert!(matches!(signal, PollSignal::Unavailable(_)));
        assert_eq!(gateway.calls(), 0);
    }

    #[tokio::test]
    async fn poll_once_uses_stored_instance_until_record_has_one() {
        let gateway = MockGateway::always(Reply::State("open"));

        let fresh = MockStore::with_handle(None);
        let stored = SessionHandle::new("lava-local");
        assert_eq!(
            poll_once(&*fresh, &*gateway, "a", stored.clone()).await,
            PollSignal::Open
        );

        let linked = MockStore::with_handle(Some("lava-01"));
        assert_eq!(
            poll_once(&*linked, &*gateway, "a", stored).await,
            PollSignal::Open
        );
        assert_eq!(gateway.handles(), vec!["lava-local", "lava-01"]);
    }

    #[tokio::test(start_paused = true)]
    async fn stored_instance_lets_fresh_account_connect() {
        let store = MockStore::with_handle(None);
        let gateway = MockGateway::scripted(vec![Reply::State("connecting")], Reply::State("open"));
        let pairing = PairingFlow::new(
            Arc::clone(&store),
            Arc::clone(&gateway),
            Onboarded {
                instance: SessionHandle::new("lava-local"),
            },
            "dona@lava.com",
            PairingTimings::default(),
        );
        let mut observer = SpyObserver::default();
        let mut nav = SpyNavigator::default();

        let outcome = pairing
            .run(closed_commands(), CancellationToken::new(), &mut observer, &mut nav)
            .await;

        assert_eq!(outcome, PairingOutcome::Connected);
        assert_eq!(gateway.handles(), vec!["lava-local", "lava-local"]);
        assert_eq!(store.writes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn poll_once_maps_state() {
        let store = MockStore::with_handle(Some("lava-01"));
        let gateway = MockGateway::scripted(
            vec![Reply::State("open"), Reply::State("close"), Reply::Fail],
            Reply::Fail,
        );
        assert_eq!(poll_once(&*store, &*gateway, "a", None).await, PollSignal::Open);
        assert_eq!(
            poll_once(&*store, &*gateway, "a", None).await,
            PollSignal::NotOpen("close".into())
        );
        assert!(matches!(
            poll_once(&*store, &*gateway, "a", None).await,
            PollSignal::Unavailable(_)
        ));
    }
}
