//! # Cooperative Event Loop
//!
//! One task, one handler, no locks. Every iteration does at most one thing:
//!
//! ```text
//!   ┌─► exit requested? ───────────────────────────────► stop
//!   │   queued event ready (round-robin)? ── deliver one
//!   │   earliest alarm due? ──────────────── fire it
//!   │   idle callbacks pending? ──────────── run one
//!   │   otherwise block until a queue has an event,
//!   └── the next alarm is due, or shutdown is signalled
//! ```
//!
//! Events win over alarms, except that a due alarm is never made to wait
//! behind more than one event: after delivering an event the loop fires any
//! due alarm before touching the queues again. A burst of inbound packets is
//! therefore interleaved with timeouts rather than starving them.
//!
//! Handler callbacks are awaited to completion before anything else runs.
//! Errors they return are logged; panics are caught at this boundary,
//! logged, and the loop carries on.
//!
//! ## Shutdown
//!
//! The loop watches a `tokio::sync::watch` channel and stops when it turns
//! `true` or its sender is dropped. A handler can also stop it through
//! [`LoopControl::exit`]. When no queue, alarm or deferred event is left
//! the loop stops by itself.

use std::collections::VecDeque;
use std::panic::AssertUnwindSafe;

use async_trait::async_trait;
use futures::future::select_all;
use futures::FutureExt;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use super::timer::{TimerHandle, TimerQueue};
use crate::error::ProtocolError;

// ---------------------------------------------------------------------------
// Handler Contract
// ---------------------------------------------------------------------------

/// What the loop drives.
#[async_trait]
pub trait EventHandler: Send {
    /// Items arriving on watched queues (and deferred by the handler).
    type Event: Send + 'static;
    /// Payload carried by alarms.
    type Timer: Send + 'static;

    /// Called once before the first iteration.
    async fn start(
        &mut self,
        _ctl: &mut LoopControl<Self::Event, Self::Timer>,
    ) -> Result<(), ProtocolError> {
        Ok(())
    }

    async fn on_event(
        &mut self,
        event: Self::Event,
        ctl: &mut LoopControl<Self::Event, Self::Timer>,
    ) -> Result<(), ProtocolError>;

    async fn on_timer(
        &mut self,
        handle: TimerHandle,
        timer: Self::Timer,
        ctl: &mut LoopControl<Self::Event, Self::Timer>,
    ) -> Result<(), ProtocolError>;
}

/// Idle callback. Runs with the handler borrowed, after the loop has
/// caught up with everything that was ready.
pub type IdleCallback<H> = Box<dyn FnMut(&mut H) + Send>;

/// Loop services available to a handler during a callback.
pub struct LoopControl<E, T> {
    /// Alarms. Arm and cancel freely; the loop fires them.
    pub timers: TimerQueue<T>,
    deferred: VecDeque<E>,
    exit: bool,
}

impl<E, T> LoopControl<E, T> {
    pub fn new() -> Self {
        Self {
            timers: TimerQueue::new(),
            deferred: VecDeque::new(),
            exit: false,
        }
    }

    /// Queues an event for a later iteration. Deferred events take part in
    /// the round-robin like any watched queue.
    pub fn defer(&mut self, event: E) {
        self.deferred.push_back(event);
    }

    /// Asks the loop to stop after the current callback.
    pub fn exit(&mut self) {
        self.exit = true;
    }

    pub fn exit_requested(&self) -> bool {
        self.exit
    }

    /// Takes the next deferred event, if any.
    pub fn take_deferred(&mut self) -> Option<E> {
        self.deferred.pop_front()
    }

    pub fn deferred_len(&self) -> usize {
        self.deferred.len()
    }
}

impl<E, T> Default for LoopControl<E, T> {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// The Loop
// ---------------------------------------------------------------------------

/// What one iteration did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Event,
    Timer,
    Idle,
    Blocked,
}

/// Single-threaded cooperative scheduler around one handler.
pub struct EventLoop<H: EventHandler> {
    handler: H,
    ctl: LoopControl<H::Event, H::Timer>,
    queues: Vec<mpsc::UnboundedReceiver<H::Event>>,
    next_source: usize,
    idle: Vec<IdleCallback<H>>,
    idle_cursor: Option<usize>,
    last: Step,
}

impl<H: EventHandler> EventLoop<H> {
    pub fn new(handler: H) -> Self {
        Self {
            handler,
            ctl: LoopControl::new(),
            queues: Vec::new(),
            next_source: 0,
            idle: Vec::new(),
            idle_cursor: None,
            last: Step::Blocked,
        }
    }

    /// Adds an input queue.
    pub fn watch_queue(&mut self, queue: mpsc::UnboundedReceiver<H::Event>) {
        self.queues.push(queue);
    }

    /// Registers a callback run once after each burst of activity.
    pub fn on_idle(&mut self, callback: IdleCallback<H>) {
        self.idle.push(callback);
    }

    /// Gives access to the alarms before the loop starts.
    pub fn control(&mut self) -> &mut LoopControl<H::Event, H::Timer> {
        &mut self.ctl
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }

    /// Runs until shutdown, handler exit, or nothing is left to wait on.
    /// Returns the handler so callers can inspect its final state.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> H {
        info!(queues = self.queues.len(), "event loop starting");

        let started = AssertUnwindSafe(self.handler.start(&mut self.ctl))
            .catch_unwind()
            .await;
        report("start", started);

        loop {
            if self.ctl.exit || *shutdown.borrow() {
                break;
            }

            let step = self.step(&mut shutdown).await;
            match step {
                Some(step) => {
                    if matches!(step, Step::Event | Step::Timer) {
                        self.idle_cursor = (!self.idle.is_empty()).then_some(0);
                    }
                    self.last = step;
                }
                None => break,
            }
        }

        info!("event loop stopped");
        self.handler
    }

    /// Performs one iteration. `None` means the loop should stop.
    async fn step(&mut self, shutdown: &mut watch::Receiver<bool>) -> Option<Step> {
        let timer_due = self
            .ctl
            .timers
            .next_deadline()
            .is_some_and(|d| d <= Instant::now());

        if !(timer_due && self.last == Step::Event) {
            if let Some(event) = self.try_next_event() {
                self.deliver(event).await;
                return Some(Step::Event);
            }
        }

        if let Some((handle, timer)) = self.ctl.timers.pop_due(Instant::now()) {
            self.fire(handle, timer).await;
            return Some(Step::Timer);
        }

        if let Some(i) = self.idle_cursor {
            if let Some(callback) = self.idle.get_mut(i) {
                let handler = &mut self.handler;
                let ran = std::panic::catch_unwind(AssertUnwindSafe(|| callback(handler)));
                if ran.is_err() {
                    error!(callback = i, "idle callback panicked");
                }
            }
            self.idle_cursor = (i + 1 < self.idle.len()).then_some(i + 1);
            return Some(Step::Idle);
        }

        self.block(shutdown).await
    }

    /// Takes one event from the next non-empty source, round-robin over the
    /// watched queues and the deferred list.
    fn try_next_event(&mut self) -> Option<H::Event> {
        let sources = self.queues.len() + 1;
        for offset in 0..sources {
            let source = (self.next_source + offset) % sources;
            let event = if source == self.queues.len() {
                self.ctl.deferred.pop_front()
            } else {
                self.queues[source].try_recv().ok()
            };
            if event.is_some() {
                self.next_source = (source + 1) % sources;
                return event;
            }
        }
        None
    }

    async fn block(&mut self, shutdown: &mut watch::Receiver<bool>) -> Option<Step> {
        let deadline = self.ctl.timers.next_deadline();
        if self.queues.is_empty() && deadline.is_none() && self.ctl.deferred.is_empty() {
            info!("no queues or alarms left");
            return None;
        }

        let sleep = async move {
            match deadline {
                Some(d) => tokio::time::sleep_until(d).await,
                None => std::future::pending::<()>().await,
            }
        };

        let queues = &mut self.queues;
        let recv = async move {
            if queues.is_empty() {
                return std::future::pending::<(Option<H::Event>, usize)>().await;
            }
            let (event, index, _) = select_all(queues.iter_mut().map(|q| Box::pin(q.recv()))).await;
            (event, index)
        };

        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() {
                    debug!("shutdown sender dropped");
                    return None;
                }
                Some(Step::Blocked)
            }
            (event, index) = recv => {
                match event {
                    Some(event) => {
                        self.next_source = (index + 1) % (self.queues.len() + 1);
                        self.deliver(event).await;
                        Some(Step::Event)
                    }
                    None => {
                        debug!(queue = index, "input queue closed");
                        self.queues.remove(index);
                        Some(Step::Blocked)
                    }
                }
            }
            _ = sleep => Some(Step::Blocked),
        }
    }

    async fn deliver(&mut self, event: H::Event) {
        let result = AssertUnwindSafe(self.handler.on_event(event, &mut self.ctl))
            .catch_unwind()
            .await;
        report("event", result);
    }

    async fn fire(&mut self, handle: TimerHandle, timer: H::Timer) {
        let result = AssertUnwindSafe(self.handler.on_timer(handle, timer, &mut self.ctl))
            .catch_unwind()
            .await;
        report("timer", result);
    }
}

fn report(
    what: &'static str,
    result: Result<Result<(), ProtocolError>, Box<dyn std::any::Any + Send>>,
) {
    match result {
        Ok(Ok(())) => {}
        Ok(Err(ProtocolError::ProtocolViolation(e))) => {
            warn!(callback = what, error = %e, "dropped packet");
        }
        Ok(Err(e)) => {
            warn!(callback = what, error = %e, "handler error");
        }
        Err(panic) => {
            let msg = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "non-string panic".to_string());
            error!(callback = what, panic = %msg, "handler panicked, continuing");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use parking_lot::Mutex;

    #[derive(Debug, Clone, PartialEq)]
    enum Seen {
        Event(u32),
        Timer(&'static str),
        Idle,
    }

    #[derive(Default)]
    struct Recorder {
        seen: Vec<Seen>,
        exit_after: Option<usize>,
    }

    impl Recorder {
        fn note(&mut self, s: Seen, ctl: &mut LoopControl<u32, &'static str>) {
            self.seen.push(s);
            if self.exit_after == Some(self.seen.len()) {
                ctl.exit();
            }
        }
    }

    #[async_trait]
    impl EventHandler for Recorder {
        type Event = u32;
        type Timer = &'static str;

        async fn on_event(
            &mut self,
            event: u32,
            ctl: &mut LoopControl<u32, &'static str>,
        ) -> Result<(), ProtocolError> {
            if event == 666 {
                panic!("boom");
            }
            if event == 13 {
                return Err(ProtocolError::Validation("unlucky".into()));
            }
            if event == 100 {
                ctl.defer(101);
            }
            self.note(Seen::Event(event), ctl);
            Ok(())
        }

        async fn on_timer(
            &mut self,
            _handle: TimerHandle,
            timer: &'static str,
            ctl: &mut LoopControl<u32, &'static str>,
        ) -> Result<(), ProtocolError> {
            if timer == "tick" && self.seen.len() < 6 {
                ctl.timers.arm(Duration::from_secs(1), "tick");
            }
            self.note(Seen::Timer(timer), ctl);
            Ok(())
        }
    }

    fn no_shutdown() -> (watch::Sender<bool>, watch::Receiver<bool>) {
        watch::channel(false)
    }

    #[tokio::test(start_paused = true)]
    async fn queued_events_interleave_with_due_alarm() {
        let (tx, rx) = mpsc::unbounded_channel();
        for i in 1..=3 {
            tx.send(i).unwrap();
        }
        drop(tx);

        let mut lp = EventLoop::new(Recorder::default());
        lp.watch_queue(rx);
        lp.control().timers.arm(Duration::ZERO, "due");

        let (_keep, shutdown) = no_shutdown();
        let h = lp.run(shutdown).await;
        assert_eq!(
            h.seen,
            vec![Seen::Event(1), Seen::Timer("due"), Seen::Event(2), Seen::Event(3)]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn queues_are_served_round_robin() {
        let (a_tx, a_rx) = mpsc::unbounded_channel();
        let (b_tx, b_rx) = mpsc::unbounded_channel();
        a_tx.send(1).unwrap();
        a_tx.send(2).unwrap();
        b_tx.send(10).unwrap();
        b_tx.send(20).unwrap();
        drop((a_tx, b_tx));

        let mut lp = EventLoop::new(Recorder::default());
        lp.watch_queue(a_rx);
        lp.watch_queue(b_rx);
        let (_keep, shutdown) = no_shutdown();
        let h = lp.run(shutdown).await;
        assert_eq!(
            h.seen,
            vec![Seen::Event(1), Seen::Event(10), Seen::Event(2), Seen::Event(20)]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn repeating_alarm_rearms_itself_and_respects_time() {
        let mut lp = EventLoop::new(Recorder::default());
        lp.control().timers.arm(Duration::from_secs(1), "tick");
        let start = Instant::now();
        let (_keep, shutdown) = no_shutdown();
        let h = lp.run(shutdown).await;
        assert_eq!(h.seen.len(), 7);
        assert!(h.seen.iter().all(|s| *s == Seen::Timer("tick")));
        assert_eq!(Instant::now() - start, Duration::from_secs(7));
    }

    #[tokio::test(start_paused = true)]
    async fn panics_and_errors_do_not_stop_the_loop() {
        let (tx, rx) = mpsc::unbounded_channel();
        tx.send(666).unwrap();
        tx.send(13).unwrap();
        tx.send(7).unwrap();
        drop(tx);

        let mut lp = EventLoop::new(Recorder::default());
        lp.watch_queue(rx);
        let (_keep, shutdown) = no_shutdown();
        let h = lp.run(shutdown).await;
        assert_eq!(h.seen, vec![Seen::Event(7)]);
    }

    #[tokio::test(start_paused = true)]
    async fn deferred_events_are_delivered_later() {
        let (tx, rx) = mpsc::unbounded_channel();
        tx.send(100).unwrap();
        tx.send(5).unwrap();
        drop(tx);

        let mut lp = EventLoop::new(Recorder::default());
        lp.watch_queue(rx);
        let (_keep, shutdown) = no_shutdown();
        let h = lp.run(shutdown).await;
        assert_eq!(h.seen, vec![Seen::Event(100), Seen::Event(101), Seen::Event(5)]);
    }

    #[tokio::test(start_paused = true)]
    async fn idle_runs_once_per_burst() {
        let (tx, rx) = mpsc::unbounded_channel();
        tx.send(1).unwrap();
        tx.send(2).unwrap();

        let idles = Arc::new(Mutex::new(0));
        let counter = Arc::clone(&idles);

        let mut lp = EventLoop::new(Recorder {
            exit_after: Some(4),
            ..Recorder::default()
        });
        lp.watch_queue(rx);
        lp.on_idle(Box::new(move |h: &mut Recorder| {
            *counter.lock() += 1;
            h.seen.push(Seen::Idle);
        }));

        let sender = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            tx.send(3).unwrap();
            tx
        });

        let (_keep, shutdown) = no_shutdown();
        let h = lp.run(shutdown).await;
        drop(sender);
        assert_eq!(
            h.seen,
            vec![Seen::Event(1), Seen::Event(2), Seen::Idle, Seen::Event(3)]
        );
        assert_eq!(*idles.lock(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_signal_stops_blocked_loop() {
        let (_tx, rx) = mpsc::unbounded_channel::<u32>();
        let mut lp = EventLoop::new(Recorder::default());
        lp.watch_queue(rx);
        let (stop, shutdown) = watch::channel(false);

        let task = tokio::spawn(lp.run(shutdown));
        tokio::time::sleep(Duration::from_secs(5)).await;
        stop.send(true).unwrap();
        let h = task.await.unwrap();
        assert!(h.seen.is_empty());
    }
}
