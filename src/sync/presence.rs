use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::watch;
use tokio::time::{interval, Duration, Instant, MissedTickBehavior};

use crate::config::MatchTiming;
use crate::protocol::{now_millis, SyncPath, SyncRecord};
use crate::sync::SyncChannel;

/// Heartbeat writer, peer presence listener and watchdog for one remote match.
///
/// Three background tasks share a shutdown signal:
/// - heartbeat: rewrites `presence/<local>` every `heartbeat_interval`
/// - listener: records the local receipt time of every `presence/<peer>` update
/// - watchdog: every `watchdog_interval`, fires `on_timeout` once the peer has
///   been silent for longer than `peer_timeout`
///
/// Stopping only signals the tasks; it never aborts them, so `on_timeout` can
/// stop the monitor from inside the watchdog without cancelling itself.
pub struct PresenceMonitor {
    shutdown: watch::Sender<bool>,
    paused: Arc<AtomicBool>,
    last_seen: Arc<Mutex<Instant>>,
}

impl PresenceMonitor {
    /// Spawn the presence tasks on the current tokio runtime.
    pub fn start<F, Fut>(
        channel: Arc<dyn SyncChannel>,
        match_id: &str,
        local_id: &str,
        peer_id: &str,
        timing: &MatchTiming,
        on_timeout: F,
    ) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (shutdown, _) = watch::channel(false);
        let monitor = Self {
            shutdown,
            paused: Arc::new(AtomicBool::new(false)),
            last_seen: Arc::new(Mutex::new(Instant::now())),
        };

        monitor.spawn_heartbeat(
            channel.clone(),
            match_id.to_string(),
            SyncPath::Presence(local_id.to_string()),
            timing.heartbeat_interval,
        );
        monitor.spawn_listener(
            channel,
            match_id.to_string(),
            SyncPath::Presence(peer_id.to_string()),
        );
        monitor.spawn_watchdog(timing.watchdog_interval, timing.peer_timeout, on_timeout);
        monitor
    }

    fn spawn_heartbeat(
        &self,
        channel: Arc<dyn SyncChannel>,
        match_id: String,
        path: SyncPath,
        every: Duration,
    ) {
        let mut shutdown = self.shutdown.subscribe();
        let paused = self.paused.clone();
        tokio::spawn(async move {
            let mut ticker = interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    biased;
                    _ = shutdown.changed() => break,
                    _ = ticker.tick() => {
                        if paused.load(Ordering::SeqCst) {
                            continue;
                        }
                        let beat = SyncRecord::Presence { timestamp_ms: now_millis() };
                        if let Err(e) = channel.set(&match_id, &path, beat).await {
                            log::warn!("[Presence] failed to write {}: {}", path, e);
                        }
                    }
                }
            }
            log::debug!("[Presence] heartbeat for {} stopped", path);
        });
    }

    fn spawn_listener(&self, channel: Arc<dyn SyncChannel>, match_id: String, path: SyncPath) {
        let mut shutdown = self.shutdown.subscribe();
        let last_seen = self.last_seen.clone();
        tokio::spawn(async move {
            let mut sub = match channel.subscribe(&match_id, &path).await {
                Ok(sub) => sub,
                Err(e) => {
                    log::warn!("[Presence] cannot follow {}: {}", path, e);
                    return;
                }
            };
            loop {
                tokio::select! {
                    biased;
                    _ = shutdown.changed() => break,
                    record = sub.next() => match record {
                        Some(SyncRecord::Presence { timestamp_ms }) => {
                            log::trace!("[Presence] {} alive at {}", path, timestamp_ms);
                            if let Ok(mut seen) = last_seen.lock() {
                                *seen = Instant::now();
                            }
                        }
                        Some(other) => log::debug!("[Presence] ignoring {:?} on {}", other, path),
                        None => break,
                    },
                }
            }
            sub.unsubscribe();
        });
    }

    fn spawn_watchdog<F, Fut>(&self, every: Duration, timeout: Duration, on_timeout: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let mut shutdown = self.shutdown.subscribe();
        let paused = self.paused.clone();
        let last_seen = self.last_seen.clone();
        tokio::spawn(async move {
            let mut ticker = interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    biased;
                    _ = shutdown.changed() => return,
                    _ = ticker.tick() => {
                        if paused.load(Ordering::SeqCst) {
                            continue;
                        }
                        let silent = last_seen
                            .lock()
                            .map(|seen| seen.elapsed())
                            .unwrap_or_default();
                        if silent > timeout {
                            log::warn!("[Presence] peer silent for {:?} (limit {:?})", silent, timeout);
                            break;
                        }
                    }
                }
            }
            on_timeout().await;
        });
    }

    /// Pause heartbeat and watchdog, e.g. while the client is in the background.
    pub fn suspend(&self) {
        self.paused.store(true, Ordering::SeqCst);
    }

    /// Resume after [`PresenceMonitor::suspend`]. The liveness clock restarts
    /// from now so the watchdog does not fire on the time spent suspended.
    pub fn resume(&self) {
        self.touch();
        self.paused.store(false, Ordering::SeqCst);
    }

    pub fn is_suspended(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    /// Treat the peer as seen right now.
    pub fn touch(&self) {
        if let Ok(mut seen) = self.last_seen.lock() {
            *seen = Instant::now();
        }
    }

    /// Time since the last presence update from the peer.
    pub fn peer_silence(&self) -> Duration {
        self.last_seen
            .lock()
            .map(|seen| seen.elapsed())
            .unwrap_or_default()
    }

    /// Signal every task to stop at its next wake-up.
    pub fn stop(&self) {
        self.shutdown.send_replace(true);
    }
}

impl Drop for PresenceMonitor {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::InMemoryChannel;
    use std::sync::atomic::AtomicUsize;

    fn timing() -> MatchTiming {
        MatchTiming {
            heartbeat_interval: Duration::from_millis(10),
            watchdog_interval: Duration::from_millis(20),
            peer_timeout: Duration::from_millis(120),
            ..MatchTiming::instant()
        }
    }

    #[tokio::test]
    async fn silent_peer_trips_the_watchdog_once() {
        let channel = Arc::new(InMemoryChannel::new());
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = fired.clone();
        let _monitor = PresenceMonitor::start(channel.clone(), "m", "a", "b", &timing(), move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert!(matches!(
            channel.value("m", &SyncPath::Presence("a".into())),
            Some(SyncRecord::Presence { .. })
        ));
    }

    #[tokio::test]
    async fn two_monitors_keep_each_other_alive() {
        let channel = Arc::new(InMemoryChannel::new());
        let fired = Arc::new(AtomicUsize::new(0));
        let (fa, fb) = (fired.clone(), fired.clone());
        let a = PresenceMonitor::start(channel.clone(), "m", "a", "b", &timing(), move || async move {
            fa.fetch_add(1, Ordering::SeqCst);
        });
        let b = PresenceMonitor::start(channel.clone(), "m", "b", "a", &timing(), move || async move {
            fb.fetch_add(1, Ordering::SeqCst);
        });

        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        assert!(a.peer_silence() < Duration::from_millis(120));
        a.stop();
        b.stop();
    }

    #[tokio::test]
    async fn suspended_monitor_does_not_time_out_and_resets_on_resume() {
        let channel = Arc::new(InMemoryChannel::new());
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = fired.clone();
        let monitor = PresenceMonitor::start(channel, "m", "a", "b", &timing(), move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        monitor.suspend();
        assert!(monitor.is_suspended());
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        monitor.resume();
        assert!(monitor.peer_silence() < Duration::from_millis(50));
        monitor.stop();
    }
}
