use rumqttc::{
    AsyncClient, ConnectionError, Event, EventLoop, Incoming, MqttOptions, QoS,
    SubscribeReasonCode,
};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{oneshot, watch};
use tracing::{debug, error, info, warn};

use crate::backoff::RetryPolicy;
use crate::config::MqttConf;
use crate::metrics::RobotMetrics;
use crate::state::{new_state, Shared};
use crate::telemetry;

/// Single-level wildcard matching every team's stats topic.
pub const STATS_FILTER: &str = "robot/+/stats";

#[derive(Debug, Error)]
pub enum ListenerError {
    #[error("invalid broker address {0:?}")]
    BadBroker(String),
    #[error("could not reach broker on first connect: {0}")]
    FirstConnect(#[from] ConnectionError),
    #[error("subscribe request failed permanently: {0}")]
    Subscribe(#[from] rumqttc::ClientError),
    #[error("broker rejected filter {0:?}")]
    FilterRejected(String),
    #[error("subscription retries exhausted")]
    RetriesExhausted,
}

/// Connection status shared with the health endpoint.
#[derive(Clone)]
pub struct ListenerStatus {
    status: Shared<String>,
    reconnects: Arc<AtomicU32>,
}

impl ListenerStatus {
    pub fn new() -> Self {
        Self {
            status: new_state("connecting".to_string()),
            reconnects: Arc::new(AtomicU32::new(0)),
        }
    }

    fn mark_connected(&self) {
        *self.status.lock() = "connected".to_string();
    }

    fn mark_reconnecting(&self) {
        self.reconnects.fetch_add(1, Ordering::Relaxed);
        *self.status.lock() = "reconnecting".to_string();
    }

    pub fn snapshot(&self) -> (String, u32) {
        (self.status.lock().clone(), self.reconnects.load(Ordering::Relaxed))
    }
}

impl Default for ListenerStatus {
    fn default() -> Self {
        Self::new()
    }
}

/// Long-lived MQTT listener feeding robot stats into the metric sink.
///
/// Lifecycle: first connect errors are startup errors for the caller;
/// everything after that is retried. The ready signal fires once, on
/// the first successful subscription, and never again across
/// reconnects.
pub struct StatsListener {
    conf: MqttConf,
    metrics: Arc<RobotMetrics>,
    policy: RetryPolicy,
    status: ListenerStatus,
    ready: Option<oneshot::Sender<()>>,
    shutdown: watch::Receiver<bool>,
}

impl StatsListener {
    pub fn new(conf: MqttConf, metrics: Arc<RobotMetrics>, shutdown: watch::Receiver<bool>) -> Self {
        Self {
            conf,
            metrics,
            policy: RetryPolicy::default(),
            status: ListenerStatus::new(),
            ready: None,
            shutdown,
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_status(mut self, status: ListenerStatus) -> Self {
        self.status = status;
        self
    }

    /// Registers the one-shot startup notification fired on first
    /// successful subscription.
    pub fn on_ready(mut self, tx: oneshot::Sender<()>) -> Self {
        self.ready = Some(tx);
        self
    }

    pub async fn run(mut self) -> Result<(), ListenerError> {
        if self.conf.host.trim().is_empty() || self.conf.port == 0 {
            return Err(ListenerError::BadBroker(format!(
                "{}:{}",
                self.conf.host, self.conf.port
            )));
        }

        let mut opts = MqttOptions::new("field-kernel-stats", &self.conf.host, self.conf.port);
        opts.set_keep_alive(Duration::from_secs(15));
        let (client, mut eventloop) = AsyncClient::new(opts, 32);

        // First connect. An error before the first ConnAck is surfaced
        // as a startup failure; after this point the event loop
        // reconnects on its own.
        loop {
            match eventloop.poll().await {
                Ok(Event::Incoming(Incoming::ConnAck(_))) => break,
                Ok(_) => {}
                Err(e) => {
                    error!(error = %e, host = %self.conf.host, "first connect to broker failed");
                    return Err(ListenerError::FirstConnect(e));
                }
            }
        }
        info!(host = %self.conf.host, port = self.conf.port, "connected to broker");
        self.status.mark_connected();

        if !self.subscribe_with_retry(&client, &mut eventloop).await? {
            return Ok(());
        }

        loop {
            tokio::select! {
                _ = self.shutdown.changed() => {
                    info!("stats listener stopping");
                    return Ok(());
                }
                event = eventloop.poll() => match event {
                    Ok(Event::Incoming(Incoming::Publish(p))) => {
                        self.handle_publish(&p.topic, &p.payload);
                    }
                    Ok(Event::Incoming(Incoming::ConnAck(_))) => {
                        // Fresh session after a reconnect; the broker
                        // holds no subscription state for us.
                        self.status.mark_connected();
                        if let Err(e) = client.subscribe(STATS_FILTER, QoS::AtLeastOnce).await {
                            warn!(error = %e, "resubscribe after reconnect failed");
                        }
                    }
                    Ok(_) => {}
                    Err(e) => {
                        warn!(error = %e, "transport error, backing off");
                        self.status.mark_reconnecting();
                        let pause = self.policy.initial;
                        tokio::select! {
                            _ = self.shutdown.changed() => return Ok(()),
                            _ = tokio::time::sleep(pause) => {}
                        }
                    }
                }
            }
        }
    }

    /// Subscribes to the stats filter, retrying transient failures per
    /// the policy. Returns Ok(false) if shutdown arrived mid-retry.
    async fn subscribe_with_retry(
        &mut self,
        client: &AsyncClient,
        eventloop: &mut EventLoop,
    ) -> Result<bool, ListenerError> {
        let mut attempt = 0u32;
        loop {
            // A request-channel failure means the client itself is
            // gone; that is permanent, not a broker hiccup.
            client.subscribe(STATS_FILTER, QoS::AtLeastOnce).await?;

            match self.wait_for_suback(eventloop).await? {
                SubackOutcome::Acked => {
                    info!(filter = STATS_FILTER, "subscribed to robot stats");
                    if let Some(tx) = self.ready.take() {
                        let _ = tx.send(());
                    }
                    return Ok(true);
                }
                SubackOutcome::TransportError => {
                    let Some(delay) = self.policy.delay(attempt) else {
                        return Err(ListenerError::RetriesExhausted);
                    };
                    attempt += 1;
                    warn!(attempt, ?delay, "subscribe not acknowledged, retrying");
                    self.status.mark_reconnecting();
                    tokio::select! {
                        _ = self.shutdown.changed() => return Ok(false),
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }
    }

    async fn wait_for_suback(
        &self,
        eventloop: &mut EventLoop,
    ) -> Result<SubackOutcome, ListenerError> {
        loop {
            match eventloop.poll().await {
                Ok(Event::Incoming(Incoming::SubAck(ack))) => {
                    if ack
                        .return_codes
                        .iter()
                        .any(|c| matches!(c, SubscribeReasonCode::Failure))
                    {
                        // The broker refused the filter outright; no
                        // amount of retrying fixes that.
                        return Err(ListenerError::FilterRejected(STATS_FILTER.to_string()));
                    }
                    return Ok(SubackOutcome::Acked);
                }
                Ok(Event::Incoming(Incoming::Publish(p))) => {
                    // Retained or early messages may arrive first.
                    self.handle_publish(&p.topic, &p.payload);
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(error = %e, "transport error while awaiting suback");
                    return Ok(SubackOutcome::TransportError);
                }
            }
        }
    }

    /// Decode + observe; the only work done on the delivery path. A
    /// bad report is logged and dropped, it never affects the
    /// subscription or other teams' series.
    fn handle_publish(&self, topic: &str, payload: &[u8]) {
        match telemetry::decode(topic, payload) {
            Ok((team, stats)) => {
                debug!(team = %team, "stats report");
                self.metrics.observe(&team, &stats);
            }
            Err(e) => warn!(topic = %topic, error = %e, "dropping bad stats report"),
        }
    }
}

enum SubackOutcome {
    Acked,
    TransportError,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::TelemetryReport;

    fn report() -> TelemetryReport {
        TelemetryReport {
            rssi: 70,
            vbat: 1100,
            watchdog_remaining: 400,
            watchdog_ok: true,
            pwr_board: true,
            pwr_pico: true,
            pwr_gpio: true,
            pwr_main_a: true,
            pwr_main_b: true,
        }
    }

    fn listener(metrics: Arc<RobotMetrics>) -> StatsListener {
        let (_tx, rx) = watch::channel(false);
        StatsListener::new(
            MqttConf { host: "localhost".into(), port: 1883 },
            metrics,
            rx,
        )
    }

    fn team_count(metrics: &RobotMetrics) -> usize {
        let mut teams: Vec<String> = metrics
            .gather()
            .iter()
            .flat_map(|f| f.get_metric())
            .flat_map(|s| s.get_label())
            .filter(|l| l.get_name() == "team")
            .map(|l| l.get_value().to_string())
            .collect();
        teams.sort();
        teams.dedup();
        teams.len()
    }

    #[tokio::test]
    async fn bad_broker_address_is_a_startup_error() {
        let metrics = Arc::new(RobotMetrics::new().unwrap());
        let (_tx, rx) = watch::channel(false);
        let l = StatsListener::new(MqttConf { host: "  ".into(), port: 1883 }, metrics, rx);
        assert!(matches!(l.run().await, Err(ListenerError::BadBroker(_))));
    }

    #[test]
    fn valid_messages_survive_a_malformed_one() {
        let metrics = Arc::new(RobotMetrics::new().unwrap());
        let l = listener(metrics.clone());

        let good = serde_json::to_vec(&serde_json::json!({
            "RSSI": 70, "VBat": 1100, "WatchdogRemaining": 400, "WatchdogOK": true,
            "PwrBoard": true, "PwrPico": true, "PwrGPIO": true,
            "PwrMainA": true, "PwrMainB": true
        }))
        .unwrap();

        l.handle_publish("robot/10/stats", &good);
        l.handle_publish("robot/666/stats", &good[..good.len() / 2]);
        l.handle_publish("robot/20/stats", &good);

        // Exactly the two valid reports landed; the truncated one left
        // nothing behind for team 666.
        assert_eq!(team_count(&metrics), 2);
    }

    #[test]
    fn handle_publish_is_last_write_wins() {
        let metrics = Arc::new(RobotMetrics::new().unwrap());
        let l = listener(metrics.clone());
        metrics.observe("10", &report());
        l.handle_publish("robot/10/stats", b"not json at all");
        // The bad payload must not disturb the existing series.
        assert_eq!(team_count(&metrics), 1);
    }

    #[test]
    fn ready_signal_fires_once() {
        let metrics = Arc::new(RobotMetrics::new().unwrap());
        let (tx, mut rx) = oneshot::channel();
        let mut l = listener(metrics).on_ready(tx);

        let first = l.ready.take();
        assert!(first.is_some());
        first.unwrap().send(()).unwrap();
        assert!(rx.try_recv().is_ok());

        // Taken once; a reconnect has nothing left to fire.
        assert!(l.ready.take().is_none());
    }
}
