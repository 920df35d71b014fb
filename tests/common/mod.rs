//! In-memory transport used by the lifecycle tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use sparkplug_client::error::Result;
use sparkplug_client::{ConnectOptions, QoS, Transport, TransportEvent, Will};
use tokio::sync::mpsc;

/// One frame captured from a publish call.
#[derive(Debug, Clone)]
pub struct PublishedFrame {
    pub topic: String,
    pub payload: Vec<u8>,
    pub qos: QoS,
    pub retain: bool,
}

#[derive(Default)]
struct MockState {
    published: Vec<PublishedFrame>,
    subscriptions: Vec<String>,
    wills: Vec<Will>,
    connects: usize,
    sender: Option<mpsc::Sender<TransportEvent>>,
}

/// Shared handle for inspecting and driving the in-memory broker side.
#[derive(Clone, Default)]
pub struct MockBroker {
    state: Arc<Mutex<MockState>>,
}

impl MockBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// A transport wired to this broker.
    pub fn transport(&self) -> Box<dyn Transport> {
        Box::new(MockTransport {
            broker: self.clone(),
        })
    }

    /// Every frame published so far, in order.
    pub fn published(&self) -> Vec<PublishedFrame> {
        self.state.lock().unwrap().published.clone()
    }

    /// Active subscription filters.
    pub fn subscriptions(&self) -> Vec<String> {
        self.state.lock().unwrap().subscriptions.clone()
    }

    /// Every will registered at connect time, in session order.
    pub fn wills(&self) -> Vec<Will> {
        self.state.lock().unwrap().wills.clone()
    }

    /// Number of sessions opened.
    pub fn connect_count(&self) -> usize {
        self.state.lock().unwrap().connects
    }

    /// Delivers a message into the current session.
    pub async fn inject(&self, topic: &str, payload: Vec<u8>) {
        let sender = self.state.lock().unwrap().sender.clone();
        let sender = sender.expect("no active session");
        sender
            .send(TransportEvent::Message {
                topic: topic.to_string(),
                payload,
            })
            .await
            .expect("session event channel closed");
    }

    /// Simulates a broker-side failure ending the session.
    pub async fn fail(&self, details: &str) {
        let sender = self.state.lock().unwrap().sender.clone();
        let sender = sender.expect("no active session");
        let _ = sender
            .send(TransportEvent::Error(details.to_string()))
            .await;
        let _ = sender.send(TransportEvent::Closed).await;
    }
}

struct MockTransport {
    broker: MockBroker,
}

#[async_trait]
impl Transport for MockTransport {
    async fn connect(
        &mut self,
        options: ConnectOptions,
    ) -> Result<mpsc::Receiver<TransportEvent>> {
        let (tx, rx) = mpsc::channel(64);
        let mut state = self.broker.state.lock().unwrap();
        state.connects += 1;
        if let Some(will) = options.will {
            state.wills.push(will);
        }
        state.sender = Some(tx);
        Ok(rx)
    }

    async fn publish(&self, topic: &str, payload: Vec<u8>, qos: QoS, retain: bool) -> Result<()> {
        self.broker
            .state
            .lock()
            .unwrap()
            .published
            .push(PublishedFrame {
                topic: topic.to_string(),
                payload,
                qos,
                retain,
            });
        Ok(())
    }

    async fn subscribe(&self, filter: &str, _qos: QoS) -> Result<()> {
        self.broker
            .state
            .lock()
            .unwrap()
            .subscriptions
            .push(filter.to_string());
        Ok(())
    }

    async fn unsubscribe(&self, filter: &str) -> Result<()> {
        self.broker
            .state
            .lock()
            .unwrap()
            .subscriptions
            .retain(|f| f != filter);
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<()> {
        self.broker.state.lock().unwrap().sender = None;
        Ok(())
    }
}
