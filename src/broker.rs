use std::time::Duration;

use anyhow::Context;
use rumqttc::{AsyncClient, ConnectionError, Event, EventLoop, MqttOptions, Packet, QoS};

pub use rumqttc::ConnectReturnCode;

use crate::config::Settings;

/// Capacity of the client request queue between the handle and its event loop.
pub const REQUEST_CAPACITY: usize = 10;

#[derive(Debug, Clone, PartialEq)]
pub enum BrokerEvent {
    ConnAck(ConnectReturnCode),
    Message { topic: String, payload: Vec<u8> },
    Disconnected(String),
}

/// A broker session handle.
///
/// Events are only ever produced from inside [`BrokerClient::poll`], on the
/// caller's task. Implementations must not deliver them from anywhere else.
#[allow(async_fn_in_trait)]
pub trait BrokerClient {
    fn subscribe(&mut self, topic: &str) -> Result<(), anyhow::Error>;

    fn publish(&mut self, topic: &str, payload: &str) -> Result<(), anyhow::Error>;

    /// Drains pending broker events for at most `timeout`.
    async fn poll(&mut self, timeout: Duration) -> Vec<BrokerEvent>;
}

pub struct MqttClient {
    client: AsyncClient,
    eventloop: EventLoop,
    session_up: bool,
}

impl MqttClient {
    /// Builds the handle. The network connection is made lazily by the first poll.
    pub fn connect(settings: &Settings) -> MqttClient {
        let mut options = MqttOptions::new(&settings.client_id, &settings.host, settings.port);
        options.set_keep_alive(settings.keep_alive);

        let (client, eventloop) = AsyncClient::new(options, REQUEST_CAPACITY);
        log::info!(
            "Connecting to {}:{} as {}",
            settings.host,
            settings.port,
            settings.client_id
        );

        MqttClient {
            client,
            eventloop,
            session_up: false,
        }
    }
}

impl BrokerClient for MqttClient {
    fn subscribe(&mut self, topic: &str) -> Result<(), anyhow::Error> {
        self.client
            .try_subscribe(topic, QoS::AtMostOnce)
            .with_context(|| format!("Failed to subscribe to {topic}"))
    }

    fn publish(&mut self, topic: &str, payload: &str) -> Result<(), anyhow::Error> {
        self.client
            .try_publish(topic, QoS::AtMostOnce, false, payload.as_bytes().to_vec())
            .with_context(|| format!("Failed to publish to {topic}"))
    }

    async fn poll(&mut self, timeout: Duration) -> Vec<BrokerEvent> {
        let deadline = tokio::time::Instant::now() + timeout;
        let mut events = Vec::new();

        loop {
            let polled = if self.session_up {
                match tokio::time::timeout_at(deadline, self.eventloop.poll()).await {
                    Ok(polled) => polled,
                    Err(_) => break,
                }
            } else {
                // Until CONNACK the poll owns the TCP connect and CONNECT
                // exchange; dropping it would throw the attempt away. The
                // client's connection timeout bounds this await.
                self.eventloop.poll().await
            };

            match polled {
                Ok(event) => {
                    if let Some(event) = translate(event) {
                        if let BrokerEvent::ConnAck(code) = &event {
                            self.session_up = *code == ConnectReturnCode::Success;
                        }
                        events.push(event);
                    }
                }
                Err(ConnectionError::ConnectionRefused(code)) => {
                    self.session_up = false;
                    events.push(BrokerEvent::ConnAck(code));
                    break;
                }
                // The next poll reconnects, so stop here rather than spin on
                // a dead socket until the deadline.
                Err(e) => {
                    self.session_up = false;
                    events.push(BrokerEvent::Disconnected(e.to_string()));
                    break;
                }
            }
        }

        events
    }
}

fn translate(event: Event) -> Option<BrokerEvent> {
    match event {
        Event::Incoming(Packet::ConnAck(ack)) => Some(BrokerEvent::ConnAck(ack.code)),
        Event::Incoming(Packet::Publish(publish)) => Some(BrokerEvent::Message {
            topic: publish.topic,
            payload: publish.payload.to_vec(),
        }),
        _ => None,
    }
}

#[cfg(test)]
pub mod testing {
    use std::collections::VecDeque;
    use std::time::Duration;

    use super::{BrokerClient, BrokerEvent};

    /// In-memory broker handle that replays queued events one poll at a time.
    #[derive(Debug, Default)]
    pub struct FakeBroker {
        pub id: usize,
        pub pending: VecDeque<Vec<BrokerEvent>>,
        pub subscriptions: Vec<String>,
        pub published: Vec<(String, String)>,
        pub polls: usize,
        pub fail_publish: bool,
    }

    impl FakeBroker {
        pub fn with_id(id: usize) -> Self {
            Self {
                id,
                ..Self::default()
            }
        }

        pub fn push(&mut self, events: Vec<BrokerEvent>) {
            self.pending.push_back(events);
        }
    }

    impl BrokerClient for FakeBroker {
        fn subscribe(&mut self, topic: &str) -> Result<(), anyhow::Error> {
            self.subscriptions.push(topic.to_string());
            Ok(())
        }

        fn publish(&mut self, topic: &str, payload: &str) -> Result<(), anyhow::Error> {
            if self.fail_publish {
                anyhow::bail!("request queue full");
            }
            self.published.push((topic.to_string(), payload.to_string()));
            Ok(())
        }

        async fn poll(&mut self, _timeout: Duration) -> Vec<BrokerEvent> {
            self.polls += 1;
            self.pending.pop_front().unwrap_or_default()
        }
    }
}
