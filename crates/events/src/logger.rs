//! Background subscriber that records events in the tracing log.

use tokio::sync::broadcast;

use crate::bus::PlatformEvent;

/// Logs every event it receives until the bus is dropped.
pub struct EventLogger;

impl EventLogger {
    /// Run the receive loop. Returns the number of events logged.
    pub async fn run(mut receiver: broadcast::Receiver<PlatformEvent>) -> u64 {
        let mut logged = 0;
        loop {
            match receiver.recv().await {
                Ok(event) => {
                    Self::log(&event);
                    logged += 1;
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Event logger lagged, some events were not logged");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::info!(logged, "Event bus closed, event logger stopping");
                    return logged;
                }
            }
        }
    }

    fn log(event: &PlatformEvent) {
        let (kind, id) = event
            .subject
            .map(|s| (Some(s.kind), Some(s.id)))
            .unwrap_or((None, None));
        tracing::info!(
            event = event.name,
            subject_kind = kind,
            subject_id = id,
            actor_id = event.actor_id,
            data = %event.data,
            "Platform event"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::EventBus;
    use crate::names;

    #[tokio::test]
    async fn stops_when_bus_is_dropped() {
        let bus = EventBus::default();
        let handle = tokio::spawn(EventLogger::run(bus.subscribe()));

        bus.publish(PlatformEvent::new(names::SKILL_CREATED).about("skill", 1));
        bus.publish(PlatformEvent::new(names::SKILL_DELETED).about("skill", 1));
        drop(bus);

        assert_eq!(handle.await.unwrap(), 2);
    }
}
