use std::{future::Future, pin::Pin, sync::Arc};

use log::*;

use crate::events::{
    EventHandler,
    EventProducer,
    EventType,
    Handler,
    NotificationEvent,
    OrderStatusChangedEvent,
    RevenueRecognizedEvent,
};

type BoxedFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

/// Producer handles for every registered hook. Cloned into each API object that publishes events.
#[derive(Default, Clone)]
pub struct EventProducers {
    pub status_changed_producer: Vec<EventProducer<OrderStatusChangedEvent>>,
    pub revenue_recognized_producer: Vec<EventProducer<RevenueRecognizedEvent>>,
    pub notification_producer: Vec<EventProducer<NotificationEvent>>,
}

impl EventProducers {
    pub async fn publish(&self, event: EventType) {
        match event {
            EventType::OrderStatusChanged(ev) => {
                for producer in &self.status_changed_producer {
                    producer.publish_event(ev.clone()).await;
                }
            },
            EventType::RevenueRecognized(ev) => {
                for producer in &self.revenue_recognized_producer {
                    producer.publish_event(ev.clone()).await;
                }
            },
            EventType::Notification(ev) => {
                trace!("📬️ Notification {:?} for {}", ev.kind, ev.recipient);
                for producer in &self.notification_producer {
                    producer.publish_event(ev.clone()).await;
                }
            },
        }
    }
}

pub struct EventHandlers {
    pub on_status_changed: Option<EventHandler<OrderStatusChangedEvent>>,
    pub on_revenue_recognized: Option<EventHandler<RevenueRecognizedEvent>>,
    pub on_notification: Option<EventHandler<NotificationEvent>>,
}

impl EventHandlers {
    pub fn new(buffer_size: usize, hooks: EventHooks) -> Self {
        let on_status_changed = hooks.on_status_changed.map(|f| EventHandler::new(buffer_size, f));
        let on_revenue_recognized = hooks.on_revenue_recognized.map(|f| EventHandler::new(buffer_size, f));
        let on_notification = hooks.on_notification.map(|f| EventHandler::new(buffer_size, f));
        Self { on_status_changed, on_revenue_recognized, on_notification }
    }

    pub fn producers(&self) -> EventProducers {
        let mut result = EventProducers::default();
        if let Some(handler) = &self.on_status_changed {
            result.status_changed_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_revenue_recognized {
            result.revenue_recognized_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_notification {
            result.notification_producer.push(handler.subscribe());
        }
        result
    }

    pub async fn start_handlers(self) {
        if let Some(handler) = self.on_status_changed {
            tokio::spawn(handler.start_handler());
        }
        if let Some(handler) = self.on_revenue_recognized {
            tokio::spawn(handler.start_handler());
        }
        if let Some(handler) = self.on_notification {
            tokio::spawn(handler.start_handler());
        }
    }
}

#[derive(Default, Clone)]
pub struct EventHooks {
    pub on_status_changed: Option<Handler<OrderStatusChangedEvent>>,
    pub on_revenue_recognized: Option<Handler<RevenueRecognizedEvent>>,
    pub on_notification: Option<Handler<NotificationEvent>>,
}

impl EventHooks {
    pub fn on_status_changed<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(OrderStatusChangedEvent) -> BoxedFuture) + Send + Sync + 'static {
        self.on_status_changed = Some(Arc::new(f));
        self
    }

    pub fn on_revenue_recognized<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(RevenueRecognizedEvent) -> BoxedFuture) + Send + Sync + 'static {
        self.on_revenue_recognized = Some(Arc::new(f));
        self
    }

    pub fn on_notification<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(NotificationEvent) -> BoxedFuture) + Send + Sync + 'static {
        self.on_notification = Some(Arc::new(f));
        self
    }
}
