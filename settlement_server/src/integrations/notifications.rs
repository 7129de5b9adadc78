use log::*;
use settlement_engine::events::{EventHooks, NotificationEvent};

/// Hooks that deliver participant notifications. With a webhook URL, each notification is POSTed there as JSON;
/// otherwise it is only logged. Delivery failures are logged and never retried.
pub fn notification_hooks(url: Option<String>) -> EventHooks {
    let mut hooks = EventHooks::default();
    let client = reqwest::Client::new();
    hooks.on_notification(move |ev: NotificationEvent| {
        let url = url.clone();
        let client = client.clone();
        Box::pin(async move {
            let Some(url) = url else {
                info!(
                    "📬️ Notification {:?} for {} (order {}): {}",
                    ev.kind,
                    ev.recipient,
                    ev.order_id.as_ref().map(|o| o.as_str()).unwrap_or("-"),
                    ev.payload
                );
                return;
            };
            match client.post(&url).json(&ev).send().await {
                Ok(res) if res.status().is_success() => {
                    debug!("📬️ Delivered {:?} notification to {}", ev.kind, ev.recipient);
                },
                Ok(res) => warn!("📬️ Notification webhook rejected {:?} for {}: {}", ev.kind, ev.recipient, res.status()),
                Err(e) => warn!("📬️ Could not deliver {:?} notification to {}: {e}", ev.kind, ev.recipient),
            }
        })
    });
    hooks
}
