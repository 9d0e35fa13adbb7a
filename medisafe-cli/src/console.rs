use medisafe_flow::{Notification, NotificationLevel, Notifier};

/// Prints notifications to stderr so they don't mix with rendered views
pub struct ConsoleNotifier;

impl ConsoleNotifier {
    pub fn format(notification: &Notification) -> String {
        let marker = match notification.level {
            NotificationLevel::Success => "ok",
            NotificationLevel::Error => "error",
        };
        match &notification.description {
            Some(description) => format!("[{}] {} - {}", marker, notification.title, description),
            None => format!("[{}] {}", marker, notification.title),
        }
    }
}

impl Notifier for ConsoleNotifier {
    fn notify(&self, notification: Notification) {
        eprintln!("{}", Self::format(&notification));
    }
}
