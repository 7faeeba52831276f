use tracing::info;

use crate::controller::Channel;
use crate::publisher::{PublishOptions, Publisher};
use crate::topics::Topics;

/// Publishes the retained device description: its name and each control's type.
pub fn announce_device(publisher: &mut impl Publisher, topics: &Topics, name: &str) {
    info!(device = topics.device_id(), name, "Announcing device");
    publisher.publish(&topics.device_name(), name, PublishOptions::RETAINED);
    for channel in Channel::ALL {
        publisher.publish(
            &topics.control_type(channel),
            channel.kind(),
            PublishOptions::RETAINED,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::publisher::Publication;

    #[test]
    fn announces_name_and_control_types() {
        let mut publications: Vec<Publication> = Vec::new();
        announce_device(&mut publications, &Topics::new("am2320"), "AM232x sensor");

        let sent: Vec<(&str, &str)> = publications
            .iter()
            .map(|p| (p.topic.as_str(), p.payload.as_str()))
            .collect();
        assert_eq!(
            sent,
            vec![
                ("/devices/am2320/meta/name", "AM232x sensor"),
                (
                    "/devices/am2320/controls/temperature/meta/type",
                    "temperature"
                ),
                (
                    "/devices/am2320/controls/humidity/meta/type",
                    "rel_humidity"
                ),
            ]
        );
        assert!(publications.iter().all(|p| p.options.retain));
    }
}
