use crate::controller::Channel;

/// Topic layout for one device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topics {
    device_id: String,
}

impl Topics {
    pub fn new(device_id: impl Into<String>) -> Self {
        Self {
            device_id: device_id.into(),
        }
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    pub fn device_name(&self) -> String {
        format!("/devices/{}/meta/name", self.device_id)
    }

    pub fn control(&self, channel: Channel) -> String {
        format!("/devices/{}/controls/{}", self.device_id, channel.id())
    }

    pub fn control_type(&self, channel: Channel) -> String {
        format!("{}/meta/type", self.control(channel))
    }

    pub fn control_error(&self, channel: Channel) -> String {
        format!("{}/meta/error", self.control(channel))
    }
}
