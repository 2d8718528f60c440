//! Output device catalog
//!
//! Holds the most recent device enumeration. The snapshot is rebuilt on every
//! refresh and is what index-based selection resolves against.

use crate::audio::backend::{DeviceId, DeviceIdentity};
use crate::audio::context::AudioContext;
use crate::error::Result;
use tracing::{debug, warn};

/// Snapshot of playback devices, default device first.
#[derive(Debug, Default)]
pub struct DeviceCatalog {
    snapshot: Vec<DeviceIdentity>,
}

impl DeviceCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Re-enumerate devices and replace the snapshot.
    ///
    /// Default-flagged devices are moved to the front; the relative order of
    /// all other devices is the order the backend reported.
    ///
    /// # Errors
    /// `Error::DeviceQuery` if the backend cannot enumerate. The previous
    /// snapshot is kept in that case.
    pub fn refresh(&mut self, context: &AudioContext) -> Result<&[DeviceIdentity]> {
        let mut devices = context.output_devices()?;
        // sort_by_key is stable
        devices.sort_by_key(|device| !device.is_default);

        debug!("Device catalog refreshed: {} devices", devices.len());
        self.snapshot = devices;
        Ok(&self.snapshot)
    }

    /// Devices from the most recent refresh
    pub fn devices(&self) -> &[DeviceIdentity] {
        &self.snapshot
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot.is_empty()
    }

    pub fn len(&self) -> usize {
        self.snapshot.len()
    }

    pub fn first(&self) -> Option<&DeviceIdentity> {
        self.snapshot.first()
    }

    /// Resolve a list index to a device.
    ///
    /// Out-of-range indices fall back to index 0 with a warning. Returns None
    /// only when the snapshot is empty.
    pub fn resolve_index(&self, index: usize) -> Option<&DeviceIdentity> {
        if self.snapshot.is_empty() {
            return None;
        }
        if index >= self.snapshot.len() {
            warn!("Device index {} is out of range. Falling back to 0.", index);
            return self.snapshot.first();
        }
        self.snapshot.get(index)
    }

    /// Look up a device by identifier.
    pub fn get(&self, id: &DeviceId) -> Option<&DeviceIdentity> {
        self.snapshot.iter().find(|device| &device.id == id)
    }

    pub fn contains(&self, id: &DeviceId) -> bool {
        self.get(id).is_some()
    }

    /// Find a device by display name (case-insensitive).
    pub fn find_by_name(&self, name: &str) -> Option<&DeviceIdentity> {
        self.snapshot
            .iter()
            .find(|device| device.name.eq_ignore_ascii_case(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::backend::{
        AudioBackend, ErrorCallback, OpenedStream, RenderCallback, StreamRequest,
    };
    use crate::error::Error;

    /// Backend that can only enumerate; None simulates an enumeration failure
    struct ListOnlyBackend {
        devices: Option<Vec<DeviceIdentity>>,
    }

    impl AudioBackend for ListOnlyBackend {
        fn name(&self) -> &str {
            "list-only"
        }

        fn output_devices(&self) -> Result<Vec<DeviceIdentity>> {
            self.devices
                .clone()
                .ok_or_else(|| Error::DeviceQuery("host went away".to_string()))
        }

        fn open_output_stream(
            &self,
            _device: &DeviceId,
            _request: &StreamRequest,
            _render: RenderCallback,
            _on_error: ErrorCallback,
        ) -> Result<OpenedStream> {
            Err(Error::DeviceOpen("not supported".to_string()))
        }
    }

    fn device(name: &str, is_default: bool) -> DeviceIdentity {
        DeviceIdentity {
            id: DeviceId::new(name),
            name: name.to_string(),
            is_default,
        }
    }

    fn context(devices: Vec<DeviceIdentity>) -> AudioContext {
        AudioContext::with_backend(Box::new(ListOnlyBackend { devices: Some(devices) }))
    }

    #[test]
    fn test_default_device_sorted_first() {
        let ctx = context(vec![device("dev0", false), device("dev1", true)]);
        let mut catalog = DeviceCatalog::new();

        let names: Vec<_> = catalog
            .refresh(&ctx)
            .unwrap()
            .iter()
            .map(|d| d.name.clone())
            .collect();

        assert_eq!(names, vec!["dev1", "dev0"]);
    }

    #[test]
    fn test_order_is_stable_without_default() {
        let ctx = context(vec![device("c", false), device("a", false), device("b", false)]);
        let mut catalog = DeviceCatalog::new();

        let first: Vec<_> = catalog.refresh(&ctx).unwrap().to_vec();
        let second: Vec<_> = catalog.refresh(&ctx).unwrap().to_vec();

        assert_eq!(first, second);
        assert_eq!(first[0].name, "c");
        assert_eq!(first[2].name, "b");
    }

    #[test]
    fn test_resolve_index_clamps_to_zero() {
        let ctx = context(vec![device("a", false), device("b", true)]);
        let mut catalog = DeviceCatalog::new();
        catalog.refresh(&ctx).unwrap();

        assert_eq!(catalog.resolve_index(1).unwrap().name, "a");
        assert_eq!(catalog.resolve_index(2), catalog.resolve_index(0));
        assert_eq!(catalog.resolve_index(usize::MAX).unwrap().name, "b");
    }

    #[test]
    fn test_resolve_index_on_empty_catalog() {
        let catalog = DeviceCatalog::new();
        assert!(catalog.resolve_index(0).is_none());
    }

    #[test]
    fn test_failed_refresh_keeps_previous_snapshot() {
        let ctx = context(vec![device("a", true)]);
        let mut catalog = DeviceCatalog::new();
        catalog.refresh(&ctx).unwrap();

        let failing_ctx = AudioContext::with_backend(Box::new(ListOnlyBackend { devices: None }));

        let err = catalog.refresh(&failing_ctx).unwrap_err();
        assert!(err.is_fatal());
        assert_eq!(catalog.len(), 1);
    }

    #[test]
    fn test_find_by_name_and_contains() {
        let ctx = context(vec![device("Speakers", true), device("USB DAC", false)]);
        let mut catalog = DeviceCatalog::new();
        catalog.refresh(&ctx).unwrap();

        assert_eq!(catalog.find_by_name("usb dac").unwrap().id, DeviceId::new("USB DAC"));
        assert!(catalog.contains(&DeviceId::new("Speakers")));
        assert!(!catalog.contains(&DeviceId::new("HDMI")));
    }
}
