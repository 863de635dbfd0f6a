// BlackBox Infrastructure - USB Adapter
// Implements: DeviceBackend over libusb

pub mod usb_backend;

pub use usb_backend::{UsbBackend, UsbConfig};
