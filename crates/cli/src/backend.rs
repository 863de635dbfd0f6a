// Backend selection (DI wiring)

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;

use crate::settings::{BackendKind, Settings};
use blackbox_core::port::DeviceBackend;
use blackbox_core::Session;
use blackbox_infra_emu::EmulatorBackend;
use blackbox_infra_usb::UsbBackend;

/// The opened device, keeping the concrete emulator reachable for preview
pub enum Backend {
    Usb(Arc<UsbBackend>),
    Emulator(Arc<EmulatorBackend>),
}

impl Backend {
    pub fn open(settings: &Settings) -> Result<Self> {
        match settings.backend {
            BackendKind::Usb => {
                let usb = UsbBackend::open(settings.usb.clone())
                    .context("Failed to open BlackBox USB device")?;
                Ok(Backend::Usb(Arc::new(usb)))
            }
            BackendKind::Emulator => {
                info!(ms_per_frame = settings.emulator.ms_per_frame, "Using emulator");
                Ok(Backend::Emulator(Arc::new(EmulatorBackend::new(
                    settings.emulator,
                ))))
            }
        }
    }

    pub fn device(&self) -> Arc<dyn DeviceBackend> {
        match self {
            Backend::Usb(usb) => usb.clone(),
            Backend::Emulator(emu) => emu.clone(),
        }
    }

    pub fn emulator(&self) -> Option<&Arc<EmulatorBackend>> {
        match self {
            Backend::Emulator(emu) => Some(emu),
            Backend::Usb(_) => None,
        }
    }

    /// Open a session on this backend
    pub async fn session(&self) -> Result<Session> {
        Session::open(self.device())
            .await
            .context("Failed to start BlackBox session")
    }
}
