//! Port-mapped I/O bus.
//!
//! Devices live in an arena and are addressed by generational handles, so a
//! handle kept after `disconnect` can never reach whatever later reuses the
//! slot. Each port access is offered to every device in connection order.

use tracing::trace;

use crate::devices::{Device, PortContext};

/// Identifies one connected device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceHandle {
    index: usize,
    generation: u32,
}

#[derive(Debug, Clone)]
struct Slot {
    generation: u32,
    device: Option<Device>,
}

#[derive(Debug, Clone, Default)]
pub struct IoBus {
    slots: Vec<Slot>,
}

impl IoBus {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a device. Reuses the first free slot.
    pub fn connect(&mut self, device: Device) -> DeviceHandle {
        trace!(device = device.name(), "connect");
        if let Some(index) = self.slots.iter().position(|s| s.device.is_none()) {
            let slot = &mut self.slots[index];
            slot.generation = slot.generation.wrapping_add(1);
            slot.device = Some(device);
            return DeviceHandle {
                index,
                generation: slot.generation,
            };
        }
        self.slots.push(Slot {
            generation: 0,
            device: Some(device),
        });
        DeviceHandle {
            index: self.slots.len() - 1,
            generation: 0,
        }
    }

    /// Detach a device and hand it back. Unknown or stale handles are a
    /// no-op.
    pub fn disconnect(&mut self, handle: DeviceHandle) -> Option<Device> {
        let slot = self.slots.get_mut(handle.index)?;
        if slot.generation != handle.generation {
            return None;
        }
        let device = slot.device.take();
        if let Some(device) = &device {
            trace!(device = device.name(), "disconnect");
        }
        device
    }

    #[must_use]
    pub fn device(&self, handle: DeviceHandle) -> Option<&Device> {
        self.slots
            .get(handle.index)
            .filter(|s| s.generation == handle.generation)
            .and_then(|s| s.device.as_ref())
    }

    pub fn device_mut(&mut self, handle: DeviceHandle) -> Option<&mut Device> {
        self.slots
            .get_mut(handle.index)
            .filter(|s| s.generation == handle.generation)
            .and_then(|s| s.device.as_mut())
    }

    /// Connected devices in connection order.
    pub fn devices(&self) -> impl Iterator<Item = &Device> {
        self.slots.iter().filter_map(|s| s.device.as_ref())
    }

    pub fn devices_mut(&mut self) -> impl Iterator<Item = &mut Device> {
        self.slots.iter_mut().filter_map(|s| s.device.as_mut())
    }

    /// Read a port. An unclaimed port floats high (`0xFF`); several
    /// claimants pull the bus low together, so their bytes are ANDed.
    #[must_use]
    pub fn read_port(&self, port: u16) -> u8 {
        let value = self
            .devices()
            .filter(|d| d.claims_read(port))
            .fold(0xFF, |acc, d| acc & d.read(port));
        trace!(port = format_args!("{port:#06x}"), value, "in");
        value
    }

    /// Offer a write to every device that decodes `port`.
    pub fn write_port(&mut self, port: u16, value: u8, ctx: &mut PortContext<'_>) {
        trace!(port = format_args!("{port:#06x}"), value, "out");
        for device in self.devices_mut() {
            if device.claims_write(port) {
                device.write(port, value, ctx);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SpectrumModel;
    use crate::devices::{
        Fuller, JoystickState, Kempston, KempstonMouse, Keyboard, Key, MouseButtons, Ula,
    };
    use crate::display::NullDisplay;
    use crate::memory::AddressSpace;
    use crate::paging::PagingController;

    #[test]
    fn unclaimed_port_reads_ff() {
        let bus = IoBus::new();
        assert_eq!(bus.read_port(0x1234), 0xFF);
    }

    #[test]
    fn claimants_are_anded() {
        let mut bus = IoBus::new();
        let mut kbd = Keyboard::new();
        kbd.press(Key::A);
        bus.connect(Device::Keyboard(kbd));
        bus.connect(Device::Ula(Ula::new()));
        // Keyboard clears bit 0, ULA clears bit 6 (EAR low).
        assert_eq!(bus.read_port(0xFDFE), 0xBE);
    }

    #[test]
    fn disconnect_returns_device_and_invalidates_handle() {
        let mut bus = IoBus::new();
        let stick = Kempston {
            state: JoystickState::FIRE,
        };
        let handle = bus.connect(Device::Kempston(stick));
        assert_eq!(bus.read_port(0x001F), 0x10);

        assert_eq!(bus.disconnect(handle), Some(Device::Kempston(stick)));
        assert_eq!(bus.read_port(0x001F), 0xFF);
        assert_eq!(bus.disconnect(handle), None);
        assert!(bus.device(handle).is_none());
    }

    #[test]
    fn mouse_leaves_kempston_joystick_alone() {
        let mut bus = IoBus::new();
        bus.connect(Device::Kempston(Kempston {
            state: JoystickState::UP,
        }));
        bus.connect(Device::Mouse(KempstonMouse {
            x: 0x40,
            y: 0x20,
            buttons: MouseButtons::LEFT | MouseButtons::RIGHT,
        }));
        assert_eq!(bus.read_port(0x001F), 0x08);
        assert_eq!(bus.read_port(0xFADF), 0xFC);
        assert_eq!(bus.read_port(0xFBDF), 0x40);
    }

    #[test]
    fn stale_handle_does_not_reach_reused_slot() {
        let mut bus = IoBus::new();
        let old = bus.connect(Device::Kempston(Kempston::default()));
        bus.disconnect(old);
        let new = bus.connect(Device::Fuller(Fuller::default()));
        assert_ne!(old, new);
        assert!(bus.device(old).is_none());
        assert!(bus.disconnect(old).is_none());
        assert!(matches!(bus.device(new), Some(Device::Fuller(_))));
    }

    #[test]
    fn device_mut_updates_state() {
        let mut bus = IoBus::new();
        let handle = bus.connect(Device::Kempston(Kempston::default()));
        if let Some(Device::Kempston(stick)) = bus.device_mut(handle) {
            stick.state = JoystickState::LEFT;
        }
        assert_eq!(bus.read_port(0x001F), 0x02);
    }

    #[test]
    fn writes_reach_paging_and_ula() {
        let mut bus = IoBus::new();
        let ula = bus.connect(Device::Ula(Ula::new()));
        let model = SpectrumModel::Spectrum128K;
        bus.connect(Device::Paging(
            PagingController::for_model(model).expect("banked"),
        ));
        let mut memory = AddressSpace::new(model);
        let mut display = NullDisplay;
        let mut ctx = PortContext {
            memory: &mut memory,
            display: &mut display,
        };

        bus.write_port(0x7FFD, 0x04, &mut ctx);
        bus.write_port(0x00FE, 0x03, &mut ctx);

        assert_eq!(memory.paging().map(|p| p.ram_bank), Some(4));
        assert!(matches!(bus.device(ula), Some(Device::Ula(u)) if u.border() == 3));
    }
}
