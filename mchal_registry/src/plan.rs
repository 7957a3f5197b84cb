//! The compile-time resource plan the registry is built from.

/// One pin's static capabilities, as laid out on the board.
#[derive(Debug, Clone)]
pub struct PinPlan {
    /// The pin number.
    pub number: u32,
    /// `Some((slice, channel))` if this pin is wired to a PWM slice
    /// channel (0 or 1); `None` if the pin has no PWM capability.
    pub pwm: Option<(u32, u8)>,
}

/// The board's static resource plan: which pins exist and their PWM
/// wiring, which I2C buses exist, and which UART ports exist. Loaded
/// once at startup (board/pin maps are explicitly out of scope for
/// dynamic discovery — see the Non-goals) and handed to
/// [`crate::Registry::new`].
#[derive(Debug, Clone, Default)]
pub struct ResourcePlan {
    /// Every pin the board exposes.
    pub pins: Vec<PinPlan>,
    /// Every I2C bus id the board exposes.
    pub i2c_buses: Vec<u32>,
    /// Every UART port id the board exposes.
    pub uart_ports: Vec<u32>,
}

impl ResourcePlan {
    /// A plan with numbered pins `0..pin_count`, one I2C bus (id 0), and
    /// one UART port (id 0) — convenient for tests and the simulated
    /// demo devices.
    pub fn simple(pin_count: u32) -> Self {
        ResourcePlan {
            pins: (0..pin_count).map(|n| PinPlan { number: n, pwm: None }).collect(),
            i2c_buses: vec![0],
            uart_ports: vec![0],
        }
    }

    /// Mark a pin as wired to the given PWM slice/channel.
    pub fn with_pwm(mut self, pin: u32, slice: u32, channel: u8) -> Self {
        if let Some(p) = self.pins.iter_mut().find(|p| p.number == pin) {
            p.pwm = Some((slice, channel));
        }
        self
    }
}
