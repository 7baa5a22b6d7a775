//! Button handling: two buttons, each cycling one line's color.
//!
//! "Up" cycles the top line, "down" cycles the bottom line. Palette index 0
//! is the background, so both wrap from the last color back to 1.

use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// Which physical (or virtual) button was pressed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ButtonId {
    Up,
    Down,
}

/// Palette indices for the two text lines.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, utoipa::ToSchema)]
pub struct ColorSelection {
    pub primary: usize,
    pub secondary: usize,
    pub max_index: usize,
}

impl ColorSelection {
    /// Start with the given indices, pulled into `[1, max_index]`.
    pub fn new(primary: usize, secondary: usize, max_index: usize) -> Self {
        let max_index = max_index.max(1);
        Self {
            primary: primary.clamp(1, max_index),
            secondary: secondary.clamp(1, max_index),
            max_index,
        }
    }

    pub fn cycle_primary(&mut self) -> usize {
        self.primary = next_index(self.primary, self.max_index);
        self.primary
    }

    pub fn cycle_secondary(&mut self) -> usize {
        self.secondary = next_index(self.secondary, self.max_index);
        self.secondary
    }

    pub fn press(&mut self, button: ButtonId) -> usize {
        match button {
            ButtonId::Up => self.cycle_primary(),
            ButtonId::Down => self.cycle_secondary(),
        }
    }
}

fn next_index(current: usize, max_index: usize) -> usize {
    if current >= max_index { 1 } else { current + 1 }
}

/// A momentary push button.
pub trait Button {
    /// True while the button is held down.
    fn is_pressed(&mut self) -> bool;
}

/// Active-low GPIO button with the internal pull-up enabled.
#[cfg(feature = "hardware")]
pub struct GpioButton {
    pin: rppal::gpio::InputPin,
}

#[cfg(feature = "hardware")]
impl GpioButton {
    pub fn new(gpio: &rppal::gpio::Gpio, bcm_pin: u8) -> Result<Self, rppal::gpio::Error> {
        let pin = gpio.get(bcm_pin)?.into_input_pullup();
        Ok(Self { pin })
    }
}

#[cfg(feature = "hardware")]
impl Button for GpioButton {
    fn is_pressed(&mut self) -> bool {
        self.pin.is_low()
    }
}

/// Edge handling and debounce for the two buttons.
///
/// After a press, neither button is read again until the hold-off has
/// passed, so one physical press cannot register twice. The hold-off is
/// tracked by time instead of sleeping, which keeps the display moving.
#[derive(Debug)]
pub struct ButtonPoller {
    hold_off: Duration,
    blocked_until: Option<Instant>,
}

impl ButtonPoller {
    pub fn new(hold_off: Duration) -> Self {
        Self {
            hold_off,
            blocked_until: None,
        }
    }

    pub fn is_holding_off(&self, now: Instant) -> bool {
        self.blocked_until.is_some_and(|until| now < until)
    }

    /// Read both buttons, up first. At most one press is handled per poll.
    pub fn poll(
        &mut self,
        now: Instant,
        up: &mut dyn Button,
        down: &mut dyn Button,
        colors: &mut ColorSelection,
    ) -> Option<ButtonId> {
        if self.is_holding_off(now) {
            return None;
        }

        let pressed = if up.is_pressed() {
            ButtonId::Up
        } else if down.is_pressed() {
            ButtonId::Down
        } else {
            return None;
        };

        self.accept(now, pressed, colors);
        Some(pressed)
    }

    /// Apply a press that did not come from the GPIO pins. It still honours
    /// (and restarts) the hold-off. Returns false if it was ignored.
    pub fn virtual_press(
        &mut self,
        now: Instant,
        button: ButtonId,
        colors: &mut ColorSelection,
    ) -> bool {
        if self.is_holding_off(now) {
            return false;
        }
        self.accept(now, button, colors);
        true
    }

    fn accept(&mut self, now: Instant, button: ButtonId, colors: &mut ColorSelection) {
        let index = colors.press(button);
        tracing::info!("{:?} button pressed, color index now {}", button, index);
        self.blocked_until = Some(now + self.hold_off);
    }
}

/// A button that is never pressed, for builds without GPIO.
pub struct NoButton;

impl Button for NoButton {
    fn is_pressed(&mut self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    struct HeldButton(bool);

    impl Button for HeldButton {
        fn is_pressed(&mut self) -> bool {
            self.0
        }
    }

    #[test]
    fn six_presses_with_six_colors_wrap_to_start() {
        let mut colors = ColorSelection::new(1, 1, 6);
        let seen: Vec<usize> = (0..6).map(|_| colors.cycle_primary()).collect();
        assert_eq!(seen, vec![2, 3, 4, 5, 6, 1]);
        assert_eq!(colors.primary, 1);
    }

    #[test]
    fn lines_cycle_independently() {
        let mut colors = ColorSelection::new(1, 2, 7);
        colors.press(ButtonId::Up);
        colors.press(ButtonId::Up);
        colors.press(ButtonId::Down);
        assert_eq!((colors.primary, colors.secondary), (3, 3));
    }

    #[rstest]
    #[case(0, 1)]
    #[case(9, 7)]
    #[case(4, 4)]
    fn new_clamps_into_range(#[case] start: usize, #[case] expected: usize) {
        let colors = ColorSelection::new(start, start, 7);
        assert_eq!(colors.primary, expected);
        assert!(colors.secondary >= 1 && colors.secondary <= colors.max_index);
    }

    #[test]
    fn up_wins_when_both_are_held() {
        let mut poller = ButtonPoller::new(Duration::from_millis(500));
        let mut colors = ColorSelection::new(1, 1, 7);
        let pressed = poller.poll(
            Instant::now(),
            &mut HeldButton(true),
            &mut HeldButton(true),
            &mut colors,
        );
        assert_eq!(pressed, Some(ButtonId::Up));
        assert_eq!((colors.primary, colors.secondary), (2, 1));
    }

    #[test]
    fn held_button_counts_once_per_hold_off() {
        let mut poller = ButtonPoller::new(Duration::from_millis(500));
        let mut colors = ColorSelection::new(1, 1, 7);
        let mut up = HeldButton(false);
        let mut down = HeldButton(true);
        let t0 = Instant::now();

        assert_eq!(poller.poll(t0, &mut up, &mut down, &mut colors), Some(ButtonId::Down));
        for ms in [30, 200, 499] {
            let t = t0 + Duration::from_millis(ms);
            assert_eq!(poller.poll(t, &mut up, &mut down, &mut colors), None);
        }
        let t = t0 + Duration::from_millis(500);
        assert_eq!(poller.poll(t, &mut up, &mut down, &mut colors), Some(ButtonId::Down));
        assert_eq!(colors.secondary, 3);
    }

    #[test]
    fn no_press_means_no_change() {
        let mut poller = ButtonPoller::new(Duration::from_millis(500));
        let mut colors = ColorSelection::new(1, 1, 7);
        assert_eq!(
            poller.poll(Instant::now(), &mut NoButton, &mut NoButton, &mut colors),
            None
        );
        assert_eq!(colors, ColorSelection::new(1, 1, 7));
    }

    #[test]
    fn virtual_press_shares_the_hold_off() {
        let mut poller = ButtonPoller::new(Duration::from_millis(500));
        let mut colors = ColorSelection::new(1, 1, 7);
        let t0 = Instant::now();

        assert!(poller.virtual_press(t0, ButtonId::Up, &mut colors));
        assert!(!poller.virtual_press(t0 + Duration::from_millis(10), ButtonId::Down, &mut colors));
        assert_eq!(
            poller.poll(t0 + Duration::from_millis(10), &mut HeldButton(true), &mut NoButton, &mut colors),
            None
        );
        assert_eq!((colors.primary, colors.secondary), (2, 1));
    }
}
