//! One-shot LEDC peripheral initialization.
//!
//! Configures one LEDC timer at the firmware's PWM resolution and one
//! channel on the configured LED pin using raw ESP-IDF sys calls.  Called
//! once from `main()` before the main loop starts.  The resulting
//! [`LedcChannel`] implements `embedded_hal::pwm::SetDutyCycle` and is
//! wrapped in a [`PwmOutput`](super::led_output::PwmOutput).

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;
#[cfg(target_os = "espidf")]
use log::info;

#[cfg(target_os = "espidf")]
use crate::config::{PWM_MAX_VALUE, PWM_RESOLUTION_BITS};

/// LEDC output frequency.  14-bit resolution on the 80 MHz APB clock
/// tops out just under 4.9 kHz.
pub const LEDC_FREQUENCY_HZ: u32 = 4_000;

// ── Error type ────────────────────────────────────────────────

/// Errors during one-shot peripheral initialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HwInitError {
    LedcTimerFailed(i32),
    LedcChannelFailed(i32),
    InvalidPin(i32),
}

impl core::fmt::Display for HwInitError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::LedcTimerFailed(rc) => write!(f, "LEDC timer config failed (rc={})", rc),
            Self::LedcChannelFailed(rc) => write!(f, "LEDC channel config failed (rc={})", rc),
            Self::InvalidPin(pin) => write!(f, "invalid LED pin {}", pin),
        }
    }
}

impl std::error::Error for HwInitError {}

// ── LEDC PWM ─────────────────────────────────────────────────

/// A configured LEDC channel.
#[cfg(target_os = "espidf")]
pub struct LedcChannel {
    channel: ledc_channel_t,
}

/// Configure LEDC timer 0 and channel 0 on `gpio`.
#[cfg(target_os = "espidf")]
pub fn init_led_pwm(gpio: i32) -> Result<LedcChannel, HwInitError> {
    if !(0..64).contains(&gpio) {
        return Err(HwInitError::InvalidPin(gpio));
    }

    let timer = ledc_timer_config_t {
        speed_mode: ledc_mode_t_LEDC_LOW_SPEED_MODE,
        timer_num: ledc_timer_t_LEDC_TIMER_0,
        duty_resolution: PWM_RESOLUTION_BITS,
        freq_hz: LEDC_FREQUENCY_HZ,
        clk_cfg: soc_periph_ledc_clk_src_legacy_t_LEDC_AUTO_CLK,
        ..Default::default()
    };
    // SAFETY: called once from main() before the main loop.
    let ret = unsafe { ledc_timer_config(&timer) };
    if ret != ESP_OK as i32 {
        return Err(HwInitError::LedcTimerFailed(ret));
    }

    let channel = ledc_channel_t_LEDC_CHANNEL_0;
    let ret = unsafe {
        ledc_channel_config(&ledc_channel_config_t {
            speed_mode: ledc_mode_t_LEDC_LOW_SPEED_MODE,
            channel,
            timer_sel: ledc_timer_t_LEDC_TIMER_0,
            gpio_num: gpio,
            duty: 0,
            hpoint: 0,
            ..Default::default()
        })
    };
    if ret != ESP_OK as i32 {
        return Err(HwInitError::LedcChannelFailed(ret));
    }

    info!(
        "hw_init: LEDC configured (gpio={}, {} bit, {} Hz)",
        gpio, PWM_RESOLUTION_BITS, LEDC_FREQUENCY_HZ
    );
    Ok(LedcChannel { channel })
}

#[cfg(target_os = "espidf")]
impl embedded_hal::pwm::ErrorType for LedcChannel {
    type Error = embedded_hal::pwm::ErrorKind;
}

#[cfg(target_os = "espidf")]
impl embedded_hal::pwm::SetDutyCycle for LedcChannel {
    fn max_duty_cycle(&self) -> u16 {
        PWM_MAX_VALUE
    }

    fn set_duty_cycle(&mut self, duty: u16) -> Result<(), Self::Error> {
        // SAFETY: the channel was configured in init_led_pwm(); only the
        // main loop writes the duty register.
        let ret = unsafe {
            let ret = ledc_set_duty(ledc_mode_t_LEDC_LOW_SPEED_MODE, self.channel, u32::from(duty));
            if ret == ESP_OK as i32 {
                ledc_update_duty(ledc_mode_t_LEDC_LOW_SPEED_MODE, self.channel)
            } else {
                ret
            }
        };
        if ret == ESP_OK as i32 {
            Ok(())
        } else {
            Err(embedded_hal::pwm::ErrorKind::Other)
        }
    }
}
