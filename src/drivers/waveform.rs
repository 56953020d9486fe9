//! Brightness waveforms and blending helpers.
//!
//! Integer versions work on a `0..=max` scale so they can feed the PWM
//! stage directly; no libm is needed.

/// Triangular wave: ramps `0 → max → 0` as `value` goes `0 → max`.
pub fn tri_wave16(value: u16, max: u16) -> u16 {
    let folded = if value > max / 2 { max.saturating_sub(value) } else { value };
    (u32::from(folded) * 2).min(u32::from(max)) as u16
}

/// Cubic ease-in on an integer scale: `value³ / max²`.
pub fn ease_cubic16(value: u16, max: u16) -> u16 {
    if max == 0 {
        return 0;
    }
    let v = u64::from(value.min(max));
    let m = u64::from(max);
    (v * v * v / (m * m)) as u16
}

/// Triangular wave passed through the cubic ease: a soft pulse.
pub fn cubic_wave16(value: u16, max: u16) -> u16 {
    ease_cubic16(tri_wave16(value, max), max)
}

/// Rescale `value` from `0..=from_max` to `0..=to_max`.
pub fn map16(value: u32, from_max: u32, to_max: u32) -> u32 {
    if from_max == 0 {
        return 0;
    }
    (u64::from(value) * u64::from(to_max) / u64::from(from_max)) as u32
}

/// Linear blend `from → to` by `factor ∈ [0, 1]`.
pub fn smooth16(from: u16, to: u16, factor: f32) -> u16 {
    let factor = factor.clamp(0.0, 1.0);
    let delta = f32::from(from) - f32::from(to);
    (f32::from(from) - delta * factor).round().clamp(0.0, f32::from(u16::MAX)) as u16
}

/// Cubic ease-in-out on `[0, 1]`; monotonic with fixed end points.
pub fn ease_in_out_cubic(t: f32) -> f32 {
    let t = t.clamp(0.0, 1.0);
    if t < 0.5 {
        4.0 * t * t * t
    } else {
        let u = -2.0 * t + 2.0;
        1.0 - u * u * u / 2.0
    }
}
