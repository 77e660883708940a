use super::types::Size;

fn round_up_even(value: u32) -> u32 {
    let value = value.max(1);
    if value % 2 == 0 {
        value
    } else {
        value.saturating_add(1).min(u32::MAX - 1)
    }
}

/// Concrete output size for a request. Manual overrides win when non-zero;
/// both dimensions are rounded up to an even number.
pub fn negotiate(requested: Size, manual_width: u32, manual_height: u32) -> Size {
    let width = if manual_width > 0 {
        manual_width
    } else {
        requested.width
    };
    let height = if manual_height > 0 {
        manual_height
    } else {
        requested.height
    };
    Size::new(round_up_even(width), round_up_even(height))
}

/// Largest size with the aspect ratio of `src` that fits inside `bounds`.
pub fn fit(src: Size, bounds: Size) -> Size {
    if src.is_empty() || bounds.is_empty() {
        return Size::default();
    }
    let ratio = f64::min(
        bounds.width as f64 / src.width as f64,
        bounds.height as f64 / src.height as f64,
    );
    Size::new(
        ((src.width as f64 * ratio).round() as u32).clamp(1, bounds.width),
        ((src.height as f64 * ratio).round() as u32).clamp(1, bounds.height),
    )
}

#[cfg(test)]
#[path = "size_test.rs"]
mod size_test;
