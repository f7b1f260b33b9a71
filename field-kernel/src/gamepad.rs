use thiserror::Error;

pub const AXIS_COUNT: usize = 6;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GamepadError {
    #[error("expected {AXIS_COUNT} axes, sample has {0}")]
    BadLayout(usize),
}

/// One raw controller sample as delivered by whatever input source is
/// polling the hardware. Axes are signed 16-bit style values, buttons
/// a bitmask in the layout below.
#[derive(Debug, Clone)]
pub struct RawSample {
    pub axes: Vec<i32>,
    pub buttons: u32,
}

/// Driver-station values as consumed by the rest of the system: axes
/// normalized to 0..=255, buttons decoded from the bitmask.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct GamepadValues {
    pub axis_lx: i32,
    pub axis_ly: i32,
    pub axis_rx: i32,
    pub axis_ry: i32,
    pub axis_dx: i32,
    pub axis_dy: i32,
    pub button_back: bool,
    pub button_start: bool,
    pub button_left_stick: bool,
    pub button_right_stick: bool,
    pub button_x: bool,
    pub button_y: bool,
    pub button_a: bool,
    pub button_b: bool,
    pub button_l_shoulder: bool,
    pub button_r_shoulder: bool,
    pub button_lt: bool,
    pub button_rt: bool,
}

impl GamepadValues {
    /// Stateless decode of a raw sample.
    pub fn from_raw(sample: &RawSample) -> Result<Self, GamepadError> {
        if sample.axes.len() != AXIS_COUNT {
            return Err(GamepadError::BadLayout(sample.axes.len()));
        }
        let button = |n: u32| sample.buttons & (1 << n) != 0;
        Ok(Self {
            axis_lx: map_range(sample.axes[0], -32768, 32768, 0, 255),
            axis_ly: map_range(sample.axes[1], -32768, 32768, 0, 255),
            axis_rx: map_range(sample.axes[2], -32768, 32768, 0, 255),
            axis_ry: map_range(sample.axes[3], -32768, 32768, 0, 255),
            axis_dx: map_range(sample.axes[4], -32768, 32768, 0, 255),
            axis_dy: map_range(sample.axes[5], -32768, 32768, 0, 255),
            button_x: button(0),
            button_a: button(1),
            button_b: button(2),
            button_y: button(3),
            button_l_shoulder: button(4),
            button_r_shoulder: button(5),
            button_lt: button(6),
            button_rt: button(7),
            button_back: button(8),
            button_start: button(9),
            button_left_stick: button(10),
            button_right_stick: button(11),
        })
    }
}

fn map_range(x: i32, x_min: i32, x_max: i32, o_min: i32, o_max: i32) -> i32 {
    (x - x_min) * (o_max - o_min) / (x_max - x_min) + o_min
}
