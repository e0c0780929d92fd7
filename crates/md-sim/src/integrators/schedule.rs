//! Target temperature as a function of elapsed simulation time.

use std::fmt;
use std::sync::Arc;

use crate::error::{SimError, SimResult};

#[derive(Clone)]
pub enum TemperatureSchedule {
    Constant(f64),
    /// Linear from `value0` at `x0` to `value1` at `x1`, flat outside.
    Ramp {
        x0: f64,
        value0: f64,
        x1: f64,
        value1: f64,
    },
    Custom(Arc<dyn Fn(f64) -> f64 + Send + Sync>),
}

impl fmt::Debug for TemperatureSchedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Constant(t) => f.debug_tuple("Constant").field(t).finish(),
            Self::Ramp {
                x0,
                value0,
                x1,
                value1,
            } => f
                .debug_struct("Ramp")
                .field("x0", x0)
                .field("value0", value0)
                .field("x1", x1)
                .field("value1", value1)
                .finish(),
            Self::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

impl TemperatureSchedule {
    #[inline]
    pub fn at(&self, time: f64) -> f64 {
        match self {
            Self::Constant(t) => *t,
            Self::Ramp {
                x0,
                value0,
                x1,
                value1,
            } => {
                if time <= *x0 {
                    *value0
                } else if time >= *x1 {
                    *value1
                } else {
                    value0 + (value1 - value0) * (time - x0) / (x1 - x0)
                }
            }
            Self::Custom(f) => f(time),
        }
    }

    pub(crate) fn validate(&self) -> SimResult<()> {
        match self {
            Self::Constant(t) if !t.is_finite() || *t <= 0.0 => Err(SimError::InvalidArg {
                what: "target temperature must be positive and finite",
            }),
            Self::Ramp { x0, x1, .. } if !(x1 > x0) => Err(SimError::InvalidArg {
                what: "temperature ramp needs x1 > x0",
            }),
            Self::Ramp { value0, value1, .. }
                if !(value0.is_finite() && value1.is_finite() && *value0 > 0.0 && *value1 > 0.0) =>
            {
                Err(SimError::InvalidArg {
                    what: "temperature ramp endpoints must be positive and finite",
                })
            }
            _ => Ok(()),
        }
    }
}

impl From<f64> for TemperatureSchedule {
    fn from(t: f64) -> Self {
        Self::Constant(t)
    }
}

/// Linear ramp from `value0` at time `x0` to `value1` at time `x1`.
pub fn make_function_ramp(value0: f64, x0: f64, value1: f64, x1: f64) -> SimResult<TemperatureSchedule> {
    let schedule = TemperatureSchedule::Ramp {
        x0,
        value0,
        x1,
        value1,
    };
    schedule.validate()?;
    Ok(schedule)
}
