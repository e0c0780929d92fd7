//! Compute flags and the per-particle scalar layout they imply.

use crate::error::{SimError, SimResult};

/// Derived quantities a run must compute.
///
/// Every consumer (configuration, integrator, runtime actions) declares the
/// flags it needs; the simulation resolves their union once at setup.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct ComputeFlags {
    /// Potential energy
    pub u: bool,
    /// Virial
    pub w: bool,
    /// Laplacian of the potential energy
    pub lap_u: bool,
    /// Squared force
    pub fsq: bool,
    /// Kinetic energy
    pub k: bool,
    /// Box volume
    pub vol: bool,
    /// Total momentum
    pub ptot: bool,
    /// Off-diagonal stress
    pub stresses: bool,
}

pub const FLAG_NAMES: [&str; 8] = ["U", "W", "lapU", "Fsq", "K", "Vol", "Ptot", "stresses"];

impl ComputeFlags {
    pub const NONE: ComputeFlags = ComputeFlags {
        u: false,
        w: false,
        lap_u: false,
        fsq: false,
        k: false,
        vol: false,
        ptot: false,
        stresses: false,
    };

    /// U, W and K: what a configuration computes unless told otherwise.
    pub const fn standard() -> Self {
        ComputeFlags {
            u: true,
            w: true,
            k: true,
            ..Self::NONE
        }
    }

    pub fn union(self, other: Self) -> Self {
        ComputeFlags {
            u: self.u || other.u,
            w: self.w || other.w,
            lap_u: self.lap_u || other.lap_u,
            fsq: self.fsq || other.fsq,
            k: self.k || other.k,
            vol: self.vol || other.vol,
            ptot: self.ptot || other.ptot,
            stresses: self.stresses || other.stresses,
        }
    }

    /// True when every flag set in `other` is also set here.
    pub fn contains(&self, other: Self) -> bool {
        self.union(other) == *self
    }

    /// Parse flag names (`"U"`, `"lapU"`, `"Fsq"`, ...).
    pub fn from_names<S: AsRef<str>>(names: &[S]) -> SimResult<Self> {
        let mut flags = Self::NONE;
        for name in names {
            match name.as_ref() {
                "U" => flags.u = true,
                "W" => flags.w = true,
                "lapU" => flags.lap_u = true,
                "Fsq" => flags.fsq = true,
                "K" => flags.k = true,
                "Vol" => flags.vol = true,
                "Ptot" => flags.ptot = true,
                "stresses" => flags.stresses = true,
                other => {
                    return Err(SimError::config(format!(
                        "unknown compute flag {other:?}; expected one of {FLAG_NAMES:?}"
                    )));
                }
            }
        }
        Ok(flags)
    }

    pub fn names(&self) -> Vec<&'static str> {
        let set = [
            self.u,
            self.w,
            self.lap_u,
            self.fsq,
            self.k,
            self.vol,
            self.ptot,
            self.stresses,
        ];
        FLAG_NAMES
            .iter()
            .zip(set)
            .filter_map(|(name, on)| on.then_some(*name))
            .collect()
    }
}

/// Slot indices of the per-particle scalar table.
///
/// Mass is always present; the other slots exist only when flagged.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScalarLayout {
    pub m: usize,
    pub u: Option<usize>,
    pub w: Option<usize>,
    pub lap_u: Option<usize>,
    pub fsq: Option<usize>,
    pub k: Option<usize>,
    len: usize,
}

impl ScalarLayout {
    pub fn new(flags: ComputeFlags) -> Self {
        let mut len = 1;
        let mut slot = |on: bool| {
            on.then(|| {
                len += 1;
                len - 1
            })
        };
        let u = slot(flags.u);
        let w = slot(flags.w);
        let lap_u = slot(flags.lap_u);
        let fsq = slot(flags.fsq);
        let k = slot(flags.k);
        Self {
            m: 0,
            u,
            w,
            lap_u,
            fsq,
            k,
            len,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Slot of a named scalar, if present.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        match name {
            "m" => Some(self.m),
            "U" => self.u,
            "W" => self.w,
            "lapU" => self.lap_u,
            "Fsq" => self.fsq,
            "K" => self.k,
            _ => None,
        }
    }

    /// Slots that the force evaluation accumulates into.
    pub fn accumulated(&self) -> impl Iterator<Item = usize> {
        [self.u, self.w, self.lap_u, self.fsq].into_iter().flatten()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn union_is_deduplicated() {
        let a = ComputeFlags::from_names(&["U", "Fsq"]).unwrap();
        let b = ComputeFlags::from_names(&["Fsq", "lapU"]).unwrap();
        let u = a.union(b);
        assert_eq!(u.names(), vec!["U", "lapU", "Fsq"]);
        assert!(u.contains(a));
        assert!(!a.contains(u));
    }

    #[test]
    fn unknown_flag_is_config_error() {
        assert!(matches!(
            ComputeFlags::from_names(&["Q"]),
            Err(SimError::Config { .. })
        ));
    }

    #[test]
    fn layout_follows_flags() {
        let layout = ScalarLayout::new(ComputeFlags::standard());
        assert_eq!(layout.len(), 4);
        assert_eq!(layout.u, Some(1));
        assert_eq!(layout.w, Some(2));
        assert_eq!(layout.lap_u, None);
        assert_eq!(layout.k, Some(3));
        assert_eq!(layout.index_of("K"), Some(3));

        let bare = ScalarLayout::new(ComputeFlags::NONE);
        assert_eq!(bare.len(), 1);
        assert_eq!(bare.accumulated().count(), 0);
    }
}
