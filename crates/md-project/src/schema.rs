//! Run definition schema.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunDefinition {
    pub version: u32,
    pub name: String,
    pub configuration: ConfigurationDef,
    pub potential: PotentialDef,
    pub integrator: IntegratorDef,
    #[serde(default)]
    pub actions: Vec<ActionDef>,
    pub schedule: ScheduleDef,
    #[serde(default)]
    pub plan: PlanDef,
    #[serde(default)]
    pub storage: StorageDef,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConfigurationDef {
    pub lattice: LatticeDef,
    pub density: f64,
    /// Initial Maxwell-Boltzmann temperature.
    pub temperature: f64,
    #[serde(default)]
    pub seed: u64,
    /// Particles per type, assigned in order. All particles are type 0 when empty.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub type_counts: Vec<usize>,
    /// Mass per type. Unit masses when empty.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub masses: Vec<f64>,
    /// Flag names computed by the configuration; `U`, `W`, `K` when empty.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub compute_flags: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum LatticeDef {
    Sc { cells: Vec<usize> },
    Bcc { cells: Vec<usize> },
    Fcc { cells: Vec<usize> },
    /// `n` particles on the smallest lattice that holds them.
    Fill { n: usize, d: usize },
}

impl LatticeDef {
    pub fn dimension(&self) -> usize {
        match self {
            LatticeDef::Sc { cells } | LatticeDef::Bcc { cells } | LatticeDef::Fcc { cells } => {
                cells.len()
            }
            LatticeDef::Fill { d, .. } => *d,
        }
    }

    pub fn num_particles(&self) -> usize {
        match self {
            LatticeDef::Sc { cells } => cells.iter().product(),
            LatticeDef::Bcc { cells } => 2 * cells.iter().product::<usize>(),
            LatticeDef::Fcc { cells } => 4 * cells.iter().product::<usize>(),
            LatticeDef::Fill { n, .. } => *n,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PotentialDef {
    pub function: PairFunctionDef,
    #[serde(default)]
    pub cutoff: CutoffPolicyDef,
    /// One symmetric `types x types` matrix per parameter; with a cutoff
    /// policy the cutoff matrix comes last.
    pub params: Vec<Vec<Vec<f64>>>,
    #[serde(default = "default_max_num_nbs")]
    pub max_num_nbs: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skin: Option<f64>,
}

fn default_max_num_nbs() -> usize {
    128
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PairFunctionDef {
    LennardJones,
    Yukawa,
    HarmonicRepulsion,
}

impl PairFunctionDef {
    /// Parameters of the bare function.
    pub fn num_params(self) -> usize {
        match self {
            PairFunctionDef::LennardJones
            | PairFunctionDef::Yukawa
            | PairFunctionDef::HarmonicRepulsion => 2,
        }
    }

    /// Whether the bare function has a finite range of its own.
    pub fn has_own_cutoff(self) -> bool {
        matches!(self, PairFunctionDef::HarmonicRepulsion)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum CutoffPolicyDef {
    #[default]
    ShiftedPotential,
    ShiftedForce,
    None,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum IntegratorDef {
    Nve {
        dt: f64,
    },
    Nvt {
        dt: f64,
        tau: f64,
        temperature: TemperatureDef,
    },
    Nvu {
        dl: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        u0: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        tolerance: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max_excursion_steps: Option<u64>,
    },
}

impl IntegratorDef {
    pub fn name(&self) -> &'static str {
        match self {
            IntegratorDef::Nve { .. } => "NVE",
            IntegratorDef::Nvt { .. } => "NVT",
            IntegratorDef::Nvu { .. } => "NVU",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum TemperatureDef {
    Constant {
        value: f64,
    },
    Ramp {
        value0: f64,
        x0: f64,
        value1: f64,
        x1: f64,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum ActionDef {
    ScalarSaver {
        steps_between_output: usize,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        compute_flags: Vec<String>,
    },
    TrajectorySaver {
        #[serde(default)]
        schedule: TrajectoryScheduleDef,
    },
    MomentumReset {
        steps_between_reset: usize,
    },
}

impl ActionDef {
    /// Output group the action writes, if any.
    pub fn output_group(&self) -> Option<&'static str> {
        match self {
            ActionDef::ScalarSaver { .. } => Some("scalar_saver"),
            ActionDef::TrajectorySaver { .. } => Some("block"),
            ActionDef::MomentumReset { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(tag = "type")]
pub enum TrajectoryScheduleDef {
    #[default]
    Logarithmic,
    Linear {
        steps_between_output: usize,
    },
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScheduleDef {
    pub num_timeblocks: usize,
    pub steps_per_timeblock: usize,
}

/// Launch overrides; any field left out is chosen automatically.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct PlanDef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pb: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tp: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gridsync: Option<bool>,
    #[serde(default)]
    pub quiet: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct StorageDef {
    /// Run store root; `.mdflow/runs` next to the definition file when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runs_dir: Option<String>,
}
