//! Run definition validation.
//!
//! Catches what can be checked without building the system: shapes, signs,
//! cadences and names. Box-dependent checks (cutoff against box size, launch
//! capacity) happen when the simulation is constructed.

use crate::schema::{
    ActionDef, ConfigurationDef, CutoffPolicyDef, IntegratorDef, LatticeDef, PotentialDef,
    RunDefinition, ScheduleDef, TemperatureDef, TrajectoryScheduleDef,
};
use std::collections::HashSet;

/// Compute flag names understood by the engine.
pub const KNOWN_FLAGS: [&str; 8] = ["U", "W", "lapU", "Fsq", "K", "Vol", "Ptot", "stresses"];

#[derive(thiserror::Error, Debug)]
pub enum ValidationError {
    #[error("Duplicate ID: {id} in {context}")]
    DuplicateId { id: String, context: String },

    #[error("Invalid value: {field} = {value} ({reason})")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Unsupported feature: {feature} - {reason}")]
    Unsupported { feature: String, reason: String },

    #[error("Unsupported version: {version}")]
    UnsupportedVersion { version: u32 },
}

fn invalid(field: impl Into<String>, value: impl ToString, reason: &str) -> ValidationError {
    ValidationError::InvalidValue {
        field: field.into(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn require_positive(field: &str, value: f64) -> Result<(), ValidationError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(invalid(field, value, "must be positive and finite"))
    }
}

pub fn validate_run(def: &RunDefinition) -> Result<(), ValidationError> {
    if def.version > crate::migrate::LATEST_VERSION {
        return Err(ValidationError::UnsupportedVersion {
            version: def.version,
        });
    }
    if def.name.trim().is_empty() {
        return Err(invalid("name", "", "must not be empty"));
    }

    validate_schedule(&def.schedule)?;
    let num_types = validate_configuration(&def.configuration)?;
    validate_potential(&def.potential, num_types)?;
    validate_integrator(&def.integrator)?;
    validate_actions(&def.actions, &def.schedule)?;

    if let Some(pb) = def.plan.pb
        && pb == 0
    {
        return Err(invalid("plan.pb", pb, "must be positive"));
    }
    if let Some(tp) = def.plan.tp
        && tp == 0
    {
        return Err(invalid("plan.tp", tp, "must be positive"));
    }
    Ok(())
}

fn validate_schedule(schedule: &ScheduleDef) -> Result<(), ValidationError> {
    if schedule.num_timeblocks == 0 {
        return Err(invalid("schedule.num_timeblocks", 0, "must be positive"));
    }
    if schedule.steps_per_timeblock == 0 {
        return Err(invalid("schedule.steps_per_timeblock", 0, "must be positive"));
    }
    Ok(())
}

/// Returns the number of particle types.
fn validate_configuration(conf: &ConfigurationDef) -> Result<usize, ValidationError> {
    let d = conf.lattice.dimension();
    if !(1..=4).contains(&d) {
        return Err(ValidationError::Unsupported {
            feature: format!("{d}-dimensional lattice"),
            reason: "dimension must be between 1 and 4".to_string(),
        });
    }
    match &conf.lattice {
        LatticeDef::Sc { cells } | LatticeDef::Bcc { cells } | LatticeDef::Fcc { cells } => {
            if cells.contains(&0) {
                return Err(invalid("configuration.lattice.cells", format!("{cells:?}"), "every count must be positive"));
            }
            if matches!(conf.lattice, LatticeDef::Fcc { .. }) && d != 3 {
                return Err(ValidationError::Unsupported {
                    feature: format!("fcc lattice in {d} dimensions"),
                    reason: "fcc is only defined in 3 dimensions".to_string(),
                });
            }
        }
        LatticeDef::Fill { n, .. } => {
            if *n < 2 {
                return Err(invalid("configuration.lattice.n", n, "need at least 2 particles"));
            }
        }
    }
    require_positive("configuration.density", conf.density)?;
    if !conf.temperature.is_finite() || conf.temperature < 0.0 {
        return Err(invalid("configuration.temperature", conf.temperature, "must be non-negative"));
    }

    let n = conf.lattice.num_particles();
    let num_types = if conf.type_counts.is_empty() {
        1
    } else {
        let total: usize = conf.type_counts.iter().sum();
        if total != n {
            return Err(invalid(
                "configuration.type_counts",
                format!("{:?}", conf.type_counts),
                &format!("counts sum to {total}, lattice has {n} particles"),
            ));
        }
        conf.type_counts.len()
    };
    if !conf.masses.is_empty() {
        if conf.masses.len() != num_types {
            return Err(invalid(
                "configuration.masses",
                format!("{:?}", conf.masses),
                &format!("expected one mass per type ({num_types})"),
            ));
        }
        for &m in &conf.masses {
            require_positive("configuration.masses", m)?;
        }
    }
    validate_flags("configuration.compute_flags", &conf.compute_flags)?;
    Ok(num_types)
}

fn validate_flags(field: &str, names: &[String]) -> Result<(), ValidationError> {
    for name in names {
        if !KNOWN_FLAGS.contains(&name.as_str()) {
            return Err(invalid(field, name, "unknown compute flag"));
        }
    }
    Ok(())
}

fn validate_potential(pot: &PotentialDef, num_types: usize) -> Result<(), ValidationError> {
    let has_cutoff_param = pot.cutoff != CutoffPolicyDef::None;
    if !has_cutoff_param && !pot.function.has_own_cutoff() {
        return Err(ValidationError::Unsupported {
            feature: format!("{:?} without a cutoff policy", pot.function),
            reason: "the neighbor list needs a finite interaction range".to_string(),
        });
    }
    let expected = pot.function.num_params() + usize::from(has_cutoff_param);
    if pot.params.len() != expected {
        return Err(invalid(
            "potential.params",
            format!("{} matrices", pot.params.len()),
            &format!("expected {expected} parameter matrices"),
        ));
    }
    for (k, matrix) in pot.params.iter().enumerate() {
        let field = format!("potential.params[{k}]");
        if matrix.len() != num_types || matrix.iter().any(|row| row.len() != num_types) {
            return Err(invalid(field, format!("{matrix:?}"), &format!("must be {num_types}x{num_types}")));
        }
        for i in 0..num_types {
            for j in 0..i {
                if matrix[i][j] != matrix[j][i] {
                    return Err(invalid(field, format!("[{i}][{j}] = {}", matrix[i][j]), "must be symmetric"));
                }
            }
        }
        if matrix.iter().flatten().any(|v| !v.is_finite()) {
            return Err(invalid(field, format!("{matrix:?}"), "entries must be finite"));
        }
    }
    // Either the explicit cutoff matrix or the bare function's own range.
    let range_index = if has_cutoff_param { expected - 1 } else { 1 };
    for &rc in pot.params[range_index].iter().flatten() {
        require_positive(&format!("potential.params[{range_index}]"), rc)?;
    }
    if pot.max_num_nbs == 0 {
        return Err(invalid("potential.max_num_nbs", 0, "must be positive"));
    }
    if let Some(skin) = pot.skin
        && !(skin.is_finite() && skin >= 0.0)
    {
        return Err(invalid("potential.skin", skin, "must be non-negative"));
    }
    Ok(())
}

fn validate_integrator(integrator: &IntegratorDef) -> Result<(), ValidationError> {
    match integrator {
        IntegratorDef::Nve { dt } => require_positive("integrator.dt", *dt),
        IntegratorDef::Nvt {
            dt,
            tau,
            temperature,
        } => {
            require_positive("integrator.dt", *dt)?;
            require_positive("integrator.tau", *tau)?;
            match *temperature {
                TemperatureDef::Constant { value } => {
                    require_positive("integrator.temperature.value", value)
                }
                TemperatureDef::Ramp {
                    value0,
                    x0,
                    value1,
                    x1,
                } => {
                    require_positive("integrator.temperature.value0", value0)?;
                    require_positive("integrator.temperature.value1", value1)?;
                    if !x0.is_finite() || !x1.is_finite() || x1 <= x0 {
                        return Err(invalid("integrator.temperature.x1", x1, "ramp must end after it starts"));
                    }
                    Ok(())
                }
            }
        }
        IntegratorDef::Nvu {
            dl,
            u0,
            tolerance,
            max_excursion_steps,
        } => {
            require_positive("integrator.dl", *dl)?;
            if let Some(u0) = u0
                && !u0.is_finite()
            {
                return Err(invalid("integrator.u0", u0, "must be finite"));
            }
            if let Some(tol) = tolerance {
                require_positive("integrator.tolerance", *tol)?;
            }
            if let Some(0) = max_excursion_steps {
                return Err(invalid("integrator.max_excursion_steps", 0, "must be positive"));
            }
            Ok(())
        }
    }
}

fn validate_actions(actions: &[ActionDef], schedule: &ScheduleDef) -> Result<(), ValidationError> {
    let s = schedule.steps_per_timeblock;
    let mut groups = HashSet::new();
    for (k, action) in actions.iter().enumerate() {
        if let Some(group) = action.output_group()
            && !groups.insert(group)
        {
            return Err(ValidationError::DuplicateId {
                id: group.to_string(),
                context: "action output groups".to_string(),
            });
        }
        let field = format!("actions[{k}]");
        match action {
            ActionDef::ScalarSaver {
                steps_between_output,
                compute_flags,
            } => {
                check_cadence(&field, *steps_between_output, s)?;
                validate_flags(&format!("{field}.compute_flags"), compute_flags)?;
            }
            ActionDef::TrajectorySaver { schedule } => match schedule {
                TrajectoryScheduleDef::Logarithmic => {
                    if !s.is_power_of_two() {
                        return Err(invalid(
                            "schedule.steps_per_timeblock",
                            s,
                            "logarithmic trajectory saving needs a power of two",
                        ));
                    }
                }
                TrajectoryScheduleDef::Linear {
                    steps_between_output,
                } => check_cadence(&field, *steps_between_output, s)?,
            },
            ActionDef::MomentumReset {
                steps_between_reset,
            } => check_cadence(&field, *steps_between_reset, s)?,
        }
    }
    Ok(())
}

fn check_cadence(field: &str, k: usize, steps_per_timeblock: usize) -> Result<(), ValidationError> {
    if k == 0 || k > steps_per_timeblock {
        return Err(invalid(
            field.to_string(),
            k,
            &format!("steps between events must be in 1..={steps_per_timeblock}"),
        ));
    }
    Ok(())
}
