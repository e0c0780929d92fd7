//! Reader for rumd3 `TrajectoryFiles` directories.
//!
//! Recognised files (plain text, sorted by name):
//! - `block*.xyz`: concatenated xyz frames. Each frame is a count line, a
//!   comment line of `key=value` tokens (`columns=type,x,y,z,imx,imy,imz`,
//!   `sim_box=RectangularSimulationBox,Lx,Ly,Lz`, `dt=...`), then one row per
//!   particle.
//! - `energies*.dat`: a `#` header with `N=` and `columns=` tokens followed by
//!   whitespace separated rows of per-particle values.
//!
//! Either kind may be missing. Gzip-compressed files are skipped.

use crate::dataset::{AttrValue, Dataset};
use crate::store::{MemoryStore, OutputStore};
use crate::{StoreError, StoreResult};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// One parsed xyz frame.
#[derive(Debug, Clone, PartialEq)]
struct Frame {
    types: Vec<usize>,
    positions: Vec<f64>,
    images: Vec<f64>,
    d: usize,
    box_lengths: Option<Vec<f64>>,
    dt: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
struct EnergyFile {
    n: Option<usize>,
    columns: Vec<String>,
    rows: Vec<Vec<f64>>,
}

fn tokens(comment: &str) -> BTreeMap<&str, &str> {
    comment
        .trim_start_matches('#')
        .split_whitespace()
        .filter_map(|tok| tok.split_once('='))
        .collect()
}

fn parse_err(file: &Path, line: usize, message: impl Into<String>) -> StoreError {
    StoreError::Parse {
        file: file.to_path_buf(),
        line,
        message: message.into(),
    }
}

fn parse_xyz(file: &Path, content: &str) -> StoreResult<Vec<Frame>> {
    let lines: Vec<&str> = content.lines().collect();
    let mut frames = Vec::new();
    let mut at = 0;

    while at < lines.len() {
        if lines[at].trim().is_empty() {
            at += 1;
            continue;
        }
        let n: usize = lines[at]
            .trim()
            .parse()
            .map_err(|_| parse_err(file, at + 1, "expected particle count"))?;
        let comment = lines
            .get(at + 1)
            .ok_or_else(|| parse_err(file, at + 2, "missing comment line"))?;
        let meta = tokens(comment);

        let columns: Vec<&str> = meta
            .get("columns")
            .map(|c| c.split(',').collect())
            .unwrap_or_else(|| vec!["type", "x", "y", "z"]);
        let d = columns
            .iter()
            .filter(|c| matches!(**c, "x" | "y" | "z" | "w"))
            .count();
        let has_images = columns.iter().any(|c| c.starts_with("im"));
        if d == 0 {
            return Err(parse_err(file, at + 2, "no coordinate columns"));
        }
        let available = lines.len().saturating_sub(at + 2);
        let values = n
            .checked_mul(d)
            .filter(|_| n <= available)
            .ok_or_else(|| parse_err(file, at + 1, "particle count exceeds file"))?;

        let box_lengths = meta
            .get("sim_box")
            .or_else(|| meta.get("boxLengths"))
            .map(|v| {
                v.split(',')
                    .filter_map(|x| x.parse::<f64>().ok())
                    .collect::<Vec<_>>()
            });
        let dt = meta.get("dt").and_then(|v| v.parse().ok());

        let mut frame = Frame {
            types: Vec::with_capacity(n),
            positions: Vec::with_capacity(values),
            images: vec![0.0; values],
            d,
            box_lengths,
            dt,
        };

        for i in 0..n {
            let line_no = at + 2 + i;
            let row = lines
                .get(line_no)
                .ok_or_else(|| parse_err(file, line_no + 1, "truncated frame"))?;
            let fields: Vec<&str> = row.split_whitespace().collect();
            if fields.len() < 1 + d {
                return Err(parse_err(file, line_no + 1, "too few columns"));
            }
            let ptype = fields[0]
                .parse()
                .map_err(|_| parse_err(file, line_no + 1, "bad particle type"))?;
            frame.types.push(ptype);
            for k in 0..d {
                let x = fields[1 + k]
                    .parse()
                    .map_err(|_| parse_err(file, line_no + 1, "bad coordinate"))?;
                frame.positions.push(x);
            }
            if has_images && fields.len() >= 1 + 2 * d {
                for k in 0..d {
                    frame.images[i * d + k] = fields[1 + d + k]
                        .parse()
                        .map_err(|_| parse_err(file, line_no + 1, "bad image"))?;
                }
            }
        }

        frames.push(frame);
        at += 2 + n;
    }

    Ok(frames)
}

fn parse_energies(file: &Path, content: &str) -> StoreResult<EnergyFile> {
    let mut out = EnergyFile {
        n: None,
        columns: Vec::new(),
        rows: Vec::new(),
    };
    for (i, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line.starts_with('#') {
            let meta = tokens(line);
            if let Some(cols) = meta.get("columns") {
                out.columns = cols.split(',').map(str::to_string).collect();
            }
            if let Some(n) = meta.get("N").and_then(|v| v.parse::<usize>().ok()) {
                out.n = Some(n);
            }
            continue;
        }
        let row = line
            .split_whitespace()
            .map(|v| v.parse::<f64>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| parse_err(file, i + 1, "bad number"))?;
        if !out.columns.is_empty() && row.len() != out.columns.len() {
            return Err(parse_err(file, i + 1, "row length differs from header"));
        }
        out.rows.push(row);
    }
    if out.columns.is_empty() {
        let width = out.rows.first().map_or(0, Vec::len);
        out.columns = (0..width).map(|i| format!("col{i}")).collect();
    }
    Ok(out)
}

/// Map rumd3 column names onto scalar saver names.
fn scalar_name(column: &str) -> String {
    match column {
        "pe" => "U".to_string(),
        "ke" => "K".to_string(),
        other => other.to_string(),
    }
}

/// Per-particle rumd3 columns that the scalar saver stores as totals.
fn is_extensive(column: &str) -> bool {
    matches!(column, "pe" | "ke" | "W")
}

fn sorted_files(dir: &Path) -> StoreResult<(Vec<PathBuf>, Vec<PathBuf>, usize)> {
    let mut xyz = Vec::new();
    let mut energies = Vec::new();
    let mut compressed = 0;
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if name.ends_with(".gz") {
            compressed += 1;
        } else if name.starts_with("block") && name.ends_with(".xyz") {
            xyz.push(path);
        } else if name.starts_with("energies") && name.ends_with(".dat") {
            energies.push(path);
        }
    }
    xyz.sort();
    energies.sort();
    Ok((xyz, energies, compressed))
}

/// Read a rumd3 trajectory directory into the standard group layout.
///
/// Produces `initial_configuration` and `block` groups from xyz files and a
/// `scalar_saver` group from energy files.
pub fn read_rumd3(dir: &Path) -> StoreResult<MemoryStore> {
    if !dir.is_dir() {
        return Err(StoreError::NotFound {
            path: dir.to_path_buf(),
        });
    }
    let (xyz_files, energy_files, compressed) = sorted_files(dir)?;
    if compressed > 0 {
        warn!(
            "skipping {} gzip-compressed legacy files in {}",
            compressed,
            dir.display()
        );
    }
    if xyz_files.is_empty() && energy_files.is_empty() {
        return Err(StoreError::EmptyTrajectory {
            path: dir.to_path_buf(),
        });
    }

    let mut store = MemoryStore::new();
    let mut n_particles = None;

    if !xyz_files.is_empty() {
        let mut blocks = Vec::with_capacity(xyz_files.len());
        for path in &xyz_files {
            let frames = parse_xyz(path, &fs::read_to_string(path)?)?;
            if frames.is_empty() {
                return Err(parse_err(path, 1, "no frames"));
            }
            blocks.push(frames);
        }
        let first = &blocks[0][0];
        let (n, d) = (first.types.len(), first.d);
        for (path, frames) in xyz_files.iter().zip(&blocks) {
            if frames.iter().any(|f| f.types.len() != n || f.d != d) {
                return Err(parse_err(path, 1, "frame size differs between files"));
            }
        }
        let nconfs = blocks.iter().map(Vec::len).min().unwrap_or(0);
        if blocks.iter().any(|b| b.len() != nconfs) {
            warn!("legacy blocks hold different frame counts; truncating to {}", nconfs);
        }
        debug!(nblocks = blocks.len(), nconfs, n, d, "read legacy trajectory");

        let mut positions = Vec::with_capacity(blocks.len() * nconfs * n * d);
        let mut images = Vec::with_capacity(positions.capacity());
        for frames in &blocks {
            for frame in frames.iter().take(nconfs) {
                positions.extend_from_slice(&frame.positions);
                images.extend_from_slice(&frame.images);
            }
        }
        let shape = vec![blocks.len(), nconfs, n, d];

        store.create_group("block")?;
        store.create_dataset("block", "positions", Dataset::new(shape.clone(), positions)?)?;
        store.create_dataset("block", "images", Dataset::new(shape, images)?)?;
        let ptypes: Vec<f64> = first.types.iter().map(|&t| t as f64).collect();
        store.create_dataset("block", "ptypes", Dataset::new(vec![n], ptypes.clone())?)?;
        if let Some(lengths) = &first.box_lengths {
            store.set_group_attr("block", "box_lengths", AttrValue::FloatList(lengths.clone()))?;
        }

        store.create_group("initial_configuration")?;
        store.create_dataset(
            "initial_configuration",
            "positions",
            Dataset::new(vec![n, d], first.positions.clone())?,
        )?;
        store.create_dataset(
            "initial_configuration",
            "ptype",
            Dataset::new(vec![n], ptypes)?,
        )?;
        if let Some(dt) = first.dt {
            store.set_root_attr("dt", AttrValue::Float(dt))?;
        }
        n_particles = Some(n);
    }

    if !energy_files.is_empty() {
        let mut parsed = Vec::with_capacity(energy_files.len());
        for path in &energy_files {
            parsed.push(parse_energies(path, &fs::read_to_string(path)?)?);
        }
        let columns = parsed[0].columns.clone();
        for (path, file) in energy_files.iter().zip(&parsed) {
            if file.columns != columns {
                return Err(parse_err(path, 1, "columns differ between energy files"));
            }
        }
        let rows = parsed.iter().map(|f| f.rows.len()).min().unwrap_or(0);
        let n = parsed[0].n.or(n_particles);
        let ncols = columns.len();

        let mut values = Vec::with_capacity(parsed.len() * rows * ncols);
        for file in &parsed {
            for row in file.rows.iter().take(rows) {
                for (value, column) in row.iter().zip(&columns) {
                    let scale = match n {
                        Some(n) if is_extensive(column) => n as f64,
                        _ => 1.0,
                    };
                    values.push(value * scale);
                }
            }
        }

        store.create_group("scalar_saver")?;
        store.create_dataset(
            "scalar_saver",
            "scalars",
            Dataset::new(vec![parsed.len(), rows, ncols], values)?,
        )?;
        let names: Vec<String> = columns.iter().map(|c| scalar_name(c)).collect();
        store.set_group_attr("scalar_saver", "scalar_names", AttrValue::TextList(names))?;
        store.set_group_attr("scalar_saver", "steps_between_output", AttrValue::Int(1))?;
        if let Some(n) = n {
            store.set_root_attr("N", AttrValue::from(n))?;
        }
    }

    Ok(store)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_xyz_with_images() {
        let text = "2\nioformat=2 dt=0.0025 sim_box=RectangularSimulationBox,5,5,5 columns=type,x,y,z,imx,imy,imz\n0 0.1 0.2 0.3 1 0 -1\n1 1.1 1.2 1.3 0 0 0\n";
        let frames = parse_xyz(Path::new("block0000.xyz"), text).unwrap();
        assert_eq!(frames.len(), 1);
        let f = &frames[0];
        assert_eq!(f.d, 3);
        assert_eq!(f.types, vec![0, 1]);
        assert_eq!(f.images[..3], [1.0, 0.0, -1.0]);
        assert_eq!(f.box_lengths.as_deref(), Some(&[5.0, 5.0, 5.0][..]));
        assert_eq!(f.dt, Some(0.0025));
    }

    #[test]
    fn parses_two_dimensional_frames() {
        let text = "1\ncolumns=type,x,y\n0 0.5 0.25\n1\ncolumns=type,x,y\n0 0.6 0.35\n";
        let frames = parse_xyz(Path::new("block0000.xyz"), text).unwrap();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[1].positions, vec![0.6, 0.35]);
        assert_eq!(frames[1].d, 2);
    }

    #[test]
    fn truncated_frame_is_an_error() {
        let text = "3\ncolumns=type,x,y,z\n0 0 0 0\n";
        assert!(matches!(
            parse_xyz(Path::new("b.xyz"), text),
            Err(StoreError::Parse { .. })
        ));
    }

    #[test]
    fn energy_header_and_rows() {
        let text = "# ioformat=2 N=4 Dt=0.32 columns=ke,pe,W\n1.0 -2.0 0.5\n1.1 -2.1 0.6\n";
        let e = parse_energies(Path::new("energies0000.dat"), text).unwrap();
        assert_eq!(e.n, Some(4));
        assert_eq!(e.columns, vec!["ke", "pe", "W"]);
        assert_eq!(e.rows.len(), 2);
        assert_eq!(scalar_name("pe"), "U");
    }
}
