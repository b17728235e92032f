//! Tab-separated trajectory table, one row per (trajectory, frame).
//!
//! Widths and stoichiometry are not part of the table and read back as `None`.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use std::str::FromStr;

use glam::DVec2;

use super::store::TrajectorySet;
use super::trajectory::{Trajectory, TrajectoryPoint};
use crate::error::{Error, Result};

pub const TSV_HEADER: &str = "trajectory\tframe\tx\ty\tspot_intensity\tbg_intensity\tSNR\tconverged";

const COLUMNS: usize = 8;

pub fn write_tsv<W: Write>(set: &TrajectorySet, mut writer: W) -> Result<()> {
    writeln!(writer, "{TSV_HEADER}")?;
    for record in set.records() {
        let p = record.point;
        writeln!(
            writer,
            "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
            record.trajectory,
            p.frame,
            p.pos.x,
            p.pos.y,
            p.intensity,
            p.background,
            p.snr,
            u8::from(p.converged)
        )?;
    }
    writer.flush()?;
    Ok(())
}

/// Parse a table written by [`write_tsv`].
///
/// Rows of one trajectory must appear in consecutive frame order; a gap is a
/// [`LinkingContractViolation`](crate::Error::LinkingContractViolation).
pub fn read_tsv<R: BufRead>(reader: R) -> Result<TrajectorySet> {
    let mut lines = reader.lines().enumerate();

    match lines.next() {
        Some((_, line)) => {
            let line = line?;
            if line.trim_end() != TSV_HEADER {
                return Err(parse_error(1, format!("unexpected header '{}'", line.trim_end())));
            }
        }
        None => return Err(parse_error(1, "missing header".to_string())),
    }

    let mut trajectories: Vec<Trajectory> = Vec::new();
    let mut by_id: HashMap<usize, usize> = HashMap::new();

    for (index, line) in lines {
        let line_num = index + 1;
        let line = line?;
        let line = line.trim_end();
        if line.is_empty() {
            continue;
        }

        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() != COLUMNS {
            return Err(parse_error(
                line_num,
                format!("expected {COLUMNS} columns, got {}", fields.len()),
            ));
        }

        let id: usize = field(&fields, 0, line_num)?;
        let point = TrajectoryPoint {
            frame: field(&fields, 1, line_num)?,
            pos: DVec2::new(field(&fields, 2, line_num)?, field(&fields, 3, line_num)?),
            intensity: field(&fields, 4, line_num)?,
            background: field(&fields, 5, line_num)?,
            snr: field(&fields, 6, line_num)?,
            converged: match fields[7] {
                "0" => false,
                "1" => true,
                other => {
                    return Err(parse_error(
                        line_num,
                        format!("converged must be 0 or 1, got '{other}'"),
                    ))
                }
            },
            width: None,
        };

        match by_id.get(&id) {
            Some(&i) => trajectories[i].extend(point)?,
            None => {
                by_id.insert(id, trajectories.len());
                trajectories.push(Trajectory::new(id, point));
            }
        }
    }

    Ok(TrajectorySet::from_ids(trajectories))
}

pub fn write_tsv_file(set: &TrajectorySet, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    write_tsv(set, BufWriter::new(File::create(path)?))?;
    tracing::info!(
        path = %path.display(),
        trajectories = set.len(),
        rows = set.point_count(),
        "Wrote trajectory table"
    );
    Ok(())
}

pub fn read_tsv_file(path: impl AsRef<Path>) -> Result<TrajectorySet> {
    read_tsv(BufReader::new(File::open(path)?))
}

fn field<T: FromStr>(fields: &[&str], column: usize, line: usize) -> Result<T> {
    fields[column].parse().map_err(|_| {
        parse_error(
            line,
            format!(
                "invalid value '{}' in column {}",
                fields[column],
                TSV_HEADER.split('\t').nth(column).unwrap_or("?")
            ),
        )
    })
}

fn parse_error(line: usize, message: String) -> Error {
    Error::TableParse { line, message }
}
