//! Offline reconstruction of per-tick opinion series.
//!
//! Consumes the transcript wire format plus the agents' initial opinions
//! (recovered from their first memory records) and rebuilds a dense
//! per-agent time series with carry-forward semantics. This is the
//! analysis-side counterpart of the append-only log; it runs over files
//! after a simulation, so everything here is synchronous.

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::Path;
use std::str::FromStr;

use regex::Regex;
use serde::Serialize;

use crate::error::ReplayError;
use crate::transcript::log::TranscriptRecord;

/// Dense per-tick opinion series for every agent with a known initial
/// opinion.
#[derive(Debug, Clone, Serialize)]
pub struct OpinionSeries {
    /// Tick axis, `0..=max_tick`.
    pub ticks: Vec<u64>,
    /// Per-agent opinions, one value per tick.
    pub series: BTreeMap<u32, Vec<f64>>,
}

impl OpinionSeries {
    /// Final opinion per agent, i.e. the last tick's value.
    pub fn final_opinions(&self) -> BTreeMap<u32, f64> {
        self.series
            .iter()
            .filter_map(|(agent, values)| values.last().map(|value| (*agent, *value)))
            .collect()
    }

    /// Serializes the series as pretty JSON for external plotting.
    pub fn to_json(&self) -> Result<String, ReplayError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// A transcript block whose posterior line has not been seen yet.
struct OpenBlock {
    tick: u64,
    agent_a: u32,
    agent_b: u32,
    prior: Option<(f64, f64)>,
    body: Vec<String>,
    line: usize,
}

/// Parses a transcript file into its ordered records.
///
/// A missing file reads as an empty transcript. Lines outside blocks
/// (the run header, blank separators) are skipped; a block that never
/// reaches its posterior line is dropped with a warning. Lines that
/// match a record shape but carry unusable values are an error.
pub fn parse_transcript(path: &Path) -> Result<Vec<TranscriptRecord>, ReplayError> {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => return Err(err.into()),
    };

    let header_re = Regex::new(r"^=== Tick (\d+) \| Agent (\d+) <-> Agent (\d+) ===$")
        .expect("Invalid transcript header regex");
    let prior_re = Regex::new(r"^PRIOR_STANCE: A\((\d+)\)=([-\d.]+) , B\((\d+)\)=([-\d.]+)$")
        .expect("Invalid prior-stance regex");
    let posterior_re = Regex::new(r"^Opinions after: A\((\d+)\)=([-\d.]+), B\((\d+)\)=([-\d.]+)$")
        .expect("Invalid posterior regex");

    let mut records = Vec::new();
    let mut open: Option<OpenBlock> = None;

    for (idx, line) in text.lines().enumerate() {
        let line_no = idx + 1;

        if let Some(caps) = header_re.captures(line) {
            if let Some(dropped) = open.take() {
                tracing::warn!(
                    line = dropped.line,
                    "transcript block has no posterior line; dropping it"
                );
            }
            open = Some(OpenBlock {
                tick: parse_num(&caps[1], line_no)?,
                agent_a: parse_num(&caps[2], line_no)?,
                agent_b: parse_num(&caps[3], line_no)?,
                prior: None,
                body: Vec::new(),
                line: line_no,
            });
            continue;
        }

        let Some(mut block) = open.take() else {
            continue;
        };

        // The prior line, if present, sits directly under the header.
        if block.prior.is_none() && block.body.is_empty() {
            if let Some(caps) = prior_re.captures(line) {
                check_ids(&block, &caps[1], &caps[3], line_no)?;
                block.prior = Some((parse_num(&caps[2], line_no)?, parse_num(&caps[4], line_no)?));
                open = Some(block);
                continue;
            }
        }

        if let Some(caps) = posterior_re.captures(line) {
            check_ids(&block, &caps[1], &caps[3], line_no)?;
            records.push(TranscriptRecord {
                tick: block.tick,
                agent_a: block.agent_a,
                agent_b: block.agent_b,
                prior: block.prior,
                conversation: block.body.join("\n"),
                posterior: (parse_num(&caps[2], line_no)?, parse_num(&caps[4], line_no)?),
            });
            continue;
        }

        block.body.push(line.to_string());
        open = Some(block);
    }

    if let Some(dropped) = open {
        tracing::warn!(
            line = dropped.line,
            "transcript ends inside an open block; dropping it"
        );
    }

    Ok(records)
}

/// Reads each agent's initial opinion from its first memory record.
///
/// Scans `agent_<id>.txt` files for the `opinion score: <float>` clause
/// on their first line. Files without one are skipped with a warning; a
/// missing directory reads as no agents.
pub fn discover_initial_opinions(memory_dir: &Path) -> Result<BTreeMap<u32, f64>, ReplayError> {
    let name_re = Regex::new(r"^agent_(\d+)\.txt$").expect("Invalid agent file name regex");
    let score_re = Regex::new(r"opinion score:\s*([-\d.]+)").expect("Invalid initial score regex");

    let mut initial = BTreeMap::new();
    let entries = match std::fs::read_dir(memory_dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(initial),
        Err(err) => return Err(err.into()),
    };

    for entry in entries {
        let entry = entry?;
        let file_name = entry.file_name();
        let Some(name) = file_name.to_str() else {
            continue;
        };
        let Some(caps) = name_re.captures(name) else {
            continue;
        };
        let Ok(agent) = caps[1].parse::<u32>() else {
            continue;
        };

        let text = std::fs::read_to_string(entry.path())?;
        let score = text.lines().next().and_then(|first_line| {
            score_re
                .captures(first_line)
                .and_then(|caps| caps.get(1))
                .and_then(|m| m.as_str().parse::<f64>().ok())
        });
        match score {
            Some(score) => {
                initial.insert(agent, score);
            }
            None => {
                tracing::warn!(agent, "no initial opinion in first memory line; skipping agent");
            }
        }
    }

    Ok(initial)
}

/// Rebuilds the dense per-tick opinion series.
///
/// An agent's value at tick `t` is the posterior of its most recent
/// record at or before `t`, or its initial opinion before any record.
/// Agents without records stay constant; multiple updates within one
/// tick resolve to the last one written. Records naming an agent with no
/// known initial opinion are skipped.
pub fn reconstruct(
    initial: &BTreeMap<u32, f64>,
    records: &[TranscriptRecord],
) -> OpinionSeries {
    let max_tick = records.iter().map(|record| record.tick).max().unwrap_or(0);

    let mut updates: BTreeMap<u64, Vec<(u32, f64)>> = BTreeMap::new();
    for record in records {
        let posteriors = [
            (record.agent_a, record.posterior.0),
            (record.agent_b, record.posterior.1),
        ];
        for (agent, opinion) in posteriors {
            if initial.contains_key(&agent) {
                updates.entry(record.tick).or_default().push((agent, opinion));
            } else {
                tracing::warn!(
                    agent,
                    tick = record.tick,
                    "transcript names agent with no known initial opinion; skipping"
                );
            }
        }
    }

    let ticks: Vec<u64> = (0..=max_tick).collect();
    let mut current = initial.clone();
    let mut series: BTreeMap<u32, Vec<f64>> = initial
        .keys()
        .map(|agent| (*agent, Vec::with_capacity(ticks.len())))
        .collect();

    for tick in &ticks {
        if let Some(tick_updates) = updates.get(tick) {
            for (agent, opinion) in tick_updates {
                current.insert(*agent, *opinion);
            }
        }
        for (agent, values) in series.iter_mut() {
            values.push(current.get(agent).copied().unwrap_or(0.0));
        }
    }

    OpinionSeries { ticks, series }
}

fn parse_num<T: FromStr>(text: &str, line: usize) -> Result<T, ReplayError> {
    text.parse().map_err(|_| ReplayError::Malformed {
        line,
        reason: format!("invalid numeric value '{text}'"),
    })
}

fn check_ids(block: &OpenBlock, a: &str, b: &str, line_no: usize) -> Result<(), ReplayError> {
    let a: u32 = parse_num(a, line_no)?;
    let b: u32 = parse_num(b, line_no)?;
    if a != block.agent_a || b != block.agent_b {
        return Err(ReplayError::Malformed {
            line: line_no,
            reason: format!(
                "agent ids ({a}, {b}) disagree with block header ({}, {})",
                block.agent_a, block.agent_b
            ),
        });
    }
    Ok(())
}
