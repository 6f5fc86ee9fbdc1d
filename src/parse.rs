use crate::error::{BvhError, Result};
use crate::types::*;
use regex::Regex;
use std::collections::{BTreeSet, HashSet};
use std::path::Path;

///////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

/// Split a line into floats. Any token that isn't a number is a parse error.
fn __parse_floats(text: &str, line_no: usize) -> Result<Vec<f64>> {
    text.split_whitespace()
        .map(|s| {
            s.parse::<f64>()
                .map_err(|_| BvhError::parse(line_no, format!("'{s}' is not a number")))
        })
        .collect()
}

/// Read the value following `prefix` in a motion header line (`Frames:` or `Frame Time:`).
/// The headers are informational, so a value that doesn't parse is only logged.
fn __header_value<T: std::str::FromStr>(line: &str, prefix: &str, line_no: usize) -> Option<T> {
    let value = line[prefix.len()..].trim();
    let parsed = value.parse::<T>().ok();
    if parsed.is_none() {
        tracing::warn!("line {line_no}: ignoring invalid '{prefix}' value '{value}'");
    }
    parsed
}

///////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

/// Parse the lines of a .bvh file.
///
/// The hierarchy section is tracked with an explicit stack of open scopes: every
/// `ROOT`/`JOINT`/`End Site` declaration takes the current top of the stack as its
/// parent and becomes the new top, every `}` pops it. Once the `MOTION` marker is
/// seen, every remaining line (apart from the `Frames:`/`Frame Time:` headers) is a
/// row of the motion table.
pub fn parse_bvh_lines<'a, I>(lines: I) -> Result<BvhArtifacts>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut hierarchy: Vec<JointRecord> = Vec::new();
    let mut motion: Vec<Frame> = Vec::new();
    let mut channels: Vec<ChannelKind> = Vec::new();
    let mut order: Vec<String> = Vec::new();

    let mut declared_frames: Option<usize> = None;
    let mut frame_time: Option<f64> = None;

    let mut scope_stack: Vec<String> = Vec::new();
    let mut seen_names: HashSet<String> = HashSet::new();
    let mut awaiting_offset = false;
    let mut parsing_motion = false;
    let mut last_line = 0;

    let re_joint = Regex::new(r"^(ROOT|JOINT)\s+(\S+)").expect("joint pattern is valid");
    let re_offset = Regex::new(r"^OFFSET\s+(.+)$").expect("offset pattern is valid");
    let re_channels = Regex::new(r"^CHANNELS\s+(\d+)\s*(.*)$").expect("channels pattern is valid");

    //// PARSING LINE BY LINE
    for (i, line) in lines.into_iter().enumerate() {
        let line_no = i + 1;
        last_line = line_no;
        let line = line.trim();

        if line.is_empty() {
            continue;
        }

        if parsing_motion {
            if line.starts_with("Frames:") {
                declared_frames = __header_value(line, "Frames:", line_no);
            } else if line.starts_with("Frame Time:") {
                frame_time = __header_value(line, "Frame Time:", line_no);
            } else if line.starts_with("MOTION") {
                return Err(BvhError::parse(line_no, "MOTION section declared twice"));
            } else {
                motion.push(__parse_floats(line, line_no)?);
            }
            continue;
        }

        if line.starts_with("HIERARCHY") || line == "{" {
            continue;
        } else if let Some(captures) = re_joint.captures(line) {
            //// Create joint
            let name = captures[2].to_string();
            if !seen_names.insert(name.clone()) {
                return Err(BvhError::parse(line_no, format!("duplicate joint name '{name}'")));
            }
            hierarchy.push(JointRecord {
                name: name.clone(),
                parent: scope_stack.last().cloned(),
                offset: [0.0; 3],
            });
            order.push(name.clone());
            scope_stack.push(name);
            awaiting_offset = true;
        } else if line.starts_with("End Site") {
            //// Create endsite (a synthetic joint without channels)
            let parent = scope_stack
                .last()
                .cloned()
                .ok_or_else(|| BvhError::parse(line_no, "End Site outside of any joint"))?;
            let name = format!("{parent}{END_SITE_SUFFIX}");
            if !seen_names.insert(name.clone()) {
                return Err(BvhError::parse(line_no, format!("duplicate joint name '{name}'")));
            }
            hierarchy.push(JointRecord {
                name: name.clone(),
                parent: Some(parent),
                offset: [0.0; 3],
            });
            scope_stack.push(name);
            awaiting_offset = true;
        } else if let Some(captures) = re_offset.captures(line) {
            //// Parse offset
            if !awaiting_offset {
                return Err(BvhError::parse(line_no, "OFFSET without a preceding joint"));
            }
            let values = __parse_floats(&captures[1], line_no)?;
            let [x, y, z] = values[..] else {
                return Err(BvhError::parse(
                    line_no,
                    format!("OFFSET needs 3 values, found {}", values.len()),
                ));
            };
            if let Some(joint) = hierarchy.last_mut() {
                joint.offset = [x, y, z];
            }
            awaiting_offset = false;
        } else if let Some(captures) = re_channels.captures(line) {
            //// Parse channels
            if scope_stack.is_empty() {
                return Err(BvhError::parse(line_no, "CHANNELS outside of any joint"));
            }
            let declared: usize = captures[1]
                .parse()
                .map_err(|_| BvhError::parse(line_no, "invalid channel count"))?;
            let names = captures[2]
                .split_whitespace()
                .map(|s| s.parse::<ChannelKind>().map_err(|e| BvhError::parse(line_no, e)))
                .collect::<Result<Vec<_>>>()?;
            if names.len() != declared {
                tracing::warn!(
                    line = line_no,
                    declared,
                    listed = names.len(),
                    "CHANNELS count does not match the number of listed channels"
                );
            }
            channels.extend(names);
        } else if line.starts_with('}') {
            scope_stack
                .pop()
                .ok_or_else(|| BvhError::parse(line_no, "closing brace without an open scope"))?;
        } else if line.starts_with("MOTION") {
            parsing_motion = true;
        } else {
            let token = line.split_whitespace().next().unwrap_or(line);
            return Err(BvhError::parse(line_no, format!("unrecognized token '{token}'")));
        }
    }

    if let Some(open) = scope_stack.last() {
        return Err(BvhError::parse(last_line, format!("scope of '{open}' is never closed")));
    }

    //// Every frame must have the same number of values
    let frame_lengths: BTreeSet<usize> = motion.iter().map(Vec::len).collect();
    if frame_lengths.len() > 1 {
        return Err(BvhError::Format(format!(
            "inconsistent frame lengths detected: {frame_lengths:?}"
        )));
    }

    if let Some(declared) = declared_frames {
        if declared != motion.len() {
            tracing::warn!(declared, parsed = motion.len(), "frame count header does not match motion rows");
        }
    }

    tracing::debug!(
        joints = hierarchy.len(),
        channels = channels.len(),
        frames = motion.len(),
        "parsed bvh"
    );

    Ok(BvhArtifacts {
        hierarchy,
        motion,
        channels,
        order,
        declared_frames,
        frame_time,
    })
}

//////////////////////////////////////////////////////////////// PUBLIC ///////////////////////////////////////////////////////////////////////////

/// load a bvh file from a file path
pub fn load_bvh_from_file(file_path: impl AsRef<Path>) -> Result<BvhArtifacts> {
    let file_path = file_path.as_ref();
    tracing::debug!("reading {:?}", file_path);
    let contents = std::fs::read_to_string(file_path)?;
    load_bvh_from_string(&contents)
}

/// load a bvh file from a string
pub fn load_bvh_from_string(bvh_string: &str) -> Result<BvhArtifacts> {
    parse_bvh_lines(bvh_string.lines())
}
