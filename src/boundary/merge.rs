use std::collections::HashMap;

use geo::{Coord, LineString};

/// Exact node identity for coordinates. OSM ways that share a node carry
/// bit-identical coordinates, so no tolerance is applied.
pub(crate) type NodeKey = (u64, u64);

pub(crate) fn node_key(c: Coord<f64>) -> NodeKey {
    // `+ 0.0` folds -0.0 into 0.0
    ((c.x + 0.0).to_bits(), (c.y + 0.0).to_bits())
}

/// Merge lines that share endpoints into maximal chains.
///
/// Chains continue only through nodes where exactly two line ends meet;
/// fragments are reversed as needed. A set of lines forming a cycle comes
/// out as one closed line. Output order follows the first fragment of each
/// chain in input order.
pub fn line_merge(lines: &[LineString<f64>]) -> Vec<LineString<f64>> {
    let lines: Vec<&LineString<f64>> = lines.iter().filter(|l| l.0.len() >= 2).collect();

    // node -> (line index, end is the line's start)
    let mut ends: HashMap<NodeKey, Vec<(usize, bool)>> = HashMap::new();
    for (i, line) in lines.iter().enumerate() {
        ends.entry(node_key(line.0[0])).or_default().push((i, true));
        ends.entry(node_key(line.0[line.0.len() - 1]))
            .or_default()
            .push((i, false));
    }
    let degree = |key: &NodeKey| ends.get(key).map_or(0, Vec::len);

    let mut used = vec![false; lines.len()];
    let mut merged = Vec::new();

    // Chains anchored at nodes that are not pass-through (degree != 2).
    for i in 0..lines.len() {
        for at_start in [true, false] {
            if used[i] {
                break;
            }
            let line = lines[i];
            let anchor = if at_start {
                line.0[0]
            } else {
                line.0[line.0.len() - 1]
            };
            if degree(&node_key(anchor)) != 2 {
                merged.push(walk_chain(&lines, &ends, &mut used, i, at_start));
            }
        }
    }

    // Whatever is left lies on cycles of pass-through nodes.
    for i in 0..lines.len() {
        if !used[i] {
            merged.push(walk_chain(&lines, &ends, &mut used, i, true));
        }
    }

    merged
}

fn walk_chain(
    lines: &[&LineString<f64>],
    ends: &HashMap<NodeKey, Vec<(usize, bool)>>,
    used: &mut [bool],
    first: usize,
    enter_at_start: bool,
) -> LineString<f64> {
    let mut coords: Vec<Coord<f64>> = Vec::new();
    let mut current = first;
    let mut from_start = enter_at_start;

    loop {
        used[current] = true;
        let pts = &lines[current].0;
        if from_start {
            let skip = usize::from(!coords.is_empty());
            coords.extend(pts.iter().skip(skip).copied());
        } else {
            let skip = usize::from(!coords.is_empty());
            coords.extend(pts.iter().rev().skip(skip).copied());
        }

        let tail = node_key(coords[coords.len() - 1]);
        let Some(at_tail) = ends.get(&tail) else {
            break;
        };
        if at_tail.len() != 2 {
            break;
        }
        let next = at_tail.iter().find(|(idx, _)| !used[*idx]);
        match next {
            Some(&(idx, is_start)) => {
                current = idx;
                from_start = is_start;
            }
            None => break,
        }
    }

    LineString::new(coords)
}
