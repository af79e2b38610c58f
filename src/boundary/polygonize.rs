use std::collections::HashMap;

use geo::{Coord, LineString, Polygon};

use super::merge::{node_key, NodeKey};

/// Edge of the planar graph: a merged line between two nodes.
struct Edge {
    coords: Vec<Coord<f64>>,
    from: usize,
    to: usize,
    alive: bool,
}

/// Assemble polygons from noded lines.
///
/// Lines are joined only at their endpoints. Dangling edges are pruned,
/// then every face of the remaining planar graph is walked; bounded faces
/// (counter-clockwise walks) become polygons. Faces nested inside other
/// faces are returned separately rather than punched out as holes.
pub fn polygonize(lines: &[LineString<f64>]) -> Vec<Polygon<f64>> {
    let mut nodes: HashMap<NodeKey, usize> = HashMap::new();
    let mut edges: Vec<Edge> = Vec::new();

    for line in lines {
        let coords = dedup_consecutive(&line.0);
        if coords.len() < 2 {
            continue;
        }
        let next_id = nodes.len();
        let from = *nodes.entry(node_key(coords[0])).or_insert(next_id);
        let next_id = nodes.len();
        let to = *nodes.entry(node_key(coords[coords.len() - 1])).or_insert(next_id);
        // A closed line of fewer than 4 points encloses nothing.
        if from == to && coords.len() < 4 {
            continue;
        }
        edges.push(Edge {
            coords,
            from,
            to,
            alive: true,
        });
    }

    prune_dangles(&mut edges, nodes.len());

    // Half-edge h belongs to edge h / 2; even = forward, odd = reversed.
    let half_count = edges.len() * 2;
    let mut outgoing: Vec<Vec<(f64, usize)>> = vec![Vec::new(); nodes.len()];
    for (e, edge) in edges.iter().enumerate() {
        if !edge.alive {
            continue;
        }
        outgoing[edge.from].push((angle(edge.coords[0], edge.coords[1]), e * 2));
        let n = edge.coords.len();
        outgoing[edge.to].push((angle(edge.coords[n - 1], edge.coords[n - 2]), e * 2 + 1));
    }
    for out in &mut outgoing {
        out.sort_by(|a, b| a.0.total_cmp(&b.0));
    }

    let mut visited = vec![false; half_count];
    let mut polygons = Vec::new();

    for start in 0..half_count {
        if visited[start] || !edges[start / 2].alive {
            continue;
        }

        let mut ring: Vec<Coord<f64>> = Vec::new();
        let mut h = start;
        let mut closed = false;
        for _ in 0..half_count {
            visited[h] = true;
            push_half_edge(&mut ring, &edges[h / 2], h % 2 == 0);

            // Turn to the edge just clockwise of the one we came in on.
            let at = &outgoing[dest(&edges, h)];
            let twin = h ^ 1;
            let Some(pos) = at.iter().position(|&(_, id)| id == twin) else {
                break;
            };
            h = at[(pos + at.len() - 1) % at.len()].1;
            if h == start {
                closed = true;
                break;
            }
            if visited[h] {
                break;
            }
        }

        if !closed || ring.len() < 3 {
            continue;
        }
        ring.push(ring[0]);
        let ring = LineString::new(ring);
        if signed_area(&ring) > 0.0 {
            polygons.push(Polygon::new(ring, vec![]));
        }
    }

    polygons
}

/// Append a half-edge's points minus its last, which starts the next one.
fn push_half_edge(ring: &mut Vec<Coord<f64>>, edge: &Edge, forward: bool) {
    let n = edge.coords.len();
    if forward {
        ring.extend_from_slice(&edge.coords[..n - 1]);
    } else {
        ring.extend(edge.coords[1..].iter().rev().copied());
    }
}

fn dest(edges: &[Edge], h: usize) -> usize {
    let edge = &edges[h / 2];
    if h % 2 == 0 {
        edge.to
    } else {
        edge.from
    }
}

/// Repeatedly drop edges with an endpoint no other edge touches.
fn prune_dangles(edges: &mut [Edge], node_count: usize) {
    let mut degree = vec![0usize; node_count];
    for edge in edges.iter() {
        degree[edge.from] += 1;
        degree[edge.to] += 1;
    }

    loop {
        let mut changed = false;
        for edge in edges.iter_mut() {
            if edge.alive && (degree[edge.from] == 1 || degree[edge.to] == 1) {
                edge.alive = false;
                degree[edge.from] -= 1;
                degree[edge.to] -= 1;
                changed = true;
            }
        }
        if !changed {
            break;
        }
    }
}

fn dedup_consecutive(coords: &[Coord<f64>]) -> Vec<Coord<f64>> {
    let mut out: Vec<Coord<f64>> = Vec::with_capacity(coords.len());
    for &c in coords {
        if out.last() != Some(&c) {
            out.push(c);
        }
    }
    out
}

fn angle(from: Coord<f64>, to: Coord<f64>) -> f64 {
    (to.y - from.y).atan2(to.x - from.x)
}

/// Shoelace area; positive for counter-clockwise rings.
pub(crate) fn signed_area(ring: &LineString<f64>) -> f64 {
    ring.0
        .windows(2)
        .map(|w| w[0].x * w[1].y - w[1].x * w[0].y)
        .sum::<f64>()
        / 2.0
}
