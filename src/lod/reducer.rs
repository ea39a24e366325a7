//! Greedy edge-collapse mesh reduction.
//!
//! The mesh lives in an arena: vertices and triangles are dense arrays
//! addressed by `u32` handles, adjacency is kept in small vectors of handles,
//! and removed elements are tombstoned. Candidates sit in a binary heap with
//! per-vertex stamps; stale entries are skipped when popped.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use smallvec::SmallVec;
use tracing::{debug, info, info_span};

use super::{ReduceOptions, Reduction};
use crate::util::{Error, Result, Vec3};

/// Cost added to every vertex that touches an open (silhouette) edge.
pub const SILHOUETTE_PENALTY: f64 = 1.0e6;

/// Cost of a vertex with no neighbours; such vertices go first.
pub const ISOLATED_COST: f64 = -0.01;

type Handles = SmallVec<[u32; 8]>;

struct Vertex {
    position: Vec3,
    neighbors: Handles,
    faces: Handles,
    cost: f64,
    target: Option<u32>,
    stamp: u32,
    alive: bool,
}

struct Face {
    vertices: [u32; 3],
    normal: Vec3,
    alive: bool,
}

impl Face {
    fn has(&self, v: u32) -> bool {
        self.vertices.contains(&v)
    }
}

#[derive(Debug, PartialEq)]
struct Candidate {
    cost: f64,
    vertex: u32,
    stamp: u32,
}

impl Eq for Candidate {}

impl Ord for Candidate {
    // Reversed so the max-heap yields the cheapest vertex, lowest index first.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .cost
            .total_cmp(&self.cost)
            .then_with(|| other.vertex.cmp(&self.vertex))
    }
}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

fn add_unique(list: &mut Handles, h: u32) {
    if !list.contains(&h) {
        list.push(h);
    }
}

fn remove_handle(list: &mut Handles, h: u32) {
    if let Some(i) = list.iter().position(|&x| x == h) {
        list.swap_remove(i);
    }
}

fn face_normal(p: [Vec3; 3]) -> Vec3 {
    (p[1] - p[0]).cross(p[2] - p[1]).normalize_or_zero()
}

struct Graph {
    vertices: Vec<Vertex>,
    faces: Vec<Face>,
    heap: BinaryHeap<Candidate>,
}

impl Graph {
    fn build(positions: &[Vec3], triangles: &[[u32; 3]]) -> Result<Self> {
        let mut vertices: Vec<Vertex> = positions
            .iter()
            .map(|&position| Vertex {
                position,
                neighbors: Handles::new(),
                faces: Handles::new(),
                cost: 0.0,
                target: None,
                stamp: 0,
                alive: true,
            })
            .collect();
        let mut faces = Vec::with_capacity(triangles.len());

        for (t, tri) in triangles.iter().enumerate() {
            for &v in tri {
                if v as usize >= positions.len() {
                    return Err(Error::BadIndex {
                        kind: "triangle",
                        offset: t as u64,
                        index: v as i64,
                        count: positions.len(),
                    });
                }
            }
            let [a, b, c] = *tri;
            if a == b || b == c || a == c {
                debug!(triangle = t, "skipping degenerate triangle");
                continue;
            }
            let handle = faces.len() as u32;
            faces.push(Face {
                vertices: *tri,
                normal: face_normal([positions[a as usize], positions[b as usize], positions[c as usize]]),
                alive: true,
            });
            for i in 0..3 {
                let v = tri[i] as usize;
                vertices[v].faces.push(handle);
                for j in 0..3 {
                    if i != j {
                        add_unique(&mut vertices[v].neighbors, tri[j]);
                    }
                }
            }
        }

        Ok(Self {
            vertices,
            faces,
            heap: BinaryHeap::new(),
        })
    }

    fn shared_faces(&self, u: u32, v: u32) -> Handles {
        self.vertices[u as usize]
            .faces
            .iter()
            .copied()
            .filter(|&f| self.faces[f as usize].has(v))
            .collect()
    }

    /// `|uv|` times the worst normal divergence between u's faces and the
    /// faces along the edge.
    fn edge_cost(&self, u: u32, v: u32) -> f64 {
        let pu = self.vertices[u as usize].position;
        let pv = self.vertices[v as usize].position;
        let length = pu.distance(pv) as f64;

        let sides = self.shared_faces(u, v);
        let mut curvature = 0.0f64;
        for &f in &self.vertices[u as usize].faces {
            let normal = self.faces[f as usize].normal;
            let mut min_curv = 1.0f64;
            for &s in &sides {
                let dot = normal.dot(self.faces[s as usize].normal) as f64;
                min_curv = min_curv.min((1.0 - dot) / 2.0);
            }
            curvature = curvature.max(min_curv);
        }
        length * curvature
    }

    fn on_silhouette(&self, u: u32) -> bool {
        self.vertices[u as usize]
            .neighbors
            .iter()
            .any(|&v| self.shared_faces(u, v).len() < 2)
    }

    fn update_cost(&mut self, u: u32) {
        let (cost, target) = if self.vertices[u as usize].neighbors.is_empty() {
            (ISOLATED_COST, None)
        } else {
            let mut best = (f64::INFINITY, None);
            for &v in &self.vertices[u as usize].neighbors {
                let c = self.edge_cost(u, v);
                if c < best.0 {
                    best = (c, Some(v));
                }
            }
            if self.on_silhouette(u) {
                best.0 += SILHOUETTE_PENALTY;
            }
            best
        };

        let vertex = &mut self.vertices[u as usize];
        vertex.cost = cost;
        vertex.target = target;
        vertex.stamp = vertex.stamp.wrapping_add(1);
        self.heap.push(Candidate {
            cost,
            vertex: u,
            stamp: vertex.stamp,
        });
    }

    fn remove_if_non_neighbor(&mut self, u: u32, n: u32) {
        if !self.vertices[u as usize].neighbors.contains(&n) {
            return;
        }
        let shares = self.vertices[u as usize]
            .faces
            .iter()
            .any(|&f| self.faces[f as usize].has(n));
        if !shares {
            remove_handle(&mut self.vertices[u as usize].neighbors, n);
            remove_handle(&mut self.vertices[n as usize].neighbors, u);
        }
    }

    fn remove_face(&mut self, f: u32) {
        let verts = self.faces[f as usize].vertices;
        self.faces[f as usize].alive = false;
        for &v in &verts {
            remove_handle(&mut self.vertices[v as usize].faces, f);
        }
        for i in 0..3 {
            let j = (i + 1) % 3;
            self.remove_if_non_neighbor(verts[i], verts[j]);
            self.remove_if_non_neighbor(verts[j], verts[i]);
        }
    }

    fn replace_vertex(&mut self, f: u32, old: u32, new: u32) {
        let face = &mut self.faces[f as usize];
        for slot in face.vertices.iter_mut() {
            if *slot == old {
                *slot = new;
            }
        }
        let verts = face.vertices;
        remove_handle(&mut self.vertices[old as usize].faces, f);
        add_unique(&mut self.vertices[new as usize].faces, f);

        for &w in &verts {
            self.remove_if_non_neighbor(old, w);
            self.remove_if_non_neighbor(w, old);
        }
        for i in 0..3 {
            for j in 0..3 {
                if i != j {
                    add_unique(&mut self.vertices[verts[i] as usize].neighbors, verts[j]);
                }
            }
        }
        let p = verts.map(|v| self.vertices[v as usize].position);
        self.faces[f as usize].normal = face_normal(p);
    }

    fn collapse(&mut self, u: u32, target: Option<u32>) {
        let former: Handles = self.vertices[u as usize].neighbors.clone();

        if let Some(v) = target {
            let faces: Handles = self.vertices[u as usize].faces.clone();
            for &f in &faces {
                if self.faces[f as usize].alive && self.faces[f as usize].has(v) {
                    self.remove_face(f);
                }
            }
            let faces: Handles = self.vertices[u as usize].faces.clone();
            for &f in &faces {
                self.replace_vertex(f, u, v);
            }
        }

        let leftover: Handles = self.vertices[u as usize].neighbors.clone();
        for &n in &leftover {
            remove_handle(&mut self.vertices[n as usize].neighbors, u);
        }
        let vertex = &mut self.vertices[u as usize];
        vertex.neighbors.clear();
        vertex.faces.clear();
        vertex.alive = false;

        for &n in &former {
            if self.vertices[n as usize].alive {
                self.update_cost(n);
            }
        }
    }
}

/// Compute a full collapse ordering for a triangle mesh.
pub fn reduce(positions: &[Vec3], triangles: &[[u32; 3]], options: &ReduceOptions) -> Result<Reduction> {
    let count = positions.len();
    if count > options.max_vertices {
        return Err(Error::LimitExceeded {
            count,
            limit: options.max_vertices,
        });
    }
    let _span = info_span!("reduce", vertices = count, triangles = triangles.len()).entered();

    let mut graph = Graph::build(positions, triangles)?;
    for u in 0..count as u32 {
        graph.update_cost(u);
    }

    let mut rank = vec![0u32; count];
    let mut target = vec![None; count];
    let mut min_lod = None;
    let mut remaining = count;
    let mut step = 0u32;
    let interval = options.check_interval.max(1);

    while let Some(candidate) = graph.heap.pop() {
        let vertex = &graph.vertices[candidate.vertex as usize];
        if !vertex.alive || vertex.stamp != candidate.stamp {
            continue;
        }
        if step as usize % interval == 0 && options.is_cancelled() {
            return Err(Error::Cancelled);
        }

        if min_lod.is_none() && candidate.cost >= SILHOUETTE_PENALTY {
            min_lod = Some(remaining as u32);
        }

        let u = candidate.vertex;
        let to = vertex.target;
        rank[u as usize] = step;
        target[u as usize] = to;
        graph.collapse(u, to);

        step += 1;
        remaining -= 1;
    }

    let min_lod = min_lod.unwrap_or(0);
    info!(vertices = count, min_lod, "reduction complete");
    Ok(Reduction { rank, target, min_lod })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lod::CancelToken;

    fn cube() -> (Vec<Vec3>, Vec<[u32; 3]>) {
        let positions = vec![
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(1.0, 1.0, 0.0),
            Vec3::new(0.0, 1.0, 0.0),
            Vec3::new(0.0, 0.0, 1.0),
            Vec3::new(1.0, 0.0, 1.0),
            Vec3::new(1.0, 1.0, 1.0),
            Vec3::new(0.0, 1.0, 1.0),
        ];
        let triangles = vec![
            [0, 2, 1], [0, 3, 2],
            [4, 5, 6], [4, 6, 7],
            [0, 1, 5], [0, 5, 4],
            [1, 2, 6], [1, 6, 5],
            [2, 3, 7], [2, 7, 6],
            [3, 0, 4], [3, 4, 7],
        ];
        (positions, triangles)
    }

    #[test]
    fn test_cube_terminates_with_permutation() {
        let (positions, triangles) = cube();
        let r = reduce(&positions, &triangles, &ReduceOptions::default()).unwrap();

        let mut ranks = r.rank.clone();
        ranks.sort_unstable();
        assert_eq!(ranks, (0..8).collect::<Vec<u32>>());

        for (v, t) in r.target.iter().enumerate() {
            if let Some(t) = t {
                assert!((*t as usize) < 8);
                assert_ne!(*t as usize, v);
                assert!(r.rank[*t as usize] > r.rank[v], "target must outlive its source");
            }
        }
        // closed surface never reaches the silhouette penalty
        assert_eq!(r.min_lod, 0);
    }

    #[test]
    fn test_last_vertex_is_isolated() {
        let (positions, triangles) = cube();
        let r = reduce(&positions, &triangles, &ReduceOptions::default()).unwrap();
        let last = r.rank.iter().position(|&x| x == 7).unwrap();
        assert_eq!(r.target[last], None);
    }

    #[test]
    fn test_open_quad_hits_silhouette() {
        let positions = vec![
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(1.0, 1.0, 0.0),
            Vec3::new(0.0, 1.0, 0.0),
        ];
        let r = reduce(&positions, &[[0, 1, 2], [0, 2, 3]], &ReduceOptions::default()).unwrap();
        assert_eq!(r.min_lod, 4);
    }

    #[test]
    fn test_isolated_vertices_go_first() {
        let (mut positions, triangles) = cube();
        positions.push(Vec3::splat(5.0));
        let r = reduce(&positions, &triangles, &ReduceOptions::default()).unwrap();
        assert_eq!(r.rank[8], 0);
        assert_eq!(r.target[8], None);
    }

    #[test]
    fn test_bad_index() {
        let err = reduce(&[Vec3::ZERO; 3], &[[0, 1, 3]], &ReduceOptions::default()).unwrap_err();
        assert!(matches!(err, Error::BadIndex { index: 3, .. }));
    }

    #[test]
    fn test_limit_and_cancel() {
        let (positions, triangles) = cube();
        let tight = ReduceOptions::default().with_max_vertices(4);
        assert!(matches!(
            reduce(&positions, &triangles, &tight),
            Err(Error::LimitExceeded { count: 8, limit: 4 })
        ));

        let token = CancelToken::new();
        token.cancel();
        let opts = ReduceOptions::default().with_cancel(token);
        assert!(matches!(reduce(&positions, &triangles, &opts), Err(Error::Cancelled)));
    }
}
