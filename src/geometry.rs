use std::f32::consts::TAU;

use bytemuck::{Pod, Zeroable};
use glam::{vec3, Vec3};

#[derive(Debug, Copy, Clone, Default, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct MeshVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub color: [f32; 4],
    /// Base color texture coordinate. Unused by untextured meshes.
    pub uv: [f32; 2],
}

impl MeshVertex {
    pub fn new(position: Vec3, normal: Vec3, color: [f32; 4]) -> Self {
        Self {
            position: position.to_array(),
            normal: normal.to_array(),
            color,
            uv: [0.0; 2],
        }
    }

    pub fn with_uv(self, uv: [f32; 2]) -> Self {
        Self { uv, ..self }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshData {
    pub vertices: Vec<MeshVertex>,
    pub indices: Vec<u32>,
}

impl MeshData {
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Distance from the origin to the farthest vertex.
    pub fn bounding_radius(&self) -> f32 {
        self.vertices
            .iter()
            .map(|v| Vec3::from(v.position).length())
            .fold(0.0, f32::max)
    }

    /// Appends another mesh, rebasing its indices.
    pub fn append(&mut self, other: MeshData) {
        let base = self.vertices.len() as u32;
        self.vertices.extend(other.vertices);
        self.indices.extend(other.indices.into_iter().map(|i| i + base));
    }
}

const WHITE: [f32; 4] = [1.0, 1.0, 1.0, 1.0];

/// Icosahedron projected onto a sphere. Every face is split into
/// `(detail + 1)²` triangles. Vertices are not shared, so each face keeps its
/// own flat normal.
pub fn icosahedron(radius: f32, detail: u32) -> MeshData {
    let t = (1.0 + 5f32.sqrt()) / 2.0;
    let corners = [
        vec3(-1.0, t, 0.0),
        vec3(1.0, t, 0.0),
        vec3(-1.0, -t, 0.0),
        vec3(1.0, -t, 0.0),
        vec3(0.0, -1.0, t),
        vec3(0.0, 1.0, t),
        vec3(0.0, -1.0, -t),
        vec3(0.0, 1.0, -t),
        vec3(t, 0.0, -1.0),
        vec3(t, 0.0, 1.0),
        vec3(-t, 0.0, -1.0),
        vec3(-t, 0.0, 1.0),
    ];
    const FACES: [[usize; 3]; 20] = [
        [0, 11, 5],
        [0, 5, 1],
        [0, 1, 7],
        [0, 7, 10],
        [0, 10, 11],
        [1, 5, 9],
        [5, 11, 4],
        [11, 10, 2],
        [10, 7, 6],
        [7, 1, 8],
        [3, 9, 4],
        [3, 4, 2],
        [3, 2, 6],
        [3, 6, 8],
        [3, 8, 9],
        [4, 9, 5],
        [2, 4, 11],
        [6, 2, 10],
        [8, 6, 7],
        [9, 8, 1],
    ];

    let segments = detail + 1;
    let mut mesh = MeshData::default();

    for [a, b, c] in FACES {
        let (a, b, c) = (corners[a], corners[b], corners[c]);

        // Grid of points across the face: row i runs from the a-c edge to the
        // b-c edge.
        let rows: Vec<Vec<Vec3>> = (0..=segments)
            .map(|i| {
                let ta = a.lerp(c, i as f32 / segments as f32);
                let tb = b.lerp(c, i as f32 / segments as f32);
                let cols = segments - i;
                (0..=cols)
                    .map(|j| {
                        if cols == 0 {
                            ta
                        } else {
                            ta.lerp(tb, j as f32 / cols as f32)
                        }
                    })
                    .collect()
            })
            .collect();

        for i in 0..segments as usize {
            let cols = segments as usize - i;
            for j in 0..(2 * cols - 1) {
                let k = j / 2;
                let tri = if j % 2 == 0 {
                    [rows[i][k + 1], rows[i + 1][k], rows[i][k]]
                } else {
                    [rows[i][k + 1], rows[i + 1][k + 1], rows[i + 1][k]]
                };
                push_flat_triangle(&mut mesh, tri.map(|p| p.normalize() * radius));
            }
        }
    }

    mesh
}

fn push_flat_triangle(mesh: &mut MeshData, [a, b, c]: [Vec3; 3]) {
    let mut normal = (b - a).cross(c - a).normalize_or_zero();
    // Keep faces wound outwards.
    let (b, c) = if normal.dot(a + b + c) < 0.0 {
        normal = -normal;
        (c, b)
    } else {
        (b, c)
    };

    let base = mesh.vertices.len() as u32;
    for p in [a, b, c] {
        mesh.vertices.push(MeshVertex::new(p, normal, WHITE));
    }
    mesh.indices.extend_from_slice(&[base, base + 1, base + 2]);
}

/// Evenly spaced points on a circle in the xy plane, drawn as the loading
/// spinner.
pub fn spinner_ring(count: usize, radius: f32) -> Vec<f32> {
    (0..count)
        .flat_map(|i| {
            let angle = TAU * i as f32 / count as f32;
            [radius * angle.cos(), radius * angle.sin(), 0.0]
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;

    #[test]
    fn base_icosahedron_has_twenty_faces() {
        let mesh = icosahedron(1.0, 0);
        assert_eq!(mesh.triangle_count(), 20);
        assert_eq!(mesh.vertices.len(), 60);
    }

    #[test]
    fn detail_one_splits_faces_in_four() {
        let mesh = icosahedron(1.0, 1);
        assert_eq!(mesh.triangle_count(), 80);
    }

    #[test]
    fn vertices_lie_on_the_sphere() {
        let mesh = icosahedron(2.0, 2);
        assert_eq!(mesh.triangle_count(), 180);
        for v in &mesh.vertices {
            assert_abs_diff_eq!(Vec3::from(v.position).length(), 2.0, epsilon = 1e-5);
        }
        assert_abs_diff_eq!(mesh.bounding_radius(), 2.0, epsilon = 1e-5);
    }

    #[test]
    fn normals_point_outwards() {
        let mesh = icosahedron(1.0, 1);
        for tri in mesh.vertices.chunks_exact(3) {
            let centroid = tri
                .iter()
                .fold(Vec3::ZERO, |acc, v| acc + Vec3::from(v.position))
                / 3.0;
            let normal = Vec3::from(tri[0].normal);
            assert!(normal.dot(centroid) > 0.0);
            assert_abs_diff_eq!(normal.length(), 1.0, epsilon = 1e-5);
        }
    }

    #[test]
    fn append_rebases_indices() {
        let mut a = icosahedron(1.0, 0);
        let b = icosahedron(1.0, 0);
        a.append(b);
        assert_eq!(a.triangle_count(), 40);
        assert_eq!(a.indices[60], 60);
        assert_eq!(*a.indices.last().unwrap(), 119);
    }

    #[test]
    fn spinner_ring_is_evenly_spaced() {
        let ring = spinner_ring(12, 0.5);
        assert_eq!(ring.len(), 36);
        for p in ring.chunks_exact(3) {
            assert_abs_diff_eq!(vec3(p[0], p[1], p[2]).length(), 0.5, epsilon = 1e-6);
        }
    }
}
