use std::f32::consts::PI;

use bytemuck::NoUninit;
use glam::Vec3;
use wgpu::util::DeviceExt;

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, NoUninit)]
pub struct Vertex {
    pub pos: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
}

pub struct MeshBuffer {
    pub vertex_buffer: wgpu::Buffer,
    pub index_buffer: wgpu::Buffer,
    pub index_count: u32,
}

#[derive(Debug, Clone)]
pub struct Mesh {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
}

impl Mesh {
    pub fn upload(&self, device: &wgpu::Device) -> MeshBuffer {
        let vertices = bytemuck::cast_slice(&self.vertices);
        let indices = bytemuck::cast_slice(&self.indices);

        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Mesh Vertex Buffer"),
            contents: vertices,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
        });
        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Mesh Index Buffer"),
            contents: indices,
            usage: wgpu::BufferUsages::INDEX,
        });

        MeshBuffer {
            vertex_buffer,
            index_buffer,
            index_count: self.indices.len() as u32,
        }
    }
}

/// UV sphere laid out row by row from the north pole, like three.js SphereGeometry
pub fn sphere_mesh(radius: f32, width_segments: u32, height_segments: u32) -> Mesh {
    let width_segments = width_segments.max(3);
    let height_segments = height_segments.max(2);

    let mut vertices = Vec::with_capacity(((width_segments + 1) * (height_segments + 1)) as usize);
    for iy in 0..=height_segments {
        let v = iy as f32 / height_segments as f32;
        let theta = v * PI;
        for ix in 0..=width_segments {
            let u = ix as f32 / width_segments as f32;
            let phi = u * 2.0 * PI;
            let pos = Vec3::new(
                -radius * phi.cos() * theta.sin(),
                radius * theta.cos(),
                radius * phi.sin() * theta.sin(),
            );
            let normal = pos.normalize_or_zero();
            vertices.push(Vertex {
                pos: pos.to_array(),
                normal: normal.to_array(),
                uv: [u, v],
            });
        }
    }

    let row = width_segments + 1;
    let mut indices = Vec::new();
    for iy in 0..height_segments {
        for ix in 0..width_segments {
            let a = iy * row + ix + 1;
            let b = iy * row + ix;
            let c = (iy + 1) * row + ix;
            let d = (iy + 1) * row + ix + 1;
            // Pole rows collapse to a single triangle
            if iy != 0 {
                indices.extend_from_slice(&[a, b, d]);
            }
            if iy != height_segments - 1 {
                indices.extend_from_slice(&[b, c, d]);
            }
        }
    }

    Mesh { vertices, indices }
}

/// Axis-aligned box with 4 unshared vertices per face (+x, -x, +y, -y, +z, -z)
pub fn box_mesh(size: Vec3) -> Mesh {
    let half = size * 0.5;
    // (normal, u, v) with u x v == normal so corners wind counter-clockwise
    let faces = [
        (Vec3::X, Vec3::NEG_Z, Vec3::Y),
        (Vec3::NEG_X, Vec3::Z, Vec3::Y),
        (Vec3::Y, Vec3::X, Vec3::NEG_Z),
        (Vec3::NEG_Y, Vec3::X, Vec3::Z),
        (Vec3::Z, Vec3::X, Vec3::Y),
        (Vec3::NEG_Z, Vec3::NEG_X, Vec3::Y),
    ];

    let mut vertices = Vec::with_capacity(24);
    let mut indices = Vec::with_capacity(36);
    for (normal, u, v) in faces {
        let base = vertices.len() as u32;
        let corners = [(-1.0, 1.0, [0.0, 0.0]), (1.0, 1.0, [1.0, 0.0]), (-1.0, -1.0, [0.0, 1.0]), (1.0, -1.0, [1.0, 1.0])];
        for (su, sv, uv) in corners {
            let pos = (normal + u * su + v * sv) * half;
            vertices.push(Vertex {
                pos: pos.to_array(),
                normal: normal.to_array(),
                uv,
            });
        }
        indices.extend_from_slice(&[base, base + 2, base + 1, base + 2, base + 3, base + 1]);
    }

    Mesh { vertices, indices }
}

#[cfg(test)]
pub(crate) fn approx_eq(a: f32, b: f32, epsilon: f32) -> bool {
    (a - b).abs() < epsilon
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triangle_normal(mesh: &Mesh, tri: &[u32]) -> Vec3 {
        let p = |i: u32| Vec3::from_array(mesh.vertices[i as usize].pos);
        (p(tri[1]) - p(tri[0])).cross(p(tri[2]) - p(tri[0]))
    }

    #[test]
    fn test_sphere_counts_and_radius() {
        let mesh = sphere_mesh(4.0, 32, 32);
        assert_eq!(mesh.vertices.len(), 33 * 33);
        // two triangles per quad minus one per pole quad
        assert_eq!(mesh.indices.len(), (32 * 32 * 2 - 2 * 32) * 3);
        for v in &mesh.vertices {
            assert!(approx_eq(Vec3::from_array(v.pos).length(), 4.0, 1e-4));
        }
    }

    #[test]
    fn test_sphere_triangles_face_outwards() {
        let mesh = sphere_mesh(1.0, 8, 8);
        for tri in mesh.indices.chunks(3) {
            let centroid = tri
                .iter()
                .map(|&i| Vec3::from_array(mesh.vertices[i as usize].pos))
                .sum::<Vec3>()
                / 3.0;
            assert!(triangle_normal(&mesh, tri).dot(centroid) > 0.0);
        }
    }

    #[test]
    fn test_box_layout() {
        let mesh = box_mesh(Vec3::ONE);
        assert_eq!(mesh.vertices.len(), 24);
        assert_eq!(mesh.indices.len(), 36);
        assert_eq!(mesh.vertices[0].pos, [0.5, 0.5, 0.5]);
        for (face, tri) in mesh.indices.chunks(3).enumerate() {
            let normal = Vec3::from_array(mesh.vertices[tri[0] as usize].normal);
            assert!(triangle_normal(&mesh, tri).dot(normal) > 0.0, "triangle {face} winds inwards");
        }
    }
}
