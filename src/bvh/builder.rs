//! Binned-SAH top-down builder: `calc_node_min_max`, `calc_node_cost`,
//! `find_best_split_plane`, `subdivide_node`. Triangle indices are
//! partitioned in place with a Hoare-style scan (swap into place from the
//! right rather than a stable partition), and node slot 1 is reserved for
//! cache alignment with slot 0 as the root.

use crate::geometry::{Triangle, Vertex};
use crate::math::Vec3;

use super::{BuildOptions, BvhNode};

pub struct BuildOutput {
    pub nodes: Vec<BvhNode>,
    pub triangles: Vec<Triangle>,
    pub triangle_indices: Vec<u32>,
}

struct Bin {
    aabb_min: Vec3,
    aabb_max: Vec3,
    prim_count: u32,
}

impl Bin {
    fn empty() -> Self {
        Self {
            aabb_min: Vec3::splat(f32::MAX),
            aabb_max: Vec3::splat(f32::MIN),
            prim_count: 0,
        }
    }

    fn half_area(&self) -> f32 {
        let e = self.aabb_max - self.aabb_min;
        e.x * e.y + e.y * e.z + e.z * e.x
    }
}

fn half_area(min: Vec3, max: Vec3) -> f32 {
    let e = max - min;
    e.x * e.y + e.y * e.z + e.z * e.x
}

struct Builder<'a> {
    opts: &'a BuildOptions,
    tris: Vec<Triangle>,
    tri_indices: Vec<u32>,
    tri_centroids: Vec<Vec3>,
    nodes: Vec<BvhNode>,
}

pub fn build(vertices: &[Vertex], indices: &[u32], opts: &BuildOptions) -> BuildOutput {
    let tri_count = indices.len() / 3;

    let tris: Vec<Triangle> = (0..tri_count)
        .map(|i| {
            let i0 = indices[i * 3] as usize;
            let i1 = indices[i * 3 + 1] as usize;
            let i2 = indices[i * 3 + 2] as usize;
            Triangle {
                p0: vertices[i0].position,
                p1: vertices[i1].position,
                p2: vertices[i2].position,
                n0: vertices[i0].normal,
                n1: vertices[i1].normal,
                n2: vertices[i2].normal,
            }
        })
        .collect();

    let tri_centroids: Vec<Vec3> = tris.iter().map(Triangle::centroid).collect();
    let tri_indices: Vec<u32> = (0..tri_count as u32).collect();

    // Reserve 2x node capacity (every split adds two children); node slot 1
    // is skipped for cache alignment with the root at slot 0, as in the
    // source.
    let mut nodes = Vec::with_capacity(tri_count * 2);
    nodes.push(BvhNode {
        aabb_min: Vec3::splat(f32::MAX),
        left_first: 0,
        aabb_max: Vec3::splat(f32::MIN),
        prim_count: tri_count as u32,
    });
    nodes.push(BvhNode {
        aabb_min: Vec3::ZERO,
        left_first: 0,
        aabb_max: Vec3::ZERO,
        prim_count: 0,
    });

    let mut builder = Builder {
        opts,
        tris,
        tri_indices,
        tri_centroids,
        nodes,
    };

    let (centroid_min, centroid_max) = builder.calc_node_min_max(0);
    builder.subdivide_node(0, centroid_min, centroid_max);

    BuildOutput {
        nodes: builder.nodes,
        triangles: builder.tris,
        triangle_indices: builder.tri_indices,
    }
}

impl Builder<'_> {
    fn calc_node_min_max(&mut self, node_idx: usize) -> (Vec3, Vec3) {
        let mut aabb_min = Vec3::splat(f32::MAX);
        let mut aabb_max = Vec3::splat(f32::MIN);
        let mut centroid_min = Vec3::splat(f32::MAX);
        let mut centroid_max = Vec3::splat(f32::MIN);

        let node = &self.nodes[node_idx];
        let first = node.left_first;
        let count = node.prim_count;

        for tri_idx in first..first + count {
            let triangle = &self.tris[self.tri_indices[tri_idx as usize] as usize];
            let (tri_min, tri_max) = triangle.min_max();
            aabb_min = aabb_min.min(tri_min);
            aabb_max = aabb_max.max(tri_max);

            let centroid = self.tri_centroids[self.tri_indices[tri_idx as usize] as usize];
            centroid_min = centroid_min.min(centroid);
            centroid_max = centroid_max.max(centroid);
        }

        let node = &mut self.nodes[node_idx];
        node.aabb_min = aabb_min;
        node.aabb_max = aabb_max;

        (centroid_min, centroid_max)
    }

    fn calc_node_cost(&self, node_idx: usize) -> f32 {
        let node = &self.nodes[node_idx];
        node.prim_count as f32 * half_area(node.aabb_min, node.aabb_max)
    }

    fn find_best_split_plane(
        &self,
        node_idx: usize,
        centroid_min: Vec3,
        centroid_max: Vec3,
    ) -> (f32, usize, u32) {
        let node = &self.nodes[node_idx];
        let first = node.left_first;
        let count = node.prim_count;
        let bin_count = self.opts.interval_count as usize;

        let mut best_cost = f32::MAX;
        let mut best_axis = 0usize;
        let mut best_split_pos = 0u32;

        for axis in 0..3 {
            let bounds_min = centroid_min[axis];
            let bounds_max = centroid_max[axis];
            if bounds_min == bounds_max {
                continue;
            }

            let mut bins: Vec<Bin> = (0..bin_count).map(|_| Bin::empty()).collect();
            let bin_scale = bin_count as f32 / (bounds_max - bounds_min);

            for tri_idx in first..first + count {
                let triangle = &self.tris[self.tri_indices[tri_idx as usize] as usize];
                let centroid = self.tri_centroids[self.tri_indices[tri_idx as usize] as usize];

                let bin_idx = ((bin_count as i32 - 1).min(
                    ((centroid[axis] - bounds_min) * bin_scale) as i32,
                )).max(0) as usize;

                let bin = &mut bins[bin_idx];
                bin.prim_count += 1;
                bin.aabb_min = bin.aabb_min.min(triangle.p0).min(triangle.p1).min(triangle.p2);
                bin.aabb_max = bin.aabb_max.max(triangle.p0).max(triangle.p1).max(triangle.p2);
            }

            let mut left_area = vec![0f32; bin_count - 1];
            let mut right_area = vec![0f32; bin_count - 1];

            let mut left_min = Vec3::splat(f32::MAX);
            let mut left_max = Vec3::splat(f32::MIN);
            let mut right_min = Vec3::splat(f32::MAX);
            let mut right_max = Vec3::splat(f32::MIN);
            let mut left_sum = 0u32;
            let mut right_sum = 0u32;

            for bin_idx in 0..bin_count - 1 {
                let left_bin = &bins[bin_idx];
                left_sum += left_bin.prim_count;
                left_min = left_min.min(left_bin.aabb_min);
                left_max = left_max.max(left_bin.aabb_max);
                left_area[bin_idx] = left_sum as f32 * half_area(left_min, left_max);

                let right_bin = &bins[bin_count - 1 - bin_idx];
                right_sum += right_bin.prim_count;
                right_min = right_min.min(right_bin.aabb_min);
                right_max = right_max.max(right_bin.aabb_max);
                right_area[bin_count - 2 - bin_idx] = right_sum as f32 * half_area(right_min, right_max);
            }

            for bin_idx in 0..bin_count - 1 {
                let plane_cost = left_area[bin_idx] + right_area[bin_idx];
                if plane_cost < best_cost {
                    best_cost = plane_cost;
                    best_axis = axis;
                    best_split_pos = bin_idx as u32 + 1;
                }
            }
        }

        (best_cost, best_axis, best_split_pos)
    }

    fn subdivide_node(&mut self, node_idx: usize, centroid_min: Vec3, centroid_max: Vec3) {
        let (split_cost, split_axis, split_pos) =
            self.find_best_split_plane(node_idx, centroid_min, centroid_max);

        if self.opts.subdivide_single_prim {
            if self.nodes[node_idx].prim_count == 1 {
                return;
            }
        } else {
            let parent_cost = self.calc_node_cost(node_idx);
            if split_cost >= parent_cost {
                return;
            }
        }

        let node = &self.nodes[node_idx];
        let mut i = node.left_first as i64;
        let mut j = i + node.prim_count as i64 - 1;
        let bin_count = self.opts.interval_count as f32;
        let bin_scale = bin_count / (centroid_max[split_axis] - centroid_min[split_axis]);

        while i <= j {
            let centroid = self.tri_centroids[self.tri_indices[i as usize] as usize];
            let bin_idx = ((self.opts.interval_count as i32 - 1).min(
                ((centroid[split_axis] - centroid_min[split_axis]) * bin_scale) as i32,
            )) as i64;

            if bin_idx < split_pos as i64 {
                i += 1;
            } else {
                self.tri_indices.swap(i as usize, j as usize);
                j -= 1;
            }
        }

        let node = &self.nodes[node_idx];
        let prim_count_left = (i - node.left_first as i64) as u32;
        if prim_count_left == 0 || prim_count_left == node.prim_count {
            return;
        }

        let left_first = node.left_first;
        let total_count = node.prim_count;

        let left_idx = self.nodes.len();
        self.nodes.push(BvhNode {
            aabb_min: Vec3::ZERO,
            left_first,
            aabb_max: Vec3::ZERO,
            prim_count: prim_count_left,
        });

        let right_idx = self.nodes.len();
        self.nodes.push(BvhNode {
            aabb_min: Vec3::ZERO,
            left_first: i as u32,
            aabb_max: Vec3::ZERO,
            prim_count: total_count - prim_count_left,
        });

        let node = &mut self.nodes[node_idx];
        node.left_first = left_idx as u32;
        node.prim_count = 0;

        let (left_centroid_min, left_centroid_max) = self.calc_node_min_max(left_idx);
        self.subdivide_node(left_idx, left_centroid_min, left_centroid_max);

        let (right_centroid_min, right_centroid_max) = self.calc_node_min_max(right_idx);
        self.subdivide_node(right_idx, right_centroid_min, right_centroid_max);
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::geometry::Vertex;

    fn quad_mesh() -> (Vec<Vertex>, Vec<u32>) {
        let vertices = vec![
            Vertex { position: Vec3::new(-1.0, 0.0, -1.0), normal: Vec3::Y },
            Vertex { position: Vec3::new(1.0, 0.0, -1.0), normal: Vec3::Y },
            Vertex { position: Vec3::new(1.0, 0.0, 1.0), normal: Vec3::Y },
            Vertex { position: Vec3::new(-1.0, 0.0, 1.0), normal: Vec3::Y },
        ];
        (vertices, vec![0, 1, 2, 0, 2, 3])
    }

    #[test]
    fn single_triangle_builds_a_two_node_tree() {
        let vertices = vec![
            Vertex { position: Vec3::new(0.0, 0.0, 0.0), normal: Vec3::Y },
            Vertex { position: Vec3::new(1.0, 0.0, 0.0), normal: Vec3::Y },
            Vertex { position: Vec3::new(0.0, 1.0, 0.0), normal: Vec3::Y },
        ];
        let out = build(&vertices, &[0, 1, 2], &BuildOptions::default());

        assert_eq!(out.nodes[0].prim_count, 1);
        assert_eq!(out.triangles.len(), 1);
    }

    #[test]
    fn root_aabb_contains_all_triangles() {
        let (vertices, indices) = quad_mesh();
        let out = build(&vertices, &indices, &BuildOptions::default());
        let root = &out.nodes[0];

        for v in &vertices {
            assert!(v.position.cmpge(root.aabb_min).all());
            assert!(v.position.cmple(root.aabb_max).all());
        }
    }

    #[test]
    fn all_triangle_indices_are_present_exactly_once() {
        let (vertices, indices) = quad_mesh();
        let out = build(&vertices, &indices, &BuildOptions::default());

        let mut sorted = out.triangle_indices.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, vec![0, 1]);
    }

    fn random_triangle_mesh(triangle_count: usize, coords: &[f32]) -> (Vec<Vertex>, Vec<u32>) {
        let mut vertices = Vec::with_capacity(triangle_count * 3);
        let mut indices = Vec::with_capacity(triangle_count * 3);
        for t in 0..triangle_count {
            for v in 0..3 {
                let base = (t * 9 + v * 3) % coords.len();
                vertices.push(Vertex {
                    position: Vec3::new(coords[base], coords[(base + 1) % coords.len()], coords[(base + 2) % coords.len()]),
                    normal: Vec3::Y,
                });
                indices.push((t * 3 + v) as u32);
            }
        }
        (vertices, indices)
    }

    proptest::proptest! {
        /// For every BLAS built, `root.aabb` encloses every triangle vertex,
        /// and for every interior node, `node.aabb` encloses both child
        /// AABBs — checked over arbitrary triangle soups rather than the
        /// hand-built meshes above.
        #[test]
        fn root_and_interior_aabbs_enclose_their_contents(
            triangle_count in 1usize..40,
            coords in proptest::collection::vec(-50.0f32..50.0, 16..64),
        ) {
            let (vertices, indices) = random_triangle_mesh(triangle_count, &coords);
            let out = build(&vertices, &indices, &BuildOptions::default());

            let root = &out.nodes[0];
            for v in &vertices {
                proptest::prop_assert!(v.position.cmpge(root.aabb_min).all());
                proptest::prop_assert!(v.position.cmple(root.aabb_max).all());
            }

            for node in &out.nodes {
                if node.prim_count == 0 && node.left_first != 0 {
                    let left = &out.nodes[node.left_first as usize];
                    let right = &out.nodes[node.left_first as usize + 1];
                    proptest::prop_assert!(left.aabb_min.cmpge(node.aabb_min).all());
                    proptest::prop_assert!(left.aabb_max.cmple(node.aabb_max).all());
                    proptest::prop_assert!(right.aabb_min.cmpge(node.aabb_min).all());
                    proptest::prop_assert!(right.aabb_max.cmple(node.aabb_max).all());
                }
            }
        }
    }
}
