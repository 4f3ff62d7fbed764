//! Static mesh post-processing.
//!
//! Baking a static mesh runs the recorded vertex stream through a fixed
//! pipeline: weld identical vertices into an indexed mesh, reorder
//! triangles for the post-transform vertex cache, reorder clusters of
//! triangles to reduce overdraw (within a bounded cache regression), and
//! finally reorder the vertex buffer to match the first-use order of the
//! indices.

use std::collections::HashMap;

/// Post-transform cache size assumed by the scoring model.
const CACHE_SIZE: usize = 32;

/// Maximum allowed ACMR regression when reordering for overdraw.
pub const OVERDRAW_THRESHOLD: f32 = 1.05;

/// Triangles per overdraw cluster.
const CLUSTER_TRIANGLES: usize = 64;

/// Weld byte-identical vertices.
///
/// Returns the number of unique vertices and, for each input vertex, the
/// index it maps to. Unique vertices keep their first-seen order, so a
/// stream without duplicates maps to itself.
pub fn generate_vertex_remap(vertices: &[u8], stride: usize) -> (u32, Vec<u32>) {
    assert!(stride > 0 && vertices.len() % stride == 0, "malformed vertex buffer");

    let count = vertices.len() / stride;
    let mut remap = Vec::with_capacity(count);
    let mut seen: HashMap<&[u8], u32> = HashMap::with_capacity(count);
    let mut unique = 0u32;

    for i in 0..count {
        let bytes = &vertices[i * stride..(i + 1) * stride];
        let index = *seen.entry(bytes).or_insert_with(|| {
            let index = unique;
            unique += 1;
            index
        });
        remap.push(index);
    }

    (unique, remap)
}

/// Rewrite an index stream through a remap table.
pub fn remap_index_buffer(indices: &[u32], remap: &[u32]) -> Vec<u32> {
    indices.iter().map(|&i| remap[i as usize]).collect()
}

/// Build the welded vertex buffer: one record per unique vertex, in
/// remap-target order.
pub fn remap_vertex_buffer(
    vertices: &[u8],
    stride: usize,
    unique_count: u32,
    remap: &[u32],
) -> Vec<u8> {
    let mut out = vec![0u8; unique_count as usize * stride];
    for (i, &target) in remap.iter().enumerate() {
        let dst = target as usize * stride;
        out[dst..dst + stride].copy_from_slice(&vertices[i * stride..(i + 1) * stride]);
    }
    out
}

fn vertex_score(cache_position: Option<usize>, remaining_valence: u32) -> f32 {
    if remaining_valence == 0 {
        return -1.0;
    }

    let cache_score = match cache_position {
        None => 0.0,
        // Vertices of the last emitted triangle share a flat score so the
        // walk does not degenerate into a strip.
        Some(p) if p < 3 => 0.75,
        Some(p) => {
            let s = 1.0 - (p as f32 - 3.0) / (CACHE_SIZE as f32 - 3.0);
            s * s.sqrt()
        }
    };

    // Favor low-valence vertices so isolated corners get retired early.
    cache_score + 2.0 / (remaining_valence as f32).sqrt()
}

/// Reorder triangles to improve post-transform cache locality.
///
/// Greedy score-driven walk over the triangle adjacency: each step emits
/// the highest-scoring triangle reachable from the simulated LRU cache,
/// falling back to a global scan when the cache neighborhood is spent.
pub fn optimize_vertex_cache(indices: &[u32], vertex_count: u32) -> Vec<u32> {
    assert!(indices.len() % 3 == 0, "index count not a multiple of 3");

    let triangle_count = indices.len() / 3;
    if triangle_count == 0 {
        return Vec::new();
    }

    let vertex_count = vertex_count as usize;

    // Per-vertex adjacency.
    let mut valence = vec![0u32; vertex_count];
    for &i in indices {
        valence[i as usize] += 1;
    }
    let mut adjacency_offsets = vec![0usize; vertex_count + 1];
    for v in 0..vertex_count {
        adjacency_offsets[v + 1] = adjacency_offsets[v] + valence[v] as usize;
    }
    let mut adjacency = vec![0u32; indices.len()];
    {
        let mut cursor = adjacency_offsets.clone();
        for (t, tri) in indices.chunks(3).enumerate() {
            for &v in tri {
                adjacency[cursor[v as usize]] = t as u32;
                cursor[v as usize] += 1;
            }
        }
    }

    let mut scores: Vec<f32> = (0..vertex_count)
        .map(|v| vertex_score(None, valence[v]))
        .collect();
    let mut triangle_scores: Vec<f32> = indices
        .chunks(3)
        .map(|tri| tri.iter().map(|&v| scores[v as usize]).sum())
        .collect();
    let mut emitted = vec![false; triangle_count];

    let mut cache: Vec<u32> = Vec::with_capacity(CACHE_SIZE + 3);
    let mut output = Vec::with_capacity(indices.len());

    let mut best = triangle_scores
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.total_cmp(b.1))
        .map(|(t, _)| t);

    while let Some(triangle) = best {
        emitted[triangle] = true;
        let tri = &indices[triangle * 3..triangle * 3 + 3];
        output.extend_from_slice(tri);

        for &v in tri {
            valence[v as usize] -= 1;
            cache.retain(|&c| c != v);
        }
        // Newest entries sit at the front of the simulated LRU cache.
        for &v in tri.iter().rev() {
            cache.insert(0, v);
        }
        cache.truncate(CACHE_SIZE + 3);

        for (position, &v) in cache.iter().enumerate() {
            let v = v as usize;
            let slot = if position < CACHE_SIZE { Some(position) } else { None };
            let new_score = vertex_score(slot, valence[v]);
            let delta = new_score - scores[v];
            scores[v] = new_score;

            for &t in &adjacency[adjacency_offsets[v]..adjacency_offsets[v + 1]] {
                if !emitted[t as usize] {
                    triangle_scores[t as usize] += delta;
                }
            }
        }

        // Next candidate: best unemitted triangle touching the cache,
        // falling back to a full scan when the neighborhood is exhausted.
        best = cache
            .iter()
            .flat_map(|&v| {
                let v = v as usize;
                adjacency[adjacency_offsets[v]..adjacency_offsets[v + 1]].iter()
            })
            .filter(|&&t| !emitted[t as usize])
            .max_by(|a, b| triangle_scores[**a as usize].total_cmp(&triangle_scores[**b as usize]))
            .map(|&t| t as usize)
            .or_else(|| {
                emitted
                    .iter()
                    .enumerate()
                    .filter(|(_, &done)| !done)
                    .max_by(|a, b| triangle_scores[a.0].total_cmp(&triangle_scores[b.0]))
                    .map(|(t, _)| t)
            });
    }

    output
}

fn position(vertices: &[u8], stride: usize, index: u32) -> [f32; 3] {
    let base = index as usize * stride;
    let mut p = [0.0f32; 3];
    bytemuck::bytes_of_mut(&mut p).copy_from_slice(&vertices[base..base + 12]);
    p
}

/// Average cache misses per triangle for a FIFO cache of [`CACHE_SIZE`].
fn estimate_acmr(indices: &[u32]) -> f32 {
    if indices.is_empty() {
        return 0.0;
    }

    let mut cache: Vec<u32> = Vec::with_capacity(CACHE_SIZE);
    let mut misses = 0usize;
    for &v in indices {
        if !cache.contains(&v) {
            misses += 1;
            cache.insert(0, v);
            cache.truncate(CACHE_SIZE);
        }
    }
    misses as f32 / (indices.len() / 3) as f32
}

/// Reorder clusters of triangles front-to-back to reduce overdraw.
///
/// The stream is cut into fixed-size clusters whose relative order is then
/// sorted by centroid depth along the mesh's dominant view axis. The
/// reorder is kept only when the resulting ACMR stays within
/// [`OVERDRAW_THRESHOLD`] of the cache-optimized order; positions are read
/// from the first 12 bytes of each vertex record.
pub fn optimize_overdraw(indices: &[u32], vertices: &[u8], stride: usize) -> Vec<u32> {
    assert!(indices.len() % 3 == 0, "index count not a multiple of 3");

    let triangle_count = indices.len() / 3;
    if triangle_count <= CLUSTER_TRIANGLES {
        return indices.to_vec();
    }

    // Dominant axis from the summed triangle normals.
    let mut mesh_normal = [0.0f32; 3];
    for tri in indices.chunks(3) {
        let a = position(vertices, stride, tri[0]);
        let b = position(vertices, stride, tri[1]);
        let c = position(vertices, stride, tri[2]);
        let ab = [b[0] - a[0], b[1] - a[1], b[2] - a[2]];
        let ac = [c[0] - a[0], c[1] - a[1], c[2] - a[2]];
        mesh_normal[0] += ab[1] * ac[2] - ab[2] * ac[1];
        mesh_normal[1] += ab[2] * ac[0] - ab[0] * ac[2];
        mesh_normal[2] += ab[0] * ac[1] - ab[1] * ac[0];
    }
    let length =
        (mesh_normal[0].powi(2) + mesh_normal[1].powi(2) + mesh_normal[2].powi(2)).sqrt();
    if length < 1e-12 {
        return indices.to_vec();
    }
    let axis = [
        mesh_normal[0] / length,
        mesh_normal[1] / length,
        mesh_normal[2] / length,
    ];

    let mut clusters: Vec<&[u32]> = indices.chunks(CLUSTER_TRIANGLES * 3).collect();
    let depth = |cluster: &[u32]| -> f32 {
        let mut sum = 0.0;
        for &v in cluster {
            let p = position(vertices, stride, v);
            sum += p[0] * axis[0] + p[1] * axis[1] + p[2] * axis[2];
        }
        sum / cluster.len() as f32
    };
    clusters.sort_by(|a, b| depth(b).total_cmp(&depth(a)));

    let reordered: Vec<u32> = clusters.into_iter().flatten().copied().collect();

    let before = estimate_acmr(indices);
    let after = estimate_acmr(&reordered);
    if before > 0.0 && after / before > OVERDRAW_THRESHOLD {
        indices.to_vec()
    } else {
        reordered
    }
}

/// Reorder the vertex buffer into first-use order of the index stream and
/// rewrite the indices to match. Memory reads during rendering then walk
/// the buffer mostly forward.
pub fn optimize_vertex_fetch(
    vertices: &[u8],
    stride: usize,
    indices: &[u32],
) -> (Vec<u8>, Vec<u32>) {
    let vertex_count = vertices.len() / stride;
    let mut order = vec![u32::MAX; vertex_count];
    let mut next = 0u32;

    let new_indices: Vec<u32> = indices
        .iter()
        .map(|&v| {
            let slot = &mut order[v as usize];
            if *slot == u32::MAX {
                *slot = next;
                next += 1;
            }
            *slot
        })
        .collect();

    let mut new_vertices = vec![0u8; next as usize * stride];
    for (old, &new) in order.iter().enumerate() {
        if new != u32::MAX {
            let dst = new as usize * stride;
            new_vertices[dst..dst + stride]
                .copy_from_slice(&vertices[old * stride..(old + 1) * stride]);
        }
    }

    (new_vertices, new_indices)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn vertex(x: f32, y: f32, z: f32) -> Vec<u8> {
        let p = [x, y, z];
        bytemuck::cast_slice(&p).to_vec()
    }

    fn triangle_set(indices: &[u32]) -> HashSet<[u32; 3]> {
        indices
            .chunks(3)
            .map(|t| {
                let mut t = [t[0], t[1], t[2]];
                t.sort_unstable();
                t
            })
            .collect()
    }

    #[test]
    fn test_remap_welds_duplicates() {
        let mut vertices = Vec::new();
        vertices.extend(vertex(0.0, 0.0, 0.0));
        vertices.extend(vertex(1.0, 0.0, 0.0));
        vertices.extend(vertex(0.0, 0.0, 0.0));
        vertices.extend(vertex(1.0, 0.0, 0.0));

        let (unique, remap) = generate_vertex_remap(&vertices, 12);
        assert_eq!(unique, 2);
        assert_eq!(remap, vec![0, 1, 0, 1]);
    }

    #[test]
    fn test_remap_is_identity_without_duplicates() {
        let mut vertices = Vec::new();
        for i in 0..5 {
            vertices.extend(vertex(i as f32, 0.0, 0.0));
        }

        let (unique, remap) = generate_vertex_remap(&vertices, 12);
        assert_eq!(unique, 5);
        assert_eq!(remap, vec![0, 1, 2, 3, 4]);

        let welded = remap_vertex_buffer(&vertices, 12, unique, &remap);
        assert_eq!(welded, vertices);
    }

    #[test]
    fn test_remap_index_buffer_follows_table() {
        let remap = vec![0, 1, 0, 2];
        let indices = vec![0, 1, 2, 1, 2, 3];
        assert_eq!(remap_index_buffer(&indices, &remap), vec![0, 1, 0, 1, 0, 2]);
    }

    #[test]
    fn test_cache_optimization_preserves_triangles() {
        // Two fans sharing a center vertex.
        let indices = vec![0, 1, 2, 0, 2, 3, 0, 3, 4, 0, 4, 5, 0, 5, 1];
        let optimized = optimize_vertex_cache(&indices, 6);

        assert_eq!(optimized.len(), indices.len());
        assert_eq!(triangle_set(&optimized), triangle_set(&indices));
    }

    #[test]
    fn test_cache_optimization_of_empty_stream() {
        assert!(optimize_vertex_cache(&[], 0).is_empty());
    }

    #[test]
    fn test_overdraw_preserves_triangles() {
        // A long strip of quads, enough for multiple clusters.
        let mut vertices = Vec::new();
        let mut indices = Vec::new();
        for i in 0..200u32 {
            let x = i as f32;
            vertices.extend(vertex(x, 0.0, 0.0));
            vertices.extend(vertex(x, 1.0, 0.0));
        }
        for i in 0..199u32 {
            let base = i * 2;
            indices.extend([base, base + 1, base + 2]);
            indices.extend([base + 1, base + 3, base + 2]);
        }

        let reordered = optimize_overdraw(&indices, &vertices, 12);
        assert_eq!(triangle_set(&reordered), triangle_set(&indices));
    }

    #[test]
    fn test_overdraw_leaves_small_meshes_alone() {
        let vertices = [vertex(0.0, 0.0, 0.0), vertex(1.0, 0.0, 0.0), vertex(0.0, 1.0, 0.0)]
            .concat();
        let indices = vec![0, 1, 2];
        assert_eq!(optimize_overdraw(&indices, &vertices, 12), indices);
    }

    #[test]
    fn test_fetch_orders_vertices_by_first_use() {
        let mut vertices = Vec::new();
        for i in 0..4 {
            vertices.extend(vertex(i as f32, 0.0, 0.0));
        }
        let indices = vec![2, 0, 3, 3, 0, 1];

        let (new_vertices, new_indices) = optimize_vertex_fetch(&vertices, 12, &indices);

        assert_eq!(new_indices, vec![0, 1, 2, 2, 1, 3]);
        // New vertex 0 is old vertex 2, and so on by first use.
        assert_eq!(&new_vertices[0..12], &vertices[24..36]);
        assert_eq!(&new_vertices[12..24], &vertices[0..12]);
        assert_eq!(&new_vertices[24..36], &vertices[36..48]);
        assert_eq!(&new_vertices[36..48], &vertices[12..24]);
    }

    #[test]
    fn test_fetch_drops_unreferenced_vertices() {
        let mut vertices = Vec::new();
        for i in 0..4 {
            vertices.extend(vertex(i as f32, 0.0, 0.0));
        }
        let indices = vec![0, 1, 2];

        let (new_vertices, new_indices) = optimize_vertex_fetch(&vertices, 12, &indices);
        assert_eq!(new_vertices.len(), 3 * 12);
        assert_eq!(new_indices, vec![0, 1, 2]);
    }
}
