//! Symmetric reverse Cuthill-McKee ordering.
//!
//! Works on the pattern of `A + Aᵀ` so unsymmetric matrices get a symmetric
//! permutation. Each connected component starts from its minimum-degree node;
//! neighbours are queued in increasing degree order.

use std::collections::VecDeque;

/// Compute `perm` such that row/column `perm[k]` of `A` becomes row/column
/// `k` of the reordered matrix.
pub fn symrcm(n: usize, row_pointers: &[i32], col_indices: &[i32]) -> Vec<usize> {
    let adjacency = symmetric_adjacency(n, row_pointers, col_indices);
    let degree: Vec<usize> = adjacency.iter().map(Vec::len).collect();

    // Component starts, in (degree, index) order.
    let mut starts: Vec<usize> = (0..n).collect();
    starts.sort_by_key(|&i| (degree[i], i));
    let mut cursor = 0;

    let mut visited = vec![false; n];
    let mut order = Vec::with_capacity(n);
    let mut queue = VecDeque::new();

    while order.len() < n {
        while cursor < n && visited[starts[cursor]] {
            cursor += 1;
        }
        let Some(&start) = starts.get(cursor) else {
            break;
        };
        visited[start] = true;
        queue.push_back(start);

        while let Some(node) = queue.pop_front() {
            order.push(node);
            let mut next: Vec<usize> = adjacency[node]
                .iter()
                .copied()
                .filter(|&nb| !visited[nb])
                .collect();
            next.sort_by_key(|&nb| (degree[nb], nb));
            for nb in next {
                visited[nb] = true;
                queue.push_back(nb);
            }
        }
    }

    order.reverse();
    order
}

/// Inverse of a permutation: `inv[perm[k]] = k`.
pub fn invert(perm: &[usize]) -> Vec<usize> {
    let mut inv = vec![0; perm.len()];
    for (k, &p) in perm.iter().enumerate() {
        inv[p] = k;
    }
    inv
}

fn symmetric_adjacency(n: usize, row_pointers: &[i32], col_indices: &[i32]) -> Vec<Vec<usize>> {
    let mut adjacency = vec![Vec::new(); n];
    for row in 0..n {
        let start = row_pointers[row] as usize;
        let end = row_pointers[row + 1] as usize;
        for &col in &col_indices[start..end] {
            let col = col as usize;
            if col != row {
                adjacency[row].push(col);
                adjacency[col].push(row);
            }
        }
    }
    for nbrs in &mut adjacency {
        nbrs.sort_unstable();
        nbrs.dedup();
    }
    adjacency
}
