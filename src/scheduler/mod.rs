pub mod pool;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkWindow {
    pub row_off: usize,
    pub rows: usize,
}

// Row-aligned windows, each at most `max_cells` cells, tiling the raster
// exactly. A raster wider than `max_cells` still gets whole rows; the bound
// is a memory budget, not a hard guarantee below one row.
pub fn plan_chunks(height: usize, width: usize, max_cells: usize) -> Vec<ChunkWindow> {
    if height == 0 || width == 0 {
        return Vec::new();
    }

    let rows_per_chunk = (max_cells / width).clamp(1, height);

    let mut chunks = Vec::with_capacity(height.div_ceil(rows_per_chunk));
    let mut row_off = 0;
    while row_off < height {
        let rows = rows_per_chunk.min(height - row_off);
        chunks.push(ChunkWindow { row_off, rows });
        row_off += rows;
    }

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_exact_tiling(chunks: &[ChunkWindow], height: usize) {
        let mut expected_off = 0;
        for chunk in chunks {
            assert_eq!(chunk.row_off, expected_off, "gap or overlap in plan");
            assert!(chunk.rows > 0);
            expected_off += chunk.rows;
        }
        assert_eq!(expected_off, height, "plan does not cover the raster");
    }

    #[test]
    fn tiles_exactly_for_assorted_shapes() {
        for (height, width, max_cells) in [
            (100, 100, 1_000_000),
            (100, 100, 100),
            (100, 100, 250),
            (1, 1, 1),
            (7, 13, 26),
            (1000, 333, 999),
        ] {
            let chunks = plan_chunks(height, width, max_cells);
            assert_exact_tiling(&chunks, height);
        }
    }

    #[test]
    fn respects_the_cell_budget() {
        let chunks = plan_chunks(100, 40, 1000);
        for chunk in &chunks {
            assert!(chunk.rows * 40 <= 1000);
        }
        // 25 rows per chunk
        assert_eq!(chunks.len(), 4);
    }

    #[test]
    fn single_chunk_when_budget_is_large() {
        let chunks = plan_chunks(50, 50, 1_000_000);
        assert_eq!(chunks, vec![ChunkWindow { row_off: 0, rows: 50 }]);
    }

    #[test]
    fn wide_rasters_fall_back_to_single_rows() {
        let chunks = plan_chunks(3, 1000, 10);
        assert_eq!(chunks.len(), 3);
        assert!(chunks.iter().all(|c| c.rows == 1));
    }

    #[test]
    fn empty_raster_has_no_chunks() {
        assert!(plan_chunks(0, 100, 1000).is_empty());
        assert!(plan_chunks(100, 0, 1000).is_empty());
    }
}
