use crate::centerline::SamplePoint;
use std::collections::BinaryHeap;

#[derive(Debug, Clone, Copy, PartialEq)]
struct Entry {
    x: f64,
    y: f64,
    elevation: f64,
    id: u32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub distance: f64,
    pub elevation: f64,
    pub id: u32,
}

// Candidate ordering for the bounded max-heap: farther is greater, and among
// equal distances a higher id is greater, so ties evict the later insertion
// and the surviving set is deterministic.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Candidate {
    dist2: f64,
    entry: Entry,
}

impl Eq for Candidate {}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.dist2
            .total_cmp(&other.dist2)
            .then(self.entry.id.cmp(&other.entry.id))
    }
}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

// Static median-split kd-tree stored implicitly in one array: the midpoint of
// each range is the splitting node, alternating axes by depth.
pub struct PointIndex {
    entries: Vec<Entry>,
}

impl PointIndex {
    pub fn build(points: &[SamplePoint]) -> Self {
        let mut entries: Vec<Entry> = points
            .iter()
            .enumerate()
            .map(|(id, p)| Entry {
                x: p.x,
                y: p.y,
                elevation: p.elevation,
                id: id as u32,
            })
            .collect();

        build_range(&mut entries, 0);

        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    // k nearest neighbors within `max_radius` of (x, y), nearest first.
    // With eps > 0 a subtree is skipped when it cannot hold a point closer
    // than worst/(1 + eps); the kth returned distance is then at most
    // (1 + eps) times the true kth distance. eps = 0 is an exact search.
    pub fn nearest(&self, x: f64, y: f64, k: usize, eps: f64, max_radius: f64) -> Vec<Neighbor> {
        if self.entries.is_empty() || k == 0 {
            return Vec::new();
        }

        let mut search = Search {
            entries: &self.entries,
            x,
            y,
            k,
            shrink2: 1.0 / ((1.0 + eps) * (1.0 + eps)),
            radius2: max_radius * max_radius,
            heap: BinaryHeap::with_capacity(k + 1),
        };
        search.visit(0, self.entries.len(), 0);

        search
            .heap
            .into_sorted_vec()
            .into_iter()
            .map(|c| Neighbor {
                distance: c.dist2.sqrt(),
                elevation: c.entry.elevation,
                id: c.entry.id,
            })
            .collect()
    }
}

fn build_range(entries: &mut [Entry], depth: usize) {
    if entries.len() <= 1 {
        return;
    }

    let mid = entries.len() / 2;
    if depth % 2 == 0 {
        entries.select_nth_unstable_by(mid, |a, b| a.x.total_cmp(&b.x).then(a.id.cmp(&b.id)));
    } else {
        entries.select_nth_unstable_by(mid, |a, b| a.y.total_cmp(&b.y).then(a.id.cmp(&b.id)));
    }

    let (left, right) = entries.split_at_mut(mid);
    build_range(left, depth + 1);
    build_range(&mut right[1..], depth + 1);
}

struct Search<'a> {
    entries: &'a [Entry],
    x: f64,
    y: f64,
    k: usize,
    shrink2: f64,
    radius2: f64,
    heap: BinaryHeap<Candidate>,
}

impl Search<'_> {
    fn bound(&self) -> f64 {
        if self.heap.len() == self.k {
            self.heap.peek().map(|c| c.dist2).unwrap_or(self.radius2)
        } else {
            self.radius2
        }
    }

    fn offer(&mut self, entry: Entry) {
        let dx = entry.x - self.x;
        let dy = entry.y - self.y;
        let dist2 = dx * dx + dy * dy;

        if dist2 > self.radius2 {
            return;
        }

        let candidate = Candidate { dist2, entry };
        if self.heap.len() < self.k {
            self.heap.push(candidate);
        } else if let Some(&worst) = self.heap.peek() {
            if candidate < worst {
                self.heap.push(candidate);
                self.heap.pop();
            }
        }
    }

    fn visit(&mut self, lo: usize, hi: usize, depth: usize) {
        if lo >= hi {
            return;
        }

        let mid = lo + (hi - lo) / 2;
        let node = self.entries[mid];
        self.offer(node);

        let axis_diff = if depth % 2 == 0 {
            self.x - node.x
        } else {
            self.y - node.y
        };

        let (near_lo, near_hi, far_lo, far_hi) = if axis_diff < 0.0 {
            (lo, mid, mid + 1, hi)
        } else {
            (mid + 1, hi, lo, mid)
        };

        self.visit(near_lo, near_hi, depth + 1);

        // the far half-plane starts axis_diff away from the query
        if axis_diff * axis_diff * self.shrink2 <= self.bound() {
            self.visit(far_lo, far_hi, depth + 1);
        }
    }
}
