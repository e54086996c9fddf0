//! An in-memory R-tree spatial index over rectangular bounding boxes.
//!
//! Nodes live in a flat arena (`Vec<RTreeNode<T>>`) addressed by index
//! rather than linked by parent pointers: a split hands its new sibling's
//! index back up the insertion call stack, and the caller (the parent
//! node, or [`RTree::insert`] itself at the root) decides where it goes.

use crate::options::ParserOptions;

/// An axis-aligned bounding box.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Rect {
    pub x_min: f64,
    pub y_min: f64,
    pub x_max: f64,
    pub y_max: f64,
}

impl Rect {
    /// A single point's degenerate bounding box.
    pub fn point(x: f64, y: f64) -> Rect {
        Rect {
            x_min: x,
            y_min: y,
            x_max: x,
            y_max: y,
        }
    }

    /// The smallest box containing both `self` and `other`.
    pub fn union(&self, other: &Rect) -> Rect {
        Rect {
            x_min: self.x_min.min(other.x_min),
            y_min: self.y_min.min(other.y_min),
            x_max: self.x_max.max(other.x_max),
            y_max: self.y_max.max(other.y_max),
        }
    }

    /// The box's area; zero for a degenerate or inverted box.
    pub fn area(&self) -> f64 {
        (self.x_max - self.x_min).max(0.0) * (self.y_max - self.y_min).max(0.0)
    }

    /// Whether `self` and `other` overlap (touching edges count as
    /// overlapping).
    pub fn intersects(&self, other: &Rect) -> bool {
        self.x_min <= other.x_max && self.x_max >= other.x_min && self.y_min <= other.y_max && self.y_max >= other.y_min
    }

    /// Whether the box contains `(x, y)`, inclusive of its edges.
    pub fn contains_point(&self, x: f64, y: f64) -> bool {
        x >= self.x_min && x <= self.x_max && y >= self.y_min && y <= self.y_max
    }

    fn distance_squared_to_point(&self, x: f64, y: f64) -> f64 {
        let dx = if x < self.x_min {
            self.x_min - x
        } else if x > self.x_max {
            x - self.x_max
        } else {
            0.0
        };
        let dy = if y < self.y_min {
            self.y_min - y
        } else if y > self.y_max {
            y - self.y_max
        } else {
            0.0
        };
        dx * dx + dy * dy
    }
}

const EMPTY: Rect = Rect {
    x_min: f64::INFINITY,
    y_min: f64::INFINITY,
    x_max: f64::NEG_INFINITY,
    y_max: f64::NEG_INFINITY,
};

enum NodeKind<T> {
    Leaf(Vec<(Rect, T)>),
    Internal(Vec<(Rect, usize)>),
}

struct RTreeNode<T> {
    kind: NodeKind<T>,
}

/// Summary counts over an [`RTree`], returned by [`RTree::statistics`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RTreeStatistics {
    pub entry_count: usize,
    pub node_count: usize,
    pub height: usize,
}

/// A spatial index mapping bounding boxes to arbitrary payloads.
///
/// Entries are split using Guttman's quadratic-cost algorithm: a node
/// that overflows `max_entries` picks the pair of entries with the most
/// wasted area as seeds for two new groups, then greedily assigns the
/// rest to whichever group enlarges least, topping off either group that
/// would otherwise fall short of `min_entries`.
pub struct RTree<T> {
    nodes: Vec<RTreeNode<T>>,
    root: usize,
    max_entries: usize,
    min_entries: usize,
    len: usize,
}

impl<T> RTree<T> {
    /// Creates an empty tree with explicit fanout bounds.
    pub fn new(max_entries: usize, min_entries: usize) -> RTree<T> {
        RTree {
            nodes: vec![RTreeNode {
                kind: NodeKind::Leaf(Vec::new()),
            }],
            root: 0,
            max_entries: max_entries.max(2),
            min_entries: min_entries.max(1).min(max_entries.max(2) / 2),
            len: 0,
        }
    }

    /// Creates an empty tree using [`ParserOptions::rtree_max_entries`]
    /// and [`ParserOptions::rtree_min_entries`].
    pub fn with_options(options: &ParserOptions) -> RTree<T> {
        RTree::new(options.rtree_max_entries, options.rtree_min_entries)
    }

    /// The number of entries in the tree.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the tree holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Node and entry counts, plus the tree's height (a single leaf root
    /// counts as height 1).
    pub fn statistics(&self) -> RTreeStatistics {
        RTreeStatistics {
            entry_count: self.len,
            node_count: self.nodes.len(),
            height: self.height(self.root),
        }
    }

    fn height(&self, node_idx: usize) -> usize {
        match &self.nodes[node_idx].kind {
            NodeKind::Leaf(_) => 1,
            NodeKind::Internal(children) => {
                1 + children.first().map(|&(_, child)| self.height(child)).unwrap_or(0)
            }
        }
    }

    /// Inserts `data` under bounding box `bbox`.
    pub fn insert(&mut self, bbox: Rect, data: T) {
        self.len += 1;
        if let Some(sibling) = self.insert_into(self.root, bbox, data) {
            let new_root = RTreeNode {
                kind: NodeKind::Internal(vec![
                    (self.node_bbox(self.root), self.root),
                    (self.node_bbox(sibling), sibling),
                ]),
            };
            let new_root_idx = self.nodes.len();
            self.nodes.push(new_root);
            self.root = new_root_idx;
        }
    }

    fn insert_into(&mut self, node_idx: usize, bbox: Rect, data: T) -> Option<usize> {
        let is_leaf = matches!(self.nodes[node_idx].kind, NodeKind::Leaf(_));
        if is_leaf {
            let len = if let NodeKind::Leaf(entries) = &mut self.nodes[node_idx].kind {
                entries.push((bbox, data));
                entries.len()
            } else {
                unreachable!()
            };
            if len > self.max_entries {
                Some(self.split_leaf(node_idx))
            } else {
                None
            }
        } else {
            let best = self.choose_subtree(node_idx, &bbox);
            let child_idx = match &self.nodes[node_idx].kind {
                NodeKind::Internal(children) => children[best].1,
                NodeKind::Leaf(_) => unreachable!(),
            };
            let split = self.insert_into(child_idx, bbox, data);
            let child_bbox = self.node_bbox(child_idx);
            let sibling_entry = split.map(|sibling_idx| (self.node_bbox(sibling_idx), sibling_idx));
            let len = match &mut self.nodes[node_idx].kind {
                NodeKind::Internal(children) => {
                    children[best].0 = child_bbox;
                    if let Some(entry) = sibling_entry {
                        children.push(entry);
                    }
                    children.len()
                }
                NodeKind::Leaf(_) => unreachable!(),
            };
            if len > self.max_entries {
                Some(self.split_internal(node_idx))
            } else {
                None
            }
        }
    }

    fn choose_subtree(&self, node_idx: usize, bbox: &Rect) -> usize {
        let children = match &self.nodes[node_idx].kind {
            NodeKind::Internal(children) => children,
            NodeKind::Leaf(_) => unreachable!(),
        };
        let mut best = 0;
        let mut best_enlargement = f64::INFINITY;
        let mut best_area = f64::INFINITY;
        for (i, (child_bbox, _)) in children.iter().enumerate() {
            let enlargement = child_bbox.union(bbox).area() - child_bbox.area();
            if enlargement < best_enlargement || (enlargement == best_enlargement && child_bbox.area() < best_area) {
                best = i;
                best_enlargement = enlargement;
                best_area = child_bbox.area();
            }
        }
        best
    }

    fn node_bbox(&self, node_idx: usize) -> Rect {
        match &self.nodes[node_idx].kind {
            NodeKind::Leaf(entries) => entries.iter().map(|&(b, _)| b).fold(EMPTY, |a, b| a.union(&b)),
            NodeKind::Internal(children) => children.iter().map(|&(b, _)| b).fold(EMPTY, |a, b| a.union(&b)),
        }
    }

    fn split_leaf(&mut self, node_idx: usize) -> usize {
        let entries = match &mut self.nodes[node_idx].kind {
            NodeKind::Leaf(entries) => std::mem::take(entries),
            NodeKind::Internal(_) => unreachable!(),
        };
        let (group_a, group_b) = quadratic_split(entries, self.min_entries, |(bbox, _)| *bbox);
        self.nodes[node_idx].kind = NodeKind::Leaf(group_a);
        let sibling_idx = self.nodes.len();
        self.nodes.push(RTreeNode {
            kind: NodeKind::Leaf(group_b),
        });
        sibling_idx
    }

    fn split_internal(&mut self, node_idx: usize) -> usize {
        let children = match &mut self.nodes[node_idx].kind {
            NodeKind::Internal(children) => std::mem::take(children),
            NodeKind::Leaf(_) => unreachable!(),
        };
        let (group_a, group_b) = quadratic_split(children, self.min_entries, |(bbox, _)| *bbox);
        self.nodes[node_idx].kind = NodeKind::Internal(group_a);
        let sibling_idx = self.nodes.len();
        self.nodes.push(RTreeNode {
            kind: NodeKind::Internal(group_b),
        });
        sibling_idx
    }

    /// Every entry whose bounding box intersects `query`.
    pub fn search(&self, query: Rect) -> Vec<&T> {
        let mut results = Vec::new();
        self.search_node(self.root, &query, &mut results);
        results
    }

    /// Every entry whose bounding box contains `(x, y)`.
    pub fn search_point(&self, x: f64, y: f64) -> Vec<&T> {
        self.search(Rect::point(x, y))
    }

    fn search_node<'a>(&'a self, node_idx: usize, query: &Rect, results: &mut Vec<&'a T>) {
        match &self.nodes[node_idx].kind {
            NodeKind::Leaf(entries) => {
                for (bbox, data) in entries {
                    if bbox.intersects(query) {
                        results.push(data);
                    }
                }
            }
            NodeKind::Internal(children) => {
                for (bbox, child) in children {
                    if bbox.intersects(query) {
                        self.search_node(*child, query, results);
                    }
                }
            }
        }
    }

    /// The `k` entries whose bounding boxes are closest to `(x, y)`,
    /// nearest first.
    ///
    /// This is a brute-force scan over every leaf entry rather than a
    /// best-first branch-and-bound descent; simple and correct, though
    /// not asymptotically optimal for very large trees.
    pub fn nearest(&self, x: f64, y: f64, k: usize) -> Vec<&T> {
        let mut all = Vec::new();
        self.collect_with_distance(self.root, x, y, &mut all);
        all.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
        all.into_iter().take(k).map(|(_, data)| data).collect()
    }

    fn collect_with_distance<'a>(&'a self, node_idx: usize, x: f64, y: f64, out: &mut Vec<(f64, &'a T)>) {
        match &self.nodes[node_idx].kind {
            NodeKind::Leaf(entries) => {
                for (bbox, data) in entries {
                    out.push((bbox.distance_squared_to_point(x, y), data));
                }
            }
            NodeKind::Internal(children) => {
                for (_, child) in children {
                    self.collect_with_distance(*child, x, y, out);
                }
            }
        }
    }
}

fn quadratic_split<E: Clone>(mut entries: Vec<E>, min_entries: usize, bbox_of: impl Fn(&E) -> Rect) -> (Vec<E>, Vec<E>) {
    let mut seed_a_idx = 0;
    let mut seed_b_idx = 1.min(entries.len().saturating_sub(1));
    let mut worst_waste = f64::NEG_INFINITY;
    for i in 0..entries.len() {
        for j in (i + 1)..entries.len() {
            let a = bbox_of(&entries[i]);
            let b = bbox_of(&entries[j]);
            let waste = a.union(&b).area() - a.area() - b.area();
            if waste > worst_waste {
                worst_waste = waste;
                seed_a_idx = i;
                seed_b_idx = j;
            }
        }
    }

    let seed_b = entries.remove(seed_b_idx);
    let seed_a = entries.remove(seed_a_idx);
    let mut bbox_a = bbox_of(&seed_a);
    let mut bbox_b = bbox_of(&seed_b);
    let mut group_a = vec![seed_a];
    let mut group_b = vec![seed_b];

    let mut remaining = entries;
    while !remaining.is_empty() {
        let needed_a = min_entries.saturating_sub(group_a.len());
        let needed_b = min_entries.saturating_sub(group_b.len());
        if needed_a >= remaining.len() {
            for entry in remaining.drain(..) {
                bbox_a = bbox_a.union(&bbox_of(&entry));
                group_a.push(entry);
            }
            break;
        }
        if needed_b >= remaining.len() {
            for entry in remaining.drain(..) {
                bbox_b = bbox_b.union(&bbox_of(&entry));
                group_b.push(entry);
            }
            break;
        }

        let mut best_idx = 0;
        let mut best_diff = f64::NEG_INFINITY;
        let mut prefer_a = true;
        for (idx, entry) in remaining.iter().enumerate() {
            let bbox = bbox_of(entry);
            let enlargement_a = bbox_a.union(&bbox).area() - bbox_a.area();
            let enlargement_b = bbox_b.union(&bbox).area() - bbox_b.area();
            let diff = (enlargement_a - enlargement_b).abs();
            if diff > best_diff {
                best_diff = diff;
                best_idx = idx;
                prefer_a = enlargement_a < enlargement_b
                    || (enlargement_a == enlargement_b && bbox_a.area() < bbox_b.area());
            }
        }
        let entry = remaining.remove(best_idx);
        let bbox = bbox_of(&entry);
        if prefer_a {
            bbox_a = bbox_a.union(&bbox);
            group_a.push(entry);
        } else {
            bbox_b = bbox_b.union(&bbox);
            group_b.push(entry);
        }
    }

    (group_a, group_b)
}
