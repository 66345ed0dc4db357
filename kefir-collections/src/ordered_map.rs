//! A self-balancing ordered map, keyed first by hash then by a caller-supplied comparator.
//!
//! Nodes live in an arena (`Vec<Option<Node<K, V>>>`) and refer to each other by index rather than
//! by `Box`/reference, so the tree never needs unsafe code or `Rc`/`RefCell` to represent parent
//! pointers — the same "integer handles into arena storage" discipline the IR container itself
//! uses for instruction operands.
//!
//! Callers that maintain an index derived from this map's shape (for example, a reverse lookup
//! from value back to node) can register an `on_removal` hook, invoked exactly once per evicted
//! entry, and an `on_relink` hook, invoked whenever a node's parent changes during a rotation, so
//! the derived index can repair itself without rescanning the whole tree.

use std::cmp::Ordering;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

type Link = Option<u32>;

struct Node<K, V> {
    key: K,
    value: V,
    hash: u64,
    height: i32,
    left: Link,
    right: Link,
    parent: Link,
}

/// A self-balancing ordered map. See the module documentation for the balancing and hook
/// semantics.
pub struct OrderedMap<K, V> {
    nodes: Vec<Option<Node<K, V>>>,
    free: Vec<u32>,
    root: Link,
    len: usize,
    on_removal: Option<Box<dyn FnMut(&K, &V)>>,
    on_relink: Option<Box<dyn FnMut(&K)>>,
}

fn hash_of<K: Hash>(key: &K) -> u64 {
    let mut h = DefaultHasher::new();
    key.hash(&mut h);
    h.finish()
}

impl<K, V> OrderedMap<K, V>
where
    K: Ord + Hash + Clone,
{
    /// Create a new, empty map.
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            free: Vec::new(),
            root: None,
            len: 0,
            on_removal: None,
            on_relink: None,
        }
    }

    /// Register a hook invoked exactly once, with the key and owned value, whenever an entry is
    /// evicted from the map (by `remove` or by `insert` replacing an existing key).
    pub fn on_removal(&mut self, hook: impl FnMut(&K, &V) + 'static) {
        self.on_removal = Some(Box::new(hook));
    }

    /// Register a hook invoked with a node's key whenever that node's parent pointer changes.
    pub fn on_relink(&mut self, hook: impl FnMut(&K) + 'static) {
        self.on_relink = Some(Box::new(hook));
    }

    /// Number of entries currently stored.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Is the map empty?
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn cmp_key(&self, a_hash: u64, a: &K, b_hash: u64, b: &K) -> Ordering {
        a_hash.cmp(&b_hash).then_with(|| a.cmp(b))
    }

    fn node(&self, idx: u32) -> &Node<K, V> {
        self.nodes[idx as usize].as_ref().expect("dangling node index")
    }

    fn node_mut(&mut self, idx: u32) -> &mut Node<K, V> {
        self.nodes[idx as usize].as_mut().expect("dangling node index")
    }

    fn height(&self, link: Link) -> i32 {
        link.map_or(0, |i| self.node(i).height)
    }

    fn update_height(&mut self, idx: u32) {
        let (l, r) = {
            let n = self.node(idx);
            (n.left, n.right)
        };
        let h = 1 + self.height(l).max(self.height(r));
        self.node_mut(idx).height = h;
    }

    fn balance_factor(&self, idx: u32) -> i32 {
        let n = self.node(idx);
        self.height(n.left) - self.height(n.right)
    }

    fn set_parent(&mut self, child: Link, parent: Link) {
        if let Some(c) = child {
            self.node_mut(c).parent = parent;
            if let Some(hook) = self.on_relink.as_mut() {
                let key = self.nodes[c as usize].as_ref().unwrap().key.clone();
                hook(&key);
            }
        }
    }

    /// Insert `key -> value`, returning the previous value if the key was already present.
    /// Any `on_removal` hook fires for the replaced entry, not for the new one.
    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        let hash = hash_of(&key);
        if let Some(existing) = self.find_index(&key, hash) {
            let old = std::mem::replace(&mut self.node_mut(existing).value, value);
            if let Some(hook) = self.on_removal.as_mut() {
                let k = self.node(existing).key.clone();
                hook(&k, &old);
            }
            return Some(old);
        }
        let idx = self.alloc(Node {
            key,
            value,
            hash,
            height: 1,
            left: None,
            right: None,
            parent: None,
        });
        self.root = self.insert_node(self.root, idx);
        self.len += 1;
        None
    }

    fn alloc(&mut self, node: Node<K, V>) -> u32 {
        if let Some(idx) = self.free.pop() {
            self.nodes[idx as usize] = Some(node);
            idx
        } else {
            self.nodes.push(Some(node));
            (self.nodes.len() - 1) as u32
        }
    }

    fn insert_node(&mut self, link: Link, new_idx: u32) -> Link {
        let cur = match link {
            None => return Some(new_idx),
            Some(c) => c,
        };
        let go_left = {
            let cur_node = self.node(cur);
            let new_node = self.node(new_idx);
            self.cmp_key(new_node.hash, &new_node.key, cur_node.hash, &cur_node.key) == Ordering::Less
        };
        if go_left {
            let new_left = self.insert_node(self.node(cur).left, new_idx);
            self.node_mut(cur).left = new_left;
            self.set_parent(new_left, Some(cur));
        } else {
            let new_right = self.insert_node(self.node(cur).right, new_idx);
            self.node_mut(cur).right = new_right;
            self.set_parent(new_right, Some(cur));
        }
        self.update_height(cur);
        Some(self.rebalance(cur))
    }

    fn rotate_left(&mut self, idx: u32) -> u32 {
        let r = self.node(idx).right.expect("rotate_left needs a right child");
        let rl = self.node(r).left;
        self.node_mut(idx).right = rl;
        self.set_parent(rl, Some(idx));
        self.node_mut(r).left = Some(idx);
        self.update_height(idx);
        self.update_height(r);
        r
    }

    fn rotate_right(&mut self, idx: u32) -> u32 {
        let l = self.node(idx).left.expect("rotate_right needs a left child");
        let lr = self.node(l).right;
        self.node_mut(idx).left = lr;
        self.set_parent(lr, Some(idx));
        self.node_mut(l).right = Some(idx);
        self.update_height(idx);
        self.update_height(l);
        l
    }

    fn rebalance(&mut self, idx: u32) -> u32 {
        let bf = self.balance_factor(idx);
        if bf > 1 {
            let left = self.node(idx).left.unwrap();
            if self.balance_factor(left) < 0 {
                let new_left = self.rotate_left(left);
                self.node_mut(idx).left = Some(new_left);
                self.set_parent(Some(new_left), Some(idx));
            }
            self.rotate_right(idx)
        } else if bf < -1 {
            let right = self.node(idx).right.unwrap();
            if self.balance_factor(right) > 0 {
                let new_right = self.rotate_right(right);
                self.node_mut(idx).right = Some(new_right);
                self.set_parent(Some(new_right), Some(idx));
            }
            self.rotate_left(idx)
        } else {
            idx
        }
    }

    fn find_index(&self, key: &K, hash: u64) -> Link {
        let mut cur = self.root;
        while let Some(idx) = cur {
            let n = self.node(idx);
            match self.cmp_key(hash, key, n.hash, &n.key) {
                Ordering::Equal => return Some(idx),
                Ordering::Less => cur = n.left,
                Ordering::Greater => cur = n.right,
            }
        }
        None
    }

    /// Look up the value for `key`.
    pub fn get(&self, key: &K) -> Option<&V> {
        let hash = hash_of(key);
        self.find_index(key, hash).map(|idx| &self.node(idx).value)
    }

    /// Does the map contain `key`?
    pub fn contains_key(&self, key: &K) -> bool {
        self.get(key).is_some()
    }

    /// Remove `key`, returning its value if present. Fires `on_removal` on success.
    pub fn remove(&mut self, key: &K) -> Option<V> {
        let hash = hash_of(key);
        let idx = self.find_index(key, hash)?;
        let (k, v) = self.remove_node(idx);
        self.len -= 1;
        if let Some(hook) = self.on_removal.as_mut() {
            hook(&k, &v);
        }
        Some(v)
    }

    fn remove_node(&mut self, idx: u32) -> (K, V) {
        let (left, right) = {
            let n = self.node(idx);
            (n.left, n.right)
        };
        if left.is_some() && right.is_some() {
            // Replace with the in-order successor (leftmost of the right subtree), then delete
            // that successor node instead, which has at most one child.
            let mut succ = right.unwrap();
            while let Some(l) = self.node(succ).left {
                succ = l;
            }
            let succ_key = self.node(succ).key.clone();
            let succ_hash = self.node(succ).hash;
            let (_, succ_value) = self.remove_node(succ);
            let removed_key = std::mem::replace(&mut self.node_mut(idx).key, succ_key);
            self.node_mut(idx).hash = succ_hash;
            let removed_value = std::mem::replace(&mut self.node_mut(idx).value, succ_value);
            self.update_height(idx);
            self.root = Some(self.rebalance_up(idx));
            (removed_key, removed_value)
        } else {
            let child = left.or(right);
            let parent = self.node(idx).parent;
            self.set_parent(child, parent);
            match parent {
                None => self.root = child,
                Some(p) => {
                    if self.node(p).left == Some(idx) {
                        self.node_mut(p).left = child;
                    } else {
                        self.node_mut(p).right = child;
                    }
                }
            }
            let taken = self.nodes[idx as usize].take().unwrap();
            self.free.push(idx);
            if let Some(p) = parent {
                self.update_height(p);
                self.root = Some(self.rebalance_up(p));
            }
            (taken.key, taken.value)
        }
    }

    fn rebalance_up(&mut self, mut idx: u32) -> u32 {
        loop {
            self.update_height(idx);
            idx = self.rebalance(idx);
            match self.node(idx).parent {
                None => return idx,
                Some(p) => idx = p,
            }
        }
    }

    /// In-order iteration over `(key, value)` pairs, ascending.
    pub fn iter(&self) -> InOrderIter<'_, K, V> {
        let mut stack = Vec::new();
        let mut cur = self.root;
        while let Some(c) = cur {
            stack.push(c);
            cur = self.node(c).left;
        }
        InOrderIter { map: self, stack }
    }

    /// The minimum key-value pair, if any.
    pub fn min(&self) -> Option<(&K, &V)> {
        let mut cur = self.root?;
        while let Some(l) = self.node(cur).left {
            cur = l;
        }
        let n = self.node(cur);
        Some((&n.key, &n.value))
    }

    /// The maximum key-value pair, if any.
    pub fn max(&self) -> Option<(&K, &V)> {
        let mut cur = self.root?;
        while let Some(r) = self.node(cur).right {
            cur = r;
        }
        let n = self.node(cur);
        Some((&n.key, &n.value))
    }

    /// The entry with the smallest key `>= key`.
    pub fn lower_bound(&self, key: &K) -> Option<(&K, &V)> {
        let hash = hash_of(key);
        let mut cur = self.root;
        let mut best: Link = None;
        while let Some(idx) = cur {
            let n = self.node(idx);
            match self.cmp_key(hash, key, n.hash, &n.key) {
                Ordering::Greater => cur = n.right,
                _ => {
                    best = Some(idx);
                    cur = n.left;
                }
            }
        }
        best.map(|idx| {
            let n = self.node(idx);
            (&n.key, &n.value)
        })
    }

    /// The entry with the smallest key `> key`.
    pub fn upper_bound(&self, key: &K) -> Option<(&K, &V)> {
        let hash = hash_of(key);
        let mut cur = self.root;
        let mut best: Link = None;
        while let Some(idx) = cur {
            let n = self.node(idx);
            match self.cmp_key(hash, key, n.hash, &n.key) {
                Ordering::Less => {
                    best = Some(idx);
                    cur = n.left;
                }
                _ => cur = n.right,
            }
        }
        best.map(|idx| {
            let n = self.node(idx);
            (&n.key, &n.value)
        })
    }
}

impl<K, V> Default for OrderedMap<K, V>
where
    K: Ord + Hash + Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

/// In-order iterator over an `OrderedMap`.
pub struct InOrderIter<'a, K, V> {
    map: &'a OrderedMap<K, V>,
    stack: Vec<u32>,
}

impl<'a, K, V> Iterator for InOrderIter<'a, K, V>
where
    K: Ord + Hash + Clone,
{
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        let idx = self.stack.pop()?;
        let n = self.map.node(idx);
        let mut cur = n.right;
        while let Some(c) = cur {
            self.stack.push(c);
            cur = self.map.node(c).left;
        }
        Some((&n.key, &n.value))
    }
}
