//! Skill-tree structure and statistics.
//!
//! A tree is stored as flat node rows (`skill_tree_nodes`) and rebuilt here as
//! an arena: nodes keyed by id, a parent-to-children index that preserves
//! sibling order, and a skill-to-nodes index. The same skill may appear at
//! several positions. Depth is capped at [`MAX_TREE_DEPTH`] with roots at
//! depth 1.
//!
//! Mutations never touch the database. They record [`TreeChange`]s which the
//! repository drains and writes inside the transaction that loaded the arena.
//! Nodes created in memory get negative provisional ids until the repository
//! assigns real ones.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::skill::SKILL_LEVELS;
use crate::types::DbId;
use crate::validation::{validate_not_blank, validate_one_of};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Roots sit at depth 1; nothing may be attached below this depth.
pub const MAX_TREE_DEPTH: usize = 3;

pub const TREE_TYPES: &[&str] = &[
    "career",
    "domain",
    "technology",
    "role",
    "certification",
    "custom",
];

pub const TREE_STATUSES: &[&str] = &["active", "inactive", "draft", "archived"];

pub const PATH_STATUSES: &[&str] = &["active", "inactive", "draft"];

pub const DEFAULT_TREE_TYPE: &str = "career";
pub const DEFAULT_TREE_STATUS: &str = "active";
pub const DEFAULT_TREE_COLOR: &str = "#10B981";

pub fn validate_tree_type(tree_type: &str) -> Result<(), CoreError> {
    validate_one_of("type", tree_type, TREE_TYPES)
}

pub fn validate_tree_status(status: &str) -> Result<(), CoreError> {
    validate_one_of("status", status, TREE_STATUSES)
}

// ---------------------------------------------------------------------------
// Node data
// ---------------------------------------------------------------------------

/// Node identifier. Positive for persisted rows, negative for provisional nodes.
pub type NodeId = DbId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

impl Priority {
    pub fn as_str(self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
            Priority::Critical => "critical",
        }
    }

    pub fn parse(value: &str) -> Result<Self, CoreError> {
        match value {
            "low" => Ok(Priority::Low),
            "medium" => Ok(Priority::Medium),
            "high" => Ok(Priority::High),
            "critical" => Ok(Priority::Critical),
            other => Err(CoreError::Validation(format!(
                "Invalid priority '{other}'. Must be one of: low, medium, high, critical"
            ))),
        }
    }
}

/// Per-node settings. Missing fields take their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeProperties {
    pub required: bool,
    /// Hours.
    pub estimated_time: f64,
    pub priority: Priority,
    pub notes: String,
}

impl Default for NodeProperties {
    fn default() -> Self {
        Self {
            required: true,
            estimated_time: 0.0,
            priority: Priority::Medium,
            notes: String::new(),
        }
    }
}

/// Canvas position used by the visual editor.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

/// A node as stored in the arena.
#[derive(Debug, Clone, PartialEq)]
pub struct TreeNode {
    pub id: NodeId,
    pub skill_id: DbId,
    pub parent: Option<NodeId>,
    pub depth: usize,
    pub sort_order: i32,
    pub position: Position,
    pub properties: NodeProperties,
}

/// A node as loaded from storage, before depth is known.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeRow {
    pub id: NodeId,
    pub parent_id: Option<NodeId>,
    pub skill_id: DbId,
    pub sort_order: i32,
    pub position: Position,
    pub properties: NodeProperties,
}

/// A pending write produced by a mutation.
#[derive(Debug, Clone, PartialEq)]
pub enum TreeChange {
    Inserted(TreeNode),
    /// Node ids in preorder, subtree root first.
    Removed(Vec<NodeId>),
}

/// Result of removing one occurrence of a skill.
#[derive(Debug, Clone, PartialEq)]
pub struct RemovedSubtree {
    pub root: NodeId,
    /// Removed node ids in preorder, `root` first.
    pub nodes: Vec<NodeId>,
    /// Skill ids of the removed nodes, same order as `nodes`.
    pub skills: Vec<DbId>,
}

#[derive(Debug, Clone, Copy)]
enum SiblingOrder {
    Forward,
    Reverse,
}

// ---------------------------------------------------------------------------
// Arena
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct SkillTreeArena {
    nodes: HashMap<NodeId, TreeNode>,
    children: HashMap<NodeId, Vec<NodeId>>,
    roots: Vec<NodeId>,
    by_skill: HashMap<DbId, Vec<NodeId>>,
    last_provisional: NodeId,
    changes: Vec<TreeChange>,
}

impl SkillTreeArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild an arena from stored rows.
    ///
    /// Siblings are ordered by `(sort_order, id)`. Rows whose parent is
    /// missing, or that sit deeper than [`MAX_TREE_DEPTH`], are rejected.
    pub fn from_rows(rows: impl IntoIterator<Item = NodeRow>) -> Result<Self, CoreError> {
        let mut rows: Vec<NodeRow> = rows.into_iter().collect();
        rows.sort_by_key(|r| (r.sort_order, r.id));

        let mut by_parent: HashMap<Option<NodeId>, Vec<NodeRow>> = HashMap::new();
        for row in rows {
            by_parent.entry(row.parent_id).or_default().push(row);
        }

        let mut arena = Self::new();
        let mut queue = VecDeque::from([(None, 1usize)]);
        while let Some((parent, depth)) = queue.pop_front() {
            let Some(group) = by_parent.remove(&parent) else {
                continue;
            };
            if depth > MAX_TREE_DEPTH {
                return Err(CoreError::Internal(format!(
                    "Skill tree node {} exceeds maximum depth {MAX_TREE_DEPTH}",
                    group[0].id
                )));
            }
            for row in group {
                queue.push_back((Some(row.id), depth + 1));
                arena.attach(TreeNode {
                    id: row.id,
                    skill_id: row.skill_id,
                    parent,
                    depth,
                    sort_order: row.sort_order,
                    position: row.position,
                    properties: row.properties,
                });
            }
        }

        if let Some(orphans) = by_parent.values().next() {
            return Err(CoreError::Internal(format!(
                "Skill tree node {} references a missing parent",
                orphans[0].id
            )));
        }
        Ok(arena)
    }

    /// Attach a new node for `skill_id`.
    ///
    /// Without a parent the node becomes the last root. With a parent, the
    /// node is appended to the children of the first node holding
    /// `parent_skill_id` in preorder. Duplicates are allowed.
    pub fn add_skill(
        &mut self,
        skill_id: DbId,
        parent_skill_id: Option<DbId>,
        properties: NodeProperties,
    ) -> Result<NodeId, CoreError> {
        let (parent, depth) = match parent_skill_id {
            None => (None, 1),
            Some(parent_skill) => {
                let parent = self
                    .first_in_preorder(parent_skill, SiblingOrder::Forward)
                    .ok_or_else(|| {
                        CoreError::Validation("Parent skill not found in tree".into())
                    })?;
                let depth = self.depth_of(parent).unwrap_or(MAX_TREE_DEPTH) + 1;
                if depth > MAX_TREE_DEPTH {
                    return Err(CoreError::Validation(format!(
                        "Maximum tree depth of {MAX_TREE_DEPTH} reached"
                    )));
                }
                (Some(parent), depth)
            }
        };

        let sort_order = self
            .siblings(parent)
            .iter()
            .filter_map(|id| self.nodes.get(id))
            .map(|n| n.sort_order + 1)
            .max()
            .unwrap_or(0);

        self.last_provisional -= 1;
        let node = TreeNode {
            id: self.last_provisional,
            skill_id,
            parent,
            depth,
            sort_order,
            position: Position::default(),
            properties,
        };
        let id = node.id;
        self.changes.push(TreeChange::Inserted(node.clone()));
        self.attach(node);
        Ok(id)
    }

    /// Remove one occurrence of `skill_id` together with all its descendants.
    ///
    /// Siblings are searched last-to-first and a node is checked before its
    /// children. Returns `None` when the skill is not in the tree.
    pub fn remove_skill(&mut self, skill_id: DbId) -> Option<RemovedSubtree> {
        let root = self.first_in_preorder(skill_id, SiblingOrder::Reverse)?;
        let removed = self.detach_subtree(root);
        self.changes.push(TreeChange::Removed(removed.nodes.clone()));
        Some(removed)
    }

    /// Remove every occurrence of `skill_id`, each with its descendants.
    pub fn remove_all_of_skill(&mut self, skill_id: DbId) -> Vec<RemovedSubtree> {
        let mut removed = Vec::new();
        while let Some(subtree) = self.remove_skill(skill_id) {
            removed.push(subtree);
        }
        removed
    }

    /// Nodes in preorder (roots in order, each followed by its subtree).
    pub fn preorder(&self) -> Vec<&TreeNode> {
        let mut out = Vec::with_capacity(self.nodes.len());
        let mut stack: Vec<NodeId> = self.roots.iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            if let Some(node) = self.nodes.get(&id) {
                out.push(node);
            }
            stack.extend(self.children_of(id).iter().rev());
        }
        out
    }

    /// Skill ids in preorder, duplicates included.
    pub fn all_skills(&self) -> Vec<DbId> {
        self.preorder().into_iter().map(|n| n.skill_id).collect()
    }

    /// Skill ids in preorder of first occurrence, without duplicates.
    pub fn distinct_skills(&self) -> Vec<DbId> {
        let mut seen = HashSet::new();
        self.all_skills()
            .into_iter()
            .filter(|id| seen.insert(*id))
            .collect()
    }

    /// Breadcrumb of skill ids from a root down to the first occurrence of
    /// `skill_id`. Empty when the skill is not in the tree.
    pub fn skill_path(&self, skill_id: DbId) -> Vec<DbId> {
        let mut path = Vec::new();
        let mut current = self.first_in_preorder(skill_id, SiblingOrder::Forward);
        while let Some(id) = current {
            let Some(node) = self.nodes.get(&id) else {
                break;
            };
            path.push(node.skill_id);
            current = node.parent;
        }
        path.reverse();
        path
    }

    pub fn contains_skill(&self, skill_id: DbId) -> bool {
        self.by_skill.contains_key(&skill_id)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn node(&self, id: NodeId) -> Option<&TreeNode> {
        self.nodes.get(&id)
    }

    pub fn depth_of(&self, id: NodeId) -> Option<usize> {
        self.nodes.get(&id).map(|n| n.depth)
    }

    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    pub fn children_of(&self, id: NodeId) -> &[NodeId] {
        self.children.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Drain the writes recorded since the last call.
    pub fn take_changes(&mut self) -> Vec<TreeChange> {
        std::mem::take(&mut self.changes)
    }

    /// Nested view with each node's skill looked up in `skills`.
    pub fn to_nested<T: Clone>(&self, skills: &HashMap<DbId, T>) -> Vec<NestedNode<T>> {
        self.roots
            .iter()
            .filter_map(|id| self.nest(*id, skills))
            .collect()
    }

    fn nest<T: Clone>(&self, id: NodeId, skills: &HashMap<DbId, T>) -> Option<NestedNode<T>> {
        let node = self.nodes.get(&id)?;
        Some(NestedNode {
            node_id: node.id,
            skill_id: node.skill_id,
            skill: skills.get(&node.skill_id).cloned(),
            position: node.position,
            properties: node.properties.clone(),
            children: self
                .children_of(id)
                .iter()
                .filter_map(|child| self.nest(*child, skills))
                .collect(),
        })
    }

    fn attach(&mut self, node: TreeNode) {
        match node.parent {
            Some(parent) => self.children.entry(parent).or_default().push(node.id),
            None => self.roots.push(node.id),
        }
        self.by_skill.entry(node.skill_id).or_default().push(node.id);
        self.nodes.insert(node.id, node);
    }

    fn detach_subtree(&mut self, root: NodeId) -> RemovedSubtree {
        let mut nodes = Vec::new();
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            nodes.push(id);
            stack.extend(self.children_of(id).iter().rev());
        }

        match self.nodes.get(&root).and_then(|n| n.parent) {
            Some(parent) => {
                if let Some(siblings) = self.children.get_mut(&parent) {
                    siblings.retain(|id| *id != root);
                }
            }
            None => self.roots.retain(|id| *id != root),
        }

        let mut skills = Vec::with_capacity(nodes.len());
        for id in &nodes {
            self.children.remove(id);
            let Some(node) = self.nodes.remove(id) else {
                continue;
            };
            skills.push(node.skill_id);
            let now_empty = match self.by_skill.get_mut(&node.skill_id) {
                Some(list) => {
                    list.retain(|n| n != id);
                    list.is_empty()
                }
                None => false,
            };
            if now_empty {
                self.by_skill.remove(&node.skill_id);
            }
        }

        RemovedSubtree {
            root,
            nodes,
            skills,
        }
    }

    fn siblings(&self, parent: Option<NodeId>) -> &[NodeId] {
        match parent {
            Some(p) => self.children_of(p),
            None => &self.roots,
        }
    }

    /// First node holding `skill_id` in a preorder walk whose sibling order is
    /// given by `order`.
    fn first_in_preorder(&self, skill_id: DbId, order: SiblingOrder) -> Option<NodeId> {
        match self.by_skill.get(&skill_id)?.as_slice() {
            [] => None,
            [only] => Some(*only),
            many => many
                .iter()
                .copied()
                .min_by_key(|id| self.preorder_key(*id, order)),
        }
    }

    /// Sibling positions from the root down to `id`. An ancestor's key is a
    /// prefix of its descendants' keys, so lexicographic order is preorder.
    fn preorder_key(&self, id: NodeId, order: SiblingOrder) -> Vec<usize> {
        let mut key = Vec::with_capacity(MAX_TREE_DEPTH);
        let mut current = Some(id);
        while let Some(node_id) = current {
            let parent = self.nodes.get(&node_id).and_then(|n| n.parent);
            let siblings = self.siblings(parent);
            let index = siblings.iter().position(|s| *s == node_id).unwrap_or(0);
            key.push(match order {
                SiblingOrder::Forward => index,
                SiblingOrder::Reverse => siblings.len().saturating_sub(index + 1),
            });
            current = parent;
        }
        key.reverse();
        key
    }
}

/// Nested rendering of a tree for API responses.
#[derive(Debug, Clone, Serialize)]
pub struct NestedNode<T> {
    pub node_id: NodeId,
    pub skill_id: DbId,
    pub skill: Option<T>,
    pub position: Position,
    pub properties: NodeProperties,
    pub children: Vec<NestedNode<T>>,
}

// ---------------------------------------------------------------------------
// Statistics
// ---------------------------------------------------------------------------

/// Catalog facts about one distinct skill in a tree.
#[derive(Debug, Clone, PartialEq)]
pub struct SkillFacts {
    pub level: String,
    pub skill_type: String,
    pub difficulty: i32,
    pub market_demand: i32,
    pub total_users: i64,
    pub average_progress: f64,
    pub completion_rate: f64,
}

/// Aggregate statistics over the distinct skills of a tree.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct TreeSkillStats {
    pub total_skills: usize,
    pub skills_by_level: BTreeMap<String, usize>,
    pub skills_by_type: BTreeMap<String, usize>,
    pub average_difficulty: f64,
    pub average_market_demand: f64,
    pub total_users: i64,
    pub average_progress: f64,
    pub completion_rate: f64,
}

impl TreeSkillStats {
    pub fn compute(skills: &[SkillFacts]) -> Self {
        let mut stats = Self {
            total_skills: skills.len(),
            ..Self::default()
        };
        if skills.is_empty() {
            return stats;
        }

        let mut difficulty = 0i64;
        let mut demand = 0i64;
        let mut progress = 0.0;
        let mut completion = 0.0;
        for skill in skills {
            *stats.skills_by_level.entry(skill.level.clone()).or_default() += 1;
            *stats
                .skills_by_type
                .entry(skill.skill_type.clone())
                .or_default() += 1;
            difficulty += i64::from(skill.difficulty);
            demand += i64::from(skill.market_demand);
            stats.total_users += skill.total_users;
            progress += skill.average_progress;
            completion += skill.completion_rate;
        }

        let n = skills.len() as f64;
        stats.average_difficulty = difficulty as f64 / n;
        stats.average_market_demand = demand as f64 / n;
        stats.average_progress = progress / n;
        stats.completion_rate = completion / n;
        stats
    }
}

// ---------------------------------------------------------------------------
// Learning paths
// ---------------------------------------------------------------------------

/// One step of a learning path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathStep {
    pub skill_id: DbId,
    pub order: i32,
    #[serde(default)]
    pub is_optional: bool,
    #[serde(default)]
    pub estimated_time: Option<f64>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Check a learning path before it is stored.
///
/// Step orders must be unique within the path. Whether step skills exist is
/// checked against the catalog by the caller.
pub fn validate_learning_path(
    name: &str,
    difficulty: &str,
    status: &str,
    steps: &[PathStep],
) -> Result<(), CoreError> {
    validate_not_blank("name", name)?;
    validate_one_of("difficulty", difficulty, SKILL_LEVELS)?;
    validate_one_of("status", status, PATH_STATUSES)?;

    let mut orders = HashSet::new();
    for step in steps {
        if !orders.insert(step.order) {
            return Err(CoreError::Validation(format!(
                "Duplicate step order {} in learning path",
                step.order
            )));
        }
        if step.estimated_time.is_some_and(|t| t < 0.0) {
            return Err(CoreError::Validation(
                "estimated_time must not be negative".into(),
            ));
        }
    }
    Ok(())
}
