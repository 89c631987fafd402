//! Owns the set of processed reference targets (C2).

use crate::target::ReferenceTarget;
use crate::types::TargetId;
use crate::ArError;

/// An ordered set of [`ReferenceTarget`]s with at most `capacity` members
/// and a designated active target. Active is UI focus only: it never
/// constrains which targets the tracker considers.
#[derive(Debug)]
pub struct TargetCatalog {
    capacity: usize,
    next_id: u64,
    targets: Vec<ReferenceTarget>,
    active: Option<TargetId>,
}

impl TargetCatalog {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            next_id: 0,
            targets: Vec::new(),
            active: None,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// Insertion order, as the default iteration order.
    pub fn list(&self) -> &[ReferenceTarget] {
        &self.targets
    }

    pub fn get(&self, id: TargetId) -> Option<&ReferenceTarget> {
        self.targets.iter().find(|t| t.id() == id)
    }

    pub fn get_mut(&mut self, id: TargetId) -> Option<&mut ReferenceTarget> {
        self.targets.iter_mut().find(|t| t.id() == id)
    }

    pub fn active(&self) -> Option<TargetId> {
        self.active
    }

    /// Only processed targets are considered candidates for detection.
    pub fn processed_targets(&self) -> impl Iterator<Item = &ReferenceTarget> {
        self.targets.iter().filter(|t| t.is_processed())
    }

    /// Reserve the next id without inserting a target yet. The caller
    /// builds a [`ReferenceTarget`] with this id, processes it (possibly
    /// off-thread via its own collaborator), then calls [`Self::insert`].
    #[tracing::instrument(skip(self))]
    pub fn reserve_id(&mut self) -> crate::Result<TargetId> {
        if self.targets.len() >= self.capacity {
            tracing::debug!(capacity = self.capacity, "catalog rejected: at capacity");
            return Err(ArError::CatalogFull {
                max: self.capacity,
            });
        }
        let id = TargetId::new(self.next_id);
        self.next_id += 1;
        Ok(id)
    }

    /// Insert a prepared target reserved via [`Self::reserve_id`]. The
    /// first inserted target becomes active automatically.
    pub fn insert(&mut self, target: ReferenceTarget) -> crate::Result<TargetId> {
        if self.targets.len() >= self.capacity {
            return Err(ArError::CatalogFull {
                max: self.capacity,
            });
        }
        if self.targets.iter().any(|t| t.id() == target.id()) {
            return Err(ArError::InvalidImage(format!(
                "target id {} already present in catalog",
                target.id()
            )));
        }
        let id = target.id();
        self.targets.push(target);
        if self.active.is_none() {
            self.active = Some(id);
        }
        Ok(id)
    }

    /// Remove a target by id. If it was active, promotes the first
    /// remaining member to active, or leaves none.
    pub fn remove(&mut self, id: TargetId) -> bool {
        let Some(pos) = self.targets.iter().position(|t| t.id() == id) else {
            return false;
        };
        self.targets.remove(pos);
        if self.active == Some(id) {
            self.active = self.targets.first().map(|t| t.id());
        }
        true
    }

    /// Set the active target. Returns `false` if `id` is not in the
    /// catalog (the active target is left unchanged in that case).
    pub fn set_active(&mut self, id: TargetId) -> bool {
        if self.targets.iter().any(|t| t.id() == id) {
            self.active = Some(id);
            true
        } else {
            false
        }
    }
}
