//! Entity manager: id allocation, typed stores and frame-boundary removal.

use super::components::*;
use super::entity::{Entity, EntityAllocator};
use super::store::{ComponentStore, StoreError};
use std::collections::BTreeSet;

/// One store per component kind.
///
/// Fields are public so systems can borrow two stores mutably at once.
#[derive(Debug, Default)]
pub struct Stores {
    pub info: ComponentStore<EntityInfo>,
    pub transforms: ComponentStore<Transform>,
    pub cameras: ComponentStore<Camera>,
    pub meshes: ComponentStore<MeshComponent>,
    pub directional_lights: ComponentStore<DirectionalLight>,
    pub point_lights: ComponentStore<PointLight>,
    pub spot_lights: ComponentStore<SpotLight>,
    pub physics: ComponentStore<Physics>,
    pub colliders: ComponentStore<Collider>,
}

impl Stores {
    fn mark_invalid(&mut self, entity: Entity, kind: ComponentKind) -> bool {
        match kind {
            ComponentKind::Info => self.info.mark_invalid(entity),
            ComponentKind::Transform => self.transforms.mark_invalid(entity),
            ComponentKind::Camera => self.cameras.mark_invalid(entity),
            ComponentKind::Mesh => self.meshes.mark_invalid(entity),
            ComponentKind::DirectionalLight => self.directional_lights.mark_invalid(entity),
            ComponentKind::PointLight => self.point_lights.mark_invalid(entity),
            ComponentKind::SpotLight => self.spot_lights.mark_invalid(entity),
            ComponentKind::Physics => self.physics.mark_invalid(entity),
            ComponentKind::Collider => self.colliders.mark_invalid(entity),
        }
    }

    fn contains(&self, entity: Entity, kind: ComponentKind) -> bool {
        match kind {
            ComponentKind::Info => self.info.contains(entity),
            ComponentKind::Transform => self.transforms.contains(entity),
            ComponentKind::Camera => self.cameras.contains(entity),
            ComponentKind::Mesh => self.meshes.contains(entity),
            ComponentKind::DirectionalLight => self.directional_lights.contains(entity),
            ComponentKind::PointLight => self.point_lights.contains(entity),
            ComponentKind::SpotLight => self.spot_lights.contains(entity),
            ComponentKind::Physics => self.physics.contains(entity),
            ComponentKind::Collider => self.colliders.contains(entity),
        }
    }

    fn compact(&mut self) -> usize {
        self.info.compact()
            + self.transforms.compact()
            + self.cameras.compact()
            + self.meshes.compact()
            + self.directional_lights.compact()
            + self.point_lights.compact()
            + self.spot_lights.compact()
            + self.physics.compact()
            + self.colliders.compact()
    }
}

/// Maps a component type to its store.
pub trait Component: Sized + 'static {
    const KIND: ComponentKind;

    fn store(stores: &Stores) -> &ComponentStore<Self>;
    fn store_mut(stores: &mut Stores) -> &mut ComponentStore<Self>;
}

macro_rules! impl_component {
    ($ty:ty, $kind:ident, $field:ident) => {
        impl Component for $ty {
            const KIND: ComponentKind = ComponentKind::$kind;

            fn store(stores: &Stores) -> &ComponentStore<Self> {
                &stores.$field
            }

            fn store_mut(stores: &mut Stores) -> &mut ComponentStore<Self> {
                &mut stores.$field
            }
        }
    };
}

impl_component!(EntityInfo, Info, info);
impl_component!(Transform, Transform, transforms);
impl_component!(Camera, Camera, cameras);
impl_component!(MeshComponent, Mesh, meshes);
impl_component!(DirectionalLight, DirectionalLight, directional_lights);
impl_component!(PointLight, PointLight, point_lights);
impl_component!(SpotLight, SpotLight, spot_lights);
impl_component!(Physics, Physics, physics);
impl_component!(Collider, Collider, colliders);

/// Owns all component stores and the entity id space.
#[derive(Debug, Default)]
pub struct EntityManager {
    allocator: EntityAllocator,
    stores: Stores,
    marked: BTreeSet<Entity>,
}

impl EntityManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an entity with an [`EntityInfo`] carrying `name`.
    ///
    /// # Panics
    ///
    /// Panics once all `u32` ids have been handed out. Use
    /// [`try_create_entity`](Self::try_create_entity) to handle that case.
    pub fn create_entity(&mut self, name: impl Into<String>) -> Entity {
        match self.try_create_entity(name) {
            Ok(entity) => entity,
            Err(e) => panic!("{}", e),
        }
    }

    pub fn try_create_entity(&mut self, name: impl Into<String>) -> Result<Entity, StoreError> {
        let entity = self.allocator.allocate().ok_or(StoreError::IdsExhausted)?;
        // Fresh ids can never collide with a live slot
        self.stores.info.insert(entity, EntityInfo::named(name))?;
        log::trace!("Created entity {}", entity);
        Ok(entity)
    }

    pub fn is_alive(&self, entity: Entity) -> bool {
        self.stores.info.contains(entity)
    }

    /// Number of live entities.
    pub fn entity_count(&self) -> usize {
        self.stores.info.len()
    }

    pub fn entities(&self) -> impl Iterator<Item = Entity> + '_ {
        self.stores.info.entities()
    }

    pub fn stores(&self) -> &Stores {
        &self.stores
    }

    pub fn stores_mut(&mut self) -> &mut Stores {
        &mut self.stores
    }

    /// Attach a component. Fails on unknown entities and duplicate components.
    pub fn add_component<C: Component>(&mut self, entity: Entity, component: C) -> Result<(), StoreError> {
        if !self.is_alive(entity) {
            return Err(StoreError::UnknownEntity(entity));
        }
        C::store_mut(&mut self.stores).insert(entity, component)?;
        self.invalidate_derived(entity, C::KIND);
        Ok(())
    }

    /// Attach a component whose type is only known at runtime.
    pub fn add_any(&mut self, entity: Entity, component: AnyComponent) -> Result<(), StoreError> {
        match component {
            AnyComponent::Info(c) => self.add_component(entity, c),
            AnyComponent::Transform(c) => self.add_component(entity, c),
            AnyComponent::Camera(c) => self.add_component(entity, c),
            AnyComponent::Mesh(c) => self.add_component(entity, c),
            AnyComponent::DirectionalLight(c) => self.add_component(entity, c),
            AnyComponent::PointLight(c) => self.add_component(entity, c),
            AnyComponent::SpotLight(c) => self.add_component(entity, c),
            AnyComponent::Physics(c) => self.add_component(entity, c),
            AnyComponent::Collider(c) => self.add_component(entity, c),
        }
    }

    /// Replace a component with its kind's default value.
    ///
    /// Info and Transform reset in place: the entity keeps its name and its
    /// hierarchy links.
    pub fn reset_component(&mut self, entity: Entity, kind: ComponentKind) -> bool {
        let Some(default) = AnyComponent::default_of(kind) else {
            return false;
        };
        if kind == ComponentKind::Info {
            let Some(info) = self.stores.info.get_mut(entity) else {
                return false;
            };
            let name = std::mem::take(&mut info.name);
            *info = EntityInfo::named(name);
            return true;
        }
        if kind == ComponentKind::Transform {
            // Keep hierarchy links; only the local transform resets
            let Some(transform) = self.stores.transforms.get_mut(entity) else {
                return false;
            };
            transform.set_position(glam::Vec3::ZERO);
            transform.set_rotation(glam::Quat::IDENTITY);
            transform.set_scale(glam::Vec3::ONE);
            return true;
        }
        if !self.stores.mark_invalid(entity, kind) {
            return false;
        }
        self.add_any(entity, default).is_ok()
    }

    /// Mesh and collider bounds depend on the transform; a new or removed
    /// dependent forces a recompute.
    fn invalidate_derived(&mut self, entity: Entity, kind: ComponentKind) {
        let Some(transform) = self.stores.transforms.get_mut(entity) else {
            return;
        };
        match kind {
            ComponentKind::Mesh => transform.invalidate_mesh_bounds(),
            ComponentKind::Collider => transform.invalidate_collider_bounds(),
            _ => {}
        }
    }

    pub fn get<C: Component>(&self, entity: Entity) -> Option<&C> {
        C::store(&self.stores).get(entity)
    }

    /// Mutable access. Transform changes still go through its setters, so
    /// dirty flags are kept.
    pub fn get_mut<C: Component>(&mut self, entity: Entity) -> Option<&mut C> {
        C::store_mut(&mut self.stores).get_mut(entity)
    }

    pub fn has<C: Component>(&self, entity: Entity) -> bool {
        C::store(&self.stores).contains(entity)
    }

    /// Soft-delete one component. Returns false if the entity never had it.
    pub fn remove_component<C: Component>(&mut self, entity: Entity) -> bool {
        self.remove_kind(entity, C::KIND)
    }

    /// Soft-delete one component by kind. The info component is what keeps an
    /// entity alive, so it is only removed through [`destroy_entity`](Self::destroy_entity).
    pub fn remove_kind(&mut self, entity: Entity, kind: ComponentKind) -> bool {
        if kind == ComponentKind::Info {
            log::warn!("Refusing to remove the info of entity {}; destroy it instead", entity);
            return false;
        }
        if kind == ComponentKind::Transform {
            self.unlink(entity);
        }
        self.stores.mark_invalid(entity, kind)
    }

    /// Kinds currently attached to `entity`.
    pub fn kinds_of(&self, entity: Entity) -> Vec<ComponentKind> {
        ComponentKind::ALL
            .into_iter()
            .filter(|kind| self.stores.contains(entity, *kind))
            .collect()
    }

    /// Re-parent `child` under `parent` (or detach it with `None`).
    ///
    /// Both entities need a transform. Links are ids, never references.
    pub fn set_parent(&mut self, child: Entity, parent: Option<Entity>) -> Result<(), StoreError> {
        if !self.stores.transforms.contains(child) {
            return Err(StoreError::UnknownEntity(child));
        }
        if let Some(parent) = parent {
            if !self.stores.transforms.contains(parent) {
                return Err(StoreError::UnknownEntity(parent));
            }
            // Walk up from the new parent; meeting the child means a cycle
            let mut cursor = Some(parent);
            while let Some(current) = cursor {
                if current == child {
                    return Err(StoreError::HierarchyCycle(child));
                }
                cursor = self.stores.transforms.get(current).and_then(Transform::parent);
            }
        }

        let old_parent = self.stores.transforms.get(child).and_then(Transform::parent);
        if let Some(old) = old_parent {
            if let Some(t) = self.stores.transforms.get_mut(old) {
                t.remove_child_link(child);
            }
        }
        if let Some(new) = parent {
            if let Some(t) = self.stores.transforms.get_mut(new) {
                t.add_child_link(child);
            }
        }
        if let Some(t) = self.stores.transforms.get_mut(child) {
            t.set_parent_link(parent);
        }
        Ok(())
    }

    fn unlink(&mut self, entity: Entity) {
        let Some(transform) = self.stores.transforms.get(entity) else {
            return;
        };
        let parent = transform.parent();
        let children = transform.children().to_vec();

        if let Some(parent) = parent {
            if let Some(t) = self.stores.transforms.get_mut(parent) {
                t.remove_child_link(entity);
            }
        }
        for child in children {
            if let Some(t) = self.stores.transforms.get_mut(child) {
                t.set_parent_link(None);
            }
        }
    }

    /// Mark `entity` and its transform descendants for removal at the next
    /// [`remove_entities_marked`](Self::remove_entities_marked).
    pub fn destroy_entity(&mut self, entity: Entity) -> bool {
        if !self.is_alive(entity) {
            return false;
        }
        let mut pending = vec![entity];
        while let Some(current) = pending.pop() {
            if self.marked.insert(current) {
                if let Some(t) = self.stores.transforms.get(current) {
                    pending.extend_from_slice(t.children());
                }
            }
        }
        true
    }

    pub fn is_marked(&self, entity: Entity) -> bool {
        self.marked.contains(&entity)
    }

    /// Frame-boundary removal: invalidate every component of marked
    /// entities, then compact all stores. Returns the number of entities removed.
    ///
    /// Must not be called while a merge walk over the stores is running.
    pub fn remove_entities_marked(&mut self) -> usize {
        let marked = std::mem::take(&mut self.marked);
        let mut removed = 0;
        for entity in &marked {
            if !self.is_alive(*entity) {
                continue;
            }
            self.unlink(*entity);
            for kind in ComponentKind::ALL {
                self.stores.mark_invalid(*entity, kind);
            }
            removed += 1;
        }
        let slots = self.stores.compact();
        if removed > 0 || slots > 0 {
            log::debug!("Removed {} entities, reclaimed {} component slots", removed, slots);
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    #[test]
    fn test_create_and_lookup() {
        let mut em = EntityManager::new();
        let a = em.create_entity("a");
        let b = em.create_entity("b");
        assert!(a < b);
        em.add_component(a, Transform::default()).unwrap();
        assert!(em.has::<Transform>(a));
        assert!(!em.has::<Transform>(b));
        assert!(em.get::<Physics>(a).is_none());
        assert_eq!(em.get::<EntityInfo>(b).map(|i| i.name.as_str()), Some("b"));
    }

    #[test]
    fn test_add_to_unknown_entity_fails() {
        let mut em = EntityManager::new();
        let ghost = Entity::from_raw(42);
        assert_eq!(
            em.add_component(ghost, Physics::default()),
            Err(StoreError::UnknownEntity(ghost))
        );
    }

    #[test]
    fn test_duplicate_component_fails() {
        let mut em = EntityManager::new();
        let a = em.create_entity("a");
        em.add_component(a, Physics::default()).unwrap();
        assert_eq!(
            em.add_component(a, Physics::default()),
            Err(StoreError::Duplicate(a))
        );
    }

    #[test]
    fn test_ids_not_reused_after_removal() {
        let mut em = EntityManager::new();
        let a = em.create_entity("a");
        em.destroy_entity(a);
        assert!(em.is_alive(a), "destruction waits for the frame boundary");
        assert_eq!(em.remove_entities_marked(), 1);
        assert!(!em.is_alive(a));
        let b = em.create_entity("b");
        assert!(b > a);
    }

    #[test]
    fn test_destroy_takes_children() {
        let mut em = EntityManager::new();
        let parent = em.create_entity("parent");
        let child = em.create_entity("child");
        let other = em.create_entity("other");
        for e in [parent, child, other] {
            em.add_component(e, Transform::default()).unwrap();
        }
        em.set_parent(child, Some(parent)).unwrap();
        em.destroy_entity(parent);
        em.remove_entities_marked();
        assert!(!em.is_alive(child));
        assert!(em.is_alive(other));
        assert_eq!(em.stores().transforms.slot_count(), 1);
    }

    #[test]
    fn test_set_parent_rejects_cycles() {
        let mut em = EntityManager::new();
        let a = em.create_entity("a");
        let b = em.create_entity("b");
        em.add_component(a, Transform::default()).unwrap();
        em.add_component(b, Transform::default()).unwrap();
        em.set_parent(b, Some(a)).unwrap();
        assert_eq!(em.set_parent(a, Some(b)), Err(StoreError::HierarchyCycle(a)));
        assert_eq!(em.get::<Transform>(a).map(|t| t.children().to_vec()), Some(vec![b]));

        em.set_parent(b, None).unwrap();
        assert!(em.get::<Transform>(a).map(|t| t.children().is_empty()).unwrap_or(false));
    }

    #[test]
    fn test_adding_mesh_invalidates_bounds() {
        let mut em = EntityManager::new();
        let a = em.create_entity("a");
        em.add_component(a, Transform::default()).unwrap();
        em.get_mut::<Transform>(a).unwrap().clear_mesh_bounds_outdated();
        em.add_component(a, Collider::default()).unwrap();
        assert!(!em.get::<Transform>(a).unwrap().mesh_bounds_outdated());
        assert!(em.get::<Transform>(a).unwrap().collider_bounds_outdated());
    }

    #[test]
    fn test_kinds_and_reset() {
        let mut em = EntityManager::new();
        let a = em.create_entity("a");
        em.add_any(a, AnyComponent::Physics(Physics::with_velocity(Vec3::X))).unwrap();
        em.add_any(a, AnyComponent::Transform(Transform::from_position(Vec3::Y))).unwrap();
        assert_eq!(
            em.kinds_of(a),
            vec![ComponentKind::Info, ComponentKind::Transform, ComponentKind::Physics]
        );

        assert!(em.reset_component(a, ComponentKind::Physics));
        assert_eq!(em.get::<Physics>(a).map(|p| p.velocity), Some(Vec3::ZERO));
        assert!(em.reset_component(a, ComponentKind::Transform));
        assert_eq!(em.get::<Transform>(a).map(|t| t.position()), Some(Vec3::ZERO));
        assert!(!em.reset_component(a, ComponentKind::Camera));
    }

    #[test]
    fn test_remove_component_is_soft_until_frame_boundary() {
        let mut em = EntityManager::new();
        let a = em.create_entity("a");
        em.add_component(a, Physics::default()).unwrap();
        assert!(em.remove_component::<Physics>(a));
        assert!(!em.has::<Physics>(a));
        assert_eq!(em.stores().physics.slot_count(), 1);
        assert!(!em.remove_component::<Physics>(a));

        em.remove_entities_marked();
        assert_eq!(em.stores().physics.slot_count(), 0);
        assert!(em.is_alive(a));
    }

    /// Resetting or removing the info never ends the entity's life.
    #[test]
    fn test_info_outlives_reset_and_remove() {
        let mut em = EntityManager::new();
        let a = em.create_entity("a");
        em.add_component(a, Transform::default()).unwrap();
        em.get_mut::<EntityInfo>(a).unwrap().show_in_editor = false;

        assert!(em.reset_component(a, ComponentKind::Info));
        assert!(em.is_alive(a));
        let info = em.get::<EntityInfo>(a).unwrap();
        assert_eq!(info.name, "a");
        assert!(info.show_in_editor);

        assert!(!em.remove_component::<EntityInfo>(a));
        assert!(em.is_alive(a));

        assert!(em.destroy_entity(a));
        assert_eq!(em.remove_entities_marked(), 1);
        assert_eq!(em.stores().transforms.slot_count(), 0);
        assert_eq!(em.stores().info.slot_count(), 0);
    }
}
