//! Component types
//!
//! Every kind of component has its own plain struct and store. [`AnyComponent`]
//! is the closed sum of all kinds, used where a component has to travel
//! without its static type (generic add/reset paths).

mod camera;
mod light;
mod mesh;
mod physics;
mod transform;

pub use camera::*;
pub use light::*;
pub use mesh::*;
pub use physics::*;
pub use transform::*;

/// Editor-facing info. A live `EntityInfo` is what makes an entity exist.
#[derive(Debug, Clone)]
pub struct EntityInfo {
    pub name: String,
    pub show_in_editor: bool,
}

impl Default for EntityInfo {
    fn default() -> Self {
        Self {
            name: String::new(),
            show_in_editor: true,
        }
    }
}

impl EntityInfo {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

/// Discriminator of the component kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ComponentKind {
    Info,
    Transform,
    Camera,
    Mesh,
    DirectionalLight,
    PointLight,
    SpotLight,
    Physics,
    Collider,
}

impl ComponentKind {
    pub const ALL: [ComponentKind; 9] = [
        ComponentKind::Info,
        ComponentKind::Transform,
        ComponentKind::Camera,
        ComponentKind::Mesh,
        ComponentKind::DirectionalLight,
        ComponentKind::PointLight,
        ComponentKind::SpotLight,
        ComponentKind::Physics,
        ComponentKind::Collider,
    ];
}

/// Any component value.
#[derive(Debug, Clone)]
pub enum AnyComponent {
    Info(EntityInfo),
    Transform(Transform),
    Camera(Camera),
    Mesh(MeshComponent),
    DirectionalLight(DirectionalLight),
    PointLight(PointLight),
    SpotLight(SpotLight),
    Physics(Physics),
    Collider(Collider),
}

impl AnyComponent {
    pub fn kind(&self) -> ComponentKind {
        match self {
            AnyComponent::Info(_) => ComponentKind::Info,
            AnyComponent::Transform(_) => ComponentKind::Transform,
            AnyComponent::Camera(_) => ComponentKind::Camera,
            AnyComponent::Mesh(_) => ComponentKind::Mesh,
            AnyComponent::DirectionalLight(_) => ComponentKind::DirectionalLight,
            AnyComponent::PointLight(_) => ComponentKind::PointLight,
            AnyComponent::SpotLight(_) => ComponentKind::SpotLight,
            AnyComponent::Physics(_) => ComponentKind::Physics,
            AnyComponent::Collider(_) => ComponentKind::Collider,
        }
    }

    /// Default value of a kind. Meshes have no meaningful default (they need
    /// a geometry reference), so `Mesh` yields `None`.
    pub fn default_of(kind: ComponentKind) -> Option<Self> {
        Some(match kind {
            ComponentKind::Info => AnyComponent::Info(EntityInfo::default()),
            ComponentKind::Transform => AnyComponent::Transform(Transform::default()),
            ComponentKind::Camera => AnyComponent::Camera(Camera::default()),
            ComponentKind::Mesh => return None,
            ComponentKind::DirectionalLight => {
                AnyComponent::DirectionalLight(DirectionalLight::default())
            }
            ComponentKind::PointLight => AnyComponent::PointLight(PointLight::default()),
            ComponentKind::SpotLight => AnyComponent::SpotLight(SpotLight::default()),
            ComponentKind::Physics => AnyComponent::Physics(Physics::default()),
            ComponentKind::Collider => AnyComponent::Collider(Collider::default()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_kind() {
        for kind in ComponentKind::ALL {
            if let Some(component) = AnyComponent::default_of(kind) {
                assert_eq!(component.kind(), kind);
            } else {
                assert_eq!(kind, ComponentKind::Mesh);
            }
        }
    }
}
