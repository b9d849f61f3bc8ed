//! Tagged components stored in a fixed table, one slot per [`ComponentKind`].

use cgmath::Vector3;

use super::transform::Transform;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentKind {
    Transform,
    Material,
    Spin,
}

impl ComponentKind {
    pub const COUNT: usize = 3;

    pub const fn index(self) -> usize {
        self as usize
    }
}

/// Surface colour multiplied into the sampled texture.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Material {
    pub tint: [f32; 4],
}

impl Default for Material {
    fn default() -> Self {
        Self {
            tint: [0.7, 0.7, 0.7, 1.0],
        }
    }
}

/// Constant angular velocity in radians per second, added to the rotation each tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Spin {
    pub velocity: Vector3<f32>,
}

impl Spin {
    pub fn new(velocity: Vector3<f32>) -> Self {
        Self { velocity }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Component {
    Transform(Transform),
    Material(Material),
    Spin(Spin),
}

impl Component {
    pub fn kind(&self) -> ComponentKind {
        match self {
            Component::Transform(_) => ComponentKind::Transform,
            Component::Material(_) => ComponentKind::Material,
            Component::Spin(_) => ComponentKind::Spin,
        }
    }
}

/// A type that can live in a [`Components`] table.
pub trait ComponentType: Sized {
    const KIND: ComponentKind;

    fn from_ref(component: &Component) -> Option<&Self>;
    fn from_mut(component: &mut Component) -> Option<&mut Self>;
    fn from_component(component: Component) -> Option<Self>;
    fn into_component(self) -> Component;
}

macro_rules! component_type {
    ($ty:ident) => {
        impl ComponentType for $ty {
            const KIND: ComponentKind = ComponentKind::$ty;

            fn from_ref(component: &Component) -> Option<&Self> {
                match component {
                    Component::$ty(c) => Some(c),
                    _ => None,
                }
            }

            fn from_mut(component: &mut Component) -> Option<&mut Self> {
                match component {
                    Component::$ty(c) => Some(c),
                    _ => None,
                }
            }

            fn from_component(component: Component) -> Option<Self> {
                match component {
                    Component::$ty(c) => Some(c),
                    _ => None,
                }
            }

            fn into_component(self) -> Component {
                Component::$ty(self)
            }
        }
    };
}

component_type!(Transform);
component_type!(Material);
component_type!(Spin);

/// At most one component per kind. Lookups index straight into the table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Components {
    slots: [Option<Component>; ComponentKind::COUNT],
}

impl Components {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `component`, returning the one it replaced.
    pub fn insert<T: ComponentType>(&mut self, component: T) -> Option<T> {
        self.slots[T::KIND.index()]
            .replace(component.into_component())
            .and_then(T::from_component)
    }

    pub fn get<T: ComponentType>(&self) -> Option<&T> {
        self.slots[T::KIND.index()].as_ref().and_then(T::from_ref)
    }

    pub fn get_mut<T: ComponentType>(&mut self) -> Option<&mut T> {
        self.slots[T::KIND.index()].as_mut().and_then(T::from_mut)
    }

    pub fn remove<T: ComponentType>(&mut self) -> Option<T> {
        self.slots[T::KIND.index()].take().and_then(T::from_component)
    }

    pub fn contains<T: ComponentType>(&self) -> bool {
        self.slots[T::KIND.index()].is_some()
    }

    pub fn kinds(&self) -> impl Iterator<Item = ComponentKind> + '_ {
        self.slots.iter().flatten().map(Component::kind)
    }

    pub fn len(&self) -> usize {
        self.slots.iter().flatten().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_index_their_own_slot() {
        assert_eq!(ComponentKind::Transform.index(), 0);
        assert_eq!(ComponentKind::Material.index(), 1);
        assert_eq!(ComponentKind::Spin.index(), 2);
        assert_eq!(ComponentKind::COUNT, 3);
    }

    #[test]
    fn get_returns_the_inserted_instance() {
        let mut components = Components::new();
        let mut t = Transform::new();
        t.position = Vector3::new(1.0, 2.0, 3.0);
        assert!(components.insert(t.clone()).is_none());
        assert_eq!(components.get::<Transform>(), Some(&t));
        assert!(components.get::<Spin>().is_none());
        assert!(!components.contains::<Material>());
    }

    #[test]
    fn insert_replaces_and_returns_previous() {
        let mut components = Components::new();
        components.insert(Material { tint: [1.0; 4] });
        let old = components.insert(Material::default());
        assert_eq!(old, Some(Material { tint: [1.0; 4] }));
        assert_eq!(components.len(), 1);
    }

    #[test]
    fn get_mut_and_remove() {
        let mut components = Components::new();
        components.insert(Spin::new(Vector3::new(0.0, 1.0, 0.0)));
        components.get_mut::<Spin>().unwrap().velocity.y = 2.0;
        let spin = components.remove::<Spin>().unwrap();
        assert_eq!(spin.velocity.y, 2.0);
        assert!(components.is_empty());
        assert!(components.remove::<Spin>().is_none());
    }

    #[test]
    fn kinds_lists_what_is_present() {
        let mut components = Components::new();
        components.insert(Spin::new(Vector3::new(0.0, 0.0, 0.0)));
        components.insert(Transform::new());
        let kinds: Vec<_> = components.kinds().collect();
        assert_eq!(kinds, vec![ComponentKind::Transform, ComponentKind::Spin]);
    }
}
