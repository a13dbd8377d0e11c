mod shape_box;
mod shape_capsule;
mod shape_cone;
mod shape_cylinder;
mod shape_sphere;
mod shape_sweep;
mod shape_swing;

use crate::{bounds::Bounds, math_ext::RotationExt};
use glam::{Vec2, Vec3};
use serde::{Deserialize, Serialize};

pub use shape_box::ShapeBox;
pub use shape_capsule::ShapeCapsule;
pub use shape_cone::ShapeCone;
pub use shape_cylinder::{ShapeCylinder, ShapeCylinderHorz};
pub use shape_sphere::ShapeSphere;
pub use shape_sweep::ShapeSweep;
pub use shape_swing::ShapeSwing;

/// A convex set described by its support function: the point of the set
/// furthest along `dir`. This is all GJK and EPA need to know about a shape.
pub trait MinkowskiSum {
    fn support(&self, dir: Vec3) -> Vec3;
}

impl<T: MinkowskiSum + ?Sized> MinkowskiSum for &T {
    #[inline]
    fn support(&self, dir: Vec3) -> Vec3 {
        (**self).support(dir)
    }
}

trait ShapeTrait {
    /// Support point in the shape's local frame.
    fn support(&self, dir: Vec3) -> Vec3;

    /// Local bounds after applying an optional yaw rotation. The default
    /// evaluates the support function along each world axis which is exact
    /// for any convex shape.
    fn bounding_box(&self, rotation: Option<Vec2>) -> Bounds {
        let rotation = rotation.unwrap_or(Vec2::X);
        let mut bounds = Bounds::new();
        for axis in [Vec3::X, Vec3::Y, Vec3::Z] {
            bounds.expand_by_point(rotation.yaw_to_world(self.support(rotation.yaw_to_local(axis))));
            bounds.expand_by_point(rotation.yaw_to_world(self.support(rotation.yaw_to_local(-axis))));
        }
        bounds
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Shape {
    Box(ShapeBox),
    Sphere(ShapeSphere),
    Capsule(ShapeCapsule),
    Cylinder(ShapeCylinder),
    CylinderHorz(ShapeCylinderHorz),
    Cone(ShapeCone),
    Sweep(ShapeSweep),
    Swing(ShapeSwing),
}

impl Default for Shape {
    fn default() -> Shape {
        Shape::Sphere(ShapeSphere { radius: 1.0 })
    }
}

impl Shape {
    pub fn make_box(half_size: Vec3) -> Self {
        Shape::Box(ShapeBox { half_size })
    }

    pub fn make_sphere(radius: f32) -> Self {
        Shape::Sphere(ShapeSphere { radius })
    }

    pub fn make_capsule(radius: f32, inner_half_height: f32) -> Self {
        Shape::Capsule(ShapeCapsule {
            radius,
            inner_half_height,
        })
    }

    pub fn make_cylinder(radius: f32, half_height: f32) -> Self {
        Shape::Cylinder(ShapeCylinder {
            radius,
            half_height,
        })
    }

    pub fn make_cylinder_horz(radius: f32, half_height: f32) -> Self {
        Shape::CylinderHorz(ShapeCylinderHorz {
            radius,
            half_height,
        })
    }

    pub fn make_cone(size: Vec3) -> Self {
        Shape::Cone(ShapeCone { size })
    }

    pub fn make_sweep(range: Vec2, radius: f32, half_height: f32) -> Self {
        Shape::Sweep(ShapeSweep {
            range,
            radius,
            half_height,
        })
    }

    pub fn make_swing() -> Self {
        Shape::Swing(ShapeSwing::default())
    }

    fn shape_trait(&self) -> &dyn ShapeTrait {
        match self {
            Shape::Box(data) => data,
            Shape::Sphere(data) => data,
            Shape::Capsule(data) => data,
            Shape::Cylinder(data) => data,
            Shape::CylinderHorz(data) => data,
            Shape::Cone(data) => data,
            Shape::Sweep(data) => data,
            Shape::Swing(data) => data,
        }
    }

    pub fn bounding_box(&self, rotation: Option<Vec2>) -> Bounds {
        self.shape_trait().bounding_box(rotation)
    }
}

impl MinkowskiSum for Shape {
    fn support(&self, dir: Vec3) -> Vec3 {
        self.shape_trait().support(dir)
    }
}

/// A shape placed in the world with a translation and optional yaw, used for
/// ad-hoc queries and spatial triggers.
#[derive(Copy, Clone, Debug)]
pub struct Positioned<'a> {
    pub shape: &'a Shape,
    pub position: Vec3,
    pub rotation: Option<Vec2>,
}

impl<'a> Positioned<'a> {
    pub fn new(shape: &'a Shape, position: Vec3, rotation: Option<Vec2>) -> Self {
        Self {
            shape,
            position,
            rotation,
        }
    }

    pub fn bounding_box(&self) -> Bounds {
        let mut bounds = self.shape.bounding_box(self.rotation);
        bounds.translate(self.position);
        bounds
    }
}

impl<'a> MinkowskiSum for Positioned<'a> {
    fn support(&self, dir: Vec3) -> Vec3 {
        match self.rotation {
            Some(rotation) => {
                rotation.yaw_to_world(self.shape.support(rotation.yaw_to_local(dir))) + self.position
            }
            None => self.shape.support(dir) + self.position,
        }
    }
}

/// Stretches a shape back along `offset`. Only directions that face the
/// offset pick up the extra reach so the result is the hull of the shape at
/// both ends of a motion.
#[derive(Copy, Clone, Debug)]
pub struct SweptOffset<S> {
    pub inner: S,
    pub offset: Vec3,
}

impl<S: MinkowskiSum> MinkowskiSum for SweptOffset<S> {
    fn support(&self, dir: Vec3) -> Vec3 {
        let result = self.inner.support(dir);
        if self.offset.dot(dir) > 0.0 {
            result + self.offset
        } else {
            result
        }
    }
}

/// A shape moved rigidly by `offset`.
#[derive(Copy, Clone, Debug)]
pub struct Translated<S> {
    pub inner: S,
    pub offset: Vec3,
}

impl<S: MinkowskiSum> MinkowskiSum for Translated<S> {
    fn support(&self, dir: Vec3) -> Vec3 {
        self.inner.support(dir) + self.offset
    }
}

#[inline]
fn sign_select(value: f32, extent: f32) -> f32 {
    if value > 0.0 {
        extent
    } else {
        -extent
    }
}
